use crate::types::record::Record;

/// Splits `records` into exactly `workers` partitions.
///
/// The first `max_records` records are kept (all of them when `None`) and dealt round-robin:
/// record `i` goes to partition `i % workers`, so each partition preserves the original order.
/// A worker count of zero yields no partitions; configuration validation rejects it earlier.
pub fn partition(records: Vec<Record>, workers: usize, max_records: Option<usize>) -> Vec<Vec<Record>> {
    let mut partitions: Vec<Vec<Record>> = (0..workers).map(|_| Vec::new()).collect();
    if workers == 0 {
        return partitions;
    }
    let cap = max_records.unwrap_or(usize::MAX);
    for (index, record) in records.into_iter().take(cap).enumerate() {
        partitions[index % workers].push(record);
    }
    partitions
}
