use assert_matches::assert_matches;
use rstest::*;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::core::client::action::{
    is_success, Action, ActionBindings, ActionError, ActionRegistry, CommandAction, MockAction,
};
use crate::error::ScanError;
use crate::tests::common::COLLECTION;
use crate::types::scan::ActionRef;

#[fixture]
fn bindings() -> ActionBindings {
    ActionBindings {
        input: json!({"name": "user-7", "taskState": {"started": "2024-06-15T12:00:00.000Z"}}),
        object_id: format!("{COLLECTION}/7"),
        resource_container: COLLECTION.to_string(),
        resource_id: "7".to_string(),
    }
}

fn shell(script: &str) -> CommandAction {
    CommandAction::new("shell", "sh").with_args(["-c", script])
}

#[rstest]
#[case(json!(true), true)]
#[case(json!(false), false)]
#[case(json!("true"), false)]
#[case(json!(1), false)]
#[case(Value::Null, false)]
fn test_only_json_true_is_success(#[case] result: Value, #[case] expected: bool) {
    assert_eq!(is_success(&result), expected);
}

#[rstest]
fn test_bindings_wire_names(bindings: ActionBindings) {
    let wire = serde_json::to_value(&bindings).unwrap();
    assert_eq!(wire["objectID"], json!("managed/user/7"));
    assert_eq!(wire["resourceContainer"], json!("managed/user"));
    assert_eq!(wire["resourceId"], json!("7"));
    assert_eq!(wire["input"]["name"], json!("user-7"));
}

#[rstest]
#[tokio::test]
async fn test_command_result_is_parsed_from_stdout(bindings: ActionBindings) {
    let result = shell("cat >/dev/null; echo true").invoke(bindings).await.unwrap();
    assert_eq!(result, json!(true));
}

#[rstest]
#[tokio::test]
async fn test_command_receives_bindings_on_stdin(bindings: ActionBindings) {
    let result = shell("cat").invoke(bindings.clone()).await.unwrap();
    assert_eq!(result, serde_json::to_value(&bindings).unwrap());
}

#[rstest]
#[tokio::test]
async fn test_command_empty_output_is_null(bindings: ActionBindings) {
    let result = shell("exit 0").invoke(bindings).await.unwrap();
    assert_eq!(result, Value::Null);
    assert!(!is_success(&result));
}

#[rstest]
#[tokio::test]
async fn test_command_non_zero_exit(bindings: ActionBindings) {
    let result = shell("echo broken >&2; exit 3").invoke(bindings).await;
    assert_matches!(result, Err(ActionError::NonZeroExit { stderr, .. }) if stderr == "broken");
}

#[rstest]
#[tokio::test]
async fn test_command_invalid_output(bindings: ActionBindings) {
    let result = shell("cat >/dev/null; echo not-json").invoke(bindings).await;
    assert_matches!(result, Err(ActionError::InvalidOutput(_)));
}

#[rstest]
#[tokio::test]
async fn test_command_timeout(bindings: ActionBindings) {
    let action = shell("sleep 5").with_timeout(Some(Duration::from_millis(100)));
    assert_matches!(action.invoke(bindings).await, Err(ActionError::Timeout { timeout_ms: 100, .. }));
}

#[rstest]
#[tokio::test]
async fn test_command_spawn_failure(bindings: ActionBindings) {
    let action = CommandAction::new("missing", "/nonexistent/task-scanner-action");
    assert_matches!(action.invoke(bindings).await, Err(ActionError::Spawn { .. }));
}

#[rstest]
fn test_registry_resolves_by_name() {
    let mut action = MockAction::new();
    action.expect_name().return_const("provision".to_string());
    let registry = ActionRegistry::new().with_action(Arc::new(action));

    assert!(registry.contains("provision"));
    let resolved = registry.resolve(Some(&ActionRef::new("provision"))).unwrap();
    assert_eq!(resolved.name(), "provision");
    assert_matches!(registry.resolve(Some(&ActionRef::new("deprovision"))).err(), Some(ScanError::Configuration(_)));
    assert_matches!(registry.resolve(None).err(), Some(ScanError::Configuration(_)));
}
