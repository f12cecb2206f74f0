use cc_bridge::{
    backend::{HookDecision, ToolHook},
    error::AdapterError,
    models::ToolDefinition,
    tools::{BridgeOutcome, BridgeState, ToolBridge, ToolSpec},
};
use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};

fn arguments(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[fixture]
fn bridge() -> ToolBridge {
    let mut bridge = ToolBridge::new();
    bridge.register(vec![
        ToolSpec::from_definition(&ToolDefinition::new(
            "get_location",
            "Look up a city.",
            json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        ))
        .expect("acyclic schema"),
    ]);
    bridge
}

#[rstest]
fn test_state_transitions(bridge: ToolBridge) {
    assert_eq!(ToolBridge::new().state(), BridgeState::NoTools);
    assert_eq!(bridge.state(), BridgeState::ToolsRegistered);

    bridge.begin();
    assert_eq!(bridge.state(), BridgeState::AwaitingCall);

    let decision = bridge.before_tool_use("get_location", &arguments(json!({"city": "Paris"})));
    assert_eq!(decision, HookDecision::Deny);
    assert_eq!(bridge.state(), BridgeState::CallCaptured);

    let BridgeOutcome::ToolCalls(calls) = bridge.finish() else {
        panic!("a call was captured");
    };
    assert_eq!(bridge.state(), BridgeState::ReturnedToFramework);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "get_location");
    assert_eq!(calls[0].arguments, arguments(json!({"city": "Paris"})));
    assert!(calls[0].call_id.starts_with("call_"));
}

#[rstest]
fn test_calls_are_kept_in_capture_order(bridge: ToolBridge) {
    bridge.begin();
    for city in ["Paris", "Lyon", "Nice"] {
        bridge.before_tool_use("get_location", &arguments(json!({"city": city})));
    }
    let BridgeOutcome::ToolCalls(calls) = bridge.finish() else {
        panic!("calls were captured");
    };
    let cities: Vec<&Value> = calls.iter().map(|c| &c.arguments["city"]).collect();
    assert_eq!(cities, vec![&json!("Paris"), &json!("Lyon"), &json!("Nice")]);
}

#[rstest]
fn test_unregistered_tools_are_allowed(bridge: ToolBridge) {
    bridge.begin();
    assert_eq!(
        bridge.before_tool_use("Read", &arguments(json!({"file_path": "/tmp/x"}))),
        HookDecision::Allow
    );
    assert_eq!(bridge.state(), BridgeState::AwaitingCall);
    assert_eq!(bridge.finish(), BridgeOutcome::Text);
}

#[rstest]
fn test_calls_before_begin_are_not_captured(bridge: ToolBridge) {
    assert_eq!(
        bridge.before_tool_use("get_location", &Map::new()),
        HookDecision::Allow
    );
    assert_eq!(bridge.finish(), BridgeOutcome::Text);
}

#[rstest]
fn test_registering_nothing_keeps_no_tools() {
    let mut bridge = ToolBridge::new();
    bridge.register(Vec::new());
    bridge.begin();
    assert_eq!(bridge.state(), BridgeState::NoTools);
}

#[rstest]
fn test_definition_schema_is_resolved() {
    let spec = ToolSpec::from_definition(&ToolDefinition {
        name: "get_location".to_string(),
        description: None,
        parameters_json_schema: json!({
            "type": "object",
            "properties": {"place": {"$ref": "#/$defs/Place"}},
            "$defs": {"Place": {"type": "object", "properties": {"city": {"type": "string"}}}}
        }),
    })
    .expect("acyclic schema");
    assert_eq!(spec.description, "");
    assert_eq!(
        spec.input_schema["properties"]["place"]["properties"]["city"],
        json!({"type": "string"})
    );
    assert!(spec.input_schema.get("$defs").is_none());
    assert!(spec.input_schema.get("title").is_none());
}

#[rstest]
fn test_cyclic_parameter_schema_is_rejected() {
    let error = ToolSpec::from_definition(&ToolDefinition::new(
        "walk",
        "Walk a tree.",
        json!({"type": "object", "properties": {"next": {"$ref": "#"}}}),
    ))
    .expect_err("cyclic schema");
    assert!(matches!(error, AdapterError::CyclicSchema { .. }));
}
