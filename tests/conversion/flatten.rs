use bytes::Bytes;
use cc_bridge::{
    conversion::{AttachmentSpec, flatten},
    error::AdapterError,
    models::{ContentItem, MessagePart},
};
use insta::assert_snapshot;
use rstest::rstest;
use serde_json::json;

#[rstest]
fn test_system_parts_are_joined_in_order() {
    let history = vec![
        MessagePart::system("You are terse."),
        MessagePart::user("hello"),
        MessagePart::system("Answer in French."),
    ];
    let flattened = flatten(&history).expect("history has user content");
    assert_eq!(flattened.system, "You are terse.\nAnswer in French.");
}

#[rstest]
fn test_only_latest_user_content_is_sent() {
    let history = vec![
        MessagePart::user("first question"),
        MessagePart::ModelText {
            text: "first answer".to_string(),
        },
        MessagePart::user("What is 2+2?"),
    ];
    let flattened = flatten(&history).expect("history has user content");
    assert_eq!(flattened.system, "");
    assert_eq!(flattened.user_text, "What is 2+2?");
    assert!(flattened.attachments.is_empty());
}

#[rstest]
fn test_mixed_items_split_into_text_and_attachments() {
    let history = vec![MessagePart::user_items(vec![
        ContentItem::text("Describe this picture."),
        ContentItem::image(Bytes::from_static(b"\x89PNG"), "image/png"),
        ContentItem::text("Then this one."),
        ContentItem::ImageUrl {
            url: "https://example.com/cat.jpg".to_string(),
        },
    ])];
    let flattened = flatten(&history).expect("history has user content");
    assert_eq!(
        flattened.user_text,
        "Describe this picture.\nThen this one."
    );
    assert_eq!(
        flattened.attachments,
        vec![
            AttachmentSpec::Inline {
                data: Bytes::from_static(b"\x89PNG"),
                media_type: "image/png".to_string(),
            },
            AttachmentSpec::Url("https://example.com/cat.jpg".to_string()),
        ]
    );
}

#[rstest]
fn test_trailing_tool_results_are_appended() {
    let history = vec![
        MessagePart::user("Where is the Louvre?"),
        MessagePart::ToolCall {
            tool_name: "get_location".to_string(),
            call_id: "call_1".to_string(),
            arguments: serde_json::Map::new(),
        },
        MessagePart::tool_result("get_location", "call_1", "  Paris, France \n"),
        MessagePart::tool_result("get_weather", "call_2", json!({"temp_c": 18})),
    ];
    let flattened = flatten(&history).expect("history has user content");
    assert_snapshot!(flattened.user_text, @r#"
    Where is the Louvre?

    <function_results>
    <result name="get_location" call_id="call_1">
    Paris, France
    </result>
    <result name="get_weather" call_id="call_2">
    {"temp_c":18}
    </result>
    </function_results>
    "#);
}

#[rstest]
fn test_tool_results_before_latest_user_are_dropped() {
    let history = vec![
        MessagePart::user("old"),
        MessagePart::tool_result("get_location", "call_1", "Paris"),
        MessagePart::user("new"),
    ];
    let flattened = flatten(&history).expect("history has user content");
    assert_eq!(flattened.user_text, "new");
}

#[rstest]
#[case::empty(vec![])]
#[case::system_only(vec![MessagePart::system("be nice")])]
#[case::model_only(vec![MessagePart::ModelText { text: "hi".to_string() }])]
fn test_history_without_user_content_is_malformed(#[case] history: Vec<MessagePart>) {
    let error = flatten(&history).expect_err("no user content");
    assert!(matches!(error, AdapterError::MalformedHistory(_)));
    assert!(!error.is_retryable());
}

#[rstest]
fn test_request_json_decodes_base64_images() {
    let request: cc_bridge::models::ModelRequest = serde_json::from_value(json!({
        "messages": [
            {"kind": "system_instruction", "text": "Describe images."},
            {"kind": "user_content", "content": [
                {"type": "text", "text": "What is this?"},
                {"type": "image", "media_type": "image/png", "data": "aGVsbG8="}
            ]}
        ]
    }))
    .expect("valid request JSON");
    assert!(request.has_attachments());

    let flattened = flatten(&request.messages).expect("history has user content");
    assert_eq!(
        flattened.attachments,
        vec![AttachmentSpec::Inline {
            data: Bytes::from_static(b"hello"),
            media_type: "image/png".to_string(),
        }]
    );
}
