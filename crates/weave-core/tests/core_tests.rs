use weave_core::{ChatMessage, Role, WeaveError, validate_roles};

#[test]
fn chat_message_constructors_set_role() {
    let sys = ChatMessage::system("be terse");
    let usr = ChatMessage::user("hi");
    let asst = ChatMessage::assistant("hello");
    assert_eq!(sys.role, Role::System);
    assert_eq!(usr.role, Role::User);
    assert_eq!(asst.role, Role::Assistant);
}

#[test]
fn chat_message_serde_roundtrip() {
    let msg = ChatMessage::user("test message");
    let json = serde_json::to_string(&msg).unwrap();
    let restored: ChatMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.role, Role::User);
    assert_eq!(restored.content, "test message");
}

#[test]
fn validate_roles_allows_one_leading_system_message() {
    let msgs = vec![
        ChatMessage::system("sys"),
        ChatMessage::user("a"),
        ChatMessage::assistant("b"),
        ChatMessage::user("c"),
    ];
    assert!(validate_roles(&msgs).is_ok());
}

#[test]
fn validate_roles_rejects_second_system_message() {
    let msgs = vec![
        ChatMessage::system("sys"),
        ChatMessage::user("a"),
        ChatMessage::system("injected"),
    ];
    assert!(validate_roles(&msgs).is_err());
}

#[test]
fn validate_roles_rejects_empty() {
    assert!(validate_roles(&[]).is_err());
}

#[test]
fn wire_status_maps_oom_and_timeout_to_500() {
    assert_eq!(WeaveError::OutOfMemory.wire_status(), 500);
    assert_eq!(WeaveError::ConnectionTimeout.wire_status(), 500);
    assert_eq!(WeaveError::Internal("x".into()).wire_status(), 500);
}

#[test]
fn wire_status_maps_protocol_errors_to_400() {
    assert_eq!(WeaveError::InvalidMagic.wire_status(), 400);
    assert_eq!(WeaveError::InvalidPrompt.wire_status(), 400);
    assert_eq!(WeaveError::Truncated.wire_status(), 400);
}
