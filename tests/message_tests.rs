use anyhow::Result;
use push_relay::models::message::NotificationRequest;
use serde_json::json;

/// Test: The flat payload shape parses directly into a request
#[test]
fn test_flat_payload_parses() -> Result<()> {
    let value = json!({
        "notification_id": "n1",
        "user_id": "u1",
        "push_token": "t1",
        "title": "Hi",
        "body": "there",
        "link": "https://example.com/a",
        "request_id": "r1"
    });

    let request = NotificationRequest::from_value(&value)?;

    assert_eq!(request.notification_id, "n1");
    assert_eq!(request.user_id, "u1");
    assert_eq!(request.push_token, "t1");
    assert_eq!(request.title, "Hi");
    assert_eq!(request.body, "there");
    assert_eq!(request.link.as_deref(), Some("https://example.com/a"));
    assert_eq!(request.request_id.as_deref(), Some("r1"));
    assert_eq!(request.priority, 1, "Priority defaults to 1");

    Ok(())
}

/// Test: Templated payloads substitute string variables into title and body
#[test]
fn test_templated_variable_substitution() -> Result<()> {
    let value = json!({
        "notification_id": "n2",
        "user_id": "u1",
        "template": {
            "title": "Order {{order_id}}",
            "body": "Hello {{name}}, your order {{order_id}} shipped"
        },
        "variables": { "name": "Ada", "order_id": "42" },
        "delivery": { "push_token": "t1" }
    });

    let request = NotificationRequest::from_value(&value)?;

    assert_eq!(request.title, "Order 42");
    assert_eq!(request.body, "Hello Ada, your order 42 shipped");

    Ok(())
}

/// Test: HTML tags are stripped from the template body before substitution
#[test]
fn test_template_body_tags_stripped() -> Result<()> {
    let value = json!({
        "notification_id": "n3",
        "user_id": "u1",
        "template": {
            "title": "Hi",
            "body": "<p>Hello <b>{{name}}</b></p>"
        },
        "variables": { "name": "Ada" },
        "delivery": { "push_token": "t1" }
    });

    let request = NotificationRequest::from_value(&value)?;

    assert_eq!(request.body, "Hello Ada");

    Ok(())
}

/// Test: The title falls back to the subject, then to the stock default
#[test]
fn test_title_fallback_chain() -> Result<()> {
    let from_subject = NotificationRequest::from_value(&json!({
        "notification_id": "n4",
        "user_id": "u1",
        "template": { "subject": "Weekly digest", "body": "b" },
        "variables": {},
        "delivery": { "push_token": "t1" }
    }))?;
    assert_eq!(from_subject.title, "Weekly digest");

    let defaulted = NotificationRequest::from_value(&json!({
        "notification_id": "n5",
        "user_id": "u1",
        "template": { "body": "b" },
        "variables": {},
        "delivery": { "push_token": "t1" }
    }))?;
    assert_eq!(defaulted.title, "New Notification");

    Ok(())
}

/// Test: The link comes from the variables, absent when not provided
#[test]
fn test_link_from_variables() -> Result<()> {
    let with_link = NotificationRequest::from_value(&json!({
        "notification_id": "n6",
        "user_id": "u1",
        "template": { "title": "t", "body": "b" },
        "variables": { "link": "https://example.com/x" },
        "delivery": { "push_token": "t1" }
    }))?;
    assert_eq!(with_link.link.as_deref(), Some("https://example.com/x"));

    let without_link = NotificationRequest::from_value(&json!({
        "notification_id": "n7",
        "user_id": "u1",
        "template": { "title": "t", "body": "b" },
        "variables": {},
        "delivery": { "push_token": "t1" }
    }))?;
    assert!(without_link.link.is_none());

    Ok(())
}

/// Test: Non-string variables leave their placeholders untouched
#[test]
fn test_non_string_variables_left_literal() -> Result<()> {
    let value = json!({
        "notification_id": "n8",
        "user_id": "u1",
        "template": { "title": "t", "body": "Count: {{count}}" },
        "variables": { "count": 3 },
        "delivery": { "push_token": "t1" }
    });

    let request = NotificationRequest::from_value(&value)?;

    assert_eq!(request.body, "Count: {{count}}");

    Ok(())
}

/// Test: Required identifiers are enforced on both payload shapes
#[test]
fn test_required_fields_enforced() {
    let missing_id = NotificationRequest::from_value(&json!({
        "user_id": "u1",
        "push_token": "t1"
    }));
    assert!(missing_id.is_err(), "notification_id is required");

    let missing_token = NotificationRequest::from_value(&json!({
        "notification_id": "n9",
        "user_id": "u1"
    }));
    assert!(missing_token.is_err(), "push_token is required");

    let empty_templated_token = NotificationRequest::from_value(&json!({
        "notification_id": "n10",
        "user_id": "u1",
        "template": { "title": "t", "body": "b" },
        "variables": {},
        "delivery": { "push_token": "" }
    }));
    assert!(
        empty_templated_token.is_err(),
        "Empty delivery token is rejected"
    );
}
