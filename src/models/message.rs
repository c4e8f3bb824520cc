use std::collections::HashMap;

use anyhow::{Error, Result, anyhow};
use serde::Deserialize;
use serde_json::Value as JsonValue;

const DEFAULT_TITLE: &str = "New Notification";
const DEFAULT_PRIORITY: i32 = 1;

/// Canonical shape every inbound payload is resolved into before the
/// pipeline touches it. `notification_id` doubles as the idempotency key.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    pub notification_id: String,
    pub user_id: String,
    pub push_token: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub link: Option<String>,
    pub data: Option<HashMap<String, JsonValue>>,
    pub priority: i32,
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FlatMessage {
    #[serde(default)]
    notification_id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    push_token: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    data: Option<HashMap<String, JsonValue>>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TemplatedMessage {
    #[serde(default)]
    notification_id: String,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    metadata: Option<HashMap<String, JsonValue>>,
    #[serde(default)]
    template: TemplatePayload,
    #[serde(default)]
    variables: HashMap<String, JsonValue>,
    #[serde(default)]
    delivery: DeliveryPayload,
}

#[derive(Debug, Default, Deserialize)]
struct TemplatePayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeliveryPayload {
    #[serde(default)]
    push_token: Option<String>,
}

impl NotificationRequest {
    /// Resolve either inbound shape into the canonical request.
    ///
    /// A payload carrying a `template` or `delivery` object is treated as the
    /// templated form; anything else is the flat compatibility form.
    pub fn from_value(value: &JsonValue) -> Result<Self, Error> {
        if value.get("template").is_some() || value.get("delivery").is_some() {
            let message: TemplatedMessage = serde_json::from_value(value.clone())
                .map_err(|e| anyhow!("Malformed templated payload: {}", e))?;
            Self::from_templated(message)
        } else {
            let message: FlatMessage = serde_json::from_value(value.clone())
                .map_err(|e| anyhow!("Malformed notification payload: {}", e))?;
            Self::from_flat(message)
        }
    }

    fn from_flat(message: FlatMessage) -> Result<Self, Error> {
        if message.notification_id.is_empty() {
            return Err(anyhow!("notification_id is required"));
        }
        if message.user_id.is_empty() {
            return Err(anyhow!("user_id is required"));
        }
        if message.push_token.is_empty() {
            return Err(anyhow!("push_token is required"));
        }

        Ok(Self {
            notification_id: message.notification_id,
            user_id: message.user_id,
            push_token: message.push_token,
            title: message.title,
            body: message.body,
            image: message.image,
            link: message.link,
            data: message.data,
            priority: message.priority.unwrap_or(DEFAULT_PRIORITY),
            request_id: message.request_id,
        })
    }

    fn from_templated(message: TemplatedMessage) -> Result<Self, Error> {
        if message.notification_id.is_empty() {
            return Err(anyhow!("notification_id is required"));
        }
        if message.user_id.is_empty() {
            return Err(anyhow!("user_id is required"));
        }

        let push_token = message
            .delivery
            .push_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("push_token is required in delivery object"))?;

        let mut title = message
            .template
            .title
            .or(message.template.subject)
            .unwrap_or_default();
        let mut body = strip_tags(&message.template.body.unwrap_or_default());

        // Only string-valued variables are substituted; anything else leaves
        // the placeholder untouched.
        for (key, value) in &message.variables {
            if let JsonValue::String(replacement) = value {
                let placeholder = format!("{{{{{}}}}}", key);
                title = title.replace(&placeholder, replacement);
                body = body.replace(&placeholder, replacement);
            }
        }

        if title.is_empty() {
            title = DEFAULT_TITLE.to_string();
        }

        let link = message
            .variables
            .get("link")
            .and_then(|value| value.as_str())
            .map(str::to_string);

        Ok(Self {
            notification_id: message.notification_id,
            user_id: message.user_id,
            push_token,
            title,
            body,
            image: message.template.image,
            link,
            data: message.metadata,
            priority: message.priority.unwrap_or(DEFAULT_PRIORITY),
            request_id: message.request_id,
        })
    }
}

/// Drop `<...>` tag segments, keeping the text between them.
fn strip_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => output.push(c),
            _ => {}
        }
    }

    output
}
