use anyhow::{Result, anyhow};

/// Sanity checks on a device token before it costs a gateway call. Tokens are
/// opaque, so only reject what can never be valid.
pub fn validate_push_token(token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(anyhow!("Device token cannot be empty"));
    }

    if token.len() > 4096 {
        return Err(anyhow!("Device token too long (maximum 4096 characters)"));
    }

    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(anyhow!("Device token contains invalid characters"));
    }

    Ok(())
}
