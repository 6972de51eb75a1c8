//! Request hygiene helpers shared by the HTTP backend and credential check

use anyhow::{bail, Context, Result};

/// Reject characters that cannot appear in an HTTP header value
pub fn check_header_value(value: &str, field_name: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} cannot be empty", field_name);
    }

    for (index, ch) in value.char_indices() {
        if ch.is_control() {
            bail!(
                "{} contains a control character at position {} ({:#04x})",
                field_name,
                index,
                ch as u32
            );
        }
    }

    Ok(())
}

/// Validate a provider credential and return the `Authorization` value for it
pub fn bearer_token(credential: &str) -> Result<String> {
    let trimmed = credential.trim();

    if trimmed.is_empty() {
        bail!("credential is empty");
    }

    check_header_value(trimmed, "credential")?;

    let header_value = format!("Bearer {}", trimmed);
    header_value
        .parse::<reqwest::header::HeaderValue>()
        .with_context(|| {
            format!(
                "credential does not form a valid Authorization header ({} characters)",
                trimmed.len()
            )
        })?;

    Ok(header_value)
}

/// Normalize a base URL: trimmed, http(s) only, no trailing slash
pub fn normalize_base_url(url: &str, field_name: &str) -> Result<String> {
    let trimmed = url.trim();

    if trimmed.is_empty() {
        bail!("{} cannot be empty", field_name);
    }

    // Percent-encoded separators mean the value was encoded twice somewhere upstream
    if trimmed.contains("%2F") || trimmed.contains("%3D") || trimmed.contains("%20") {
        bail!("{} appears to be URL-encoded: {}", field_name, trimmed);
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        bail!(
            "{} must start with 'http://' or 'https://'. Got: {}",
            field_name,
            trimmed
        );
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Join a normalized base URL and an API path
pub fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
