//! Shared helpers for resolving configuration at command startup.

use anyhow::{bail, Context, Result};
use memovox_core::settings::API_KEY_ENV_VAR;
use memovox_core::Settings;

/// Resolve the API credential: environment first, interactive prompt
/// otherwise. The key is never written to disk.
pub fn resolve_api_key() -> Result<String> {
    if let Some(key) = Settings::api_key_from_env() {
        return Ok(key);
    }

    eprintln!("No {API_KEY_ENV_VAR} set; the key is kept in memory for this run only.");
    let key: String = dialoguer::Password::new()
        .with_prompt("API key")
        .interact()
        .context("Failed to read API key")?;
    let key = key.trim().to_string();
    if key.is_empty() {
        bail!(
            "An API key is required. Set the {API_KEY_ENV_VAR} environment variable \
             (a .env file works too) or enter one at the prompt."
        );
    }
    Ok(key)
}

/// Format a duration as `mm:ss` for the recording timer.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn elapsed_formats_as_minutes_and_seconds() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "00:59");
        assert_eq!(format_elapsed(Duration::from_secs(61)), "01:01");
        assert_eq!(format_elapsed(Duration::from_secs(600)), "10:00");
    }
}
