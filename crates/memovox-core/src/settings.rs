//! Persisted configuration.
//!
//! Stored as JSON in the platform config directory. The API credential is
//! deliberately not part of this file: it lives in the environment (or an
//! interactive prompt) and is only ever held in memory.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable holding the API credential.
pub const API_KEY_ENV_VAR: &str = "MEMOVOX_API_KEY";

/// Environment variable overriding the configured endpoint.
pub const ENDPOINT_ENV_VAR: &str = "MEMOVOX_ENDPOINT";

const DEFAULT_ENDPOINT: &str = "http://localhost:3001/api/transcribe";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Transcription proxy endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Input device name (None = system default).
    #[serde(default)]
    pub device: Option<String>,

    /// Language hint forwarded with each transcription request.
    #[serde(default)]
    pub language: Option<String>,

    /// Copy each transcript to the clipboard automatically.
    #[serde(default = "default_true")]
    pub copy_to_clipboard: bool,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            device: None,
            language: None,
            copy_to_clipboard: true,
        }
    }
}

impl Settings {
    /// Load settings, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Load from an explicit path (used by tests).
    pub fn load_from(path: &std::path::Path) -> Self {
        match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                crate::verbose!("settings: unreadable file, using defaults: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = Self::config_path() else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no config directory on this platform",
            ));
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// The endpoint to dispatch to, honoring the env override.
    pub fn endpoint(&self) -> String {
        std::env::var(ENDPOINT_ENV_VAR).unwrap_or_else(|_| self.endpoint.clone())
    }

    /// The credential from the environment, if set to something non-empty.
    pub fn api_key_from_env() -> Option<String> {
        std::env::var(API_KEY_ENV_VAR)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }

    fn config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("memovox").join("settings.json"))
    }
}
