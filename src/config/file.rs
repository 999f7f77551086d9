//! Configuration file loading
//!
//! The document format follows the file extension: `.toml` is TOML, anything
//! else is JSON. All fields are optional; missing ones take their defaults.

use std::path::{Path, PathBuf};

use super::Settings;
use crate::Result;

/// Default config file name looked up in the working directory
pub const DEFAULT_FILE_NAME: &str = "config.json";

/// Read, parse and validate a settings document
///
/// # Errors
///
/// Returns error if the file cannot be read, parsed or validated
pub fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    let settings = parse_settings(&content, is_toml(path))?;
    settings.validate()?;

    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(Settings {
        api_keys: settings.api_keys.clone().with_env(),
        ..settings
    })
}

/// Parse a settings document
///
/// # Errors
///
/// Returns error if the document is malformed
pub fn parse_settings(content: &str, toml: bool) -> Result<Settings> {
    if toml {
        Ok(toml::from_str(content)?)
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"))
}

/// Resolve which config file to use
///
/// Priority: explicit path → `./config.json` → `~/.config/jarvis/config.json`.
/// The XDG path is returned even if it does not exist yet.
#[must_use]
pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    let local = PathBuf::from(DEFAULT_FILE_NAME);
    if local.exists() {
        return local;
    }

    config_file_path().unwrap_or(local)
}

/// Return the user config path: `~/.config/jarvis/config.json`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("jarvis").join(DEFAULT_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_parse_partial_json() {
        let settings = parse_settings(r#"{"wake_words": ["computer"], "sample_rate": 8000}"#, false)
            .unwrap();
        assert_eq!(settings.wake_words, vec!["computer"]);
        assert_eq!(settings.sample_rate, 8000);
        assert_eq!(settings.channels, 1);
    }

    #[test]
    fn test_parse_toml() {
        let doc = r#"
            wake_words = ["friday"]
            ai_provider = "openai"

            [tts]
            provider = "elevenlabs"
            voice = "abc123"

            [integrations.launcher.apps]
            notepad = "notepad.exe"
        "#;
        let settings = parse_settings(doc, true).unwrap();
        assert_eq!(settings.ai_provider, "openai");
        assert_eq!(settings.tts.provider, "elevenlabs");
        assert_eq!(
            settings.integrations.launcher.apps.get("notepad").map(String::as_str),
            Some("notepad.exe")
        );
    }

    #[test]
    fn test_parse_malformed_is_error() {
        assert!(parse_settings("{ not json", false).is_err());
        assert!(matches!(
            parse_settings(r#"{"sample_rate": "fast"}"#, false),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_explicit_path_wins() {
        let path = PathBuf::from("/tmp/custom.toml");
        assert_eq!(resolve_config_path(Some(path.clone())), path);
    }
}
