//! Endpoint configuration from the environment.
//!
//! Settings come from environment variables, optionally seeded from a
//! `.env` file (`KEY=VALUE` lines, `#` comments, blank lines, optional
//! single or double quotes). The file never overwrites a variable already
//! present in the environment. Missing required variables fail before any
//! network activity.

use std::collections::HashMap;
use std::path::Path;

use crate::errors::ConfigError;

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

/// Credentials and endpoint identity for the chat-completion collaborator.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingVar` for any absent required variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };
        Ok(Self {
            endpoint: required(ENV_ENDPOINT)?,
            api_key: required(ENV_API_KEY)?,
            deployment: required(ENV_DEPLOYMENT)?,
            api_version: lookup(ENV_API_VERSION)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        })
    }

    /// Seed the environment from `.env` in the working directory (when
    /// present), then read settings.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new(".env");
        if path.exists() {
            load_env_file(path)?;
        }
        Self::from_env()
    }
}

/// Parse a `KEY=VALUE` env file. A leading byte-order mark is stripped so
/// the first key survives files saved as UTF-8-with-BOM.
fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for raw_line in contents.trim_start_matches('\u{feff}').lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || !line.contains('=') {
            continue;
        }

        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        let key = key.trim();
        let mut value = value.trim();

        if key.is_empty() {
            continue;
        }

        if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value = &value[1..value.len() - 1];
        }

        vars.insert(key.to_string(), value.to_string());
    }
    vars
}

/// Load a `KEY=VALUE` file into the process environment without
/// overwriting variables that are already set.
pub fn load_env_file(path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    for (key, value) in parse_env_file(&contents) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, &value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_env_file_basics() {
        let vars = parse_env_file(
            "# comment\n\
             \n\
             PLAIN=value\n\
             QUOTED=\"with spaces\"\n\
             SINGLE='single'\n\
             no_equals_line\n\
             SPACED =  padded  \n",
        );
        assert_eq!(vars["PLAIN"], "value");
        assert_eq!(vars["QUOTED"], "with spaces");
        assert_eq!(vars["SINGLE"], "single");
        assert_eq!(vars["SPACED"], "padded");
        assert!(!vars.contains_key("no_equals_line"));
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn test_parse_env_file_keeps_embedded_equals() {
        let vars = parse_env_file("URL=https://host/path?a=b\n");
        assert_eq!(vars["URL"], "https://host/path?a=b");
    }

    #[test]
    fn test_load_env_file_does_not_overwrite() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "STARBRIDGE_TEST_PRESET=from_file").unwrap();
        writeln!(file, "STARBRIDGE_TEST_FRESH=loaded").unwrap();

        std::env::set_var("STARBRIDGE_TEST_PRESET", "from_env");
        std::env::remove_var("STARBRIDGE_TEST_FRESH");

        load_env_file(file.path()).unwrap();

        assert_eq!(
            std::env::var("STARBRIDGE_TEST_PRESET").unwrap(),
            "from_env"
        );
        assert_eq!(std::env::var("STARBRIDGE_TEST_FRESH").unwrap(), "loaded");

        std::env::remove_var("STARBRIDGE_TEST_PRESET");
        std::env::remove_var("STARBRIDGE_TEST_FRESH");
    }

    #[test]
    fn test_parse_env_file_strips_leading_bom() {
        let vars = parse_env_file("\u{feff}FIRST=one\nSECOND=two\n");
        assert_eq!(vars["FIRST"], "one");
        assert_eq!(vars["SECOND"], "two");
    }

    #[test]
    fn test_missing_variable_is_reported() {
        let err = Settings::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ENV_ENDPOINT)));
    }

    #[test]
    fn test_api_version_defaults_when_absent() {
        let settings = Settings::from_lookup(|name| match name {
            ENV_ENDPOINT => Some("https://res.openai.azure.com".to_string()),
            ENV_API_KEY => Some("k".to_string()),
            ENV_DEPLOYMENT => Some("gpt-4o".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert_eq!(settings.deployment, "gpt-4o");
    }
}
