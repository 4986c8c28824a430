//! Session configuration parsed from `.toml` files.
//!
//! ```toml
//! warnings-as-errors = true
//! disabled-passes = ["module-uniqueness"]
//! ```

use std::{path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pass::Pass;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SessionConfig {
    /// Reports with [`Severity::Warning`](crate::report::Severity::Warning)
    /// are recorded as errors, and so fail the pass that produced them.
    #[serde(default)]
    pub warnings_as_errors: bool,
    /// Passes that never run. Every pass depending on one of these is
    /// disabled as well.
    #[serde(default)]
    pub disabled_passes: Vec<Pass>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file_contents = std::fs::read_to_string(&path)?;
        let config = file_contents.parse()?;
        Ok(config)
    }

    pub fn is_disabled(&self, pass: Pass) -> bool {
        self.disabled_passes.contains(&pass)
    }
}

impl FromStr for SessionConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SessionConfig};
    use crate::pass::Pass;

    #[test]
    fn empty_config_is_default() {
        let config: SessionConfig = "".parse().unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let config: SessionConfig = r#"
            warnings-as-errors = true
            disabled-passes = ["module-uniqueness", "assignment-check"]
        "#
        .parse()
        .unwrap();

        assert!(config.warnings_as_errors);
        assert!(config.is_disabled(Pass::ModuleUniqueness));
        assert!(config.is_disabled(Pass::AssignmentCheck));
        assert!(!config.is_disabled(Pass::TypeInference));
    }

    #[test]
    fn unknown_pass_is_rejected() {
        let result = r#"disabled-passes = ["codegen"]"#.parse::<SessionConfig>();
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = SessionConfig::load("/nonexistent/kodept.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
