//! Build mode for production/development builds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::pipeline::PipelineError;

/// Build context selecting which stages run.
///
/// Chosen once at process start and passed explicitly from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Environment variable consulted at startup.
    pub const ENV_VAR: &'static str = "ASSETLINE_MODE";

    pub const ALL: [Self; 2] = [Self::Development, Self::Production];

    #[inline]
    pub const fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }

    /// Pick the mode from, in order: CLI flag, environment value, config.
    ///
    /// An unrecognised value at any level is an error rather than a silent
    /// fallback to the next one.
    pub fn resolve(
        cli: Option<&str>,
        env: Option<&str>,
        config: Option<Self>,
    ) -> Result<Self, PipelineError> {
        if let Some(value) = cli {
            return value.parse();
        }
        if let Some(value) = env.filter(|v| !v.trim().is_empty()) {
            return value.parse();
        }
        Ok(config.unwrap_or(Self::Production))
    }
}

impl FromStr for BuildMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(PipelineError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for BuildMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for BuildMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("development".parse(), Ok(BuildMode::Development));
        assert_eq!("dev".parse(), Ok(BuildMode::Development));
        assert_eq!("production".parse(), Ok(BuildMode::Production));
        assert_eq!(" prod ".parse(), Ok(BuildMode::Production));
        assert_eq!(
            "Production".parse::<BuildMode>(),
            Err(PipelineError::InvalidMode("Production".into()))
        );
        assert_eq!(
            "staging".parse::<BuildMode>(),
            Err(PipelineError::InvalidMode("staging".into()))
        );
    }

    #[test]
    fn test_resolve_precedence() {
        use BuildMode::*;
        assert_eq!(BuildMode::resolve(None, None, None), Ok(Production));
        assert_eq!(BuildMode::resolve(None, None, Some(Development)), Ok(Development));
        assert_eq!(
            BuildMode::resolve(None, Some("production"), Some(Development)),
            Ok(Production)
        );
        assert_eq!(
            BuildMode::resolve(Some("dev"), Some("production"), None),
            Ok(Development)
        );
        // Empty env value is treated as unset
        assert_eq!(BuildMode::resolve(None, Some(""), Some(Development)), Ok(Development));
        assert!(matches!(
            BuildMode::resolve(None, Some("test"), None),
            Err(PipelineError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_serde() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: BuildMode,
        }
        let w: Wrapper = toml::from_str(r#"mode = "dev""#).unwrap();
        assert_eq!(w.mode, BuildMode::Development);
        assert!(toml::from_str::<Wrapper>(r#"mode = "fast""#).is_err());
        assert_eq!(serde_json::to_string(&BuildMode::Production).unwrap(), "\"production\"");
    }
}
