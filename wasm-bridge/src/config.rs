// Adapter configuration: the compiler version stamped into every request and
// the synthetic name the source text is staged under.

use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

pub const DEFAULT_VERSION_MAJOR: u16 = 1;
pub const DEFAULT_VERSION_MINOR: u8 = 1;
pub const DEFAULT_VERSION_MICRO: u8 = 0;

/// Fixed path of the staged source file.
pub const DEFAULT_SOURCE_NAME: &str = "index.capnp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerVersion {
    pub major: u16,
    pub minor: u8,
    pub micro: u8,
}

impl Default for CompilerVersion {
    fn default() -> Self {
        Self {
            major: DEFAULT_VERSION_MAJOR,
            minor: DEFAULT_VERSION_MINOR,
            micro: DEFAULT_VERSION_MICRO,
        }
    }
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)
    }
}

impl FromStr for CompilerVersion {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BridgeError::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        let micro = parts.next().and_then(|p| p.parse().ok()).ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { major, minor, micro })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub version: CompilerVersion,
    pub source_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CompilerVersion::default(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn with_version(mut self, version: CompilerVersion) -> Self {
        self.version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_parses_and_prints() {
        let version: CompilerVersion = "2.0.13".parse().unwrap();
        assert_eq!(version, CompilerVersion { major: 2, minor: 0, micro: 13 });
        assert_eq!(version.to_string(), "2.0.13");
    }

    #[test]
    fn version_rejects_bad_input() {
        assert!("1.2".parse::<CompilerVersion>().is_err());
        assert!("1.2.3.4".parse::<CompilerVersion>().is_err());
        assert!("1.300.0".parse::<CompilerVersion>().is_err());
        assert!("one.two.three".parse::<CompilerVersion>().is_err());
    }

    #[test]
    fn defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.source_name, "index.capnp");
        assert_eq!(config.version.to_string(), "1.1.0");
    }
}
