//! Status source identification.
//!
//! A status source is addressed by `host:port`. The configured form may carry
//! a display alias: `host:port->alias`.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between a machine address and its display alias.
pub const ALIAS_SEPARATOR: &str = "->";

/// Identity of a status source (`host:port`).
///
/// Validated on construction; the set of identities is fixed once the hub
/// is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Parse and validate a `host:port` address.
    pub fn parse(address: &str) -> Result<Self> {
        let address = address.trim();
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| CoreError::InvalidAddress(format!("{address}: missing port")))?;

        if host.is_empty() {
            return Err(CoreError::InvalidAddress(format!("{address}: empty host")));
        }
        if address.contains('/') || address.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidAddress(format!(
                "{address}: expected host:port without scheme or path"
            )));
        }
        port.parse::<u16>()
            .map_err(|_| CoreError::InvalidAddress(format!("{address}: invalid port '{port}'")))?;

        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SourceId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SourceId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

/// A configured machine: source identity plus display alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineSpec {
    /// Source identity.
    pub id: SourceId,
    /// Display name for viewers. Defaults to the identity.
    pub alias: String,
}

impl MachineSpec {
    /// Parse `host:port` or `host:port->alias`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.split(ALIAS_SEPARATOR);
        let address = parts.next().unwrap_or_default();
        let alias = parts.next().map(str::trim);

        if parts.next().is_some() {
            return Err(CoreError::InvalidMachineSpec(format!(
                "{spec}: more than one '{ALIAS_SEPARATOR}'"
            )));
        }

        let id = SourceId::parse(address)?;
        let alias = match alias {
            Some("") => {
                return Err(CoreError::InvalidMachineSpec(format!("{spec}: empty alias")));
            }
            Some(alias) => alias.to_string(),
            None => id.to_string(),
        };

        Ok(Self { id, alias })
    }
}

impl FromStr for MachineSpec {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_parse() {
        let id = SourceId::parse("gpu-01:9200").unwrap();
        assert_eq!(id.as_str(), "gpu-01:9200");
        assert_eq!(id.to_string(), "gpu-01:9200");

        let id = SourceId::parse("  10.0.0.5:9200 ").unwrap();
        assert_eq!(id.as_str(), "10.0.0.5:9200");
    }

    #[test]
    fn test_source_id_rejects_malformed() {
        assert!(SourceId::parse("gpu-01").is_err());
        assert!(SourceId::parse(":9200").is_err());
        assert!(SourceId::parse("gpu-01:http").is_err());
        assert!(SourceId::parse("gpu-01:70000").is_err());
        assert!(SourceId::parse("ws://gpu-01:9200").is_err());
        assert!(SourceId::parse("gpu-01:9200/ws").is_err());
    }

    #[test]
    fn test_machine_spec_without_alias() {
        let spec = MachineSpec::parse("gpu-01:9200").unwrap();
        assert_eq!(spec.id.as_str(), "gpu-01:9200");
        assert_eq!(spec.alias, "gpu-01:9200");
    }

    #[test]
    fn test_machine_spec_with_alias() {
        let spec: MachineSpec = "gpu-01:9200->Training box".parse().unwrap();
        assert_eq!(spec.id.as_str(), "gpu-01:9200");
        assert_eq!(spec.alias, "Training box");
    }

    #[test]
    fn test_machine_spec_rejects_bad_alias() {
        assert!(MachineSpec::parse("gpu-01:9200->").is_err());
        assert!(MachineSpec::parse("gpu-01:9200->a->b").is_err());
    }

    #[test]
    fn test_source_id_serde() {
        let id: SourceId = serde_json::from_str("\"gpu-01:9200\"").unwrap();
        assert_eq!(id.as_str(), "gpu-01:9200");
        assert!(serde_json::from_str::<SourceId>("\"gpu-01\"").is_err());
    }
}
