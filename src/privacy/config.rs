//! Startup configuration for the privacy module, supplied as a list of
//! KEY=VALUE flags (e.g. "rpa_timeout=900"). Bad flags are logged and
//! ignored, leaving the default in place.

use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{anyhow, bail, Result};
use log::{error, LevelFilter};

use crate::core::irk::Irk;

/// How to treat a peer address type outside of {Public, Random}
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressTypePolicy {
    /// Reject the request with InvalidParameter
    Strict,
    /// Keep only the low bit of the address type. Legacy behavior of the
    /// remove path, kept for hosts that pass through unvalidated values.
    ReduceModulo2,
}

impl fmt::Display for AddressTypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressTypePolicy::Strict => write!(f, "strict"),
            AddressTypePolicy::ReduceModulo2 => write!(f, "modulo"),
        }
    }
}

impl FromStr for AddressTypePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(AddressTypePolicy::Strict),
            "modulo" => Ok(AddressTypePolicy::ReduceModulo2),
            _ => bail!("expected 'strict' or 'modulo', got {s:?}"),
        }
    }
}

/// Configuration of a PrivacyManager
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivacyConfig {
    /// Seconds between RPA regenerations. Range checked by ensure_started().
    pub rpa_timeout: u16,
    /// Address type handling when removing resolving list entries
    pub remove_address_type_policy: AddressTypePolicy,
    /// The local IRK installed by PrivacyManager::start(). None selects the
    /// built-in default key.
    pub local_irk: Option<Irk>,
    /// Maximum log level, applied by load_config()
    pub log_level: LevelFilter,
}

/// Default RPA regeneration period, in seconds
pub const DEFAULT_RPA_TIMEOUT: u16 = 300;

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            rpa_timeout: DEFAULT_RPA_TIMEOUT,
            remove_address_type_policy: AddressTypePolicy::ReduceModulo2,
            local_irk: None,
            log_level: LevelFilter::Info,
        }
    }
}

impl PrivacyConfig {
    /// Build a config from KEY=VALUE flags, starting from the defaults
    pub fn parse(flags: Vec<String>) -> Self {
        let mut config = Self::default();

        for flag in flags {
            let Some((key, value)) = flag.split_once('=') else {
                error!("Bad flag {}, must be in <FLAG>=<VALUE> format", flag);
                continue;
            };
            if let Err(e) = config.apply(key.trim(), value.trim()) {
                error!("Parse failure on '{}': {}", flag, e);
            }
        }

        config
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "rpa_timeout" => self.rpa_timeout = value.parse()?,
            "remove_address_type_policy" => self.remove_address_type_policy = value.parse()?,
            "local_irk" => {
                self.local_irk = match value {
                    "default" => None,
                    _ => Some(value.parse()?),
                }
            }
            "log_level" => {
                self.log_level =
                    value.parse().map_err(|_| anyhow!("unknown log level {value:?}"))?
            }
            _ => bail!("unknown flag {key:?}"),
        }
        Ok(())
    }

    /// Current values, for diagnostics. The local IRK is never printed.
    pub fn dump(&self) -> BTreeMap<&'static str, String> {
        [
            ("rpa_timeout", self.rpa_timeout.to_string()),
            ("remove_address_type_policy", self.remove_address_type_policy.to_string()),
            (
                "local_irk",
                if self.local_irk.is_some() { "<set>" } else { "default" }.to_string(),
            ),
            ("log_level", self.log_level.to_string()),
        ]
        .into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn flags(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = PrivacyConfig::parse(vec![]);

        assert_eq!(config, PrivacyConfig::default());
        assert_eq!(config.rpa_timeout, 300);
        assert_eq!(config.remove_address_type_policy, AddressTypePolicy::ReduceModulo2);
        assert_eq!(config.local_irk, None);
    }

    #[test]
    fn test_parse_all_flags() {
        let config = PrivacyConfig::parse(flags(&[
            "rpa_timeout=900",
            "remove_address_type_policy=strict",
            "local_irk=11111111111111111111111111111111",
            "log_level=debug",
        ]));

        assert_eq!(config.rpa_timeout, 900);
        assert_eq!(config.remove_address_type_policy, AddressTypePolicy::Strict);
        assert_eq!(config.local_irk, Some(Irk([0x11; 16])));
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_bad_flags_keep_defaults() {
        let config = PrivacyConfig::parse(flags(&[
            "rpa_timeout",
            "rpa_timeout=soon",
            "remove_address_type_policy=lenient",
            "local_irk=1234",
            "unknown_flag=1",
        ]));

        assert_eq!(config, PrivacyConfig::default());
    }

    #[test]
    fn test_out_of_range_timeout_is_accepted_at_parse_time() {
        let config = PrivacyConfig::parse(flags(&["rpa_timeout=0"]));

        assert_eq!(config.rpa_timeout, 0);
    }

    #[test]
    fn test_dump_hides_irk() {
        let config = PrivacyConfig::parse(flags(&["local_irk=11111111111111111111111111111111"]));

        let dump = config.dump();

        assert_eq!(dump["local_irk"], "<set>");
        assert_eq!(dump["rpa_timeout"], "300");
        assert_eq!(dump["remove_address_type_policy"], "modulo");
    }
}
