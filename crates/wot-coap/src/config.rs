use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, ErrorKind, Result};

// Multicast aggregation window.
const DEFAULT_MULTICAST_TIMEOUT: Duration = Duration::from_secs(20);

// Capacity of the bounded discovery channel.
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Default path of the `CoRE` resource discovery.
pub const WELL_KNOWN_CORE: &str = "/.well-known/core";

/// A `DTLS` implementation used to establish pre-shared key security.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtlsBackend {
    /// A lightweight `DTLS` implementation tailored to constrained devices.
    Lightweight,
    /// A general-purpose `TLS`/`DTLS` implementation.
    General,
}

/// The enabled [`DtlsBackend`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DtlsConfig {
    /// Whether the lightweight backend is enabled.
    pub lightweight: bool,
    /// Whether the general-purpose backend is enabled.
    pub general: bool,
}

impl Default for DtlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DtlsConfig {
    /// Creates a [`DtlsConfig`] with every backend enabled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lightweight: true,
            general: true,
        }
    }

    /// Enables or disables the lightweight backend.
    #[must_use]
    pub const fn lightweight(mut self, enabled: bool) -> Self {
        self.lightweight = enabled;
        self
    }

    /// Enables or disables the general-purpose backend.
    #[must_use]
    pub const fn general(mut self, enabled: bool) -> Self {
        self.general = enabled;
        self
    }

    /// Returns the preferred enabled [`DtlsBackend`].
    ///
    /// The lightweight backend is preferred over the general-purpose one.
    #[must_use]
    pub const fn backend(&self) -> Option<DtlsBackend> {
        if self.lightweight {
            Some(DtlsBackend::Lightweight)
        } else if self.general {
            Some(DtlsBackend::General)
        } else {
            None
        }
    }
}

/// The configuration of a [`crate::client::CoapClient`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(deserialize_with = "deserialize_secs")]
    multicast_timeout: Duration,
    channel_capacity: usize,
    dtls: DtlsConfig,
    well_known_core: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Creates a [`ClientConfig`] with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            multicast_timeout: DEFAULT_MULTICAST_TIMEOUT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            dtls: DtlsConfig::new(),
            well_known_core: WELL_KNOWN_CORE.into(),
        }
    }

    /// Parses a [`ClientConfig`] from `JSON`.
    ///
    /// Missing fields take their default values, while the multicast timeout
    /// is expressed in seconds.
    ///
    /// # Errors
    ///
    /// An error is returned for malformed `JSON`, for a document which is
    /// not an object and for invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        // Defaults would otherwise turn an empty sequence into a config.
        if !value.is_object() {
            return Err(Error::new(
                ErrorKind::Config,
                "A client configuration must be a JSON object",
            ));
        }
        Self::deserialize(value)?.validate()
    }

    /// Sets the multicast aggregation window.
    #[must_use]
    pub fn multicast_timeout(mut self, timeout: Duration) -> Self {
        self.multicast_timeout = timeout;
        self
    }

    /// Sets the capacity of the discovery channel.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Sets the enabled `DTLS` backends.
    #[must_use]
    pub fn dtls(mut self, dtls: DtlsConfig) -> Self {
        self.dtls = dtls;
        self
    }

    /// Sets the `CoRE` resource discovery path.
    #[must_use]
    pub fn well_known_core(mut self, path: impl Into<String>) -> Self {
        self.well_known_core = path.into();
        self
    }

    /// Returns the multicast aggregation window.
    #[must_use]
    pub const fn multicast_timeout_value(&self) -> Duration {
        self.multicast_timeout
    }

    /// Returns the capacity of the discovery channel.
    #[must_use]
    pub const fn channel_capacity_value(&self) -> usize {
        self.channel_capacity
    }

    /// Returns the enabled `DTLS` backends.
    #[must_use]
    pub const fn dtls_config(&self) -> DtlsConfig {
        self.dtls
    }

    /// Returns the `CoRE` resource discovery path.
    #[must_use]
    pub fn well_known_core_path(&self) -> &str {
        &self.well_known_core
    }

    fn validate(self) -> Result<Self> {
        if self.channel_capacity == 0 {
            return Err(Error::new(
                ErrorKind::Config,
                "The discovery channel capacity must be greater than zero",
            ));
        }
        if !self.well_known_core.starts_with('/') {
            return Err(Error::new(
                ErrorKind::Config,
                format!(
                    "The discovery path `{}` must be absolute",
                    self.well_known_core
                ),
            ));
        }
        Ok(self)
    }
}

fn deserialize_secs<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::error::ErrorKind;

    use super::{ClientConfig, DtlsBackend, DtlsConfig, WELL_KNOWN_CORE};

    #[test]
    fn default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.multicast_timeout_value(), Duration::from_secs(20));
        assert_eq!(config.channel_capacity_value(), 32);
        assert_eq!(config.dtls_config(), DtlsConfig::new());
        assert_eq!(config.well_known_core_path(), WELL_KNOWN_CORE);
    }

    #[test]
    fn config_from_json() {
        let config = ClientConfig::from_json(
            r#"{
                "multicast_timeout": 1.5,
                "dtls": { "lightweight": false },
                "well_known_core": "/.well-known/wot"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config,
            ClientConfig::new()
                .multicast_timeout(Duration::from_millis(1500))
                .dtls(DtlsConfig::new().lightweight(false))
                .well_known_core("/.well-known/wot")
        );

        assert_eq!(ClientConfig::from_json("{}").unwrap(), ClientConfig::new());
    }

    #[test]
    fn invalid_config() {
        for json in [
            r#"{ "multicast_timeout": -1 }"#,
            r#"{ "channel_capacity": 0 }"#,
            r#"{ "well_known_core": "core" }"#,
            "[]",
            "[20, 32]",
            "null",
            r#""coap""#,
        ] {
            assert_eq!(
                ClientConfig::from_json(json).unwrap_err().kind(),
                ErrorKind::Config,
                "{json}"
            );
        }
    }

    #[test]
    fn dtls_backend_preference() {
        assert_eq!(DtlsConfig::new().backend(), Some(DtlsBackend::Lightweight));
        assert_eq!(
            DtlsConfig::new().lightweight(false).backend(),
            Some(DtlsBackend::General)
        );
        assert_eq!(
            DtlsConfig::new().lightweight(false).general(false).backend(),
            None
        );
    }
}
