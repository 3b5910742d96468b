//! Runtime configuration for hosts and transports.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `MPIWORLD_`) or by constructing a custom `MpiConfig`.

use std::time::Duration;

/// Settings shared by the host-call boundary and the network transport.
#[derive(Debug, Clone)]
pub struct MpiConfig {
    /// World size used by `init` when the execution call carries none.
    pub default_world_size: u32,

    /// Name of this host's endpoint; used as the local host id and reported
    /// by `get_processor_name`.
    pub endpoint_host: String,

    /// Largest inbound frame the QUIC transport accepts.
    pub max_message_bytes: usize,

    /// Timeout for establishing a QUIC connection to a peer host.
    pub connect_timeout: Duration,
}

impl Default for MpiConfig {
    fn default() -> Self {
        Self {
            default_world_size: 1,
            endpoint_host: "localhost".to_string(),
            max_message_bytes: 1024 * 1024 * 1024, // 1 GiB
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl MpiConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `MPIWORLD_DEFAULT_WORLD_SIZE`
    /// - `MPIWORLD_ENDPOINT_HOST`
    /// - `MPIWORLD_MAX_MESSAGE_BYTES`
    /// - `MPIWORLD_CONNECT_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(n) = lookup("MPIWORLD_DEFAULT_WORLD_SIZE").and_then(|v| v.parse::<u32>().ok())
        {
            if n > 0 {
                cfg.default_world_size = n;
            }
        }
        if let Some(host) = lookup("MPIWORLD_ENDPOINT_HOST") {
            if !host.is_empty() {
                cfg.endpoint_host = host;
            }
        }
        if let Some(n) = lookup("MPIWORLD_MAX_MESSAGE_BYTES").and_then(|v| v.parse::<usize>().ok())
        {
            cfg.max_message_bytes = n;
        }
        if let Some(s) = lookup("MPIWORLD_CONNECT_TIMEOUT_SECS").and_then(|v| v.parse::<u64>().ok())
        {
            cfg.connect_timeout = Duration::from_secs(s);
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = MpiConfig::default();
        assert_eq!(cfg.default_world_size, 1);
        assert_eq!(cfg.endpoint_host, "localhost");
        assert_eq!(cfg.max_message_bytes, 1 << 30);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let cfg = MpiConfig::from_lookup(lookup_from(&[
            ("MPIWORLD_DEFAULT_WORLD_SIZE", "4"),
            ("MPIWORLD_ENDPOINT_HOST", "worker-3"),
            ("MPIWORLD_MAX_MESSAGE_BYTES", "4096"),
            ("MPIWORLD_CONNECT_TIMEOUT_SECS", "2"),
        ]));
        assert_eq!(cfg.default_world_size, 4);
        assert_eq!(cfg.endpoint_host, "worker-3");
        assert_eq!(cfg.max_message_bytes, 4096);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_garbage_values_fall_back() {
        let cfg = MpiConfig::from_lookup(lookup_from(&[
            ("MPIWORLD_DEFAULT_WORLD_SIZE", "0"),
            ("MPIWORLD_ENDPOINT_HOST", ""),
            ("MPIWORLD_MAX_MESSAGE_BYTES", "lots"),
        ]));
        assert_eq!(cfg.default_world_size, 1);
        assert_eq!(cfg.endpoint_host, "localhost");
        assert_eq!(cfg.max_message_bytes, 1 << 30);
    }
}
