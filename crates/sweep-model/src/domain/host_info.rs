use std::{fmt, net::Ipv4Addr};

use serde::{Deserialize, Serialize};

const UNKNOWN_HOST: &str = "Unknown host";

/// Best-effort description of the host a run executed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    /// Hostname, `None` when it could not be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Non-loopback IPv4 addresses of interfaces that are up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<Ipv4Addr>,
}

impl HostInfo {
    pub fn new(hostname: impl Into<String>, addresses: Vec<Ipv4Addr>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            addresses,
        }
    }

    /// Placeholder used when the hostname lookup failed.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.hostname.is_some()
    }

    /// Comma separated address list, empty when no address was found.
    pub fn addresses_joined(&self) -> String {
        self.addresses
            .iter()
            .map(Ipv4Addr::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for HostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hostname {
            Some(name) => write!(f, "Host: {}\nIP(s): {}", name, self.addresses_joined()),
            None => f.write_str(UNKNOWN_HOST),
        }
    }
}
