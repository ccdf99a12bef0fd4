use std::{io, net::Ipv4Addr};

use sweep_model::HostInfo;
use tracing::debug;

const UNKNOWN: &str = "unknown";

/// Hostname of this machine, `"unknown"` when it cannot be resolved.
pub fn hostname_or_unknown() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Probe hostname and addresses.
///
/// Any lookup failure yields [`HostInfo::unknown`].
pub fn host_info() -> HostInfo {
    let name = hostname::get().ok().and_then(|h| h.into_string().ok());
    describe_host(name, ipv4_addresses())
}

fn describe_host(name: Option<String>, addresses: io::Result<Vec<Ipv4Addr>>) -> HostInfo {
    let Some(name) = name else {
        debug!("hostname lookup failed");
        return HostInfo::unknown();
    };
    match addresses {
        Ok(addrs) => HostInfo::new(name, addrs),
        Err(e) => {
            debug!(error = %e, "interface enumeration failed");
            HostInfo::unknown()
        }
    }
}

/// Non-loopback IPv4 addresses of interfaces that are up.
#[cfg(unix)]
pub fn ipv4_addresses() -> io::Result<Vec<Ipv4Addr>> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();

    // SAFETY: `head` is a valid out pointer; the list is released with `freeifaddrs` below.
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut out = Vec::new();
    let mut cur = head;
    while !cur.is_null() {
        // SAFETY: `cur` points into the list returned by `getifaddrs` and is not yet freed.
        let entry = unsafe { &*cur };
        cur = entry.ifa_next;

        let flags = entry.ifa_flags as libc::c_int;
        if flags & libc::IFF_UP == 0 || flags & libc::IFF_LOOPBACK != 0 {
            continue;
        }
        if entry.ifa_addr.is_null() {
            continue;
        }
        // SAFETY: `ifa_addr` is non-null and always points to at least a `sockaddr`.
        let family = unsafe { (*entry.ifa_addr).sa_family } as libc::c_int;
        if family != libc::AF_INET {
            continue;
        }
        // SAFETY: family is AF_INET, so the address is a `sockaddr_in`.
        let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
        let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
        if !ip.is_loopback() && !out.contains(&ip) {
            out.push(ip);
        }
    }

    // SAFETY: `head` came from a successful `getifaddrs` call.
    unsafe { libc::freeifaddrs(head) };
    Ok(out)
}

#[cfg(not(unix))]
pub fn ipv4_addresses() -> io::Result<Vec<Ipv4Addr>> {
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_lookup_failure_is_unknown_host() {
        let enumeration_failed = describe_host(
            Some("node-1".into()),
            Err(io::Error::other("getifaddrs failed")),
        );
        assert_eq!(enumeration_failed, HostInfo::unknown());
        assert_eq!(enumeration_failed.to_string(), "Unknown host");

        let no_hostname = describe_host(None, Ok(vec![Ipv4Addr::new(10, 0, 0, 5)]));
        assert_eq!(no_hostname, HostInfo::unknown());
    }

    #[test]
    fn resolved_host_keeps_addresses() {
        let info = describe_host(Some("node-1".into()), Ok(vec![Ipv4Addr::new(10, 0, 0, 5)]));
        assert_eq!(info.to_string(), "Host: node-1\nIP(s): 10.0.0.5");
    }

    #[test]
    fn addresses_exclude_loopback() {
        let addrs = ipv4_addresses().unwrap_or_default();
        assert!(addrs.iter().all(|ip| !ip.is_loopback()));
    }

    #[test]
    fn hostname_never_empty() {
        assert!(!hostname_or_unknown().is_empty());
    }
}
