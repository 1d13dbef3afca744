//! Target expansion: a targets file or CIDR range becomes the ordered,
//! de-duplicated set of host identifiers to retrieve.

use std::collections::BTreeSet;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ipnetwork::IpNetwork;
use thiserror::Error;

use crate::record::HostIdentifier;

/// Smallest IPv4 prefix accepted (a /16 is 65536 addresses).
pub const MIN_IPV4_PREFIX: u8 = 16;
/// Smallest IPv6 prefix accepted, bounding expansion the same way.
pub const MIN_IPV6_PREFIX: u8 = 112;

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("cannot read targets file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid network '{entry}': {reason}")]
    InvalidNetwork { entry: String, reason: String },

    #[error("network '{entry}' is too large (prefix must be at least /{min})")]
    NetworkTooLarge { entry: String, min: u8 },

    #[error("line {line}: '{entry}' is not an IP address, network or hostname")]
    InvalidEntry { line: usize, entry: String },
}

/// Every address of a CIDR network, bounded by [`MIN_IPV4_PREFIX`] /
/// [`MIN_IPV6_PREFIX`].
pub fn expand_network(cidr: &str) -> Result<Vec<HostIdentifier>, TargetError> {
    let network = IpNetwork::from_str(cidr.trim()).map_err(|e| TargetError::InvalidNetwork {
        entry: cidr.to_string(),
        reason: e.to_string(),
    })?;

    let min = match network {
        IpNetwork::V4(_) => MIN_IPV4_PREFIX,
        IpNetwork::V6(_) => MIN_IPV6_PREFIX,
    };
    if network.prefix() < min {
        return Err(TargetError::NetworkTooLarge {
            entry: cidr.to_string(),
            min,
        });
    }

    Ok(network.iter().map(HostIdentifier::from).collect())
}

/// Resolve a hostname through the system resolver, keeping IPv4 results.
pub fn resolve_system(hostname: &str) -> io::Result<Vec<IpAddr>> {
    Ok((hostname, 0)
        .to_socket_addrs()?
        .map(|addr| addr.ip())
        .filter(IpAddr::is_ipv4)
        .collect())
}

/// Parse targets text using the system resolver for hostnames.
pub fn parse_targets(text: &str) -> Result<BTreeSet<HostIdentifier>, TargetError> {
    parse_targets_with(text, resolve_system)
}

/// Parse targets text: one IP, CIDR network or hostname per line. Blank
/// lines and `#` comments are skipped. Hostnames that fail to resolve are
/// logged and skipped.
pub fn parse_targets_with<R>(text: &str, mut resolve: R) -> Result<BTreeSet<HostIdentifier>, TargetError>
where
    R: FnMut(&str) -> io::Result<Vec<IpAddr>>,
{
    let mut targets = BTreeSet::new();

    for (index, raw) in text.lines().enumerate() {
        let entry = raw.split('#').next().unwrap_or_default().trim();
        if entry.is_empty() {
            continue;
        }

        if let Ok(ip) = IpAddr::from_str(entry) {
            targets.insert(HostIdentifier::from(ip));
        } else if entry.contains('/') {
            targets.extend(expand_network(entry)?);
        } else if is_hostname(entry) {
            tracing::info!(hostname = entry, "resolving");
            match resolve(entry) {
                Ok(ips) if !ips.is_empty() => {
                    tracing::debug!(hostname = entry, count = ips.len(), "resolved");
                    targets.extend(ips.into_iter().map(HostIdentifier::from));
                }
                Ok(_) => tracing::warn!(hostname = entry, "no IPv4 addresses, skipping"),
                Err(e) => tracing::warn!(hostname = entry, error = %e, "resolution failed, skipping"),
            }
        } else {
            return Err(TargetError::InvalidEntry {
                line: index + 1,
                entry: entry.to_string(),
            });
        }
    }

    Ok(targets)
}

/// Read and parse a targets file.
pub fn read_targets_file(path: &Path) -> Result<BTreeSet<HostIdentifier>, TargetError> {
    let text = std::fs::read_to_string(path).map_err(|source| TargetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_targets(&text)
}

fn is_hostname(entry: &str) -> bool {
    entry.len() <= 253
        && entry
            .split('.')
            .all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && !label.starts_with('-')
                    && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
}
