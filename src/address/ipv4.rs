//! IPv4 address, network and mask parsing.

use ahash::AHashMap;
use ipnet::Ipv4Net;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use super::number::string_to_number;
use crate::error::{Error, Result};

/// Name services used to resolve network and host names.
pub trait Resolver {
    /// Look up a named network (as listed in `/etc/networks`).
    fn network_by_name(&self, name: &str) -> Option<Ipv4Addr>;

    /// Look up a host name; may yield several addresses.
    ///
    /// Returns `None` when the name does not resolve to any IPv4 address.
    fn host_by_name(&self, name: &str) -> Option<Vec<Ipv4Addr>>;
}

/// Resolver backed by the system name services.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    networks_file: PathBuf,
}

impl SystemResolver {
    /// Create a resolver reading networks from `/etc/networks`.
    pub fn new() -> Self {
        Self::with_networks_file("/etc/networks")
    }

    /// Create a resolver reading networks from another file.
    pub fn with_networks_file(path: impl AsRef<Path>) -> Self {
        Self {
            networks_file: path.as_ref().to_path_buf(),
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for SystemResolver {
    fn network_by_name(&self, name: &str) -> Option<Ipv4Addr> {
        let content = fs::read_to_string(&self.networks_file).ok()?;
        lookup_network(&content, name)
    }

    fn host_by_name(&self, name: &str) -> Option<Vec<Ipv4Addr>> {
        let addrs = match (name, 0u16).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                log::debug!("host lookup for `{}' failed: {}", name, e);
                return None;
            }
        };
        let v4: Vec<Ipv4Addr> = addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(v4) => Some(*v4.ip()),
                SocketAddr::V6(_) => None,
            })
            .collect();
        (!v4.is_empty()).then_some(v4)
    }
}

/// Find `name` in the text of a networks database.
///
/// Network numbers are read the way `inet_network` does: the parts are
/// right-aligned, so `10.1` is `0.0.10.1`.
fn lookup_network(content: &str, name: &str) -> Option<Ipv4Addr> {
    for line in content.lines() {
        let line = match line.find('#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut fields = line.split_whitespace();
        let (Some(net_name), Some(number)) = (fields.next(), fields.next()) else {
            continue;
        };
        let aliases: Vec<&str> = fields.collect();
        if net_name != name && !aliases.contains(&name) {
            continue;
        }

        let mut value: u32 = 0;
        for part in number.split('.') {
            let byte = string_to_number(part, 0, 255)? as u32;
            value = (value << 8) | byte;
        }
        return Some(Ipv4Addr::from(value));
    }
    None
}

/// In-memory resolver with fixed tables.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    networks: AHashMap<String, Ipv4Addr>,
    hosts: AHashMap<String, Vec<Ipv4Addr>>,
}

impl StaticResolver {
    /// Create an empty resolver; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named network.
    pub fn with_network(mut self, name: &str, addr: Ipv4Addr) -> Self {
        self.networks.insert(name.to_string(), addr);
        self
    }

    /// Register a host and the addresses it resolves to, in order.
    pub fn with_host(mut self, name: &str, addrs: &[Ipv4Addr]) -> Self {
        self.hosts.insert(name.to_string(), addrs.to_vec());
        self
    }
}

impl Resolver for StaticResolver {
    fn network_by_name(&self, name: &str) -> Option<Ipv4Addr> {
        self.networks.get(name).copied()
    }

    fn host_by_name(&self, name: &str) -> Option<Vec<Ipv4Addr>> {
        self.hosts.get(name).filter(|addrs| !addrs.is_empty()).cloned()
    }
}

/// A resolved address specification: one or more addresses under a mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    /// Masked, de-duplicated addresses (never empty)
    pub addrs: Vec<Ipv4Addr>,
    /// Mask applied to every address
    pub mask: Ipv4Addr,
}

impl HostSpec {
    /// The match-anything specification `0.0.0.0/0`.
    pub fn any() -> Self {
        Self {
            addrs: vec![Ipv4Addr::UNSPECIFIED],
            mask: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Number of distinct addresses.
    pub fn count(&self) -> usize {
        self.addrs.len()
    }
}

/// Parse exactly four dot-separated octets, each with base-0 rules.
pub fn dotted_to_addr(dotted: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = dotted.split('.');
    for octet in octets.iter_mut() {
        *octet = string_to_number(parts.next()?, 0, 255)? as u8;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

/// Resolve a dotted quad, a network name or a host name, in that order.
pub fn parse_hostnetwork(name: &str, resolver: &dyn Resolver) -> Result<Vec<Ipv4Addr>> {
    if let Some(addr) = dotted_to_addr(name).or_else(|| resolver.network_by_name(name)) {
        return Ok(vec![addr]);
    }
    if let Some(addrs) = resolver.host_by_name(name) {
        return Ok(addrs);
    }
    Err(Error::param(format!("host/network `{}' not found", name)))
}

/// Parse a mask: a dotted quad, a prefix length 0-32, or absent (/32).
pub fn parse_mask(mask: Option<&str>) -> Result<Ipv4Addr> {
    let Some(mask) = mask else {
        return Ok(Ipv4Addr::BROADCAST);
    };
    if let Some(addr) = dotted_to_addr(mask) {
        return Ok(addr);
    }
    let bits = string_to_number(mask, 0, 32)
        .ok_or_else(|| Error::param(format!("invalid mask `{}' specified", mask)))?;
    prefix_to_mask(bits as u8)
}

/// Netmask with the top `bits` bits set.
pub fn prefix_to_mask(bits: u8) -> Result<Ipv4Addr> {
    Ipv4Net::new(Ipv4Addr::UNSPECIFIED, bits)
        .map(|net| net.netmask())
        .map_err(|_| Error::param(format!("invalid mask `{}' specified", bits)))
}

/// Parse `host[/mask]` into its canonical, minimal address set.
///
/// Every address is ANDed with the mask and duplicates are dropped,
/// keeping first-seen order. A zero mask ignores the host part and
/// yields `0.0.0.0/0`.
pub fn parse_hostnetworkmask(name: &str, resolver: &dyn Resolver) -> Result<HostSpec> {
    let (host, mask) = match name.rfind('/') {
        Some(idx) => (&name[..idx], parse_mask(Some(&name[idx + 1..]))?),
        None => (name, parse_mask(None)?),
    };

    let host = if mask.is_unspecified() { "0.0.0.0" } else { host };
    let resolved = parse_hostnetwork(host, resolver)?;

    let mask_bits = u32::from(mask);
    let mut addrs: Vec<Ipv4Addr> = Vec::with_capacity(resolved.len());
    for addr in resolved {
        let masked = Ipv4Addr::from(u32::from(addr) & mask_bits);
        if !addrs.contains(&masked) {
            addrs.push(masked);
        }
    }

    Ok(HostSpec { addrs, mask })
}
