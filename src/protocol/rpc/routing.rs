//! Server address discovery and per-call address selection.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use async_trait::async_trait;
use smallvec::SmallVec;
use tracing::debug;

/// Finds the addresses a server can be reached at.
#[async_trait]
pub trait AddressDiscovery: Send + Sync {
    async fn discover(&self, server: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolves the server name once through the system resolver and keeps every
/// distinct address it returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsDiscovery;

#[async_trait]
impl AddressDiscovery for DnsDiscovery {
    async fn discover(&self, server: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs: Vec<IpAddr> =
            tokio::net::lookup_host((server, port)).await?.map(|addr| addr.ip()).collect();
        debug!("{server} resolved to {addrs:?}");
        Ok(addrs)
    }
}

/// Immutable set of server addresses. Replaced as a whole when the port of
/// a dispatcher changes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AddressPool {
    addrs: SmallVec<[IpAddr; 4]>,
}

impl AddressPool {
    /// Keeps the first occurrence of every address.
    pub fn new(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut unique: SmallVec<[IpAddr; 4]> = SmallVec::new();
        for addr in addrs {
            if !unique.contains(&addr) {
                unique.push(addr);
            }
        }
        Self { addrs: unique }
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// Address for `key`: a pure function of the key and the pool contents.
    pub fn pick(&self, key: u64) -> Option<IpAddr> {
        if self.addrs.is_empty() {
            return None;
        }
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.addrs.len() as u64) as usize;
        Some(self.addrs[index])
    }
}
