// host.rs - Known RADIUS peers and their shared secrets.
//
// Grounded in original_source/pyrad2/server.py's `hosts` dict (name/address
// -> `RemoteHost`) and in the teacher's `config.rs` server-config pattern of
// a `Vec` of declared peers turned into a lookup map at startup. Reads
// dominate writes heavily once a server is running, so the registry is
// `RwLock`-guarded rather than `Mutex`-guarded.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::RwLock;

use crate::error::{RadiusError, Result};

/// A single configured RADIUS peer: the address it sends from, the secret
/// shared with it, and the ports it expects replies/requests on.
#[derive(Debug, Clone)]
pub struct RemoteHost {
    pub address: IpAddr,
    pub secret: Vec<u8>,
    pub name: String,
    pub auth_port: u16,
    pub acct_port: u16,
    pub coa_port: u16,
}

impl RemoteHost {
    pub fn new(name: impl Into<String>, address: IpAddr, secret: impl Into<Vec<u8>>) -> Self {
        RemoteHost {
            address,
            secret: secret.into(),
            name: name.into(),
            auth_port: 1812,
            acct_port: 1813,
            coa_port: 3799,
        }
    }
}

/// Lookup table of known peers, keyed by source address. A server consults
/// this on every received datagram to find the shared secret to verify and
/// reply with; an unknown source address is always rejected (RFC 2865 §3:
/// "Access-Request packets ... from unexpected sources ... MUST be
/// silently discarded").
#[derive(Debug, Default)]
pub struct HostRegistry {
    by_address: RwLock<HashMap<IpAddr, RemoteHost>>,
}

impl HostRegistry {
    pub fn new() -> Self {
        HostRegistry {
            by_address: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_hosts(hosts: impl IntoIterator<Item = RemoteHost>) -> Self {
        let registry = Self::new();
        for host in hosts {
            registry.insert(host);
        }
        registry
    }

    pub fn insert(&self, host: RemoteHost) {
        self.by_address
            .write()
            .expect("host registry lock poisoned")
            .insert(host.address, host);
    }

    pub fn remove(&self, address: &IpAddr) {
        self.by_address
            .write()
            .expect("host registry lock poisoned")
            .remove(address);
    }

    pub fn get(&self, address: &IpAddr) -> Option<RemoteHost> {
        self.by_address
            .read()
            .expect("host registry lock poisoned")
            .get(address)
            .cloned()
    }

    pub fn require(&self, address: &IpAddr) -> Result<RemoteHost> {
        self.get(address)
            .ok_or_else(|| RadiusError::Authorization(*address))
    }

    pub fn len(&self) -> usize {
        self.by_address.read().expect("host registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn known_hosts_resolve_and_unknown_hosts_are_rejected() {
        let addr: IpAddr = Ipv4Addr::new(10, 0, 0, 1).into();
        let registry = HostRegistry::from_hosts([RemoteHost::new("nas1", addr, b"secret".to_vec())]);

        assert!(registry.require(&addr).is_ok());

        let other: IpAddr = Ipv4Addr::new(10, 0, 0, 2).into();
        assert!(matches!(registry.require(&other), Err(RadiusError::Authorization(_))));
    }
}
