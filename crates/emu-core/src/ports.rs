//! I/O port registration.
//!
//! Z80 machines decode ports partially and several devices may want the same
//! address. A `PortMap` routes a 16-bit port to one registered device:
//! exact-match entries win over the single wildcard (catch-all) entry.

use std::collections::HashMap;

/// Port-to-device routing table.
#[derive(Debug, Clone)]
pub struct PortMap<T> {
    exact: HashMap<u16, T>,
    wildcard: Option<T>,
}

impl<T> PortMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            exact: HashMap::new(),
            wildcard: None,
        }
    }

    /// Claim a single port. Returns the previous owner, if any.
    pub fn register(&mut self, port: u16, device: T) -> Option<T> {
        self.exact.insert(port, device)
    }

    /// Claim every port nobody claimed exactly. Returns the previous
    /// wildcard owner, if any.
    pub fn register_wildcard(&mut self, device: T) -> Option<T> {
        self.wildcard.replace(device)
    }

    /// Release a port.
    pub fn unregister(&mut self, port: u16) -> Option<T> {
        self.exact.remove(&port)
    }

    /// Who answers on this port?
    #[must_use]
    pub fn resolve(&self, port: u16) -> Option<&T> {
        self.exact.get(&port).or(self.wildcard.as_ref())
    }

    pub fn resolve_mut(&mut self, port: u16) -> Option<&mut T> {
        match self.exact.get_mut(&port) {
            Some(device) => Some(device),
            None => self.wildcard.as_mut(),
        }
    }

    /// Is this port claimed by an exact entry?
    #[must_use]
    pub fn is_registered(&self, port: u16) -> bool {
        self.exact.contains_key(&port)
    }
}

impl<T> Default for PortMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
