use std::collections::BTreeMap;

use lightsweeper_serial::SerialLink;
use tracing::debug;

use crate::error::{FloorError, Result};

/// Open serial links, keyed by port name.
///
/// Owned by [`Discovery`](crate::Discovery) while the floor is being found,
/// then handed to whoever builds tile proxies. Every proxy on a port holds
/// a clone of the same link.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    links: BTreeMap<String, SerialLink>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a link, replacing (and closing) any previous one with the same name.
    pub fn insert(&mut self, link: SerialLink) {
        let name = link.name();
        if let Some(old) = self.links.insert(name.clone(), link) {
            debug!(port = %name, "replacing registered link");
            old.close();
        }
    }

    pub fn get(&self, name: &str) -> Option<&SerialLink> {
        self.links.get(name)
    }

    /// Like [`get`](Self::get), but an absent link is an error.
    pub fn require(&self, name: &str) -> Result<SerialLink> {
        self.links
            .get(name)
            .cloned()
            .ok_or_else(|| FloorError::UnknownChannel(name.to_string()))
    }

    /// Close and forget a link.
    pub fn remove(&mut self, name: &str) -> Option<SerialLink> {
        let link = self.links.remove(name)?;
        link.close();
        Some(link)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.links.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Close every link.
    pub fn close_all(&mut self) {
        for (name, link) in std::mem::take(&mut self.links) {
            debug!(port = %name, "closing link");
            link.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lightsweeper_serial::LinkConfig;
    use lightsweeper_tile::SimulatedBus;

    fn link(name: &str) -> SerialLink {
        let (bus, _handle) = SimulatedBus::new(name);
        SerialLink::new(Box::new(bus), LinkConfig::default())
    }

    #[test]
    fn require_unknown_channel() {
        let registry = ChannelRegistry::new();
        assert!(matches!(
            registry.require("COM9"),
            Err(FloorError::UnknownChannel(name)) if name == "COM9"
        ));
    }

    #[test]
    fn replacing_closes_the_old_link() {
        let mut registry = ChannelRegistry::new();
        let first = link("sim0");
        registry.insert(first.clone());
        registry.insert(link("sim0"));
        assert!(!first.is_open());
        assert_eq!(registry.len(), 1);
        assert!(registry.require("sim0").unwrap().is_open());
    }

    #[test]
    fn close_all_empties() {
        let mut registry = ChannelRegistry::new();
        let a = link("a");
        registry.insert(a.clone());
        registry.insert(link("b"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        registry.close_all();
        assert!(registry.is_empty());
        assert!(!a.is_open());
    }
}
