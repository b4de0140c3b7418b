use std::sync::Arc;

use crate::error::{Result, RouterError};
use crate::receiver::Receiver;

/// Fixed-capacity, insertion-ordered map from magic to receiver.
///
/// Lookup is a linear scan in registration order; with duplicate magics the
/// first registration wins. An optional default receiver catches frames
/// whose magic matched nothing. There is no removal — the registry lives
/// exactly as long as its router.
pub struct Registry {
    entries: Vec<(u32, Arc<dyn Receiver>)>,
    capacity: usize,
    default: Option<Arc<dyn Receiver>>,
}

impl Registry {
    /// Empty registry accepting at most `capacity` receivers.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            default: None,
        }
    }

    /// Register a receiver under its own magic. Fails once full.
    pub fn register(&mut self, receiver: Arc<dyn Receiver>) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(RouterError::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.entries.push((receiver.magic(), receiver));
        Ok(())
    }

    /// Install or clear the fallback for unmatched magics.
    pub fn set_default(&mut self, receiver: Option<Arc<dyn Receiver>>) {
        self.default = receiver;
    }

    /// Resolve a magic to its receiver, falling back to the default.
    pub fn lookup(&self, magic: u32) -> Option<&Arc<dyn Receiver>> {
        self.entries
            .iter()
            .find(|(m, _)| *m == magic)
            .map(|(_, r)| r)
            .or(self.default.as_ref())
    }

    /// Number of registered receivers (default excluded).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered (default excluded).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.len())
            .field("capacity", &self.capacity)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use framelink_wire::FrameHeader;

    use super::*;
    use crate::receiver::{DropReason, Lease};

    struct Tagged {
        magic: u32,
    }

    impl Receiver for Tagged {
        fn magic(&self) -> u32 {
            self.magic
        }
        fn max_len(&self) -> usize {
            64
        }
        fn require_checksum(&self) -> bool {
            false
        }
        fn acquire(&self, _header: &FrameHeader) -> Option<Lease> {
            None
        }
        fn commit(&self, _header: &FrameHeader, _lease: Lease, _len: usize) {}
        fn reject(&self, _header: &FrameHeader, _lease: Option<Lease>, _reason: DropReason) {}
    }

    fn tagged(magic: u32) -> Arc<dyn Receiver> {
        Arc::new(Tagged { magic })
    }

    #[test]
    fn register_then_lookup() {
        let mut registry = Registry::new(4);
        registry.register(tagged(0x1111)).unwrap();
        registry.register(tagged(0x2222)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(0x1111).unwrap().magic(), 0x1111);
        assert_eq!(registry.lookup(0x2222).unwrap().magic(), 0x2222);
        assert!(registry.lookup(0x3333).is_none());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut registry = Registry::new(1);
        registry.register(tagged(1)).unwrap();

        let err = registry.register(tagged(2)).unwrap_err();
        assert!(matches!(err, RouterError::RegistryFull { capacity: 1 }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_magic_first_registration_wins() {
        let first: Arc<dyn Receiver> = Arc::new(Tagged { magic: 7 });
        let mut registry = Registry::new(4);
        registry.register(first.clone()).unwrap();
        registry.register(tagged(7)).unwrap();

        let resolved = registry.lookup(7).unwrap();
        assert!(Arc::ptr_eq(resolved, &first));
    }

    #[test]
    fn default_catches_unmatched_magic() {
        let fallback = tagged(0);
        let mut registry = Registry::new(2);
        registry.register(tagged(1)).unwrap();
        registry.set_default(Some(fallback.clone()));

        assert!(Arc::ptr_eq(registry.lookup(0xFFFF).unwrap(), &fallback));
        assert_eq!(registry.lookup(1).unwrap().magic(), 1);

        registry.set_default(None);
        assert!(registry.lookup(0xFFFF).is_none());
    }

    #[test]
    fn empty_registry_reports_empty() {
        let registry = Registry::new(4);
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }
}
