use crate::error::{ConfigError, Result};

/// Hands out display ports `base, base + 1, ...` in request order.
///
/// One allocator lives for exactly one resolution pass. Explicit ports never
/// go through it, so they do not shift the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAllocator {
    base: Option<u16>,
    issued: u16,
}

impl PortAllocator {
    pub fn new(base: Option<u16>) -> Self {
        Self { base, issued: 0 }
    }

    /// Number of ports handed out so far.
    pub fn issued(&self) -> u16 {
        self.issued
    }

    /// Next automatic port for `instance`.
    pub fn allocate(&mut self, instance: &str) -> Result<u16> {
        let base = self.base.ok_or_else(|| ConfigError::PortUnresolved {
            instance: instance.to_string(),
        })?;
        let port = base
            .checked_add(self.issued)
            .ok_or_else(|| ConfigError::PortOverflow {
                instance: instance.to_string(),
                base,
                offset: self.issued,
            })?;
        self.issued = self.issued.saturating_add(1);
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_sequentially_from_base() {
        let mut ports = PortAllocator::new(Some(40));
        assert_eq!(ports.allocate("a").unwrap(), 40);
        assert_eq!(ports.allocate("b").unwrap(), 41);
        assert_eq!(ports.allocate("c").unwrap(), 42);
        assert_eq!(ports.issued(), 3);
    }

    #[test]
    fn no_base_is_unresolved() {
        let mut ports = PortAllocator::new(None);
        let err = ports.allocate("web").unwrap_err();
        assert!(
            matches!(err, ConfigError::PortUnresolved { ref instance } if instance == "web"),
            "got: {err}"
        );
        assert_eq!(ports.issued(), 0);
    }

    #[test]
    fn overflow_is_reported() {
        let mut ports = PortAllocator::new(Some(u16::MAX));
        assert_eq!(ports.allocate("a").unwrap(), u16::MAX);
        let err = ports.allocate("b").unwrap_err();
        assert!(matches!(err, ConfigError::PortOverflow { offset: 1, .. }), "got: {err}");
    }
}
