use core::fmt;
use std::sync::Arc;

use rand::Rng;

/// Identifies one running process to the coordination service.
///
/// Generated ids combine the host name, the process id and 64 random bits,
/// so two processes (or two lifetimes of the same process) never share one.
/// Instance ids are not persisted: a restarted process leases its machine bit
/// afresh.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(Arc<str>);

impl InstanceId {
    /// Wraps an explicit identifier, for hosts that already own a stable,
    /// unique name (e.g. a pod name).
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into()))
    }

    /// Generates a process-unique identifier.
    pub fn generate() -> Self {
        let host = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| String::from("localhost"));
        let nonce: u64 = rand::rng().random();
        Self::new(format!("{host}:{}:{nonce:016x}", std::process::id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = InstanceId::generate();
        let b = InstanceId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().contains(&std::process::id().to_string()));
    }
}
