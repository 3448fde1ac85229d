//! Component identity and failure reasons.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque identity of a process component, unique within this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a process is being rolled back.
///
/// Created where the failure happens and passed upward unchanged. The cause is
/// shared so the reason stays cheap to clone for every listener.
#[derive(Debug, Clone)]
pub struct RollbackReason {
    origin: ComponentId,
    message: String,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl RollbackReason {
    pub fn new(origin: ComponentId, message: impl Into<String>) -> Self {
        Self {
            origin,
            message: message.into(),
            cause: None,
        }
    }

    /// Attach the error that triggered this failure.
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// The component that failed.
    pub fn origin(&self) -> ComponentId {
        self.origin
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl std::fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (component {})", self.message, self.origin)?;
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl StdError for RollbackReason {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ComponentId::next();
        let b = ComponentId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn reason_keeps_origin_and_cause() {
        let origin = ComponentId::next();
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let reason = RollbackReason::new(origin, "metadata not persisted").with_cause(io);

        assert_eq!(reason.origin(), origin);
        assert_eq!(reason.message(), "metadata not persisted");
        assert!(reason.cause().is_some());
        assert!(reason.to_string().contains("disk full"));
        assert!(StdError::source(&reason).is_some());
    }

    #[test]
    fn clones_share_the_cause() {
        let reason = RollbackReason::new(ComponentId::next(), "boom")
            .with_cause(std::fmt::Error);
        let copy = reason.clone();
        assert_eq!(copy.to_string(), reason.to_string());
    }
}
