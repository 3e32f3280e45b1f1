use crate::{
    error::{Error, Result},
    intra_process::IntraProcessManager,
};
use std::sync::{
    Arc, RwLock,
    atomic::{AtomicU64, Ordering},
};
use tracing::info;

static NEXT_ENDPOINT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-wide endpoint id.
pub(crate) fn next_endpoint_id() -> u64 {
    NEXT_ENDPOINT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The execution context shared by the nodes of a process.
///
/// It owns the [`IntraProcessManager`]. Endpoints only keep weak
/// references to the manager, so [`shutdown`](Self::shutdown) really
/// tears it down; any endpoint still using it afterwards reports an
/// [`Error::IntraProcessLifecycle`].
#[derive(Debug)]
pub struct Context {
    intra_process_manager: RwLock<Option<Arc<IntraProcessManager>>>,
}

impl Context {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            intra_process_manager: RwLock::new(Some(Arc::new(IntraProcessManager::new()))),
        })
    }

    /// Get the intra-process manager of this context.
    pub fn intra_process_manager(&self) -> Result<Arc<IntraProcessManager>> {
        self.intra_process_manager
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(Error::IntraProcessLifecycle {
                operation: "manager lookup",
            })
    }

    /// Whether the context has not been shut down.
    pub fn is_valid(&self) -> bool {
        self.intra_process_manager
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Release the intra-process manager.
    pub fn shutdown(&self) {
        let released = self
            .intra_process_manager
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if released.is_some() {
            info!("Context shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_releases_manager() {
        let context = Context::new();
        let weak = Arc::downgrade(&context.intra_process_manager().unwrap());
        assert!(weak.upgrade().is_some());

        context.shutdown();
        assert!(!context.is_valid());
        assert!(weak.upgrade().is_none());
        assert!(matches!(
            context.intra_process_manager(),
            Err(Error::IntraProcessLifecycle { .. })
        ));
    }

    #[test]
    fn test_endpoint_ids_increase() {
        let a = next_endpoint_id();
        let b = next_endpoint_id();
        assert!(b > a);
    }
}
