//! Cooperative run cancellation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{Result, SyncError};

/// Shared flag checked between stages and between publisher operations
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled {
                stage: stage.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check("analyze").is_ok());

        other.cancel();

        assert!(flag.is_cancelled());
        assert!(matches!(
            flag.check("publish"),
            Err(SyncError::Cancelled { stage }) if stage == "publish"
        ));
    }
}
