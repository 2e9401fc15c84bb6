//! Cooperative cancellation. Long-running operations check the token at
//! their suspension points (chunk I/O batches, diff events, merge rows) and
//! unwind with `Cancelled`; all mutations go through the root CAS, so a
//! cancelled operation leaves no observable state change.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DoltError, Result};

#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DoltError::Cancelled)
        } else {
            Ok(())
        }
    }
}
