use crate::dispatcher::DispatchResult;
use crate::event_wait::{EventWait, EventWaker};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// Event source with no native events of its own, so it only wakes on [`EventWaker::post_wake`].
/// Used for headless overlays and in tests.
pub struct CondvarEventWait {
    signal: Arc<WakeSignal>,
}

pub struct CondvarWaker {
    signal: Arc<WakeSignal>,
}

struct WakeSignal {
    /// Sticky until consumed by `wait`, so a wake posted before the loop blocks is not lost.
    pending: Mutex<bool>,
    condvar: Condvar,
}

impl CondvarEventWait {
    pub fn new() -> Self {
        Self {
            signal: Arc::new(WakeSignal {
                pending: Mutex::new(false),
                condvar: Condvar::new(),
            }),
        }
    }
}

impl Default for CondvarEventWait {
    fn default() -> Self {
        Self::new()
    }
}

impl EventWait for CondvarEventWait {
    fn waker(&self) -> Arc<dyn EventWaker> {
        Arc::new(CondvarWaker {
            signal: self.signal.clone(),
        })
    }

    fn wait(&mut self) -> DispatchResult<()> {
        let pending = self
            .signal
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut pending = self
            .signal
            .condvar
            .wait_while(pending, |pending| !*pending)
            .unwrap_or_else(PoisonError::into_inner);
        *pending = false;
        Ok(())
    }
}

impl EventWaker for CondvarWaker {
    fn post_wake(&self) {
        let mut pending = self
            .signal
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *pending = true;
        self.signal.condvar.notify_one();
    }
}
