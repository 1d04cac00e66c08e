use crate::dispatcher::TaskDispatcher;
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type FrameCallback = Arc<dyn Fn() + Send + Sync>;

/// Turns any number of frame requests into at most one outstanding render task.
#[derive(Clone)]
pub struct FrameScheduler {
    dispatcher: TaskDispatcher,
    pending: Arc<AtomicBool>,
    on_frame: FrameCallback,
}

impl FrameScheduler {
    pub fn new<F>(dispatcher: TaskDispatcher, on_frame: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            dispatcher,
            pending: Arc::new(AtomicBool::new(false)),
            on_frame: Arc::new(on_frame),
        }
    }

    pub fn schedule_frame(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }

        let pending = self.pending.clone();
        let on_frame = self.on_frame.clone();
        let submitted = self.dispatcher.try_submit(move || {
            // Cleared first so a frame requested while rendering gets its own task.
            pending.store(false, Ordering::Release);
            on_frame();
        });

        if submitted.is_err() {
            trace!("Dispatcher stopped, frame not scheduled");
            self.pending.store(false, Ordering::Release);
        }
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}
