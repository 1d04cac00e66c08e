pub use condvar::*;

mod condvar;

use crate::dispatcher::DispatchResult;
use cfg_if::cfg_if;
use std::sync::Arc;

cfg_if! {
    if #[cfg(any(
        target_os = "windows",
        target_os = "macos",
        target_os = "android",
        target_os = "linux",
        target_os = "dragonfly",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))] {
        mod winit_wait;
        pub use winit_wait::*;
    }
}

/// The half of a native event source that may be used from any thread.
pub trait EventWaker: Send + Sync {
    /// Causes a blocked (or the next) [`EventWait::wait`] call to return promptly.
    fn post_wake(&self);
}

/// The waiting half of a native event source. Only the loop thread calls [`wait`](Self::wait).
pub trait EventWait {
    fn waker(&self) -> Arc<dyn EventWaker>;

    /// Blocks until a native event arrives or a wake is posted. An error means the event
    /// source is unusable and is fatal to the loop.
    fn wait(&mut self) -> DispatchResult<()>;
}
