pub mod app;
pub mod config;
pub mod dispatcher;
pub mod event_wait;
pub mod frame_scheduler;
pub mod loop_bound;
pub mod overlay;
pub mod paths;
pub mod vr;

pub use app::{OverlayAppHandle, OverlayApplication};
pub use config::{Config, ConfigError};
pub use dispatcher::{DispatchError, DispatchResult, Task, TaskDispatcher};
pub use frame_scheduler::FrameScheduler;
pub use loop_bound::LoopBound;

use crate::vr::VrError;
use thiserror::Error;

pub fn version() -> &'static str {
    option_env!("VERSION").unwrap_or("v0.0.0-dev")
}

#[derive(Debug, Error)]
pub enum VrOverlayFatalError {
    #[error("{0}")]
    Error(String),
    #[error(transparent)]
    Vr(#[from] VrError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type VrOverlayResult<T> = Result<T, VrOverlayFatalError>;

impl From<&str> for VrOverlayFatalError {
    fn from(value: &str) -> Self {
        VrOverlayFatalError::Error(value.to_owned())
    }
}

impl From<String> for VrOverlayFatalError {
    fn from(error: String) -> Self {
        VrOverlayFatalError::Error(error)
    }
}
