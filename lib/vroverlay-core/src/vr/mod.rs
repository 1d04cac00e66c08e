pub use error::*;
pub use overlay::*;
pub use runtime::*;
pub use session::*;
pub use types::*;

mod error;
pub mod mock;
#[cfg(feature = "openvr")]
pub mod openvr;
mod overlay;
mod runtime;
mod session;
mod types;
