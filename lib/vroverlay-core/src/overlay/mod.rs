pub use content::*;
pub use renderer::*;
pub use state::*;

mod content;
mod renderer;
mod state;
