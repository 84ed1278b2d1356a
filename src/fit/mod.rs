//! The per-cell FORC distribution fit.

pub mod engine;
pub mod window;

pub use engine::*;
pub use window::*;
