//! Request handlers.

pub mod health;
pub mod process;

pub use health::*;
pub use process::*;
