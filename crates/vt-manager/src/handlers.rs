//! Request handlers.

pub mod health;
pub mod status;
pub mod tasks;

pub use health::*;
pub use status::*;
pub use tasks::*;
