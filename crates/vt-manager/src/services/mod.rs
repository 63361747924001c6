//! Background services.

pub mod tidier;

pub use tidier::{Tidier, TidierConfig};
