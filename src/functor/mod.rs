//! Lazy pull-based sequences
//!
//! A `Functor<T>` produces values only when asked. Every transform wraps the
//! parent's pull function in a new one, so nothing runs until the last
//! functor in a chain is pulled.

pub mod advanced;
pub mod core;
pub mod transforms;

pub use self::core::{Functor, Status};
