//! Path observer boundary
//!
//! Streams can be fed by anything that reports value changes at a property
//! path. Path syntax and change detection belong to the implementor; the
//! stream only needs a callback and a way to stop listening.

/// Stops a registered observation
pub type Unobserve = Box<dyn FnOnce()>;

/// Reports the value at a path whenever it changes.
///
/// The callback receives `None` when the path does not resolve.
pub trait PathObserver<V> {
    fn observe(&self, path: &str, callback: Box<dyn FnMut(Option<V>)>) -> Unobserve;
}
