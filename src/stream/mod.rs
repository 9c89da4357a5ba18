//! Push/pull streams
//!
//! `Stream<T>` is a lazily activated, single-threaded stream built on a
//! pluggable `Source`. Consumers pull with `shift`; producers push and the
//! stream notifies its listeners, which pull in turn.

pub mod clock;
pub mod constructors;
pub mod core;
pub mod derived;
pub mod rate;
pub mod select;
pub mod source;
pub mod tee;

pub use self::clock::Frame;
pub use self::core::{Handle, ListenerId, Pull, Stream};
pub use self::select::{combine, merge};
pub use self::source::{BufferSource, Control, Source, StopRequest};
