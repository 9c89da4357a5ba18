//! Lazy pull-based sequences and push/pull reactive streams
//!
//! Two layers:
//!
//! - [`Functor`]: a single-consumer lazy sequence. Values are computed only
//!   when `shift` pulls them, and transforms compose by wrapping pulls.
//! - [`Stream`]: a `Source` behind a replaceable slot, with push, multicast
//!   notification and a one-way lifecycle. Combinators (tee, merge, combine,
//!   throttle, choke, clock) are sources built on other streams.
//!
//! Everything is single-threaded. Deferred work runs through the per-thread
//! tick queue in [`tick`]; timed sources ask a [`Scheduler`] for frames.

pub mod completion;
pub mod error;
pub mod functor;
pub mod observe;
pub mod scheduler;
pub mod stream;
pub mod stream_configuration;
pub mod tick;

pub use completion::{Completion, Done};
pub use error::{StreamError, StreamResult};
pub use functor::{Functor, Status};
pub use observe::{PathObserver, Unobserve};
pub use scheduler::{clock_now, ManualScheduler, RequestId, Scheduler, StreamTimer, Timer};
pub use stream::{combine, merge, Frame, Handle, ListenerId, Pull, Stream};
pub use stream_configuration::{BufferConfig, ClockConfig};
