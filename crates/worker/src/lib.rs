//! Worker primitives for background parse execution.
//!
//! Blocking tasks are classified with [`TaskClass`] for observability and run
//! on the ambient tokio runtime, falling back to a shared global runtime when called
//! from plain threads. [`CancelSignal`] carries cooperative cancellation into
//! blocking work.

mod class;
mod spawn;
mod token;

pub use class::TaskClass;
pub use spawn::spawn_blocking;
pub use token::CancelSignal;
