//! Periodic broadcast scheduler module.
//!
//! Validates destinations and runs one independent send loop per
//! destination, each on its own interval.

mod runner;
mod sender;
mod state;
mod validator;

pub use runner::{DispatchScheduler, SchedulerReport};
pub use sender::{DestinationSender, SenderSettings};
pub use state::{SenderOutcome, SenderState, format_wait};
pub use validator::{ChatValidator, InvalidDestination, InvalidReason, ResolvedTarget};
