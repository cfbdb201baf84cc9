// State machine module for dispatch attempts
//
// Each (resource, destination) send walks Pending -> Sending -> Sent, or
// through Failed / RetryScheduled until it is Sent or FailedPermanent.

pub mod dispatch_state_machine;
pub mod errors;
pub mod events;
pub mod states;

// Re-export main types for convenient access
pub use dispatch_state_machine::DispatchAttempt;
pub use errors::{StateMachineError, StateMachineResult};
pub use events::DispatchEvent;
pub use states::DispatchState;
