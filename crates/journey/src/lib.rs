//! Journey tracking — one customer's traversal of one campaign/flow
//! instance, with conversion attribution decided by the campaign's anchor.

pub mod state_machine;
pub mod tracker;
pub mod types;

pub use state_machine::JourneyStateMachine;
pub use tracker::JourneyTracker;
pub use types::{Journey, JourneyState};
