//! Agent turn runner, approval coordinator, and active-run registry
//! (§4.4–§4.6).

pub mod active_runs;
pub mod approval;
pub mod turn;

pub use active_runs::{ActiveRuns, CancelToken};
pub use approval::{ApprovalCoordinator, ApprovalInfo};
pub use turn::{run_turn, EventSink, TurnInput, MAX_TURN_LOOPS};
