// Batch execution state machine
//
// Enumerated states plus an explicit transition table, driven in-process by
// the orchestrator. Transitions are validated and recorded per batch.

pub mod batch_state_machine;
pub mod errors;
pub mod events;
pub mod states;

pub use batch_state_machine::{BatchStateMachine, StateTransition};
pub use errors::{StateMachineError, StateMachineResult};
pub use events::BatchEvent;
pub use states::BatchState;
