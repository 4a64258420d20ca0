mod account;
mod state;

pub use account::{Account, Transcript, WorkerReport};
pub use state::{RewardDecision, State, StateMachine, StepOutcome};
