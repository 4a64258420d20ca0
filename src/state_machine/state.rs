use std::fmt;

/// Pending value at or above which a node's reward is claimed.
pub const CLAIM_THRESHOLD: f64 = 25.2;

/// States of one account's round.
///
/// Each round flows forward only: CHECK_TOKEN → [REFRESH_TOKEN] → ENSURE_NODE
/// → REWARD_CYCLE → DONE, or stops early in ABANDONED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    CheckToken,
    RefreshToken,
    EnsureNode,
    RewardCycle,
    Done,
    Abandoned,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Done | State::Abandoned)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::CheckToken => write!(f, "CHECK_TOKEN"),
            State::RefreshToken => write!(f, "REFRESH_TOKEN"),
            State::EnsureNode => write!(f, "ENSURE_NODE"),
            State::RewardCycle => write!(f, "REWARD_CYCLE"),
            State::Done => write!(f, "DONE"),
            State::Abandoned => write!(f, "ABANDONED"),
        }
    }
}

/// Result of running the work attached to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step succeeded (or had nothing to do).
    Proceed,
    /// The access token is past its expiry.
    TokenExpired,
    /// The step failed; the error is already in the transcript.
    Failed,
}

/// Pure transition table for the account worker.
pub struct StateMachine;

impl StateMachine {
    /// Compute the state that follows `state` given the step's outcome.
    ///
    /// - `CheckToken` fails open: an unreadable token is treated as valid and
    ///   the server's 401 handling corrects it later.
    /// - Failures in `RefreshToken` and `EnsureNode` abandon the account for
    ///   the round.
    /// - `RewardCycle` always finishes; per-node failures are skipped inside it.
    /// - Terminal states stay where they are.
    pub fn next(state: State, outcome: StepOutcome) -> State {
        match (state, outcome) {
            (State::CheckToken, StepOutcome::TokenExpired) => State::RefreshToken,
            (State::CheckToken, _) => State::EnsureNode,
            (State::RefreshToken, StepOutcome::Proceed) => State::EnsureNode,
            (State::RefreshToken, _) => State::Abandoned,
            (State::EnsureNode, StepOutcome::Proceed) => State::RewardCycle,
            (State::EnsureNode, _) => State::Abandoned,
            (State::RewardCycle, _) => State::Done,
            (terminal, _) => terminal,
        }
    }
}

/// What to do with an estimated reward value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RewardDecision {
    NothingToClaim,
    BelowThreshold,
    Claim,
}

impl RewardDecision {
    pub fn for_value(value: f64) -> Self {
        if value == 0.0 {
            RewardDecision::NothingToClaim
        } else if value < CLAIM_THRESHOLD {
            RewardDecision::BelowThreshold
        } else {
            RewardDecision::Claim
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(outcomes: &[StepOutcome]) -> Vec<State> {
        let mut state = State::CheckToken;
        let mut visited = vec![state];
        for outcome in outcomes {
            state = StateMachine::next(state, *outcome);
            visited.push(state);
        }
        visited
    }

    #[test]
    fn valid_token_skips_refresh() {
        let visited = walk(&[StepOutcome::Proceed, StepOutcome::Proceed, StepOutcome::Proceed]);
        assert_eq!(
            visited,
            vec![State::CheckToken, State::EnsureNode, State::RewardCycle, State::Done]
        );
    }

    #[test]
    fn expired_token_goes_through_refresh() {
        let visited = walk(&[
            StepOutcome::TokenExpired,
            StepOutcome::Proceed,
            StepOutcome::Proceed,
            StepOutcome::Proceed,
        ]);
        assert_eq!(
            visited,
            vec![
                State::CheckToken,
                State::RefreshToken,
                State::EnsureNode,
                State::RewardCycle,
                State::Done
            ]
        );
    }

    #[test]
    fn malformed_token_fails_open() {
        assert_eq!(
            StateMachine::next(State::CheckToken, StepOutcome::Failed),
            State::EnsureNode
        );
    }

    #[test]
    fn refresh_failure_abandons() {
        assert_eq!(
            StateMachine::next(State::RefreshToken, StepOutcome::Failed),
            State::Abandoned
        );
    }

    #[test]
    fn node_failure_abandons() {
        assert_eq!(
            StateMachine::next(State::EnsureNode, StepOutcome::Failed),
            State::Abandoned
        );
    }

    #[test]
    fn reward_cycle_always_finishes() {
        assert_eq!(StateMachine::next(State::RewardCycle, StepOutcome::Failed), State::Done);
    }

    #[test]
    fn terminal_states_are_sticky() {
        for state in [State::Done, State::Abandoned] {
            assert!(state.is_terminal());
            assert_eq!(StateMachine::next(state, StepOutcome::Proceed), state);
            assert_eq!(StateMachine::next(state, StepOutcome::TokenExpired), state);
        }
        assert!(!State::CheckToken.is_terminal());
    }

    #[test]
    fn reward_thresholds() {
        assert_eq!(RewardDecision::for_value(0.0), RewardDecision::NothingToClaim);
        assert_eq!(RewardDecision::for_value(0.01), RewardDecision::BelowThreshold);
        assert_eq!(RewardDecision::for_value(25.19), RewardDecision::BelowThreshold);
        assert_eq!(RewardDecision::for_value(25.2), RewardDecision::Claim);
        assert_eq!(RewardDecision::for_value(30.0), RewardDecision::Claim);
        assert_eq!(RewardDecision::for_value(-1.0), RewardDecision::BelowThreshold);
    }

    #[test]
    fn state_display() {
        assert_eq!(State::CheckToken.to_string(), "CHECK_TOKEN");
        assert_eq!(State::RefreshToken.to_string(), "REFRESH_TOKEN");
        assert_eq!(State::EnsureNode.to_string(), "ENSURE_NODE");
        assert_eq!(State::RewardCycle.to_string(), "REWARD_CYCLE");
        assert_eq!(State::Done.to_string(), "DONE");
        assert_eq!(State::Abandoned.to_string(), "ABANDONED");
    }
}
