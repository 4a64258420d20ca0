//! Per-account state machine.
//!
//! An [`AccountWorker`] runs one account through one round. It works from a
//! snapshot of the account and writes back to the shared list only for the
//! assignment itself, under the write lock, never around a network call.
//! Every outcome is recorded in the worker's transcript.

use std::sync::Arc;

use tracing::debug;

use crate::api::{GatewayError, RewardsApi, TokenPair};
use crate::node::generate_node_id;
use crate::orchestrator::{RoundMutations, SharedState};
use crate::state_machine::{
    Account, RewardDecision, State, StateMachine, StepOutcome, Transcript, WorkerReport,
};
use crate::token;

pub struct AccountWorker<A: RewardsApi> {
    index: usize,
    api: Arc<A>,
    shared: Arc<SharedState>,
    mutations: Arc<RoundMutations>,
    account: Account,
    transcript: Transcript,
}

impl<A: RewardsApi> AccountWorker<A> {
    /// Prepare a worker for the account at `index`. Returns `None` if the
    /// index is out of range.
    pub async fn new(
        index: usize,
        api: Arc<A>,
        shared: Arc<SharedState>,
        mutations: Arc<RoundMutations>,
    ) -> Option<Self> {
        let account = shared.snapshot(index).await?;
        Some(Self {
            index,
            api,
            shared,
            mutations,
            account,
            transcript: Transcript::default(),
        })
    }

    /// Drive the account from `CheckToken` to a terminal state.
    pub async fn run(mut self) -> WorkerReport {
        let mut state = State::CheckToken;
        let mut states = vec![state];

        while !state.is_terminal() {
            let outcome = match state {
                State::CheckToken => self.check_token(),
                State::RefreshToken => self.refresh_token().await,
                State::EnsureNode => self.ensure_node().await,
                State::RewardCycle => self.reward_cycle().await,
                State::Done | State::Abandoned => break,
            };
            state = StateMachine::next(state, outcome);
            states.push(state);
        }

        debug!(index = self.index, email = %self.account.email, final_state = %state, "worker finished");
        WorkerReport {
            transcript: self.transcript,
            states,
        }
    }

    /// Apply `f` to the shared record and count the change. A record that
    /// has left the list is not counted.
    async fn commit<F: FnOnce(&mut Account)>(&mut self, f: F) {
        if self.shared.update(self.index, f).await {
            self.mutations.record();
        } else {
            self.log(format!("account #{} no longer in the list, change not stored", self.index));
        }
    }

    fn log(&mut self, line: String) {
        self.transcript.push(format!("[{}] {}", self.account.email, line));
    }

    fn check_token(&mut self) -> StepOutcome {
        match token::is_valid(&self.account.access_token) {
            Ok(true) => StepOutcome::Proceed,
            Ok(false) => {
                self.log("access token expired, refreshing".to_string());
                StepOutcome::TokenExpired
            }
            Err(e) => {
                self.log(format!("could not read access token expiry, assuming valid: {e}"));
                StepOutcome::Failed
            }
        }
    }

    async fn refresh_token(&mut self) -> StepOutcome {
        match self.renew_tokens().await {
            Ok(()) => StepOutcome::Proceed,
            Err(e) => {
                self.log(format!("token refresh failed: {e}"));
                StepOutcome::Failed
            }
        }
    }

    async fn ensure_node(&mut self) -> StepOutcome {
        if !self.account.node_ids.is_empty() {
            return StepOutcome::Proceed;
        }

        let node_id = match generate_node_id() {
            Ok(id) => id,
            Err(e) => {
                self.log(format!("{e}, manual intervention needed"));
                return StepOutcome::Failed;
            }
        };

        if let Err(e) = self.api.link_node(&node_id, &self.account.access_token).await {
            self.log(format!("failed to link node [{node_id}], manual intervention needed: {e}"));
            return StepOutcome::Failed;
        }
        if let Err(e) = self.api.start_reward(&node_id, &self.account.access_token).await {
            self.log(format!("failed to start node [{node_id}], manual intervention needed: {e}"));
            return StepOutcome::Failed;
        }

        let node_ids = vec![node_id.clone()];
        self.commit(|account| account.set_node_ids(node_ids.clone())).await;
        self.account.node_ids = node_ids;
        self.log(format!("linked new node [{node_id}]"));
        StepOutcome::Proceed
    }

    async fn reward_cycle(&mut self) -> StepOutcome {
        for node_id in self.account.node_ids.clone() {
            let value = match self.estimate_with_reauth(&node_id).await {
                Some(value) => value,
                None => continue,
            };

            match RewardDecision::for_value(value) {
                RewardDecision::NothingToClaim => {
                    self.log(format!("node [{node_id}] has nothing to claim"));
                }
                RewardDecision::BelowThreshold => {
                    self.log(format!("node [{node_id}] only has [{value}] pending, below threshold, not claiming"));
                }
                RewardDecision::Claim => {
                    match self.api.claim_reward(&node_id, &self.account.access_token).await {
                        Ok(()) => self.log(format!("node [{node_id}] claimed [{value}] successfully")),
                        Err(e) => self.log(format!("node [{node_id}] claim of [{value}] failed: {e}")),
                    }
                }
            }
        }
        StepOutcome::Proceed
    }

    /// Estimate one node's reward. A 401 triggers one token refresh and one
    /// more estimate; anything else is logged and yields `None`.
    async fn estimate_with_reauth(&mut self, node_id: &str) -> Option<f64> {
        let err = match self.api.estimate_reward(node_id, &self.account.access_token).await {
            Ok(value) => return Some(value),
            Err(e) => e,
        };

        if !err.is_unauthorized() {
            self.log(format!("node [{node_id}] estimate failed: {err}"));
            return None;
        }

        if let Err(e) = self.renew_tokens().await {
            self.log(format!("token refresh after 401 failed: {e}"));
            return None;
        }

        match self.api.estimate_reward(node_id, &self.account.access_token).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.log(format!("node [{node_id}] estimate failed after token refresh: {e}"));
                None
            }
        }
    }

    /// Exchange the refresh token for a new pair and store it.
    async fn renew_tokens(&mut self) -> Result<(), GatewayError> {
        let TokenPair {
            access_token,
            refresh_token,
        } = self.api.refresh_token(&self.account.refresh_token).await?;

        self.commit(|account| account.set_tokens(access_token.clone(), refresh_token.clone()))
            .await;
        self.account.access_token = access_token;
        self.account.refresh_token = refresh_token;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-memory [`RewardsApi`].

    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum Call {
        Link,
        Start,
        Claim,
        Estimate,
        Refresh,
    }

    /// Scripted reply: `Ok` carries the estimate value (ignored elsewhere),
    /// `Err` carries an HTTP status turned into [`GatewayError::Api`].
    pub type Reply = Result<f64, u16>;

    #[derive(Default)]
    pub struct FakeApi {
        replies: Mutex<HashMap<Call, VecDeque<Reply>>>,
        calls: Mutex<Vec<(Call, String, String)>>,
        delays: Mutex<HashMap<String, Duration>>,
        next_tokens: Mutex<u32>,
    }

    impl FakeApi {
        /// Queue replies for `call`. Unscripted calls succeed with value 0.
        pub fn script(self, call: Call, replies: &[Reply]) -> Self {
            self.replies
                .lock()
                .unwrap()
                .entry(call)
                .or_default()
                .extend(replies.iter().copied());
            self
        }

        /// Delay every estimate for `node_id`.
        pub fn delay_node(self, node_id: &str, delay: Duration) -> Self {
            self.delays.lock().unwrap().insert(node_id.to_string(), delay);
            self
        }

        pub fn count(&self, call: Call) -> usize {
            self.calls.lock().unwrap().iter().filter(|(c, _, _)| *c == call).count()
        }

        /// Tokens sent with each call of kind `call`, in order.
        pub fn tokens_for(&self, call: Call) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _, _)| *c == call)
                .map(|(_, _, t)| t.clone())
                .collect()
        }

        pub fn nodes_for(&self, call: Call) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _, _)| *c == call)
                .map(|(_, n, _)| n.clone())
                .collect()
        }

        async fn reply(&self, call: Call, node: &str, token: &str) -> Reply {
            self.calls
                .lock()
                .unwrap()
                .push((call, node.to_string(), token.to_string()));
            let delay = self.delays.lock().unwrap().get(node).copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.replies
                .lock()
                .unwrap()
                .get_mut(&call)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Ok(0.0))
        }
    }

    fn to_err(status: u16) -> GatewayError {
        GatewayError::Api { status }
    }

    impl RewardsApi for FakeApi {
        async fn link_node(&self, node_id: &str, access_token: &str) -> Result<(), GatewayError> {
            self.reply(Call::Link, node_id, access_token).await.map(|_| ()).map_err(to_err)
        }

        async fn start_reward(&self, node_id: &str, access_token: &str) -> Result<(), GatewayError> {
            self.reply(Call::Start, node_id, access_token).await.map(|_| ()).map_err(to_err)
        }

        async fn claim_reward(&self, node_id: &str, access_token: &str) -> Result<(), GatewayError> {
            self.reply(Call::Claim, node_id, access_token).await.map(|_| ()).map_err(to_err)
        }

        async fn estimate_reward(&self, node_id: &str, access_token: &str) -> Result<f64, GatewayError> {
            self.reply(Call::Estimate, node_id, access_token).await.map_err(to_err)
        }

        async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, GatewayError> {
            self.reply(Call::Refresh, "", refresh_token).await.map_err(to_err)?;
            let n = {
                let mut next = self.next_tokens.lock().unwrap();
                *next += 1;
                *next
            };
            Ok(TokenPair {
                access_token: format!("access-{n}"),
                refresh_token: format!("refresh-{n}"),
            })
        }
    }
}
