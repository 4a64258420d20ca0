use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::api::RewardsApi;
use crate::config::ConfigStore;
use crate::sequencer::LogSender;
use crate::state_machine::{Account, Transcript};
use crate::worker::AccountWorker;

/// The account list shared by every worker of a round.
pub struct SharedState {
    accounts: RwLock<Vec<Account>>,
}

impl SharedState {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Account emails in list order.
    pub async fn emails(&self) -> Vec<String> {
        self.accounts
            .read()
            .await
            .iter()
            .map(|account| account.email.clone())
            .collect()
    }

    /// Copy of the account at `index`, taken under the read lock.
    pub async fn snapshot(&self, index: usize) -> Option<Account> {
        self.accounts.read().await.get(index).cloned()
    }

    /// Apply `f` to the account at `index` under the write lock. Returns
    /// false if the index is out of range.
    pub async fn update<F: FnOnce(&mut Account)>(&self, index: usize, f: F) -> bool {
        match self.accounts.write().await.get_mut(index) {
            Some(account) => {
                f(account);
                true
            }
            None => false,
        }
    }
}

/// Count of persisted-field changes made during one round. Only ever grows.
#[derive(Debug, Default)]
pub struct RoundMutations(AtomicUsize);

impl RoundMutations {
    pub fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub fn any(&self) -> bool {
        self.count() > 0
    }
}

/// Outcome of one dispatch/join pass.
#[derive(Debug, Default)]
pub struct RoundResult {
    /// One transcript per account, index-aligned with the account list.
    pub transcripts: Vec<Transcript>,
    pub mutated: bool,
}

/// Runs rounds over every account: dispatch, join, persist, sleep.
pub struct RoundOrchestrator<A: RewardsApi, S: ConfigStore + 'static> {
    api: Arc<A>,
    shared: Arc<SharedState>,
    store: Arc<S>,
    log: LogSender,
    interval: Option<Duration>,
}

impl<A: RewardsApi, S: ConfigStore + 'static> RoundOrchestrator<A, S> {
    pub fn new(
        api: Arc<A>,
        shared: Arc<SharedState>,
        store: S,
        log: LogSender,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            api,
            shared,
            store: Arc::new(store),
            log,
            interval,
        }
    }

    /// Run rounds until `shutdown` turns true. The flag is only checked
    /// between rounds, so a round that has started always completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut round: u64 = 0;
        loop {
            round += 1;
            debug!(round, "starting round");
            self.run_once().await;

            if *shutdown.borrow() {
                break;
            }
            let pause = self.interval.unwrap_or(Duration::ZERO);
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = sleep(pause) => {}
            }
        }
        info!(rounds = round, "shutdown requested, stopped after completing the round");
    }

    /// One full round: dispatch, join, log transcripts, persist if needed.
    pub async fn run_once(&self) -> RoundResult {
        let result = self.dispatch().await;
        self.finish(&result).await;
        result
    }

    /// Spawn one worker per account and wait for all of them.
    pub async fn dispatch(&self) -> RoundResult {
        let emails = self.shared.emails().await;
        let count = emails.len();
        self.log.send(format!("processing [{count}] accounts")).await;

        let mutations = Arc::new(RoundMutations::default());
        let mut set = JoinSet::new();
        let mut task_index = HashMap::with_capacity(count);
        for index in 0..count {
            let api = Arc::clone(&self.api);
            let shared = Arc::clone(&self.shared);
            let mutations = Arc::clone(&mutations);
            let handle = set.spawn(async move {
                let report = match AccountWorker::new(index, api, shared, mutations).await {
                    Some(worker) => Some(worker.run().await),
                    None => None,
                };
                (index, report)
            });
            task_index.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<Transcript>> = vec![None; count];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Some(report))) => {
                    debug!(index, states = ?report.states, "account worker joined");
                    slots[index] = Some(report.transcript);
                }
                Ok((index, None)) => {
                    debug!(index, "account disappeared before its worker started");
                }
                Err(e) => {
                    let Some(&index) = task_index.get(&e.id()) else {
                        error!("unknown account worker failed: {e}");
                        continue;
                    };
                    let reason = join_failure(e);
                    error!(index, "account worker failed: {reason}");
                    let mut transcript = Transcript::default();
                    transcript.push(format!("[{}] worker {reason}", emails[index]));
                    slots[index] = Some(transcript);
                }
            }
        }

        let transcripts = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let mut transcript = Transcript::default();
                    transcript.push(format!("[account #{index}] worker did not complete"));
                    transcript
                })
            })
            .collect();

        RoundResult {
            transcripts,
            mutated: mutations.any(),
        }
    }

    /// Log transcripts in account order, then persist if any account changed.
    pub async fn finish(&self, result: &RoundResult) {
        for transcript in &result.transcripts {
            self.log.send_transcript(transcript).await;
        }

        if result.mutated {
            self.log.send("account data changed, saving config").await;
            let saved = {
                let accounts = self.shared.accounts.write().await;
                let snapshot = accounts.to_vec();
                let store = Arc::clone(&self.store);
                tokio::task::spawn_blocking(move || store.save(&snapshot)).await
            };
            match saved {
                Ok(Ok(())) => self.log.send("config saved").await,
                Ok(Err(e)) => self.log.send(format!("failed to save config: {e:#}")).await,
                Err(e) => self.log.send(format!("config save task failed: {e}")).await,
            }
        } else {
            self.log.send("no account changes, skipping config save").await;
        }

        self.log
            .send(format!("[{}] accounts processed", result.transcripts.len()))
            .await;
        self.log.send("----------------------------------").await;
    }
}

/// Describe why a worker task ended without a report.
fn join_failure(err: JoinError) -> String {
    if err.is_panic() {
        format!("panicked: {}", panic_message(err.into_panic().as_ref()))
    } else {
        "was cancelled".to_string()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Resolve once the flag turns true. Never resolves if the sender is dropped
/// without signalling.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
