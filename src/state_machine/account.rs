use chrono::Local;
use serde::{Deserialize, Serialize};

use super::state::State;

/// Format used for `update_timestamp` in the config file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One user's credentials and registered nodes, as stored in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    /// Node ids in creation order.
    #[serde(default, rename = "unique_ids")]
    pub node_ids: Vec<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "update_timestamp")]
    pub last_updated: String,
}

impl Account {
    /// Replace both tokens with a pair issued by one refresh call.
    pub fn set_tokens(&mut self, access_token: String, refresh_token: String) {
        self.access_token = access_token;
        self.refresh_token = refresh_token;
        self.touch();
    }

    pub fn set_node_ids(&mut self, node_ids: Vec<String>) {
        self.node_ids = node_ids;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Local::now().format(TIMESTAMP_FORMAT).to_string();
    }
}

/// Lines produced by one account's worker during one round, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// True when any line contains `needle`.
    #[cfg(test)]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }
}

/// What a worker hands back to the orchestrator at the end of a round.
#[derive(Debug, Clone, Default)]
pub struct WorkerReport {
    pub transcript: Transcript,
    /// States visited, in order, ending with the terminal state.
    pub states: Vec<State>,
}
