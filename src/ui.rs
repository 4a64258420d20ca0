//! Terminal rendering for the `status` command.
//!
//! Uses `console` styles: green for usable tokens, yellow for expired ones
//! (the next round will refresh them), red for tokens that cannot be read.

use chrono::{DateTime, Local, Utc};
use console::Style;

use crate::state_machine::Account;
use crate::token;

/// Token health as seen offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid { expires: DateTime<Utc> },
    Expired { expired: DateTime<Utc> },
    Unreadable(String),
}

impl TokenStatus {
    pub fn of(access_token: &str, now: DateTime<Utc>) -> Self {
        match token::expires_at(access_token) {
            Ok(expires) if now <= expires => TokenStatus::Valid { expires },
            Ok(expired) => TokenStatus::Expired { expired },
            Err(e) => TokenStatus::Unreadable(e.to_string()),
        }
    }
}

/// One line per account, plain text.
pub fn status_line(account: &Account, now: DateTime<Utc>) -> String {
    let token = match TokenStatus::of(&account.access_token, now) {
        TokenStatus::Valid { expires } => {
            format!("token valid until {}", expires.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"))
        }
        TokenStatus::Expired { expired } => {
            format!("token expired at {}", expired.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"))
        }
        TokenStatus::Unreadable(reason) => format!("token unreadable ({reason})"),
    };
    let updated = if account.last_updated.is_empty() {
        "never"
    } else {
        account.last_updated.as_str()
    };
    format!(
        "{} | {} | {} node(s) | updated {}",
        account.email,
        token,
        account.node_ids.len(),
        updated
    )
}

/// Print the status table to stdout.
pub fn print_status(accounts: &[Account]) {
    let now = Utc::now();
    let green = Style::new().green().bold();
    let yellow = Style::new().yellow();
    let red = Style::new().red().bold();

    println!("{} account(s) configured", accounts.len());
    for (index, account) in accounts.iter().enumerate() {
        let style = match TokenStatus::of(&account.access_token, now) {
            TokenStatus::Valid { .. } => &green,
            TokenStatus::Expired { .. } => &yellow,
            TokenStatus::Unreadable(_) => &red,
        };
        println!("  #{index:<3} {}", style.apply_to(status_line(account, now)));
    }
}
