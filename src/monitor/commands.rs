use anyhow::{anyhow, Result};
use serde::Deserialize;

use super::{env::APP_CONFIG, REQUEST_TIMEOUT};

pub const BALANCE_COMMAND: &str = "/balance";

/// Server-side wait on getUpdates. Kept short so one poll never holds the
/// loop for longer than the cycle sleep.
const LONG_POLL_SECONDS: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    pub text: String,
    pub chat_id: i64,
    pub update_id: i64,
}

impl InboundCommand {
    pub fn is_balance_request(&self) -> bool {
        self.text.starts_with(BALANCE_COMMAND)
    }

    /// Composite identity used for at-most-once execution.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}:{}", self.chat_id, self.text, self.update_id)
    }
}

/// Outcome of one non-empty poll. The cursor always advances to the newest
/// update seen, even when that update carries no usable command text,
/// otherwise the same update would be fetched forever.
#[derive(Debug, PartialEq, Eq)]
pub struct CommandPoll {
    pub cursor: i64,
    pub command: Option<InboundCommand>,
}

#[derive(Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize)]
struct Message {
    text: Option<String>,
    chat: Chat,
}

#[derive(Deserialize)]
struct Chat {
    id: i64,
}

/// Only the most recent update is considered; older queued updates are
/// dropped without processing.
fn select_latest(updates: Vec<Update>) -> Option<CommandPoll> {
    let Update { update_id, message } = updates.into_iter().max_by_key(|u| u.update_id)?;
    let command = message.and_then(|m| {
        m.text.map(|text| InboundCommand {
            text,
            chat_id: m.chat.id,
            update_id,
        })
    });
    Some(CommandPoll {
        cursor: update_id,
        command,
    })
}

pub struct CommandPoller {
    client: reqwest::Client,
}

impl CommandPoller {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?,
        })
    }

    /// Fetch updates strictly after `cursor`. `Ok(None)` means nothing new.
    pub async fn poll(&self, cursor: i64) -> Result<Option<CommandPoll>> {
        let url = format!(
            "https://api.telegram.org/bot{}/getUpdates",
            APP_CONFIG.telegram_api_key
        );
        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", (cursor + 1).to_string()),
                ("timeout", LONG_POLL_SECONDS.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<UpdatesResponse>()
            .await?;

        if !response.ok {
            return Err(anyhow!("getUpdates returned ok=false"));
        }

        Ok(select_latest(response.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(update_id: i64, chat_id: i64, text: Option<&str>) -> Update {
        Update {
            update_id,
            message: Some(Message {
                text: text.map(str::to_string),
                chat: Chat { id: chat_id },
            }),
        }
    }

    #[test]
    fn test_no_updates_yields_none() {
        assert_eq!(select_latest(vec![]), None);
    }

    #[test]
    fn test_only_most_recent_update_is_selected() {
        let poll = select_latest(vec![
            update(10, 1, Some("/balance")),
            update(12, 2, Some("/balance")),
            update(11, 3, Some("hello")),
        ])
        .unwrap();

        assert_eq!(poll.cursor, 12);
        assert_eq!(
            poll.command,
            Some(InboundCommand {
                text: "/balance".to_string(),
                chat_id: 2,
                update_id: 12,
            })
        );
    }

    #[test]
    fn test_textless_update_still_advances_cursor() {
        let poll = select_latest(vec![
            update(5, 1, Some("/balance")),
            update(7, 1, None),
        ])
        .unwrap();

        assert_eq!(poll.cursor, 7);
        assert_eq!(poll.command, None);
    }

    #[test]
    fn test_balance_request_recognition() {
        let command = |text: &str| InboundCommand {
            text: text.to_string(),
            chat_id: 1,
            update_id: 1,
        };
        assert!(command("/balance").is_balance_request());
        assert!(command("/balance@sentinel_bot").is_balance_request());
        assert!(!command("balance").is_balance_request());
        assert!(!command("hello").is_balance_request());
    }

    #[test]
    fn test_dedup_key_distinguishes_updates() {
        let first = InboundCommand {
            text: "/balance".to_string(),
            chat_id: 7,
            update_id: 100,
        };
        let mut second = first.clone();
        second.update_id = 101;

        assert_eq!(first.dedup_key(), first.dedup_key());
        assert_ne!(first.dedup_key(), second.dedup_key());
    }
}
