use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{error, info};

use crate::format;
use crate::store::leads::Lead;
use crate::store::Store;

/// Message delivery seam. Production wraps the Telegram bot; tests substitute
/// a recording stub.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;
}

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text.to_string())
            .await?;
        Ok(())
    }
}

/// Best-effort broadcast of new leads to every known bot user. No retries,
/// no delivery tracking; failures are logged and swallowed.
#[derive(Clone)]
pub struct Notifier {
    store: Store,
    transport: Arc<dyn Transport>,
}

impl Notifier {
    pub fn new(store: Store, transport: Arc<dyn Transport>) -> Self {
        Self { store, transport }
    }

    /// Fire-and-forget entry point: the fan-out runs on its own task and the
    /// caller never waits for it. All errors are handled inside the task.
    pub fn dispatch(&self, lead: Lead) {
        let notifier = self.clone();
        tokio::spawn(async move {
            notifier.notify(&lead).await;
        });
    }

    pub async fn notify(&self, lead: &Lead) {
        let users = match self.store.list_bot_users().await {
            Ok(users) => users,
            Err(e) => {
                error!("Failed to load bot users for notification: {}", e);
                return;
            }
        };

        if users.is_empty() {
            info!("No authorized bot users to notify about lead {}", lead.id);
            return;
        }

        let message = format::new_lead_message(lead);

        // Deliveries are independent; one failing recipient must not block
        // the rest.
        let sends = users.iter().map(|&chat_id| {
            let message = &message;
            async move {
                if let Err(e) = self.transport.send_text(chat_id, message).await {
                    error!("Failed to notify user {}: {}", chat_id, e);
                }
            }
        });
        futures::future::join_all(sends).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct RecordingTransport {
        sent: Mutex<Vec<(i64, String)>>,
        fail_for: HashSet<i64>,
    }

    impl RecordingTransport {
        fn new(fail_for: impl IntoIterator<Item = i64>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail_for: fail_for.into_iter().collect(),
            })
        }

        fn attempts(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            if self.fail_for.contains(&chat_id) {
                return Err(anyhow!("delivery refused"));
            }
            Ok(())
        }
    }

    async fn store_with_users(users: &[(i64, &str)]) -> Store {
        let store = Store::open_in_memory().unwrap();
        for (id, name) in users {
            store.upsert_bot_user(*id, name).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_notify_reaches_every_user() {
        let store = store_with_users(&[(1, "a"), (2, "b"), (3, "c")]).await;
        let transport = RecordingTransport::new([]);
        let notifier = Notifier::new(store.clone(), transport.clone());

        let lead = store.insert_lead("Ann", "ann@x.io", None).await.unwrap();
        notifier.notify(&lead).await;

        let mut ids: Vec<i64> = transport.attempts().iter().map(|(id, _)| *id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_short_circuit_the_rest() {
        let store = store_with_users(&[(1, "a"), (2, "b"), (3, "c")]).await;
        let transport = RecordingTransport::new([2]);
        let notifier = Notifier::new(store.clone(), transport.clone());

        let lead = store.insert_lead("Ann", "ann@x.io", None).await.unwrap();
        notifier.notify(&lead).await;

        assert_eq!(transport.attempts().len(), 3);
    }

    #[tokio::test]
    async fn test_notify_with_no_users_is_a_no_op() {
        let store = store_with_users(&[]).await;
        let transport = RecordingTransport::new([]);
        let notifier = Notifier::new(store.clone(), transport.clone());

        let lead = store.insert_lead("Ann", "ann@x.io", None).await.unwrap();
        notifier.notify(&lead).await;

        assert!(transport.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_message_carries_lead_fields() {
        let store = store_with_users(&[(1, "a")]).await;
        let transport = RecordingTransport::new([]);
        let notifier = Notifier::new(store.clone(), transport.clone());

        let lead = store
            .insert_lead("Ann", "ann@x.io", Some("+123"))
            .await
            .unwrap();
        notifier.notify(&lead).await;

        let attempts = transport.attempts();
        assert!(attempts[0].1.contains("Ann"));
        assert!(attempts[0].1.contains("+123"));
    }
}
