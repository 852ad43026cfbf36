//! Application state shared by every front end
//!
//! `ChatApp` is the single owner of the conversation log. At most one
//! completion request runs at a time, on a spawned task that only sees a
//! snapshot of the log. Its result comes back over a channel and is appended
//! here, on the owner's task. Text submitted while a request runs waits in a
//! queue and is recorded only when its turn comes, so the log always reads
//! question, answer, question, answer.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chat::types::CompletionOutcome;
use crate::config::Config;
use crate::providers::{LlmProvider, ProviderError};
use crate::session::{
    DEFAULT_RETENTION_DAYS, Message, PruneResult, Role, SessionManager, retention_days,
};
use crate::utils::{DiasError, Result};

const REPLY_BUFFER: usize = 16;

/// Loads the history at the configured path, pruning if configured to
///
/// Never fails: an unusable file leaves the user with an empty log.
pub async fn open_history(config: &Config) -> SessionManager {
    let path = config.history_path();
    let mut session = SessionManager::open_or_recover(&path).await;

    if config.prune_on_start {
        let result = session.prune(retention_days(config.retention_days()));
        debug!(removed = result.removed, "Pruned history on start");
    }

    info!(
        path = %path.display(),
        messages = session.len(),
        "Chat history ready"
    );
    session
}

/// What happened to submitted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submitted {
    /// Recorded as a user turn; its request is running
    Sent(Message),
    /// Waiting behind the request in flight; `position` counts from 1
    Queued { position: usize },
}

pub struct ChatApp {
    session: SessionManager,
    history_path: PathBuf,
    provider: Arc<dyn LlmProvider>,
    model: String,
    retention: Duration,
    in_flight: bool,
    queued: VecDeque<String>,
    reply_tx: mpsc::Sender<CompletionOutcome>,
    reply_rx: mpsc::Receiver<CompletionOutcome>,
}

impl ChatApp {
    pub fn new(
        session: SessionManager,
        history_path: impl Into<PathBuf>,
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
    ) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);
        Self {
            session,
            history_path: history_path.into(),
            provider,
            model: model.into(),
            retention: retention_days(DEFAULT_RETENTION_DAYS),
            in_flight: false,
            queued: VecDeque::new(),
            reply_tx,
            reply_rx,
        }
    }

    /// Opens the configured history and wires it to `provider`
    pub async fn open(config: &Config, provider: Arc<dyn LlmProvider>) -> Self {
        let session = open_history(config).await;
        let model = config
            .provider_config
            .as_ref()
            .map(|p| p.default_model().to_string())
            .unwrap_or_else(|| provider.default_model());

        info!(provider = provider.provider_name(), model = %model, "Chat session started");

        Self::new(session, config.history_path(), provider, model)
            .with_retention(retention_days(config.retention_days()))
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Sends text as the next user turn, or queues it behind the running request
    ///
    /// Blank input is ignored and returns `None`.
    pub fn submit(&mut self, text: &str) -> Option<Submitted> {
        let content = text.trim();
        if content.is_empty() {
            debug!("Ignoring empty or whitespace-only message");
            return None;
        }

        if self.in_flight {
            self.queued.push_back(content.to_string());
            debug!(queued = self.queued.len(), "Reply outstanding, queueing message");
            return Some(Submitted::Queued {
                position: self.queued.len(),
            });
        }

        Some(Submitted::Sent(self.dispatch(content)))
    }

    /// Records the user turn and starts its request
    fn dispatch(&mut self, content: &str) -> Message {
        let message = self.session.append(Role::User, content);
        let context = self.session.to_llm_messages();
        let provider = Arc::clone(&self.provider);
        let model = self.model.clone();
        let reply_tx = self.reply_tx.clone();

        self.in_flight = true;
        debug!(context_len = context.len(), "Dispatching completion request");

        let request = tokio::spawn(async move { provider.chat(context, &model).await });

        // Reports even when the request task panics, so the app never waits
        // on a reply that cannot come
        tokio::spawn(async move {
            let result = match request.await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "Completion task stopped");
                    Err(ProviderError::Aborted {
                        message: e.to_string(),
                    })
                }
            };
            if reply_tx.send(CompletionOutcome { result }).await.is_err() {
                debug!("Chat session closed before the reply arrived");
            }
        });

        message
    }

    /// Waits for the running request to finish
    pub async fn next_outcome(&mut self) -> Option<CompletionOutcome> {
        self.reply_rx.recv().await
    }

    /// Appends a finished reply to the log, then sends the next queued text
    ///
    /// A provider failure is returned as an error; the log keeps the user
    /// turn that triggered it and the queue still moves on.
    pub fn apply_outcome(&mut self, outcome: CompletionOutcome) -> Result<Message> {
        self.in_flight = false;
        let applied = match outcome.result {
            Ok(content) => Ok(self.session.append(Role::Assistant, content)),
            Err(e) => {
                warn!(
                    error = %e,
                    provider = self.provider.provider_name(),
                    "Completion request failed"
                );
                Err(e.into())
            }
        };

        if let Some(next) = self.queued.pop_front() {
            self.dispatch(&next);
        }
        applied
    }

    /// Sends one message and waits for its reply
    pub async fn ask(&mut self, text: &str) -> Result<Message> {
        if self.is_waiting() {
            return Err(DiasError::Busy);
        }
        if self.submit(text).is_none() {
            return Err(DiasError::invalid_input("message is empty"));
        }
        let outcome = self
            .next_outcome()
            .await
            .ok_or_else(|| DiasError::channel("reply channel closed"))?;
        self.apply_outcome(outcome)
    }

    /// True while a request runs or text is queued
    pub fn is_waiting(&self) -> bool {
        self.in_flight || !self.queued.is_empty()
    }

    /// Submitted messages that have no reply yet, queued ones included
    pub fn pending(&self) -> usize {
        usize::from(self.in_flight) + self.queued.len()
    }

    pub fn clear(&mut self) {
        self.session.clear();
    }

    pub fn prune(&mut self, retention: Option<Duration>) -> PruneResult {
        self.session.prune(retention.unwrap_or(self.retention))
    }

    pub async fn save(&self) -> Result<()> {
        self.session.save(&self.history_path).await?;
        Ok(())
    }

    /// Persists the log before the app goes away
    ///
    /// Queued text was never recorded and is dropped.
    pub async fn shutdown(self) -> Result<()> {
        if self.is_waiting() {
            warn!(
                in_flight = self.in_flight,
                queued = self.queued.len(),
                "Exiting with replies still pending"
            );
        }
        self.save().await
    }

    pub fn messages(&self) -> &[Message] {
        self.session.messages()
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}
