//! Conversation driver.

use std::sync::Arc;

use tracing::{error, info};

use super::poller::{PollPolicy, RunOutcome, RunPoller};
use crate::assistant::{AssistantService, Message, MessageRole};
use crate::error::BridgeError;
use crate::session::{Identity, SessionStore, ThreadId};
use crate::Result;

/// Reply returned when a run fails or is cancelled.
pub const RUN_FAILED_REPLY: &str = "Ошибка при обработке запроса.";

/// Per-process settings for the conversation driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// Assistant every run is started with.
    pub assistant_id: String,
    /// Bounds on waiting for a run.
    pub poll: PollPolicy,
    /// Text returned to the user when a run fails or is cancelled.
    pub failure_reply: String,
}

impl DriverSettings {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            poll: PollPolicy::default(),
            failure_reply: RUN_FAILED_REPLY.to_string(),
        }
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_failure_reply(mut self, reply: impl Into<String>) -> Self {
        self.failure_reply = reply.into();
        self
    }
}

/// Answers messages on behalf of identities, one assistant thread each.
pub struct ConversationDriver {
    service: Arc<dyn AssistantService>,
    store: Arc<dyn SessionStore>,
    settings: DriverSettings,
}

impl ConversationDriver {
    pub fn new(
        service: Arc<dyn AssistantService>,
        store: Arc<dyn SessionStore>,
        settings: DriverSettings,
    ) -> Self {
        Self {
            service,
            store,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// Thread recorded for `identity`, without contacting the service.
    pub async fn lookup_thread(&self, identity: &Identity) -> Result<Option<ThreadId>> {
        let key = identity.clone();
        self.with_store(move |store| store.lookup(&key)).await
    }

    /// Number of identities with a recorded thread.
    pub async fn thread_count(&self) -> Result<usize> {
        self.with_store(|store| store.len()).await
    }

    /// Produce the assistant's reply to `message_body` from `identity`.
    ///
    /// Creates and records a thread on first contact. A run that fails or
    /// is cancelled yields the configured failure reply; every other
    /// failure is returned as an error.
    pub async fn respond(
        &self,
        message_body: &str,
        identity: &Identity,
        display_name: &str,
    ) -> Result<String> {
        let thread = self.resolve_thread(identity, display_name).await?;

        self.service
            .create_message(&thread, MessageRole::User, message_body)
            .await?;

        self.run_assistant(&thread).await
    }

    /// Find the thread recorded for `identity`, creating one if needed.
    pub async fn resolve_thread(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<ThreadId> {
        match self.lookup_thread(identity).await? {
            Some(thread) => {
                info!("Retrieving existing thread for {display_name} with identity {identity}");
                self.service.retrieve_thread(&thread).await?;
                Ok(thread)
            }
            None => {
                info!("Creating new thread for {display_name} with identity {identity}");
                let thread = self.service.create_thread().await?.id;

                let key = identity.clone();
                let handle = thread.clone();
                self.with_store(move |store| store.store(&key, &handle)).await?;
                Ok(thread)
            }
        }
    }

    async fn run_assistant(&self, thread: &ThreadId) -> Result<String> {
        let assistant = self
            .service
            .retrieve_assistant(&self.settings.assistant_id)
            .await?;

        let run = self.service.create_run(thread, &assistant.id).await?;

        let poller = RunPoller::new(self.service.as_ref(), self.settings.poll);
        if let RunOutcome::Failed(run) = poller.wait(run).await? {
            let reason = run.last_error.as_ref().map(|e| e.message.as_str());
            error!(run = %run.id, ?reason, "Run failed or was cancelled: {}", run.status);
            return Ok(self.settings.failure_reply.clone());
        }

        let messages = self.service.list_messages(thread).await?;
        let reply = messages
            .first()
            .and_then(Message::text)
            .ok_or(BridgeError::EmptyReply)?
            .to_string();

        info!("Generated message: {reply}");
        Ok(reply)
    }

    /// Run a store operation off the async workers; file stores block on locks.
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn SessionStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| BridgeError::Store(format!("store task failed: {e}")))?
    }
}
