//! Conversation driver integration tests.
//!
//! These tests drive the full respond cycle against a scripted in-memory
//! assistant service, with both the memory and the file session stores.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assistant_bridge::assistant::{
    Assistant, AssistantService, Message, MessageContent, MessageRole, Run, RunError, RunStatus,
    TextContent, Thread,
};
use assistant_bridge::{
    BridgeError, ConversationDriver, DriverSettings, FileSessionStore, Identity,
    MemorySessionStore, PollPolicy, SessionStore, ThreadId, RUN_FAILED_REPLY,
};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

// ============================================================================
// Scripted assistant service
// ============================================================================

/// In-memory assistant service whose runs follow a fixed status script.
///
/// The last status of the script repeats forever. When a run reaches
/// `completed` the configured reply is appended to the thread.
struct ScriptedAssistant {
    script: Vec<RunStatus>,
    reply: Mutex<Option<Vec<MessageContent>>>,
    fail_create_thread: bool,
    next_id: AtomicU32,
    threads: Mutex<HashMap<String, Vec<Message>>>,
    cursors: Mutex<HashMap<String, usize>>,
    threads_created: AtomicU32,
    threads_retrieved: AtomicU32,
    runs_created: AtomicU32,
}

impl ScriptedAssistant {
    fn new(script: &[RunStatus], reply: Option<&str>) -> Self {
        Self {
            script: script.to_vec(),
            reply: Mutex::new(reply.map(|text| vec![text_part(text)])),
            fail_create_thread: false,
            next_id: AtomicU32::new(1),
            threads: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            threads_created: AtomicU32::new(0),
            threads_retrieved: AtomicU32::new(0),
            runs_created: AtomicU32::new(0),
        }
    }

    fn completing(reply: &str) -> Self {
        Self::new(&[RunStatus::Queued, RunStatus::InProgress, RunStatus::Completed], Some(reply))
    }

    fn set_reply(&self, text: &str) {
        *self.reply.lock().unwrap() = Some(vec![text_part(text)]);
    }

    fn with_reply_parts(self, parts: Vec<MessageContent>) -> Self {
        *self.reply.lock().unwrap() = Some(parts);
        self
    }

    fn failing_thread_creation(mut self) -> Self {
        self.fail_create_thread = true;
        self
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn threads_created(&self) -> u32 {
        self.threads_created.load(Ordering::SeqCst)
    }

    fn threads_retrieved(&self) -> u32 {
        self.threads_retrieved.load(Ordering::SeqCst)
    }

    fn runs_created(&self) -> u32 {
        self.runs_created.load(Ordering::SeqCst)
    }

    fn user_messages(&self, thread: &ThreadId) -> Vec<String> {
        self.threads.lock().unwrap()[thread.as_str()]
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .filter_map(|m| m.text().map(str::to_string))
            .collect()
    }

    fn not_found(thread: &ThreadId) -> BridgeError {
        BridgeError::Api {
            status: 404,
            message: format!("No thread found with id '{thread}'."),
        }
    }
}

fn text_part(text: &str) -> MessageContent {
    MessageContent::Text {
        text: TextContent {
            value: text.to_string(),
        },
    }
}

fn text_message(id: String, role: MessageRole, text: &str) -> Message {
    Message {
        id,
        role,
        content: vec![text_part(text)],
    }
}

const ASSISTANT_ID: &str = "asst_test";

#[async_trait]
impl AssistantService for ScriptedAssistant {
    async fn retrieve_assistant(&self, assistant_id: &str) -> assistant_bridge::Result<Assistant> {
        if assistant_id != ASSISTANT_ID {
            return Err(BridgeError::Api {
                status: 404,
                message: format!("No assistant found with id '{assistant_id}'."),
            });
        }
        Ok(Assistant {
            id: assistant_id.to_string(),
            name: Some("Concierge".into()),
            model: None,
        })
    }

    async fn create_thread(&self) -> assistant_bridge::Result<Thread> {
        if self.fail_create_thread {
            return Err(BridgeError::Api {
                status: 401,
                message: "Incorrect API key provided".into(),
            });
        }
        let id = self.next("thread");
        self.threads.lock().unwrap().insert(id.clone(), Vec::new());
        self.threads_created.fetch_add(1, Ordering::SeqCst);
        Ok(Thread {
            id: ThreadId::new(id),
            created_at: None,
        })
    }

    async fn retrieve_thread(&self, thread: &ThreadId) -> assistant_bridge::Result<Thread> {
        self.threads_retrieved.fetch_add(1, Ordering::SeqCst);
        if !self.threads.lock().unwrap().contains_key(thread.as_str()) {
            return Err(Self::not_found(thread));
        }
        Ok(Thread {
            id: thread.clone(),
            created_at: None,
        })
    }

    async fn create_message(
        &self,
        thread: &ThreadId,
        role: MessageRole,
        content: &str,
    ) -> assistant_bridge::Result<Message> {
        let message = text_message(self.next("msg"), role, content);
        let mut threads = self.threads.lock().unwrap();
        let messages = threads
            .get_mut(thread.as_str())
            .ok_or_else(|| Self::not_found(thread))?;
        messages.push(message.clone());
        Ok(message)
    }

    async fn create_run(
        &self,
        thread: &ThreadId,
        _assistant_id: &str,
    ) -> assistant_bridge::Result<Run> {
        self.runs_created.fetch_add(1, Ordering::SeqCst);
        let id = self.next("run");
        self.cursors.lock().unwrap().insert(id.clone(), 0);
        Ok(Run {
            id,
            thread_id: thread.clone(),
            status: RunStatus::Queued,
            last_error: None,
        })
    }

    async fn retrieve_run(&self, thread: &ThreadId, run_id: &str) -> assistant_bridge::Result<Run> {
        let status = {
            let mut cursors = self.cursors.lock().unwrap();
            let cursor = cursors.get_mut(run_id).expect("unknown run");
            let status = self.script[(*cursor).min(self.script.len() - 1)];
            *cursor += 1;
            status
        };

        if status == RunStatus::Completed {
            if let Some(content) = self.reply.lock().unwrap().clone() {
                let mut threads = self.threads.lock().unwrap();
                let messages = threads.get_mut(thread.as_str()).unwrap();
                let already_replied = messages
                    .last()
                    .map(|m| m.role == MessageRole::Assistant)
                    .unwrap_or(false);
                if !already_replied {
                    messages.push(Message {
                        id: self.next("msg"),
                        role: MessageRole::Assistant,
                        content,
                    });
                }
            }
        }

        let last_error = (status == RunStatus::Failed).then(|| RunError {
            code: "server_error".into(),
            message: "Sorry, something went wrong.".into(),
        });

        Ok(Run {
            id: run_id.to_string(),
            thread_id: thread.clone(),
            status,
            last_error,
        })
    }

    async fn list_messages(&self, thread: &ThreadId) -> assistant_bridge::Result<Vec<Message>> {
        let threads = self.threads.lock().unwrap();
        let messages = threads
            .get(thread.as_str())
            .ok_or_else(|| Self::not_found(thread))?;
        Ok(messages.iter().rev().cloned().collect())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn fast_poll() -> PollPolicy {
    PollPolicy::default()
        .interval(Duration::from_millis(1))
        .max_attempts(20)
        .timeout(Duration::from_secs(5))
}

fn settings() -> DriverSettings {
    DriverSettings::new(ASSISTANT_ID).with_poll(fast_poll())
}

fn identity(s: &str) -> Identity {
    Identity::new(s).unwrap()
}

fn driver_with(
    service: &Arc<ScriptedAssistant>,
    store: &Arc<dyn SessionStore>,
    settings: DriverSettings,
) -> ConversationDriver {
    ConversationDriver::new(service.clone(), Arc::clone(store), settings)
}

// ============================================================================
// Session resolution
// ============================================================================

#[tokio::test]
async fn test_new_identity_creates_one_record() {
    let service = Arc::new(ScriptedAssistant::completing("Welcome to Paris!"));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());

    let who = identity("15550001");
    assert!(store.lookup(&who).unwrap().is_none());

    let reply = driver.respond("Hello", &who, "Alice").await.unwrap();

    assert_eq!(reply, "Welcome to Paris!");
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(service.threads_created(), 1);
    assert_eq!(service.threads_retrieved(), 0);

    let thread = store.lookup(&who).unwrap().unwrap();
    assert_eq!(service.user_messages(&thread), vec!["Hello".to_string()]);
}

#[tokio::test]
async fn test_known_identity_reuses_thread() {
    let service = Arc::new(ScriptedAssistant::completing("Sure."));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());
    let who = identity("15550001");

    assert_ok!(driver.respond("First question", &who, "Alice").await);
    let thread = store.lookup(&who).unwrap().unwrap();

    assert_ok!(driver.respond("Second question", &who, "Alice").await);

    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.lookup(&who).unwrap(), Some(thread.clone()));
    assert_eq!(service.threads_created(), 1);
    assert_eq!(service.threads_retrieved(), 1);
    assert_eq!(service.runs_created(), 2);
    assert_eq!(
        service.user_messages(&thread),
        vec!["First question".to_string(), "Second question".to_string()]
    );
}

#[tokio::test]
async fn test_resolve_thread_is_stable() {
    let service = Arc::new(ScriptedAssistant::completing("ok"));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());
    let who = identity("15550001");

    let first = driver.resolve_thread(&who, "Alice").await.unwrap();
    let second = driver.resolve_thread(&who, "Alice").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(service.threads_created(), 1);
}

#[tokio::test]
async fn test_stale_thread_error_propagates() {
    let service = Arc::new(ScriptedAssistant::completing("ok"));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let who = identity("15550001");
    store.store(&who, &ThreadId::new("thread_gone")).unwrap();

    let driver = driver_with(&service, &store, settings());
    let err = assert_err!(driver.respond("Hello", &who, "Alice").await);

    assert!(matches!(err, BridgeError::Api { status: 404, .. }));
    assert_eq!(service.threads_created(), 0);
    assert_eq!(
        store.lookup(&who).unwrap(),
        Some(ThreadId::new("thread_gone"))
    );
}

#[tokio::test]
async fn test_remote_fault_propagates_without_record() {
    let service = Arc::new(ScriptedAssistant::completing("ok").failing_thread_creation());
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());

    let err = assert_err!(driver.respond("Hello", &identity("15550001"), "Alice").await);

    assert!(matches!(err, BridgeError::Api { status: 401, .. }));
    assert!(store.is_empty().unwrap());
}

#[tokio::test]
async fn test_unknown_assistant_fails_before_run() {
    let service = Arc::new(ScriptedAssistant::completing("ok"));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let settings = DriverSettings::new("asst_missing").with_poll(fast_poll());
    let driver = driver_with(&service, &store, settings);

    let err = assert_err!(driver.respond("Hello", &identity("15550001"), "Alice").await);

    assert!(matches!(err, BridgeError::Api { status: 404, .. }));
    assert_eq!(service.runs_created(), 0);
    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test]
async fn test_lookup_and_count_without_remote_calls() {
    let service = Arc::new(ScriptedAssistant::completing("ok"));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());
    let who = identity("15550001");

    assert_eq!(assert_ok!(driver.lookup_thread(&who).await), None);
    assert_eq!(assert_ok!(driver.thread_count().await), 0);

    store.store(&who, &ThreadId::new("thread_known")).unwrap();

    assert_eq!(
        assert_ok!(driver.lookup_thread(&who).await),
        Some(ThreadId::new("thread_known"))
    );
    assert_eq!(assert_ok!(driver.thread_count().await), 1);
    assert_eq!(service.threads_retrieved(), 0);
    assert_eq!(service.threads_created(), 0);
}

// ============================================================================
// Run outcomes
// ============================================================================

#[tokio::test]
async fn test_completed_returns_newest_message() {
    let service = Arc::new(ScriptedAssistant::completing("Check-in is from 3pm."));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());
    let who = identity("15550001");

    let first = driver.respond("Hi", &who, "Alice").await.unwrap();
    assert_eq!(first, "Check-in is from 3pm.");

    service.set_reply("Check-out is at 11am.");
    let second = driver
        .respond("And check-out?", &who, "Alice")
        .await
        .unwrap();
    assert_eq!(second, "Check-out is at 11am.");

    let thread = store.lookup(&who).unwrap().unwrap();
    let history = service.list_messages(&thread).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].text(), Some("Check-out is at 11am."));
}

#[tokio::test]
async fn test_failed_run_returns_fixed_reply() {
    let service = Arc::new(ScriptedAssistant::new(
        &[RunStatus::InProgress, RunStatus::Failed],
        None,
    ));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());

    let reply = assert_ok!(driver.respond("Hello", &identity("15550001"), "Alice").await);
    assert_eq!(reply, RUN_FAILED_REPLY);
    assert_eq!(reply, "Ошибка при обработке запроса.");
}

#[tokio::test]
async fn test_cancelled_run_returns_fixed_reply() {
    let service = Arc::new(ScriptedAssistant::new(
        &[RunStatus::Cancelling, RunStatus::Cancelled],
        None,
    ));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());

    let reply = driver
        .respond("Hello", &identity("15550001"), "Alice")
        .await
        .unwrap();
    assert_eq!(reply, RUN_FAILED_REPLY);
}

#[tokio::test]
async fn test_custom_failure_reply() {
    let service = Arc::new(ScriptedAssistant::new(&[RunStatus::Failed], None));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(
        &service,
        &store,
        settings().with_failure_reply("Sorry, please contact the host."),
    );

    let reply = driver
        .respond("Hello", &identity("15550001"), "Alice")
        .await
        .unwrap();
    assert_eq!(reply, "Sorry, please contact the host.");
}

#[tokio::test]
async fn test_pending_run_times_out() {
    let service = Arc::new(ScriptedAssistant::new(&[RunStatus::InProgress], None));
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(
        &service,
        &store,
        settings().with_poll(fast_poll().max_attempts(5)),
    );
    let who = identity("15550001");

    let err = assert_err!(driver.respond("Hello", &who, "Alice").await);

    match err {
        BridgeError::RunTimedOut {
            last_status,
            attempts,
            ..
        } => {
            assert_eq!(last_status, RunStatus::InProgress);
            assert_eq!(attempts, 5);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    // The thread is still recorded for the next message.
    assert!(store.lookup(&who).unwrap().is_some());
}

#[tokio::test]
async fn test_completed_without_text_is_error() {
    let service = Arc::new(
        ScriptedAssistant::new(&[RunStatus::Completed], None)
            .with_reply_parts(vec![MessageContent::Other]),
    );
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let driver = driver_with(&service, &store, settings());

    let err = assert_err!(driver.respond("Send me a photo", &identity("15550001"), "Alice").await);
    assert!(matches!(err, BridgeError::EmptyReply));
}

// ============================================================================
// File store
// ============================================================================

#[tokio::test]
async fn test_file_store_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("threads_db.json");
    let service = Arc::new(ScriptedAssistant::completing("Hello again"));
    let who = identity("15550001");

    {
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::open(&path).unwrap());
        let driver = driver_with(&service, &store, settings());
        driver.respond("Hi", &who, "Alice").await.unwrap();
    }

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::open(&path).unwrap());
    let driver = driver_with(&service, &store, settings());
    driver.respond("Hi again", &who, "Alice").await.unwrap();

    assert_eq!(service.threads_created(), 1);
    assert_eq!(service.threads_retrieved(), 1);
    assert_eq!(store.len().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_distinct_identities() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(ScriptedAssistant::completing("Hi!"));
    let store: Arc<dyn SessionStore> =
        Arc::new(FileSessionStore::open(dir.path().join("threads_db.json")).unwrap());
    let driver = Arc::new(driver_with(&service, &store, settings()));

    let alice = identity("15550001");
    let bob = identity("15550002");

    let (a, b) = tokio::join!(
        {
            let driver = Arc::clone(&driver);
            let who = alice.clone();
            async move { driver.respond("Hello", &who, "Alice").await }
        },
        {
            let driver = Arc::clone(&driver);
            let who = bob.clone();
            async move { driver.respond("Bonjour", &who, "Bob").await }
        }
    );
    assert_ok!(a);
    assert_ok!(b);

    assert_eq!(store.len().unwrap(), 2);
    let alice_thread = store.lookup(&alice).unwrap().unwrap();
    let bob_thread = store.lookup(&bob).unwrap().unwrap();
    assert_ne!(alice_thread, bob_thread);

    let distinct: HashSet<_> = [alice_thread, bob_thread].into_iter().collect();
    assert_eq!(distinct.len(), 2);
    assert_eq!(service.threads_created(), 2);
}
