//! Readiness of the process-wide chat session.
//!
//! The web gateway starts accepting connections before the model is loaded.
//! Loading runs in a background task and publishes its outcome through a
//! `tokio::sync::watch` channel; handlers read the current value and the
//! binary waits on it to shut down when loading fails.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::chat::ChatSession;
use crate::error::{Error, Result};
use crate::model::ModelLoader;

/// A chat session shared by every request.
///
/// All access is serialized through the mutex, so concurrent chat requests
/// turn into sequential model calls.
pub type SharedSession = Arc<Mutex<ChatSession>>;

/// Lifecycle of the shared session.
#[derive(Clone)]
pub enum SessionState {
    /// The model is still loading.
    Initializing,

    /// The session is ready to serve requests.
    Ready {
        /// Identifier of the loaded model.
        model: String,
        /// The session itself.
        session: SharedSession,
    },

    /// Loading failed; the process is expected to exit.
    Failed(Error),
}

impl SessionState {
    /// The lowercase name of the state, as reported by `/api/status`.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::Ready { .. } => "ready",
            SessionState::Failed(_) => "failed",
        }
    }

    /// Returns true once the session can serve requests.
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready { .. })
    }

    /// The session, or why there is none.
    ///
    /// While loading this is [`Error::NotReady`]; after a failed load it is
    /// the load error itself.
    pub fn session(&self) -> Result<SharedSession> {
        match self {
            SessionState::Ready { session, .. } => Ok(Arc::clone(session)),
            SessionState::Initializing => Err(Error::not_ready(
                "Chatbot is still initializing. Please wait...",
            )),
            SessionState::Failed(err) => Err(err.clone()),
        }
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Initializing => write!(f, "Initializing"),
            SessionState::Ready { model, .. } => {
                f.debug_struct("Ready").field("model", model).finish()
            }
            SessionState::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// Write-once publisher of the session state.
#[derive(Clone)]
pub struct Readiness {
    tx: Arc<watch::Sender<SessionState>>,
}

impl Readiness {
    /// Creates a readiness cell in the `Initializing` state.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Initializing);
        Self { tx: Arc::new(tx) }
    }

    /// Creates a readiness cell that already holds `session`.
    pub fn ready(session: ChatSession) -> Self {
        let readiness = Self::new();
        readiness.set_ready(session);
        readiness
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    /// Publishes a loaded session.
    pub fn set_ready(&self, session: ChatSession) {
        self.tx.send_replace(SessionState::Ready {
            model: session.model_id().to_string(),
            session: Arc::new(Mutex::new(session)),
        });
    }

    /// Publishes a load failure.
    pub fn set_failed(&self, error: Error) {
        self.tx.send_replace(SessionState::Failed(error));
    }

    /// Loads the model in the background and publishes the outcome.
    pub fn spawn_loader(&self, loader: ModelLoader) -> JoinHandle<()> {
        let readiness = self.clone();
        tokio::spawn(async move {
            match loader.load().await {
                Ok(session) => {
                    tracing::info!(model = %session.model_id(), "chat session ready");
                    readiness.set_ready(session);
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to initialize chat session");
                    readiness.set_failed(err);
                }
            }
        })
    }

    /// Waits until loading has finished one way or the other.
    pub async fn settled(&self) -> SessionState {
        let mut rx = self.subscribe();
        match rx
            .wait_for(|state| !matches!(state, SessionState::Initializing))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Resolves with the load error if loading fails; never resolves otherwise.
    pub async fn failed(&self) -> Error {
        match self.settled().await {
            SessionState::Failed(err) => err,
            _ => std::future::pending().await,
        }
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatConfig;
    use crate::generator::Generator;
    use crate::types::GenerationParams;

    struct Silent;

    #[async_trait::async_trait]
    impl Generator for Silent {
        async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn starts_initializing() {
        let readiness = Readiness::new();
        assert_eq!(readiness.state().name(), "initializing");
        assert!(!readiness.state().is_ready());
    }

    #[test]
    fn session_reports_why_it_is_missing() {
        let readiness = Readiness::new();
        let err = readiness.state().session().err().unwrap();
        assert!(err.is_not_ready());
        assert!(err.to_string().contains("initializing"));

        readiness.set_failed(Error::model_load("no server", "gpt2"));
        let err = readiness.state().session().err().unwrap();
        assert!(matches!(err, Error::ModelLoad { .. }));

        readiness.set_ready(ChatSession::new(Box::new(Silent), &ChatConfig::new()));
        assert!(readiness.state().session().is_ok());
    }

    #[tokio::test]
    async fn settles_on_ready() {
        let readiness = Readiness::new();
        let publisher = readiness.clone();
        tokio::spawn(async move {
            publisher.set_ready(ChatSession::new(Box::new(Silent), &ChatConfig::new()));
        });
        let state = readiness.settled().await;
        assert!(state.is_ready());
        assert!(readiness.state().is_ready());
    }

    #[tokio::test]
    async fn settles_on_failure() {
        let readiness = Readiness::new();
        readiness.set_failed(Error::model_load("no server", "gpt2"));
        let state = readiness.settled().await;
        assert_eq!(state.name(), "failed");
        assert!(matches!(state, SessionState::Failed(Error::ModelLoad { .. })));
        assert!(matches!(readiness.failed().await, Error::ModelLoad { .. }));
    }

    #[tokio::test]
    async fn failed_stays_pending_once_ready() {
        let readiness = Readiness::ready(ChatSession::new(Box::new(Silent), &ChatConfig::new()));
        let outcome =
            tokio::time::timeout(std::time::Duration::from_millis(50), readiness.failed()).await;
        assert!(outcome.is_err());
    }
}
