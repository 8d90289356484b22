// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod generator;
pub mod hub;
pub mod model;
pub mod observability;
pub mod server;
pub mod template;
pub mod types;

// Re-exports
pub use chat::{ChatConfig, ChatSession, Reply};
pub use client::InferenceClient;
pub use error::{Error, Result};
pub use generator::{Generator, ServerGenerator};
pub use hub::HubClient;
pub use model::{LOAD_TROUBLESHOOTING, ModelLoader, ModelSource, TokenizerConfig};
pub use observability::{init_tracing, register_biometrics};
pub use template::{ChatTemplate, PromptTemplate};
pub use types::*;
