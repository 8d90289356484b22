//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the conversation
//! log, builds prompts from it, and turns generator output into replies.

use std::time::Instant;

use crate::chat::config::ChatConfig;
use crate::error::{Error, Result};
use crate::generator::Generator;
use crate::observability::{
    SESSION_CLEARS, SESSION_GENERATION_ERRORS, SESSION_MESSAGES, SESSION_TURN_DURATION,
};
use crate::template::PromptTemplate;
use crate::types::{ConversationTurn, GenerationParams};

/// End-of-turn tokens that chat templates commonly leave behind.
pub const END_OF_TURN_MARKERS: [&str; 4] = ["<|im_end|>", "<|endoftext|>", "</s>", "<|end|>"];

/// Speaker labels that signal the model has started writing the next turn itself.
const DIALOGUE_MARKERS: [&str; 2] = ["User:", "Assistant:"];

/// Prefix of the assistant turn recorded when generation fails.
const FAILURE_PREFIX: &str = "Error generating response: ";

/// The outcome of one [`ChatSession::send_message`] call.
///
/// A failed generation still produces text: the error is rendered into a
/// message that is recorded as the assistant's turn, so the conversation log
/// always grows by exactly two turns. Callers decide whether to log or
/// display the underlying error differently.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The model produced a reply.
    Generated(String),

    /// Generation failed; `text` is what was recorded and should be shown.
    Failed {
        /// The error-describing text recorded as the assistant turn.
        text: String,
        /// The underlying error.
        error: Error,
    },
}

impl Reply {
    /// The text to show the user.
    pub fn text(&self) -> &str {
        match self {
            Reply::Generated(text) => text,
            Reply::Failed { text, .. } => text,
        }
    }

    /// Consumes the reply, returning its text.
    pub fn into_text(self) -> String {
        match self {
            Reply::Generated(text) => text,
            Reply::Failed { text, .. } => text,
        }
    }

    /// The generation error, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Reply::Generated(_) => None,
            Reply::Failed { error, .. } => Some(error),
        }
    }

    /// Returns true if generation failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Reply::Failed { .. })
    }
}

/// A chat session: a loaded model handle plus the conversation log.
///
/// The session is not designed for concurrent mutation; shared owners must
/// serialize access (the web gateway wraps it in a mutex).
pub struct ChatSession {
    model_id: String,
    generator: Box<dyn Generator>,
    template: PromptTemplate,
    generation: GenerationParams,
    system_prompt: String,
    history_window: usize,
    end_markers: Vec<String>,
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    /// Creates a session that formats prompts with the plain transcript layout.
    pub fn new(generator: Box<dyn Generator>, config: &ChatConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            generator,
            template: PromptTemplate::Plain,
            generation: config.generation.clone(),
            system_prompt: config.system_prompt.clone(),
            history_window: config.history_window,
            end_markers: END_OF_TURN_MARKERS.iter().map(|m| m.to_string()).collect(),
            history: Vec::new(),
        }
    }

    /// Uses `template` to lay out prompts.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Adds an end-of-turn marker (e.g. the model's eos token) to strip from replies.
    pub fn with_end_marker(mut self, marker: impl Into<String>) -> Self {
        let marker = marker.into();
        if !marker.is_empty() && !self.end_markers.contains(&marker) {
            self.end_markers.push(marker);
        }
        self
    }

    /// Sends a user message and returns the model's reply.
    ///
    /// This method:
    /// 1. Builds a prompt from the turns in the history window
    /// 2. Calls the generator
    /// 3. Cleans the raw completion
    /// 4. Appends the user message and the reply (or the failure text)
    ///
    /// Both turns are appended after generation finishes, so dropping the
    /// returned future leaves the history untouched.
    ///
    /// # Example
    ///
    /// ```
    /// use palaver::chat::{ChatConfig, ChatSession};
    /// use palaver::{GenerationParams, Generator, Result};
    ///
    /// struct Canned;
    ///
    /// #[async_trait::async_trait]
    /// impl Generator for Canned {
    ///     async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
    ///         Ok("Hello!\nUser: keep going".to_string())
    ///     }
    /// }
    ///
    /// # tokio_test::block_on(async {
    /// let mut session = ChatSession::new(Box::new(Canned), &ChatConfig::new());
    /// let reply = session.send_message("hi").await;
    /// assert_eq!(reply.text(), "Hello!");
    /// assert_eq!(session.message_count(), 2);
    /// # });
    /// ```
    pub async fn send_message(&mut self, user_text: &str) -> Reply {
        let start = Instant::now();
        SESSION_MESSAGES.click();

        let prior = &self.history;
        let outcome = match self.prompt_for(prior, user_text) {
            Ok(prompt) => {
                tracing::debug!(
                    model = %self.model_id,
                    prompt_chars = prompt.len(),
                    prior_turns = prior.len(),
                    "generating reply"
                );
                self.generator.generate(&prompt, &self.generation).await
            }
            Err(err) => Err(err),
        };

        let reply = match outcome {
            Ok(raw) => Reply::Generated(clean_reply(&raw, &self.end_markers)),
            Err(error) => {
                SESSION_GENERATION_ERRORS.click();
                tracing::warn!(model = %self.model_id, error = %error, "generation failed");
                Reply::Failed {
                    text: format!("{FAILURE_PREFIX}{error}"),
                    error,
                }
            }
        };

        self.history.push(ConversationTurn::user(user_text));
        self.history
            .push(ConversationTurn::assistant(reply.text().to_string()));
        SESSION_TURN_DURATION.add(start.elapsed().as_secs_f64());
        reply
    }

    /// Builds the prompt that sending `user_text` now would produce.
    pub fn build_prompt(&self, user_text: &str) -> Result<String> {
        self.prompt_for(&self.history, user_text)
    }

    fn prompt_for(&self, prior: &[ConversationTurn], user_text: &str) -> Result<String> {
        let system = prior.is_empty().then_some(self.system_prompt.as_str());
        let skip = prior.len().saturating_sub(self.history_window);
        self.template.render(system, &prior[skip..], user_text)
    }

    /// Clears the conversation history.
    pub fn clear_history(&mut self) {
        SESSION_CLEARS.click();
        self.history.clear();
    }

    /// Returns a copy of the conversation history.
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.history.clone()
    }

    /// Returns the number of turns in the conversation.
    pub fn message_count(&self) -> usize {
        self.history.len()
    }

    /// Returns the model identifier.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Returns the prompt layout in use.
    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    /// Returns the number of prior turns included in each prompt.
    pub fn history_window(&self) -> usize {
        self.history_window
    }

    /// Returns the markers stripped from the end of replies.
    pub fn end_markers(&self) -> &[String] {
        &self.end_markers
    }
}

/// Cleans a raw completion.
///
/// Everything from the first `User:` or `Assistant:` label onward is dropped,
/// then any of `end_markers` is stripped from the tail.
pub fn clean_reply(raw: &str, end_markers: &[String]) -> String {
    let mut text = raw.trim();
    for marker in DIALOGUE_MARKERS {
        if let Some(index) = text.find(marker) {
            text = text[..index].trim();
        }
    }
    for marker in end_markers {
        if let Some(stripped) = text.strip_suffix(marker.as_str()) {
            text = stripped.trim();
        }
    }
    text.to_string()
}
