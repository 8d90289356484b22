//! Prompt construction.
//!
//! A prompt is the single text blob handed to the generator: an optional
//! system instruction, a window of prior turns, and the new user message.
//! Models that ship a Jinja chat template get it rendered with `minijinja`;
//! everything else gets a plain `User:`/`Assistant:` transcript.

use minijinja::{Environment, ErrorKind, context};
use minijinja_contrib::pycompat::unknown_method_callback;
use serde::Serialize;

use crate::error::Result;
use crate::types::{ConversationTurn, Role};

/// How prompts are laid out for the loaded model.
#[derive(Debug, Clone)]
pub enum PromptTemplate {
    /// The model's own chat template.
    Chat(ChatTemplate),

    /// `User: ...\nAssistant: ...` transcript.
    Plain,
}

impl PromptTemplate {
    /// Assemble a prompt.
    ///
    /// `system` is included only when the caller passes it; `window` holds the
    /// prior turns in conversational order.
    pub fn render(
        &self,
        system: Option<&str>,
        window: &[ConversationTurn],
        user_text: &str,
    ) -> Result<String> {
        match self {
            PromptTemplate::Chat(template) => template.render(system, window, user_text),
            PromptTemplate::Plain => Ok(render_plain(system, window, user_text)),
        }
    }

    /// Returns true if this is the model's own chat template.
    pub fn is_chat_template(&self) -> bool {
        matches!(self, PromptTemplate::Chat(_))
    }
}

/// A Jinja chat template as published in a model's `tokenizer_config.json`.
#[derive(Debug, Clone)]
pub struct ChatTemplate {
    source: String,
    bos_token: Option<String>,
    eos_token: Option<String>,
}

#[derive(Serialize)]
struct TemplateMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl ChatTemplate {
    /// Compiles `source` once to surface syntax errors early.
    pub fn new(
        source: impl Into<String>,
        bos_token: Option<String>,
        eos_token: Option<String>,
    ) -> Result<Self> {
        let template = Self {
            source: source.into(),
            bos_token,
            eos_token,
        };
        let env = environment();
        env.template_from_str(&template.source)?;
        Ok(template)
    }

    /// The end-of-sequence token the template was published with.
    pub fn eos_token(&self) -> Option<&str> {
        self.eos_token.as_deref()
    }

    fn render(
        &self,
        system: Option<&str>,
        window: &[ConversationTurn],
        user_text: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(window.len() + 2);
        if let Some(system) = system {
            messages.push(TemplateMessage {
                role: "system",
                content: system,
            });
        }
        messages.extend(window.iter().map(|turn| TemplateMessage {
            role: turn.role.as_str(),
            content: &turn.content,
        }));
        messages.push(TemplateMessage {
            role: "user",
            content: user_text,
        });

        let env = environment();
        let template = env.template_from_str(&self.source)?;
        let rendered = template.render(context! {
            messages => messages,
            add_generation_prompt => true,
            bos_token => self.bos_token.as_deref().unwrap_or(""),
            eos_token => self.eos_token.as_deref().unwrap_or(""),
        })?;
        Ok(rendered)
    }
}

// Hugging Face renders chat templates with trim_blocks and lstrip_blocks.
fn environment<'source>() -> Environment<'source> {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.set_unknown_method_callback(unknown_method_callback);
    env.add_function(
        "raise_exception",
        |message: String| -> std::result::Result<String, minijinja::Error> {
            Err(minijinja::Error::new(ErrorKind::InvalidOperation, message))
        },
    );
    env
}

fn render_plain(system: Option<&str>, window: &[ConversationTurn], user_text: &str) -> String {
    let mut prompt = String::new();
    if let Some(system) = system {
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }
    for turn in window {
        let label = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        prompt.push_str(label);
        prompt.push_str(": ");
        prompt.push_str(&turn.content);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(user_text);
    prompt.push_str("\nAssistant:");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHATML: &str = r#"{% for message in messages %}{{ '<|im_start|>' + message['role'] + '\n' + message['content'] + '<|im_end|>' + '\n' }}{% endfor %}{% if add_generation_prompt %}{{ '<|im_start|>assistant\n' }}{% endif %}"#;

    #[test]
    fn plain_first_turn_includes_system() {
        let prompt = PromptTemplate::Plain
            .render(Some("Be helpful."), &[], "hi")
            .unwrap();
        assert_eq!(prompt, "Be helpful.\n\nUser: hi\nAssistant:");
    }

    #[test]
    fn plain_replays_window_in_order() {
        let window = vec![
            ConversationTurn::user("one"),
            ConversationTurn::assistant("two"),
        ];
        let prompt = PromptTemplate::Plain.render(None, &window, "three").unwrap();
        assert_eq!(
            prompt,
            "User: one\nAssistant: two\nUser: three\nAssistant:"
        );
    }

    #[test]
    fn chatml_template_renders_generation_prompt() {
        let template = PromptTemplate::Chat(ChatTemplate::new(CHATML, None, None).unwrap());
        let window = vec![
            ConversationTurn::user("hello"),
            ConversationTurn::assistant("hi there"),
        ];
        let prompt = template.render(Some("sys"), &window, "how are you?").unwrap();
        assert_eq!(
            prompt,
            "<|im_start|>system\nsys<|im_end|>\n\
             <|im_start|>user\nhello<|im_end|>\n\
             <|im_start|>assistant\nhi there<|im_end|>\n\
             <|im_start|>user\nhow are you?<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn template_sees_special_tokens() {
        let source = "{{ bos_token }}{% for m in messages %}[{{ m.role }}]{{ m.content }}{{ eos_token }}{% endfor %}";
        let template = ChatTemplate::new(source, Some("<s>".into()), Some("</s>".into())).unwrap();
        let prompt = PromptTemplate::Chat(template).render(None, &[], "x").unwrap();
        assert_eq!(prompt, "<s>[user]x</s>");
    }

    #[test]
    fn raise_exception_fails_render() {
        let source = "{% if messages[0]['role'] != 'system' %}{{ raise_exception('system first') }}{% endif %}";
        let template = PromptTemplate::Chat(ChatTemplate::new(source, None, None).unwrap());
        let err = template.render(None, &[], "hi").unwrap_err();
        assert!(err.to_string().contains("system first"));
        assert!(template.render(Some("s"), &[], "hi").is_ok());
    }

    #[test]
    fn syntax_errors_surface_at_construction() {
        assert!(ChatTemplate::new("{% for m in messages %}", None, None).is_err());
    }

    #[test]
    fn python_string_methods_are_available() {
        let source = "{% for m in messages %}{{ m.role.upper() }}: {{ m.content.strip() }}\n{% endfor %}";
        let template = PromptTemplate::Chat(ChatTemplate::new(source, None, None).unwrap());
        let prompt = template.render(None, &[], "  padded  ").unwrap();
        assert_eq!(prompt, "USER: padded\n");
    }
}
