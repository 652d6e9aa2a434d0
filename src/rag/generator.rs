use tracing::{debug, error};

use crate::embeddings::{ChatMessage, ChatModel};

/// Prefix of every answer produced from a failed completion request
pub const ANSWER_ERROR_MARKER: &str = "[error]";

pub const DEFAULT_TEMPERATURE: f32 = 0.1;

pub const SYSTEM_PROMPT: &str = "You are a question-answering assistant that uses the information \
provided in the Context to answer concisely and precisely. If the answer is not in the Context, \
state clearly that you do not have enough information. Do NOT make up information.";

/// System instruction followed by the context and the question
#[inline]
pub fn build_messages(question: &str, context: &str) -> [ChatMessage; 2] {
    [
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Context:\n---\n{}\n---\n\nQuestion: {}",
            context, question
        )),
    ]
}

/// Ask `model` to answer `question` from `context`
///
/// Never fails: a transport or service error is turned into an answer
/// starting with [`ANSWER_ERROR_MARKER`].
#[inline]
pub fn generate_answer<M: ChatModel + ?Sized>(
    model: &M,
    question: &str,
    context: &str,
    temperature: f32,
) -> String {
    let messages = build_messages(question, context);
    debug!(
        "Requesting completion from {} ({} context chars)",
        model.model_name(),
        context.len()
    );

    match model.complete(&messages, temperature) {
        Ok(answer) => answer,
        Err(e) => {
            error!("Completion with {} failed: {:#}", model.model_name(), e);
            format!(
                "{} Could not get an answer from the language model '{}'. Make sure it is loaded and the server is running: {:#}",
                ANSWER_ERROR_MARKER,
                model.model_name(),
                e
            )
        }
    }
}

/// Whether `answer` came from a failed completion
#[inline]
pub fn is_error_answer(answer: &str) -> bool {
    answer.starts_with(ANSWER_ERROR_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Role;
    use std::cell::RefCell;

    struct RecordingModel {
        reply: Option<String>,
        seen: RefCell<Vec<(Vec<ChatMessage>, f32)>>,
    }

    impl RecordingModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                seen: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatModel for RecordingModel {
        fn model_name(&self) -> &str {
            "recording-model"
        }

        fn complete(&self, messages: &[ChatMessage], temperature: f32) -> anyhow::Result<String> {
            self.seen.borrow_mut().push((messages.to_vec(), temperature));
            self.reply
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection reset"))
        }
    }

    #[test]
    fn prompt_has_system_then_user_message() {
        let [system, user] = build_messages("What is Rust?", "--- Source: a.txt ---\nRust is a language.");

        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("enough information"));
        assert!(system.content.contains("NOT make up"));
        assert_eq!(user.role, Role::User);
        assert_eq!(
            user.content,
            "Context:\n---\n--- Source: a.txt ---\nRust is a language.\n---\n\nQuestion: What is Rust?"
        );
    }

    #[test]
    fn answer_is_returned_verbatim() {
        let model = RecordingModel::replying("  Rust is a language.\n");
        let answer = generate_answer(&model, "What is Rust?", "ctx", DEFAULT_TEMPERATURE);

        assert_eq!(answer, "  Rust is a language.\n");
        assert!(!is_error_answer(&answer));

        let seen = model.seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.len(), 2);
        assert!((seen[0].1 - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn failure_becomes_marked_answer() {
        let model = RecordingModel::failing();
        let answer = generate_answer(&model, "q", "ctx", DEFAULT_TEMPERATURE);

        assert!(is_error_answer(&answer));
        assert!(answer.contains("recording-model"));
        assert!(answer.contains("connection reset"));
    }

    #[test]
    fn empty_context_still_calls_the_model() {
        let model = RecordingModel::replying("I do not have enough information.");
        let answer = generate_answer(&model, "Unknown?", "", DEFAULT_TEMPERATURE);

        assert_eq!(answer, "I do not have enough information.");
        let seen = model.seen.borrow();
        assert!(seen[0].0[1].content.starts_with("Context:\n---\n\n---"));
    }
}
