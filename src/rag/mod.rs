// RAG module
// Query pipeline: embed the question, retrieve context, generate an answer

pub mod generator;
pub mod retriever;
pub mod session;

pub use generator::{ANSWER_ERROR_MARKER, SYSTEM_PROMPT, generate_answer, is_error_answer};
pub use retriever::{RetrievedContext, retrieve_context};
pub use session::{QueryOutcome, RagSession};
