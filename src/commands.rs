use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::io::BufRead;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::ChunkStore;
use crate::embeddings::{ChatModel, Embedder, OpenAiClient};
use crate::indexer::Indexer;
use crate::rag::{RagSession, is_error_answer};

/// Words that end the interactive loop, compared case-insensitively
pub const EXIT_COMMANDS: &[&str] = &["exit", "quit"];

const STATUS_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

const MISSING_INDEX_HINT: &str = "Failed to load the index. Run 'local-rag ingest' first";

/// Index every document under the configured documents directory
#[inline]
pub fn ingest(config: &Config) -> Result<()> {
    let documents_dir = &config.paths.documents_dir;
    let index_dir = &config.paths.index_dir;
    info!(
        "Ingesting {} into {}",
        documents_dir.display(),
        index_dir.display()
    );

    let client =
        OpenAiClient::new(&config.server).context("Failed to initialize server client")?;
    eprintln!(
        "🧠 Generating embeddings with {}",
        style(client.embedding_model()).cyan()
    );

    let report = Indexer::from_config(client, config)
        .run(documents_dir, index_dir)
        .context("Ingestion failed")?;

    println!("Indexing completed!");
    println!("  Documents read: {}", report.documents);
    println!("  Chunks created: {}", report.chunks_created);
    println!("  Chunks indexed: {}", report.chunks_indexed);
    println!("  Embedding dimension: {}", report.dimension);
    if let Some(failed) = &report.failed_batch {
        warn!("Ingestion stopped early: {}", failed);
        println!(
            "  {} embedding stopped early ({}); {} chunks were left out",
            style("Warning:").yellow(),
            failed,
            report.chunks_created - report.chunks_indexed
        );
    }
    println!("  Index directory: {}", index_dir.display());

    Ok(())
}

/// Answer a single question and print the result
#[inline]
pub fn ask(config: &Config, question: &str) -> Result<()> {
    let session = RagSession::open(config).context(MISSING_INDEX_HINT)?;
    answer_question(&session, question)
}

/// Interactive question loop over the persisted index
#[inline]
pub fn chat(config: &Config) -> Result<()> {
    let session = RagSession::open(config).context(MISSING_INDEX_HINT)?;

    eprintln!("{}", style("=".repeat(50)).dim());
    eprintln!("{}", style("Local RAG ready. Ask your question!").bold().cyan());
    eprintln!(
        "LLM: {} | Embeddings: {}",
        style(&config.server.chat_model).cyan(),
        style(&config.server.embedding_model).cyan()
    );
    eprintln!("Type '{}' to finish.", EXIT_COMMANDS.join("' or '"));
    eprintln!("{}", style("=".repeat(50)).dim());

    if console::user_attended() {
        chat_loop(&session, || {
            let line: String = Input::new()
                .with_prompt("❓ Question")
                .allow_empty(true)
                .interact_text()?;
            Ok(Some(line))
        })?;
    } else {
        let mut lines = std::io::stdin().lock().lines();
        chat_loop(&session, || lines.next().transpose().map_err(Into::into))?;
    }

    eprintln!("👋 Goodbye!");
    Ok(())
}

/// Run questions from `next_line` until it is exhausted or an exit command is read
///
/// A question that fails is reported and the loop carries on.
#[inline]
pub fn chat_loop<E, C, F>(session: &RagSession<E, C>, mut next_line: F) -> Result<usize>
where
    E: Embedder,
    C: ChatModel,
    F: FnMut() -> Result<Option<String>>,
{
    let mut answered = 0;

    while let Some(line) = next_line()? {
        let question = line.trim();
        if is_exit_command(question) {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match answer_question(session, question) {
            Ok(()) => answered += 1,
            Err(e) => {
                error!("Query failed: {:#}", e);
                eprintln!("{} {:#}", style("❌ Query failed:").red(), e);
            }
        }
    }

    Ok(answered)
}

#[inline]
pub fn is_exit_command(input: &str) -> bool {
    EXIT_COMMANDS
        .iter()
        .any(|command| input.trim().eq_ignore_ascii_case(command))
}

fn answer_question<E: Embedder, C: ChatModel>(
    session: &RagSession<E, C>,
    question: &str,
) -> Result<()> {
    let outcome = session.ask(question)?;

    eprintln!(
        "🔍 Context retrieved from {} fragments. Unique sources: {:?}",
        outcome.fragments, outcome.sources
    );
    println!("{}", style("-".repeat(50)).dim());
    if is_error_answer(&outcome.answer) {
        println!("{}", style(&outcome.answer).red());
    } else {
        println!("{}", style("💡 Answer:").bold().green());
        println!("{}", outcome.answer);
    }
    println!("{}", style("-".repeat(50)).dim());

    Ok(())
}

/// Show the configuration summary and what the persisted index contains
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("Local RAG Status");
    println!("================");
    println!();
    println!("🤖 Server: {}", config.server_url()?);
    println!("   Embedding model: {}", config.server.embedding_model);
    println!("   Chat model: {}", config.server.chat_model);
    match OpenAiClient::new(&config.server) {
        Ok(client) => match client
            .with_timeout(STATUS_CHECK_TIMEOUT)
            .health_check()
        {
            Ok(()) => println!("   ✅ Connected, both models loaded"),
            Err(e) => println!("   ⚠️  Unhealthy - {:#}", e),
        },
        Err(e) => println!("   ❌ Failed to create client - {:#}", e),
    }
    println!(
        "Chunking: {} chars with {} overlap, top {} fragments per question",
        config.chunking.chunk_size, config.chunking.overlap, config.retrieval.top_k
    );
    println!("Documents: {}", config.paths.documents_dir.display());
    println!("Index: {}", config.paths.index_dir.display());
    println!();

    let store = ChunkStore::load(&config.paths.index_dir).context(MISSING_INDEX_HINT)?;
    let sources = store.sources();
    println!("📚 {} chunks indexed", store.len());
    println!("   Embedding dimension: {}", store.dimension());
    println!("   Sources ({}):", sources.len());
    for source in sources {
        println!("     - {}", source);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::ChunkRecord;
    use crate::embeddings::ChatMessage;
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedEmbedder;

    impl Embedder for FixedEmbedder {
        fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("fail")) {
                anyhow::bail!("embedding service down");
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[derive(Default)]
    struct CountingModel(Cell<usize>);

    impl ChatModel for CountingModel {
        fn model_name(&self) -> &str {
            "counting"
        }

        fn complete(&self, _messages: &[ChatMessage], _temperature: f32) -> anyhow::Result<String> {
            self.0.set(self.0.get() + 1);
            Ok("answer".to_string())
        }
    }

    fn session(model: &CountingModel) -> RagSession<FixedEmbedder, &CountingModel> {
        let records = vec![ChunkRecord {
            chunk_id: 0,
            source: "a.txt".to_string(),
            text: "content".to_string(),
        }];
        let store = ChunkStore::build(records, &[vec![1.0, 0.0]]).expect("store builds");
        RagSession::new(store, FixedEmbedder, model)
    }

    fn lines(input: &[&str]) -> impl FnMut() -> Result<Option<String>> {
        let mut lines = input
            .iter()
            .map(|line| (*line).to_string())
            .collect::<Vec<_>>()
            .into_iter();
        move || Ok(lines.next())
    }

    #[test]
    fn exit_commands_are_case_insensitive() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("  QUIT "));
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command(""));
    }

    #[test]
    fn loop_stops_at_exit_and_skips_blank_lines() {
        let model = CountingModel::default();
        let answered = chat_loop(
            &session(&model),
            lines(&["first question", "   ", "second question", "Exit", "never asked"]),
        )
        .expect("loop runs");

        assert_eq!(answered, 2);
        assert_eq!(model.0.get(), 2);
    }

    #[test]
    fn failed_query_does_not_end_the_loop() {
        let model = CountingModel::default();
        let answered = chat_loop(
            &session(&model),
            lines(&["please fail", "works fine"]),
        )
        .expect("loop runs");

        assert_eq!(answered, 1);
        assert_eq!(model.0.get(), 1);
    }

    #[test]
    fn loop_ends_when_input_runs_out() {
        let model = CountingModel::default();
        let answered = chat_loop(&session(&model), lines(&[])).expect("loop runs");
        assert_eq!(answered, 0);
    }

    #[test]
    fn status_without_index_fails_with_hint() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = unreachable_config(&temp_dir);
        config.paths.index_dir = temp_dir.path().join("missing");

        let err = show_status(&config).expect_err("status needs an index");
        assert!(format!("{:#}", err).contains("local-rag ingest"));
    }

    fn unreachable_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9;
        config.paths.index_dir = temp_dir.path().to_path_buf();
        config
    }

    fn save_sample_store(dir: &std::path::Path) {
        let model = CountingModel::default();
        session(&model).store().save(dir).expect("store saves");
    }

    #[test]
    fn status_reports_saved_index_with_unreachable_server() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let config = unreachable_config(&temp_dir);
        save_sample_store(temp_dir.path());

        assert!(show_status(&config).is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_checks_server_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [
                    {"id": "test-embedder", "object": "model"},
                    {"id": "test-chat", "object": "model"},
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = unreachable_config(&temp_dir);
        config.server.host = server.address().ip().to_string();
        config.server.port = server.address().port();
        config.server.embedding_model = "test-embedder".to_string();
        config.server.chat_model = "test-chat".to_string();
        save_sample_store(temp_dir.path());

        let result = tokio::task::spawn_blocking(move || show_status(&config))
            .await
            .expect("task completes");
        assert!(result.is_ok());
    }

    #[test]
    fn ask_without_index_fails() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = Config::default();
        config.paths.index_dir = temp_dir.path().join("missing");

        assert!(ask(&config, "anything").is_err());
    }
}
