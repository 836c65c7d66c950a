//! End-to-end pipeline scenarios with stub model collaborators.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use docschat_backend::action::{spawn_applier, ActionLog, SearchAction, UpdateBus};
use docschat_backend::answer::AnswerService;
use docschat_backend::core::config::RetrievalConfig;
use docschat_backend::core::errors::AppError;
use docschat_backend::corpus::CorpusLoader;
use docschat_backend::llm::{ChatModel, Embedder, TokenStream};
use docschat_backend::rag::prompt::PromptBuilder;

const SUPPORT_CONTACT: &str = "the docs support desk";

/// Embedder that maps known texts to fixed vectors.
struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl StubEmbedder {
    fn new(entries: &[(&str, Vec<f32>)], fallback: Vec<f32>) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            fallback,
        }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AppError> {
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Chat model that records the prompt it was given and replays a scripted
/// token sequence, optionally ending with an error.
struct ScriptedChat {
    tokens: Vec<String>,
    error: Option<String>,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedChat {
    fn completing(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            error: None,
            last_prompt: Mutex::new(None),
        }
    }

    fn failing(tokens: &[&str], error: &str) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            error: Some(error.to_string()),
            last_prompt: Mutex::new(None),
        }
    }

    async fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().await.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn stream_chat(&self, prompt: &str) -> Result<TokenStream, AppError> {
        *self.last_prompt.lock().await = Some(prompt.to_string());

        let (tx, rx) = mpsc::channel(8);
        let tokens = self.tokens.clone();
        let error = self.error.clone();
        tokio::spawn(async move {
            for token in tokens {
                if tx.send(Ok(token)).await.is_err() {
                    return;
                }
            }
            if let Some(message) = error {
                let _ = tx.send(Err(AppError::Generation(message))).await;
            }
        });
        Ok(rx)
    }
}

struct Harness {
    actions: Arc<ActionLog>,
    service: Arc<AnswerService>,
    chat: Arc<ScriptedChat>,
}

fn harness(corpus_path: &std::path::Path, embedder: StubEmbedder, chat: ScriptedChat) -> Harness {
    let actions = Arc::new(ActionLog::new());
    let (updates, update_rx) = UpdateBus::channel();
    spawn_applier(actions.clone(), update_rx);

    let chat = Arc::new(chat);
    let service = Arc::new(AnswerService::new(
        CorpusLoader::new(corpus_path),
        Arc::new(embedder),
        chat.clone(),
        PromptBuilder::new(SUPPORT_CONTACT),
        RetrievalConfig {
            max_results: 10,
            min_score: 0.7,
        },
        updates,
    ));

    Harness {
        actions,
        service,
        chat,
    }
}

async fn run_init(harness: &Harness) -> SearchAction {
    let action = harness
        .actions
        .insert(SearchAction::new(
            "Initializing search engine, please stand by...",
        ))
        .await;
    harness.service.init(action.id).await;
    wait_until_finished(&harness.actions, action.id).await
}

async fn run_question(harness: &Harness, question: &str) -> SearchAction {
    let action = harness.actions.insert(SearchAction::new(question)).await;
    harness.service.ask(action.id, question.to_string()).await;
    wait_until_finished(&harness.actions, action.id).await
}

async fn wait_until_finished(actions: &ActionLog, id: Uuid) -> SearchAction {
    for _ in 0..500 {
        if let Some(action) = actions.get(id).await {
            if action.finished {
                return action;
            }
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("action {id} did not finish in time");
}

fn corpus_file(json: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(json.as_bytes()).expect("write corpus");
    file
}

fn single_section_corpus() -> tempfile::NamedTempFile {
    corpus_file(
        r#"[{
            "objectID": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
            "groupId": "g1",
            "groupLabel": "Guides",
            "version": "1.0",
            "title": "Using X",
            "section": "Basics",
            "url": "https://docs/x",
            "link": "https://docs/x",
            "content": "Use X for Y"
        }]"#,
    )
}

#[tokio::test]
async fn grounded_question_streams_answer_with_related_link() {
    let corpus = single_section_corpus();
    // Question embedding scores ~0.9 against the stored passage.
    let embedder = StubEmbedder::new(
        &[
            ("Use X for Y", vec![1.0, 0.0]),
            ("How do I use X?", vec![0.9, 0.436]),
        ],
        vec![0.0, 1.0],
    );
    let harness = harness(
        corpus.path(),
        embedder,
        ScriptedChat::completing(&["Use ", "X ", "for ", "Y."]),
    );

    let init = run_init(&harness).await;
    assert!(init.finished);
    assert!(init.answer.contains("Loaded number of JSON content sections: 1"));
    assert!(init.answer.contains("Chat model is ready"));

    let action = run_question(&harness, "How do I use X?").await;

    assert_eq!(action.related_links, "https://docs/x");
    assert!(action.answer.starts_with("Use X for Y."));
    assert!(action
        .answer
        .contains("Answer is complete for 'How do I use X?', size: 12"));
    assert!(action.finished);

    let prompt = harness.chat.last_prompt().await.expect("prompt sent");
    assert!(prompt.contains("Use X for Y. LINK: https://docs/x. GROUP_ID: g1"));
    assert!(prompt.contains("How do I use X?"));
}

#[tokio::test]
async fn empty_corpus_selects_redirect_prompt() {
    let corpus = corpus_file("[]");
    let embedder = StubEmbedder::new(&[], vec![1.0, 0.0]);
    let harness = harness(
        corpus.path(),
        embedder,
        ScriptedChat::completing(&["Please ask the support desk."]),
    );

    let init = run_init(&harness).await;
    assert!(init.answer.contains("Converted to number of text segments: 0"));
    assert!(init.answer.contains("Chat model is ready"));

    let action = run_question(&harness, "Anything at all?").await;

    assert_eq!(action.related_links, "");
    assert!(action.finished);

    let prompt = harness.chat.last_prompt().await.expect("prompt sent");
    assert!(prompt.contains(SUPPORT_CONTACT));
    assert!(prompt.contains("Anything at all?"));
    assert!(!prompt.contains("LINK:"));
    assert!(!prompt.contains("Base your answer"));
}

#[tokio::test]
async fn missing_corpus_degrades_to_not_ready_answers() {
    let embedder = StubEmbedder::new(&[], vec![1.0, 0.0]);
    let harness = harness(
        std::path::Path::new("/nonexistent/docs_index.json"),
        embedder,
        ScriptedChat::completing(&["never sent"]),
    );

    let init = run_init(&harness).await;
    assert!(init.finished);
    assert!(init.answer.contains("Could not find the JSON file"));
    assert!(!harness.service.index().is_ready());

    let action = run_question(&harness, "Still there?").await;
    assert!(action.finished);
    assert!(action
        .answer
        .contains("The chat model is not ready yet... Please try again later."));
    assert!(harness.chat.last_prompt().await.is_none());
}

#[tokio::test]
async fn token_sequence_accumulates_before_completion_footer() {
    let corpus = single_section_corpus();
    let embedder = StubEmbedder::new(
        &[("Use X for Y", vec![1.0, 0.0])],
        vec![1.0, 0.0],
    );
    let harness = harness(corpus.path(), embedder, ScriptedChat::completing(&["A", "B"]));

    run_init(&harness).await;
    let action = run_question(&harness, "q").await;

    assert!(action.answer.starts_with("AB"));
    assert!(action
        .answer
        .contains("\n\nAnswer is complete for 'q', size: 2"));
    assert!(action.finished);
}

#[tokio::test]
async fn generation_error_appends_error_footer() {
    let corpus = single_section_corpus();
    let embedder = StubEmbedder::new(
        &[("Use X for Y", vec![1.0, 0.0])],
        vec![1.0, 0.0],
    );
    let harness = harness(
        corpus.path(),
        embedder,
        ScriptedChat::failing(&["partial"], "connection reset"),
    );

    run_init(&harness).await;
    let action = run_question(&harness, "q").await;

    assert!(action.answer.starts_with("partial"));
    assert!(action.answer.contains("Something went wrong:"));
    assert!(action.answer.contains("connection reset"));
    assert!(action.finished);
    assert!(!action.answer.contains("Answer is complete"));
}

#[tokio::test]
async fn below_threshold_matches_redirect_instead_of_grounding() {
    let corpus = single_section_corpus();
    // Orthogonal question vector: stored passage scores 0.0, below 0.7.
    let embedder = StubEmbedder::new(
        &[
            ("Use X for Y", vec![1.0, 0.0]),
            ("What about Z?", vec![0.0, 1.0]),
        ],
        vec![0.0, 1.0],
    );
    let harness = harness(
        corpus.path(),
        embedder,
        ScriptedChat::completing(&["Ask support."]),
    );

    run_init(&harness).await;
    let action = run_question(&harness, "What about Z?").await;

    assert_eq!(action.related_links, "");
    assert!(action.finished);

    let prompt = harness.chat.last_prompt().await.expect("prompt sent");
    assert!(prompt.contains(SUPPORT_CONTACT));
    assert!(!prompt.contains("Use X for Y"));
}
