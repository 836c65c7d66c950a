//! The answer pipeline.
//!
//! [`AnswerService::init`] runs once at startup: load the corpus, embed it,
//! publish the index. [`AnswerService::ask`] runs once per question on its
//! own worker: embed the question, retrieve passages, emit related links,
//! build the prompt and stream the generated answer. Both report solely
//! through the action update channel.

use std::sync::Arc;

use uuid::Uuid;

use crate::action::UpdateBus;
use crate::core::config::RetrievalConfig;
use crate::core::errors::AppError;
use crate::corpus::CorpusLoader;
use crate::llm::{ChatModel, Embedder};
use crate::rag::index::{EmbeddingIndex, IndexHandle, IngestStage};
use crate::rag::prompt::PromptBuilder;

pub struct AnswerService {
    loader: CorpusLoader,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    prompts: PromptBuilder,
    retrieval: RetrievalConfig,
    index: IndexHandle,
    updates: UpdateBus,
}

impl AnswerService {
    pub fn new(
        loader: CorpusLoader,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        prompts: PromptBuilder,
        retrieval: RetrievalConfig,
        updates: UpdateBus,
    ) -> Self {
        Self {
            loader,
            embedder,
            chat,
            prompts,
            retrieval,
            index: IndexHandle::new(),
            updates,
        }
    }

    pub fn index(&self) -> &IndexHandle {
        &self.index
    }

    /// Build the search index, reporting progress into `action_id`.
    ///
    /// Runs once, on its own worker, strictly before any question is
    /// served. A failed load or embed is terminal for this run: the index
    /// stays unpublished and questions get the not-ready answer. No retry.
    pub async fn init(&self, action_id: Uuid) {
        self.updates.append_answer(action_id, "Initiating...");

        let sections = match self.loader.load() {
            Ok(sections) => sections,
            Err(err) => {
                tracing::warn!("Corpus load failed: {}", err);
                let message = match err {
                    AppError::ResourceNotFound(_) => "\nCould not find the JSON file".to_string(),
                    err => format!("\nError while reading JSON data: {err}"),
                };
                self.updates.append_answer_finish(action_id, message);
                return;
            }
        };
        self.updates.append_answer(
            action_id,
            format!("\nLoaded number of JSON content sections: {}", sections.len()),
        );

        let built = EmbeddingIndex::ingest(sections, self.embedder.as_ref(), |stage| {
            let message = match stage {
                IngestStage::SegmentsConverted(count) => {
                    format!("\nConverted to number of text segments: {count}")
                }
                IngestStage::EmbeddingsComputed(count) => {
                    format!("\nNumber of embeddings: {count}")
                }
                IngestStage::EmbeddingsStored(_) => {
                    "\nEmbeddings are added to the store".to_string()
                }
            };
            self.updates.append_answer(action_id, message);
        })
        .await;

        let index = match built {
            Ok(index) => index,
            Err(err) => {
                tracing::error!("Index build failed: {}", err);
                self.updates
                    .append_answer_finish(action_id, format!("\nError while building the index: {err}"));
                return;
            }
        };

        let count = index.len();
        if !self.index.publish(index) {
            tracing::warn!("Search index was already published");
        }
        tracing::info!("Search index ready with {} passages", count);
        self.updates
            .append_answer_finish(action_id, "\nChat model is ready");
    }

    /// Answer one question, streaming into `action_id`.
    ///
    /// Every failure mode resolves to a terminal action with a readable
    /// message; nothing escalates past this method.
    pub async fn ask(&self, action_id: Uuid, question: String) {
        tracing::info!("Asking question '{}'", question);

        let result = match self.index.get() {
            Some(index) => self.answer(index, action_id, &question).await,
            None => Err(AppError::IndexNotReady),
        };

        match result {
            Ok(()) => {}
            Err(AppError::IndexNotReady) => {
                self.updates.append_answer_finish(
                    action_id,
                    "The chat model is not ready yet... Please try again later.",
                );
            }
            Err(err) => {
                tracing::error!("Error while receiving answer: {}", err);
                self.updates
                    .append_answer_finish(action_id, format!("\n\nSomething went wrong: {err}"));
            }
        }
    }

    async fn answer(
        &self,
        index: &EmbeddingIndex,
        action_id: Uuid,
        question: &str,
    ) -> Result<(), AppError> {
        let question_vector = self.embedder.embed(question).await?;
        let matches = index.query(
            &question_vector,
            self.retrieval.max_results,
            self.retrieval.min_score,
        )?;
        tracing::info!(
            "Number of relevant embeddings: {} for '{}'",
            matches.len(),
            question
        );

        // Related links go out before generation starts, in match order.
        for m in &matches {
            tracing::info!("Adding link: {}", m.passage.metadata.link);
            self.updates
                .append_related_link(action_id, &m.passage.metadata.link);
        }

        let prompt = self.prompts.build(question, &matches)?;

        let mut tokens = self.chat.stream_chat(&prompt).await?;
        let mut streamed = 0usize;
        while let Some(item) = tokens.recv().await {
            let token = item?;
            streamed += token.chars().count();
            self.updates.append_answer(action_id, token);
        }

        self.updates.append_answer_finish(
            action_id,
            format!("\n\nAnswer is complete for '{question}', size: {streamed}"),
        );
        Ok(())
    }
}
