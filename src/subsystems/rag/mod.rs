//! RAG subsystem — crawl, chunk, embed, retrieve, stream an answer.
//!
//! - **crawl** — breadth-first crawler producing Markdown pages.
//! - **index** — chunking and the in-memory cosine index.
//!
//! The index is rebuilt from scratch on every start and never persisted.
//! Queries take a read lock; ingest and the startup build take the write
//! lock only for the final insert.

pub mod crawl;
pub mod index;

use std::path::PathBuf;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{Config, RagConfig};
use crate::error::AppError;
use crate::llm::{LlmProvider, TextStream};
use crate::subsystems::agents::core::prompt::PromptBuilder;

use crawl::Crawler;
use index::{Chunk, ScoredChunk, VectorIndex, split_markdown};

const RAG_TEMPLATE: &str = "rag_qa.txt";
const RAG_FALLBACK: &str = "Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know.\nQuestion: {{question}}\n\
Context: {{context}}\nAnswer:";

/// Source label for chunks added through `/ingest`.
pub const INGEST_SOURCE: &str = "ingest";

const EMBED_BATCH: usize = 64;

pub struct RagService {
    provider: LlmProvider,
    index: RwLock<VectorIndex>,
    config: RagConfig,
    prompts_dir: PathBuf,
}

impl RagService {
    pub fn new(provider: LlmProvider, config: &Config) -> Self {
        Self {
            provider,
            index: RwLock::new(VectorIndex::new()),
            config: config.rag.clone(),
            prompts_dir: config.agents.prompts_dir.clone(),
        }
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Crawl the configured root and index every page. Returns chunks added.
    pub async fn build_index(&self) -> Result<usize, AppError> {
        let crawler = Crawler::new(&self.config)?;
        let pages = crawler.crawl().await;

        let mut chunks = Vec::new();
        for page in &pages {
            let pieces = split_markdown(&page.markdown, self.config.chunk_size, self.config.chunk_overlap)?;
            chunks.extend(pieces.into_iter().map(|(start, text)| Chunk::new(&page.url, start, text)));
        }
        let added = self.index_chunks(chunks).await?;
        info!(root = %crawler.root(), pages = pages.len(), chunks = added, "rag index built");
        Ok(added)
    }

    /// Split raw Markdown text, embed it, and append it to the index.
    pub async fn ingest_text(&self, text: &str) -> Result<usize, AppError> {
        let chunks: Vec<Chunk> = split_markdown(
            text,
            self.config.ingest_chunk_size,
            self.config.ingest_chunk_overlap,
        )?
        .into_iter()
        .map(|(start, t)| Chunk::new(INGEST_SOURCE, start, t))
        .collect();
        let added = self.index_chunks(chunks).await?;
        info!(chunks = added, chars = text.len(), "text ingested");
        Ok(added)
    }

    async fn index_chunks(&self, chunks: Vec<Chunk>) -> Result<usize, AppError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        let mut items = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .provider
                .embed(&texts)
                .await
                .map_err(|e| AppError::Llm(e.to_string()))?;
            if vectors.len() != batch.len() {
                return Err(AppError::Llm(format!(
                    "embedding count mismatch: sent {}, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            items.extend(batch.iter().cloned().zip(vectors));
        }
        Ok(self.index.write().await.insert(items))
    }

    /// The `top_k` chunks most similar to `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>, AppError> {
        let query = self
            .provider
            .embed(&[question.to_string()])
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("embedding response was empty".into()))?;
        let hits = self.index.read().await.search(&query, self.config.top_k);
        debug!(hits = hits.len(), best = hits.first().map(|h| h.score), "retrieved context");
        Ok(hits)
    }

    /// Fill the answer template.
    pub fn render_prompt(&self, question: &str, context: &str) -> String {
        PromptBuilder::new(&self.prompts_dir)
            .layer_or(RAG_TEMPLATE, RAG_FALLBACK)
            .var("question", question)
            .var("context", context)
            .build()
    }

    /// Retrieve context and stream the model's answer.
    pub async fn answer_stream(&self, question: &str) -> Result<TextStream, AppError> {
        let hits = self.retrieve(question).await?;
        let prompt = self.render_prompt(question, &format_context(&hits));
        tracing::trace!(%prompt, "rag prompt");
        self.provider
            .complete_stream(&prompt)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))
    }
}

/// Chunk texts joined by blank lines.
pub fn format_context(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
