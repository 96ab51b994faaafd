//! The ingest/ask facade: extraction, chunking, embedding, storage,
//! retrieval, and answer synthesis behind two calls.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::answerer::{AnswerSynthesizer, NO_CONTEXT_ANSWER};
use super::embedder::Embedder;
use super::retriever::Retriever;
use super::store::{Chunk, VectorStore};
use crate::core::config::Settings;
use crate::core::errors::{simplify_error, ApiError};
use crate::ingest::{
    classify, normalize_text, parse_page_marker, sanitize_filename, Chunker, DocumentType,
    Extractor, Segment,
};
use crate::llm::LlmProvider;

/// An uploaded file held in memory.
pub struct UploadedFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Outcome of an upload batch. `processed` lists every file that was
/// handled, including ones that failed extraction and contributed nothing.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub processed: Vec<String>,
    pub chunk_count: usize,
    pub token_estimate: usize,
}

#[derive(Debug, Clone)]
pub struct Answer {
    pub answer: String,
    pub context: String,
}

/// Builds the namespace a request indexes under: conversation-scoped uploads
/// go to `{tenant}_{conversation}`, account-wide uploads to the bare tenant.
pub fn derive_namespace(tenant_id: &str, conversation_id: Option<&str>) -> String {
    match conversation_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(conversation) => format!("{}_{}", tenant_id, conversation),
        None => tenant_id.to_string(),
    }
}

pub struct RagService {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    extractor: Extractor,
    chunker: Chunker,
    embedder: Arc<Embedder>,
    retriever: Retriever,
    answerer: AnswerSynthesizer,
    top_k: usize,
    default_credential: String,
}

impl RagService {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn LlmProvider>,
        settings: &Settings,
    ) -> Self {
        let embedder = Arc::new(Embedder::new(
            provider.clone(),
            settings.llm.embed_model.clone(),
            settings.rag.embed_batch_size,
            settings.index.dimension,
        ));

        Self {
            retriever: Retriever::new(store.clone(), embedder.clone()),
            answerer: AnswerSynthesizer::new(
                provider.clone(),
                settings.llm.chat_model.clone(),
                settings.llm.temperature,
            ),
            extractor: Extractor::new(provider.clone(), settings.llm.chat_model.clone()),
            chunker: Chunker::new(settings.rag.chunk_size, settings.rag.chunk_overlap),
            embedder,
            store,
            provider,
            chat_model: settings.llm.chat_model.clone(),
            top_k: settings.rag.top_k,
            default_credential: settings.llm.api_key.clone(),
        }
    }

    /// The per-request override wins over the configured key. Resolved once
    /// here; everything downstream takes the chosen credential as a plain
    /// argument.
    fn credential<'a>(&'a self, override_key: Option<&'a str>) -> &'a str {
        match override_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => &self.default_credential,
        }
    }

    /// Ingests a batch of uploaded files into a namespace. Files that fail
    /// extraction or produce no text are logged and skipped; the batch only
    /// fails when no file yields any chunk at all.
    pub async fn ingest_files(
        &self,
        namespace: &str,
        files: Vec<UploadedFile>,
        credential_override: Option<&str>,
    ) -> Result<IngestReport, ApiError> {
        let credential = self.credential(credential_override);

        let mut processed = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();

        for file in files {
            let source = sanitize_filename(&file.name);
            // Counted as handled even if extraction fails below.
            processed.push(source.clone());

            let doc_type = classify(&source);
            let segments = match self
                .extractor
                .extract(&file.data, &source, doc_type, credential)
                .await
            {
                Ok(segments) => segments,
                Err(err) => {
                    tracing::error!("Failed handling {}: {}", source, err);
                    continue;
                }
            };

            let file_chunks = self.assemble_chunks(&source, doc_type, segments);
            if file_chunks.is_empty() {
                tracing::warn!("Empty text in {}", source);
                continue;
            }
            chunks.extend(file_chunks);
        }

        if chunks.is_empty() {
            return Err(ApiError::BadRequest(
                "Couldn't extract any text from the uploaded files".to_string(),
            ));
        }

        let token_estimate = chunks
            .iter()
            .map(|chunk| chunk.text.chars().count() / 4)
            .sum();
        let chunk_count = self.ingest(namespace, &chunks, credential).await?;

        Ok(IngestReport {
            processed,
            chunk_count,
            token_estimate,
        })
    }

    /// Embeds pre-built chunks and upserts them. Returns how many chunks
    /// were written.
    pub async fn ingest(
        &self,
        namespace: &str,
        chunks: &[Chunk],
        credential: &str,
    ) -> Result<usize, ApiError> {
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self
            .embedder
            .embed_documents(&texts, credential)
            .await
            .map_err(fatal)?;

        self.store
            .upsert(namespace, chunks, &vectors)
            .await
            .map_err(fatal)?;

        Ok(chunks.len())
    }

    /// Answers a question from the namespace's documents. When retrieval
    /// comes back empty the canned no-context reply is returned without any
    /// generative call.
    pub async fn ask(
        &self,
        namespace: &str,
        question: &str,
        credential_override: Option<&str>,
    ) -> Result<Answer, ApiError> {
        let credential = self.credential(credential_override);

        let passages = self
            .retriever
            .retrieve(question, namespace, self.top_k, credential)
            .await
            .map_err(fatal)?;

        if passages.is_empty() {
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                context: String::new(),
            });
        }

        let context = passages.join("\n\n");
        let answer = self
            .answerer
            .answer(question, &context, credential)
            .await
            .map_err(fatal)?;

        Ok(Answer { answer, context })
    }

    /// Cheapest possible live call, used to check a submitted key.
    pub async fn verify_credential(&self, credential: &str) -> Result<(), ApiError> {
        let request = crate::llm::ChatRequest::new(vec![crate::llm::ChatMessage::user("Hi")])
            .with_max_tokens(5);
        self.provider
            .chat(request, &self.chat_model, credential)
            .await?;
        Ok(())
    }

    pub async fn clear_namespace(&self, namespace: &str) {
        self.store.delete_namespace(namespace).await;
    }

    pub async fn delete_tenant_data(&self, tenant_id: &str) {
        self.store.delete_tenant(tenant_id).await;
    }

    /// Normalizes segments, prepends their page markers, joins them into one
    /// document, and chunks it. Each chunk is tagged with the page of the
    /// marker it starts with, falling back to page 1 mid-page.
    fn assemble_chunks(
        &self,
        source: &str,
        doc_type: DocumentType,
        segments: Vec<Segment>,
    ) -> Vec<Chunk> {
        let parts: Vec<String> = segments
            .iter()
            .filter_map(|segment| {
                let text = normalize_text(&segment.text);
                if text.is_empty() {
                    None
                } else {
                    Some(format!("[Page {}]\n{}", segment.page, text))
                }
            })
            .collect();
        if parts.is_empty() {
            return Vec::new();
        }

        let document = parts.join("\n\n");
        self.chunker
            .split(&document)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let page = parse_page_marker(&text).unwrap_or(1);
                let mut metadata = BTreeMap::new();
                metadata.insert(
                    "type".to_string(),
                    Value::String(doc_type.as_str().to_string()),
                );
                Chunk {
                    text,
                    source: source.to_string(),
                    chunk_index: index,
                    page,
                    metadata,
                }
            })
            .collect()
    }
}

/// Logs the raw failure and hands the client a trimmed-down message.
fn fatal(err: ApiError) -> ApiError {
    match err {
        ApiError::Internal(message) => {
            tracing::error!("{}", message);
            ApiError::Internal(simplify_error(message))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StubProvider;
    use crate::rag::local::LocalIndexStore;
    use serde_json::json;

    fn test_settings(chunk_size: usize, chunk_overlap: usize) -> Settings {
        Settings::from_config(&json!({
            "llm": { "api_key": "sk-default" },
            "index": { "backend": "local", "dimension": 8 },
            "rag": {
                "chunk_size": chunk_size,
                "chunk_overlap": chunk_overlap,
                "top_k": 4
            }
        }))
        .unwrap()
    }

    fn service_with(dir: &std::path::Path, provider: Arc<StubProvider>) -> RagService {
        let store = Arc::new(LocalIndexStore::new(dir.to_path_buf()));
        RagService::new(store, provider, &test_settings(200, 40))
    }

    fn file(name: &str, data: &[u8]) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    #[test]
    fn namespace_derivation() {
        assert_eq!(derive_namespace("alice", None), "alice");
        assert_eq!(derive_namespace("alice", Some("")), "alice");
        assert_eq!(derive_namespace("alice", Some("  ")), "alice");
        assert_eq!(derive_namespace("alice", Some("chat9")), "alice_chat9");
    }

    #[tokio::test]
    async fn ingest_then_ask_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::with_reply("Revenue grew 40% [Page 1].");
        let service = service_with(dir.path(), provider.clone());

        let report = service
            .ingest_files(
                "alice",
                vec![file("Q3 report.txt", b"Revenue grew 40% in the third quarter.")],
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.processed, vec!["Q3_report.txt"]);
        assert_eq!(report.chunk_count, 1);
        assert!(report.token_estimate > 0);

        let reply = service
            .ask("alice", "How did revenue do?", None)
            .await
            .unwrap();

        assert_eq!(reply.answer, "Revenue grew 40% [Page 1].");
        assert!(reply.context.contains("Revenue grew 40%"));
        assert!(reply.context.starts_with("[Page 1]"));
        assert_eq!(provider.chat_call_count(), 1);
    }

    #[tokio::test]
    async fn ask_without_documents_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::new();
        let service = service_with(dir.path(), provider.clone());

        let reply = service.ask("nobody", "anything?", None).await.unwrap();

        assert_eq!(reply.answer, NO_CONTEXT_ANSWER);
        assert!(reply.context.is_empty());
        // The question embedding runs, but no generative call does.
        assert_eq!(provider.embed_call_count(), 1);
        assert_eq!(provider.chat_call_count(), 0);
    }

    #[tokio::test]
    async fn one_bad_file_does_not_sink_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::new();
        let service = service_with(dir.path(), provider.clone());

        let report = service
            .ingest_files(
                "alice",
                vec![
                    file("broken.pdf", b"not a pdf at all"),
                    file("blank.txt", b"   "),
                    file("notes.txt", b"The project ships in May."),
                ],
                None,
            )
            .await
            .unwrap();

        assert_eq!(
            report.processed,
            vec!["broken.pdf", "blank.txt", "notes.txt"]
        );
        assert_eq!(report.chunk_count, 1);
    }

    #[tokio::test]
    async fn nothing_extractable_is_a_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::new();
        let service = service_with(dir.path(), provider.clone());

        let err = service
            .ingest_files("alice", vec![file("empty.txt", b"")], None)
            .await
            .unwrap_err();

        match err {
            ApiError::BadRequest(message) => {
                assert!(message.contains("Couldn't extract any text"))
            }
            other => panic!("expected BadRequest, got {:?}", other),
        }
        assert_eq!(provider.embed_call_count(), 0);
    }

    #[tokio::test]
    async fn conversation_namespaces_stay_separate_from_the_account() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::with_reply("From the scoped doc.");
        let service = service_with(dir.path(), provider.clone());

        let namespace = derive_namespace("alice", Some("chat9"));
        service
            .ingest_files(&namespace, vec![file("memo.txt", b"Scoped memo body.")], None)
            .await
            .unwrap();

        let account = service.ask("alice", "what memo?", None).await.unwrap();
        assert_eq!(account.answer, NO_CONTEXT_ANSWER);

        let scoped = service.ask("alice_chat9", "what memo?", None).await.unwrap();
        assert_eq!(scoped.answer, "From the scoped doc.");
    }

    #[tokio::test]
    async fn clear_namespace_forgets_documents() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::new();
        let service = service_with(dir.path(), provider.clone());

        service
            .ingest_files("alice", vec![file("doc.txt", b"Some fact to recall.")], None)
            .await
            .unwrap();
        service.clear_namespace("alice").await;

        let reply = service.ask("alice", "what fact?", None).await.unwrap();
        assert_eq!(reply.answer, NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn credential_override_reaches_the_provider() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::new();
        let service = service_with(dir.path(), provider.clone());

        service
            .ingest_files("alice", vec![file("doc.txt", b"A fact.")], None)
            .await
            .unwrap();
        service.ask("alice", "q", Some("sk-user")).await.unwrap();

        // Ingest embedded with the configured key; ask used the override for
        // both the question embedding and the chat call.
        assert_eq!(
            provider.credentials(),
            vec!["sk-default", "sk-user", "sk-user"]
        );
    }

    #[test]
    fn chunks_inherit_the_page_of_their_leading_marker() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalIndexStore::new(dir.path().to_path_buf()));
        let service = RagService::new(store, StubProvider::new(), &test_settings(30, 5));

        let segments = vec![Segment::new("intro text", 1), Segment::new("details", 2)];
        let chunks = service.assemble_chunks("deck.pptx", DocumentType::Slides, segments);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "[Page 1]\nintro text");
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[1].text, "[Page 2]\ndetails");
        assert_eq!(chunks[1].page, 2);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[0].metadata["type"], "slides");
        assert_eq!(chunks[0].source, "deck.pptx");
    }

    #[tokio::test]
    async fn reingesting_updates_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StubProvider::new();
        let service = service_with(dir.path(), provider.clone());

        service
            .ingest_files("alice", vec![file("doc.txt", b"First version.")], None)
            .await
            .unwrap();
        service
            .ingest_files("alice", vec![file("doc.txt", b"Second version.")], None)
            .await
            .unwrap();

        let reply = service.ask("alice", "which version?", None).await.unwrap();
        assert!(reply.context.contains("Second version."));
        assert!(!reply.context.contains("First version."));
    }
}
