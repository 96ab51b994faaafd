//! Retrieval-augmented answering over uploaded documents.
//!
//! The pipeline: extracted text is chunked with page provenance, embedded in
//! batches, and upserted into a namespaced vector store; questions retrieve
//! the top matches and synthesize a cited answer. `RagService` is the facade
//! the HTTP layer talks to.

pub mod answerer;
pub mod embedder;
pub mod local;
pub mod remote;
pub mod retriever;
pub mod service;
pub mod store;

pub use answerer::{AnswerSynthesizer, NO_CONTEXT_ANSWER};
pub use embedder::Embedder;
pub use local::LocalIndexStore;
pub use remote::RemoteIndexStore;
pub use retriever::Retriever;
pub use service::{derive_namespace, Answer, IngestReport, RagService, UploadedFile};
pub use store::{Chunk, VectorMatch, VectorRecord, VectorStore};
