//! Code-aware retrieval engine behind an MCP stdio server.
//!
//! The write path turns a source tree into semantically meaningful chunks
//! (functions, classes, methods, imports) and stores them with embeddings:
//!
//! ```text
//! scanner -> parser -> extractor -> embedding -> store
//! ```
//!
//! The read path embeds a query and runs filtered cosine similarity search
//! over the store, attaching a quality class to the result set. Indexing is
//! incremental: unchanged files (by content hash) are skipped, changed files
//! are re-chunked and swapped in atomically, deleted files are swept.
//!
//! The engine itself is transport-agnostic; `mcp` wraps it in a JSON-RPC
//! stdio server.

pub mod embedding;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod index;
pub mod mcp;
pub mod parser;
pub mod scanner;
pub mod store;

pub use engine::{EngineConfig, RetrievalEngine};
pub use error::{EngineError, Result};
pub use parser::{Chunk, ChunkKind, Language};
