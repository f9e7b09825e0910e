pub mod extractor;
pub mod fallback;
pub mod syntax;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A semantically meaningful fragment of a source file — the unit of
/// retrieval. Chunks are produced by the extractor, embedded, and stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier derived from `(file_path, start_line, end_line, name)`.
    pub id: String,
    /// Workspace-relative path of the owning file.
    pub file_path: String,
    pub language: Language,
    pub kind: ChunkKind,
    /// Function/class name; `None` for anonymous and import chunks.
    pub name: Option<String>,
    /// 1-based inclusive span. `start_line <= end_line` always holds.
    pub start_line: usize,
    pub end_line: usize,
    /// Verbatim source text for the span.
    pub content: String,
    /// Leading documentation text where the parser exposes it (Python).
    pub docstring: Option<String>,
    /// Hash of `content`, used for change detection.
    pub content_hash: String,
    /// Embedding vector, always present once the chunk is stored.
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Derive the stable chunk id from its identity tuple.
    pub fn derive_id(file_path: &str, start_line: usize, end_line: usize, name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b":");
        hasher.update(start_line.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(end_line.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(name.as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }
}

/// Hash source text for change detection.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Supported source languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    Cpp,
    C,
    Unknown,
}

impl Language {
    /// Detect a language from a file extension. Unrecognized extensions map
    /// to `Unknown` so the heuristic splitter can still process the file.
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_lowercase().as_str() {
            "py" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "java" => Language::Java,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::Cpp,
            "c" | "h" => Language::C,
            _ => Language::Unknown,
        }
    }

    /// Parse a filter value as supplied by callers.
    pub fn parse_filter(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "typescript" => Some(Language::TypeScript),
            "java" => Some(Language::Java),
            "go" => Some(Language::Go),
            "rust" => Some(Language::Rust),
            "cpp" => Some(Language::Cpp),
            "c" => Some(Language::C),
            "unknown" => Some(Language::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Unknown => "unknown",
        }
    }
}

/// Kind of code chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Module,
    Import,
    Function,
    Class,
    Method,
    Variable,
}

impl ChunkKind {
    /// Parse a filter value as supplied by callers.
    pub fn parse_filter(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "module" => Some(ChunkKind::Module),
            "import" => Some(ChunkKind::Import),
            "function" => Some(ChunkKind::Function),
            "class" => Some(ChunkKind::Class),
            "method" => Some(ChunkKind::Method),
            "variable" => Some(ChunkKind::Variable),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Module => "module",
            ChunkKind::Import => "import",
            ChunkKind::Function => "function",
            ChunkKind::Class => "class",
            ChunkKind::Method => "method",
            ChunkKind::Variable => "variable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("h"), Language::C);
        assert_eq!(Language::from_extension("md"), Language::Unknown);
    }

    #[test]
    fn test_filter_parsing_rejects_unknown_values() {
        assert_eq!(Language::parse_filter("python"), Some(Language::Python));
        assert_eq!(Language::parse_filter("cobol"), None);
        assert_eq!(ChunkKind::parse_filter("class"), Some(ChunkKind::Class));
        assert_eq!(ChunkKind::parse_filter("interface"), None);
    }

    #[test]
    fn test_chunk_id_stable_and_distinct() {
        let a = Chunk::derive_id("src/a.py", 1, 10, "foo");
        let b = Chunk::derive_id("src/a.py", 1, 10, "foo");
        let c = Chunk::derive_id("src/a.py", 1, 10, "bar");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
