//! Chunk extraction over the normalized syntax tree.
//!
//! Policy: top-level functions, classes, and methods become one chunk each
//! spanning the full definition. A class is emitted as a single chunk over
//! its whole body and each contained method is additionally emitted on its
//! own — that overlap is intended so methods stay independently retrievable.
//! Nested classes stay inside their parent's chunk; two chunks of the same
//! kind never overlap. Module-scope imports group into one chunk per
//! contiguous block; module-scope assignments become variable chunks.

use super::syntax::{NodeType, SyntaxNode};
use super::{Chunk, ChunkKind, Language};

/// Chunks whose span exceeds this many lines split at statement boundaries.
const DEFAULT_MAX_CHUNK_LINES: usize = 200;

#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_chunk_lines: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_chunk_lines: DEFAULT_MAX_CHUNK_LINES,
        }
    }
}

/// Walks a normalized tree and emits chunk records.
pub struct ChunkExtractor {
    config: ExtractorConfig,
}

impl ChunkExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Emit chunks for one file from its normalized tree.
    pub fn extract(
        &self,
        file_path: &str,
        language: Language,
        source: &str,
        tree: &SyntaxNode,
    ) -> Vec<Chunk> {
        let lines: Vec<&str> = source.lines().collect();
        let mut chunks = Vec::new();
        let mut import_nodes: Vec<&SyntaxNode> = Vec::new();

        for node in &tree.children {
            match node.node_type {
                NodeType::Function => {
                    self.emit(file_path, language, &lines, node, ChunkKind::Function, &mut chunks);
                }
                NodeType::Method => {
                    self.emit(file_path, language, &lines, node, ChunkKind::Method, &mut chunks);
                }
                NodeType::Class => {
                    self.emit(file_path, language, &lines, node, ChunkKind::Class, &mut chunks);
                    for member in &node.children {
                        if matches!(member.node_type, NodeType::Function | NodeType::Method) {
                            self.emit(
                                file_path,
                                language,
                                &lines,
                                member,
                                ChunkKind::Method,
                                &mut chunks,
                            );
                        }
                    }
                }
                NodeType::Import => import_nodes.push(node),
                NodeType::Variable => {
                    self.emit(file_path, language, &lines, node, ChunkKind::Variable, &mut chunks);
                }
                NodeType::Module => {
                    self.emit(file_path, language, &lines, node, ChunkKind::Module, &mut chunks);
                }
            }
        }

        for (start, end) in group_import_blocks(&import_nodes) {
            chunks.push(self.build_chunk(
                file_path,
                language,
                &lines,
                ChunkKind::Import,
                None,
                None,
                start,
                end,
            ));
        }

        chunks
    }

    fn emit(
        &self,
        file_path: &str,
        language: Language,
        lines: &[&str],
        node: &SyntaxNode,
        kind: ChunkKind,
        out: &mut Vec<Chunk>,
    ) {
        let boundaries: Vec<usize> = node.children.iter().map(|c| c.start_line).collect();
        let ranges = self.split_oversized(node.start_line, node.end_line, &boundaries, lines);

        if ranges.len() == 1 {
            out.push(self.build_chunk(
                file_path,
                language,
                lines,
                kind,
                node.name.clone(),
                node.docstring.clone(),
                node.start_line,
                node.end_line,
            ));
            return;
        }

        for (i, (start, end)) in ranges.iter().enumerate() {
            let name = node.name.as_ref().map(|n| format!("{n}_part{}", i + 1));
            let docstring = if i == 0 { node.docstring.clone() } else { None };
            out.push(self.build_chunk(
                file_path, language, lines, kind, name, docstring, *start, *end,
            ));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_chunk(
        &self,
        file_path: &str,
        language: Language,
        lines: &[&str],
        kind: ChunkKind,
        name: Option<String>,
        docstring: Option<String>,
        start_line: usize,
        end_line: usize,
    ) -> Chunk {
        let end_line = end_line.min(lines.len().max(start_line));
        let content = slice_lines(lines, start_line, end_line);
        let content_hash = super::hash_content(&content);
        let id = Chunk::derive_id(file_path, start_line, end_line, name.as_deref().unwrap_or(""));

        Chunk {
            id,
            file_path: file_path.to_string(),
            language,
            kind,
            name,
            start_line,
            end_line,
            content,
            docstring,
            content_hash,
            embedding: Vec::new(),
        }
    }

    /// Partition an oversized span into consecutive fragments no longer than
    /// the configured maximum, preferring child-statement boundaries, then
    /// blank lines, then a hard cut.
    fn split_oversized(
        &self,
        start: usize,
        end: usize,
        boundaries: &[usize],
        lines: &[&str],
    ) -> Vec<(usize, usize)> {
        let max = self.config.max_chunk_lines;
        let mut ranges = Vec::new();
        let mut cursor = start;

        while end - cursor + 1 > max {
            let window_end = cursor + max - 1;

            let boundary_split = boundaries
                .iter()
                .filter(|&&b| b > cursor && b <= window_end + 1)
                .max()
                .copied();

            let split = boundary_split.unwrap_or_else(|| {
                // Split after the last blank line in the window, if any.
                (cursor + 1..=window_end)
                    .rev()
                    .find(|&ln| lines.get(ln - 1).map_or(false, |l| l.trim().is_empty()))
                    .map(|ln| ln + 1)
                    .unwrap_or(window_end + 1)
            });

            ranges.push((cursor, split - 1));
            cursor = split;
        }

        ranges.push((cursor, end));
        ranges
    }
}

impl Default for ChunkExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

/// Group module-scope import statements into contiguous blocks: statements
/// separated by at most one line boundary share a block.
fn group_import_blocks(imports: &[&SyntaxNode]) -> Vec<(usize, usize)> {
    let mut nodes: Vec<_> = imports.to_vec();
    nodes.sort_by_key(|n| n.start_line);

    let mut blocks: Vec<(usize, usize)> = Vec::new();
    for node in nodes {
        match blocks.last_mut() {
            Some((_, end)) if node.start_line <= *end + 1 => {
                *end = (*end).max(node.end_line);
            }
            _ => blocks.push((node.start_line, node.end_line)),
        }
    }
    blocks
}

fn slice_lines(lines: &[&str], start_line: usize, end_line: usize) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let start = start_line.saturating_sub(1).min(lines.len() - 1);
    let end = end_line.min(lines.len());
    lines[start..end].join("\n")
}
