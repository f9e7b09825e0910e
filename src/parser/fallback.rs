//! Heuristic line-based splitter for unsupported languages and files a
//! grammar rejects.
//!
//! Strategy:
//! 1. Split at blank lines (natural paragraph boundaries)
//! 2. Merge small runs up to the character budget
//! 3. If a run is still too large, split at single newlines
//!
//! The output is a normalized tree whose children are all `Module` nodes
//! with no name, so the extractor treats every segment as a module chunk.

use super::syntax::{LanguageParser, NodeType, SyntaxNode};
use crate::error::Result;

/// Maximum non-whitespace characters per segment.
const CHAR_BUDGET: usize = 1500;

/// Fallback parser grouping contiguous non-blank line runs.
pub struct HeuristicParser {
    char_budget: usize,
}

impl HeuristicParser {
    pub fn new() -> Self {
        Self {
            char_budget: CHAR_BUDGET,
        }
    }
}

impl Default for HeuristicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageParser for HeuristicParser {
    fn parse(&self, source: &str) -> Result<SyntaxNode> {
        let lines: Vec<&str> = source.lines().collect();
        let mut children = Vec::new();

        if !source.trim().is_empty() {
            let segments = split_at_blank_lines(&lines);
            merge_segments(&lines, &segments, self.char_budget, &mut children);
        }

        Ok(SyntaxNode {
            node_type: NodeType::Module,
            name: None,
            start_line: 1,
            end_line: lines.len().max(1),
            docstring: None,
            children,
        })
    }
}

/// A contiguous run of non-blank lines, 0-based inclusive indices.
struct Segment {
    start: usize,
    end: usize,
}

fn split_at_blank_lines(lines: &[&str]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut seg_start = None;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            if let Some(start) = seg_start.take() {
                segments.push(Segment {
                    start,
                    end: i.saturating_sub(1),
                });
            }
        } else if seg_start.is_none() {
            seg_start = Some(i);
        }
    }

    if let Some(start) = seg_start {
        segments.push(Segment {
            start,
            end: lines.len() - 1,
        });
    }

    segments
}

fn merge_segments(lines: &[&str], segments: &[Segment], budget: usize, out: &mut Vec<SyntaxNode>) {
    let mut current_start = 0usize;
    let mut current_end = 0usize;
    let mut current_chars = 0usize;
    let mut started = false;

    for seg in segments {
        let seg_chars = non_ws_chars(lines, seg.start, seg.end);

        if seg_chars > budget {
            if started {
                out.push(segment_node(current_start, current_end));
                started = false;
                current_chars = 0;
            }
            split_large_segment(lines, seg.start, seg.end, budget, out);
        } else if started && current_chars + seg_chars > budget {
            out.push(segment_node(current_start, current_end));
            current_start = seg.start;
            current_end = seg.end;
            current_chars = seg_chars;
        } else {
            if !started {
                current_start = seg.start;
                started = true;
            }
            current_end = seg.end;
            current_chars += seg_chars;
        }
    }

    if started {
        out.push(segment_node(current_start, current_end));
    }
}

fn split_large_segment(
    lines: &[&str],
    start: usize,
    end: usize,
    budget: usize,
    out: &mut Vec<SyntaxNode>,
) {
    let mut chunk_start = start;
    let mut chars = 0usize;

    for i in start..=end {
        let line_chars = non_ws_chars(lines, i, i);
        if chars + line_chars > budget && i > chunk_start {
            out.push(segment_node(chunk_start, i - 1));
            chunk_start = i;
            chars = line_chars;
        } else {
            chars += line_chars;
        }
    }

    if chunk_start <= end {
        out.push(segment_node(chunk_start, end));
    }
}

fn non_ws_chars(lines: &[&str], start: usize, end: usize) -> usize {
    lines[start..=end]
        .iter()
        .flat_map(|l| l.chars())
        .filter(|c| !c.is_whitespace())
        .count()
}

fn segment_node(start: usize, end: usize) -> SyntaxNode {
    SyntaxNode {
        node_type: NodeType::Module,
        name: None,
        start_line: start + 1,
        end_line: end + 1,
        docstring: None,
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(source: &str) -> Vec<SyntaxNode> {
        HeuristicParser::new().parse(source).unwrap().children
    }

    #[test]
    fn test_fallback_empty() {
        assert!(segments("").is_empty());
        assert!(segments("   \n\n  ").is_empty());
    }

    #[test]
    fn test_fallback_small_file_is_one_segment() {
        let out = segments("line 1\nline 2\nline 3");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start_line, 1);
        assert_eq!(out[0].end_line, 3);
        assert_eq!(out[0].node_type, NodeType::Module);
        assert!(out[0].name.is_none());
    }

    #[test]
    fn test_fallback_splits_at_blank_line_gap() {
        let block1: String = (0..80)
            .map(|i| format!("let var_{i} = {i};"))
            .collect::<Vec<_>>()
            .join("\n");
        let block2: String = (0..80)
            .map(|i| format!("let other_{i} = {i};"))
            .collect::<Vec<_>>()
            .join("\n");
        let content = format!("{block1}\n\n{block2}");

        let out = segments(&content);
        assert!(out.len() >= 2, "expected a split, got {} segments", out.len());
    }

    #[test]
    fn test_fallback_oversized_run_splits_at_lines() {
        let content: String = (0..200)
            .map(|i| format!("word{i} word{i} word{i} word{i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let out = segments(&content);
        assert!(out.len() > 1);
        // Segments partition the run without overlap.
        for pair in out.windows(2) {
            assert_eq!(pair[0].end_line + 1, pair[1].start_line);
        }
    }
}
