//! Workspace scanner: walks a directory tree, applies ignore rules, and
//! classifies files by language.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::parser::Language;

/// Directories that never contain indexable source.
const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".idea",
    ".vscode",
];

/// Extensions that are binary by construction and never worth reading.
const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "pdf", "zip", "gz", "tar", "exe", "dll", "so", "dylib",
    "o", "a", "class", "jar", "wasm", "bin", "woff", "woff2", "ttf",
];

/// Files larger than this are reported as skipped rather than parsed.
const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub ignore_patterns: Vec<String>,
    pub max_file_size: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// One file discovered by a scan.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Path relative to the scan root, with forward slashes.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub language: Language,
    pub size: u64,
    /// Set when the file exceeds the size cutoff; the caller reports it
    /// as skipped instead of reading it.
    pub oversized: bool,
}

/// Lazily walk `root`, yielding source files with their detected language.
/// Unknown extensions are retained with `Language::Unknown` so the fallback
/// splitter can still process them; known-binary extensions are dropped.
pub fn scan<'a>(root: &'a Path, options: &'a ScanOptions) -> impl Iterator<Item = ScannedFile> + 'a {
    let ignore_patterns = options.ignore_patterns.clone();

    let walker = WalkBuilder::new(root)
        .standard_filters(true)
        .hidden(true)
        .filter_entry(move |entry| {
            let name = entry.file_name().to_string_lossy();
            !ignore_patterns.iter().any(|p| name == p.as_str())
        })
        .build();

    walker.flatten().filter_map(move |entry| {
        if entry.file_type().map_or(true, |ft| !ft.is_file()) {
            return None;
        }

        let path = entry.path();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if BINARY_EXTENSIONS.contains(&extension.to_lowercase().as_str()) {
            return None;
        }

        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        let relative_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        Some(ScannedFile {
            relative_path,
            absolute_path: path.to_path_buf(),
            language: Language::from_extension(extension),
            size,
            oversized: size > options.max_file_size,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_detects_language_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", "x = 1\n");
        write(dir.path(), "notes.txt", "hello\n");
        write(dir.path(), "node_modules/lib/index.js", "module.exports = 1;\n");

        let options = ScanOptions::default();
        let mut found: Vec<ScannedFile> = scan(dir.path(), &options).collect();
        found.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].relative_path, "notes.txt");
        assert_eq!(found[0].language, Language::Unknown);
        assert_eq!(found[1].relative_path, "src/app.py");
        assert_eq!(found[1].language, Language::Python);
    }

    #[test]
    fn test_scan_flags_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.py", &"x = 1\n".repeat(100));

        let options = ScanOptions {
            max_file_size: 64,
            ..ScanOptions::default()
        };
        let found: Vec<ScannedFile> = scan(dir.path(), &options).collect();
        assert_eq!(found.len(), 1);
        assert!(found[0].oversized);
    }
}
