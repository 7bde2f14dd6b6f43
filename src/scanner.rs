//! Corpus scanner: recursive discovery of text documents under the
//! configured roots.
//!
//! Each scan is a fresh, lazily evaluated traversal — no state is carried
//! between calls. Traversal order is sorted per directory so runs are
//! deterministic. Files that cannot be read (permissions, non-UTF-8 bytes)
//! are yielded as [`IngestError::UnreadableDocument`] items instead of
//! aborting the walk; the pipeline accumulates them into the run report.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::IngestError;
use crate::metadata;
use crate::models::ScannedDocument;

pub struct CorpusScanner {
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    exclude_set: GlobSet,
}

impl CorpusScanner {
    pub fn new(config: &CorpusConfig) -> Result<Self> {
        let extensions = config
            .extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();

        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        excludes.extend(config.exclude_globs.clone());

        Ok(CorpusScanner {
            roots: config.roots.clone(),
            extensions,
            exclude_set: build_globset(&excludes)?,
        })
    }

    /// Walk every configured root, yielding documents paired with their
    /// path-derived tags. Unreadable files come through as `Err` items.
    pub fn scan(&self) -> impl Iterator<Item = Result<ScannedDocument, IngestError>> + '_ {
        self.roots.iter().flat_map(move |root| {
            WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(move |entry| self.visit(root, entry))
        })
    }

    fn visit(
        &self,
        root: &Path,
        entry: walkdir::Result<walkdir::DirEntry>,
    ) -> Option<Result<ScannedDocument, IngestError>> {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_else(|| root.to_path_buf());
                return Some(Err(IngestError::UnreadableDocument {
                    path,
                    reason: err.to_string(),
                }));
            }
        };

        if !entry.file_type().is_file() {
            return None;
        }

        let path = entry.path();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext {
            Some(ref e) if self.extensions.iter().any(|allowed| allowed == e) => {}
            _ => return None,
        }

        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();
        if self.exclude_set.is_match(&rel_str) {
            return None;
        }

        // Whole-file read; documents are bounded to a few tens of MB.
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(err) => {
                return Some(Err(IngestError::UnreadableDocument {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                }))
            }
        };

        Some(Ok(ScannedDocument {
            path: path.to_path_buf(),
            source_path: rel_str,
            text,
            tags: metadata::classify(relative),
        }))
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
