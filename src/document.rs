use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// How many files a single run will rank unless overridden.
pub const DEFAULT_MAX_FILES: usize = 500;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "refusing to rank {count} documents in {} (limit {limit}); \
         raise the limit with --max-files or RANK_FILES_MAX_FILES",
        .dir.display()
    )]
    TooManyDocuments {
        dir: PathBuf,
        count: usize,
        limit: usize,
    },

    #[error("documents with identical content: {}", format_duplicate_groups(.groups))]
    DuplicateContent { groups: Vec<Vec<String>> },
}

fn format_duplicate_groups(groups: &[Vec<String>]) -> String {
    groups
        .iter()
        .map(|g| format!("[{}]", g.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// An opaque piece of content to be ranked.
///
/// Content access is lazy; the digest is a sha256 of the full byte content
/// and identifies a document independent of its name or path.
pub trait Document: std::fmt::Debug {
    /// Stable display label.
    fn name(&self) -> String;

    fn read_text(&self) -> Result<String, DocumentError>;

    fn read_bytes(&self) -> Result<Vec<u8>, DocumentError>;

    fn digest(&self) -> Result<String, DocumentError> {
        Ok(sha256_hex(&self.read_bytes()?))
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// A document backed by a file on disk. The digest is computed on first use
/// and cached; the content itself is re-read on each access.
#[derive(Debug)]
pub struct FileDocument {
    path: PathBuf,
    cached_digest: RefCell<Option<String>>,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached_digest: RefCell::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> DocumentError {
        DocumentError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl Document for FileDocument {
    fn name(&self) -> String {
        match self.path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => self.path.display().to_string(),
        }
    }

    fn read_text(&self) -> Result<String, DocumentError> {
        fs::read_to_string(&self.path).map_err(|e| self.io_error(e))
    }

    fn read_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        fs::read(&self.path).map_err(|e| self.io_error(e))
    }

    fn digest(&self) -> Result<String, DocumentError> {
        if let Some(digest) = self.cached_digest.borrow().as_ref() {
            return Ok(digest.clone());
        }
        let digest = sha256_hex(&self.read_bytes()?);
        *self.cached_digest.borrow_mut() = Some(digest.clone());
        Ok(digest)
    }
}

/// An in-memory document. Useful for unit tests.
#[derive(Debug)]
pub struct StrDocument {
    text: String,
}

impl StrDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Document for StrDocument {
    fn name(&self) -> String {
        self.text.clone()
    }

    fn read_text(&self) -> Result<String, DocumentError> {
        Ok(self.text.clone())
    }

    fn read_bytes(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(self.text.clone().into_bytes())
    }
}

/// Load every regular file in `dir` as a document, in file-name order.
///
/// Fails before any comparison work happens: first when the file count
/// exceeds `max_files`, then when two or more files carry byte-identical
/// content. Duplicate content would make the ranking spend comparisons
/// distinguishing indistinguishable items, so it is rejected loudly with
/// every colliding name rather than silently deduplicated.
pub fn load_directory(
    dir: &Path,
    max_files: usize,
) -> Result<Vec<Box<dyn Document>>, DocumentError> {
    let entries = fs::read_dir(dir).map_err(|source| DocumentError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DocumentError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let file_type = entry.file_type().map_err(|source| DocumentError::Io {
            path: entry.path(),
            source,
        })?;
        if file_type.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    if paths.len() > max_files {
        return Err(DocumentError::TooManyDocuments {
            dir: dir.to_path_buf(),
            count: paths.len(),
            limit: max_files,
        });
    }

    let docs: Vec<Box<dyn Document>> = paths
        .into_iter()
        .map(|p| Box::new(FileDocument::new(p)) as Box<dyn Document>)
        .collect();
    ensure_unique_content(&docs)?;
    Ok(docs)
}

/// Reject byte-identical documents, naming every member of every colliding
/// group.
pub fn ensure_unique_content(docs: &[Box<dyn Document>]) -> Result<(), DocumentError> {
    let mut by_digest: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for doc in docs {
        by_digest.entry(doc.digest()?).or_default().push(doc.name());
    }
    let groups: Vec<Vec<String>> = by_digest
        .into_values()
        .filter(|group| group.len() > 1)
        .collect();
    if groups.is_empty() {
        Ok(())
    } else {
        Err(DocumentError::DuplicateContent { groups })
    }
}
