//! The on-disk project tree.
//!
//! A [`ProjectRootFolder`] records every file written through it. Calling
//! [`ProjectRootFolder::commit`] at the end of an extract deletes the files
//! under the root that were not rewritten and then the directories left
//! empty. If nothing at all was written the whole root is removed. Dropping
//! the root without committing leaves the tree untouched.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::canonical::to_canonical_string;
use crate::error_codes;
use crate::xml::{XmlDocument, XmlError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FolderError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid XML in {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: XmlError,
    },
    #[error("{path} is not valid UTF-8 text")]
    Encoding { path: PathBuf },
}

impl FolderError {
    pub fn code(&self) -> &'static str {
        match self {
            FolderError::Io { .. } => error_codes::FOLDER_IO,
            FolderError::Json { .. } => error_codes::FOLDER_JSON,
            FolderError::Xml { .. } => error_codes::FOLDER_XML,
            FolderError::Encoding { .. } => error_codes::FOLDER_ENCODING,
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        FolderError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What [`ProjectRootFolder::commit`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub deleted_files: usize,
    pub deleted_dirs: usize,
    pub deleted_root: bool,
}

#[derive(Debug)]
pub struct ProjectRootFolder {
    root: PathBuf,
    written: RefCell<BTreeSet<PathBuf>>,
    retained: RefCell<BTreeSet<PathBuf>>,
}

impl ProjectRootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: RefCell::new(BTreeSet::new()),
            retained: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    pub fn root_folder(&self) -> ProjectFolder<'_> {
        ProjectFolder {
            root: self,
            rel: PathBuf::new(),
        }
    }

    pub fn folder(&self, rel: &str) -> ProjectFolder<'_> {
        self.root_folder().subfolder(rel)
    }

    /// Paths written so far, relative to the root, `/`-separated.
    pub fn written_files(&self) -> Vec<String> {
        self.written
            .borrow()
            .iter()
            .filter_map(|p| p.strip_prefix(&self.root).ok())
            .map(to_slash_path)
            .collect()
    }

    /// Excludes a sub-tree from pruning, e.g. after its part failed to
    /// extract, so the previous extraction of that part survives.
    pub fn retain(&self, rel: &str) {
        self.retained.borrow_mut().insert(join_rel(&self.root, rel));
    }

    pub fn commit(self) -> Result<PruneSummary, FolderError> {
        let mut summary = PruneSummary::default();
        if !self.root.exists() {
            return Ok(summary);
        }
        if self.written.borrow().is_empty() && self.retained.borrow().is_empty() {
            debug!("nothing written, removing {}", self.root.display());
            std::fs::remove_dir_all(&self.root).map_err(|e| FolderError::io(&self.root, e))?;
            summary.deleted_root = true;
            return Ok(summary);
        }
        let written = self.written.borrow();
        let retained = self.retained.borrow();
        prune_dir(&self.root, &written, &retained, &mut summary)?;
        Ok(summary)
    }

    fn record(&self, path: PathBuf) {
        self.written.borrow_mut().insert(path);
    }

    fn forget(&self, path: &Path) {
        self.written.borrow_mut().retain(|p| !p.starts_with(path));
    }
}

fn prune_dir(
    dir: &Path,
    written: &BTreeSet<PathBuf>,
    retained: &BTreeSet<PathBuf>,
    summary: &mut PruneSummary,
) -> Result<bool, FolderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| FolderError::io(dir, e))?;
    let mut remaining = 0usize;
    for entry in entries {
        let entry = entry.map_err(|e| FolderError::io(dir, e))?;
        let path = entry.path();
        if is_hidden(&path) || retained.iter().any(|r| path.starts_with(r)) {
            remaining += 1;
            continue;
        }
        let file_type = entry.file_type().map_err(|e| FolderError::io(&path, e))?;
        if file_type.is_dir() {
            if prune_dir(&path, written, retained, summary)? {
                remaining += 1;
            } else {
                debug!("removing empty directory {}", path.display());
                std::fs::remove_dir(&path).map_err(|e| FolderError::io(&path, e))?;
                summary.deleted_dirs += 1;
            }
        } else if written.contains(&path) {
            remaining += 1;
        } else {
            debug!("removing stale file {}", path.display());
            std::fs::remove_file(&path).map_err(|e| FolderError::io(&path, e))?;
            summary.deleted_files += 1;
        }
    }
    Ok(remaining > 0)
}

/// Tool and OS entries (`.git`, `.gitignore`, `.DS_Store`). Escaped names
/// never start with a dot, so nothing the serializers write is hidden.
fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn join_rel(base: &Path, rel: &str) -> PathBuf {
    let mut out = base.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        out.push(segment);
    }
    out
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// A view on a directory below a [`ProjectRootFolder`].
///
/// File names passed to the read and write methods may contain `/` to
/// address nested files.
#[derive(Debug, Clone)]
pub struct ProjectFolder<'a> {
    root: &'a ProjectRootFolder,
    rel: PathBuf,
}

impl<'a> ProjectFolder<'a> {
    pub fn subfolder(&self, rel: &str) -> ProjectFolder<'a> {
        let mut path = self.rel.clone();
        for segment in rel.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        ProjectFolder {
            root: self.root,
            rel: path,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.root.join(&self.rel)
    }

    /// Path relative to the project root, `/`-separated.
    pub fn relative_path(&self) -> String {
        to_slash_path(&self.rel)
    }

    pub fn exists(&self) -> bool {
        self.path().is_dir()
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.file_path(name).is_file()
    }

    fn file_path(&self, name: &str) -> PathBuf {
        join_rel(&self.path(), name)
    }

    pub fn write_json(&self, name: &str, value: &Value) -> Result<(), FolderError> {
        let path = self.file_path(name);
        let text = to_canonical_string(value).map_err(|source| FolderError::Json {
            path: path.clone(),
            source,
        })?;
        self.write_at(path, text.as_bytes())
    }

    pub fn write_xml(&self, name: &str, doc: &XmlDocument) -> Result<(), FolderError> {
        let path = self.file_path(name);
        let text = doc.to_pretty_string().map_err(|source| FolderError::Xml {
            path: path.clone(),
            source,
        })?;
        self.write_at(path, text.as_bytes())
    }

    /// Writes `text` as UTF-8, unchanged.
    pub fn write_text(&self, name: &str, text: &str) -> Result<(), FolderError> {
        self.write_at(self.file_path(name), text.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<(), FolderError> {
        self.write_at(self.file_path(name), bytes)
    }

    fn write_at(&self, path: PathBuf, bytes: &[u8]) -> Result<(), FolderError> {
        self.clear_conflicts(&path)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FolderError::io(parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| FolderError::io(&path, e))?;
        self.root.record(path);
        Ok(())
    }

    /// A file where a directory is needed (or the reverse) is left over from
    /// an earlier layout; remove it before writing.
    fn clear_conflicts(&self, path: &Path) -> Result<(), FolderError> {
        let root = &self.root.root;
        if let Ok(rel) = path.strip_prefix(root) {
            let mut current = root.clone();
            let mut components = rel.components().peekable();
            while let Some(component) = components.next() {
                if components.peek().is_none() {
                    break;
                }
                current.push(component);
                if current.is_file() {
                    debug!("replacing file {} with a directory", current.display());
                    std::fs::remove_file(&current).map_err(|e| FolderError::io(&current, e))?;
                    self.root.forget(&current);
                }
            }
        }
        if path.is_dir() {
            debug!("replacing directory {} with a file", path.display());
            std::fs::remove_dir_all(path).map_err(|e| FolderError::io(path, e))?;
            self.root.forget(path);
        }
        Ok(())
    }

    pub fn delete_file(&self, name: &str) -> Result<bool, FolderError> {
        let path = self.file_path(name);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|e| FolderError::io(&path, e))?;
        self.root.forget(&path);
        Ok(true)
    }

    pub fn read_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, FolderError> {
        let path = self.file_path(name);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read(&path)
            .map(Some)
            .map_err(|e| FolderError::io(&path, e))
    }

    /// Reads a UTF-8 text file, dropping a byte order mark.
    pub fn read_text(&self, name: &str) -> Result<Option<String>, FolderError> {
        let path = self.file_path(name);
        let Some(bytes) = self.read_bytes(name)? else {
            return Ok(None);
        };
        let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
        String::from_utf8(body.to_vec())
            .map(Some)
            .map_err(|_| FolderError::Encoding { path })
    }

    pub fn read_json(&self, name: &str) -> Result<Option<Value>, FolderError> {
        let path = self.file_path(name);
        let Some(text) = self.read_text(name)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| FolderError::Json { path, source })
    }

    pub fn read_xml(&self, name: &str) -> Result<Option<XmlDocument>, FolderError> {
        let path = self.file_path(name);
        let Some(text) = self.read_text(name)? else {
            return Ok(None);
        };
        XmlDocument::parse(text)
            .map(Some)
            .map_err(|source| FolderError::Xml { path, source })
    }

    /// Names of the regular files directly in this folder, sorted.
    pub fn file_names(&self) -> Result<Vec<String>, FolderError> {
        self.list(|ft| ft.is_file())
    }

    /// Names of the directories directly in this folder, sorted.
    pub fn subfolder_names(&self) -> Result<Vec<String>, FolderError> {
        self.list(|ft| ft.is_dir())
    }

    fn list(&self, keep: impl Fn(&std::fs::FileType) -> bool) -> Result<Vec<String>, FolderError> {
        let dir = self.path();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| FolderError::io(&dir, e))? {
            let entry = entry.map_err(|e| FolderError::io(&dir, e))?;
            let file_type = entry.file_type().map_err(|e| FolderError::io(&entry.path(), e))?;
            if !keep(&file_type) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Every file below this folder as a `/`-separated relative path, sorted.
    pub fn files_recursive(&self) -> Result<Vec<String>, FolderError> {
        let mut out = Vec::new();
        let mut stack = vec![String::new()];
        while let Some(prefix) = stack.pop() {
            let folder = self.subfolder(&prefix);
            for name in folder.file_names()? {
                out.push(join_prefix(&prefix, &name));
            }
            for name in folder.subfolder_names()? {
                stack.push(join_prefix(&prefix, &name));
            }
        }
        out.sort();
        Ok(out)
    }
}

fn join_prefix(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}
