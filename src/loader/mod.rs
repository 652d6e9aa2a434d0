//! Document discovery and text extraction
//!
//! Walks a directory tree and turns every `.txt` and `.pdf` file into a
//! [`Document`]. Files that cannot be read are logged and skipped.


use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Raw text of one file, identified by its path relative to the documents root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Load every supported document below `root`, in path order
#[inline]
pub fn load_documents(root: &Path) -> Result<Vec<Document>> {
    if !root.is_dir() {
        anyhow::bail!("Documents directory not found: {}", root.display());
    }

    info!("Reading documents from {}", root.display());

    let mut documents = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(kind) = DocumentKind::from_path(path) else {
            continue;
        };

        match read_document(path, kind) {
            Ok(text) => {
                let source = relative_source(root, path);
                debug!("Loaded {} ({} bytes)", source, text.len());
                documents.push(Document { source, text });
            }
            Err(e) => warn!("Error reading {}: {:#}", path.display(), e),
        }
    }

    info!("Loaded {} documents", documents.len());
    Ok(documents)
}

fn read_document(path: &Path, kind: DocumentKind) -> Result<String> {
    match kind {
        DocumentKind::Text => fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {}", path.display())),
        DocumentKind::Pdf => extract_pdf_text(path),
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf_text(path: &Path) -> Result<String> {
    pdf_extract::extract_text(path)
        .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf_text(path: &Path) -> Result<String> {
    anyhow::bail!(
        "PDF support not enabled, skipping {}. Compile with --features pdf",
        path.display()
    )
}

/// `/`-separated path of `path` relative to `root`
fn relative_source(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
