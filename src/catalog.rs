//! Diagram catalog: discovers draw.io files and extracts their pages.
//!
//! DESIGN
//! ======
//! A diagram file is an `<mxfile>` whose direct `<diagram>` children are the
//! pages (tabs). Each page's geometry lives on its nested `<mxGraphModel>`
//! (`dx`, `dy`, `pageScale`). Values are kept as raw strings: numeric parsing,
//! and its silent fallback to zero, belongs to the render parameter builder.
//!
//! ERROR HANDLING
//! ==============
//! Failing to walk the scan root is fatal. A single unreadable or malformed
//! file is logged and skipped so one bad file never hides the rest.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::{debug, info, warn};

/// File extensions (without dot) recognised as diagrams.
pub const DIAGRAM_EXTENSIONS: &[&str] = &["dio", "drawio"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to walk {}: {source}", path.display())]
    Walk { path: PathBuf, source: std::io::Error },
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    Xml { path: PathBuf, source: quick_xml::Error },
}

/// One renderable page (tab) of a diagram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub id: String,
    /// Display name; may be empty.
    pub name: String,
    /// Raw `dx` of the page's graph model.
    pub width: String,
    /// Raw `dy` of the page's graph model.
    pub height: String,
    /// Raw `pageScale` of the page's graph model.
    pub scale: String,
}

/// One diagram source file.
#[derive(Debug, Clone)]
pub struct Diagram {
    pub path: PathBuf,
    /// Path relative to the scan root; drives the output location.
    pub rel_path: PathBuf,
    /// Whole file text with newlines stripped, handed verbatim to the engine.
    pub body: String,
    pub pages: Vec<Page>,
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// Recursively load every diagram under `root` whose extension is in
/// `extensions`. Results are ordered by path.
///
/// # Errors
///
/// Returns [`CatalogError::Walk`] if `root` or a directory beneath it cannot
/// be listed.
pub fn read_dir(root: &Path, extensions: &[&str]) -> Result<Vec<Diagram>, CatalogError> {
    let mut files = Vec::new();
    collect_files(root, extensions, &mut files)?;

    let mut diagrams = Vec::with_capacity(files.len());
    for path in files {
        match read_diagram(root, &path) {
            Ok(diagram) => diagrams.push(diagram),
            Err(e) => warn!(error = %e, "failed to read diagram file; skipping"),
        }
    }

    info!(count = diagrams.len(), "read diagrams");
    for diagram in &diagrams {
        debug!(path = %diagram.path.display(), pages = diagram.pages.len(), "diagram");
    }
    Ok(diagrams)
}

fn collect_files(dir: &Path, extensions: &[&str], out: &mut Vec<PathBuf>) -> Result<(), CatalogError> {
    let walk_err = |source| CatalogError::Walk { path: dir.to_path_buf(), source };

    // Entry file types do not follow symlinks, so linked directories are
    // never descended into.
    let mut entries = std::fs::read_dir(dir)
        .map_err(walk_err)?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?.is_dir()))))
        .collect::<Result<Vec<_>, _>>()
        .map_err(walk_err)?;
    entries.sort();

    for (path, is_dir) in entries {
        if is_dir {
            collect_files(&path, extensions, out)?;
        } else if has_extension(&path, extensions) {
            out.push(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

/// Read and parse a single diagram file.
///
/// # Errors
///
/// Returns [`CatalogError::Read`] on I/O failure and [`CatalogError::Xml`]
/// if the document is not well-formed.
pub fn read_diagram(root: &Path, path: &Path) -> Result<Diagram, CatalogError> {
    debug!(path = %path.display(), "reading diagram");
    let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Read { path: path.to_path_buf(), source })?;
    let pages = parse_pages(&text).map_err(|source| CatalogError::Xml { path: path.to_path_buf(), source })?;

    let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let rel_path = path.strip_prefix(root).unwrap_or(path).to_path_buf();

    Ok(Diagram { path: abs, rel_path, body: text.replace('\n', ""), pages })
}

// =============================================================================
// PARSING
// =============================================================================

const DIAGRAM_DEPTH: usize = 2;
const GRAPH_MODEL_DEPTH: usize = 3;

/// Extract pages from diagram XML, in document order.
///
/// # Errors
///
/// Returns the reader's error for malformed XML (including mismatched end
/// tags).
pub fn parse_pages(xml: &str) -> Result<Vec<Page>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut pages = Vec::new();
    let mut current: Option<Page> = None;
    let mut depth = 0_usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                open_element(&e, depth, &mut current);
            }
            Event::Empty(e) => {
                open_element(&e, depth + 1, &mut current);
                if depth + 1 == DIAGRAM_DEPTH {
                    pages.extend(current.take());
                }
            }
            Event::End(_) => {
                if depth == DIAGRAM_DEPTH {
                    pages.extend(current.take());
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(pages)
}

fn open_element(e: &BytesStart<'_>, depth: usize, current: &mut Option<Page>) {
    match (e.local_name().as_ref(), depth) {
        (b"diagram", DIAGRAM_DEPTH) => {
            *current = Some(Page {
                id: attribute(e, b"id"),
                name: attribute(e, b"name"),
                ..Page::default()
            });
        }
        (b"mxGraphModel", GRAPH_MODEL_DEPTH) => {
            if let Some(page) = current.as_mut() {
                page.width = attribute(e, b"dx");
                page.height = attribute(e, b"dy");
                page.scale = attribute(e, b"pageScale");
            }
        }
        _ => {}
    }
}

/// Unescaped attribute value, or empty when absent or undecodable.
fn attribute(e: &BytesStart<'_>, key: &[u8]) -> String {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| {
            attr.unescape_value()
                .map_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned(), std::borrow::Cow::into_owned)
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
