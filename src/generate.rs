//! Writing poster pages to disk.
//!
//! A long Markdown document is cut into one poster per second-level section:
//! every line starting with `## ` opens a new section, and whatever comes
//! before the first such line is a section of its own.
//!
//! ## Output Structure
//!
//! ```text
//! posters/                   # single file input
//! ├── poster_01.html
//! └── poster_02.html
//!
//! posters/                   # directory input: one folder per .md file,
//! ├── launch/                #   mirroring its path below the input
//! │   └── poster_01.html
//! └── 2024/
//!     └── notes/             # from 2024/notes.md
//!         ├── poster_01.html
//!         └── poster_02.html
//! ```
//!
//! Pages are written with the readiness script inlined, so capture tooling
//! can open them straight from disk and wait for `data-config-ready`.

use crate::poster::PosterView;
use crate::presentation::ResolvedPresentation;
use crate::render;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A poster page written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPoster {
    /// Markdown file the section came from.
    pub source: PathBuf,
    /// 1-based section position within its source.
    pub index: usize,
    /// First heading of the section, if any.
    pub title: Option<String>,
    pub path: PathBuf,
}

/// Split Markdown into sections at lines starting with `## `.
///
/// Line endings are preserved. Empty input yields no sections.
pub fn split_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if line.starts_with("## ") && !current.is_empty() {
            sections.push(std::mem::take(&mut current));
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

/// File name for the `index`th (1-based) poster.
pub fn poster_file_name(index: usize) -> String {
    format!("poster_{index:02}.html")
}

/// Render a Markdown file or every `.md` file under a directory.
pub fn generate(
    input: &Path,
    output_dir: &Path,
    presentation: &ResolvedPresentation,
    ready_delay: Duration,
) -> Result<Vec<GeneratedPoster>, GenerateError> {
    if !input.is_dir() {
        return generate_file(input, output_dir, presentation, ready_delay);
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "md") {
            sources.push(path.to_path_buf());
        }
    }
    debug!(count = sources.len(), dir = %input.display(), "Found Markdown files");

    let mut generated = Vec::new();
    for source in sources {
        generated.extend(generate_file(
            &source,
            &output_dir.join(poster_dir(input, &source)),
            presentation,
            ready_delay,
        )?);
    }
    Ok(generated)
}

/// Output folder for `source`, relative to the output root: its path below
/// `input` without the extension. Distinct sources never share a folder.
fn poster_dir(input: &Path, source: &Path) -> PathBuf {
    source
        .strip_prefix(input)
        .unwrap_or(source)
        .with_extension("")
}

/// Render each section of one Markdown file into `output_dir`.
pub fn generate_file(
    source: &Path,
    output_dir: &Path,
    presentation: &ResolvedPresentation,
    ready_delay: Duration,
) -> Result<Vec<GeneratedPoster>, GenerateError> {
    let text = fs::read_to_string(source)?;
    let sections = split_sections(&text);
    if sections.is_empty() {
        info!(source = %source.display(), "No sections found, nothing to render");
        return Ok(Vec::new());
    }

    fs::create_dir_all(output_dir)?;
    sections
        .into_par_iter()
        .enumerate()
        .map(|(i, section)| -> Result<GeneratedPoster, GenerateError> {
            let index = i + 1;
            let path = output_dir.join(poster_file_name(index));
            let title = render::first_heading(&section);
            let view = PosterView::new(presentation.clone(), section, ready_delay);
            fs::write(&path, render::render_page(&view).into_string())?;
            Ok(GeneratedPoster {
                source: source.to_path_buf(),
                index,
                title,
                path,
            })
        })
        .collect()
}
