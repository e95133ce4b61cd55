//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. A poster is shown by
//! its positional index and title, with the written file as secondary context
//! after an arrow. A resolved presentation is shown band by band with the
//! exact class lists the page will carry, so a config can be checked without
//! opening a browser.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Poster
//!     Theme: keji02
//!     Size: mobile
//!     Aspect ratio: auto
//!     Copy button: off
//! Header
//!     Text: @Nickname · 2024-05-07
//!     Classes: py-4 text-sm text-white flex justify-center items-center text-center px-4 w-full
//! Content
//!     Classes: py-8
//! Footer
//!     Text: Powered by ReadPo.com
//!     Classes: py-4 text-xs text-gray-50 gap-1 w-full flex justify-center items-center text-center
//!
//! Fallbacks
//!     header.fontSize: "huge" → base
//! ```
//!
//! ## Render
//!
//! ```text
//! launch.md
//!     001 Launch day → launch/poster_01.html
//!     002 (untitled) → launch/poster_02.html
//!
//! Rendered 2 posters from 1 file
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::generate::GeneratedPoster;
use crate::presentation::{HeaderText, Rejection, ResolvedPresentation, Token};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Show `path` relative to `base` when it lives underneath it.
fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Check
// ============================================================================

/// Format a resolved presentation and the values that fell back to defaults.
pub fn format_presentation(p: &ResolvedPresentation, rejections: &[Rejection]) -> Vec<String> {
    let i = indent(1);
    let mut lines = vec![
        "Poster".to_string(),
        format!("{i}Theme: {}", p.theme.as_str()),
        format!("{i}Size: {}", p.size.as_str()),
        format!("{i}Aspect ratio: {}", p.aspect_ratio.as_str()),
        format!("{i}Copy button: {}", on_off(p.can_copy)),
    ];
    if let Some(extra) = &p.class_name {
        lines.push(format!("{i}Extra classes: {extra}"));
    }

    lines.push("Header".to_string());
    match &p.header.text {
        HeaderText::Single(text) => lines.push(format!("{i}Text: {text}")),
        HeaderText::Split { left, right } => {
            lines.push(format!("{i}Left: {left}"));
            lines.push(format!("{i}Right: {right}"));
        }
    }
    lines.push(format!("{i}Classes: {}", p.header.class_name()));

    lines.push("Content".to_string());
    lines.push(format!("{i}Classes: {}", p.content.class_name()));
    if let Some(article) = &p.content.article_class_name {
        lines.push(format!("{i}Article classes: {article}"));
    }

    lines.push("Footer".to_string());
    lines.push(format!("{i}Text: {}", p.footer.text));
    lines.push(format!("{i}Classes: {}", p.footer.class_name()));

    if !rejections.is_empty() {
        lines.push(String::new());
        lines.push("Fallbacks".to_string());
        for r in rejections {
            lines.push(format!(
                "{i}{}: {:?} \u{2192} {}",
                r.field, r.value, r.fallback
            ));
        }
    }
    lines
}

/// Print a resolved presentation to stdout.
pub fn print_presentation(p: &ResolvedPresentation, rejections: &[Rejection]) {
    for line in format_presentation(p, rejections) {
        println!("{}", line);
    }
}

// ============================================================================
// Render
// ============================================================================

/// Format the posters written by a render run, grouped by source file.
///
/// Posters must be in the order they were generated; a new group starts
/// whenever the source changes.
pub fn format_generate_output(posters: &[GeneratedPoster], output_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<&Path> = None;
    let mut files = 0;

    for poster in posters {
        if current != Some(poster.source.as_path()) {
            current = Some(poster.source.as_path());
            files += 1;
            let name = poster
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| poster.source.display().to_string());
            lines.push(name);
        }
        let title = match &poster.title {
            Some(t) => t.as_str(),
            None => "(untitled)",
        };
        lines.push(format!(
            "{}{} {} \u{2192} {}",
            indent(1),
            format_index(poster.index),
            title,
            display_path(&poster.path, output_dir)
        ));
    }

    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Rendered {} {} from {} {}",
        posters.len(),
        if posters.len() == 1 { "poster" } else { "posters" },
        files,
        if files == 1 { "file" } else { "files" }
    ));
    lines
}

/// Print render output to stdout.
pub fn print_generate_output(posters: &[GeneratedPoster], output_dir: &Path) {
    for line in format_generate_output(posters, output_dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
