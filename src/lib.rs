//! # md-poster
//!
//! Renders a Markdown document as a themed "poster" card (header band, body,
//! footer band) meant to be screenshotted by a headless browser. The page
//! marks itself ready for capture a fixed delay after it mounts.
//!
//! # Pipeline
//!
//! ```text
//! poster.config.yaml ─┐
//!   (bundled + user)  ├─▶ RawConfig ─▶ ResolvedPresentation ─┐
//!                     │                                      ├─▶ HTML page
//! md / md_url query ──┴─▶ ContentSource ─▶ Markdown ─────────┘
//! ```
//!
//! Both halves are lenient. A config value that is missing or not in its
//! allowed set falls back to a default, and a Markdown source that yields
//! nothing falls through to the next one. The only way a request fails to
//! produce a poster is a server that cannot be reached at all.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Loads and layers `poster.config.yaml` documents into a [`config::RawConfig`] |
//! | [`presentation`] | Sanitizes raw values into closed token sets and builds class lists |
//! | [`content`] | Chooses the Markdown source and fetches `md_url` content |
//! | [`poster`] | Mounted poster instances: content resolution and the readiness timer |
//! | [`render`] | Maud page rendering and Markdown conversion |
//! | [`generate`] | Splits Markdown into sections and writes one page per section |
//! | [`server`] | Axum server exposing poster pages and a small JSON API |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), so all
//! interpolated config text is escaped and a malformed template is a build
//! error. Raw HTML inside the Markdown is shown as text for the same reason.
//!
//! ## Self-Contained Pages
//!
//! The stylesheet and readiness script are inlined into every page. A poster
//! written by `render` looks the same opened from disk as one served by
//! `serve`, and the capture tool needs no second request.
//!
//! ## Closed Token Sets
//!
//! Themes, sizes, aspect ratios, paddings and font sizes are enums in
//! [`presentation`]. Only their class names ever reach the page, so the
//! stylesheet can be written for exactly the values that can occur.

pub mod config;
pub mod content;
pub mod generate;
pub mod output;
pub mod poster;
pub mod presentation;
pub mod render;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
