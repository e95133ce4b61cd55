//! Poster configuration module.
//!
//! Handles loading and layering `poster.config.yaml` documents. The bundled
//! document at the repository root is compiled into the binary; an optional
//! user file passed with `--config` is merged on top of it key by key.
//!
//! ## Configuration Options
//!
//! ```yaml
//! # All options are optional - defaults shown below
//!
//! poster:
//!   theme: SpringGradientWave   # blue | pink | purple | green | yellow | gray
//!                               # | red | indigo | SpringGradientWave | keji02
//!   size: mobile                # desktop | mobile
//!   aspectRatio: auto           # auto | 16/9 | 1/1 | 4/3
//!   canCopy: false              # show the "Copy Image" button
//!   className: ""               # extra classes on the poster card
//!
//! header:
//!   text: "@Nickname · {{date}}"
//!   leftText: ~                 # leftText + rightText together replace text
//!   rightText: ~
//!   position: center            # left | center | right
//!   paddingY: 4                 # 0 1 2 3 4 5 6 8 10 12
//!   fontSize: base              # xs | sm | base | lg | xl | 2xl | 3xl
//!   color: white
//!
//! content:
//!   markdown: ~                 # used when no md / md_url query is given
//!   paddingY: 8
//!   articleClassName: ~
//!
//! footer:
//!   text: Powered by ReadPo.com
//!   position: center
//!   paddingY: 4
//!   fontSize: base
//!   color: gray-50
//! ```
//!
//! ## Leniency
//!
//! Nothing in a poster document can stop a poster from rendering. A layer
//! that fails to parse is dropped with a warning, a section of the wrong
//! shape is treated as absent, and leaves of the wrong shape (lists, maps)
//! are ignored. Scalar leaves keep whatever type the author wrote; the
//! [`presentation`](crate::presentation) module decides what is acceptable.
//! Unknown keys are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// The poster document shipped with the binary.
pub const BUNDLED_CONFIG: &str = include_str!("../poster.config.yaml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A scalar leaf as written by a human editor.
///
/// YAML authors write `paddingY: 4` as often as `paddingY: "4"`, so leaves
/// are kept in their authored type and converted to text on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// String form of the value, the way a number or boolean prints when
    /// interpolated into text. Integral floats print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", *f as i64)
            }
            Scalar::Float(f) => f.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    /// Truthiness: `false`, zero, NaN and the empty string are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Bool(b) => *b,
            Scalar::Int(n) => *n != 0,
            Scalar::Float(f) => *f != 0.0 && !f.is_nan(),
            Scalar::Text(s) => !s.is_empty(),
        }
    }

    fn from_yaml(value: Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Scalar::Int(i)),
                None => n.as_f64().map(Scalar::Float),
            },
            Value::String(s) => Some(Scalar::Text(s)),
            Value::Tagged(tagged) => Scalar::from_yaml(tagged.value),
            Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

fn lenient_scalar<'de, D>(deserializer: D) -> Result<Option<Scalar>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Scalar::from_yaml(value))
}

fn lenient_section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if !value.is_mapping() {
        return Ok(None);
    }
    Ok(serde_yaml::from_value(value).ok())
}

/// A parsed poster document. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    #[serde(deserialize_with = "lenient_section")]
    pub poster: Option<RawPoster>,
    #[serde(deserialize_with = "lenient_section")]
    pub header: Option<RawHeader>,
    #[serde(deserialize_with = "lenient_section")]
    pub content: Option<RawContent>,
    #[serde(deserialize_with = "lenient_section")]
    pub footer: Option<RawFooter>,
}

/// The `poster:` section: card-level settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPoster {
    #[serde(deserialize_with = "lenient_scalar")]
    pub theme: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub size: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub aspect_ratio: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub can_copy: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub class_name: Option<Scalar>,
}

/// The `header:` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawHeader {
    #[serde(deserialize_with = "lenient_scalar")]
    pub text: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub left_text: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub right_text: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub position: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub padding_y: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub font_size: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub color: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub class_name: Option<Scalar>,
}

/// The `content:` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawContent {
    #[serde(deserialize_with = "lenient_scalar")]
    pub markdown: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub padding_y: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub class_name: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub article_class_name: Option<Scalar>,
}

/// The `footer:` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawFooter {
    #[serde(deserialize_with = "lenient_scalar")]
    pub text: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub position: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub padding_y: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub font_size: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub color: Option<Scalar>,
    #[serde(deserialize_with = "lenient_scalar")]
    pub class_name: Option<Scalar>,
}

impl RawConfig {
    /// Parse a single document, treating any failure as "no configuration".
    pub fn from_yaml_str(source: &str) -> Option<Self> {
        resolve_config(parse_layer(source, "inline"), None)
    }

    /// Embedded Markdown from `content.markdown`, if non-empty.
    pub fn markdown(&self) -> Option<String> {
        self.content
            .as_ref()
            .and_then(|c| c.markdown.as_ref())
            .map(Scalar::to_text)
            .filter(|s| !s.is_empty())
    }
}

// =============================================================================
// Layer loading and merging
// =============================================================================

/// Parse a YAML document into a raw value.
///
/// Returns `Ok(None)` for a blank document.
pub fn parse_document(source: &str) -> Result<Option<Value>, ConfigError> {
    if source.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_yaml::from_str(source)?;
    Ok(Some(value))
}

/// Parse a layer, logging and dropping it when it is not valid YAML.
pub fn parse_layer(source: &str, origin: &str) -> Option<Value> {
    match parse_document(source) {
        Ok(value) => value,
        Err(e) => {
            warn!(origin, error = %e, "Ignoring unparsable poster config");
            None
        }
    }
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Mappings are merged key-by-key (overlay keys override base keys).
/// - Non-mapping values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_yaml(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => merge_yaml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Read a user config file as an overlay layer.
///
/// Returns `Err` only if the file cannot be read; a file that is not valid
/// YAML is logged and yields `Ok(None)`.
pub fn load_overlay(path: &Path) -> Result<Option<Value>, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_layer(&content, &path.display().to_string()))
}

/// Merge an optional overlay onto an optional base and deserialize.
///
/// A merged document that is not a mapping carries no settings and yields
/// `None`.
pub fn resolve_config(base: Option<Value>, overlay: Option<Value>) -> Option<RawConfig> {
    let merged = match (base, overlay) {
        (Some(b), Some(o)) => merge_yaml(b, o),
        (Some(v), None) | (None, Some(v)) => v,
        (None, None) => return None,
    };
    if !merged.is_mapping() {
        debug!("Poster config is not a mapping, using defaults");
        return None;
    }
    match serde_yaml::from_value(merged) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(error = %e, "Poster config did not deserialize, using defaults");
            None
        }
    }
}

/// Load the bundled document plus an optional user overlay file.
pub fn load_config(overlay_path: Option<&Path>) -> Result<Option<RawConfig>, ConfigError> {
    let base = parse_layer(BUNDLED_CONFIG, "bundled poster.config.yaml");
    let overlay = match overlay_path {
        Some(path) => load_overlay(path)?,
        None => None,
    };
    Ok(resolve_config(base, overlay))
}

/// Returns a fully-commented stock `poster.config.yaml` with every key.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_yaml() -> &'static str {
    r##"# md-poster configuration
# =======================
# Every setting is optional. Values shown are the defaults.
# Invalid values never fail a render: they fall back to the default.

# ---------------------------------------------------------------------------
# Poster card
# ---------------------------------------------------------------------------
poster:
  # blue | pink | purple | green | yellow | gray | red | indigo
  # | SpringGradientWave | keji02
  theme: SpringGradientWave
  # desktop | mobile
  size: mobile
  # auto | 16/9 | 1/1 | 4/3
  aspectRatio: auto
  # Show a "Copy Image" button in the footer.
  canCopy: false
  # Extra classes appended to the card.
  # className: shadow-xl

# ---------------------------------------------------------------------------
# Header band
# ---------------------------------------------------------------------------
header:
  # {{date}} (any casing) becomes today's date, YYYY-MM-DD.
  text: "@Nickname · {{date}}"
  # Setting both leftText and rightText replaces text and spreads the two
  # values to the edges, whatever position says.
  # leftText: "@Nickname"
  # rightText: "{{date}}"
  # left | center | right
  position: center
  # Vertical padding: 0 1 2 3 4 5 6 8 10 12
  paddingY: 4
  # xs | sm | base | lg | xl | 2xl | 3xl
  fontSize: base
  # Color name, with or without the text- prefix.
  color: white
  # className: tracking-wide

# ---------------------------------------------------------------------------
# Body
# ---------------------------------------------------------------------------
content:
  # Markdown shown when the page has no md / md_url query parameter.
  # markdown: |
  #   # Title
  #   Body text.
  paddingY: 8
  # className: ~
  # articleClassName: ~

# ---------------------------------------------------------------------------
# Footer band
# ---------------------------------------------------------------------------
footer:
  text: Powered by ReadPo.com
  position: center
  paddingY: 4
  fontSize: base
  color: gray-50
  # className: ~
"##
}
