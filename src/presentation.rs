//! Presentation resolution: loose configuration in, bounded style tokens out.
//!
//! A [`RawConfig`] is whatever a human typed into a YAML file. This module
//! turns it into a [`ResolvedPresentation`] in which every token the
//! renderer sees comes from a closed enumeration:
//!
//! | Field | Accepted | Default |
//! |-------|----------|---------|
//! | theme | `blue` `pink` `purple` `green` `yellow` `gray` `red` `indigo` `SpringGradientWave` `keji02` | `SpringGradientWave` |
//! | size | `desktop` `mobile` | `mobile` |
//! | aspect ratio | `auto` `16/9` `1/1` `4/3` | `auto` |
//! | padding | `0` `1` `2` `3` `4` `5` `6` `8` `10` `12` | `4` header/footer, `8` content |
//! | font size | `xs` `sm` `base` `lg` `xl` `2xl` `3xl`, any casing | `base` |
//! | alignment | `left` `center` `right` | `center` |
//! | color | any non-empty name, `text-` prefixed once | `white` header, `gray-50` footer |
//!
//! Resolution is total. A rejected value is replaced by its default and, when
//! asked for, reported as a [`Rejection`]; it never becomes an error.
//!
//! `{{date}}` in header and footer text (any casing, every occurrence) is
//! replaced with the resolution date as `YYYY-MM-DD`.

use crate::config::{RawConfig, Scalar};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::sync::LazyLock;
use tracing::debug;

pub const DEFAULT_HEADER_TEXT: &str = "@Nickname · {{date}}";
pub const DEFAULT_FOOTER_TEXT: &str = "Powered by ReadPo.com";

const DEFAULT_HEADER_COLOR: &str = "white";
const DEFAULT_FOOTER_COLOR: &str = "gray-50";
const COLOR_PREFIX: &str = "text-";

static DATE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{\{date\}\}").expect("static regex"));

/// Today's date in UTC, the date a poster rendered now would show.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Replace every `{{date}}` placeholder, in any casing, with `date`.
pub fn substitute_date(text: &str, date: NaiveDate) -> String {
    let stamp = date.format("%Y-%m-%d").to_string();
    DATE_PLACEHOLDER
        .replace_all(text, regex::NoExpand(&stamp))
        .into_owned()
}

// ============================================================================
// Token enumerations
// ============================================================================

/// A closed set of string tokens with a total parser.
pub trait Token: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }
}

macro_rules! serialize_as_str {
    ($($ty:ty),*) => {
        $(impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        })*
    };
}

/// Poster color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Blue,
    Pink,
    Purple,
    Green,
    Yellow,
    Gray,
    Red,
    Indigo,
    #[default]
    SpringGradientWave,
    Keji02,
}

impl Token for Theme {
    const ALL: &'static [Self] = &[
        Theme::Blue,
        Theme::Pink,
        Theme::Purple,
        Theme::Green,
        Theme::Yellow,
        Theme::Gray,
        Theme::Red,
        Theme::Indigo,
        Theme::SpringGradientWave,
        Theme::Keji02,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Theme::Blue => "blue",
            Theme::Pink => "pink",
            Theme::Purple => "purple",
            Theme::Green => "green",
            Theme::Yellow => "yellow",
            Theme::Gray => "gray",
            Theme::Red => "red",
            Theme::Indigo => "indigo",
            Theme::SpringGradientWave => "SpringGradientWave",
            Theme::Keji02 => "keji02",
        }
    }
}

/// Poster width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PosterSize {
    Desktop,
    #[default]
    Mobile,
}

impl Token for PosterSize {
    const ALL: &'static [Self] = &[PosterSize::Desktop, PosterSize::Mobile];

    fn as_str(self) -> &'static str {
        match self {
            PosterSize::Desktop => "desktop",
            PosterSize::Mobile => "mobile",
        }
    }
}

/// Poster aspect ratio. `Auto` lets the content decide the height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    Auto,
    Widescreen,
    Square,
    Classic,
}

impl Token for AspectRatio {
    const ALL: &'static [Self] = &[
        AspectRatio::Auto,
        AspectRatio::Widescreen,
        AspectRatio::Square,
        AspectRatio::Classic,
    ];

    fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Auto => "auto",
            AspectRatio::Widescreen => "16/9",
            AspectRatio::Square => "1/1",
            AspectRatio::Classic => "4/3",
        }
    }
}

/// Vertical padding step for a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    P0,
    P1,
    P2,
    P3,
    P4,
    P5,
    P6,
    P8,
    P10,
    P12,
}

impl Token for Padding {
    const ALL: &'static [Self] = &[
        Padding::P0,
        Padding::P1,
        Padding::P2,
        Padding::P3,
        Padding::P4,
        Padding::P5,
        Padding::P6,
        Padding::P8,
        Padding::P10,
        Padding::P12,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Padding::P0 => "0",
            Padding::P1 => "1",
            Padding::P2 => "2",
            Padding::P3 => "3",
            Padding::P4 => "4",
            Padding::P5 => "5",
            Padding::P6 => "6",
            Padding::P8 => "8",
            Padding::P10 => "10",
            Padding::P12 => "12",
        }
    }
}

impl Padding {
    pub fn class(self) -> String {
        format!("py-{}", self.as_str())
    }
}

/// Named font size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontSize {
    Xs,
    Sm,
    #[default]
    Base,
    Lg,
    Xl,
    Xl2,
    Xl3,
}

impl Token for FontSize {
    const ALL: &'static [Self] = &[
        FontSize::Xs,
        FontSize::Sm,
        FontSize::Base,
        FontSize::Lg,
        FontSize::Xl,
        FontSize::Xl2,
        FontSize::Xl3,
    ];

    fn as_str(self) -> &'static str {
        match self {
            FontSize::Xs => "xs",
            FontSize::Sm => "sm",
            FontSize::Base => "base",
            FontSize::Lg => "lg",
            FontSize::Xl => "xl",
            FontSize::Xl2 => "2xl",
            FontSize::Xl3 => "3xl",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        Self::ALL.iter().copied().find(|t| t.as_str() == lower)
    }
}

impl FontSize {
    pub fn class(self) -> String {
        format!("text-{}", self.as_str())
    }
}

/// Horizontal placement of band text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    Left,
    #[default]
    Center,
    Right,
}

impl Token for Alignment {
    const ALL: &'static [Self] = &[Alignment::Left, Alignment::Center, Alignment::Right];

    fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

impl Alignment {
    pub fn layout_class(self) -> &'static str {
        match self {
            Alignment::Left => "flex justify-start items-center text-left",
            Alignment::Center => "flex justify-center items-center text-center",
            Alignment::Right => "flex justify-end items-center text-right",
        }
    }
}

serialize_as_str!(Theme, PosterSize, AspectRatio, Padding, FontSize, Alignment);

/// A text color class, always carrying the `text-` prefix exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TextColor(String);

impl TextColor {
    /// Normalize a color name. Empty names are rejected.
    pub fn parse(name: &str) -> Option<Self> {
        if name.is_empty() {
            return None;
        }
        if name.starts_with(COLOR_PREFIX) {
            Some(Self(name.to_string()))
        } else {
            Some(Self(format!("{COLOR_PREFIX}{name}")))
        }
    }

    pub fn class(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Resolved presentation
// ============================================================================

/// Style shared by the header and footer bands.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandStyle {
    pub padding: Padding,
    pub font_size: FontSize,
    pub color: TextColor,
    pub alignment: Alignment,
    pub class_name: Option<String>,
}

/// Header content: a single line, or a left/right pair spread to the edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HeaderText {
    Single(String),
    Split { left: String, right: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderBand {
    pub style: BandStyle,
    pub text: HeaderText,
}

impl HeaderBand {
    /// Layout part of the class list. A split header always spreads its two
    /// values apart, whatever the configured alignment.
    pub fn layout_class(&self) -> String {
        match self.text {
            HeaderText::Split { .. } => "flex justify-between items-center px-4 w-full".to_string(),
            HeaderText::Single(_) => format!("{} px-4 w-full", self.style.alignment.layout_class()),
        }
    }

    pub fn class_name(&self) -> String {
        band_class(&self.style, &self.layout_class())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBand {
    pub padding: Padding,
    pub class_name: Option<String>,
    pub article_class_name: Option<String>,
}

impl ContentBand {
    pub fn class_name(&self) -> String {
        join_classes(&[Some(self.padding.class().as_str()), self.class_name.as_deref()])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FooterBand {
    pub style: BandStyle,
    pub text: String,
}

impl FooterBand {
    pub fn layout_class(&self) -> String {
        format!("gap-1 w-full {}", self.style.alignment.layout_class())
    }

    pub fn class_name(&self) -> String {
        band_class(&self.style, &self.layout_class())
    }
}

fn band_class(style: &BandStyle, layout: &str) -> String {
    join_classes(&[
        Some(style.padding.class().as_str()),
        Some(style.font_size.class().as_str()),
        Some(style.color.class()),
        Some(layout),
        style.class_name.as_deref(),
    ])
}

/// Join class fragments with single spaces, skipping absent and empty ones.
pub fn join_classes(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every presentation parameter the renderer needs, fully defaulted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPresentation {
    pub theme: Theme,
    pub size: PosterSize,
    pub aspect_ratio: AspectRatio,
    pub can_copy: bool,
    pub class_name: Option<String>,
    pub header: HeaderBand,
    pub content: ContentBand,
    pub footer: FooterBand,
}

/// A configured value that was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Dotted config path, e.g. `header.paddingY`.
    pub field: &'static str,
    pub value: String,
    pub fallback: String,
}

impl ResolvedPresentation {
    /// Resolve against `date`. Absent configuration yields all defaults.
    pub fn resolve(config: Option<&RawConfig>, date: NaiveDate) -> Self {
        Self::resolve_with_report(config, date).0
    }

    /// Resolve against today's UTC date.
    pub fn resolve_today(config: Option<&RawConfig>) -> Self {
        Self::resolve(config, today())
    }

    /// Resolve and also return every value that fell back to its default.
    pub fn resolve_with_report(
        config: Option<&RawConfig>,
        date: NaiveDate,
    ) -> (Self, Vec<Rejection>) {
        let mut r = Resolver {
            date,
            rejections: Vec::new(),
        };
        let poster = config.and_then(|c| c.poster.as_ref());
        let header = config.and_then(|c| c.header.as_ref());
        let content = config.and_then(|c| c.content.as_ref());
        let footer = config.and_then(|c| c.footer.as_ref());

        let theme = r.token("poster.theme", poster.and_then(|p| p.theme.as_ref()), Theme::default());
        let size = r.token("poster.size", poster.and_then(|p| p.size.as_ref()), PosterSize::default());
        let aspect_ratio = r.token(
            "poster.aspectRatio",
            poster.and_then(|p| p.aspect_ratio.as_ref()),
            AspectRatio::default(),
        );
        let can_copy = poster
            .and_then(|p| p.can_copy.as_ref())
            .is_some_and(Scalar::is_truthy);
        let class_name = extra_class(poster.and_then(|p| p.class_name.as_ref()));

        let header_band = HeaderBand {
            style: BandStyle {
                padding: r.token("header.paddingY", header.and_then(|h| h.padding_y.as_ref()), Padding::P4),
                font_size: r.font_size("header.fontSize", header.and_then(|h| h.font_size.as_ref())),
                color: color_or(header.and_then(|h| h.color.as_ref()), DEFAULT_HEADER_COLOR),
                alignment: r.token(
                    "header.position",
                    header.and_then(|h| h.position.as_ref()),
                    Alignment::default(),
                ),
                class_name: extra_class(header.and_then(|h| h.class_name.as_ref())),
            },
            text: r.header_text(header),
        };

        let content_band = ContentBand {
            padding: r.token("content.paddingY", content.and_then(|c| c.padding_y.as_ref()), Padding::P8),
            class_name: extra_class(content.and_then(|c| c.class_name.as_ref())),
            article_class_name: extra_class(content.and_then(|c| c.article_class_name.as_ref())),
        };

        let footer_band = FooterBand {
            style: BandStyle {
                padding: r.token("footer.paddingY", footer.and_then(|f| f.padding_y.as_ref()), Padding::P4),
                font_size: r.font_size("footer.fontSize", footer.and_then(|f| f.font_size.as_ref())),
                color: color_or(footer.and_then(|f| f.color.as_ref()), DEFAULT_FOOTER_COLOR),
                alignment: r.token(
                    "footer.position",
                    footer.and_then(|f| f.position.as_ref()),
                    Alignment::default(),
                ),
                class_name: extra_class(footer.and_then(|f| f.class_name.as_ref())),
            },
            text: r.text(
                footer.and_then(|f| f.text.as_ref()),
                DEFAULT_FOOTER_TEXT,
            ),
        };

        let resolved = Self {
            theme,
            size,
            aspect_ratio,
            can_copy,
            class_name,
            header: header_band,
            content: content_band,
            footer: footer_band,
        };
        (resolved, r.rejections)
    }
}

struct Resolver {
    date: NaiveDate,
    rejections: Vec<Rejection>,
}

impl Resolver {
    fn token<T: Token>(&mut self, field: &'static str, raw: Option<&Scalar>, default: T) -> T {
        let Some(raw) = raw else {
            return default;
        };
        let text = raw.to_text();
        match T::parse(&text) {
            Some(token) => token,
            None => {
                self.reject(field, text, default.as_str());
                default
            }
        }
    }

    fn font_size(&mut self, field: &'static str, raw: Option<&Scalar>) -> FontSize {
        // An empty size reads as "not set" rather than as a bad value.
        let raw = raw.filter(|s| !s.to_text().is_empty());
        self.token(field, raw, FontSize::default())
    }

    fn text(&self, raw: Option<&Scalar>, default: &str) -> String {
        let text = raw.map(Scalar::to_text);
        substitute_date(text.as_deref().unwrap_or(default), self.date)
    }

    fn header_text(&self, header: Option<&crate::config::RawHeader>) -> HeaderText {
        let left = header.and_then(|h| h.left_text.as_ref());
        let right = header.and_then(|h| h.right_text.as_ref());
        match (left, right) {
            (Some(l), Some(r)) => HeaderText::Split {
                left: substitute_date(&l.to_text(), self.date),
                right: substitute_date(&r.to_text(), self.date),
            },
            _ => HeaderText::Single(self.text(
                header.and_then(|h| h.text.as_ref()),
                DEFAULT_HEADER_TEXT,
            )),
        }
    }

    fn reject(&mut self, field: &'static str, value: String, fallback: &str) {
        debug!(field, value = %value, fallback, "Rejected poster config value");
        self.rejections.push(Rejection {
            field,
            value,
            fallback: fallback.to_string(),
        });
    }
}

fn color_or(raw: Option<&Scalar>, default: &str) -> TextColor {
    raw.and_then(|s| TextColor::parse(&s.to_text()))
        .unwrap_or_else(|| TextColor(format!("{COLOR_PREFIX}{default}")))
}

fn extra_class(raw: Option<&Scalar>) -> Option<String> {
    raw.map(Scalar::to_text).filter(|s| !s.is_empty())
}
