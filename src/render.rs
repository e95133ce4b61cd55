//! Poster page rendering.
//!
//! Uses [maud](https://maud.lambda.xyz/) for the page and pulldown-cmark for
//! the Markdown body. The page is self-contained: the stylesheet and the
//! readiness script are inlined so a poster written to disk renders the same
//! as one served over HTTP.
//!
//! ## DOM contract
//!
//! ```text
//! main
//! └── div#poster-root.w-fit [data-theme] [data-ready-delay] [data-config-ready]
//!     └── div.poster.poster-theme-<theme>.poster-<size>[.poster-aspect-<w>-<h>]
//!         ├── header.poster-header   (header band classes)
//!         ├── section.poster-content (content band classes)
//!         │   └── article.poster-article
//!         └── footer.poster-footer   (footer band classes)
//! ```
//!
//! `data-config-ready="true"` is what capture tooling waits for. It is
//! emitted directly when the view is already ready, otherwise the bundled
//! script sets it `data-ready-delay` milliseconds after load.

use crate::poster::PosterView;
use crate::presentation::{
    AspectRatio, ContentBand, FooterBand, HeaderBand, HeaderText, ResolvedPresentation, Token,
    join_classes,
};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html as md_html};

pub const CSS: &str = include_str!("../static/poster.css");
pub const JS: &str = include_str!("../static/poster.js");

const DEFAULT_TITLE: &str = "Poster";

/// Convert Markdown to HTML. Raw HTML in the source is shown as text.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// Plain text of the first heading, ATX or setext, as CommonMark parses it.
pub fn first_heading(markdown: &str) -> Option<String> {
    let mut title: Option<String> = None;
    for event in Parser::new_ext(markdown, Options::empty()) {
        match (&mut title, event) {
            (None, Event::Start(Tag::Heading { .. })) => title = Some(String::new()),
            (Some(t), Event::Text(text) | Event::Code(text)) => t.push_str(&text),
            (Some(t), Event::SoftBreak | Event::HardBreak) => t.push(' '),
            (Some(t), Event::End(TagEnd::Heading(_))) => {
                let trimmed = t.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
                title = None;
            }
            _ => {}
        }
    }
    None
}

/// Render a complete HTML document for the view.
pub fn render_page(view: &PosterView) -> Markup {
    let title = first_heading(&view.markdown).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                main {
                    (render_poster(view))
                }
                script { (PreEscaped(JS)) }
            }
        }
    }
}

/// Render the poster root element.
pub fn render_poster(view: &PosterView) -> Markup {
    let p = &view.presentation;
    html! {
        div #poster-root .w-fit
            data-config-ready=[view.ready.then_some("true")]
            data-theme=(p.theme.as_str())
            data-ready-delay=(view.ready_delay.as_millis().to_string()) {
            div class=(poster_class(p)) data-can-copy=[p.can_copy.then_some("true")] {
                (render_header(&p.header))
                (render_content(&p.content, &view.markdown))
                (render_footer(&p.footer, p.can_copy))
            }
        }
    }
}

fn poster_class(p: &ResolvedPresentation) -> String {
    let theme = format!("poster-theme-{}", p.theme.as_str());
    let size = format!("poster-{}", p.size.as_str());
    let aspect = aspect_class(p.aspect_ratio);
    join_classes(&[
        Some("poster"),
        Some(theme.as_str()),
        Some(size.as_str()),
        aspect,
        p.class_name.as_deref(),
    ])
}

fn aspect_class(ratio: AspectRatio) -> Option<&'static str> {
    match ratio {
        AspectRatio::Auto => None,
        AspectRatio::Widescreen => Some("poster-aspect-16-9"),
        AspectRatio::Square => Some("poster-aspect-1-1"),
        AspectRatio::Classic => Some("poster-aspect-4-3"),
    }
}

fn render_header(band: &HeaderBand) -> Markup {
    let class = format!("poster-header {}", band.class_name());
    html! {
        header class=(class) {
            @match &band.text {
                HeaderText::Split { left, right } => {
                    span { (left) }
                    span { (right) }
                }
                HeaderText::Single(text) => { (text) }
            }
        }
    }
}

fn render_content(band: &ContentBand, markdown: &str) -> Markup {
    let class = format!("poster-content {}", band.class_name());
    let article_class = join_classes(&[Some("poster-article"), band.article_class_name.as_deref()]);
    html! {
        section class=(class) {
            article class=(article_class) {
                (PreEscaped(markdown_to_html(markdown)))
            }
        }
    }
}

fn render_footer(band: &FooterBand, can_copy: bool) -> Markup {
    let class = format!("poster-footer {}", band.class_name());
    html! {
        footer class=(class) {
            span class="flex gap-2 flex-wrap items-center" {
                (band.text)
                @if can_copy {
                    button class="border p-2 rounded border-white" type="button" data-poster-action="copy" {
                        "Copy Image"
                    }
                }
            }
        }
    }
}
