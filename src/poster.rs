//! The poster application and its mounted instances.
//!
//! [`PosterApp`] holds what is fixed for the life of the process: the loaded
//! configuration, the fetcher, and the readiness delay. Each page view mounts
//! a [`MountedPoster`], which owns two asynchronous operations:
//!
//! - a one-shot timer that flips the ready flag after the readiness delay,
//!   aborted when the instance is dropped;
//! - for `md_url` content, a fetch whose result is published through a watch
//!   channel. The fetch is not cancelled on drop; its result is discarded.
//!
//! Neither operation waits for the other.

use crate::config::RawConfig;
use crate::content::{self, ContentSource, MarkdownFetcher, PosterQuery};
use crate::presentation::{self, ResolvedPresentation};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Time from mount until the poster reports itself ready for capture.
pub const READY_DELAY: Duration = Duration::from_millis(300);

pub struct PosterApp {
    config: Option<Arc<RawConfig>>,
    fetcher: Arc<dyn MarkdownFetcher>,
    ready_delay: Duration,
}

impl PosterApp {
    pub fn new(config: Option<RawConfig>, fetcher: Arc<dyn MarkdownFetcher>) -> Self {
        Self {
            config: config.map(Arc::new),
            fetcher,
            ready_delay: READY_DELAY,
        }
    }

    pub fn with_ready_delay(mut self, ready_delay: Duration) -> Self {
        self.ready_delay = ready_delay;
        self
    }

    pub fn config(&self) -> Option<&RawConfig> {
        self.config.as_deref()
    }

    pub fn ready_delay(&self) -> Duration {
        self.ready_delay
    }

    /// Presentation as it would render today.
    pub fn presentation(&self) -> ResolvedPresentation {
        ResolvedPresentation::resolve_today(self.config())
    }

    /// Mount a poster instance. Must be called from within a Tokio runtime.
    ///
    /// The content source is chosen here, once; later changes to the query
    /// have no effect on this instance.
    pub fn mount(&self, query: &PosterQuery) -> MountedPoster {
        let source = content::select_source(query, self.config());
        info!(source = source.label(), "Mounting poster");

        let (content_tx, content_rx) = watch::channel(source.immediate());
        if let ContentSource::RemoteUrl(_) = source {
            let fetcher = Arc::clone(&self.fetcher);
            tokio::spawn(async move {
                let text = source.resolve(fetcher.as_ref()).await;
                if content_tx.send(Some(text)).is_err() {
                    debug!("Poster unmounted before its content arrived, discarding");
                }
            });
        }

        let (ready_tx, ready_rx) = watch::channel(false);
        let delay = self.ready_delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = ready_tx.send(true);
        });

        MountedPoster {
            config: self.config.clone(),
            content: content_rx,
            ready: ready_rx,
            ready_delay: self.ready_delay,
            timer,
        }
    }
}

/// One rendering of the poster. Dropping it cancels the readiness timer.
pub struct MountedPoster {
    config: Option<Arc<RawConfig>>,
    content: watch::Receiver<Option<String>>,
    ready: watch::Receiver<bool>,
    ready_delay: Duration,
    timer: JoinHandle<()>,
}

impl MountedPoster {
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// The Markdown, or `None` while a fetch is still in flight.
    pub fn markdown(&self) -> Option<String> {
        self.content.borrow().clone()
    }

    /// Wait until the Markdown is known and return it.
    pub async fn settled(&mut self) -> String {
        match self.content.wait_for(Option::is_some).await {
            Ok(text) => text.clone().unwrap_or_default(),
            // The fetch task died without publishing; treat it as a failed fetch.
            Err(_) => content::SAMPLE_MARKDOWN.to_string(),
        }
    }

    /// Wait until the readiness delay has elapsed.
    pub async fn ready(&mut self) {
        let _ = self.ready.wait_for(|ready| *ready).await;
    }

    /// Current state, with the presentation resolved against today.
    pub fn snapshot(&self) -> PosterView {
        self.snapshot_on(presentation::today())
    }

    pub fn snapshot_on(&self, date: NaiveDate) -> PosterView {
        PosterView {
            presentation: ResolvedPresentation::resolve(self.config.as_deref(), date),
            markdown: self.markdown().unwrap_or_default(),
            ready: self.is_ready(),
            ready_delay: self.ready_delay,
        }
    }
}

impl Drop for MountedPoster {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

/// Everything needed to render one poster page.
#[derive(Debug, Clone, PartialEq)]
pub struct PosterView {
    pub presentation: ResolvedPresentation,
    pub markdown: String,
    pub ready: bool,
    pub ready_delay: Duration,
}

impl PosterView {
    /// A view for a page whose browser-side script will mark it ready.
    pub fn new(presentation: ResolvedPresentation, markdown: String, ready_delay: Duration) -> Self {
        Self {
            presentation,
            markdown,
            ready: false,
            ready_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::SAMPLE_MARKDOWN;
    use crate::presentation::Theme;
    use crate::test_helpers::*;
    use tokio::time::Instant;

    fn app(config: Option<RawConfig>, fetcher: impl MarkdownFetcher + 'static) -> PosterApp {
        PosterApp::new(config, Arc::new(fetcher))
    }

    // =========================================================================
    // Readiness
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn not_ready_right_after_mount() {
        let poster = app(None, FailingFetcher).mount(&PosterQuery::default());
        assert!(!poster.is_ready());
        assert!(!poster.snapshot().ready);

        tokio::time::sleep(Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert!(!poster.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn ready_after_delay() {
        let mut poster = app(None, FailingFetcher).mount(&PosterQuery::default());
        let start = Instant::now();
        poster.ready().await;
        assert!(poster.is_ready());
        assert!(start.elapsed() >= READY_DELAY);
        assert!(poster.snapshot().ready);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_ready_delay() {
        let app = app(None, FailingFetcher).with_ready_delay(Duration::from_secs(2));
        let mut poster = app.mount(&PosterQuery::default());
        let start = Instant::now();
        poster.ready().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_cancels_readiness_timer() {
        let poster = app(None, FailingFetcher).mount(&PosterQuery::default());
        let mut ready = poster.ready.clone();
        drop(poster);

        // The aborted timer drops its sender without ever sending.
        assert!(ready.changed().await.is_err());
        assert!(!*ready.borrow());
    }

    // =========================================================================
    // Content
    // =========================================================================

    #[tokio::test]
    async fn query_text_available_immediately() {
        let app = app(None, FailingFetcher);
        let poster = app.mount(&PosterQuery::parse(Some("md=Hello%20World")));
        assert_eq!(poster.markdown().as_deref(), Some("Hello World"));
    }

    #[tokio::test]
    async fn config_markdown_when_no_query() {
        let config = config_from("content:\n  markdown: \"# Configured\"\n");
        let mut poster = app(Some(config), FailingFetcher).mount(&PosterQuery::default());
        assert_eq!(poster.settled().await, "# Configured");
    }

    #[tokio::test(start_paused = true)]
    async fn fetched_content_arrives_later() {
        let fetcher = SlowFetcher::new("# Remote", Duration::from_millis(500));
        let mut poster = app(None, fetcher).mount(&PosterQuery::parse(Some("md_url=https://a.test/x.md")));
        assert_eq!(poster.markdown(), None);

        assert_eq!(poster.settled().await, "# Remote");
        // Fetch outlived the readiness delay; the two are independent.
        assert!(poster.is_ready());
    }

    #[tokio::test]
    async fn failed_fetch_settles_on_sample() {
        let config = config_from("content:\n  markdown: from config\n");
        let mut poster = app(Some(config), FailingFetcher)
            .mount(&PosterQuery::parse(Some("md_url=https://a.test/missing.md")));
        assert_eq!(poster.settled().await, SAMPLE_MARKDOWN);
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_before_fetch_completes_is_harmless() {
        let fetcher = SlowFetcher::new("late", Duration::from_millis(500));
        let poster = app(None, fetcher).mount(&PosterQuery::parse(Some("md_url=https://a.test/x.md")));
        drop(poster);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    #[tokio::test]
    async fn snapshot_without_config_uses_defaults() {
        let poster = app(None, FailingFetcher).mount(&PosterQuery::default());
        let view = poster.snapshot_on(test_date());
        assert_eq!(view.presentation.theme, Theme::SpringGradientWave);
        assert!(!view.presentation.can_copy);
        assert_eq!(view.markdown, SAMPLE_MARKDOWN);
        assert_eq!(view.ready_delay, READY_DELAY);
    }
}
