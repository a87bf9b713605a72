//! Segment fetching
//!
//! [`SegmentFetcher`] issues the GET for one segment; [`HttpFetcher`] does so
//! over HTTP. [`FetchCycle`] runs one complete load: placeholder, lifecycle
//! notifications, request, and insertion or failure notice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScrollerConfig;
use crate::constants;
use crate::container::{failure_notice_markup, ContentContainer};
use crate::error::{FetchError, Result, ScrollerError};
use crate::events::{SegmentFailure, SegmentResponse};
use crate::generator::UrlGenerator;

/// Retrieves the markup for one segment
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<SegmentResponse, FetchError>;
}

/// Plain HTTP GET; relative URLs are resolved against the page URL
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Option<Url>,
}

impl HttpFetcher {
    /// Fetcher for absolute URLs only
    pub fn new(request_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(constants::http::USER_AGENT)
            .connect_timeout(constants::http::CONNECT_TIMEOUT);
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base: None,
        })
    }

    /// Resolve generated URLs against `page_url`, the way a browser would
    pub fn with_base(mut self, page_url: &str) -> Result<Self> {
        let base = Url::parse(page_url).map_err(|e| {
            ScrollerError::InvalidConfig(format!("invalid page url {}: {}", page_url, e))
        })?;
        self.base = Some(base);
        Ok(self)
    }

    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    fn resolve(&self, url: &str) -> std::result::Result<Url, FetchError> {
        let resolved = match &self.base {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        resolved.map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl SegmentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<SegmentResponse, FetchError> {
        let target = self.resolve(url)?;
        debug!(url = %target, "GET segment");

        let response = self.client.get(target).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body = response.text().await?;

        Ok(SegmentResponse {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

/// How a fetch cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Segment appended to the container
    Inserted,
    /// Short response; the scheduler has been stopped
    EndOfContent,
    /// Request failed; a failure notice was appended
    Failed,
}

/// Everything one load needs, shared with the scheduler that starts it
#[derive(Clone)]
pub struct FetchCycle {
    pub(crate) config: Arc<ScrollerConfig>,
    pub(crate) container: Arc<Mutex<Box<dyn ContentContainer>>>,
    pub(crate) generator: Arc<Mutex<Box<dyn UrlGenerator>>>,
    pub(crate) fetcher: Arc<dyn SegmentFetcher>,
    pub(crate) in_flight: Arc<AtomicBool>,
    pub(crate) stop: CancellationToken,
}

impl FetchCycle {
    pub fn new(
        config: Arc<ScrollerConfig>,
        container: Box<dyn ContentContainer>,
        generator: Box<dyn UrlGenerator>,
        fetcher: Arc<dyn SegmentFetcher>,
    ) -> Self {
        Self {
            config,
            container: Arc::new(Mutex::new(container)),
            generator: Arc::new(Mutex::new(generator)),
            fetcher,
            in_flight: Arc::new(AtomicBool::new(false)),
            stop: CancellationToken::new(),
        }
    }

    /// Claim the in-flight flag; false when a fetch is already running
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn finish(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    /// Run one load. The caller must hold the in-flight flag (see [`Self::try_begin`]).
    pub async fn run(&self) -> FetchOutcome {
        let observer = &self.config.observer;

        self.container.lock().set_placeholder_visible(true);
        observer.on_load_start();

        let url = self.generator.lock().next();
        debug!(url = %url, "Loading segment");

        match self.fetcher.fetch(&url).await {
            Ok(response) => {
                observer.on_load_complete(&response);
                let chars = response.len();

                if chars < constants::scheduler::END_OF_CONTENT_THRESHOLD {
                    info!(url = %url, chars, "Short segment, no more content");
                    self.stop.cancel();
                    self.container.lock().set_placeholder_visible(false);
                    self.finish();
                    return FetchOutcome::EndOfContent;
                }

                {
                    let mut container = self.container.lock();
                    if let Err(e) = container.append_markup(&response.body) {
                        warn!(url = %url, "Failed to insert segment: {}", e);
                    }
                    container.set_placeholder_visible(false);
                }
                self.finish();
                debug!(url = %url, chars, "Segment inserted");
                observer.on_insert_complete();
                FetchOutcome::Inserted
            }
            Err(e) => {
                warn!(url = %url, status = ?e.status(), "Segment request failed: {}", e);
                let failure = SegmentFailure {
                    url: url.clone(),
                    status: e.status(),
                    body: e.body().map(str::to_string),
                    message: e.to_string(),
                };
                observer.on_load_failure(&failure);

                {
                    let mut container = self.container.lock();
                    let notice =
                        failure_notice_markup(&self.config.uid, &self.config.failure_message);
                    if let Err(e) = container.append_markup(&notice) {
                        warn!("Failed to insert failure notice: {}", e);
                    }
                    if self.config.release_on_failure {
                        container.set_placeholder_visible(false);
                    }
                }
                if self.config.release_on_failure {
                    self.finish();
                }
                FetchOutcome::Failed
            }
        }
    }
}

impl std::fmt::Debug for FetchCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCycle")
            .field("config", &self.config)
            .field("in_flight", &self.is_in_flight())
            .field("stopped", &self.stop.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::container::MemoryContainer;
    use crate::events::{ChannelObserver, SegmentEvent};
    use crate::generator::TemplateGenerator;

    struct StaticFetcher {
        status: u16,
        body: String,
    }

    #[async_trait]
    impl SegmentFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<SegmentResponse, FetchError> {
            if self.status >= 400 {
                return Err(FetchError::Status {
                    status: self.status,
                    body: self.body.clone(),
                });
            }
            Ok(SegmentResponse {
                url: url.to_string(),
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn cycle(
        overrides: ConfigOverrides,
        status: u16,
        body: String,
    ) -> (
        FetchCycle,
        MemoryContainer,
        tokio::sync::mpsc::UnboundedReceiver<SegmentEvent>,
    ) {
        let (observer, rx) = ChannelObserver::channel();
        let config = ScrollerConfig::merge(overrides.observer(observer)).unwrap();
        let mut container = MemoryContainer::new();
        container.install_placeholder("loading", "...").unwrap();
        let cycle = FetchCycle::new(
            Arc::new(config),
            Box::new(container.clone()),
            Box::new(TemplateGenerator::new("/p/$page_num$", 1, 1)),
            Arc::new(StaticFetcher { status, body }),
        );
        (cycle, container, rx)
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<SegmentEvent>) -> Vec<SegmentEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_try_begin_is_exclusive() {
        let (cycle, _, _) = cycle(ConfigOverrides::new(), 200, String::new());
        assert!(cycle.try_begin());
        assert!(!cycle.try_begin());
        cycle.finish();
        assert!(cycle.try_begin());
    }

    #[tokio::test]
    async fn test_long_segment_inserted() {
        let body = "x".repeat(301);
        let (cycle, container, mut rx) = cycle(ConfigOverrides::new(), 200, body.clone());
        assert!(cycle.try_begin());

        assert_eq!(cycle.run().await, FetchOutcome::Inserted);
        assert_eq!(container.children(), vec![body.clone()]);
        assert!(!container.placeholder_visible());
        assert!(!cycle.is_in_flight());
        assert!(!cycle.stop.is_cancelled());

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                SegmentEvent::LoadStart,
                SegmentEvent::LoadComplete(SegmentResponse {
                    url: "/p/2".into(),
                    status: 200,
                    body,
                }),
                SegmentEvent::InsertComplete,
            ]
        );
    }

    #[tokio::test]
    async fn test_short_segment_stops_without_insert() {
        let (cycle, container, mut rx) = cycle(ConfigOverrides::new(), 200, "x".repeat(299));
        assert!(cycle.try_begin());

        assert_eq!(cycle.run().await, FetchOutcome::EndOfContent);
        assert!(container.is_empty());
        assert!(cycle.stop.is_cancelled());
        assert!(!cycle.is_in_flight());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], SegmentEvent::LoadComplete(_)));
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let (cycle, container, _rx) = cycle(ConfigOverrides::new(), 200, "x".repeat(300));
        assert!(cycle.try_begin());
        assert_eq!(cycle.run().await, FetchOutcome::Inserted);
        assert_eq!(container.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_appends_notice_and_keeps_flag() {
        let (cycle, container, mut rx) = cycle(
            ConfigOverrides::new().failure_message("<b>down</b>"),
            503,
            "maintenance".into(),
        );
        assert!(cycle.try_begin());

        assert_eq!(cycle.run().await, FetchOutcome::Failed);
        assert_eq!(
            container.children(),
            vec!["<div class=\"continous_scroller_failure_notice\"><b>down</b></div>".to_string()]
        );
        assert!(cycle.is_in_flight());
        assert!(container.placeholder_visible());
        assert!(!cycle.stop.is_cancelled());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[1] {
            SegmentEvent::LoadFailure(failure) => {
                assert_eq!(failure.url, "/p/2");
                assert_eq!(failure.status, Some(503));
                assert_eq!(failure.body.as_deref(), Some("maintenance"));
            }
            other => panic!("Expected LoadFailure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failure_releases_flag_when_configured() {
        let (cycle, container, _rx) = cycle(
            ConfigOverrides::new().release_on_failure(true),
            500,
            String::new(),
        );
        assert!(cycle.try_begin());

        assert_eq!(cycle.run().await, FetchOutcome::Failed);
        assert!(!cycle.is_in_flight());
        assert!(!container.placeholder_visible());
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_http_fetcher_resolves_relative_urls() {
        let fetcher = HttpFetcher::new(None)
            .unwrap()
            .with_base("http://example.com/top10/index.html")
            .unwrap();
        assert_eq!(
            fetcher.base().map(Url::as_str),
            Some("http://example.com/top10/index.html")
        );
        assert_eq!(
            fetcher.resolve("?page=2").unwrap().as_str(),
            "http://example.com/top10/index.html?page=2"
        );
        assert_eq!(
            fetcher.resolve("/pages/3.html").unwrap().as_str(),
            "http://example.com/pages/3.html"
        );
    }

    #[test]
    fn test_http_fetcher_without_base_needs_absolute_url() {
        let fetcher = HttpFetcher::new(None).unwrap();
        assert!(fetcher.base().is_none());
        let err = fetcher.resolve("?page=2").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn test_http_fetcher_rejects_bad_base() {
        let err = HttpFetcher::new(None).unwrap().with_base("not a url").unwrap_err();
        assert!(matches!(err, ScrollerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_error_status_kept_when_body_is_truncated() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\n\r\npartial")
                .unwrap();
        });

        let fetcher = HttpFetcher::new(Some(Duration::from_secs(10))).unwrap();
        let err = fetcher
            .fetch(&format!("http://{}/p/2", addr))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 502, .. }), "{:?}", err);
        assert_eq!(err.status(), Some(502));
        server.join().unwrap();
    }
}
