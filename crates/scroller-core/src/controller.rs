//! Scroller construction and control
//!
//! Wires configuration, URL generation, viewport metrics and the fetcher
//! together, installs the loading placeholder and starts the scheduler.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::info;
use uuid::Uuid;

use crate::config::{ConfigOverrides, ScrollerConfig};
use crate::container::ContentContainer;
use crate::error::{Result, ScrollerError};
use crate::fetch::{FetchCycle, HttpFetcher, SegmentFetcher};
use crate::generator::UrlSource;
use crate::scheduler::{SchedulerState, ScrollScheduler};
use crate::viewport::ViewportMetrics;

/// Entry point for creating scrollers
#[derive(Debug)]
pub struct Scroller;

impl Scroller {
    /// Create and start a scroller that fetches over HTTP
    ///
    /// `page_url` is the address of the hosting page; generated URLs are
    /// resolved against it. Must be called from within a Tokio runtime.
    pub fn create(
        container: impl ContentContainer + 'static,
        urls: impl Into<UrlSource>,
        overrides: ConfigOverrides,
        viewport: impl ViewportMetrics + 'static,
        page_url: &str,
    ) -> Result<ScrollerHandle> {
        Self::builder(container, urls)
            .config(overrides)
            .viewport(viewport)
            .page_url(page_url)
            .start()
    }

    pub fn builder(
        container: impl ContentContainer + 'static,
        urls: impl Into<UrlSource>,
    ) -> ScrollerBuilder {
        ScrollerBuilder {
            container: Box::new(container),
            urls: urls.into(),
            overrides: ConfigOverrides::default(),
            viewport: None,
            fetcher: None,
            page_url: None,
        }
    }
}

/// Collects the parts of a scroller before it starts
pub struct ScrollerBuilder {
    container: Box<dyn ContentContainer>,
    urls: UrlSource,
    overrides: ConfigOverrides,
    viewport: Option<Arc<dyn ViewportMetrics>>,
    fetcher: Option<Arc<dyn SegmentFetcher>>,
    page_url: Option<String>,
}

impl ScrollerBuilder {
    pub fn config(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn viewport(mut self, viewport: impl ViewportMetrics + 'static) -> Self {
        self.viewport = Some(Arc::new(viewport));
        self
    }

    /// Share a viewport the host keeps updating
    pub fn shared_viewport(mut self, viewport: Arc<dyn ViewportMetrics>) -> Self {
        self.viewport = Some(viewport);
        self
    }

    /// Replace the HTTP fetcher
    pub fn fetcher(mut self, fetcher: impl SegmentFetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    /// Page address relative segment URLs are resolved against
    pub fn page_url(mut self, page_url: impl Into<String>) -> Self {
        self.page_url = Some(page_url.into());
        self
    }

    /// Merge configuration, install the placeholder and start ticking
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<ScrollerHandle> {
        let viewport = self.viewport.ok_or_else(|| {
            ScrollerError::InvalidConfig("no viewport metrics provider supplied".to_string())
        })?;
        let config = ScrollerConfig::merge(self.overrides)?;

        let fetcher: Arc<dyn SegmentFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => {
                let mut http = HttpFetcher::new(config.request_timeout)?;
                if let Some(page_url) = &self.page_url {
                    http = http.with_base(page_url)?;
                }
                Arc::new(http)
            }
        };

        let custom_generator = self.urls.is_custom();
        let generator = self.urls.into_generator()?;

        let placeholder_id = format!(
            "{}_loading_placeholder_{}",
            config.uid,
            Uuid::new_v4().simple()
        );
        let mut container = self.container;
        container.install_placeholder(&placeholder_id, &config.loading_placeholder)?;

        info!(
            placeholder = %placeholder_id,
            check_interval_ms = config.check_interval.as_millis() as u64,
            trigger_height = config.trigger_height,
            custom_generator,
            "Scroller created"
        );

        let config = Arc::new(config);
        let cycle = FetchCycle::new(config.clone(), container, generator, fetcher);
        let scheduler = ScrollScheduler::new(cycle.clone(), viewport);
        let tracker = scheduler.tracker().clone();
        let task = tokio::spawn(scheduler.run());

        Ok(ScrollerHandle {
            placeholder_id,
            config,
            cycle,
            tracker,
            task,
        })
    }
}

impl std::fmt::Debug for ScrollerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollerBuilder")
            .field("urls", &self.urls)
            .field("overrides", &self.overrides)
            .field("viewport", &self.viewport.is_some())
            .field("fetcher", &self.fetcher.is_some())
            .field("page_url", &self.page_url)
            .finish_non_exhaustive()
    }
}

/// A running scroller
///
/// Dropping the handle leaves the scheduler running; call [`Self::stop`] to
/// end it, as unloading the page would.
#[derive(Debug)]
pub struct ScrollerHandle {
    placeholder_id: String,
    config: Arc<ScrollerConfig>,
    cycle: FetchCycle,
    tracker: TaskTracker,
    task: JoinHandle<()>,
}

impl ScrollerHandle {
    /// Instance-scoped id of the loading placeholder
    pub fn placeholder_id(&self) -> &str {
        &self.placeholder_id
    }

    pub fn config(&self) -> &ScrollerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        if self.cycle.stop.is_cancelled() {
            SchedulerState::Stopped
        } else {
            SchedulerState::Armed
        }
    }

    pub fn is_update_in_progress(&self) -> bool {
        self.cycle.is_in_flight()
    }

    /// Stop scheduling; an in-flight fetch still completes
    pub fn stop(&self) {
        if !self.cycle.stop.is_cancelled() {
            info!(placeholder = %self.placeholder_id, "Stopping scroller");
            self.cycle.stop.cancel();
        }
    }

    /// Wait until the scheduler has stopped and every started fetch has finished
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|e| ScrollerError::Runtime(format!("scheduler task failed: {}", e)))?;
        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::container::MemoryContainer;
    use crate::error::FetchError;
    use crate::events::{ChannelObserver, SegmentEvent, SegmentResponse};
    use crate::generator::{FnGenerator, GeneratorSpec};
    use crate::viewport::FixedViewport;

    /// Serves `pages` long segments, then a short one
    struct PagedFetcher {
        pages: usize,
        urls: parking_lot::Mutex<Vec<String>>,
    }

    impl PagedFetcher {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                urls: parking_lot::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SegmentFetcher for Arc<PagedFetcher> {
        async fn fetch(&self, url: &str) -> std::result::Result<SegmentResponse, FetchError> {
            let mut urls = self.urls.lock();
            urls.push(url.to_string());
            let body = if urls.len() <= self.pages {
                format!("<article>{}</article>", "x".repeat(400))
            } else {
                "<p>end</p>".to_string()
            };
            Ok(SegmentResponse {
                url: url.to_string(),
                status: 200,
                body,
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loads_until_end_of_content() {
        let container = MemoryContainer::new();
        let fetcher = Arc::new(PagedFetcher::new(3));
        let (observer, mut rx) = ChannelObserver::channel();

        let handle = Scroller::builder(
            container.clone(),
            GeneratorSpec::new("/feed/$page_num$").with_start_index(0),
        )
        .config(ConfigOverrides::new().observer(observer))
        .viewport(FixedViewport::new(1000, 0, 800))
        .fetcher(fetcher.clone())
        .start()
        .unwrap();

        let placeholder = container.placeholder().unwrap();
        assert_eq!(placeholder.id, handle.placeholder_id());
        assert!(placeholder.id.starts_with("continous_scroller_loading_placeholder_"));

        tokio::time::timeout(Duration::from_secs(60), handle.join())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            *fetcher.urls.lock(),
            vec!["/feed/1", "/feed/2", "/feed/3", "/feed/4"]
        );
        assert_eq!(container.len(), 3);
        assert!(!container.placeholder_visible());

        let mut inserts = 0;
        while let Ok(event) = rx.try_recv() {
            if event == SegmentEvent::InsertComplete {
                inserts += 1;
            }
        }
        assert_eq!(inserts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_generator_used_verbatim() {
        let container = MemoryContainer::new();
        let fetcher = Arc::new(PagedFetcher::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let handle = Scroller::builder(
            container.clone(),
            UrlSource::custom(FnGenerator(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                format!("items?cursor=c{}", n)
            })),
        )
        .viewport(FixedViewport::new(0, 0, 0))
        .fetcher(fetcher.clone())
        .start()
        .unwrap();

        handle.join().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*fetcher.urls.lock(), vec!["items?cursor=c0", "items?cursor=c1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_scheduler() {
        let container = MemoryContainer::new();
        let handle = Scroller::builder(container.clone(), GeneratorSpec::default())
            .viewport(FixedViewport::new(100_000, 0, 800))
            .fetcher(Arc::new(PagedFetcher::new(10)))
            .start()
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), SchedulerState::Armed);
        assert!(!handle.is_update_in_progress());

        handle.stop();
        assert_eq!(handle.state(), SchedulerState::Stopped);
        handle.join().await.unwrap();
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_missing_viewport_rejected() {
        let err = Scroller::builder(MemoryContainer::new(), GeneratorSpec::default())
            .start()
            .unwrap_err();
        assert!(matches!(err, ScrollerError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_start() {
        let container = MemoryContainer::new();
        let err = Scroller::builder(container.clone(), GeneratorSpec::default())
            .config(ConfigOverrides::new().check_interval(0.0))
            .viewport(FixedViewport::default())
            .start()
            .unwrap_err();
        assert!(matches!(err, ScrollerError::InvalidConfig(_)));
        assert!(container.placeholder().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_viewport_follows_host_updates() {
        let container = MemoryContainer::new();
        let fetcher = Arc::new(PagedFetcher::new(0));
        let viewport = Arc::new(FixedViewport::new(100_000, 0, 0));

        let handle = Scroller::builder(container.clone(), GeneratorSpec::default())
            .shared_viewport(viewport.clone())
            .fetcher(fetcher.clone())
            .start()
            .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fetcher.urls.lock().is_empty());

        viewport.set_scroll_position(99_000);
        viewport.set_viewport_height(500);
        tokio::time::timeout(Duration::from_secs(60), handle.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*fetcher.urls.lock(), vec!["?page=2"]);
    }

    #[tokio::test]
    async fn test_out_of_range_generator_rejected() {
        let container = MemoryContainer::new();
        let err = Scroller::builder(
            container.clone(),
            GeneratorSpec::default().with_start_index(i64::MAX),
        )
        .viewport(FixedViewport::default())
        .fetcher(Arc::new(PagedFetcher::new(0)))
        .start()
        .unwrap_err();
        assert!(matches!(err, ScrollerError::InvalidConfig(_)));
        assert!(container.placeholder().is_none());
    }

    #[tokio::test]
    async fn test_second_scroller_on_same_container_rejected() {
        let container = MemoryContainer::new();
        let first = Scroller::builder(container.clone(), GeneratorSpec::default())
            .viewport(FixedViewport::new(100_000, 0, 0))
            .fetcher(Arc::new(PagedFetcher::new(0)))
            .start()
            .unwrap();

        let err = Scroller::builder(container.clone(), GeneratorSpec::default())
            .viewport(FixedViewport::new(100_000, 0, 0))
            .fetcher(Arc::new(PagedFetcher::new(0)))
            .start()
            .unwrap_err();
        assert!(matches!(err, ScrollerError::Container(_)));
        assert_eq!(container.placeholder().unwrap().id, first.placeholder_id());
        first.stop();
    }

    #[tokio::test]
    async fn test_placeholder_ids_are_instance_scoped() {
        let a = Scroller::builder(MemoryContainer::new(), GeneratorSpec::default())
            .config(ConfigOverrides::new().uid("feed"))
            .viewport(FixedViewport::new(100_000, 0, 0))
            .fetcher(Arc::new(PagedFetcher::new(0)))
            .start()
            .unwrap();
        let b = Scroller::builder(MemoryContainer::new(), GeneratorSpec::default())
            .config(ConfigOverrides::new().uid("feed"))
            .viewport(FixedViewport::new(100_000, 0, 0))
            .fetcher(Arc::new(PagedFetcher::new(0)))
            .start()
            .unwrap();

        assert!(a.placeholder_id().starts_with("feed_loading_placeholder_"));
        assert_ne!(a.placeholder_id(), b.placeholder_id());
        a.stop();
        b.stop();
    }
}
