//! Viewport measurement
//!
//! The scheduler only needs three numbers: the total page height, the
//! current scroll offset and the visible height. Hosts disagree about where
//! those live, so [`FallbackViewport`] tries several readings in a fixed order
//! and takes the first one that is actually present.

use parking_lot::Mutex;

/// Page geometry in whole pixels
pub trait ViewportMetrics: Send + Sync {
    fn page_height(&self) -> i64;

    fn scroll_position(&self) -> i64;

    fn viewport_height(&self) -> i64;

    /// Distance between the bottom of the visible area and the end of the page
    ///
    /// Negative when the host reports a scroll position past the page end.
    fn remaining_distance(&self) -> i64 {
        self.page_height() - (self.scroll_position() + self.viewport_height())
    }
}

/// Raw readings from the host, any of which may be missing
///
/// Field names follow the DOM properties they usually come from.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostMeasurements {
    pub body_scroll_height: Option<f64>,
    pub body_offset_height: Option<f64>,
    pub window_inner_height: Option<f64>,
    pub document_client_height: Option<f64>,
    pub body_client_height: Option<f64>,
    pub window_page_y_offset: Option<f64>,
    pub document_scroll_top: Option<f64>,
    pub body_scroll_top: Option<f64>,
}

/// Supplies a fresh set of readings every time it is asked
pub trait MeasurementSource: Send + Sync {
    fn measure(&self) -> HostMeasurements;
}

impl<F> MeasurementSource for F
where
    F: Fn() -> HostMeasurements + Send + Sync,
{
    fn measure(&self) -> HostMeasurements {
        self()
    }
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// First usable reading, truncated toward zero; 0 when none is usable
fn first_usable(candidates: &[Option<f64>]) -> i64 {
    candidates
        .iter()
        .find_map(|v| usable(*v))
        .map(|v| v.trunc() as i64)
        .unwrap_or(0)
}

impl HostMeasurements {
    /// Larger of the body scroll and offset heights
    pub fn page_height(&self) -> i64 {
        let scroll = usable(self.body_scroll_height);
        let offset = usable(self.body_offset_height);
        match (scroll, offset) {
            (Some(s), Some(o)) if s > o => s.trunc() as i64,
            (_, Some(o)) => o.trunc() as i64,
            (Some(s), None) => s.trunc() as i64,
            (None, None) => 0,
        }
    }

    /// Window inner height, then document element, then body client height
    pub fn viewport_height(&self) -> i64 {
        first_usable(&[
            self.window_inner_height,
            self.document_client_height,
            self.body_client_height,
        ])
    }

    /// Window Y offset, then document element, then body scroll top
    pub fn scroll_position(&self) -> i64 {
        first_usable(&[
            self.window_page_y_offset,
            self.document_scroll_top,
            self.body_scroll_top,
        ])
    }
}

/// Metrics backed by a host measurement source
pub struct FallbackViewport<S> {
    source: S,
}

impl<S: MeasurementSource> FallbackViewport<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: MeasurementSource> ViewportMetrics for FallbackViewport<S> {
    fn page_height(&self) -> i64 {
        self.source.measure().page_height()
    }

    fn scroll_position(&self) -> i64 {
        self.source.measure().scroll_position()
    }

    fn viewport_height(&self) -> i64 {
        self.source.measure().viewport_height()
    }

    fn remaining_distance(&self) -> i64 {
        // One snapshot so the three numbers agree
        let m = self.source.measure();
        m.page_height() - (m.scroll_position() + m.viewport_height())
    }
}

impl<S> std::fmt::Debug for FallbackViewport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FallbackViewport")
    }
}

/// Geometry set directly by the host
#[derive(Debug, Default)]
pub struct FixedViewport {
    inner: Mutex<Geometry>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Geometry {
    page_height: i64,
    scroll_position: i64,
    viewport_height: i64,
}

impl FixedViewport {
    pub fn new(page_height: i64, scroll_position: i64, viewport_height: i64) -> Self {
        Self {
            inner: Mutex::new(Geometry {
                page_height,
                scroll_position,
                viewport_height,
            }),
        }
    }

    pub fn set_page_height(&self, page_height: i64) {
        self.inner.lock().page_height = page_height;
    }

    pub fn set_scroll_position(&self, scroll_position: i64) {
        self.inner.lock().scroll_position = scroll_position;
    }

    pub fn set_viewport_height(&self, viewport_height: i64) {
        self.inner.lock().viewport_height = viewport_height;
    }

    /// Scroll to the very bottom of the page
    pub fn scroll_to_end(&self) {
        let mut g = self.inner.lock();
        g.scroll_position = (g.page_height - g.viewport_height).max(0);
    }
}

impl ViewportMetrics for FixedViewport {
    fn page_height(&self) -> i64 {
        self.inner.lock().page_height
    }

    fn scroll_position(&self) -> i64 {
        self.inner.lock().scroll_position
    }

    fn viewport_height(&self) -> i64 {
        self.inner.lock().viewport_height
    }

    fn remaining_distance(&self) -> i64 {
        let g = *self.inner.lock();
        g.page_height - (g.scroll_position + g.viewport_height)
    }
}
