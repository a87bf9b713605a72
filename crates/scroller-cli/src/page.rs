//! Simulated page
//!
//! Stands in for a browser: segments are written to an output stream, the
//! page grows by a fixed line height per line of inserted markup, and a
//! reader scrolls down at a constant speed.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use scroller_core::{ContentContainer, ScrollerError, ViewportMetrics};
use tracing::debug;

/// Geometry of the simulated page
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    /// Height of the content already on the page
    pub initial_height: i64,
    pub viewport_height: i64,
    /// Pixels per line of inserted markup
    pub line_height: i64,
    /// Reader speed in pixels per second
    pub scroll_speed: f64,
}

#[derive(Debug)]
struct PageState {
    page_height: i64,
    segments: usize,
    bytes: usize,
}

/// Shared handle to the simulated page; hand out a container and a viewport
#[derive(Clone)]
pub struct SimulatedPage {
    geometry: PageGeometry,
    started: Instant,
    state: Arc<Mutex<PageState>>,
    output: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl SimulatedPage {
    pub fn new(geometry: PageGeometry, output: Box<dyn Write + Send>) -> Self {
        Self {
            geometry,
            started: Instant::now(),
            state: Arc::new(Mutex::new(PageState {
                page_height: geometry.initial_height,
                segments: 0,
                bytes: 0,
            })),
            output: Arc::new(Mutex::new(output)),
        }
    }

    pub fn container(&self) -> PageContainer {
        PageContainer { page: self.clone() }
    }

    pub fn viewport(&self) -> PageViewport {
        PageViewport { page: self.clone() }
    }

    /// Segments and bytes appended so far
    pub fn totals(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.segments, state.bytes)
    }
}

impl std::fmt::Debug for SimulatedPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPage")
            .field("geometry", &self.geometry)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

/// Container side of the simulated page
#[derive(Debug)]
pub struct PageContainer {
    page: SimulatedPage,
}

impl ContentContainer for PageContainer {
    fn install_placeholder(&mut self, id: &str, markup: &str) -> Result<(), ScrollerError> {
        debug!(id, markup, "Placeholder installed");
        Ok(())
    }

    fn set_placeholder_visible(&mut self, visible: bool) {
        debug!(visible, "Placeholder visibility changed");
    }

    fn append_markup(&mut self, markup: &str) -> Result<(), ScrollerError> {
        {
            let mut out = self.page.output.lock();
            writeln!(out, "{}", markup)?;
            out.flush()?;
        }

        let lines = markup.lines().count().max(1) as i64;
        let mut state = self.page.state.lock();
        state.page_height += lines * self.page.geometry.line_height;
        state.segments += 1;
        state.bytes += markup.len();
        debug!(page_height = state.page_height, "Page grew");
        Ok(())
    }
}

/// Viewport side of the simulated page
#[derive(Debug)]
pub struct PageViewport {
    page: SimulatedPage,
}

impl ViewportMetrics for PageViewport {
    fn page_height(&self) -> i64 {
        self.page.state.lock().page_height
    }

    fn scroll_position(&self) -> i64 {
        let geometry = &self.page.geometry;
        let travelled = (self.page.started.elapsed().as_secs_f64() * geometry.scroll_speed) as i64;
        let bottom = (self.page_height() - geometry.viewport_height).max(0);
        travelled.min(bottom)
    }

    fn viewport_height(&self) -> i64 {
        self.page.geometry.viewport_height
    }
}
