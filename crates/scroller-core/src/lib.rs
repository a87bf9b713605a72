//! Scroller Core - polling infinite scroll
//!
//! Watches how much of the page is left below the viewport and, once that
//! drops under a trigger height, fetches the next content segment and appends
//! it to a container:
//! - Pluggable URL generation (template or host-supplied)
//! - Injected viewport metrics with host fallback measurement
//! - HTTP segment fetching with lifecycle notifications
//! - A fixed-period scheduler that never overlaps fetches

pub mod config;
pub mod constants;
pub mod container;
pub mod controller;
pub mod error;
pub mod events;
pub mod fetch;
pub mod generator;
pub mod scheduler;
pub mod viewport;

// Re-exports for convenience
pub use config::{ConfigOverrides, ScrollerConfig};
pub use container::{ContentContainer, MemoryContainer};
pub use controller::{Scroller, ScrollerBuilder, ScrollerHandle};
pub use error::{FetchError, ScrollerError};
pub use events::{
    ChannelObserver, FnObserver, NoopObserver, SegmentEvent, SegmentFailure, SegmentObserver,
    SegmentResponse,
};
pub use fetch::{FetchCycle, FetchOutcome, HttpFetcher, SegmentFetcher};
pub use generator::{FnGenerator, GeneratorSpec, TemplateGenerator, UrlGenerator, UrlSource};
pub use scheduler::{should_trigger, SchedulerState, ScrollScheduler};
pub use viewport::{
    FallbackViewport, FixedViewport, HostMeasurements, MeasurementSource, ViewportMetrics,
};
