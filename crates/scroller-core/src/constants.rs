//! Application constants and configuration defaults
//!
//! Centralized location for magic numbers and default values

use std::time::Duration;

/// HTTP client configuration
pub mod http {
    use super::*;

    /// Connection timeout for segment requests
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// User agent sent with every segment request
    pub const USER_AGENT: &str = concat!("scroller/", env!("CARGO_PKG_VERSION"));
}

/// Scheduler configuration
pub mod scheduler {
    use super::*;

    /// Period between eligibility checks
    pub const CHECK_INTERVAL: Duration = Duration::from_millis(200);

    /// Remaining scrollable distance (pixels) below which a fetch starts
    pub const TRIGGER_HEIGHT: u32 = 1000;

    /// Responses shorter than this many characters mean there is nothing left to load
    pub const END_OF_CONTENT_THRESHOLD: usize = 300;
}

/// URL generation defaults
pub mod generator {
    /// Token replaced by the page index
    pub const PAGE_PLACEHOLDER: &str = "$page_num$";

    /// Template used when none is supplied
    pub const DEFAULT_TEMPLATE: &str = "?page=$page_num$";

    pub const START_INDEX: i64 = 1;

    pub const SPACING: i64 = 1;
}

/// Markup defaults
pub mod markup {
    /// Identifier prefix for the placeholder and failure notice
    pub const UID: &str = "continous_scroller";

    pub const FAILURE_MESSAGE: &str =
        "Error while trying to fetch the new items. Check your internet connection...";

    pub const LOADING_PLACEHOLDER: &str = "Loading newer items...";
}
