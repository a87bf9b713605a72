//! Scroller - headless infinite scroll driver
//!
//! Runs the scroller core against a real content server:
//! - A simulated reader scrolls down a virtual page at constant speed
//! - Every inserted segment is written to stdout or a file
//! - Stops on the server's end-of-content signal or Ctrl-C

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use scroller_core::{
    constants, ConfigOverrides, FnObserver, GeneratorSpec, SchedulerState, Scroller,
    ScrollerHandle,
};

mod page;

use page::{PageGeometry, SimulatedPage};

/// Scroller - fetch segments as a simulated reader nears the bottom of the page
#[derive(Parser, Debug)]
#[command(name = "scroller")]
#[command(about = "Headless infinite scroll driver", long_about = None)]
struct Cli {
    /// Address of the hosting page; segment URLs are resolved against it
    page_url: String,

    /// Segment URL template containing `$page_num$`
    #[arg(short, long)]
    url: Option<String>,

    /// Index the template generator counts from
    #[arg(long)]
    start_index: Option<i64>,

    /// Amount the index advances per segment
    #[arg(long)]
    spacing: Option<i64>,

    /// TOML file with scroller options and an optional [generator] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seconds between eligibility checks
    #[arg(long)]
    check_interval: Option<f64>,

    /// Remaining pixels below the viewport that trigger a fetch
    #[arg(long)]
    trigger_height: Option<u32>,

    /// Keep fetching after a failed request
    #[arg(long)]
    release_on_failure: bool,

    /// Seconds before a segment request is abandoned
    #[arg(long)]
    request_timeout: Option<f64>,

    /// Height of the content already on the page
    #[arg(long, default_value_t = 0)]
    initial_height: i64,

    /// Visible height of the simulated window
    #[arg(long, default_value_t = 800)]
    viewport_height: i64,

    /// Pixels added to the page per line of inserted markup
    #[arg(long, default_value_t = 20)]
    line_height: i64,

    /// Reader speed in pixels per second
    #[arg(long, default_value_t = 2000.0)]
    scroll_speed: f64,

    /// Write segments here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Overrides from flags, falling back to the config file
    fn overrides(&self) -> Result<ConfigOverrides> {
        let flags = ConfigOverrides {
            check_interval: self.check_interval,
            trigger_height: self.trigger_height,
            release_on_failure: self.release_on_failure.then_some(true),
            request_timeout: self.request_timeout,
            ..ConfigOverrides::default()
        };

        let file = match &self.config {
            Some(path) => ConfigOverrides::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ConfigOverrides::default(),
        };

        Ok(flags.or(file))
    }

    /// Generator spec from flags, falling back to the config file's table
    fn generator(&self, from_file: Option<GeneratorSpec>) -> GeneratorSpec {
        let file = from_file.unwrap_or_default();
        GeneratorSpec {
            url: self.url.clone().or(file.url),
            start_index: self.start_index.or(file.start_index),
            default_spacing: self.spacing.or(file.default_spacing),
        }
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let mut overrides = cli.overrides()?;
    let generator = cli.generator(overrides.generator.take());
    tracing::info!(
        page_url = %cli.page_url,
        template = generator.url.as_deref().unwrap_or(constants::generator::DEFAULT_TEMPLATE),
        "Starting scroller"
    );

    let output: Box<dyn std::io::Write + Send> = match &cli.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    let page = SimulatedPage::new(
        PageGeometry {
            initial_height: cli.initial_height,
            viewport_height: cli.viewport_height,
            line_height: cli.line_height,
            scroll_speed: cli.scroll_speed,
        },
        output,
    );

    let observer = FnObserver::new()
        .with_load_start(|| tracing::info!("Loading next segment"))
        .with_load_failure(|failure| {
            tracing::error!(url = %failure.url, status = ?failure.status, "{}", failure.message)
        });

    let handle = Scroller::builder(page.container(), generator)
        .config(overrides.observer(observer))
        .viewport(page.viewport())
        .page_url(cli.page_url.clone())
        .start()
        .context("Failed to start scroller")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            handle.stop();
        }
        _ = wait_for_stop(&handle) => {}
    }
    handle.join().await?;

    let (segments, bytes) = page.totals();
    tracing::info!(segments, bytes, "Done");
    Ok(())
}

/// Resolve once the scheduler stops by itself
async fn wait_for_stop(handle: &ScrollerHandle) {
    let mut ticker = tokio::time::interval(handle.config().check_interval);
    while handle.state() != SchedulerState::Stopped {
        ticker.tick().await;
    }
}
