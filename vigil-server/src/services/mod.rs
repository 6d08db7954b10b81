//! Service layer for the Vigil API server

pub mod flags;
pub mod monitor;
pub mod scan;
pub mod screenshots;
pub mod scrape;

pub use scan::ScanOrchestrator;
pub use screenshots::ScreenshotService;
pub use scrape::{ExternalRunStatus, HttpScrapeClient, ScrapeService};
