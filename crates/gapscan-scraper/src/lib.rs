//! Marketplace signal collectors.
//!
//! Each platform module turns one (category, week) scrape into validated
//! [`gapscan_core::RawSignal`] rows; [`collect_platform_signals`] routes a
//! request to the right collector with production endpoints and credentials.

pub mod client;
pub mod collect;
pub mod error;
pub mod etsy;
pub mod gumroad;
mod parse;
mod rate_limit;
pub mod reddit;
pub mod whop;

pub use client::ScrapeClient;
pub use collect::collect_platform_signals;
pub use error::ScraperError;
