//! Platform dispatch for signal collection.

use chrono::NaiveDate;

use gapscan_core::{AppConfig, Platform, RawSignal};

use crate::client::ScrapeClient;
use crate::error::ScraperError;
use crate::{etsy, gumroad, reddit, whop};

/// Collects raw signals for one (platform, category, week) cell, routing to
/// the platform's collector with its production endpoint and credentials
/// from the application config.
///
/// # Errors
///
/// Returns [`ScraperError::MissingCredential`] when the platform needs an
/// API credential that is not configured, plus whatever the underlying
/// collector can return.
pub async fn collect_platform_signals(
    client: &ScrapeClient,
    config: &AppConfig,
    platform: Platform,
    category: &str,
    week_start: NaiveDate,
) -> Result<Vec<RawSignal>, ScraperError> {
    match platform {
        Platform::Etsy => {
            let api_key =
                config
                    .rapidapi_key
                    .as_deref()
                    .ok_or(ScraperError::MissingCredential {
                        name: "RAPIDAPI_KEY",
                    })?;
            etsy::fetch_signals(client, etsy::DEFAULT_BASE_URL, api_key, category, week_start).await
        }
        Platform::Gumroad => {
            gumroad::fetch_signals(client, gumroad::DEFAULT_BASE_URL, category, week_start).await
        }
        Platform::Whop => {
            whop::fetch_signals(client, whop::DEFAULT_BASE_URL, category, week_start).await
        }
        Platform::Reddit => {
            let api_token =
                config
                    .brightdata_api_token
                    .as_deref()
                    .ok_or(ScraperError::MissingCredential {
                        name: "BRIGHTDATA_API_TOKEN",
                    })?;
            reddit::fetch_signals(
                client,
                reddit::DEFAULT_BASE_URL,
                api_token,
                &config.brightdata_dataset_id,
                category,
                week_start,
            )
            .await
        }
    }
}
