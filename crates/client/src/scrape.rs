//! Learn-from-URL submissions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use url::Url;

use crate::api::ServiceApi;
use crate::{Error, Result};

/// A submission the service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSubmission {
	/// Target as sent.
	pub url: Url,
	/// When the service acknowledged it.
	pub submitted_at: DateTime<Utc>,
}

/// Submits URLs for the service to learn vocabulary from.
///
/// Each call is one request. Nothing is retried and nothing is tracked
/// afterwards; completion arrives separately as a `SCRAPE_COMPLETE` frame.
#[derive(Clone)]
pub struct ScrapeRequestClient {
	api: Arc<dyn ServiceApi>,
}

impl std::fmt::Debug for ScrapeRequestClient {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ScrapeRequestClient").finish_non_exhaustive()
	}
}

impl ScrapeRequestClient {
	/// Wraps the service endpoints.
	pub fn new(api: Arc<dyn ServiceApi>) -> Self {
		Self { api }
	}

	/// Submits `target` once.
	///
	/// Empty and non-http(s) targets fail with [`Error::InvalidTarget`]
	/// without any request being made.
	pub async fn submit(&self, target: &str) -> Result<ScrapeSubmission> {
		let url = parse_target(target)?;
		match self.api.submit_scrape(&url).await {
			Ok(()) => {
				info!(url = url.as_str(), "scrape submitted");
				Ok(ScrapeSubmission {
					url,
					submitted_at: Utc::now(),
				})
			}
			Err(err) => {
				warn!(url = url.as_str(), error = %err, "scrape submission failed");
				Err(err)
			}
		}
	}
}

fn parse_target(target: &str) -> Result<Url> {
	let target = target.trim();
	if target.is_empty() {
		return Err(Error::InvalidTarget("empty url".into()));
	}
	let url = Url::parse(target).map_err(|e| Error::InvalidTarget(format!("{target}: {e}")))?;
	match url.scheme() {
		"http" | "https" => Ok(url),
		scheme => Err(Error::InvalidTarget(format!("unsupported scheme {scheme:?}"))),
	}
}
