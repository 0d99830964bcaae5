//! HTTP side of the tokenization service.
//!
//! Two calls: the vocabulary-size lookup and the learn-from-URL submission.
//! Neither retries; callers decide what a failure means.

use async_trait::async_trait;
use reqwest::Client;
use toksync_proto::{ScrapeRequest, VocabCount, VocabSizeResponse};
use tracing::debug;
use url::Url;

use crate::config::SyncConfig;
use crate::{Error, Result};

/// Request/response endpoints of the service.
#[async_trait]
pub trait ServiceApi: Send + Sync + 'static {
	/// `GET /api/vocab-size`.
	async fn vocab_size(&self) -> Result<VocabCount>;

	/// `POST /api/scrape` with `{"url": ...}`. Success means the service
	/// accepted the job, not that it finished.
	async fn submit_scrape(&self, url: &Url) -> Result<()>;
}

/// [`ServiceApi`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpApi {
	client: Client,
	vocab_size_url: Url,
	scrape_url: Url,
}

impl HttpApi {
	/// Builds a client for the endpoints in `config`.
	pub fn new(config: &SyncConfig) -> Result<Self> {
		let client = Client::builder().timeout(config.http_timeout()).build()?;
		Ok(Self {
			client,
			vocab_size_url: config.vocab_size_url()?,
			scrape_url: config.scrape_url()?,
		})
	}
}

#[async_trait]
impl ServiceApi for HttpApi {
	async fn vocab_size(&self) -> Result<VocabCount> {
		let response = self.client.get(self.vocab_size_url.clone()).send().await?;
		let status = response.status();
		if !status.is_success() {
			return Err(Error::Status(status.as_u16()));
		}
		let body: VocabSizeResponse = response.json().await?;
		debug!(vocab_size = body.vocab_size.get(), "vocab size fetched");
		Ok(body.vocab_size)
	}

	async fn submit_scrape(&self, url: &Url) -> Result<()> {
		let response = self
			.client
			.post(self.scrape_url.clone())
			.json(&ScrapeRequest { url: url.as_str() })
			.send()
			.await?;
		let status = response.status();
		if !status.is_success() {
			return Err(Error::Status(status.as_u16()));
		}
		Ok(())
	}
}
