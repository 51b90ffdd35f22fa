use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;
use crate::vlr::api_types::{
  convert_all, ApiMatchDetails, ApiMatchPreview, ApiNewsItem, ApiTournamentDetails,
  ApiTournamentPreview,
};
use crate::vlr::types::{MatchDetails, MatchPreview, NewsItem, TournamentDetails, TournamentPreview};

/// Calls to the remote service, one per resource kind.
///
/// Implementations do not cache or retry; every call is a single request.
#[async_trait]
pub trait RemoteFetcher: Send + Sync {
  async fn fetch_events(&self) -> Result<Vec<TournamentPreview>, FetchError>;

  async fn fetch_event_details(&self, id: &str) -> Result<TournamentDetails, FetchError>;

  async fn fetch_matches(&self) -> Result<Vec<MatchPreview>, FetchError>;

  async fn fetch_match_details(&self, id: &str) -> Result<MatchDetails, FetchError>;

  async fn fetch_news(&self) -> Result<Vec<NewsItem>, FetchError>;
}

/// HTTP client for the VLR API
#[derive(Clone)]
pub struct VlrClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
  timeout: Duration,
}

impl VlrClient {
  pub fn new(config: &Config) -> Result<Self> {
    Self::with_base_url(&config.api.url, config.api.timeout(), Config::api_token())
  }

  pub fn with_base_url(url: &str, timeout: Duration, token: Option<String>) -> Result<Self> {
    let base_url =
      Url::parse(url).map_err(|e| eyre!("Invalid API url {}: {}", url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid API url {}: cannot be used as a base", url));
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
      timeout,
    })
  }

  /// Build an endpoint url, percent-encoding each segment.
  fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| FetchError::Transport(format!("invalid base url {}", self.base_url)))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(
    &self,
    what: &'static str,
    segments: &[&str],
  ) -> Result<T, FetchError> {
    let url = self.endpoint(segments)?;
    debug!(%url, "fetching {}", what);

    let mut request = self.http.get(url).header(ACCEPT, "application/json");
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(|e| self.transport_error(e))?;
    let status = response.status();
    let body = response.text().await.map_err(|e| self.transport_error(e))?;

    if !status.is_success() {
      return Err(FetchError::Response {
        status: status.as_u16(),
        message: snippet(&body),
      });
    }

    serde_json::from_str(&body).map_err(|e| FetchError::Decode {
      what,
      message: e.to_string(),
    })
  }

  fn transport_error(&self, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
      FetchError::Transport(format!(
        "request timed out after {}s",
        self.timeout.as_secs_f32()
      ))
    } else {
      FetchError::Transport(e.to_string())
    }
  }
}

/// First line of an error body, bounded so a whole HTML page never ends up in a status message.
fn snippet(body: &str) -> String {
  const MAX: usize = 200;
  let line = body.lines().next().unwrap_or("").trim();
  match line.char_indices().nth(MAX) {
    Some((cut, _)) => format!("{}...", &line[..cut]),
    None => line.to_string(),
  }
}

#[async_trait]
impl RemoteFetcher for VlrClient {
  async fn fetch_events(&self) -> Result<Vec<TournamentPreview>, FetchError> {
    let items: Vec<ApiTournamentPreview> = self.get_json("events", &["events"]).await?;
    convert_all(items)
  }

  async fn fetch_event_details(&self, id: &str) -> Result<TournamentDetails, FetchError> {
    let api: ApiTournamentDetails = self.get_json("event details", &["events", id]).await?;
    api.try_into()
  }

  async fn fetch_matches(&self) -> Result<Vec<MatchPreview>, FetchError> {
    let items: Vec<ApiMatchPreview> = self.get_json("matches", &["matches"]).await?;
    convert_all(items)
  }

  async fn fetch_match_details(&self, id: &str) -> Result<MatchDetails, FetchError> {
    let api: ApiMatchDetails = self.get_json("match details", &["matches", id]).await?;
    api.try_into()
  }

  async fn fetch_news(&self) -> Result<Vec<NewsItem>, FetchError> {
    let items: Vec<ApiNewsItem> = self.get_json("news", &["news"]).await?;
    convert_all(items)
  }
}
