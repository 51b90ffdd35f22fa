use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::BridgeError;

/// Push transport the topic tracker subscribes through.
#[async_trait]
pub trait NotificationBridge: Send + Sync {
  async fn subscribe_topic(&self, topic: &str) -> Result<(), BridgeError>;

  async fn unsubscribe_topic(&self, topic: &str) -> Result<(), BridgeError>;
}

/// Bridge used when push notifications are disabled; accepts every call.
#[derive(Debug, Clone, Default)]
pub struct NoopBridge;

#[async_trait]
impl NotificationBridge for NoopBridge {
  async fn subscribe_topic(&self, topic: &str) -> Result<(), BridgeError> {
    debug!(topic, "push disabled, subscribe accepted locally");
    Ok(())
  }

  async fn unsubscribe_topic(&self, topic: &str) -> Result<(), BridgeError> {
    debug!(topic, "push disabled, unsubscribe accepted locally");
    Ok(())
  }
}

/// Bridge to an HTTP push relay.
///
/// Subscribing is `PUT {url}/topics/{topic}`, unsubscribing is
/// `DELETE {url}/topics/{topic}`. Any 2xx answer counts as success.
#[derive(Clone)]
pub struct HttpBridge {
  http: reqwest::Client,
  base_url: Url,
}

impl HttpBridge {
  pub fn new(url: &str, timeout: Duration) -> Result<Self> {
    let base_url =
      Url::parse(url).map_err(|e| eyre!("Invalid notifications url {}: {}", url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("Invalid notifications url {}: cannot be used as a base", url));
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  fn topic_url(&self, topic: &str) -> Option<Url> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .ok()?
      .pop_if_empty()
      .extend(["topics", topic]);
    Some(url)
  }

  /// Send the request, describing any failure as a message.
  async fn call(&self, method: reqwest::Method, topic: &str) -> Result<(), String> {
    let url = self
      .topic_url(topic)
      .ok_or_else(|| format!("invalid base url {}", self.base_url))?;

    let response = self
      .http
      .request(method.clone(), url)
      .send()
      .await
      .map_err(|e| e.to_string())?;

    let status = response.status();
    if !status.is_success() {
      return Err(format!("relay responded with {}", status.as_u16()));
    }

    info!(topic, %method, "push relay updated");
    Ok(())
  }
}

#[async_trait]
impl NotificationBridge for HttpBridge {
  async fn subscribe_topic(&self, topic: &str) -> Result<(), BridgeError> {
    self
      .call(reqwest::Method::PUT, topic)
      .await
      .map_err(|message| BridgeError::Subscribe {
        topic: topic.to_string(),
        message,
      })
  }

  async fn unsubscribe_topic(&self, topic: &str) -> Result<(), BridgeError> {
    self
      .call(reqwest::Method::DELETE, topic)
      .await
      .map_err(|message| BridgeError::Unsubscribe {
        topic: topic.to_string(),
        message,
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::serve_once;

  fn bridge(url: &str) -> HttpBridge {
    HttpBridge::new(url, Duration::from_secs(2)).unwrap()
  }

  #[tokio::test]
  async fn test_subscribe_puts_topic() {
    let (url, server) = serve_once("204 No Content", "", Duration::ZERO).await;

    bridge(&url).subscribe_topic("event-evt1").await.unwrap();
    assert_eq!(server.await.unwrap(), "PUT /api/v1/topics/event-evt1 HTTP/1.1");
  }

  #[tokio::test]
  async fn test_unsubscribe_deletes_topic() {
    let (url, server) = serve_once("200 OK", "{}", Duration::ZERO).await;

    bridge(&url).unsubscribe_topic("match-42").await.unwrap();
    assert_eq!(server.await.unwrap(), "DELETE /api/v1/topics/match-42 HTTP/1.1");
  }

  #[tokio::test]
  async fn test_relay_rejection_is_bridge_error() {
    let (url, _server) = serve_once("403 Forbidden", "", Duration::ZERO).await;

    let err = bridge(&url).subscribe_topic("event-evt1").await.unwrap_err();
    assert_eq!(
      err,
      BridgeError::Subscribe {
        topic: "event-evt1".into(),
        message: "relay responded with 403".into(),
      }
    );
  }

  #[tokio::test]
  async fn test_noop_bridge_accepts_everything() {
    let bridge = NoopBridge;
    assert!(bridge.subscribe_topic("event-1").await.is_ok());
    assert!(bridge.unsubscribe_topic("event-1").await.is_ok());
  }
}
