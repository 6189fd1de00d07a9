//! Firebase Realtime Database REST client.
//!
//! Every location `p` is exposed at `{base}/{p}.json`. Writes are plain
//! `POST`/`PUT`/`DELETE` requests; live subscriptions use the streaming
//! endpoint (`Accept: text/event-stream`), which sends the current value as a
//! `put` at `/` and then incremental `put`/`patch` events. The client folds
//! those into a local copy of the location and yields the full value after
//! each event.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use super::sse::{SseBuffer, StreamEvent, parse_event};
use super::tree::{merge_at, set_at, split_path};
use super::{DatabaseError, RealtimeDatabase, SnapshotStream};

/// First reconnect delay after the stream drops.
const RECONNECT_INITIAL: Duration = Duration::from_secs(1);
/// Reconnect delay ceiling.
const RECONNECT_MAX: Duration = Duration::from_secs(30);

/// REST client for a Firebase Realtime Database.
#[derive(Clone)]
pub struct RestDatabase {
    inner: Arc<RestDatabaseInner>,
}

struct RestDatabaseInner {
    client: reqwest::Client,
    base_url: Url,
    auth: Option<SecretString>,
}

/// Response body of a `POST` (push).
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl RestDatabase {
    /// Create a client for the database at `base_url`.
    ///
    /// `auth` is sent as the `auth` query parameter (a database secret or an
    /// ID token).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(base_url: Url, auth: Option<SecretString>) -> Result<Self, DatabaseError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Content-Type",
            HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestDatabaseInner {
                client,
                base_url,
                auth,
            }),
        })
    }

    /// The database base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// URL of the JSON endpoint for `path`.
    fn url_for(&self, path: &str) -> Result<Url, DatabaseError> {
        let segments = split_path(path)?;
        let mut url = self.inner.base_url.clone();
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| DatabaseError::InvalidPath(self.inner.base_url.to_string()))?;
            parts.pop_if_empty();
            match segments.split_last() {
                Some((last, parents)) => {
                    parts.extend(parents);
                    parts.push(&format!("{last}.json"));
                }
                None => {
                    parts.push(".json");
                }
            }
        }
        if let Some(auth) = &self.inner.auth {
            url.query_pairs_mut()
                .append_pair("auth", auth.expose_secret());
        }
        Ok(url)
    }

    /// Turn an error status into a `DatabaseError`.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DatabaseError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        // Error bodies look like {"error": "Permission denied"}.
        let message = serde_json::from_str::<Value>(&message)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
            .unwrap_or(message);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DatabaseError::Unauthorized(message));
        }
        Err(DatabaseError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Open one streaming connection.
    async fn open_stream(&self, url: &Url) -> Result<reqwest::Response, DatabaseError> {
        let response = self
            .inner
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        Self::check_status(response).await
    }
}

/// Outcome of applying one stream event to the local copy.
#[derive(Debug)]
enum Folded {
    /// Full value of the watched location after the event.
    Snapshot(Value),
    /// The event could not be applied; the stream carries on.
    Skipped(DatabaseError),
    /// The server ended the subscription.
    Closed(DatabaseError),
}

/// Apply `event` to `local`, the copy of the watched location for the current
/// connection. Keep-alives yield nothing.
fn fold_event(local: &mut Value, event: StreamEvent) -> Option<Folded> {
    match event {
        StreamEvent::Put { path, data } => Some(match split_path(&path) {
            Ok(segments) => {
                set_at(local, &segments, data);
                Folded::Snapshot(local.clone())
            }
            Err(e) => Folded::Skipped(e),
        }),
        StreamEvent::Patch { path, data } => Some(match (split_path(&path), data) {
            (Ok(segments), Value::Object(children)) => {
                merge_at(local, &segments, children);
                Folded::Snapshot(local.clone())
            }
            (Err(e), _) => Folded::Skipped(e),
            (Ok(_), other) => Folded::Skipped(DatabaseError::Parse(format!(
                "patch data must be an object, got {other}"
            ))),
        }),
        StreamEvent::KeepAlive => None,
        StreamEvent::Cancel(reason) => {
            warn!(reason = %reason, "Realtime stream cancelled by server");
            Some(Folded::Closed(DatabaseError::Stream(format!(
                "cancelled: {reason}"
            ))))
        }
        StreamEvent::AuthRevoked => Some(Folded::Closed(DatabaseError::Unauthorized(
            "auth revoked".to_string(),
        ))),
    }
}

#[async_trait]
impl RealtimeDatabase for RestDatabase {
    #[instrument(skip(self, value))]
    async fn push(&self, path: &str, value: Value) -> Result<String, DatabaseError> {
        let url = self.url_for(path)?;
        let response = self.inner.client.post(url).json(&value).send().await?;
        let response = Self::check_status(response).await?;

        let pushed: PushResponse = response
            .json()
            .await
            .map_err(|e| DatabaseError::Parse(e.to_string()))?;
        debug!(key = %pushed.name, "Pushed child");
        Ok(pushed.name)
    }

    #[instrument(skip(self, value))]
    async fn set(&self, path: &str, value: Value) -> Result<(), DatabaseError> {
        let url = self.url_for(path)?;
        let response = self.inner.client.put(url).json(&value).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, path: &str) -> Result<(), DatabaseError> {
        let url = self.url_for(path)?;
        let response = self.inner.client.delete(url).send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, path: &str) -> Result<Value, DatabaseError> {
        let url = self.url_for(path)?;
        let response = self.inner.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| DatabaseError::Parse(e.to_string()))
    }

    /// Stream the value at `path`, reconnecting with backoff when the
    /// connection drops. Transport errors are yielded before each reconnect;
    /// `cancel` and `auth_revoked` end the stream.
    #[instrument(skip(self))]
    async fn watch(&self, path: &str) -> Result<SnapshotStream, DatabaseError> {
        let url = self.url_for(path)?;
        // Fail fast on bad credentials or rules before handing out a stream.
        let first = self.open_stream(&url).await?;
        let db = self.clone();

        Ok(Box::pin(stream! {
            let mut pending = Some(first);
            let mut delay = RECONNECT_INITIAL;

            loop {
                let response = match pending.take() {
                    Some(response) => response,
                    None => match db.open_stream(&url).await {
                        Ok(response) => {
                            delay = RECONNECT_INITIAL;
                            response
                        }
                        Err(DatabaseError::Unauthorized(message)) => {
                            yield Err(DatabaseError::Unauthorized(message));
                            break;
                        }
                        Err(e) => {
                            yield Err(e);
                            tokio::time::sleep(delay).await;
                            delay = (delay * 2).min(RECONNECT_MAX);
                            continue;
                        }
                    },
                };

                let mut local = Value::Null;
                let mut buffer = SseBuffer::default();
                let mut bytes = std::pin::pin!(response.bytes_stream());
                let mut finished = false;

                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            yield Err(DatabaseError::Stream(e.to_string()));
                            break;
                        }
                    };
                    buffer.push(&chunk);

                    while let Some(block) = buffer.next_event() {
                        let event = match parse_event(&block) {
                            Some(Ok(event)) => event,
                            Some(Err(message)) => {
                                yield Err(DatabaseError::Parse(message));
                                continue;
                            }
                            None => continue,
                        };
                        match fold_event(&mut local, event) {
                            Some(Folded::Snapshot(value)) => yield Ok(value),
                            Some(Folded::Skipped(e)) => yield Err(e),
                            Some(Folded::Closed(e)) => {
                                yield Err(e);
                                finished = true;
                                break;
                            }
                            None => {}
                        }
                    }
                    if finished {
                        break;
                    }
                }

                if finished {
                    break;
                }
                debug!(delay_ms = delay.as_millis(), "Realtime stream closed, reconnecting");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RECONNECT_MAX);
            }
        }))
    }
}
