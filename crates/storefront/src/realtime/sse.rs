//! Server-sent event framing for the realtime database stream.

use serde::Deserialize;
use serde_json::Value;

/// Accumulates raw stream bytes and splits out complete events.
///
/// Bytes are only decoded once a full event has arrived, so a multi-byte
/// character split across chunks is never mangled.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer
            .extend(chunk.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Remove and return the next complete event, if any.
    ///
    /// Events are separated by a blank line.
    pub fn next_event(&mut self) -> Option<String> {
        let idx = self.buffer.windows(2).position(|w| w == b"\n\n")?;
        let event: Vec<u8> = self.buffer.drain(..idx + 2).take(idx).collect();
        Some(String::from_utf8_lossy(&event).into_owned())
    }
}

/// An event from the database's streaming endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Replace the value at `path` (relative to the watched location).
    Put { path: String, data: Value },
    /// Merge children into the value at `path`.
    Patch { path: String, data: Value },
    KeepAlive,
    /// The server cancelled the stream, usually because security rules
    /// no longer allow reading the location.
    Cancel(String),
    /// The auth token expired or was revoked.
    AuthRevoked,
}

#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// Parse one raw event block into a `StreamEvent`.
///
/// Returns `None` for empty blocks and unknown event types, and
/// `Some(Err(..))` when a put or patch carries malformed data.
pub fn parse_event(block: &str) -> Option<Result<StreamEvent, String>> {
    let mut event_type = None;
    let mut data = String::new();

    for line in block.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event_type = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(value.trim_start());
        }
    }

    let parse_path_data = |data: &str| {
        serde_json::from_str::<PathData>(data)
            .map_err(|e| format!("failed to parse stream event data: {e}"))
    };

    match event_type? {
        "put" => Some(parse_path_data(&data).map(|d| StreamEvent::Put {
            path: d.path,
            data: d.data,
        })),
        "patch" => Some(parse_path_data(&data).map(|d| StreamEvent::Patch {
            path: d.path,
            data: d.data,
        })),
        "keep-alive" => Some(Ok(StreamEvent::KeepAlive)),
        "cancel" => Some(Ok(StreamEvent::Cancel(data))),
        "auth_revoked" => Some(Ok(StreamEvent::AuthRevoked)),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_next_event_splits_on_blank_line() {
        let mut buffer = SseBuffer::default();
        buffer.push(b"event: keep-alive\ndata: null\n\nevent: put\r\ndata: {\"path\"");

        assert_eq!(
            buffer.next_event().as_deref(),
            Some("event: keep-alive\ndata: null")
        );
        assert!(buffer.next_event().is_none());

        buffer.push(b":\"/\",\"data\":1}\n\n");
        assert_eq!(
            buffer.next_event().as_deref(),
            Some("event: put\ndata: {\"path\":\"/\",\"data\":1}")
        );
        assert!(buffer.next_event().is_none());
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let mut buffer = SseBuffer::default();
        let text = "event: put\ndata: {\"path\":\"/\",\"data\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = text.len() - 5;
        buffer.push(&text[..split]);
        buffer.push(&text[split..]);

        let event = parse_event(&buffer.next_event().unwrap()).unwrap().unwrap();
        assert_eq!(
            event,
            StreamEvent::Put {
                path: "/".to_string(),
                data: json!("caf\u{e9}")
            }
        );
    }

    #[test]
    fn test_parse_put_and_patch() {
        let put = parse_event("event: put\ndata: {\"path\":\"/a\",\"data\":{\"status\":\"read\"}}")
            .unwrap()
            .unwrap();
        assert_eq!(
            put,
            StreamEvent::Put {
                path: "/a".to_string(),
                data: json!({"status": "read"})
            }
        );

        let patch = parse_event("event: patch\ndata: {\"path\":\"/\",\"data\":{\"a/status\":\"read\"}}")
            .unwrap()
            .unwrap();
        assert!(matches!(patch, StreamEvent::Patch { .. }));
    }

    #[test]
    fn test_parse_control_events() {
        assert_eq!(
            parse_event("event: keep-alive\ndata: null"),
            Some(Ok(StreamEvent::KeepAlive))
        );
        assert_eq!(
            parse_event("event: auth_revoked\ndata: credential is no longer valid"),
            Some(Ok(StreamEvent::AuthRevoked))
        );
        assert_eq!(
            parse_event("event: cancel\ndata: Permission denied"),
            Some(Ok(StreamEvent::Cancel("Permission denied".to_string())))
        );
        assert!(parse_event("").is_none());
        assert!(parse_event("event: mystery\ndata: {}").is_none());
    }

    #[test]
    fn test_parse_malformed_put() {
        assert!(parse_event("event: put\ndata: {oops").unwrap().is_err());
    }
}
