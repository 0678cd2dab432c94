use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Event delivered by a transport to the stream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The subscription is established and the server is sending.
    Opened,
    /// One log line pushed by the server.
    Line(String),
    /// The subscription died. The transport sends nothing after this.
    Failed(String),
}

/// One-way subscription to the backend log feed.
///
/// The stream client owns exactly one transport and drives it from the UI
/// thread: `open` starts a subscription, `poll` drains pending events
/// without blocking, `close` tears the subscription down. Tests substitute
/// a scripted implementation to simulate errors and messages without a
/// network stream.
pub trait Transport {
    fn open(&mut self);
    fn close(&mut self);
    fn poll(&mut self) -> Option<TransportEvent>;
    /// Whether a live subscription (connecting or connected) exists.
    fn is_open(&self) -> bool;
}

/// Production transport: `GET /logs` as a server-sent event stream.
///
/// Each `open` spawns one reader task that pushes events into an unbounded
/// channel; `close` aborts the task and drops the receiver, so a replaced
/// session can never deliver stale events.
pub struct SseTransport {
    endpoint: String,
    client: reqwest::Client,
    rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    task: Option<JoinHandle<()>>,
}

impl SseTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            rx: None,
            task: None,
        }
    }
}

impl Transport for SseTransport {
    fn open(&mut self) {
        self.close();
        let (tx, rx) = mpsc::unbounded_channel();
        self.rx = Some(rx);
        self.task = Some(tokio::spawn(run_stream(
            self.client.clone(),
            self.endpoint.clone(),
            tx,
        )));
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.rx = None;
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.rx.as_mut()?.try_recv().ok()
    }

    fn is_open(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_stream(
    client: reqwest::Client,
    endpoint: String,
    tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let response = match client
        .get(&endpoint)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => resp,
        Ok(resp) => {
            let _ = tx.send(TransportEvent::Failed(format!("HTTP {}", resp.status())));
            return;
        }
        Err(e) => {
            let _ = tx.send(TransportEvent::Failed(e.to_string()));
            return;
        }
    };

    if tx.send(TransportEvent::Opened).is_err() {
        return;
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(b) => b,
            Err(e) => {
                let _ = tx.send(TransportEvent::Failed(e.to_string()));
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&bytes));

        while let Some(newline_idx) = buffer.find('\n') {
            let mut line = buffer[..newline_idx].to_string();
            if line.ends_with('\r') {
                line.pop();
            }
            buffer.drain(..=newline_idx);

            if let Some(payload) = parse_event_data(&line) {
                if tx.send(TransportEvent::Line(payload.to_string())).is_err() {
                    return;
                }
            }
        }
    }

    // The log feed is endless; the server closing it counts as a failure so
    // the client schedules a reconnect.
    let _ = tx.send(TransportEvent::Failed("stream ditutup server".into()));
}

/// Extract the payload of a `data:` field line. Comments, `event:`/`id:`/
/// `retry:` fields, and blank separator lines carry no payload.
fn parse_event_data(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }
    let payload = trimmed.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_parse_event_data_strips_prefix() {
        assert_eq!(parse_event_data("data: halo dunia"), Some("halo dunia"));
        assert_eq!(parse_event_data("data:tanpa spasi"), Some("tanpa spasi"));
        assert_eq!(parse_event_data("data: padded \r".trim_end()), Some("padded"));
    }

    #[test]
    fn test_parse_event_data_ignores_non_data_lines() {
        assert_eq!(parse_event_data(""), None);
        assert_eq!(parse_event_data("   "), None);
        assert_eq!(parse_event_data(": keep-alive"), None);
        assert_eq!(parse_event_data("event: log"), None);
        assert_eq!(parse_event_data("id: 7"), None);
        assert_eq!(parse_event_data("retry: 1000"), None);
        assert_eq!(parse_event_data("data:"), None);
    }

    async fn next_event(transport: &mut SseTransport) -> TransportEvent {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(ev) = transport.poll() {
                return ev;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "no transport event within 5s"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_sse_transport_delivers_lines_then_fails_on_eof() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/logs");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("retry: 1000\n: ping\ndata: satu\n\ndata: dua\n\n");
        });

        let mut transport = SseTransport::new(server.url("/logs"));
        transport.open();

        assert_eq!(next_event(&mut transport).await, TransportEvent::Opened);
        assert_eq!(
            next_event(&mut transport).await,
            TransportEvent::Line("satu".into())
        );
        assert_eq!(
            next_event(&mut transport).await,
            TransportEvent::Line("dua".into())
        );
        assert!(matches!(
            next_event(&mut transport).await,
            TransportEvent::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_sse_transport_fails_on_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/logs");
            then.status(503);
        });

        let mut transport = SseTransport::new(server.url("/logs"));
        transport.open();

        match next_event(&mut transport).await {
            TransportEvent::Failed(reason) => assert!(reason.contains("503")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_discards_pending_events() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/logs");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: basi\n\n");
        });

        let mut transport = SseTransport::new(server.url("/logs"));
        transport.open();
        // Let the reader task produce something, then tear down.
        tokio::time::sleep(Duration::from_millis(200)).await;
        transport.close();

        assert!(!transport.is_open());
        assert_eq!(transport.poll(), None);
    }
}
