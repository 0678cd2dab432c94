//! Reconnecting client for the backend's live log feed.
//!
//! Owns at most one subscription to `GET /logs`, renders incoming lines into
//! a bounded buffer, and recovers from transport failures on its own with
//! exponential backoff. Everything runs on the UI thread: the transport
//! delivers events through a non-blocking poll and the retry timer is a
//! plain deadline checked from `tick`, so teardown can never resurrect a
//! stale session.

pub mod backoff;
pub mod buffer;
pub mod transport;

use std::time::Instant;

use tracing::{debug, warn};

pub use backoff::Backoff;
pub use buffer::{LineKind, LogBuffer, LogLine, LOG_BUFFER_CAP};
pub use transport::{SseTransport, Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Finite-state log stream client.
///
/// States: `Disconnected -> Connecting -> Connected`, errors loop back to
/// `Connecting` through a scheduled retry. There is no terminal state and no
/// maximum retry count; the client runs for the lifetime of the hosting
/// view.
pub struct LogStream<T: Transport> {
    transport: T,
    state: ConnectionState,
    attempts: u32,
    backoff: Backoff,
    buffer: LogBuffer,
    retry_at: Option<Instant>,
    scroll_pending: bool,
}

impl<T: Transport> LogStream<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            state: ConnectionState::Disconnected,
            attempts: 0,
            backoff: Backoff::default(),
            buffer: LogBuffer::default(),
            retry_at: None,
            scroll_pending: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn retry_pending(&self) -> bool {
        self.retry_at.is_some()
    }

    /// Tear down any existing subscription and open a fresh one. Cancels a
    /// pending retry; the new session supersedes it.
    pub fn connect(&mut self) {
        self.transport.close();
        self.retry_at = None;
        self.state = ConnectionState::Connecting;
        self.transport.open();
    }

    /// Close without scheduling a retry (view going away). No further
    /// events are observed after this call.
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.retry_at = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Reconnect only when no live subscription exists (panel became
    /// visible again); no-op otherwise, so no duplicate subscription is
    /// ever created.
    pub fn reconnect_if_closed(&mut self) {
        if !self.transport.is_open() {
            self.connect();
        }
    }

    /// Operator clear: empty the buffer, leave a marker line.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.buffer.push_system("Log dibersihkan");
    }

    /// Take the scroll-to-newest signal, set whenever a line was appended.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::take(&mut self.scroll_pending)
    }

    /// Drain transport events, then fire the scheduled retry if due.
    pub fn tick(&mut self, now: Instant) {
        while let Some(event) = self.transport.poll() {
            match event {
                TransportEvent::Opened => self.on_open(),
                TransportEvent::Line(line) => self.on_line(line),
                TransportEvent::Failed(reason) => self.on_error(now, reason),
            }
        }

        if let Some(at) = self.retry_at {
            if now >= at {
                debug!(attempt = self.attempts, "retrying log stream");
                self.connect();
            }
        }
    }

    fn on_open(&mut self) {
        debug!("log stream connected");
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        // Announce only into an empty buffer so a reconnect never stamps a
        // banner over buffered history.
        if self.buffer.is_empty() {
            self.buffer.push_system("Live log terhubung...");
            self.scroll_pending = true;
        }
    }

    fn on_line(&mut self, line: String) {
        self.buffer.push_server(line);
        self.scroll_pending = true;
    }

    fn on_error(&mut self, now: Instant, reason: String) {
        self.transport.close();
        self.state = ConnectionState::Disconnected;
        self.attempts += 1;
        let delay = self.backoff.delay(self.attempts);
        warn!(
            attempt = self.attempts,
            delay_s = delay.as_secs(),
            error = %reason,
            "log stream error, scheduling reconnect"
        );
        self.buffer.push_system(format!(
            "Koneksi terputus, mencoba reconnect dalam {}s... (percobaan {})",
            delay.as_secs(),
            self.attempts
        ));
        self.scroll_pending = true;
        self.retry_at = Some(now + delay);
        // The retry is already in flight from the operator's point of view.
        self.state = ConnectionState::Connecting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedTransport {
        pending: VecDeque<TransportEvent>,
        open_calls: usize,
        close_calls: usize,
        open: bool,
    }

    impl Transport for ScriptedTransport {
        fn open(&mut self) {
            self.open_calls += 1;
            self.open = true;
        }

        fn close(&mut self) {
            self.close_calls += 1;
            self.open = false;
            self.pending.clear();
        }

        fn poll(&mut self) -> Option<TransportEvent> {
            self.pending.pop_front()
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn stream() -> LogStream<ScriptedTransport> {
        LogStream::new(ScriptedTransport::default())
    }

    fn deliver(stream: &mut LogStream<ScriptedTransport>, event: TransportEvent) {
        stream.transport.pending.push_back(event);
    }

    fn connected_banners(stream: &LogStream<ScriptedTransport>) -> usize {
        stream
            .buffer
            .iter()
            .filter(|l| l.kind == LineKind::System && l.text.contains("terhubung"))
            .count()
    }

    #[test]
    fn test_connect_opens_one_subscription() {
        let mut s = stream();
        assert_eq!(s.state(), ConnectionState::Disconnected);

        s.connect();
        assert_eq!(s.state(), ConnectionState::Connecting);
        assert_eq!(s.transport.open_calls, 1);
    }

    #[test]
    fn test_first_open_appends_single_banner() {
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Opened);
        s.tick(Instant::now());

        assert_eq!(s.state(), ConnectionState::Connected);
        assert_eq!(s.attempts(), 0);
        assert_eq!(connected_banners(&s), 1);
    }

    #[test]
    fn test_reconnect_with_history_appends_no_banner() {
        let now = Instant::now();
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Opened);
        deliver(&mut s, TransportEvent::Line("pesan".into()));
        s.tick(now);
        deliver(&mut s, TransportEvent::Failed("putus".into()));
        s.tick(now);

        // Retry fires, session opens again onto a non-empty buffer.
        s.tick(now + Duration::from_secs(2));
        deliver(&mut s, TransportEvent::Opened);
        s.tick(now + Duration::from_secs(2));

        assert_eq!(s.state(), ConnectionState::Connected);
        assert_eq!(connected_banners(&s), 1);
    }

    #[test]
    fn test_error_schedules_exactly_one_reconnect() {
        let now = Instant::now();
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Opened);
        s.tick(now);

        deliver(&mut s, TransportEvent::Failed("server mati".into()));
        s.tick(now);
        assert_eq!(s.state(), ConnectionState::Connecting);
        assert_eq!(s.attempts(), 1);
        assert!(s.retry_pending());
        assert_eq!(s.transport.open_calls, 1);

        // Not due yet.
        s.tick(now + Duration::from_millis(1999));
        assert_eq!(s.transport.open_calls, 1);

        // Due: exactly one new subscription, then quiescent.
        s.tick(now + Duration::from_millis(2000));
        assert_eq!(s.transport.open_calls, 2);
        assert!(!s.retry_pending());
        s.tick(now + Duration::from_secs(60));
        assert_eq!(s.transport.open_calls, 2);
    }

    #[test]
    fn test_attempts_increase_until_success_resets() {
        let now = Instant::now();
        let mut s = stream();
        s.connect();

        let mut at = now;
        for expected in 1..=3u32 {
            deliver(&mut s, TransportEvent::Failed("gagal".into()));
            s.tick(at);
            assert_eq!(s.attempts(), expected);
            // Advance past the scheduled delay so the retry fires.
            at += Duration::from_secs(40);
            s.tick(at);
        }

        deliver(&mut s, TransportEvent::Opened);
        s.tick(at);
        assert_eq!(s.attempts(), 0);
        assert_eq!(s.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_reconnect_if_closed_is_noop_while_open() {
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Opened);
        s.tick(Instant::now());

        s.reconnect_if_closed();
        assert_eq!(s.transport.open_calls, 1);
    }

    #[test]
    fn test_reconnect_if_closed_reopens_closed_transport() {
        let now = Instant::now();
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Failed("putus".into()));
        s.tick(now);
        assert!(!s.transport.is_open());

        s.reconnect_if_closed();
        assert_eq!(s.transport.open_calls, 2);
        // The explicit reconnect superseded the scheduled retry.
        assert!(!s.retry_pending());
    }

    #[test]
    fn test_disconnect_cancels_pending_retry() {
        let now = Instant::now();
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Failed("putus".into()));
        s.tick(now);
        assert!(s.retry_pending());

        s.disconnect();
        assert_eq!(s.state(), ConnectionState::Disconnected);
        assert!(!s.retry_pending());

        // Long after the old deadline, nothing gets resurrected.
        s.tick(now + Duration::from_secs(120));
        assert_eq!(s.transport.open_calls, 1);
        assert_eq!(s.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_lines_append_in_delivery_order() {
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Opened);
        for i in 0..4 {
            deliver(&mut s, TransportEvent::Line(format!("baris-{}", i)));
        }
        s.tick(Instant::now());

        let texts: Vec<&str> = s
            .buffer
            .iter()
            .filter(|l| l.kind == LineKind::Server)
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, vec!["baris-0", "baris-1", "baris-2", "baris-3"]);
        assert!(s.take_scroll_request());
        assert!(!s.take_scroll_request());
    }

    #[test]
    fn test_clear_leaves_marker_and_blocks_banner() {
        let mut s = stream();
        s.connect();
        deliver(&mut s, TransportEvent::Opened);
        deliver(&mut s, TransportEvent::Line("riwayat".into()));
        s.tick(Instant::now());

        s.clear();
        assert_eq!(s.buffer.len(), 1);
        assert_eq!(s.buffer.iter().next().map(|l| l.kind), Some(LineKind::System));

        // A reconnect after clear sees a non-empty buffer: no banner.
        deliver(&mut s, TransportEvent::Opened);
        s.tick(Instant::now());
        assert_eq!(connected_banners(&s), 0);
    }

    #[test]
    fn test_error_while_connecting_keeps_retrying() {
        let now = Instant::now();
        let mut s = stream();
        s.connect();

        // Never opens, fails straight away (backend down).
        deliver(&mut s, TransportEvent::Failed("connection refused".into()));
        s.tick(now);
        assert_eq!(s.state(), ConnectionState::Connecting);
        assert_eq!(s.attempts(), 1);

        s.tick(now + Duration::from_secs(2));
        deliver(&mut s, TransportEvent::Failed("connection refused".into()));
        s.tick(now + Duration::from_secs(2));
        assert_eq!(s.attempts(), 2);
        assert!(s.retry_pending());
    }
}
