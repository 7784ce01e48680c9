//! Crash report transports
//!
//! A [`Transport`] moves a finished packet to the crash-tracking service.
//! [`LiveTransport`] does so over HTTP from a background worker thread;
//! [`RecordingTransport`] keeps packets in memory so tests can observe the
//! reporter without anything leaving the process.
//!
//! ## Design Notes
//!
//! - `send` is called from a thread that is unwinding a panic, so it must
//!   return quickly. The live transport only enqueues.
//! - Delivery is best effort: failures are logged and dropped, never retried.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{ReportError, TransportError};
use crate::packet::DiagnosticPacket;

/// Delivers diagnostic packets to a crash-tracking endpoint.
pub trait Transport: Send + Sync {
    /// Hands `packet` over for delivery to `url`, authenticated with
    /// `auth_header`.
    fn send(&self, url: &str, auth_header: &str, packet: DiagnosticPacket)
        -> Result<(), TransportError>;
}

// ============================================================================
// RecordingTransport
// ============================================================================

/// In-memory transport for tests. Never touches the network.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    packets: Arc<Mutex<Vec<DiagnosticPacket>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets recorded so far, in send order.
    pub fn packets(&self) -> Vec<DiagnosticPacket> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for RecordingTransport {
    fn send(
        &self,
        _url: &str,
        _auth_header: &str,
        packet: DiagnosticPacket,
    ) -> Result<(), TransportError> {
        self.packets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(packet);
        Ok(())
    }
}

// ============================================================================
// LiveTransport
// ============================================================================

struct Job {
    url: String,
    auth_header: String,
    packet: DiagnosticPacket,
}

/// Count of queued or in-flight deliveries, used by [`LiveTransport::flush`].
#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .idle
            .wait_timeout_while(count, timeout, |n| *n > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

/// HTTP transport backed by a dedicated `crash-reporter` worker thread.
///
/// The worker owns a single-threaded tokio runtime, so the transport works
/// the same whether the panicking code runs inside a runtime or not.
pub struct LiveTransport {
    jobs: mpsc::UnboundedSender<Job>,
    pending: Arc<Pending>,
}

impl LiveTransport {
    /// Starts the worker thread. Each delivery is bounded by `send_timeout`.
    pub fn new(send_timeout: Duration) -> Result<Self, ReportError> {
        let client = reqwest::Client::builder()
            .timeout(send_timeout)
            .build()
            .map_err(TransportError::from)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (jobs, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::default());
        let worker_pending = Arc::clone(&pending);

        std::thread::Builder::new()
            .name("crash-reporter".to_string())
            .spawn(move || runtime.block_on(run_worker(client, rx, worker_pending)))?;

        Ok(Self { jobs, pending })
    }

    /// Waits up to `timeout` for queued reports to be delivered.
    ///
    /// Returns `false` if reports were still pending when the time ran out;
    /// those are abandoned.
    pub fn flush(&self, timeout: Duration) -> bool {
        self.pending.wait_idle(timeout)
    }
}

impl Transport for LiveTransport {
    fn send(
        &self,
        url: &str,
        auth_header: &str,
        packet: DiagnosticPacket,
    ) -> Result<(), TransportError> {
        self.pending.add();
        let job = Job {
            url: url.to_string(),
            auth_header: auth_header.to_string(),
            packet,
        };
        self.jobs.send(job).map_err(|_| {
            self.pending.done();
            TransportError::Closed
        })
    }
}

async fn run_worker(
    client: reqwest::Client,
    mut rx: mpsc::UnboundedReceiver<Job>,
    pending: Arc<Pending>,
) {
    while let Some(job) = rx.recv().await {
        let event_id = job.packet.event_id.clone();
        match deliver(&client, job).await {
            Ok(()) => debug!(event_id = %event_id, "Crash report delivered"),
            Err(e) => warn!(event_id = %event_id, error = %e, "Failed to deliver crash report"),
        }
        pending.done();
    }
}

async fn deliver(client: &reqwest::Client, job: Job) -> Result<(), TransportError> {
    let body = serde_json::to_vec(&job.packet)?;
    client
        .post(&job.url)
        .header("X-Sentry-Auth", job.auth_header)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::CapturedPanic;
    use crate::tags::Tags;

    fn packet(message: &str) -> DiagnosticPacket {
        let panic = CapturedPanic {
            message: message.to_string(),
            location: None,
            backtrace: None,
        };
        DiagnosticPacket::build(&panic, Tags::new(), "<redacted>".to_string())
    }

    #[test]
    fn test_recording_transport_keeps_order() {
        let transport = RecordingTransport::new();
        assert!(transport.is_empty());

        transport.send("u", "a", packet("first")).unwrap();
        transport.send("u", "a", packet("second")).unwrap();

        let messages: Vec<_> = transport.packets().into_iter().map(|p| p.message).collect();
        assert_eq!(messages, ["first", "second"]);
    }

    #[test]
    fn test_recording_transport_clones_share_storage() {
        let transport = RecordingTransport::new();
        let handle = transport.clone();
        transport.send("u", "a", packet("boom")).unwrap();
        assert_eq!(handle.len(), 1);
    }

    #[test]
    fn test_pending_flush_times_out() {
        let pending = Pending::default();
        pending.add();
        assert!(!pending.wait_idle(Duration::from_millis(10)));
        pending.done();
        assert!(pending.wait_idle(Duration::from_millis(10)));
    }

    #[test]
    fn test_live_transport_flush_when_idle() {
        let transport = LiveTransport::new(Duration::from_secs(1)).unwrap();
        assert!(transport.flush(Duration::from_millis(10)));
    }
}
