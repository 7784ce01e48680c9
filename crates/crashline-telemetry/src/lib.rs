//! Crashline Telemetry - Last-resort panic reporting
//!
//! Provides:
//! - `recover_and_report` / `recover_and_report_async` / `report_panics`:
//!   recovery points that report a panic and let it continue unwinding
//! - `CrashReporter`: process-wide reporter state (enablement, endpoint,
//!   transport, reporting context)
//! - `Transport`: pluggable delivery, with `LiveTransport` (HTTP) and
//!   `RecordingTransport` (in-memory, for tests)
//! - `DiagnosticPacket`: the redacted, tagged report
//! - `Redactor`: PII stripping for reports

pub mod context;
pub mod endpoint;
pub mod error;
pub mod os_info;
pub mod packet;
pub mod redact;
pub mod reporter;
pub mod tags;
pub mod transport;

pub use context::{ContextSnapshot, ReportingContext, ServerFacts};
pub use endpoint::Endpoint;
pub use error::{ReportError, TransportError};
pub use packet::{CapturedPanic, DiagnosticPacket};
pub use redact::{redact_identity, Redactor, REDACTED};
pub use reporter::{
    apply_config, configure, install_panic_hook, recover_and_report, recover_and_report_async,
    register_server_identity, report_panics, set_connection_count, set_enabled, set_store_count,
    setup_reporter, testing_set_enabled, testing_set_endpoint, testing_set_transport,
    CrashReportConfig, CrashReporter, FlushGuard, PanicGuard, ReportOutcome, ScopedOverride,
};
pub use tags::{Tag, Tags};
pub use transport::{LiveTransport, RecordingTransport, Transport};
