//! Emission sinks - where generated trip requests go
//!
//! The generator hands each request to a `TripSink` by value. Sinks must not
//! block indefinitely; a sink that cannot accept a request returns an
//! `EmissionError`, which halts the generation run.

use crate::domain::trip::TripRequest;
use crate::infra::config::{Config, OutputFormat};
use crate::io::egress::JsonlFileSink;
use chrono::NaiveDateTime;
use std::io::{self, Write};
use thiserror::Error;

/// Why a sink rejected a request
#[derive(Debug, Error)]
pub enum EmissionFailure {
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
    #[error("channel full")]
    ChannelFull,
    #[error("channel closed")]
    ChannelClosed,
}

/// A sink failed to accept a trip request.
///
/// Carries the attempted request id and its generation timestamp so the
/// failure can be correlated with logs.
#[derive(Debug, Error)]
#[error("failed to emit {request_id} (generated {timestamp}): {cause}")]
pub struct EmissionError {
    pub request_id: String,
    pub timestamp: NaiveDateTime,
    #[source]
    pub cause: EmissionFailure,
}

impl EmissionError {
    pub fn new(request: &TripRequest, cause: impl Into<EmissionFailure>) -> Self {
        Self { request_id: request.id.clone(), timestamp: request.timestamp, cause: cause.into() }
    }
}

/// Consumer of generated trip requests
pub trait TripSink: Send {
    /// Take ownership of one request
    fn emit(&mut self, request: TripRequest) -> Result<(), EmissionError>;
}

/// Writes one line per request to stdout (or any writer)
pub struct ConsoleSink {
    format: OutputFormat,
    out: Box<dyn Write + Send>,
}

impl ConsoleSink {
    pub fn stdout(format: OutputFormat) -> Self {
        Self::with_writer(format, Box::new(io::stdout()))
    }

    pub fn with_writer(format: OutputFormat, out: Box<dyn Write + Send>) -> Self {
        Self { format, out }
    }

    /// Render a request as a single line (no trailing newline)
    pub fn render(format: OutputFormat, request: &TripRequest) -> Result<String, EmissionFailure> {
        match format {
            OutputFormat::Json => Ok(request.to_json()?),
            OutputFormat::Summary => Ok(request.summary()),
        }
    }
}

impl TripSink for ConsoleSink {
    fn emit(&mut self, request: TripRequest) -> Result<(), EmissionError> {
        let line = Self::render(self.format, &request).map_err(|e| EmissionError::new(&request, e))?;
        writeln!(self.out, "{}", line)
            .and_then(|_| self.out.flush())
            .map_err(|e| EmissionError::new(&request, e))
    }
}

/// Sink selected by config: the JSONL file when `output_file` is set,
/// otherwise stdout in the configured format
pub fn build_sink(config: &Config) -> io::Result<Box<dyn TripSink>> {
    match config.output_file() {
        Some(path) => Ok(Box::new(JsonlFileSink::open(path)?)),
        None => Ok(Box::new(ConsoleSink::stdout(config.output_format()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trip::TripPurpose;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};

    /// Writer that appends into a shared buffer
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn request() -> TripRequest {
        TripRequest {
            id: "trip_20240101_120000_5555".to_string(),
            origin_stop_id: "stop_001".to_string(),
            destination_stop_id: "stop_003".to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap(),
            passenger_count: 3,
            trip_purpose: TripPurpose::Medical,
            priority: 2,
        }
    }

    #[test]
    fn test_console_json_line() {
        let buf = SharedBuf::default();
        let mut sink = ConsoleSink::with_writer(OutputFormat::Json, Box::new(buf.clone()));
        sink.emit(request()).unwrap();

        let out = buf.contents();
        assert!(out.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(parsed["id"], "trip_20240101_120000_5555");
        assert_eq!(parsed["trip_purpose"], "medical");
    }

    #[test]
    fn test_console_summary_line() {
        let buf = SharedBuf::default();
        let mut sink = ConsoleSink::with_writer(OutputFormat::Summary, Box::new(buf.clone()));
        sink.emit(request()).unwrap();
        assert_eq!(buf.contents(), "Generated trip: trip_20240101_120000_5555\n");
    }

    #[test]
    fn test_write_failure_carries_request_context() {
        let mut sink = ConsoleSink::with_writer(OutputFormat::Json, Box::new(BrokenPipe));
        let err = sink.emit(request()).unwrap_err();
        assert_eq!(err.request_id, "trip_20240101_120000_5555");
        assert_eq!(err.timestamp, request().timestamp);
        assert!(matches!(err.cause, EmissionFailure::Io(_)));
        assert!(err.to_string().contains("trip_20240101_120000_5555"));
        assert!(err.to_string().contains("2024-01-01 12:00:00"));
    }
}
