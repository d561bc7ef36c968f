//! Trip egress - appends generated trip requests to a file
//!
//! Requests are written in JSONL format (one JSON object per line) to the
//! file named by `streaming.output_file`.

use crate::domain::trip::TripRequest;
use crate::io::sink::{EmissionError, TripSink};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// JSONL file sink
pub struct JsonlFileSink {
    file_path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl JsonlFileSink {
    /// Open (or create) the file in append mode, creating parent directories
    pub fn open<P: AsRef<Path>>(file_path: P) -> std::io::Result<Self> {
        let path = file_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(file_path = %path.display(), "egress_initialized");

        Ok(Self { file_path: path.to_path_buf(), writer: BufWriter::new(file), written: 0 })
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Requests written since the sink was opened
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl TripSink for JsonlFileSink {
    fn emit(&mut self, request: TripRequest) -> Result<(), EmissionError> {
        let json = request.to_json().map_err(|e| EmissionError::new(&request, e))?;

        // Flush per line so a halted run leaves only complete records behind
        let result = writeln!(self.writer, "{}", json).and_then(|_| self.writer.flush());
        match result {
            Ok(()) => {
                self.written += 1;
                debug!(file = %self.file_path.display(), id = %request.id, bytes = %json.len(), "egress_written");
                Ok(())
            }
            Err(e) => {
                error!(id = %request.id, error = %e, "trip_egress_failed");
                Err(EmissionError::new(&request, e))
            }
        }
    }
}
