// JSONL exchange log for reasoning-service calls
use serde::{Serialize, Serializer};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

#[derive(Serialize)]
struct ExchangeEntry<'a, I, O>
where
    I: Serialize,
    O: Serialize,
{
    phase: &'a str,
    #[serde(serialize_with = "serialize_as_json")]
    input: &'a I,
    #[serde(serialize_with = "serialize_as_json")]
    output: &'a O,
    latency_ms: u64,
    timestamp: i64,
}

fn serialize_as_json<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    let json_string = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&json_string)
}

/// Appends one JSON line per arbitration exchange to a file.
///
/// Opening failures are logged and turn the logger into a no-op; an exchange
/// log must never break classification.
pub struct HeuristicLogger {
    writer: Option<Arc<Mutex<BufWriter<File>>>>,
}

impl HeuristicLogger {
    pub fn new(log_file: Option<PathBuf>) -> Self {
        let writer = log_file.and_then(|path| {
            match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => Some(Arc::new(Mutex::new(BufWriter::new(file)))),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to open heuristic log file");
                    None
                }
            }
        });

        Self { writer }
    }

    pub fn disabled() -> Self {
        Self { writer: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn log_phase<I, O>(&self, phase: &str, input: &I, output: &O, latency_ms: u64)
    where
        I: Serialize,
        O: Serialize,
    {
        let Some(writer) = &self.writer else {
            return;
        };

        let entry = ExchangeEntry {
            phase,
            input,
            output,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        };

        if let Ok(mut writer) = writer.lock() {
            match serde_json::to_string(&entry) {
                Ok(json) => {
                    if let Err(e) = writeln!(writer, "{}", json) {
                        warn!(error = %e, "Failed to write heuristic log entry");
                    }
                    if let Err(e) = writer.flush() {
                        warn!(error = %e, "Failed to flush heuristic log");
                    }
                }
                Err(e) => {
                    warn!(phase, error = %e, "Failed to serialize heuristic entry");
                }
            }
        }

        debug!(phase, latency_ms, "Heuristic log entry written");
    }
}

impl Default for HeuristicLogger {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let logger = HeuristicLogger::disabled();
        assert!(!logger.is_enabled());
        logger.log_phase("arbitration", &"in", &"out", 5);
    }

    #[test]
    fn test_logger_appends_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exchanges.jsonl");
        let logger = HeuristicLogger::new(Some(path.clone()));
        assert!(logger.is_enabled());

        logger.log_phase("arbitration", &serde_json::json!({"q": 1}), &"answer", 42);
        logger.log_phase("arbitration", &"second", &"answer", 7);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["phase"], "arbitration");
        assert_eq!(first["latency_ms"], 42);
        assert_eq!(first["input"], "{\"q\":1}");
    }

    #[test]
    fn test_unwritable_path_disables_logger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("log.jsonl");
        let logger = HeuristicLogger::new(Some(path));
        assert!(!logger.is_enabled());
    }
}
