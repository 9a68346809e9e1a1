//! Running ChimeraX scripts.
//!
//! Measurements are delegated to ChimeraX: a `.cxc` script is written to a
//! uniquely named temporary file, run headless, and the textual log on stdout
//! is handed back for parsing. [`StructureTool`] is the seam that lets the
//! measurement code run against canned output.

use crate::error::{RecordFailure, RecordOutcome};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, trace};

/// Captured output of one tool run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Both streams, for diagnostics when the output cannot be parsed.
    pub fn transcript(&self) -> String {
        format!("{}\n{}", self.stdout.trim(), self.stderr.trim())
    }
}

/// Something that executes a ChimeraX command script.
pub trait StructureTool: Sync {
    fn run_script(&self, script: &str) -> RecordOutcome<ToolOutput>;
}

/// The ChimeraX executable, run as `<exe> --nogui <script>`.
#[derive(Debug, Clone)]
pub struct ChimeraX {
    pub executable: PathBuf,
}

impl ChimeraX {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl StructureTool for ChimeraX {
    fn run_script(&self, script: &str) -> RecordOutcome<ToolOutput> {
        let mut script_file = tempfile::Builder::new()
            .prefix("pulldown_")
            .suffix("_script.temp.cxc")
            .tempfile()
            .map_err(|e| RecordFailure::new(format!("cannot create script file: {e}")))?;
        script_file
            .write_all(script.as_bytes())
            .and_then(|_| script_file.flush())
            .map_err(|e| RecordFailure::new(format!("cannot write script file: {e}")))?;
        trace!("Running {}:\n{script}", script_file.path().display());

        let output = Command::new(&self.executable)
            .arg("--nogui")
            .arg(script_file.path())
            .output()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    RecordFailure::new(format!(
                        "ChimeraX executable '{}' was not found",
                        self.executable.display()
                    ))
                } else {
                    RecordFailure::new(format!(
                        "could not run '{}': {e}",
                        self.executable.display()
                    ))
                }
            })?;
        if !output.status.success() {
            debug!("ChimeraX exited with {}", output.status);
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| RecordFailure::new("ChimeraX output is not valid UTF-8"))?;
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Ok(ToolOutput { stdout, stderr })
    }
}

/// Count reported by a ChimeraX log line, where `No` means zero.
pub(crate) fn parse_count(token: &str) -> Option<i64> {
    if token == "No" {
        Some(0)
    } else {
        token.parse().ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays a fixed transcript and remembers the scripts it was given.
    pub(crate) struct CannedTool {
        pub stdout: String,
        pub scripts: Mutex<Vec<String>>,
    }

    impl CannedTool {
        pub(crate) fn new(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                scripts: Mutex::new(Vec::new()),
            }
        }
    }

    impl StructureTool for CannedTool {
        fn run_script(&self, script: &str) -> RecordOutcome<ToolOutput> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(ToolOutput {
                stdout: self.stdout.clone(),
                stderr: String::new(),
            })
        }
    }

    #[test]
    fn counts_accept_no() {
        assert_eq!(parse_count("No"), Some(0));
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("many"), None);
    }

    #[test]
    fn missing_executable_is_a_record_failure() {
        let tool = ChimeraX::new("/nonexistent/bin/chimerax");
        let failure = tool.run_script("exit\n").unwrap_err();
        assert!(failure.reason.contains("not found"), "{failure}");
    }
}
