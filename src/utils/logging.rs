//! Optional plain-text transcript of prompts and replies.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct LoggingState {
    file_path: Option<PathBuf>,
}

impl LoggingState {
    /// Fails if `log_file` cannot be opened for appending.
    pub fn new(log_file: Option<PathBuf>) -> io::Result<Self> {
        if let Some(path) = &log_file {
            Self::test_file_access(path)?;
        }
        Ok(LoggingState {
            file_path: log_file,
        })
    }

    pub fn is_active(&self) -> bool {
        self.file_path.is_some()
    }

    /// Append a prompt/reply pair; the prompt lines are prefixed with `## `.
    pub fn log_exchange(&self, tool: &str, prompt: &str, reply: &str) -> io::Result<()> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        writeln!(writer, "## [{tool}]")?;
        for line in prompt.lines() {
            writeln!(writer, "## {line}")?;
        }
        writeln!(writer)?;

        for line in reply.lines() {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;

        writer.flush()
    }

    fn test_file_access(path: &Path) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.flush()
    }
}
