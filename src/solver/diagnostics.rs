//! Per-update diagnostics files.
//!
//! - `log.txt`: one row of rejection counters plus the graph error
//! - `error.txt`: one row of consistency errors
//!
//! Each append opens, writes and closes the file so a crash loses at most
//! the row being written.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::outlier::RejectionStats;

/// Counter log file name.
pub const LOG_FILE: &str = "log.txt";

/// Consistency error file name.
pub const ERROR_FILE: &str = "error.txt";

const LOG_HEADER: &str = "#lc #good-lc #odom-consistent-lc #multirobot-lc #good-multirobot-lc \
                          #ldmrk-measurements #good-ldmrk-measurements #error";
const ERROR_HEADER: &str = "#consistency-error";

/// Diagnostics output directory.
#[derive(Debug, Clone)]
pub struct DiagnosticsLog {
    dir: PathBuf,
}

impl DiagnosticsLog {
    /// Create (or truncate) both files in `dir` and write their headers.
    pub fn create(dir: &Path) -> Result<Self> {
        write_header(&dir.join(LOG_FILE), LOG_HEADER)?;
        write_header(&dir.join(ERROR_FILE), ERROR_HEADER)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one row to each file.
    pub fn append(&self, stats: &RejectionStats, error: f64) -> Result<()> {
        append_line(&self.dir.join(LOG_FILE), &stats.log_row(error))?;
        append_line(&self.dir.join(ERROR_FILE), &stats.error_row())?;
        Ok(())
    }
}

fn write_header(path: &Path, header: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "{}", header)?;
    writer.flush()
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", line)?;
    writer.flush()
}
