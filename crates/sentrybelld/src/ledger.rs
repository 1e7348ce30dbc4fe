//! Append-only attendance CSV ledger.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "Name,Time\n";

/// `(name, time-of-day)` rows appended once per record-cooldown window.
/// Rows are never mutated or removed by this subsystem.
pub struct AttendanceLedger {
    path: PathBuf,
}

impl AttendanceLedger {
    /// Open the ledger, creating it with a header row if absent.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            std::fs::write(path, HEADER)?;
            tracing::info!(path = %path.display(), "attendance ledger created");
        }
        Ok(Self { path: path.to_path_buf() })
    }

    /// Append one `name,HH:MM:SS` row.
    pub fn append(&mut self, name: &str, time_of_day: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{name},{time_of_day}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Attendance.csv");

        AttendanceLedger::open(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Time\n");

        // Reopening must not truncate or duplicate the header.
        let mut ledger = AttendanceLedger::open(&path).unwrap();
        ledger.append("ALICE", "10:15:00").unwrap();
        AttendanceLedger::open(&path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Name,Time\nALICE,10:15:00\n"
        );
    }

    #[test]
    fn test_appends_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Attendance.csv");
        let mut ledger = AttendanceLedger::open(&path).unwrap();
        ledger.append("ALICE", "10:15:00").unwrap();
        ledger.append("BOB", "10:16:30").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Name,Time\nALICE,10:15:00\nBOB,10:16:30\n"
        );
    }
}
