//! Tab separated pose logs (`x\ty\tangle` per row)

use crate::core::types::Pose;
use crate::error::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct PoseLog {
    writer: BufWriter<File>,
}

impl PoseLog {
    /// Create (or truncate) the log and write the header
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "x\ty\tangle")?;
        Ok(Self { writer })
    }

    pub fn append(&mut self, pose: &Pose) -> Result<()> {
        writeln!(
            self.writer,
            "{}\t{}\t{}",
            pose.location.x, pose.location.y, pose.heading
        )?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for PoseLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("epuck/trace.txt");
        {
            let mut log = PoseLog::create(&path).unwrap();
            log.append(&Pose::new(84, 90, -45.0)).unwrap();
        }
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "x\ty\tangle\n84\t90\t-45\n");
    }
}
