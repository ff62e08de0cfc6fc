//! Assignment CSV writing.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ruststrip_core::{Edge, Event};

use crate::error::Result;

/// Writes per-strip group assignments as CSV.
///
/// One row per assigned group id:
/// `event,strip,sample_time,group_id,integral,center,sigma`. The sample
/// time is the strip's first calibrated leading sample and stays empty for
/// strips without one; the fit columns stay empty for ids without recorded
/// parameters (sentinels, or grouping configured not to record them).
pub struct AssignmentWriter {
    writer: BufWriter<File>,
}

impl AssignmentWriter {
    /// Creates the file and writes the header row.
    ///
    /// # Errors
    /// Returns an error when the file cannot be created or written.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "event,strip,sample_time,group_id,integral,center,sigma")?;
        Ok(Self { writer })
    }

    /// Appends every assignment of one event.
    ///
    /// # Errors
    /// Returns an error when a row cannot be written.
    pub fn write_event(&mut self, index: usize, event: &Event) -> Result<()> {
        for hit in event.hits() {
            let strip = hit.strip_id();
            let infos = hit.group_info();
            for (position, id) in hit.group_ids().iter().enumerate() {
                write!(self.writer, "{index},{strip},")?;
                if let Some(time) = hit.calibrated_times(Edge::Leading).first() {
                    write!(self.writer, "{time}")?;
                }
                write!(self.writer, ",{id}")?;
                match infos.get(position) {
                    Some(info) => writeln!(
                        self.writer,
                        ",{},{},{}",
                        info.integral, info.center, info.sigma
                    )?,
                    None => writeln!(self.writer, ",,,")?,
                }
            }
        }
        Ok(())
    }

    /// Flushes buffered rows to disk.
    ///
    /// # Errors
    /// Returns an error when the flush fails.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruststrip_core::{GroupInfo, NoCalibration, Side, StripId};
    use tempfile::NamedTempFile;

    fn strip(n: u8) -> StripId {
        StripId::new(0, 0, 0, 1, Side::X, n)
    }

    #[test]
    fn test_rows_pair_ids_with_their_fit_parameters() {
        let mut event = Event::new();
        let a = strip(4);
        event.add_tdc(a.tdc_id(), -254.5, Edge::Leading);
        event.add_hit(a, &NoCalibration);
        event.push_group_id(&a, 0);
        event.push_group_info(&a, GroupInfo::new(5.0, -255.0, 1.5));
        event.push_group_id(&a, -1);

        let file = NamedTempFile::new().unwrap();
        let mut writer = AssignmentWriter::create(file.path()).unwrap();
        writer.write_event(3, &event).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "event,strip,sample_time,group_id,integral,center,sigma"
        );
        assert_eq!(lines[1], "3,m0_r0_c0_l1_x_s4,-254.5,0,5,-255,1.5");
        assert_eq!(lines[2], "3,m0_r0_c0_l1_x_s4,-254.5,-1,,,");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_sampleless_hits_leave_the_time_empty() {
        let mut event = Event::new();
        let a = strip(9);
        event.add_hit(a, &NoCalibration);
        event.push_group_id(&a, -1);

        let file = NamedTempFile::new().unwrap();
        let mut writer = AssignmentWriter::create(file.path()).unwrap();
        writer.write_event(0, &event).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("0,m0_r0_c0_l1_x_s9,,-1,,,"));
    }

    #[test]
    fn test_unassigned_hits_write_nothing() {
        let mut event = Event::new();
        event.add_hit(strip(2), &NoCalibration);

        let file = NamedTempFile::new().unwrap();
        let mut writer = AssignmentWriter::create(file.path()).unwrap();
        writer.write_event(0, &event).unwrap();
        writer.finish().unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
