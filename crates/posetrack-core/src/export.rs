//! Series export
//!
//! Writes the retained chart window to CSV for offline inspection.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::window::{Channel, PoseSeries};

/// Write the series to a CSV file, one row per retained point
pub fn write_csv<P: AsRef<Path>>(path: P, series: &PoseSeries) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_csv_to(&mut writer, series)?;
    writer.flush()
}

/// Write the series as CSV to any writer
pub fn write_csv_to<W: Write>(writer: &mut W, series: &PoseSeries) -> io::Result<()> {
    // Header
    write!(writer, "index")?;
    for channel in Channel::ALL {
        write!(writer, ",{}", channel.wire_name())?;
    }
    writeln!(writer)?;

    // Absolute sample index of the oldest retained point
    let first_index = series.samples_seen() - series.len() as u64;
    let columns: Vec<Vec<f64>> = Channel::ALL
        .iter()
        .map(|c| series.channel(*c).to_vec())
        .collect();

    for row in 0..series.len() {
        write!(writer, "{}", first_index + row as u64)?;
        for column in &columns {
            write!(writer, ",{:.6}", column[row])?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PoseSample, Stage};
    use pretty_assertions::assert_eq;

    fn sample(i: u32) -> PoseSample {
        let v = i as f64 / 10.0;
        PoseSample {
            angle: 90.0,
            reps: i,
            stage: Stage::Down,
            shoulder_x: v,
            shoulder_y: v,
            elbow_x: v,
            elbow_y: v,
            wrist_x: v,
            wrist_y: v,
        }
    }

    #[test]
    fn test_csv_rows_follow_window() {
        let mut series = PoseSeries::new(2);
        for i in 0..3 {
            series = series.append(&sample(i));
        }

        let mut out = Vec::new();
        write_csv_to(&mut out, &series).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            "index,shoulderX,shoulderY,elbowX,elbowY,wristX,wristY"
        );
        assert_eq!(
            lines[1],
            "1,0.100000,0.100000,0.100000,0.100000,0.100000,0.100000"
        );
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        write_csv(&path, &PoseSeries::default()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
