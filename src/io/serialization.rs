// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Annotation snapshot and measurement table serialization.
//!
//! Snapshots are written as pretty-printed JSON; measurements as CSV with
//! the columns `spine_name,image_idx,length_pixels,length_microns,stable`.

use crate::error::{ExportError, SnapshotError};
use crate::models::measurement::MeasurementRow;
use crate::models::project::AnnotationSnapshot;
use std::io::Write;
use std::path::Path;

/// CSV header of the measurement table.
pub const MEASUREMENT_COLUMNS: [&str; 5] = [
    "spine_name",
    "image_idx",
    "length_pixels",
    "length_microns",
    "stable",
];

/// Export an annotation snapshot to JSON.
pub fn save_snapshot(snapshot: &AnnotationSnapshot, path: &Path) -> Result<(), SnapshotError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Import an annotation snapshot from JSON.
pub fn load_snapshot(path: &Path) -> Result<AnnotationSnapshot, SnapshotError> {
    let json = std::fs::read_to_string(path)?;
    let snapshot = serde_json::from_str(&json)?;
    Ok(snapshot)
}

/// Write measurement rows as CSV.
pub fn write_measurements<W: Write>(rows: &[MeasurementRow], mut out: W) -> std::io::Result<()> {
    writeln!(out, "{}", MEASUREMENT_COLUMNS.join(","))?;
    for row in rows {
        writeln!(
            out,
            "{},{},{},{},{}",
            csv_field(&row.spine_name),
            row.image_idx,
            row.length_pixels,
            row.length_microns,
            if row.stable { "True" } else { "False" }
        )?;
    }
    out.flush()
}

/// Export measurement rows to a CSV file.
pub fn export_measurements(rows: &[MeasurementRow], path: &Path) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_measurements(rows, std::io::BufWriter::new(file))?;
    Ok(())
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::annotation::Bbox;
    use crate::models::store::AnnotationStore;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_file_roundtrip() {
        let mut store = AnnotationStore::default();
        store.set_box("spine_1", 0, Bbox::new(10, 10, 50, 50), 100, 100);
        store.set_box("spine_2", 2, Bbox::new(1, 2, 3, 4), 100, 100);
        let snapshot = AnnotationSnapshot::capture(store.state(), vec!["a.tif".into(), "b.tif".into()]);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("annotations.json");
        save_snapshot(&snapshot, &path).unwrap();
        assert_eq!(load_snapshot(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_reads_string_keyed_layout() {
        let json = r#"{
  "spine_annotations": {"spine_1": {"0": [10, 10, 50, 50], "2": [5, 5, 9, 9]}},
  "spine_colors": {"spine_1": "red"},
  "color_index": 1,
  "image_paths": ["/data/t0.tif", "/data/t1.tif", "/data/t2.tif"]
}"#;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("old.json");
        std::fs::write(&path, json).unwrap();
        let snap = load_snapshot(&path).unwrap();
        let state = snap.to_state(3).unwrap();
        assert_eq!(state.boxes["spine_1"][&2], Bbox::new(5, 5, 9, 9));
        assert_eq!(state.color_index, 1);
    }

    #[test]
    fn test_missing_image_paths_defaults_to_empty() {
        let json = r#"{"spine_annotations": {}, "spine_colors": {}, "color_index": 0}"#;
        let snap: AnnotationSnapshot = serde_json::from_str(json).unwrap();
        assert!(snap.image_paths.is_empty());
    }

    #[test]
    fn test_malformed_snapshot_is_json_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_snapshot(&path), Err(SnapshotError::Json(_))));
        assert!(matches!(
            load_snapshot(&dir.path().join("missing.json")),
            Err(SnapshotError::Io(_))
        ));
    }

    #[test]
    fn test_csv_layout() {
        let mut store = AnnotationStore::default();
        store.set_box("spine_1", 0, Bbox::new(0, 0, 3, 4), 100, 100);
        store.set_box("a,b", 1, Bbox::new(0, 0, 60, 80), 100, 100);
        let mut out = Vec::new();
        write_measurements(store.measurements().rows(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "spine_name,image_idx,length_pixels,length_microns,stable");
        assert!(lines[1].starts_with("spine_1,0,5,"));
        assert!(lines[1].ends_with(",True"));
        assert!(lines[2].starts_with("\"a,b\",1,100,"));
        assert!(lines[2].ends_with(",False"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_writes_file() {
        let mut store = AnnotationStore::default();
        store.set_box("s", 0, Bbox::new(0, 0, 3, 4), 10, 10);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("measurements.csv");
        export_measurements(store.measurements().rows(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
