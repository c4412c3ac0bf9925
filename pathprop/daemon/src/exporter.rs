//! Report exporters

use crate::types::PropagationReport;
use anyhow::{Context, Result};
use std::{fs::File, io::Write, path::PathBuf};

/// Trait for report exporters
pub trait ReportExporter {
    /// Export the report
    ///
    /// # Arguments
    ///
    /// * `report` - Report of one run
    fn export(&self, report: &PropagationReport) -> Result<()>;
}

/// JSON exporter
pub struct JsonExporter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    /// Create a new JSON exporter
    ///
    /// # Arguments
    ///
    /// * `output_path` - Path to output file
    /// * `pretty` - Enable pretty-printing
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, report: &PropagationReport) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        let mut file = File::create(&self.output_path)
            .with_context(|| format!("Failed to create output file: {:?}", self.output_path))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write to output file: {:?}", self.output_path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn create_test_report() -> PropagationReport {
        PropagationReport {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            duration_seconds: 60,
            pod: "pod0b7e".to_string(),
            protocol: Protocol::Grpc,
            service_id: Some(3),
            correlations: CorrelationStats::default(),
            path_cache: Some(PathCacheStats::from_snapshot(
                0,
                1,
                vec![(0xb10a_196c_b2d8_32b6, TracePath::first_hop(3))],
            )),
        }
    }

    #[test]
    fn test_json_export_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        JsonExporter::new(path.clone(), true)
            .export(&create_test_report())
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: PropagationReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.pod, "pod0b7e");
        assert_eq!(parsed.protocol, Protocol::Grpc);
        let cache = parsed.path_cache.unwrap();
        assert_eq!(cache.paths[0].trace_id, "b10a196cb2d832b6");
        assert_eq!(cache.paths[0].hops, vec![3]);
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");

        let err = JsonExporter::new(path, false)
            .export(&create_test_report())
            .unwrap_err();
        assert!(err.to_string().contains("Failed to create output file"));
    }
}
