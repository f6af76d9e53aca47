//! Isolated environment for end-to-end runs.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use optiplan::config::{load_config_from_str, Config};
use optiplan::db::Database;
use optiplan::pipeline::{ExportPipeline, PipelineConfig};
use optiplan::pricing::{ColumnAliases, DisabledOcr, OcrBackend, OcrSettings, PriceIngestPipeline};

pub struct TestHarness {
    temp_dir: TempDir,
    pub export_dir: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let export_dir = temp_dir.path().join("exports");
        std::fs::create_dir_all(&export_dir).expect("Failed to create export dir");
        let db = Database::open(&temp_dir.path().join("data").join("optiplan.db"))
            .expect("Failed to open database");

        Self {
            temp_dir,
            export_dir,
            db,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Minimal valid config pointing at this harness.
    pub fn config(&self) -> Config {
        let json = serde_json::json!({
            "version": "1.0",
            "export_directory": self.export_dir.to_string_lossy(),
            "database_path": self.temp_path().join("data").join("optiplan.db").to_string_lossy(),
            "worker_count": 2,
        });
        load_config_from_str(&json.to_string()).expect("harness config must be valid")
    }

    pub fn export_pipeline(&self) -> ExportPipeline {
        ExportPipeline::from_config(PipelineConfig::from_config(&self.config()), self.db.clone())
    }

    pub fn price_pipeline(&self) -> PriceIngestPipeline {
        self.price_pipeline_with_ocr(Arc::new(DisabledOcr))
    }

    pub fn price_pipeline_with_ocr(&self, ocr: Arc<dyn OcrBackend>) -> PriceIngestPipeline {
        PriceIngestPipeline::new(
            self.db.clone(),
            ColumnAliases::default(),
            ocr,
            OcrSettings::default(),
        )
    }

    /// Published `.xlsx` files, sorted by name. Temp files are excluded.
    pub fn exported_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.export_dir)
            .expect("Failed to read export dir")
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "xlsx"))
            .collect();
        files.sort();
        files
    }

    /// Everything in the export directory, temp files included.
    pub fn all_export_entries(&self) -> usize {
        std::fs::read_dir(&self.export_dir)
            .expect("Failed to read export dir")
            .count()
    }
}
