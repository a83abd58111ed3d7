use super::ExperimentTracker;
use crate::error::Result;
use crate::ml::{save_artifact, ModelArtifact};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default, Serialize)]
struct RunRecord {
    /// `None` is written as JSON null for undefined metrics
    metrics: BTreeMap<String, Option<f64>>,
    params: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct RunInfo<'a> {
    run_id: &'a str,
    experiment: &'a str,
    started_at: DateTime<Utc>,
}

/// Tracker writing each run to `<dir>/<experiment>/<run_id>/`
pub struct FileTracker {
    run_id: String,
    run_dir: PathBuf,
    record: Mutex<RunRecord>,
}

impl FileTracker {
    /// Start a new run under `dir/experiment`
    pub fn new(dir: &Path, experiment: &str) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = dir.join(experiment).join(&run_id);
        std::fs::create_dir_all(run_dir.join("models"))?;

        let info = RunInfo {
            run_id: &run_id,
            experiment,
            started_at: Utc::now(),
        };
        std::fs::write(run_dir.join("run.json"), serde_json::to_vec_pretty(&info)?)?;

        info!(run_id = %run_id, run_dir = %run_dir.display(), "Started tracking run");

        Ok(Self {
            run_id,
            run_dir,
            record: Mutex::new(RunRecord::default()),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        std::fs::write(self.run_dir.join(file), serde_json::to_vec_pretty(value)?)?;
        Ok(())
    }
}

impl ExperimentTracker for FileTracker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn log_metric(&self, name: &str, value: f64) -> Result<()> {
        let mut record = self.record.lock();
        record
            .metrics
            .insert(name.to_string(), value.is_finite().then_some(value));
        self.write_json("metrics.json", &record.metrics)
    }

    fn log_param(&self, name: &str, value: &str) -> Result<()> {
        let mut record = self.record.lock();
        record.params.insert(name.to_string(), value.to_string());
        self.write_json("params.json", &record.params)
    }

    fn log_model(&self, name: &str, artifact: &ModelArtifact) -> Result<()> {
        let path = self.run_dir.join("models").join(format!("{}.bin", name));
        save_artifact(&path, artifact)?;
        debug!(run_id = %self.run_id, model = name, "Logged model");
        Ok(())
    }
}

/// Tracker keeping everything in memory
#[derive(Default)]
pub struct InMemoryTracker {
    run_id: String,
    metrics: Mutex<Vec<(String, f64)>>,
    params: Mutex<BTreeMap<String, String>>,
    models: Mutex<Vec<(String, ModelArtifact)>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    /// Last value logged for `name`
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics
            .lock()
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.params.lock().get(name).cloned()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.lock().iter().map(|(n, _)| n.clone()).collect()
    }
}

impl ExperimentTracker for InMemoryTracker {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn log_metric(&self, name: &str, value: f64) -> Result<()> {
        self.metrics.lock().push((name.to_string(), value));
        Ok(())
    }

    fn log_param(&self, name: &str, value: &str) -> Result<()> {
        self.params.lock().insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn log_model(&self, name: &str, artifact: &ModelArtifact) -> Result<()> {
        self.models.lock().push((name.to_string(), artifact.clone()));
        Ok(())
    }
}

/// Tracker that drops everything, used when tracking is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn run_id(&self) -> &str {
        "untracked"
    }

    fn log_metric(&self, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }

    fn log_param(&self, _name: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    fn log_model(&self, _name: &str, _artifact: &ModelArtifact) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::artifact::tests::trained_artifact;

    #[test]
    fn test_file_tracker_writes_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = FileTracker::new(dir.path(), "credit-risk").unwrap();

        tracker.log_metric("LogisticRegression_f1", 0.8).unwrap();
        tracker.log_metric("LogisticRegression_roc_auc", f64::NAN).unwrap();
        tracker.log_param("selected_model", "LogisticRegression").unwrap();
        tracker.log_model("LogisticRegression", &trained_artifact([0, 1, 2])).unwrap();

        let run_dir = dir.path().join("credit-risk").join(tracker.run_id());
        assert_eq!(tracker.run_dir(), run_dir.as_path());
        assert!(run_dir.join("run.json").exists());
        assert!(run_dir.join("models/LogisticRegression.bin").exists());

        let metrics: serde_json::Value =
            serde_json::from_slice(&std::fs::read(run_dir.join("metrics.json")).unwrap()).unwrap();
        assert_eq!(metrics["LogisticRegression_f1"], 0.8);
        assert!(metrics["LogisticRegression_roc_auc"].is_null());

        let params: serde_json::Value =
            serde_json::from_slice(&std::fs::read(run_dir.join("params.json")).unwrap()).unwrap();
        assert_eq!(params["selected_model"], "LogisticRegression");
    }

    #[test]
    fn test_in_memory_tracker() {
        let tracker = InMemoryTracker::new();
        assert!(!tracker.run_id().is_empty());

        tracker.log_metric("a", 1.0).unwrap();
        tracker.log_metric("a", 2.0).unwrap();
        tracker.log_param("p", "v").unwrap();

        assert_eq!(tracker.metric("a"), Some(2.0));
        assert_eq!(tracker.metric("b"), None);
        assert_eq!(tracker.param("p").as_deref(), Some("v"));
        assert!(tracker.model_names().is_empty());
    }

    #[test]
    fn test_noop_tracker() {
        let tracker = NoopTracker;
        assert!(tracker.log_metric("x", 1.0).is_ok());
        assert_eq!(tracker.run_id(), "untracked");
    }
}
