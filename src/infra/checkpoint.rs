// ============================================================
// Layer 6 — Checkpoints
// ============================================================
// Two directories, two roles:
//
//   PretrainedSnapshot  <model_root>/<model_size>/
//     config.json       — BertConfig (HuggingFace key names)
//     tokenizer.json    — WordPiece tokenizer
//     bert.mpk          — CompactRecorder record of the encoder
//
//   CheckpointManager   <output_dir>/
//     train_config.json — the run's TrainConfig
//     model_best.mpk    — weights of the best-scoring epoch
//
// Only the encoder comes from the snapshot; the classification head
// is initialised fresh for every task.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::{BertConfig, BertForSequenceClassification, BertModelRecord};

const CONFIG_FILE:    &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const BACKBONE_FILE:  &str = "bert";
const BEST_MODEL:     &str = "model_best";

// ─── Pretrained Snapshot ──────────────────────────────────────────────────────

/// A pretrained encoder selected by model size, e.g. `bert-base-uncased`
pub struct PretrainedSnapshot {
    dir: PathBuf,
}

impl PretrainedSnapshot {
    pub fn new(model_root: impl AsRef<Path>, model_size: &str) -> Self {
        Self { dir: model_root.as_ref().join(model_size) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn load_config(&self) -> Result<BertConfig> {
        let path = self.dir.join(CONFIG_FILE);
        BertConfig::load(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load model config '{}': {e:?}", path.display()))
    }

    /// Replace the encoder of `model` with the snapshot's weights
    pub fn load_backbone<B: Backend>(
        &self,
        mut model: BertForSequenceClassification<B>,
        device:    &B::Device,
    ) -> Result<BertForSequenceClassification<B>> {
        let path = self.dir.join(BACKBONE_FILE);

        let record: BertModelRecord<B> = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load pretrained encoder '{}'", path.display())
            })?;

        model.bert = model.bert.load_record(record);
        tracing::info!("Loaded pretrained encoder from '{}'", path.display());
        Ok(model)
    }
}

// ─── Run Checkpoints ──────────────────────────────────────────────────────────

/// Writes the artifacts of one training run into its output directory
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite `model_best` with the given weights
    pub fn save_best<B: Backend>(&self, model: &BertForSequenceClassification<B>) -> Result<()> {
        let path = self.dir.join(BEST_MODEL);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save best model to '{}'", path.display())
            })?;

        tracing::debug!("Saved best model to '{}'", path.display());
        Ok(())
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::config::Config;

    use crate::ml::model::tests::tiny_config;

    type TestBackend = NdArray<f32>;

    fn first_query_weights(model: &BertForSequenceClassification<TestBackend>) -> Vec<f32> {
        model.bert.layers[0].query.weight.val().into_data().to_vec().unwrap()
    }

    #[test]
    fn test_snapshot_round_trip() {
        let root   = tempfile::tempdir().unwrap();
        let device = Default::default();
        let snapshot = PretrainedSnapshot::new(root.path(), "bert-tiny");
        fs::create_dir_all(snapshot.dir()).unwrap();

        let config = tiny_config();
        config.save(snapshot.dir().join(CONFIG_FILE)).unwrap();
        let pretrained = config.init_classifier::<TestBackend>(2, &device);
        CompactRecorder::new()
            .record(pretrained.bert.clone().into_record(), snapshot.dir().join(BACKBONE_FILE))
            .unwrap();

        let loaded_config = snapshot.load_config().unwrap();
        assert_eq!(loaded_config.dims(), config.dims());

        let fresh  = loaded_config.init_classifier::<TestBackend>(2, &device);
        let loaded = snapshot.load_backbone(fresh, &device).unwrap();

        // CompactRecorder stores half precision
        for (a, b) in first_query_weights(&pretrained).iter().zip(first_query_weights(&loaded)) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let snapshot = PretrainedSnapshot::new(root.path(), "bert-base-uncased");
        assert!(snapshot.load_config().is_err());
    }

    #[test]
    fn test_save_best_writes_record() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let manager = CheckpointManager::new(dir.path().join("run")).unwrap();
        let model   = tiny_config().init_classifier::<TestBackend>(2, &device);

        manager.save_best(&model).unwrap();
        assert!(manager.dir().join("model_best.mpk").exists());
    }
}
