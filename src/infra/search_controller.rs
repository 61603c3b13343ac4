// ============================================================
// Layer 6 — Search Controller Adapters
// ============================================================
// Two ways a trial talks to the hyperparameter search:
//
//   FileSearchController — parameters come from a JSON file, scores
//                          are appended to a JSON-lines report file
//   StandaloneController — no search at all: default plan, scores
//                          only go to the log
//
// Parameter file, either form:
//   {"pt0": "multihead", "pr0": 0.4, ...}
//   {"parameter_id": 3, "parameters": {"pt0": "multihead", ...}}
//
// Report file, one line per report:
//   {"kind":"intermediate","sequence":0,"value":0.51}
//   {"kind":"final","sequence":0,"value":0.57}

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::SearchController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum ReportKind {
    Intermediate,
    Final,
}

#[derive(Debug, Serialize)]
struct ReportLine {
    kind:     ReportKind,
    sequence: usize,
    value:    f64,
}

// ─── FileSearchController ─────────────────────────────────────────────────────

pub struct FileSearchController {
    params_path:  Option<PathBuf>,
    report_path:  PathBuf,
    intermediate: usize,
    finals:       usize,
}

impl FileSearchController {
    /// `params_path = None` means "use the plan defaults"
    pub fn new(params_path: Option<PathBuf>, report_path: impl AsRef<Path>) -> Self {
        Self {
            params_path,
            report_path:  report_path.as_ref().to_path_buf(),
            intermediate: 0,
            finals:       0,
        }
    }

    fn append(&self, line: &ReportLine) -> Result<()> {
        if let Some(parent) = self.report_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_path)
            .with_context(|| format!("Cannot open report file '{}'", self.report_path.display()))?;
        writeln!(f, "{}", serde_json::to_string(line)?)?;
        Ok(())
    }

    fn report(&mut self, kind: ReportKind, value: f64) {
        let sequence = match kind {
            ReportKind::Intermediate => self.intermediate,
            ReportKind::Final        => self.finals,
        };
        let line = ReportLine { kind, sequence, value };

        match self.append(&line) {
            Ok(()) => {
                tracing::debug!("Reported {:?} #{} = {:.6}", kind, sequence, value);
                match kind {
                    ReportKind::Intermediate => self.intermediate += 1,
                    ReportKind::Final        => self.finals += 1,
                }
            }
            Err(e) => tracing::warn!("Could not deliver {:?} result {:.6}: {e:#}", kind, value),
        }
    }
}

impl SearchController for FileSearchController {
    fn next_parameters(&mut self) -> Result<Map<String, Value>> {
        let Some(path) = &self.params_path else {
            return Ok(Map::new());
        };

        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read parameter file '{}'", path.display()))?;
        let value: Value = serde_json::from_str(&json)
            .with_context(|| format!("Parameter file '{}' is not valid JSON", path.display()))?;

        unwrap_parameters(value)
            .with_context(|| format!("Parameter file '{}' holds no parameter object", path.display()))
    }

    fn report_intermediate(&mut self, score: f64) {
        self.report(ReportKind::Intermediate, score);
    }

    fn report_final(&mut self, score: f64) {
        self.report(ReportKind::Final, score);
    }
}

/// Accept a flat object or one wrapped in a `"parameters"` field
fn unwrap_parameters(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(mut map) => match map.remove("parameters") {
            Some(Value::Object(inner)) => Some(inner),
            Some(other) => {
                map.insert("parameters".to_string(), other);
                Some(map)
            }
            None => Some(map),
        },
        _ => None,
    }
}

// ─── StandaloneController ─────────────────────────────────────────────────────

/// Runs a single trial with the default plan
#[derive(Debug, Default)]
pub struct StandaloneController;

impl SearchController for StandaloneController {
    fn next_parameters(&mut self) -> Result<Map<String, Value>> {
        Ok(Map::new())
    }

    fn report_intermediate(&mut self, score: f64) {
        tracing::info!("Intermediate result: {score:.6}");
    }

    fn report_final(&mut self, score: f64) {
        tracing::info!("Final result: {score:.6}");
    }
}
