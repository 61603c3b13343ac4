// ============================================================
// Layer 4 — GLUE Task Processors
// ============================================================
// Reads the tab-separated train / dev files of the GLUE
// distribution into InputExamples. Every task stores its
// sentences and label in different columns:
//
//   task        header  text_a  text_b  label
//   cola        no      3       -       1
//   mnli(-mm)   yes     8       9       last
//   mrpc        yes     3       4       0
//   sst-2       yes     0       -       1
//   sts-b       yes     7       8       last
//   qqp         yes     3       4       5      (short rows skipped)
//   qnli / rte  yes     1       2       last
//   wnli        yes     1       2       last
//
// No quoting: a line is split on every tab.
//
// Reference: Wang et al. (2018) GLUE benchmark

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};

use crate::domain::task::GlueTask;

/// One raw sentence (pair) with its label text
#[derive(Debug, Clone, PartialEq)]
pub struct InputExample {
    pub guid:   String,
    pub text_a: String,
    pub text_b: Option<String>,
    pub label:  String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    At(usize),
    Last,
}

impl Column {
    fn get<'a>(self, fields: &[&'a str]) -> Option<&'a str> {
        match self {
            Column::At(i) => fields.get(i).copied(),
            Column::Last  => fields.last().copied(),
        }
    }
}

/// Where a task keeps its fields
#[derive(Debug, Clone, Copy)]
struct ColumnLayout {
    has_header:     bool,
    text_a:         usize,
    text_b:         Option<usize>,
    label:          Column,
    /// guid built from column 0 rather than the line number
    id_column:      bool,
    skip_malformed: bool,
}

fn layout(task: GlueTask) -> ColumnLayout {
    let pair = |a, b, label| ColumnLayout {
        has_header: true,
        text_a: a,
        text_b: Some(b),
        label,
        id_column: true,
        skip_malformed: false,
    };

    match task {
        GlueTask::Cola => ColumnLayout {
            has_header: false,
            text_a: 3,
            text_b: None,
            label: Column::At(1),
            id_column: false,
            skip_malformed: false,
        },
        GlueTask::Sst2 => ColumnLayout {
            has_header: true,
            text_a: 0,
            text_b: None,
            label: Column::At(1),
            id_column: false,
            skip_malformed: false,
        },
        GlueTask::Mrpc => ColumnLayout { id_column: false, ..pair(3, 4, Column::At(0)) },
        GlueTask::Qqp  => ColumnLayout { skip_malformed: true, ..pair(3, 4, Column::At(5)) },
        GlueTask::Mnli | GlueTask::MnliMismatched => pair(8, 9, Column::Last),
        GlueTask::Stsb => pair(7, 8, Column::Last),
        GlueTask::Qnli | GlueTask::Rte | GlueTask::Wnli => pair(1, 2, Column::Last),
    }
}

// ─── GlueProcessor ────────────────────────────────────────────────────────────

/// Reads the train and dev split of one task from its data directory
pub struct GlueProcessor {
    task:     GlueTask,
    data_dir: PathBuf,
}

impl GlueProcessor {
    pub fn new(task: GlueTask, data_dir: impl AsRef<Path>) -> Self {
        Self { task, data_dir: data_dir.as_ref().to_path_buf() }
    }

    pub fn train_examples(&self) -> Result<Vec<InputExample>> {
        self.read_split("train.tsv", "train")
    }

    pub fn dev_examples(&self) -> Result<Vec<InputExample>> {
        self.read_split(self.task.dev_file(), "dev")
    }

    fn read_split(&self, file: &str, set_type: &str) -> Result<Vec<InputExample>> {
        let path = self.data_dir.join(file);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {} split '{}'", self.task, path.display()))?;

        let examples = parse_tsv(&content, self.task, set_type)
            .with_context(|| format!("Malformed {} file '{}'", self.task, path.display()))?;

        tracing::info!("Read {} {} examples from '{}'", examples.len(), set_type, path.display());
        Ok(examples)
    }
}

/// Parse the content of one GLUE TSV file
pub fn parse_tsv(content: &str, task: GlueTask, set_type: &str) -> Result<Vec<InputExample>> {
    let layout = layout(task);
    let mut examples = Vec::new();

    for (i, line) in content.lines().enumerate() {
        if i == 0 && layout.has_header {
            continue;
        }
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();

        let text_a = fields.get(layout.text_a).copied();
        let text_b = layout.text_b.map(|c| fields.get(c).copied());
        let label  = layout.label.get(&fields);

        let (text_a, label) = match (text_a, label, text_b) {
            (Some(a), Some(l), None | Some(Some(_))) => (a, l),
            _ if layout.skip_malformed => {
                tracing::debug!("Skipping short {task} line {}", i + 1);
                continue;
            }
            _ => anyhow::bail!(
                "Line {} has {} columns, too few for {task}",
                i + 1,
                fields.len()
            ),
        };

        let id = if layout.id_column { fields[0].to_string() } else { i.to_string() };

        examples.push(InputExample {
            guid:   format!("{set_type}-{id}"),
            text_a: text_a.to_string(),
            text_b: text_b.flatten().filter(|b| !b.is_empty()).map(str::to_string),
            label:  label.to_string(),
        });
    }

    Ok(examples)
}
