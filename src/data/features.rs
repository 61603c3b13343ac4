// ============================================================
// Layer 4 — Feature Encoding
// ============================================================
// Converts an InputExample into fixed-length model input:
//
//   tokens:          [CLS] a a a [SEP] b b [SEP] [PAD] [PAD]
//   token_type_ids:    0   0 0 0   0   1 1   1     0     0
//   attention_mask:    1   1 1 1   1   1 1   1     0     0
//
// A pair that does not fit is shortened one token at a time from
// whichever side is currently longer, so both sentences keep as
// much as possible. A single sentence is cut at the end.
//
// Reference: Devlin et al. (2019) BERT, §3.2 input representation

use anyhow::{Context, Result};
use tokenizers::Tokenizer;

use crate::data::dataset::{GlueFeatures, GlueLabel};
use crate::data::processor::InputExample;
use crate::domain::task::{GlueTask, OutputMode};

pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Drop tokens from the longer side until `a.len() + b.len() <= max_len`
pub fn truncate_pair(a: &mut Vec<u32>, b: &mut Vec<u32>, max_len: usize) {
    while a.len() + b.len() > max_len {
        if a.len() > b.len() {
            a.pop();
        } else {
            b.pop();
        }
    }
}

/// Build padded ids, mask and segment ids from already-truncated tokens
pub fn assemble(
    a:              &[u32],
    b:              Option<&[u32]>,
    max_seq_length: usize,
    cls_id:         u32,
    sep_id:         u32,
) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
    let mut input_ids = Vec::with_capacity(max_seq_length);
    input_ids.push(cls_id);
    input_ids.extend_from_slice(a);
    input_ids.push(sep_id);
    let mut token_type_ids = vec![0u32; input_ids.len()];

    if let Some(b) = b.filter(|b| !b.is_empty()) {
        input_ids.extend_from_slice(b);
        input_ids.push(sep_id);
        token_type_ids.resize(input_ids.len(), 1);
    }

    let mut attention_mask = vec![1u32; input_ids.len()];

    input_ids.resize(max_seq_length, 0);
    attention_mask.resize(max_seq_length, 0);
    token_type_ids.resize(max_seq_length, 0);

    (input_ids, attention_mask, token_type_ids)
}

// ─── FeatureEncoder ───────────────────────────────────────────────────────────

/// Tokenizes examples and maps their labels for one task
pub struct FeatureEncoder {
    tokenizer:      Tokenizer,
    task:           GlueTask,
    output_mode:    OutputMode,
    max_seq_length: usize,
    cls_id:         u32,
    sep_id:         u32,
}

impl FeatureEncoder {
    pub fn new(
        tokenizer:      Tokenizer,
        task:           GlueTask,
        output_mode:    OutputMode,
        max_seq_length: usize,
    ) -> Result<Self> {
        anyhow::ensure!(
            max_seq_length >= 3,
            "max_seq_length must leave room for [CLS] and two [SEP], got {max_seq_length}"
        );
        let cls_id = tokenizer
            .token_to_id(CLS_TOKEN)
            .with_context(|| format!("Tokenizer has no {CLS_TOKEN} token"))?;
        let sep_id = tokenizer
            .token_to_id(SEP_TOKEN)
            .with_context(|| format!("Tokenizer has no {SEP_TOKEN} token"))?;

        Ok(Self { tokenizer, task, output_mode, max_seq_length, cls_id, sep_id })
    }

    pub fn encode(&self, example: &InputExample) -> Result<GlueFeatures> {
        let mut tokens_a = self.tokenize(&example.text_a)?;

        let tokens_b = match &example.text_b {
            Some(text_b) => {
                let mut tokens_b = self.tokenize(text_b)?;
                truncate_pair(&mut tokens_a, &mut tokens_b, self.max_seq_length - 3);
                Some(tokens_b)
            }
            None => {
                tokens_a.truncate(self.max_seq_length - 2);
                None
            }
        };

        let (input_ids, attention_mask, token_type_ids) = assemble(
            &tokens_a,
            tokens_b.as_deref(),
            self.max_seq_length,
            self.cls_id,
            self.sep_id,
        );

        let label = self
            .label(&example.label)
            .with_context(|| format!("Example {}", example.guid))?;

        Ok(GlueFeatures { input_ids, attention_mask, token_type_ids, label })
    }

    pub fn encode_all(&self, examples: &[InputExample]) -> Result<Vec<GlueFeatures>> {
        examples.iter().map(|e| self.encode(e)).collect()
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn label(&self, raw: &str) -> Result<GlueLabel> {
        match self.output_mode {
            OutputMode::Classification => self
                .task
                .labels()
                .iter()
                .position(|l| *l == raw)
                .map(GlueLabel::Class)
                .with_context(|| format!("Unknown {} label '{raw}'", self.task)),
            OutputMode::Regression => raw
                .trim()
                .parse::<f32>()
                .map(GlueLabel::Score)
                .with_context(|| format!("Regression label '{raw}' is not a number")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::tests::word_level_tokenizer;

    #[test]
    fn test_truncate_pair_shortens_longer_side() {
        let mut a = vec![1, 2, 3, 4, 5];
        let mut b = vec![6, 7];
        truncate_pair(&mut a, &mut b, 5);
        assert_eq!(a, vec![1, 2, 3]);
        assert_eq!(b, vec![6, 7]);

        // equal lengths lose from b first
        let mut a = vec![1, 2, 3];
        let mut b = vec![4, 5, 6];
        truncate_pair(&mut a, &mut b, 3);
        assert_eq!(a, vec![1, 2]);
        assert_eq!(b, vec![4]);
    }

    #[test]
    fn test_assemble_pair_layout() {
        let (ids, mask, types) = assemble(&[5, 6], Some(&[7]), 8, 101, 102);
        assert_eq!(ids,   vec![101, 5, 6, 102, 7, 102, 0, 0]);
        assert_eq!(mask,  vec![1, 1, 1, 1, 1, 1, 0, 0]);
        assert_eq!(types, vec![0, 0, 0, 0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_assemble_single_sentence() {
        let (ids, mask, types) = assemble(&[5], None, 4, 101, 102);
        assert_eq!(ids,   vec![101, 5, 102, 0]);
        assert_eq!(mask,  vec![1, 1, 1, 0]);
        assert_eq!(types, vec![0, 0, 0, 0]);
    }

    fn example(a: &str, b: Option<&str>, label: &str) -> InputExample {
        InputExample {
            guid:   "train-0".into(),
            text_a: a.into(),
            text_b: b.map(Into::into),
            label:  label.into(),
        }
    }

    #[test]
    fn test_encoder_maps_labels_and_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let tokenizer = word_level_tokenizer(dir.path(), &["the", "cat", "sat", "dog"]);
        let encoder = FeatureEncoder::new(tokenizer, GlueTask::Rte, OutputMode::Classification, 6)
            .unwrap();

        let features = encoder
            .encode(&example("the cat sat", Some("the dog"), "not_entailment"))
            .unwrap();

        assert_eq!(features.input_ids.len(), 6);
        assert_eq!(features.attention_mask, vec![1; 6]);
        assert_eq!(features.token_type_ids, vec![0, 0, 0, 0, 1, 1]);
        assert_eq!(features.label, GlueLabel::Class(1));
    }

    #[test]
    fn test_encoder_rejects_unknown_label() {
        let dir = tempfile::tempdir().unwrap();
        let tokenizer = word_level_tokenizer(dir.path(), &["cat"]);
        let encoder = FeatureEncoder::new(tokenizer, GlueTask::Sst2, OutputMode::Classification, 8)
            .unwrap();

        assert!(encoder.encode(&example("cat", None, "positive")).is_err());
    }

    #[test]
    fn test_encoder_parses_regression_scores() {
        let dir = tempfile::tempdir().unwrap();
        let tokenizer = word_level_tokenizer(dir.path(), &["cat"]);
        let encoder = FeatureEncoder::new(tokenizer, GlueTask::Stsb, OutputMode::Regression, 8)
            .unwrap();

        let features = encoder.encode(&example("cat", Some("cat"), "3.800")).unwrap();
        assert_eq!(features.label, GlueLabel::Score(3.8));
    }
}
