// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads the WordPiece tokenizer shipped with a pretrained snapshot
// (`tokenizer.json`, HuggingFace format). The vocabulary must be the
// one the encoder was pretrained with, so nothing is ever trained or
// rebuilt here.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::data::features::{CLS_TOKEN, SEP_TOKEN};

pub struct TokenizerStore {
    path: PathBuf,
}

impl TokenizerStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Load the tokenizer and check it knows the BERT separators
    pub fn load(&self) -> Result<Tokenizer> {
        let tokenizer = Tokenizer::from_file(&self.path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", self.path.display(), e
            ))?;

        for special in [CLS_TOKEN, SEP_TOKEN] {
            anyhow::ensure!(
                tokenizer.token_to_id(special).is_some(),
                "Tokenizer '{}' has no {special} token",
                self.path.display()
            );
        }

        tracing::info!(
            "Loaded tokenizer from '{}' ({} tokens)",
            self.path.display(),
            tokenizer.get_vocab_size(true)
        );
        Ok(tokenizer)
    }
}
