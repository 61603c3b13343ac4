// ============================================================
// Layer 5 — BERT for Sequence Classification
// ============================================================
// A BERT encoder built from Burn modules, laid out so that every
// prunable matrix is a plain `Linear` field on its layer:
//
//   embeddings: word + position + token type → LayerNorm → dropout
//   each layer:
//     query / key / value   → scaled dot-product attention
//     attention_output      → dropout → + residual → LayerNorm
//     intermediate          → GELU
//     output                → dropout → + residual → LayerNorm
//   pooler: tanh(dense(h[CLS]))
//   classifier: dropout → linear → num_labels logits
//
// Attention is written out by hand (instead of Burn's
// MultiHeadAttention) so Query, Key and Value stay separate,
// addressable weights.
//
// Padding positions get a −10000 bias before the softmax.
//
// Reference: Devlin et al. (2019) BERT
//            Vaswani et al. (2017) Attention Is All You Need

use burn::{
    nn::{
        loss::{CrossEntropyLossConfig, MseLoss, Reduction},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, softmax, tanh},
};

use crate::data::batcher::{GlueBatch, Labels};
use crate::domain::weight_group::{GroupKind, ModelDims};

const MASK_BIAS: f64 = -10_000.0;

// ─── Configuration ────────────────────────────────────────────────────────────
// Field names follow the HuggingFace `config.json` of a pretrained
// snapshot, so the file loads directly with `BertConfig::load`.
// Keys that are not listed here are ignored.
#[derive(Config, Debug)]
pub struct BertConfig {
    pub vocab_size:          usize,
    pub hidden_size:         usize,
    pub num_hidden_layers:   usize,
    pub num_attention_heads: usize,
    pub intermediate_size:   usize,
    #[config(default = 512)]
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
    #[config(default = 0.1)]
    pub attention_probs_dropout_prob: f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
}

impl BertConfig {
    pub fn dims(&self) -> ModelDims {
        ModelDims {
            num_layers:        self.num_hidden_layers,
            hidden_size:       self.hidden_size,
            intermediate_size: self.intermediate_size,
            num_heads:         self.num_attention_heads,
        }
    }

    /// Encoder without a task head
    pub fn init_backbone<B: Backend>(&self, device: &B::Device) -> BertModel<B> {
        let embeddings = BertEmbeddings {
            word:       EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position:   EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device),
            token_type: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device),
            norm:       self.layer_norm(device),
            dropout:    DropoutConfig::new(self.hidden_dropout_prob).init(),
        };
        let layers = (0..self.num_hidden_layers)
            .map(|_| self.build_layer(device))
            .collect();
        let pooler = LinearConfig::new(self.hidden_size, self.hidden_size).init(device);

        BertModel { embeddings, layers, pooler }
    }

    /// Encoder plus a freshly initialised head of `num_labels` outputs
    pub fn init_classifier<B: Backend>(
        &self,
        num_labels: usize,
        device:     &B::Device,
    ) -> BertForSequenceClassification<B> {
        BertForSequenceClassification {
            bert:       self.init_backbone(device),
            dropout:    DropoutConfig::new(self.hidden_dropout_prob).init(),
            classifier: LinearConfig::new(self.hidden_size, num_labels).init(device),
            num_labels,
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> BertLayer<B> {
        let (h, i) = (self.hidden_size, self.intermediate_size);
        BertLayer {
            query:            LinearConfig::new(h, h).init(device),
            key:              LinearConfig::new(h, h).init(device),
            value:            LinearConfig::new(h, h).init(device),
            attention_output: LinearConfig::new(h, h).init(device),
            attention_norm:   self.layer_norm(device),
            intermediate:     LinearConfig::new(h, i).init(device),
            output:           LinearConfig::new(i, h).init(device),
            output_norm:      self.layer_norm(device),
            attention_dropout: DropoutConfig::new(self.attention_probs_dropout_prob).init(),
            dropout:          DropoutConfig::new(self.hidden_dropout_prob).init(),
            num_heads:        self.num_attention_heads,
        }
    }
}

// ─── Embeddings ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    pub word:       Embedding<B>,
    pub position:   Embedding<B>,
    pub token_type: Embedding<B>,
    pub norm:       LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> BertEmbeddings<B> {
    /// [batch, seq_len] ids → [batch, seq_len, hidden]
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, token_type_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let x = self.word.forward(input_ids)
            + self.position.forward(positions)
            + self.token_type.forward(token_type_ids);

        self.dropout.forward(self.norm.forward(x))
    }
}

// ─── Encoder Layer ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertLayer<B: Backend> {
    pub query:             Linear<B>,
    pub key:               Linear<B>,
    pub value:             Linear<B>,
    pub attention_output:  Linear<B>,
    pub attention_norm:    LayerNorm<B>,
    pub intermediate:      Linear<B>,
    pub output:            Linear<B>,
    pub output_norm:       LayerNorm<B>,
    pub attention_dropout: Dropout,
    pub dropout:           Dropout,
    pub num_heads:         usize,
}

impl<B: Backend> BertLayer<B> {
    /// The prunable matrix of a given kind
    pub fn linear(&self, kind: GroupKind) -> &Linear<B> {
        match kind {
            GroupKind::Query        => &self.query,
            GroupKind::Key          => &self.key,
            GroupKind::Value        => &self.value,
            GroupKind::AttnOutput   => &self.attention_output,
            GroupKind::Intermediate => &self.intermediate,
            GroupKind::Output       => &self.output,
        }
    }

    pub fn linear_mut(&mut self, kind: GroupKind) -> &mut Linear<B> {
        match kind {
            GroupKind::Query        => &mut self.query,
            GroupKind::Key          => &mut self.key,
            GroupKind::Value        => &mut self.value,
            GroupKind::AttnOutput   => &mut self.attention_output,
            GroupKind::Intermediate => &mut self.intermediate,
            GroupKind::Output       => &mut self.output,
        }
    }

    /// x: [batch, seq, hidden], mask_bias: [batch, 1, 1, seq]
    pub fn forward(&self, x: Tensor<B, 3>, mask_bias: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch_size, seq_len, hidden] = x.dims();
        let head_size = hidden / self.num_heads;

        // [batch, seq, hidden] → [batch, heads, seq, head_size]
        let split_heads = |t: Tensor<B, 3>| {
            t.reshape([batch_size, seq_len, self.num_heads, head_size])
                .swap_dims(1, 2)
        };

        let q = split_heads(self.query.forward(x.clone()));
        let k = split_heads(self.key.forward(x.clone()));
        let v = split_heads(self.value.forward(x.clone()));

        let scores = q
            .matmul(k.swap_dims(2, 3))
            .div_scalar((head_size as f64).sqrt())
            + mask_bias;
        let probs = self.attention_dropout.forward(softmax(scores, 3));

        let context = probs
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch_size, seq_len, hidden]);

        let attended = self.attention_norm.forward(
            self.dropout.forward(self.attention_output.forward(context)) + x,
        );

        let ffn = self.output.forward(gelu(self.intermediate.forward(attended.clone())));
        self.output_norm.forward(self.dropout.forward(ffn) + attended)
    }
}

// ─── Encoder ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertModel<B: Backend> {
    pub embeddings: BertEmbeddings<B>,
    pub layers:     Vec<BertLayer<B>>,
    pub pooler:     Linear<B>,
}

impl<B: Backend> BertModel<B> {
    /// Returns the pooled [CLS] representation: [batch, hidden]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();

        // 1 → 0, 0 → −10000
        let mask_bias = attention_mask
            .float()
            .neg()
            .add_scalar(1.0)
            .mul_scalar(MASK_BIAS)
            .reshape([batch_size, 1, 1, seq_len]);

        let mut x = self.embeddings.forward(input_ids, token_type_ids);
        for layer in &self.layers {
            x = layer.forward(x, mask_bias.clone());
        }

        let [_, _, hidden] = x.dims();
        let cls = x.slice([0..batch_size, 0..1, 0..hidden]).reshape([batch_size, hidden]);
        tanh(self.pooler.forward(cls))
    }
}

// ─── Task Model ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertForSequenceClassification<B: Backend> {
    pub bert:       BertModel<B>,
    pub dropout:    Dropout,
    pub classifier: Linear<B>,
    pub num_labels: usize,
}

/// Loss and logits of one batch, with the labels they were scored against
pub struct GlueOutput<B: Backend> {
    pub loss:   Tensor<B, 1>,
    /// [batch, num_labels]
    pub logits: Tensor<B, 2>,
    pub labels: Labels<B>,
}

impl<B: Backend> BertForSequenceClassification<B> {
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let pooled = self.bert.forward(input_ids, token_type_ids, attention_mask);
        self.classifier.forward(self.dropout.forward(pooled))
    }

    /// Cross-entropy for class labels, mean squared error for scores
    pub fn forward_loss(&self, batch: GlueBatch<B>) -> GlueOutput<B> {
        let logits = self.forward(batch.input_ids, batch.token_type_ids, batch.attention_mask);

        let loss = match &batch.labels {
            Labels::Class(targets) => CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits.clone(), targets.clone()),
            Labels::Score(targets) => {
                let [batch_size, _] = logits.dims();
                MseLoss::new().forward(
                    logits.clone().reshape([batch_size]),
                    targets.clone(),
                    Reduction::Mean,
                )
            }
        };

        GlueOutput { loss, logits, labels: batch.labels }
    }
}
