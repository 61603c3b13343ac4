// ============================================================
// Layer 5 — Model Weight Store
// ============================================================
// Lets the pruning traversal read and overwrite the six prunable
// matrices of every encoder layer.
//
// Burn's `Linear` stores its weight as [d_input, d_output]. The
// pruning engine works on output-major matrices ([out, in]) so
// rows are output channels and attention heads are contiguous row
// blocks. Both directions therefore transpose.
//
// A write replaces the parameter's tensor but keeps its ParamId,
// which is what the optimizer keys its moment estimates on.

use anyhow::{Context, Result};
use burn::{module::Param, prelude::*};
use ndarray::Array2;

use crate::domain::traits::WeightStore;
use crate::domain::weight_group::WeightGroup;
use crate::ml::model::{BertForSequenceClassification, BertLayer};

impl<B: Backend> BertForSequenceClassification<B> {
    fn layer(&self, index: usize) -> Result<&BertLayer<B>> {
        self.bert
            .layers
            .get(index)
            .with_context(|| format!("Model has no encoder layer {index}"))
    }
}

impl<B: Backend> WeightStore for BertForSequenceClassification<B> {
    fn num_layers(&self) -> usize {
        self.bert.layers.len()
    }

    fn read(&self, group: WeightGroup) -> Result<Array2<f32>> {
        let weight = self.layer(group.layer_index)?.linear(group.kind).weight.val();
        let [d_input, d_output] = weight.dims();

        let values = weight
            .transpose()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read {group} to host: {e:?}"))?;

        Array2::from_shape_vec((d_output, d_input), values)
            .with_context(|| format!("Unexpected element count in {group}"))
    }

    fn write(&mut self, group: WeightGroup, matrix: Array2<f32>) -> Result<()> {
        let layer = self
            .bert
            .layers
            .get_mut(group.layer_index)
            .with_context(|| format!("Model has no encoder layer {}", group.layer_index))?;
        let linear = layer.linear_mut(group.kind);

        let [d_input, d_output] = linear.weight.dims();
        let (rows, cols) = matrix.dim();
        anyhow::ensure!(
            (rows, cols) == (d_output, d_input),
            "Cannot write a {rows}x{cols} matrix into {group} ({d_output}x{d_input})"
        );

        let device = linear.weight.device();
        let values: Vec<f32> = matrix.iter().copied().collect();
        let tensor = Tensor::<B, 2>::from_data(
            TensorData::new(values, [rows, cols]).convert::<B::FloatElem>(),
            &device,
        )
        .transpose();

        linear.weight = Param::initialized(linear.weight.id, tensor.require_grad());
        Ok(())
    }
}
