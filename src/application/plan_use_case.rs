// ============================================================
// Layer 2 — PlanUseCase
// ============================================================
// Turns a search controller's parameter object into the plan a
// training run will actually apply:
//
//   Step 1: parse pt{i} / pr{i} keys     (domain — PrunePlan)
//   Step 2: rescale rates to the budget  (pruning — balancer)
//   Step 3: reject rates outside (0, 1]  (domain — PrunePlan)
//
// `train` runs these steps before loading any data; `plan` runs
// them alone and prints the resulting per-slot table.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::domain::{
    prune_plan::{PruneMode, PrunePlan},
    traits::SearchController,
    weight_group::{FlatSlot, ModelDims},
};
use crate::infra::{checkpoint::PretrainedSnapshot, search_controller::FileSearchController};
use crate::pruning::balancer::{balance, weighted_mean};

/// Parse, balance and validate a controller parameter object
pub fn build_plan(params: &Map<String, Value>, keep_budget: f64, dims: &ModelDims) -> Result<PrunePlan> {
    let raw = PrunePlan::from_params(params, dims).context("Invalid prune parameters")?;

    let balanced = balance(raw.rates(), keep_budget, dims);
    let plan = raw.with_rates(balanced)?;
    plan.validate_rates()
        .with_context(|| format!("Balancing to a keep budget of {keep_budget} left a rate out of range"))?;

    tracing::info!(
        "Prune plan: {} slots, weighted keep rate {:.4}",
        plan.len(),
        weighted_mean(plan.rates(), dims),
    );
    Ok(plan)
}

// ─── Plan Table ───────────────────────────────────────────────────────────────

/// One row of the `plan` command's output
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRow {
    pub slot:     FlatSlot,
    pub mode:     PruneMode,
    pub raw_rate: f64,
    pub rate:     f64,
    pub params:   usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanTable {
    pub rows:          Vec<PlanRow>,
    pub weighted_keep: f64,
}

impl PlanTable {
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:>4}  {:>5}  {:<16}  {:<9}  {:>8}  {:>8}  {:>10}\n",
            "slot", "layer", "group", "mode", "raw", "keep", "params",
        );
        for row in &self.rows {
            out.push_str(&format!(
                "{:>4}  {:>5}  {:<16}  {:<9}  {:>8.4}  {:>8.4}  {:>10}\n",
                row.slot.flat_index(),
                row.slot.layer_index,
                row.slot.kind.name(),
                row.mode.name(),
                row.raw_rate,
                row.rate,
                row.params,
            ));
        }
        out.push_str(&format!("weighted keep rate: {:.6}\n", self.weighted_keep));
        out
    }
}

// ─── PlanUseCase ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PlanConfig {
    pub model_root:  String,
    pub model_size:  String,
    pub params_file: Option<String>,
    pub keep_budget: f64,
}

pub struct PlanUseCase {
    config: PlanConfig,
}

impl PlanUseCase {
    pub fn new(config: PlanConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PlanTable> {
        let cfg  = &self.config;
        let dims = PretrainedSnapshot::new(&cfg.model_root, &cfg.model_size)
            .load_config()?
            .dims();

        // no report file is written by this command
        let params = FileSearchController::new(cfg.params_file.as_ref().map(PathBuf::from), "")
            .next_parameters()?;

        plan_table(&params, cfg.keep_budget, &dims)
    }
}

/// Raw and balanced rates side by side for every slot
pub fn plan_table(params: &Map<String, Value>, keep_budget: f64, dims: &ModelDims) -> Result<PlanTable> {
    let raw  = PrunePlan::from_params(params, dims).context("Invalid prune parameters")?;
    let plan = build_plan(params, keep_budget, dims)?;

    let rows = (0..plan.len())
        .map(|i| {
            let slot = FlatSlot::from_flat(i);
            PlanRow {
                slot,
                mode:     plan.types()[i],
                raw_rate: raw.rates()[i],
                rate:     plan.rates()[i],
                params:   slot.kind.param_count(dims),
            }
        })
        .collect();

    Ok(PlanTable { rows, weighted_keep: weighted_mean(plan.rates(), dims) })
}
