// ============================================================
// Pruning Layer
// ============================================================
// Pure host-side pruning logic, no Burn types:
//
//   engine    — zero the weakest entries / rows / heads of a matrix
//   balancer  — rescale per-slot keep rates to a global budget
//   traversal — walk a PrunePlan over every matrix of a WeightStore
//
// Reference: Han et al. (2015), Michel et al. (2019)

pub mod balancer;
pub mod engine;
pub mod traversal;
