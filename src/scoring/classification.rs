// ============================================================
// Classification Metrics
// ============================================================
// accuracy, Matthews correlation coefficient, binary F1.
//
// Matthews uses the multi-class form (Gorodkin 2004), which equals
// the usual TP/TN/FP/FN formula for two classes:
//
//          c·s − Σ p_k·t_k
//   MCC = ───────────────────────────────────
//          √((s² − Σ p_k²) · (s² − Σ t_k²))
//
//   s = samples, c = correct, p_k / t_k = predicted / true count of k
//
// A zero denominator (one class only on either side) yields NaN;
// callers decide how to treat it.

/// Fraction of positions where prediction equals label
pub fn simple_accuracy(preds: &[usize], labels: &[usize]) -> f64 {
    if preds.is_empty() {
        return 0.0;
    }
    let correct = preds.iter().zip(labels).filter(|(p, l)| p == l).count();
    correct as f64 / preds.len() as f64
}

/// Matthews correlation coefficient; NaN when undefined
pub fn matthews_corrcoef(preds: &[usize], labels: &[usize]) -> f64 {
    let classes = preds
        .iter()
        .chain(labels)
        .copied()
        .max()
        .map_or(0, |m| m + 1);

    let mut predicted = vec![0.0f64; classes];
    let mut actual    = vec![0.0f64; classes];
    let mut correct   = 0.0f64;
    for (&p, &l) in preds.iter().zip(labels) {
        predicted[p] += 1.0;
        actual[l]    += 1.0;
        if p == l {
            correct += 1.0;
        }
    }

    let s   = preds.len() as f64;
    let cov_pt = correct * s - predicted.iter().zip(&actual).map(|(p, t)| p * t).sum::<f64>();
    let cov_pp = s * s - predicted.iter().map(|p| p * p).sum::<f64>();
    let cov_tt = s * s - actual.iter().map(|t| t * t).sum::<f64>();

    cov_pt / (cov_pp * cov_tt).sqrt()
}

/// F1 of the positive class (label 1) of a binary task
pub fn f1_score(preds: &[usize], labels: &[usize]) -> f64 {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (&p, &l) in preds.iter().zip(labels) {
        match (p == 1, l == 1) {
            (true, true)  => tp += 1,
            (true, false) => fp += 1,
            (false, true) => fn_ += 1,
            _ => {}
        }
    }

    let denom = 2 * tp + fp + fn_;
    if denom == 0 {
        0.0
    } else {
        (2 * tp) as f64 / denom as f64
    }
}

/// Index of the largest logit in each row (first one on ties)
pub fn argmax_rows(logits: &[f32], width: usize) -> Vec<usize> {
    logits
        .chunks(width.max(1))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max { (i, v) } else { (best, max) }
                })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_accuracy() {
        assert_eq!(simple_accuracy(&[0, 1, 1, 0], &[0, 1, 0, 0]), 0.75);
        assert_eq!(simple_accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_matthews_binary_matches_confusion_formula() {
        // tp=2 tn=1 fp=1 fn=1
        let preds  = [1, 1, 1, 0, 0];
        let labels = [1, 1, 0, 0, 1];
        let (tp, tn, fp, fn_) = (2.0f64, 1.0, 1.0, 1.0);
        let expected = (tp * tn - fp * fn_)
            / ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();

        assert_relative_eq!(matthews_corrcoef(&preds, &labels), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_matthews_perfect_and_inverse() {
        assert_relative_eq!(matthews_corrcoef(&[0, 1, 0, 1], &[0, 1, 0, 1]), 1.0);
        assert_relative_eq!(matthews_corrcoef(&[1, 0, 1, 0], &[0, 1, 0, 1]), -1.0);
    }

    #[test]
    fn test_matthews_single_class_is_nan() {
        assert!(matthews_corrcoef(&[1, 1, 1], &[1, 0, 1]).is_nan());
        assert!(matthews_corrcoef(&[], &[]).is_nan());
    }

    #[test]
    fn test_f1() {
        // tp=2 fp=1 fn=1 → 4 / 6
        assert_relative_eq!(f1_score(&[1, 1, 1, 0, 0], &[1, 1, 0, 0, 1]), 2.0 / 3.0);
        assert_eq!(f1_score(&[0, 0], &[0, 0]), 0.0);
    }

    #[test]
    fn test_argmax_rows() {
        let logits = [0.1f32, 0.9, 2.0, -1.0, 0.5, 0.5];
        assert_eq!(argmax_rows(&logits, 2), vec![1, 0, 0]);
    }
}
