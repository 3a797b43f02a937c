//! NT-Xent (normalized temperature-scaled cross-entropy) loss.
//!
//! Rows `2k` and `2k + 1` of the representation matrix are the two views of
//! one image. Every row is scored against all 2N rows; its partner is the
//! target class, the other 2N − 2 rows are negatives and the row itself is
//! masked out, giving a (2N − 1)-way softmax per anchor.

use burn::nn::loss::CrossEntropyLossConfig;
use burn::prelude::*;

/// Lower bound applied to cosine similarities before scaling.
///
/// Equal to the `f32` machine epsilon: the smallest similarity distinguishable
/// from zero at unit scale in the training dtype.
pub const SIMILARITY_FLOOR: f64 = f32::EPSILON as f64;

/// Gap, in logits, between the masked self-entry and the smallest realizable
/// logit. `exp(-100)` is below the `f32` subnormal range relative to any other
/// term, so the self-entry carries no softmax mass.
pub const SELF_MASK_MARGIN: f64 = 100.0;

/// Norm clamp for L2 normalization of all-zero rows.
const NORM_EPS: f64 = 1e-12;

/// Amount subtracted from each diagonal logit.
///
/// After clamping, scaled similarities lie in `[floor / t, 1 / t]`, so the
/// realizable spread is `(1 - floor) / t`. Subtracting that spread plus
/// [`SELF_MASK_MARGIN`] puts the self logit `SELF_MASK_MARGIN` below every
/// other logit in the row regardless of temperature.
pub fn self_mask_offset(temperature: f64) -> f64 {
    (1.0 - SIMILARITY_FLOOR) / temperature + SELF_MASK_MARGIN
}

/// Target class of every flattened view: `2k ↔ 2k + 1`.
pub fn positive_targets(n_views: usize) -> Vec<usize> {
    (0..n_views).map(|i| i ^ 1).collect()
}

/// NT-Xent loss over a doubled batch.
///
/// # Arguments
/// - `representations`: shape `(2N, D)`, rows interleaved by pair
/// - `temperature`: softmax temperature, must be positive
///
/// # Returns
/// Scalar loss tensor of shape `(1,)`: mean cross-entropy over all 2N rows.
///
/// # Panics
/// Panics if the row count is not a positive even number.
pub fn nt_xent_loss<B: Backend>(representations: Tensor<B, 2>, temperature: f64) -> Tensor<B, 1> {
    let device = representations.device();
    let [n_views, _dim] = representations.dims();
    assert!(
        n_views >= 2 && n_views % 2 == 0,
        "NT-Xent needs an even number of views (got {n_views})"
    );

    // Row-wise L2 normalization.
    let norms = representations
        .clone()
        .powf_scalar(2.0)
        .sum_dim(1)
        .sqrt()
        .clamp_min(NORM_EPS); // (2N, 1)
    let normalized = representations / norms;

    // Cosine similarities, floored, then temperature-scaled.
    let scores = normalized
        .clone()
        .matmul(normalized.transpose())
        .clamp_min(SIMILARITY_FLOOR);
    let logits = scores.div_scalar(temperature);

    // Push every diagonal entry out of contention.
    let eye = Tensor::<B, 2>::eye(n_views, &device);
    let logits = logits - eye.mul_scalar(self_mask_offset(temperature));

    let targets: Vec<i32> = positive_targets(n_views)
        .into_iter()
        .map(|t| t as i32)
        .collect();
    let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &device);

    CrossEntropyLossConfig::new()
        .init(&device)
        .forward(logits, targets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::{Distribution, TensorData};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn reps(rows: Vec<[f32; 4]>) -> Tensor<TestBackend, 2> {
        let n = rows.len();
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Tensor::from_data(TensorData::new(flat, [n, 4]), &Default::default())
    }

    #[test]
    fn test_targets_pair_partners() {
        assert_eq!(positive_targets(2), vec![1, 0]);
        assert_eq!(positive_targets(4), vec![1, 0, 3, 2]);
        assert_eq!(positive_targets(6), vec![1, 0, 3, 2, 5, 4]);
    }

    #[test]
    fn test_orthogonal_pairs_match_closed_form() {
        // Partners identical, everything else orthogonal → positive logit 1/t,
        // negatives floor/t, self-entry excluded.
        let r = reps(vec![
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
        ]);
        let t = 0.5;
        let loss: f64 = nt_xent_loss(r, t).into_scalar().elem();

        let pos = 1.0 / t;
        let neg = SIMILARITY_FLOOR / t;
        let expected = -(pos - (pos.exp() + 2.0 * neg.exp()).ln());
        assert!(
            (loss - expected).abs() < 1e-4,
            "expected {expected}, got {loss}"
        );
    }

    #[test]
    fn test_orthogonal_pairs_near_zero_at_low_temperature() {
        let r = reps(vec![
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ]);
        let loss: f64 = nt_xent_loss(r, 0.05).into_scalar().elem();
        assert!(loss < 1e-6, "expected near-zero loss, got {loss}");
    }

    #[test]
    fn test_identical_rows_give_uniform_softmax() {
        // All similarities equal → each anchor picks among 2N − 1 equal logits.
        let r = reps(vec![[0.5, 0.5, 0.5, 0.5]; 6]);
        let loss: f64 = nt_xent_loss(r, 0.5).into_scalar().elem();
        let expected = 5.0_f64.ln();
        assert!((loss - expected).abs() < 1e-4, "expected {expected}, got {loss}");
    }

    #[test]
    fn test_swapped_partners_are_penalized() {
        let aligned = reps(vec![
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
        ]);
        let crossed = reps(vec![
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
        ]);
        let good: f64 = nt_xent_loss(aligned, 0.5).into_scalar().elem();
        let bad: f64 = nt_xent_loss(crossed, 0.5).into_scalar().elem();
        assert!(bad > good + 1.0, "good={good}, bad={bad}");
    }

    #[test]
    fn test_invariant_to_row_scale() {
        let device = Default::default();
        let r = Tensor::<TestBackend, 2>::random([8, 16], Distribution::Normal(0.0, 1.0), &device);
        let a: f64 = nt_xent_loss(r.clone(), 0.5).into_scalar().elem();
        let b: f64 = nt_xent_loss(r.mul_scalar(10.0), 0.5).into_scalar().elem();
        assert!((a - b).abs() < 1e-4, "a={a}, b={b}");
    }

    #[test]
    fn test_pure_function() {
        let device = Default::default();
        let r = Tensor::<TestBackend, 2>::random([6, 8], Distribution::Normal(0.0, 1.0), &device);
        let a: f32 = nt_xent_loss(r.clone(), 0.3).into_scalar().elem();
        let b: f32 = nt_xent_loss(r, 0.3).into_scalar().elem();
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_self_mask_dominates_logit_range() {
        for t in [0.01, 0.1, 0.5, 1.0, 10.0] {
            let spread = (1.0 - SIMILARITY_FLOOR) / t;
            assert!(self_mask_offset(t) - spread >= SELF_MASK_MARGIN - 1e-9);
        }
    }

    #[test]
    #[should_panic(expected = "even number of views")]
    fn test_odd_row_count_panics() {
        let _ = nt_xent_loss(reps(vec![[1.0, 0.0, 0.0, 0.0]; 3]), 0.5);
    }

    #[test]
    fn test_gradient_is_finite() {
        let device = Default::default();
        let r = Tensor::<TestAutodiffBackend, 2>::random(
            [4, 8],
            Distribution::Normal(0.0, 1.0),
            &device,
        )
        .require_grad();
        let loss = nt_xent_loss(r.clone(), 0.5);
        let grads = loss.backward();

        let grad: Vec<f32> = r.grad(&grads).unwrap().into_data().to_vec().unwrap();
        assert_eq!(grad.len(), 32);
        assert!(grad.iter().all(|g| g.is_finite()));
        assert!(grad.iter().any(|g| g.abs() > 0.0));
    }
}
