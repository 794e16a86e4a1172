//! Five-term TextSnake loss composition.
//!
//! Classification terms (text region, center line) are masked binary
//! cross-entropies over the softmaxed channel pairs; regression terms
//! (radius, sin, cos) are L1 distances averaged over center-line pixels,
//! with predicted orientation normalized to unit norm first. Every term is
//! non-negative and the sum stays differentiable with respect to the model
//! output.

use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use models::{COS_CHANNEL, RADIUS_CHANNEL, SIN_CHANNEL, TCL_CHANNELS, TR_CHANNELS};
use snake_dataset::GeoBatch;

const EPS: f32 = 1e-6;

/// The five scalar loss terms for one batch.
pub struct LossTerms<B: Backend> {
    pub tr: Tensor<B, 1>,
    pub tcl: Tensor<B, 1>,
    pub sin: Tensor<B, 1>,
    pub cos: Tensor<B, 1>,
    pub radii: Tensor<B, 1>,
}

impl<B: Backend> LossTerms<B> {
    /// The scalar objective: plain sum of the five terms.
    pub fn total(&self) -> Tensor<B, 1> {
        self.tr.clone()
            + self.tcl.clone()
            + self.sin.clone()
            + self.cos.clone()
            + self.radii.clone()
    }

    /// Detach every term to host scalars for logging.
    pub fn values(&self) -> TermValues {
        let tr = scalar_value(self.tr.clone().detach());
        let tcl = scalar_value(self.tcl.clone().detach());
        let sin = scalar_value(self.sin.clone().detach());
        let cos = scalar_value(self.cos.clone().detach());
        let radii = scalar_value(self.radii.clone().detach());
        TermValues {
            total: tr + tcl + sin + cos + radii,
            tr,
            tcl,
            sin,
            cos,
            radii,
        }
    }
}

/// Host-side copies of the loss terms.
#[derive(Debug, Clone, Copy)]
pub struct TermValues {
    pub total: f32,
    pub tr: f32,
    pub tcl: f32,
    pub sin: f32,
    pub cos: f32,
    pub radii: f32,
}

impl TermValues {
    /// Name/value pairs in the order the scalar sink expects.
    pub fn as_scalars(&self) -> [(&'static str, f32); 6] {
        [
            ("loss", self.total),
            ("tr_loss", self.tr),
            ("tcl_loss", self.tcl),
            ("sin_loss", self.sin),
            ("cos_loss", self.cos),
            ("radii_loss", self.radii),
        ]
    }
}

/// Read a rank-1 single-element tensor back to the host.
pub fn scalar_value<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor
        .into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .first()
        .copied()
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoss;

impl TextLoss {
    pub fn forward<B: Backend>(&self, output: Tensor<B, 4>, batch: &GeoBatch<B>) -> LossTerms<B> {
        let [n, _, h, w] = output.dims();

        let tr_prob = positive_prob(
            output
                .clone()
                .slice([0..n, TR_CHANNELS.0..TR_CHANNELS.1, 0..h, 0..w]),
        );
        let tcl_prob = positive_prob(
            output
                .clone()
                .slice([0..n, TCL_CHANNELS.0..TCL_CHANNELS.1, 0..h, 0..w]),
        );
        let channel = |c: usize| {
            output
                .clone()
                .slice([0..n, c..c + 1, 0..h, 0..w])
                .reshape([n, h, w])
        };
        let radius_pred = channel(RADIUS_CHANNEL);
        let sin_pred = channel(SIN_CHANNEL);
        let cos_pred = channel(COS_CHANNEL);

        // Project predicted orientation onto the unit circle before the
        // regression terms, as the geometry decoding assumes sin^2+cos^2=1.
        let norm = (sin_pred.clone() * sin_pred.clone() + cos_pred.clone() * cos_pred.clone())
            .sqrt()
            .clamp_min(EPS);
        let sin_pred = sin_pred / norm.clone();
        let cos_pred = cos_pred / norm;

        let tr = masked_bce(tr_prob, batch.tr_mask.clone(), batch.train_mask.clone());
        // Center-line supervision only counts inside annotated text regions.
        let tcl_weight = batch.train_mask.clone() * batch.tr_mask.clone();
        let tcl = masked_bce(tcl_prob, batch.tcl_mask.clone(), tcl_weight);

        let reg_mask = batch.train_mask.clone() * batch.tcl_mask.clone();
        let radii = masked_l1(radius_pred, batch.radius_map.clone(), reg_mask.clone());
        let sin = masked_l1(sin_pred, batch.sin_map.clone(), reg_mask.clone());
        let cos = masked_l1(cos_pred, batch.cos_map.clone(), reg_mask);

        LossTerms {
            tr,
            tcl,
            sin,
            cos,
            radii,
        }
    }
}

/// Probability of the positive class from a 2-channel logit pair.
fn positive_prob<B: Backend>(logits: Tensor<B, 4>) -> Tensor<B, 3> {
    let [n, _, h, w] = logits.dims();
    softmax(logits, 1).slice([0..n, 1..2, 0..h, 0..w]).reshape([n, h, w])
}

/// Binary cross-entropy against a 0/1 target map, averaged over the pixels
/// selected by `weight`. A zero-weight batch contributes a zero term.
fn masked_bce<B: Backend>(
    prob: Tensor<B, 3>,
    target: Tensor<B, 3>,
    weight: Tensor<B, 3>,
) -> Tensor<B, 1> {
    let prob = prob.clamp(EPS, 1.0 - EPS);
    let ones = target.ones_like();
    let bce = (target.clone() * prob.clone().log()
        + (ones.clone() - target) * (ones - prob).log())
    .neg();
    masked_mean(bce, weight)
}

/// L1 distance averaged over the pixels selected by `mask`.
fn masked_l1<B: Backend>(
    pred: Tensor<B, 3>,
    target: Tensor<B, 3>,
    mask: Tensor<B, 3>,
) -> Tensor<B, 1> {
    masked_mean((pred - target).abs(), mask)
}

fn masked_mean<B: Backend>(values: Tensor<B, 3>, mask: Tensor<B, 3>) -> Tensor<B, 1> {
    let count = scalar_value(mask.clone().sum());
    (values * mask).sum().div_scalar(count.max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;

    type B = burn_ndarray::NdArray<f32>;

    const SIDE: usize = 4;

    fn map_tensor(values: Vec<f32>, device: &<B as Backend>::Device) -> Tensor<B, 3> {
        Tensor::from_data(TensorData::new(values, [1, SIDE, SIDE]), device)
    }

    fn uniform_batch(device: &<B as Backend>::Device) -> GeoBatch<B> {
        let plane = SIDE * SIDE;
        GeoBatch {
            images: Tensor::zeros([1, 3, SIDE, SIDE], device),
            train_mask: map_tensor(vec![1.0; plane], device),
            tr_mask: map_tensor(vec![1.0; plane], device),
            tcl_mask: map_tensor(vec![1.0; plane], device),
            radius_map: map_tensor(vec![2.0; plane], device),
            sin_map: map_tensor(vec![1.0; plane], device),
            cos_map: map_tensor(vec![0.0; plane], device),
            metas: Vec::new(),
        }
    }

    /// Output tensor whose classification logits strongly favor the positive
    /// class and whose regression channels hit the targets exactly.
    fn near_perfect_output(device: &<B as Backend>::Device) -> Tensor<B, 4> {
        let plane = SIDE * SIDE;
        let mut values = Vec::with_capacity(7 * plane);
        values.extend(std::iter::repeat(-10.0f32).take(plane)); // tr neg
        values.extend(std::iter::repeat(10.0f32).take(plane)); // tr pos
        values.extend(std::iter::repeat(-10.0f32).take(plane)); // tcl neg
        values.extend(std::iter::repeat(10.0f32).take(plane)); // tcl pos
        values.extend(std::iter::repeat(2.0f32).take(plane)); // radius
        values.extend(std::iter::repeat(1.0f32).take(plane)); // sin
        values.extend(std::iter::repeat(0.0f32).take(plane)); // cos
        Tensor::from_data(TensorData::new(values, [1, 7, SIDE, SIDE]), device)
    }

    #[test]
    fn perfect_prediction_is_near_zero() {
        let device = Default::default();
        let batch = uniform_batch(&device);
        let terms = TextLoss.forward(near_perfect_output(&device), &batch);
        let vals = terms.values();
        assert!(vals.total < 1e-3, "total {}", vals.total);
    }

    #[test]
    fn all_terms_are_non_negative() {
        let device = Default::default();
        let batch = uniform_batch(&device);
        let output = Tensor::<B, 4>::random(
            [1, 7, SIDE, SIDE],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let vals = TextLoss.forward(output, &batch).values();
        for (name, v) in vals.as_scalars() {
            assert!(v >= 0.0, "{name} = {v}");
        }
    }

    #[test]
    fn radius_term_is_masked_mean_absolute_error() {
        let device = Default::default();
        let mut batch = uniform_batch(&device);
        let plane = SIDE * SIDE;
        // Only half the pixels sit on the center line.
        let mut tcl = vec![0.0f32; plane];
        for v in tcl.iter_mut().take(plane / 2) {
            *v = 1.0;
        }
        batch.tcl_mask = map_tensor(tcl, &device);
        batch.radius_map = map_tensor(vec![5.0; plane], &device);

        let output = near_perfect_output(&device); // predicts radius 2.0
        let vals = TextLoss.forward(output, &batch).values();
        assert!((vals.radii - 3.0).abs() < 1e-5, "radii {}", vals.radii);
    }

    #[test]
    fn empty_mask_yields_zero_terms() {
        let device = Default::default();
        let mut batch = uniform_batch(&device);
        batch.train_mask = map_tensor(vec![0.0; SIDE * SIDE], &device);
        batch.tcl_mask = map_tensor(vec![0.0; SIDE * SIDE], &device);
        let vals = TextLoss.forward(near_perfect_output(&device), &batch).values();
        assert_eq!(vals.tr, 0.0);
        assert_eq!(vals.radii, 0.0);
    }

    #[test]
    fn total_sums_the_terms() {
        let device = Default::default();
        let batch = uniform_batch(&device);
        let output = Tensor::<B, 4>::random(
            [1, 7, SIDE, SIDE],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let terms = TextLoss.forward(output, &batch);
        let vals = terms.values();
        let total = scalar_value(terms.total());
        assert!((total - vals.total).abs() < 1e-4);
    }
}
