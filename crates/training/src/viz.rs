//! Network-output visualization.

use burn::tensor::activation::softmax;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use models::TR_CHANNELS;
use std::path::{Path, PathBuf};

/// Render the first sample of a batch as a side-by-side grayscale panel:
/// predicted text-region probability, ground-truth region mask, ground-truth
/// center-line mask. Saved under `<dir>/vis/<mode>_<epoch>_<iter>.png`.
pub fn visualize_network_output<B: Backend>(
    output: &Tensor<B, 4>,
    tr_mask: &Tensor<B, 3>,
    tcl_mask: &Tensor<B, 3>,
    mode: &str,
    dir: &Path,
    epoch: usize,
    iter: usize,
) -> anyhow::Result<PathBuf> {
    let [n, _, h, w] = output.dims();
    let prob = softmax(
        output
            .clone()
            .detach()
            .slice([0..n, TR_CHANNELS.0..TR_CHANNELS.1, 0..h, 0..w]),
        1,
    )
    .slice([0..1, 1..2, 0..h, 0..w]);

    let prob = plane_to_vec(prob.reshape([h, w]));
    let tr = plane_to_vec(tr_mask.clone().slice([0..1, 0..h, 0..w]).reshape([h, w]));
    let tcl = plane_to_vec(tcl_mask.clone().slice([0..1, 0..h, 0..w]).reshape([h, w]));

    let width = w as u32;
    let height = h as u32;
    let panel = image::GrayImage::from_fn(3 * width, height, |x, y| {
        let (values, col) = match x / width {
            0 => (&prob, x),
            1 => (&tr, x - width),
            _ => (&tcl, x - 2 * width),
        };
        let v = values[(y * width + col) as usize].clamp(0.0, 1.0);
        image::Luma([(v * 255.0) as u8])
    });

    let vis_dir = dir.join("vis");
    std::fs::create_dir_all(&vis_dir)?;
    let path = vis_dir.join(format!("{mode}_{epoch}_{iter}.png"));
    panel.save(&path)?;
    Ok(path)
}

fn plane_to_vec<B: Backend>(plane: Tensor<B, 2>) -> Vec<f32> {
    plane.into_data().to_vec::<f32>().unwrap_or_default()
}
