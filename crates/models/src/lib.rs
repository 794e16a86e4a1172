//! Burn ML models for curved-text detection.
//!
//! This crate defines the TextNet architecture: a U-shaped encoder/decoder
//! that regresses per-pixel geometry maps for text instances. The network
//! outputs a 7-channel tensor aligned with the input:
//! - channels 0..2: text-region classification logits
//! - channels 2..4: center-line classification logits
//! - channel 4: stroke radius regression
//! - channels 5..6: orientation (sin, cos) regression
//!
//! These are pure Burn Modules with no awareness of loss composition or
//! training loops; the `training` crate wires them into the driver.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::relu;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Number of output channels produced by the prediction head.
pub const OUT_CHANNELS: usize = 7;

/// Channel layout of the head output.
pub const TR_CHANNELS: (usize, usize) = (0, 2);
pub const TCL_CHANNELS: (usize, usize) = (2, 4);
pub const RADIUS_CHANNEL: usize = 4;
pub const SIN_CHANNEL: usize = 5;
pub const COS_CHANNEL: usize = 6;

/// Feature-extraction backbone variant. Selects encoder channel widths and
/// names checkpoint files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backbone {
    Vgg,
    VggSlim,
}

impl Backbone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backbone::Vgg => "vgg",
            Backbone::VggSlim => "vgg_slim",
        }
    }

    /// Encoder widths per stage, shallowest first.
    fn widths(&self) -> [usize; 4] {
        match self {
            Backbone::Vgg => [32, 64, 128, 256],
            Backbone::VggSlim => [8, 16, 32, 64],
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextNetConfig {
    pub backbone: Backbone,
}

impl TextNetConfig {
    pub fn new(backbone: Backbone) -> Self {
        Self { backbone }
    }
}

impl Default for TextNetConfig {
    fn default() -> Self {
        Self {
            backbone: Backbone::Vgg,
        }
    }
}

/// Two 3x3 convolutions with ReLU, preserving spatial resolution.
#[derive(Debug, Module)]
struct ConvBlock<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
}

impl<B: Backend> ConvBlock<B> {
    fn new(channels_in: usize, channels_out: usize, device: &B::Device) -> Self {
        let conv1 = Conv2dConfig::new([channels_in, channels_out], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        let conv2 = Conv2dConfig::new([channels_out, channels_out], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        Self { conv1, conv2 }
    }

    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(input));
        relu(self.conv2.forward(x))
    }
}

/// TextNet: encoder with three pooling stages, transpose-conv decoder with
/// skip concatenation, and a 1x1 prediction head.
///
/// Input spatial dimensions must be divisible by 8.
#[derive(Debug, Module)]
pub struct TextNet<B: Backend> {
    enc1: ConvBlock<B>,
    enc2: ConvBlock<B>,
    enc3: ConvBlock<B>,
    enc4: ConvBlock<B>,
    pool: MaxPool2d,
    up3: ConvTranspose2d<B>,
    dec3: ConvBlock<B>,
    up2: ConvTranspose2d<B>,
    dec2: ConvBlock<B>,
    up1: ConvTranspose2d<B>,
    dec1: ConvBlock<B>,
    head: Conv2d<B>,
}

impl<B: Backend> TextNet<B> {
    pub fn new(cfg: TextNetConfig, device: &B::Device) -> Self {
        let [c0, c1, c2, c3] = cfg.backbone.widths();
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let up = |cin: usize, cout: usize| {
            ConvTranspose2dConfig::new([cin, cout], [2, 2])
                .with_stride([2, 2])
                .init(device)
        };
        Self {
            enc1: ConvBlock::new(3, c0, device),
            enc2: ConvBlock::new(c0, c1, device),
            enc3: ConvBlock::new(c1, c2, device),
            enc4: ConvBlock::new(c2, c3, device),
            pool,
            up3: up(c3, c2),
            dec3: ConvBlock::new(2 * c2, c2, device),
            up2: up(c2, c1),
            dec2: ConvBlock::new(2 * c1, c1, device),
            up1: up(c1, c0),
            dec1: ConvBlock::new(2 * c0, c0, device),
            head: Conv2dConfig::new([c0, OUT_CHANNELS], [1, 1]).init(device),
        }
    }

    /// Forward pass: `[N, 3, H, W]` -> `[N, 7, H, W]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let e1 = self.enc1.forward(input);
        let e2 = self.enc2.forward(self.pool.forward(e1.clone()));
        let e3 = self.enc3.forward(self.pool.forward(e2.clone()));
        let e4 = self.enc4.forward(self.pool.forward(e3.clone()));

        let d3 = self
            .dec3
            .forward(Tensor::cat(vec![self.up3.forward(e4), e3], 1));
        let d2 = self
            .dec2
            .forward(Tensor::cat(vec![self.up2.forward(d3), e2], 1));
        let d1 = self
            .dec1
            .forward(Tensor::cat(vec![self.up1.forward(d2), e1], 1));

        self.head.forward(d1)
    }
}

pub mod prelude {
    pub use super::{Backbone, TextNet, TextNetConfig, OUT_CHANNELS};
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn_ndarray::NdArray<f32>;

    #[test]
    fn forward_output_is_spatially_aligned() {
        let device = Default::default();
        let model = TextNet::<B>::new(TextNetConfig::new(Backbone::VggSlim), &device);
        let input = Tensor::<B, 4>::zeros([2, 3, 16, 16], &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [2, OUT_CHANNELS, 16, 16]);
    }

    #[test]
    fn backbone_names_are_distinct() {
        assert_ne!(Backbone::Vgg.as_str(), Backbone::VggSlim.as_str());
    }
}
