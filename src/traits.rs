use crate::errors::Result;
use crate::model::{RawOutput, Variant};
use ndarray::prelude::*;

/// Opaque segmentation network with a fixed tensor contract.
///
/// The web layer only sees this trait, so the ONNX session can be swapped for
/// a mock in tests.
pub trait SegmentationModel: Send + Sync {
    /// Which output style the network produces.
    fn variant(&self) -> Variant;

    /// Square input edge length the network expects.
    fn input_size(&self) -> u32;

    /// Runs the network on an NCHW `f32` tensor of shape `[1, 3, size, size]`.
    fn infer(&self, tensor: ArrayView4<f32>) -> Result<RawOutput>;
}
