use crate::errors::Result;
use crate::model::{RawOutput, Variant};
use crate::traits::SegmentationModel;
use ndarray::prelude::*;

/// Mock segmentation model for tests.
///
/// Returns fixed outputs with the centre of the input marked as foreground.
#[derive(Debug, Clone)]
pub struct MockSegmentationModel {
    pub variant: Variant,
    pub image_size: u32,
}

impl MockSegmentationModel {
    pub const fn new(variant: Variant, image_size: u32) -> Self {
        Self {
            variant,
            image_size,
        }
    }

    pub const fn instance(image_size: u32) -> Self {
        Self::new(Variant::Instance, image_size)
    }

    pub const fn semantic(image_size: u32) -> Self {
        Self::new(Variant::Semantic, image_size)
    }
}

fn centre(size: usize) -> std::ops::Range<usize> {
    size / 4..size - size / 4
}

impl SegmentationModel for MockSegmentationModel {
    fn variant(&self) -> Variant {
        self.variant
    }

    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn infer(&self, tensor: ArrayView4<f32>) -> Result<RawOutput> {
        let (_, _, height, width) = tensor.dim();
        let (rows, cols) = (centre(height), centre(width));

        match self.variant {
            Variant::Instance => {
                // only the first instance clears the score threshold
                let mut masks = Array4::<f32>::zeros((2, 1, height, width));
                masks
                    .slice_mut(s![0, 0, rows.clone(), cols.clone()])
                    .fill(0.9);
                masks.slice_mut(s![1, 0, .., ..]).fill(0.9);
                Ok(RawOutput::Instances {
                    scores: array![0.8, 0.1],
                    masks,
                })
            }
            Variant::Semantic => {
                let mut scores = Array4::<f32>::zeros((1, 3, height, width));
                scores.slice_mut(s![0, 0, .., ..]).fill(1.0);
                scores.slice_mut(s![0, 2, rows, cols]).fill(2.0);
                Ok(RawOutput::ClassScores(scores))
            }
        }
    }
}
