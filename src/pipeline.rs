//! Upload-to-mask pipeline: preprocess, infer, build the mask image.

use image::{imageops, imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Luma, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;

use crate::{
    errors::{Result, SegError},
    model::{Normalization, RawOutput},
    traits::SegmentationModel,
};

/// Instances at or below this confidence are dropped.
pub const SCORE_THRESHOLD: f32 = 0.5;
/// Soft mask values above this count as foreground.
pub const MASK_THRESHOLD: f32 = 0.5;
/// Class index multiplier that makes label maps visible as grayscale.
pub const CLASS_VIS_SCALE: u8 = 10;

/// Bicubic, matching the resampling used on both resize steps.
const FILTER: FilterType = FilterType::CatmullRom;

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| SegError::ImageProcessing {
        operation: "decode upload".to_string(),
        source: Box::new(e),
    })
}

/// Resizes to `image_size × image_size` and lays the pixels out as a
/// `[1, 3, H, W]` tensor scaled to `[0, 1]`, then optionally normalized.
pub fn preprocess(
    image: &RgbImage,
    image_size: u32,
    normalization: Option<Normalization>,
) -> Array4<f32> {
    let image = imageops::resize(image, image_size, image_size, FILTER);
    let mut tensor = image
        .as_ndarray3()
        .insert_axis(Axis(0))
        .mapv(|v| f32::from(v) / 255.0);

    if let Some(Normalization { mean, std }) = normalization {
        for (channel, mut plane) in tensor.index_axis_mut(Axis(0), 0).outer_iter_mut().enumerate() {
            plane.mapv_inplace(|v| (v - mean[channel]) / std[channel]);
        }
    }
    tensor
}

/// ORs together every confident instance mask into one 0/255 image.
///
/// With no instances at all the result is an empty `fallback_size` square.
pub fn combine_instance_masks(
    scores: ArrayView1<f32>,
    masks: ArrayView4<f32>,
    fallback_size: u32,
) -> GrayImage {
    let (count, _, height, width) = masks.dim();
    if count == 0 {
        return GrayImage::new(fallback_size, fallback_size);
    }

    let mut combined = Array2::<bool>::from_elem((height, width), false);
    for (&score, mask) in scores.iter().zip(masks.outer_iter()) {
        if score <= SCORE_THRESHOLD {
            continue;
        }
        combined.zip_mut_with(&mask.index_axis(Axis(0), 0), |on, &value| {
            *on |= value > MASK_THRESHOLD;
        });
    }

    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([if combined[[y as usize, x as usize]] { 255 } else { 0 }])
    })
}

/// Per-pixel arg-max over the class axis, scaled by [`CLASS_VIS_SCALE`].
///
/// The product wraps at 256, so class indices from 26 upward alias lower
/// intensities.
pub fn class_index_map(scores: ArrayView4<f32>) -> GrayImage {
    let scores = scores.index_axis(Axis(0), 0);
    let (_, height, width) = scores.dim();

    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let pixel = scores.slice(s![.., y as usize, x as usize]);
        let mut best = 0usize;
        for (index, &value) in pixel.iter().enumerate() {
            if value > pixel[best] {
                best = index;
            }
        }
        Luma([(best as u8).wrapping_mul(CLASS_VIS_SCALE)])
    })
}

/// Runs the whole pipeline and returns a mask the size of `image`.
pub fn segment<M: SegmentationModel + ?Sized>(model: &M, image: &DynamicImage) -> Result<GrayImage> {
    let (width, height) = image.dimensions();
    let image_size = model.input_size();
    let tensor = preprocess(&image.to_rgb8(), image_size, model.variant().normalization());

    let mask = match model.infer(tensor.view())? {
        RawOutput::Instances { scores, masks } => {
            combine_instance_masks(scores.view(), masks.view(), image_size)
        }
        RawOutput::ClassScores(scores) => class_index_map(scores.view()),
    };

    tracing::debug!(
        model_width = mask.width(),
        model_height = mask.height(),
        width,
        height,
        "mask built"
    );
    Ok(imageops::resize(&mask, width, height, FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IMAGENET;
    use image::Rgb;

    #[test]
    fn preprocess_scales_to_unit_range() {
        let image = RgbImage::from_pixel(40, 20, Rgb([255, 0, 51]));
        let tensor = preprocess(&image, 8, None);

        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        assert!((tensor[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 3, 3]].abs() < 1e-6);
        assert!((tensor[[0, 2, 3, 3]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn preprocess_applies_channel_normalization() {
        let image = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let tensor = preprocess(&image, 4, Some(IMAGENET));

        for channel in 0..3 {
            let expected = -IMAGENET.mean[channel] / IMAGENET.std[channel];
            assert!((tensor[[0, channel, 1, 2]] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn low_confidence_instances_are_ignored() {
        let scores = array![0.9, 0.5, 0.2];
        let mut masks = Array4::<f32>::zeros((3, 1, 2, 2));
        masks[[0, 0, 0, 0]] = 0.8;
        masks[[0, 0, 1, 1]] = 0.5;
        masks[[1, 0, 0, 1]] = 1.0;
        masks[[2, 0, 1, 0]] = 1.0;

        let mask = combine_instance_masks(scores.view(), masks.view(), 2);
        assert_eq!(mask.get_pixel(0, 0), &Luma([255]));
        // exactly 0.5 is not above the mask threshold
        assert_eq!(mask.get_pixel(1, 1), &Luma([0]));
        // score of exactly 0.5 is dropped
        assert_eq!(mask.get_pixel(1, 0), &Luma([0]));
        assert_eq!(mask.get_pixel(0, 1), &Luma([0]));
    }

    #[test]
    fn confident_instances_are_combined_with_or() {
        let scores = array![0.7, 0.95];
        let mut masks = Array4::<f32>::zeros((2, 1, 2, 3));
        masks[[0, 0, 0, 0]] = 0.9;
        masks[[1, 0, 1, 2]] = 0.6;
        masks[[1, 0, 0, 0]] = 0.9;

        let mask = combine_instance_masks(scores.view(), masks.view(), 2);
        assert_eq!(mask.dimensions(), (3, 2));
        let lit: Vec<_> = mask
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(lit, vec![(0, 0), (2, 1)]);
    }

    #[test]
    fn no_instances_gives_empty_mask() {
        let scores = Array1::<f32>::zeros(0);
        let masks = Array4::<f32>::zeros((0, 1, 16, 16));

        let mask = combine_instance_masks(scores.view(), masks.view(), 16);
        assert_eq!(mask.dimensions(), (16, 16));
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn class_map_takes_argmax_and_scales() {
        let mut scores = Array4::<f32>::zeros((1, 4, 1, 3));
        scores[[0, 2, 0, 0]] = 5.0;
        scores[[0, 3, 0, 1]] = 1.0;
        // pixel (2, 0) ties at zero; the first class wins

        let map = class_index_map(scores.view());
        assert_eq!(map.dimensions(), (3, 1));
        assert_eq!(map.get_pixel(0, 0), &Luma([20]));
        assert_eq!(map.get_pixel(1, 0), &Luma([30]));
        assert_eq!(map.get_pixel(2, 0), &Luma([0]));
    }

    #[test]
    fn class_map_wraps_past_u8() {
        let mut scores = Array4::<f32>::zeros((1, 30, 1, 1));
        scores[[0, 26, 0, 0]] = 1.0;

        let map = class_index_map(scores.view());
        assert_eq!(map.get_pixel(0, 0), &Luma([4]));
    }

    #[test]
    fn segment_resizes_back_to_upload_size() -> Result<()> {
        let model = crate::mocks::MockSegmentationModel::instance(64);
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 120, Rgb([10, 20, 30])));

        let mask = segment(&model, &image)?;
        assert_eq!(mask.dimensions(), (300, 120));
        Ok(())
    }
}
