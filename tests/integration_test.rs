use image::{DynamicImage, GenericImageView, Luma, Rgb, RgbImage};
use ndarray::prelude::*;
use tempfile::TempDir;

use mask_relay::{
    pipeline::{self, segment},
    MaskStore, RawOutput, SegmentationModel, Variant,
};

// Mock model defined inside the integration tests:
// the red channel of the input tensor is returned as the mask.
#[derive(Debug, Clone)]
struct RedChannelModel {
    image_size: u32,
}

impl SegmentationModel for RedChannelModel {
    fn variant(&self) -> Variant {
        Variant::Instance
    }

    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn infer(&self, tensor: ArrayView4<f32>) -> mask_relay::Result<RawOutput> {
        let red = tensor.slice(s![.., 0..1, .., ..]).to_owned();
        Ok(RawOutput::Instances {
            scores: array![0.99],
            masks: red,
        })
    }
}

fn half_red(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([255, 0, 0])
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

#[test]
fn test_model_receives_fixed_size_tensor() {
    let model = RedChannelModel { image_size: 32 };
    let tensor = pipeline::preprocess(&half_red(300, 200).to_rgb8(), model.input_size(), None);

    assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn test_mask_follows_input_content() -> mask_relay::Result<()> {
    let model = RedChannelModel { image_size: 64 };
    let mask = segment(&model, &half_red(200, 100))?;

    assert_eq!(mask.dimensions(), (200, 100));
    assert_eq!(mask.get_pixel(10, 50), &Luma([255]));
    assert_eq!(mask.get_pixel(190, 50), &Luma([0]));
    Ok(())
}

#[test]
fn test_trait_object_pipeline_and_store() -> mask_relay::Result<()> {
    let temp_dir = TempDir::new()?;
    let store = MaskStore::open(temp_dir.path().join("masks"))?;
    let model: Box<dyn SegmentationModel> = Box::new(RedChannelModel { image_size: 16 });

    let image = half_red(300, 300);
    let mask = segment(model.as_ref(), &image)?;
    let name = store.save(&mask)?;

    assert!(name.ends_with(".png"));
    let saved = image::open(temp_dir.path().join("masks").join(&name))?;
    assert_eq!(saved.dimensions(), image.dimensions());
    Ok(())
}
