use std::path::Path;

use clap::ValueEnum;
use ndarray::prelude::*;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session, SessionOutputs},
    value::TensorRef,
};
use parking_lot::Mutex;

use crate::{
    errors::{Result, SegError},
    traits::SegmentationModel,
};

/// Per-channel mean/std applied after scaling pixels to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

pub const IMAGENET: Normalization = Normalization {
    mean: [0.485, 0.456, 0.406],
    std: [0.229, 0.224, 0.225],
};

/// Output style of the loaded network, chosen at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Variant {
    /// Mask R-CNN style: per-instance masks with confidence scores.
    Instance,
    /// DeepLabV3 style: per-pixel class scores.
    Semantic,
}

impl Variant {
    pub const fn default_input_size(self) -> u32 {
        match self {
            Self::Instance => 256,
            Self::Semantic => 520,
        }
    }

    pub const fn normalization(self) -> Option<Normalization> {
        match self {
            Self::Instance => None,
            Self::Semantic => Some(IMAGENET),
        }
    }
}

/// Raw network output before it is turned into a mask image.
#[derive(Debug, Clone)]
pub enum RawOutput {
    /// `scores` is `[N]`, `masks` is `[N, 1, H, W]` with values in `[0, 1]`.
    Instances {
        scores: Array1<f32>,
        masks: Array4<f32>,
    },
    /// `[1, C, H, W]` class scores.
    ClassScores(Array4<f32>),
}

pub struct OnnxModel {
    variant: Variant,
    image_size: u32,
    input_name: String,
    /// torchvision detection exports take `[3, H, W]` instead of `[1, 3, H, W]`.
    unbatched_input: bool,
    session: Mutex<Session>,
}

impl OnnxModel {
    pub fn new(model_path: &Path, variant: Variant, device_id: i32) -> Result<Self> {
        let session = SessionBuilder::new()
            .map_err(|e| SegError::Model {
                operation: "session builder init".to_string(),
                source: Box::new(e),
            })?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| SegError::Model {
                operation: "execution provider setup".to_string(),
                source: Box::new(e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| SegError::Model {
                operation: format!("load model file {}", model_path.display()),
                source: Box::new(e),
            })?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| SegError::model("read model inputs", "model declares no inputs"))?;
        let shape = input
            .input_type
            .tensor_shape()
            .ok_or_else(|| SegError::model("read model input shape", "input is not a tensor"))?;
        let (unbatched_input, image_size) = input_layout(shape, variant)?;
        let input_name = input.name.clone();

        let model = Self {
            variant,
            image_size,
            input_name,
            unbatched_input,
            session: Mutex::new(session),
        };

        // warm up
        let data = Array4::<f32>::zeros((1, 3, image_size as usize, image_size as usize));
        model.infer(data.view())?;

        tracing::info!(
            path = %model_path.display(),
            ?variant,
            image_size,
            "model loaded"
        );
        Ok(model)
    }

    fn run(&self, tensor: ArrayView4<f32>) -> Result<RawOutput> {
        let mut session = self.session.lock();
        let input = if self.unbatched_input {
            tensor.index_axis_move(Axis(0), 0).into_dyn()
        } else {
            tensor.into_dyn()
        };
        let outputs = session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(&input.as_standard_layout())?
        ])?;

        match self.variant {
            Variant::Instance => {
                instance_output(extract(&outputs, "scores")?, extract(&outputs, "masks")?)
            }
            Variant::Semantic => {
                let scores = match outputs.get("out") {
                    Some(_) => extract(&outputs, "out")?,
                    None => outputs
                        .values()
                        .next()
                        .ok_or_else(|| SegError::model("read model outputs", "no outputs"))?
                        .try_extract_array::<f32>()?
                        .to_owned(),
                };
                Ok(RawOutput::ClassScores(scores.into_dimensionality::<Ix4>()?))
            }
        }
    }
}

/// Batching and square spatial size of the model input.
///
/// Rank 3 (`[3, H, W]`) is unbatched, rank 4 (`[1, 3, H, W]`) is batched.
/// Dynamic spatial axes are reported as -1 and fall back to the variant
/// default.
fn input_layout(shape: &[i64], variant: Variant) -> Result<(bool, u32)> {
    let unbatched = match shape.len() {
        3 => true,
        4 => false,
        rank => {
            return Err(SegError::model(
                "read model input shape",
                format!("expected rank 3 or 4 input, got rank {rank}"),
            ))
        }
    };
    let (height, width) = (shape[shape.len() - 2], shape[shape.len() - 1]);
    let size = match (height, width) {
        (h, w) if h > 0 && w > 0 && h != w => {
            return Err(SegError::model(
                "read model input shape",
                format!("non-square input {h}x{w} is not supported"),
            ))
        }
        (h, _) if h > 0 => h as u32,
        (_, w) if w > 0 => w as u32,
        _ => variant.default_input_size(),
    };
    Ok((unbatched, size))
}

fn instance_output(scores: ArrayD<f32>, masks: ArrayD<f32>) -> Result<RawOutput> {
    let scores = scores.into_dimensionality::<Ix1>()?;
    let masks = masks.into_dimensionality::<Ix4>()?;
    if scores.len() != masks.dim().0 {
        return Err(SegError::model(
            "read instance outputs",
            format!(
                "{} scores for {} masks",
                scores.len(),
                masks.dim().0
            ),
        ));
    }
    Ok(RawOutput::Instances { scores, masks })
}

fn extract(outputs: &SessionOutputs<'_>, name: &str) -> Result<ArrayD<f32>> {
    let value = outputs.get(name).ok_or_else(|| {
        SegError::model("read model outputs", format!("output `{name}` not found"))
    })?;
    Ok(value.try_extract_array::<f32>()?.to_owned())
}

impl SegmentationModel for OnnxModel {
    fn variant(&self) -> Variant {
        self.variant
    }

    fn input_size(&self) -> u32 {
        self.image_size
    }

    fn infer(&self, tensor: ArrayView4<f32>) -> Result<RawOutput> {
        self.run(tensor)
    }
}
