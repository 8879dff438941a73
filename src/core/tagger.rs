use crate::core::labels::LabelSet;
use image::RgbImage;
use image::imageops::{self, FilterType};
use log::debug;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;
/// Number of labels produced per image.
pub const DEFAULT_TOP_K: usize = 5;

// ImageNet training statistics
const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, Error)]
pub enum TagError {
    #[error("Model executor failed: {0}")]
    Model(#[from] ort::Error),

    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Model returned class {index} but only {labels} labels are known")]
    UnknownClass { index: usize, labels: usize },

    #[error("Model session lock poisoned")]
    Poisoned,

    #[error("Tagging failed: {0}")]
    Other(String),
}

/// Produces descriptive labels for an image, most confident first.
pub trait Tagger: Send + Sync {
    fn tags(&self, image: &RgbImage) -> Result<Vec<String>, TagError>;
}

/// Resize to the model input and normalize into an NCHW tensor.
pub fn preprocess(image: &RgbImage) -> Array4<f32> {
    let size = INPUT_SIZE as usize;
    let resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            input[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
        }
    }
    input
}

/// Indices of the `k` highest scores in descending order; ties keep the lower index first.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    indices.truncate(k);
    indices
}

/// ImageNet classifier exported to ONNX, executed with onnxruntime.
pub struct OnnxTagger {
    session: Mutex<Session>,
    labels: LabelSet,
    top_k: usize,
}

impl OnnxTagger {
    pub fn new(model_path: &Path, labels: LabelSet, top_k: usize) -> Result<Self, TagError> {
        if !model_path.exists() {
            return Err(TagError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()?.commit_from_file(model_path)?;
        debug!("Loaded classification model {}", model_path.display());

        Ok(Self {
            session: Mutex::new(session),
            labels,
            top_k,
        })
    }

    fn scores(&self, input: Array4<f32>) -> Result<Vec<f32>, TagError> {
        let tensor = Tensor::from_array(input)?;
        let mut session = self.session.lock().map_err(|_| TagError::Poisoned)?;
        let outputs = session.run(ort::inputs![tensor])?;
        let (_shape, logits) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(logits.to_vec())
    }
}

impl Tagger for OnnxTagger {
    fn tags(&self, image: &RgbImage) -> Result<Vec<String>, TagError> {
        let scores = self.scores(preprocess(image))?;

        top_k(&scores, self.top_k)
            .into_iter()
            .map(|index| {
                self.labels
                    .get(index)
                    .map(str::to_string)
                    .ok_or(TagError::UnknownClass {
                        index,
                        labels: self.labels.len(),
                    })
            })
            .collect()
    }
}
