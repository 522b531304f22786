use image::DynamicImage;
use shared::ClassificationScore;

use super::ProcessingError;
use crate::config::{ModelKind, ModelSpec, PaletteClass};

/// A loaded classification model.
///
/// Scores come back in the model's output order, one per label.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<ClassificationScore>, ProcessingError>;
}

/// Nearest-colour model: compares the image's mean colour against a fixed
/// set of reference colours and turns the distances into probabilities.
pub struct PaletteClassifier {
    classes: Vec<PaletteClass>,
    temperature: f32,
}

impl PaletteClassifier {
    pub fn new(classes: Vec<PaletteClass>, temperature: f32) -> Self {
        Self {
            classes,
            temperature,
        }
    }
}

impl Classifier for PaletteClassifier {
    fn classify(&self, image: &DynamicImage) -> Result<Vec<ClassificationScore>, ProcessingError> {
        if self.classes.is_empty() {
            return Err(ProcessingError::Model("palette has no classes".into()));
        }
        let rgb = image.to_rgb8();
        let count = (rgb.width() as f64) * (rgb.height() as f64);
        if count == 0.0 {
            return Err(ProcessingError::Model("image has no pixels".into()));
        }

        let mut sum = [0f64; 3];
        for p in rgb.pixels() {
            for c in 0..3 {
                sum[c] += f64::from(p[c]);
            }
        }
        let mean = sum.map(|s| s / count);

        let logits: Vec<f32> = self
            .classes
            .iter()
            .map(|class| {
                let d2: f64 = (0..3)
                    .map(|c| (mean[c] - f64::from(class.rgb[c])).powi(2))
                    .sum();
                -(d2.sqrt() as f32) / self.temperature
            })
            .collect();

        label_scores(
            self.classes.iter().map(|class| class.label.as_str()),
            softmax(&logits),
        )
    }
}

/// Pairs labels with the model output. The two must have the same length.
fn label_scores<'a>(
    labels: impl ExactSizeIterator<Item = &'a str>,
    scores: Vec<f32>,
) -> Result<Vec<ClassificationScore>, ProcessingError> {
    if labels.len() != scores.len() {
        return Err(ProcessingError::Model(format!(
            "{} labels for {} outputs",
            labels.len(),
            scores.len()
        )));
    }
    Ok(labels
        .zip(scores)
        .map(|(label, score)| ClassificationScore::new(label, score))
        .collect())
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[cfg(feature = "torch")]
mod torch {
    use image::DynamicImage;
    use image::imageops::FilterType;
    use shared::ClassificationScore;
    use std::path::Path;
    use std::sync::Mutex;
    use tch::nn::ModuleT;
    use tch::{CModule, Device, Kind, Tensor};

    use super::{Classifier, ProcessingError, label_scores};

    const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
    const STD: [f32; 3] = [0.229, 0.224, 0.225];

    /// TorchScript image classifier with ImageNet-style preprocessing.
    pub struct TorchClassifier {
        model: Mutex<CModule>,
        labels: Vec<String>,
        input_size: u32,
        device: Device,
    }

    impl TorchClassifier {
        pub fn load(path: &Path, labels: &Path, input_size: u32) -> Result<Self, ProcessingError> {
            let device = Device::cuda_if_available();
            let model = CModule::load_on_device(path, device)
                .map_err(|e| ProcessingError::Model(format!("{}: {e}", path.display())))?;
            let labels = std::fs::read_to_string(labels)
                .map_err(|e| ProcessingError::Model(format!("{}: {e}", labels.display())))?
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            Ok(Self {
                model: Mutex::new(model),
                labels,
                input_size,
                device,
            })
        }

        fn preprocess(&self, image: &DynamicImage) -> Tensor {
            let size = self.input_size;
            let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
            let plane = (size * size) as usize;
            let mut data = vec![0f32; 3 * plane];
            for (i, p) in rgb.pixels().enumerate() {
                for c in 0..3 {
                    data[c * plane + i] = (f32::from(p[c]) / 255.0 - MEAN[c]) / STD[c];
                }
            }
            Tensor::from_slice(&data)
                .view([1, 3, i64::from(size), i64::from(size)])
                .to_device(self.device)
        }
    }

    impl Classifier for TorchClassifier {
        fn classify(&self, image: &DynamicImage) -> Result<Vec<ClassificationScore>, ProcessingError> {
            let input = self.preprocess(image);
            let output = {
                let model = self
                    .model
                    .lock()
                    .map_err(|_| ProcessingError::Model("model lock poisoned".into()))?;
                tch::no_grad(|| model.forward_t(&input, false))
            };
            let output = output
                .softmax(-1, Kind::Float)
                .view([-1])
                .to_device(Device::Cpu);
            let num_elements = output.size()[0] as usize;
            let mut scores = vec![0f32; num_elements];
            output.copy_data(&mut scores, num_elements);

            label_scores(self.labels.iter().map(String::as_str), scores)
        }
    }
}

/// Models available to the service, in configuration order.
pub struct ModelRegistry {
    models: Vec<(String, Box<dyn Classifier>)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self { models: Vec::new() }
    }

    pub fn register(&mut self, id: impl Into<String>, model: Box<dyn Classifier>) {
        self.models.push((id.into(), model));
    }

    pub fn from_specs(specs: &[ModelSpec]) -> Result<Self, ProcessingError> {
        let mut registry = Self::new();
        for spec in specs {
            let model: Box<dyn Classifier> = match &spec.kind {
                ModelKind::Palette {
                    classes,
                    temperature,
                } => Box::new(PaletteClassifier::new(classes.clone(), *temperature)),
                #[cfg(feature = "torch")]
                ModelKind::Torchscript {
                    path,
                    labels,
                    input_size,
                } => Box::new(torch::TorchClassifier::load(path, labels, *input_size)?),
                #[cfg(not(feature = "torch"))]
                ModelKind::Torchscript { .. } => {
                    return Err(ProcessingError::Model(format!(
                        "model {} needs the `torch` feature",
                        spec.id
                    )));
                }
            };
            log::info!("Loaded model {}", spec.id);
            registry.register(spec.id.clone(), model);
        }
        Ok(registry)
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn get(&self, model_id: &str) -> Result<&dyn Classifier, ProcessingError> {
        self.models
            .iter()
            .find(|(id, _)| id == model_id)
            .map(|(_, model)| model.as_ref())
            .ok_or_else(|| ProcessingError::UnknownModel(model_id.to_string()))
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
