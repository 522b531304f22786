pub mod chart;
pub mod classify;
pub mod histogram;
pub mod transform;

use image::DynamicImage;
use shared::ClassificationScore;
use std::sync::Arc;

use crate::storage::ImageStore;

pub use classify::ModelRegistry;
pub use histogram::histogram;
pub use transform::{TransformParams, transform};

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Failed to decode image {image_id}: {source}")]
    Decode {
        image_id: String,
        source: image::ImageError,
    },
    #[error("Model error: {0}")]
    Model(String),
    #[error("Render error: {0}")]
    Render(String),
}

/// Output of a processing function, before it is packaged for transport.
#[derive(Debug, Clone)]
pub enum Artifact {
    Scores(Vec<ClassificationScore>),
    Transformed(DynamicImage),
    Histogram(DynamicImage),
}

/// Entry points used by the request handlers. Every call resolves the image
/// from the store and recomputes its result.
#[derive(Clone)]
pub struct Processor {
    store: ImageStore,
    models: Arc<ModelRegistry>,
}

impl Processor {
    pub fn new(store: ImageStore, models: Arc<ModelRegistry>) -> Self {
        Self { store, models }
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.model_ids()
    }

    pub fn classify(&self, model_id: &str, image_id: &str) -> Result<Artifact, ProcessingError> {
        let model = self.models.get(model_id)?;
        let image = self.store.load_image(image_id)?;
        let scores = model.classify(&image)?;
        log::info!("Classified {} with {} ({} labels)", image_id, model_id, scores.len());
        Ok(Artifact::Scores(scores))
    }

    pub fn transform(&self, image_id: &str, params: &TransformParams) -> Result<Artifact, ProcessingError> {
        let image = self.store.load_image(image_id)?;
        Ok(Artifact::Transformed(transform(&image, params)))
    }

    pub fn histogram(&self, image_id: &str) -> Result<Artifact, ProcessingError> {
        let image = self.store.load_image(image_id)?;
        Ok(Artifact::Histogram(histogram(&image)?))
    }
}
