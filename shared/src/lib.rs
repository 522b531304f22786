use serde::{Deserialize, Serialize};

/// Payload of `GET /info`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InfoResponse {
    pub models: Vec<String>,
    pub images: Vec<String>,
}

/// One `(label, score)` pair, serialized as a two element array.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ClassificationScore(pub String, pub f32);

impl ClassificationScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self(label.into(), score)
    }

    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn score(&self) -> f32 {
        self.1
    }
}
