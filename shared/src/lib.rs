use serde::{Deserialize, Serialize};

/// Ranked classification output, serialized as `[[label, percent], ...]`.
pub type ClassificationScores = Vec<(String, f32)>;

#[derive(Serialize, Deserialize, Clone)]
pub struct InfoResponse {
    pub models: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct MessageResponse {
    pub message: String,
}
