use image::DynamicImage;
use shared::ClassificationScores;
use std::path::Path;
use tch::nn::ModuleT;
use tch::{Kind, Tensor};

use crate::ml::preprocess;
use crate::ml::registry::{ModelRegistry, RegistryError};

pub const TOP_K: usize = 5;

#[derive(Clone)]
pub struct Classifier {
    registry: ModelRegistry,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

impl Classifier {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn classify_path(
        &self,
        model_id: &str,
        path: &Path,
    ) -> Result<ClassificationScores, ClassifyError> {
        if !path.exists() {
            return Err(ClassifyError::NotFound(path.display().to_string()));
        }
        let img = image::open(path)?;
        self.classify(model_id, &img)
    }

    pub fn classify_bytes(
        &self,
        model_id: &str,
        data: &[u8],
    ) -> Result<ClassificationScores, ClassifyError> {
        let img = image::load_from_memory(data)?;
        self.classify(model_id, &img)
    }

    /// Runs the forward pass and returns the top-5 labels with their
    /// softmax confidence as percentages, ordered by descending raw score.
    pub fn classify(
        &self,
        model_id: &str,
        img: &DynamicImage,
    ) -> Result<ClassificationScores, ClassifyError> {
        let module = self.registry.get(model_id)?;
        let labels = self.registry.labels()?;

        let input = preprocess::to_input_tensor(img).to_device(self.registry.device());
        let output = tch::no_grad(|| module.lock().unwrap().forward_t(&input, false));
        let logits = tensor_to_vec(&output);
        let percentages = tensor_to_vec(&output.softmax(-1, Kind::Float))
            .into_iter()
            .map(|p| p * 100.0)
            .collect::<Vec<_>>();

        Ok(rank(&logits, &percentages, &labels))
    }
}

/// Stable descending sort over the raw scores, truncated to the top 5.
/// Exact ties keep their original relative order.
pub fn rank(logits: &[f32], percentages: &[f32], labels: &[String]) -> ClassificationScores {
    let mut indices: Vec<usize> = (0..logits.len()).collect();
    indices.sort_by(|a, b| {
        logits[*b]
            .partial_cmp(&logits[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices.truncate(TOP_K);
    indices
        .into_iter()
        .map(|i| {
            let label = labels
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("class {i}"));
            (label, percentages.get(i).copied().unwrap_or(0.0))
        })
        .collect()
}

fn tensor_to_vec(tensor: &Tensor) -> Vec<f32> {
    let flat = tensor.to_kind(Kind::Float).view([-1]);
    let num_elements = flat.size()[0] as usize;
    let mut out = vec![0.0f32; num_elements];
    flat.copy_data(&mut out, num_elements);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("label-{i}")).collect()
    }

    fn softmax_percentages(logits: &[f32]) -> Vec<f32> {
        let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum * 100.0).collect()
    }

    #[test]
    fn returns_exactly_five_ranked_entries() {
        let logits: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let percentages = softmax_percentages(&logits);
        let ranked = rank(&logits, &percentages, &labels(10));

        assert_eq!(ranked.len(), TOP_K);
        assert_eq!(ranked[0].0, "label-9");
        for window in ranked.windows(2) {
            assert!(window[0].1 >= window[1].1);
        }
        for (_, pct) in &ranked {
            assert!((0.0..=100.0).contains(pct));
        }
    }

    #[test]
    fn ties_keep_their_original_order() {
        let logits = vec![1.0, 3.0, 3.0, 0.5, 3.0, 2.0];
        let percentages = softmax_percentages(&logits);
        let ranked = rank(&logits, &percentages, &labels(6));
        let names: Vec<&str> = ranked.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(names, ["label-1", "label-2", "label-4", "label-5", "label-0"]);
    }

    #[test]
    fn fewer_classes_than_top_k_returns_them_all() {
        let logits = vec![0.2, 0.9];
        let percentages = softmax_percentages(&logits);
        let ranked = rank(&logits, &percentages, &labels(2));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, "label-1");
    }

    #[test]
    fn missing_labels_fall_back_to_class_index() {
        let logits = vec![0.1, 0.2, 0.3];
        let percentages = softmax_percentages(&logits);
        let ranked = rank(&logits, &percentages, &labels(1));
        assert_eq!(ranked[0].0, "class 2");
    }
}
