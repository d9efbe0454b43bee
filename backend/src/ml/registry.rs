use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tch::{CModule, Device};

use crate::config::Configuration;

/// Maps configured model names to loaded TorchScript modules. Modules are
/// loaded on first use and cached for the process lifetime; a concurrent
/// load of the same model is wasted work, not an error (last insert wins).
#[derive(Clone)]
pub struct ModelRegistry {
    names: Vec<String>,
    weights: HashMap<String, PathBuf>,
    labels_path: PathBuf,
    device: Device,
    loaded: Arc<Mutex<HashMap<String, Arc<Mutex<CModule>>>>>,
    labels: Arc<Mutex<Option<Arc<Vec<String>>>>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("failed to load model {0}: {1}")]
    Load(String, tch::TchError),
    #[error("failed to read label file {0}: {1}")]
    Labels(String, std::io::Error),
    #[error("label file {0} is empty")]
    EmptyLabels(String),
}

impl ModelRegistry {
    pub fn new(config: &Configuration) -> Self {
        Self {
            names: config.model_names(),
            weights: config
                .models
                .iter()
                .map(|m| (m.name.clone(), m.weights.clone()))
                .collect(),
            labels_path: config.labels.clone(),
            device: Device::cuda_if_available(),
            loaded: Arc::new(Mutex::new(HashMap::new())),
            labels: Arc::new(Mutex::new(None)),
        }
    }

    pub fn model_names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.weights.contains_key(model_id)
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn get(&self, model_id: &str) -> Result<Arc<Mutex<CModule>>, RegistryError> {
        let weights = self
            .weights
            .get(model_id)
            .ok_or_else(|| RegistryError::UnknownModel(model_id.to_string()))?;

        if let Some(module) = self.loaded.lock().unwrap().get(model_id) {
            return Ok(Arc::clone(module));
        }

        log::info!("loading model {model_id} from {}", weights.display());
        let module = CModule::load_on_device(weights, self.device)
            .map_err(|e| RegistryError::Load(model_id.to_string(), e))?;
        let module = Arc::new(Mutex::new(module));
        self.loaded
            .lock()
            .unwrap()
            .insert(model_id.to_string(), Arc::clone(&module));
        Ok(module)
    }

    /// The label vocabulary shared by the configured model family, read
    /// from the sidecar file once and cached.
    pub fn labels(&self) -> Result<Arc<Vec<String>>, RegistryError> {
        if let Some(labels) = self.labels.lock().unwrap().as_ref() {
            return Ok(Arc::clone(labels));
        }

        let path_str = self.labels_path.display().to_string();
        let contents = std::fs::read_to_string(&self.labels_path)
            .map_err(|e| RegistryError::Labels(path_str.clone(), e))?;
        let labels: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if labels.is_empty() {
            return Err(RegistryError::EmptyLabels(path_str));
        }

        let labels = Arc::new(labels);
        *self.labels.lock().unwrap() = Some(Arc::clone(&labels));
        Ok(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelSpec;
    use std::io::Write;

    fn registry_with(dir: &std::path::Path, labels: &str) -> ModelRegistry {
        let labels_path = dir.join("classes.txt");
        let mut file = std::fs::File::create(&labels_path).unwrap();
        file.write_all(labels.as_bytes()).unwrap();

        let config = Configuration {
            models: vec![ModelSpec {
                name: "resnet18".to_string(),
                weights: dir.join("resnet18.pt"),
            }],
            labels: labels_path,
            image_dir: dir.join("images"),
            upload_dir: dir.join("uploads"),
            enhanced_dir: dir.join("enhanced"),
            cleanup_delay_secs: 30,
        };
        ModelRegistry::new(&config)
    }

    #[test]
    fn unknown_model_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), "tench\n");
        assert!(registry.contains("resnet18"));
        assert!(!registry.contains("mystery-net"));
        assert!(matches!(
            registry.get("mystery-net"),
            Err(RegistryError::UnknownModel(_))
        ));
    }

    #[test]
    fn labels_are_trimmed_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), "tench\n goldfish \n\nshark\n");
        let labels = registry.labels().unwrap();
        assert_eq!(labels.as_slice(), ["tench", "goldfish", "shark"]);

        // Second call must serve the cache even if the file disappears.
        std::fs::remove_file(dir.path().join("classes.txt")).unwrap();
        assert_eq!(registry.labels().unwrap().len(), 3);
    }

    #[test]
    fn empty_label_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(dir.path(), "\n  \n");
        assert!(matches!(
            registry.labels(),
            Err(RegistryError::EmptyLabels(_))
        ));
    }
}
