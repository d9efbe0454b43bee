use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub weights: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Configuration {
    pub models: Vec<ModelSpec>,
    pub labels: PathBuf,
    pub image_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub enhanced_dir: PathBuf,
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,
}

fn default_cleanup_delay_secs() -> u64 {
    30
}

impl Configuration {
    /// Reads the service configuration from `SERVICE_CONFIG`, falling back
    /// to `config/service.yaml` next to the manifest.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = match std::env::var("SERVICE_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => {
                let manifest_dir = std::env::var("CARGO_MANIFEST_DIR")
                    .map_err(|_| "Failed to get manifest directory")?;
                Path::new(&manifest_dir).join("config/service.yaml")
            }
        };
        Self::from_path(&config_path)
    }

    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Configuration = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    /// Re-anchors relative paths against `base` so the service can be
    /// started from any working directory.
    pub fn anchored(mut self, base: &Path) -> Self {
        for dir in [
            &mut self.labels,
            &mut self.image_dir,
            &mut self.upload_dir,
            &mut self.enhanced_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        for model in &mut self.models {
            if model.weights.is_relative() {
                model.weights = base.join(&model.weights);
            }
        }
        self
    }

    pub fn model_names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_and_applies_delay_default() {
        let yaml = r#"
models:
  - name: resnet18
    weights: models/resnet18.pt
labels: models/imagenet_classes.txt
image_dir: static/imagenet_subset
upload_dir: static/uploads
enhanced_dir: static/enhanced_images
"#;
        let config: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.model_names(), vec!["resnet18".to_string()]);
        assert_eq!(config.cleanup_delay_secs, 30);
    }

    #[test]
    fn anchors_relative_paths() {
        let yaml = r#"
models:
  - name: resnet18
    weights: models/resnet18.pt
labels: models/imagenet_classes.txt
image_dir: static/imagenet_subset
upload_dir: static/uploads
enhanced_dir: static/enhanced_images
cleanup_delay_secs: 5
"#;
        let config: Configuration = serde_yaml::from_str(yaml).unwrap();
        let config = config.anchored(Path::new("/srv/app"));
        assert_eq!(
            config.image_dir,
            PathBuf::from("/srv/app/static/imagenet_subset")
        );
        assert_eq!(
            config.models[0].weights,
            PathBuf::from("/srv/app/models/resnet18.pt")
        );
        assert_eq!(config.cleanup_delay(), Duration::from_secs(5));
    }
}
