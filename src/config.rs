// src/config.rs

use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_config() {
        let yaml = r#"
video:
  source_path: "clips/test.mp4"
model:
  path: "models/yolov8n.onnx"
  confidence_threshold: 0.3
  nms_threshold: 0.5
  num_threads: 2
display:
  window_name: "Demo"
logging:
  level: "debug"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.video.source_path, "clips/test.mp4");
        assert_eq!(config.model.confidence_threshold, 0.3);
        assert_eq!(config.display.window_name, "Demo");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_optional_sections_default() {
        let yaml = r#"
video:
  source_path: "clips/test.mp4"
model:
  path: "models/yolov8n.onnx"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, yaml).unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.model.confidence_threshold, 0.25);
        assert_eq!(config.model.nms_threshold, 0.45);
        assert_eq!(config.display.window_name, "Object Detection");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/config.yaml").is_err());
    }
}
