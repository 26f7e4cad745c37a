use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;

pub static CONFIG: Lazy<Config> = Lazy::new(Config::parse);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::demangler")]
    pub demangler: DemanglerConfig,
    #[serde(default = "defaults::pipeline")]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemanglerConfig {
    #[serde(default = "defaults::max_recursion")]
    pub max_recursion: u32,
    #[serde(default = "defaults::max_symbol_len")]
    pub max_symbol_len: usize,
    #[serde(default = "defaults::max_output_len")]
    pub max_output_len: usize,
    #[serde(default)]
    pub trace_failures: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// Zero means one worker per available core.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default = "defaults::parallel_threshold")]
    pub parallel_threshold: usize,
}

impl DemanglerConfig {
    /// Engine options for this configuration. The engine itself never reads [`CONFIG`].
    pub fn options(&self) -> demangler::Options {
        demangler::Options {
            max_recursion: self.max_recursion,
            max_symbol_len: self.max_symbol_len,
            max_output_len: self.max_output_len,
            trace_failures: self.trace_failures,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        defaults::config()
    }
}

impl Default for DemanglerConfig {
    fn default() -> Self {
        defaults::demangler()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        defaults::pipeline()
    }
}

/// Default values when one is missing in the config.yaml.
/// Important to note is that any update to these defaults should also be reflected in
/// `demangler::Options::default`.
mod defaults {
    pub fn config() -> super::Config {
        super::Config {
            demangler: demangler(),
            pipeline: pipeline(),
        }
    }

    pub fn demangler() -> super::DemanglerConfig {
        super::DemanglerConfig {
            max_recursion: max_recursion(),
            max_symbol_len: max_symbol_len(),
            max_output_len: max_output_len(),
            trace_failures: false,
        }
    }

    pub fn pipeline() -> super::PipelineConfig {
        super::PipelineConfig {
            worker_threads: 0,
            parallel_threshold: parallel_threshold(),
        }
    }

    pub fn max_recursion() -> u32 {
        demangler::Options::default().max_recursion
    }
    pub fn max_symbol_len() -> usize {
        demangler::Options::default().max_symbol_len
    }
    pub fn max_output_len() -> usize {
        demangler::Options::default().max_output_len
    }
    pub fn parallel_threshold() -> usize {
        512
    }
}

impl Config {
    pub fn parse() -> Self {
        let path = match dirs::config_dir() {
            Some(mut dir) => {
                dir.push("machsym");
                dir.push("config.yaml");
                dir
            }
            None => {
                log::warning!("[config::parse] No config directory found, using defaults.");
                return defaults::config();
            }
        };

        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Self {
        let raw = std::fs::read_to_string(path).unwrap_or_default();
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Self {
        // an empty document deserializes as null rather than an empty mapping
        if raw.trim().is_empty() {
            return defaults::config();
        }

        match serde_yaml::from_str(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warning!("Failed to parse config.\nError: {err}.");

                // parse everything as default
                defaults::config()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_yaml(""), Config::default());
        assert_eq!(Config::from_yaml("   \n"), Config::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_yaml(
            "demangler:\n  max_recursion: 64\n  trace_failures: true\npipeline:\n  worker_threads: 2\n",
        );

        assert_eq!(config.demangler.max_recursion, 64);
        assert!(config.demangler.trace_failures);
        assert_eq!(config.demangler.max_symbol_len, defaults::max_symbol_len());
        assert_eq!(config.pipeline.worker_threads, 2);
        assert_eq!(config.pipeline.parallel_threshold, 512);
    }

    #[test]
    fn malformed_document_falls_back() {
        let config = Config::from_yaml("demangler: [1, 2");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn options_mirror_config() {
        let config = DemanglerConfig {
            max_recursion: 10,
            max_symbol_len: 20,
            max_output_len: 30,
            trace_failures: true,
        };
        let options = config.options();

        assert_eq!(options.max_recursion, 10);
        assert_eq!(options.max_symbol_len, 20);
        assert_eq!(options.max_output_len, 30);
        assert!(options.trace_failures);
    }

    #[test]
    fn missing_file_is_default() {
        let config = Config::from_path(Path::new("/nonexistent/machsym/config.yaml"));
        assert_eq!(config, Config::default());
    }
}
