use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::{error::SimulationError, scene::SceneConfig, simulation_parameters::SimulationParams};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parsing yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("not able to find attribute `{0}`")]
    UnknownKey(String),

    #[error("config root is not a mapping")]
    NotAMapping,

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_document(yaml: &str) -> Result<serde_yaml::Value, ConfigError> {
    if yaml.trim().is_empty() {
        return Ok(serde_yaml::Value::Null);
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Writes every key of `overwrite` into `target`, descending into nested
/// mappings. Keys `target` does not know are rejected.
fn merge_keys(target: &mut serde_yaml::Value, overwrite: serde_yaml::Value) -> Result<(), ConfigError> {
    let overwrite = match overwrite {
        serde_yaml::Value::Null => return Ok(()),
        serde_yaml::Value::Mapping(overwrite) => overwrite,
        _ => return Err(ConfigError::NotAMapping),
    };
    let mapping = target.as_mapping_mut().ok_or(ConfigError::NotAMapping)?;
    for (k, v) in overwrite {
        let slot = match mapping.get_mut(&k) {
            Some(slot) => slot,
            None => return Err(ConfigError::UnknownKey(key_name(&k))),
        };
        if slot.as_mapping().is_some() && v.as_mapping().is_some() {
            merge_keys(slot, v)?;
        } else {
            *slot = v;
        }
    }
    Ok(())
}

fn key_name(key: &serde_yaml::Value) -> String {
    match key.as_str() {
        Some(name) => name.to_string(),
        None => format!("{:?}", key),
    }
}

/// Parses simulation parameters on top of the defaults, then applies the optional overwrite document.
pub fn parse_simulation_params(yaml: &str, overwrite_yaml: Option<&str>) -> Result<SimulationParams, ConfigError> {
    let mut simulation_params_serde = serde_yaml::to_value(SimulationParams::default())?;
    merge_keys(&mut simulation_params_serde, parse_document(yaml)?)?;
    if let Some(overwrite_yaml) = overwrite_yaml {
        merge_keys(&mut simulation_params_serde, parse_document(overwrite_yaml)?)?;
    }

    let simulation_params: SimulationParams = serde_yaml::from_value(simulation_params_serde)?;
    simulation_params.validate()?;
    Ok(simulation_params)
}

pub fn load_simulation_params(path: &Path, overwrite_path: Option<&Path>) -> Result<SimulationParams, ConfigError> {
    let yaml = read(path)?;
    let overwrite_yaml = overwrite_path.map(read).transpose()?;
    parse_simulation_params(&yaml, overwrite_yaml.as_deref())
}

pub fn load_scene_config(path: &Path) -> Result<SceneConfig, ConfigError> {
    Ok(serde_yaml::from_str(&read(path)?)?)
}
