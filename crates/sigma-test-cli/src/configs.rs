//! Loading backend configs selected by a glob pattern.

use sigma_test_eval::{Config, parse_config};

use crate::error::{Result, RunError};

/// Backend identifier a config must declare to be used by this tool.
pub const BACKEND_ID: &str = "github.com/bradleyjkemp/sigma-go";

/// Load every config matching `pattern`, keeping those that declare
/// [`BACKEND_ID`]. No pattern means no configs.
pub fn load_configs(pattern: Option<&str>) -> Result<Vec<Config>> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(Vec::new());
    };

    let mut configs = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry?;
        let content = std::fs::read_to_string(&path).map_err(|source| RunError::ReadConfig {
            path: path.clone(),
            source,
        })?;
        let config = parse_config(&content).map_err(|source| RunError::ParseConfig {
            path: path.clone(),
            source,
        })?;

        if config.supports_backend(BACKEND_ID) {
            log::debug!("loaded config {}", path.display());
            configs.push(config);
        } else {
            log::debug!(
                "ignoring config {}: backends {:?} do not include {BACKEND_ID}",
                path.display(),
                config.backends
            );
        }
    }

    log::info!("loaded {} config(s) matching {pattern}", configs.len());
    Ok(configs)
}
