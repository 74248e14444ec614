use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads, parses and validates a configuration file
///
/// Validation failures carry the file path, e.g.
/// `harvest.toml: selector 'recipe-header' ...`.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use recipe_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Workers: {}", config.crawler.workers);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, path)
}

/// Hex-encoded SHA-256 of the configuration file, recorded with each run
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

/// Loads a configuration and returns it with the hash of the same bytes
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content, path)?;
    Ok((config, hash_content(&content)))
}

fn parse_config(content: &str, path: &Path) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config).map_err(|e| in_file(e, path))?;
    Ok(config)
}

fn hash_content(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Prefixes a validation message with the file it came from
fn in_file(err: ConfigError, path: &Path) -> ConfigError {
    let at = |msg: String| format!("{}: {}", path.display(), msg);
    match err {
        ConfigError::Validation(msg) => ConfigError::Validation(at(msg)),
        ConfigError::InvalidUrl(msg) => ConfigError::InvalidUrl(at(msg)),
        ConfigError::InvalidPattern(msg) => ConfigError::InvalidPattern(at(msg)),
        ConfigError::InvalidSelector(msg) => ConfigError::InvalidSelector(at(msg)),
        other => other,
    }
}
