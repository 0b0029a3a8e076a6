use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Optional `askdb.toml`. Every field has a flag and a default, so the
/// file only needs to name what it overrides.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub connection: Option<String>,
    pub dialect: Option<String>,
    pub bind: Option<String>,
    pub max_rows: Option<usize>,
    pub sample_rows: Option<usize>,
    pub dashboard_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl FileConfig {
    /// Load an explicit path, or `askdb.toml` in the working directory
    /// when present. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, String> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from("askdb.toml");
                if !default.exists() {
                    return Ok(FileConfig::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|err| format!("reading {}: {err}", path.display()))?;
        toml::from_str(&text).map_err(|err| format!("parsing {}: {err}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_leaves_other_fields_unset() {
        let config: FileConfig = toml::from_str("max_rows = 250\nmodel = \"gpt-4o-mini\"").unwrap();
        assert_eq!(config.max_rows, Some(250));
        assert_eq!(config.model.as_deref(), Some("gpt-4o-mini"));
        assert!(config.bind.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("max_rowz = 1").is_err());
    }
}
