use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::classfile::{DecodeOptions, UnsupportedPolicy};
use crate::error::{ApiModelError, Result};

pub const CONFIG_ENV: &str = "API_MODEL_CONFIG";

/// Explicit session configuration. Every component the session may locate
/// is named here; nothing is discovered from global state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub components: BTreeMap<String, ComponentSpec>,
    pub unsupported: UnsupportedPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    /// Classpath roots in lookup order.
    pub roots: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ApiModelError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut config: SessionConfig =
            serde_json::from_str(&text).map_err(|e| ApiModelError::Config {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.resolve_relative_roots(path.parent().unwrap_or(Path::new("")));
        Ok(config)
    }

    /// Roots in a config file are relative to the file, not the cwd.
    fn resolve_relative_roots(&mut self, base: &Path) {
        for spec in self.components.values_mut() {
            for root in &mut spec.roots {
                if root.is_relative() {
                    *root = base.join(&*root);
                }
            }
        }
    }

    /// Appends `root` to component `id`, creating the component if needed.
    pub fn add_root(&mut self, id: impl Into<String>, root: impl Into<PathBuf>) {
        self.components
            .entry(id.into())
            .or_default()
            .roots
            .push(root.into());
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            unsupported: self.unsupported,
        }
    }
}

/// Parses a `ID=PATH` command line override.
pub fn parse_component_arg(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(ApiModelError::Config {
            path: PathBuf::from("--component"),
            reason: format!("expected ID=PATH, got {arg:?}"),
        }),
    }
}

/// `$API_MODEL_CONFIG`, else `<config dir>/api-model/session.json` when it
/// exists.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(p) = env::var(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }

    let default_path = dirs::config_dir()?.join("api-model").join("session.json");
    default_path.exists().then_some(default_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_json_and_resolves_roots_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(
            &path,
            r#"{
                "components": {
                    "core": { "roots": ["lib/core-1.0.jar", "/abs/classes"], "version": "1.0" }
                },
                "unsupported": "record"
            }"#,
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        let core = &config.components["core"];
        assert_eq!(core.roots[0], dir.path().join("lib/core-1.0.jar"));
        assert_eq!(core.roots[1], PathBuf::from("/abs/classes"));
        assert_eq!(core.version.as_deref(), Some("1.0"));
        assert_eq!(config.decode_options().unsupported, UnsupportedPolicy::Record);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{ "componentz": {} }"#).unwrap();
        assert!(matches!(
            SessionConfig::load(&path),
            Err(ApiModelError::Config { .. })
        ));
    }

    #[test]
    fn cli_overrides_add_roots() {
        let mut config = SessionConfig::default();
        let (id, path) = parse_component_arg("core=build/classes").unwrap();
        config.add_root(id, path);
        config.add_root("core", "lib/extra.jar");
        assert_eq!(config.components["core"].roots.len(), 2);
        assert_eq!(config.unsupported, UnsupportedPolicy::Fail);

        assert!(parse_component_arg("core").is_err());
        assert!(parse_component_arg("=x").is_err());
    }
}
