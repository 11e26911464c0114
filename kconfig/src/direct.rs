//! The kubectl config file format, as it appears on disk.

use std::{fs, path::Path};

use anyhow::Context as _;
use serde::*;
use serde_yaml::Value as YamlValue;

// region: Context
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContextSpec {
    pub cluster: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<YamlValue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Context {
    pub name: String,
    pub context: ContextSpec,
}
// endregion

// region: Cluster and User
// Cluster and user bodies are carried opaquely.  Session-local files never
// define either, and base files may use auth plugins and TLS fields there is
// no reason to model here.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub cluster: YamlValue,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub name: String,
    pub user: YamlValue,
}
// endregion

// region: Common
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    #[serde(rename = "v1")]
    #[default]
    V1,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kind {
    #[default]
    Config,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(rename = "apiVersion", default)]
    pub api_version: ApiVersion,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,
    #[serde(default = "empty_mapping")]
    pub preferences: YamlValue,
    #[serde(default)]
    pub users: Vec<User>,
}

fn empty_mapping() -> YamlValue {
    YamlValue::Mapping(Default::default())
}

impl Default for KubeConfig {
    fn default() -> Self {
        KubeConfig {
            api_version: ApiVersion::V1,
            kind: Kind::Config,
            clusters: Vec::new(),
            contexts: Vec::new(),
            current_context: None,
            preferences: empty_mapping(),
            users: Vec::new(),
        }
    }
}

impl KubeConfig {
    pub fn read_from(path: impl AsRef<Path>) -> anyhow::Result<KubeConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Opening kubectl config file \"{}\"", path.display()))?;
        // kubectl tolerates empty fragments on the search path
        if text.trim().is_empty() {
            return Ok(KubeConfig::default());
        }
        serde_yaml::from_str(&text)
            .with_context(|| format!("Parsing kubectl config file \"{}\"", path.display()))
    }
}
// endregion
