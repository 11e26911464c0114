//! A merged, map-keyed view of one or more kubectl config files, as read
//! through a `KUBECONFIG`-style search path.

use std::{collections::BTreeMap, path::Path};

use serde_yaml::Value as YamlValue;
use tracing::debug;

use crate::direct;
pub use crate::direct::ContextSpec;

#[derive(Debug, Clone, Default)]
pub struct KubeConfig {
    pub contexts: BTreeMap<String, ContextSpec>,
    pub current_context: Option<String>,
    pub clusters: BTreeMap<String, YamlValue>,
    pub users: BTreeMap<String, YamlValue>,
}

impl From<direct::KubeConfig> for KubeConfig {
    fn from(kc: direct::KubeConfig) -> Self {
        let mut clean = KubeConfig::default();
        clean.absorb(kc);
        clean
    }
}

impl KubeConfig {
    /// Merges another file into this one.  Earlier files win, both for the
    /// current context and for entries with duplicate names, matching
    /// kubectl's own merge rules.
    pub fn absorb(&mut self, kc: direct::KubeConfig) {
        if self.current_context.is_none() {
            self.current_context = kc.current_context.filter(|c| !c.is_empty());
        }

        for ctx in kc.contexts {
            self.contexts.entry(ctx.name).or_insert(ctx.context);
        }
        for cls in kc.clusters {
            self.clusters.entry(cls.name).or_insert(cls.cluster);
        }
        for usr in kc.users {
            self.users.entry(usr.name).or_insert(usr.user);
        }
    }
}

/// Reads and merges every existing file on the search path.  Files that
/// don't exist are skipped; files that exist but don't parse are fatal.
pub fn load_search_path(paths: &[impl AsRef<Path>]) -> anyhow::Result<KubeConfig> {
    let mut merged = KubeConfig::default();
    for path in paths {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "skipping missing kubectl config file");
            continue;
        }
        merged.absorb(direct::KubeConfig::read_from(path)?);
    }
    Ok(merged)
}
