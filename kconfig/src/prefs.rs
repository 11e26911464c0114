//! The ~/.kube/kconfig.yaml preferences and nickname file, with optional
//! merging of the legacy ~/.kube/kalias.txt nickname file.

use std::{collections::BTreeMap, fs, io, path::Path};

use anyhow::Context as _;
use serde::*;
use tracing::debug;

use crate::kube_dir;

/// The format of the ~/.kube/kconfig.yaml file.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Kconfig {
    pub preferences: Preferences,
    pub nicknames: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct Preferences {
    /// The kubectl executable to use when a nickname definition doesn't name
    /// one.  Defaults to "kubectl".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_kubectl: Option<String>,

    /// Whether kset emits shell code to modify the prompt.  Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_prompt: Option<bool>,

    /// Whether overrides are included in the shell prompt when it's being
    /// modified.  Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_overrides_in_prompt: Option<bool>,

    /// Whether the effective namespace is always shown in the prompt, even
    /// when it isn't an override.
    pub always_show_namespace_in_prompt: bool,

    /// Whether ~/.kube/kalias.txt is also read as a source of nicknames.
    /// Defaults to false, unless kconfig.yaml itself doesn't exist.
    pub read_kalias_config: bool,

    /// The default KUBECONFIG search path.  Empty means ~/.kube/config.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_kubeconfig: Option<String>,
}

impl Kconfig {
    /// Reads kconfig.yaml from the user's ~/.kube directory.
    pub fn load() -> anyhow::Result<Kconfig> {
        Self::load_from(&kube_dir()?)
    }

    /// Reads kconfig.yaml (and possibly kalias.txt) from the given directory.
    pub fn load_from(kube_dir: &Path) -> anyhow::Result<Kconfig> {
        let path = kube_dir.join("kconfig.yaml");
        let mut kconfig = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Kconfig::default(),
            Ok(text) => serde_yaml::from_str(&text)
                .with_context(|| format!("Parsing \"{}\"", path.display()))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Without a kconfig.yaml, maybe the legacy kalias file exists.
                let mut kconfig = Kconfig::default();
                kconfig.preferences.read_kalias_config = true;
                kconfig
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Reading \"{}\"", path.display()))
            }
        };

        if kconfig.preferences.read_kalias_config {
            kconfig.merge_kalias(&kube_dir.join("kalias.txt"))?;
        } else {
            debug!("skipping kalias.txt");
        }

        Ok(kconfig)
    }

    /// Merges `name=definition` lines into the nickname map.  Definitions
    /// from kconfig.yaml take precedence.
    fn merge_kalias(&mut self, path: &Path) -> anyhow::Result<()> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| format!("Reading \"{}\"", path.display()))
            }
        };

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((nickname, defn)) = line.split_once('=') else {
                continue;
            };
            if nickname.is_empty() || defn.is_empty() {
                continue;
            }
            self.nicknames
                .entry(nickname.to_string())
                .or_insert_with(|| defn.to_string());
        }

        Ok(())
    }

    /// Looks up a nickname's definition text.
    pub fn definition(&self, nickname: &str) -> anyhow::Result<&str> {
        self.nicknames
            .get(nickname)
            .map(String::as_str)
            .with_context(|| format!("Nickname \"{nickname}\" is not defined"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_kube_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    const KCONFIG_YAML: &str = "
preferences:
  default_kubectl: kubectl-1.28
nicknames:
  dev: --context devcontext
  prod: kubectl-prod --context prodcontext -n prodspace
";

    const KALIAS_TXT: &str = "
# legacy aliases
dev=--context legacycontext
legacy=--context other

not-a-definition
empty=
";

    #[test]
    fn parses_kconfig_yaml() {
        let dir = write_kube_dir(&[("kconfig.yaml", KCONFIG_YAML)]);
        let kconfig = Kconfig::load_from(dir.path()).unwrap();

        assert_eq!(
            kconfig.preferences.default_kubectl.as_deref(),
            Some("kubectl-1.28")
        );
        assert_eq!(kconfig.definition("dev").unwrap(), "--context devcontext");
        assert!(kconfig.definition("nope").is_err());
    }

    #[test]
    fn kalias_ignored_unless_enabled() {
        let dir = write_kube_dir(&[("kconfig.yaml", KCONFIG_YAML), ("kalias.txt", KALIAS_TXT)]);
        let kconfig = Kconfig::load_from(dir.path()).unwrap();
        assert!(kconfig.definition("legacy").is_err());
    }

    #[test]
    fn kalias_merge_prefers_kconfig_yaml() {
        let yaml = "
preferences:
  read_kalias_config: true
nicknames:
  dev: --context devcontext
";
        let dir = write_kube_dir(&[("kconfig.yaml", yaml), ("kalias.txt", KALIAS_TXT)]);
        let kconfig = Kconfig::load_from(dir.path()).unwrap();

        // kconfig.yaml wins for "dev"; "legacy" comes from kalias.txt
        assert_eq!(kconfig.definition("dev").unwrap(), "--context devcontext");
        assert_eq!(kconfig.definition("legacy").unwrap(), "--context other");
        // comment, malformed, and empty-definition lines are dropped
        assert!(kconfig.definition("not-a-definition").is_err());
        assert!(kconfig.definition("empty").is_err());
    }

    #[test]
    fn missing_kconfig_yaml_enables_kalias() {
        let dir = write_kube_dir(&[("kalias.txt", "dev=--context fromkalias\n")]);
        let kconfig = Kconfig::load_from(dir.path()).unwrap();
        assert_eq!(kconfig.definition("dev").unwrap(), "--context fromkalias");
    }

    #[test]
    fn missing_both_files_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let kconfig = Kconfig::load_from(dir.path()).unwrap();
        assert!(kconfig.nicknames.is_empty());
    }
}
