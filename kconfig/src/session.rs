//! Synthesis of session-local kubectl config files.
//!
//! A session-local file is a minimal kubectl config: either a bare
//! `current-context` pointer into the base configuration, or, when the
//! namespace or user is overridden, a single renamed copy of the base
//! context.  The base configuration itself is only ever read.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context as _};
use tracing::debug;

use crate::clean;
use crate::direct;
use crate::kube_dir;
use crate::nickname::{parse_definition, KconfigOptions};
use crate::prefs::Kconfig;

/// Name given to the context synthesized when namespace or user overrides
/// are in play.
pub const KCONFIG_CONTEXT_NAME: &str = "kconfig_context";

const PATH_LIST_SEPARATOR: char = ':';

/// Whether a config file is being created for an interactive session or as
/// a one-shot file for a single `kubectl -k` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// One randomly named file per shell session, reused across `kset`
    /// calls by recognizing it in the first `KUBECONFIG` element.
    Session,
    /// A per-nickname file under the nicks directory.  Override options are
    /// not accepted in this mode.
    OneShot,
}

/// Where session-local files live.  Split out from the resolver so tests
/// can point it at a scratch directory.
#[derive(Debug, Clone)]
pub struct SessionDirs {
    pub session_dir: PathBuf,
    pub nickname_dir: PathBuf,
}

impl Default for SessionDirs {
    fn default() -> Self {
        let base = env::temp_dir().join("kconfig");
        SessionDirs {
            session_dir: base.join("session"),
            nickname_dir: base.join("nicks"),
        }
    }
}

/// The result of resolving a nickname into a session-local config file.
#[derive(Debug)]
pub struct Resolution {
    /// The new value for the `KUBECONFIG` environment variable: the
    /// session-local file followed by the base search path.
    pub kubeconfig_env: String,
    /// The kubectl executable to use for this nickname.
    pub kubectl: String,
    /// Short description of any command-line overrides, e.g. "ns=dev,u=admin",
    /// for use in the shell prompt.
    pub overrides_description: String,
    /// The namespace the emitted configuration lands in.
    pub namespace: String,
    /// The file that was written.
    pub session_file: PathBuf,
}

/// Derives session-local kubectl config files from nickname definitions.
/// Holds a reference to the loaded preferences; there is no global state.
pub struct Resolver<'a> {
    kconfig: &'a Kconfig,
    dirs: SessionDirs,
    default_kubeconfig: PathBuf,
}

impl<'a> Resolver<'a> {
    pub fn new(kconfig: &'a Kconfig) -> anyhow::Result<Self> {
        Ok(Resolver {
            kconfig,
            dirs: SessionDirs::default(),
            default_kubeconfig: kube_dir()?.join("config"),
        })
    }

    /// A resolver rooted at explicit directories, for tests.
    pub fn with_dirs(
        kconfig: &'a Kconfig,
        dirs: SessionDirs,
        default_kubeconfig: PathBuf,
    ) -> Self {
        Resolver {
            kconfig,
            dirs,
            default_kubeconfig,
        }
    }

    /// Creates or replaces a session-local kubectl config file for the named
    /// nickname, applying any override options on top of the nickname's own.
    ///
    /// `current_kubeconfig` is the caller's current `KUBECONFIG` value, used
    /// in session mode to find the file to reuse.  Resolving the same
    /// nickname and overrides again rewrites the same file with identical
    /// bytes.
    pub fn resolve(
        &self,
        nickname: &str,
        overrides: Option<&KconfigOptions>,
        mode: SessionMode,
        current_kubeconfig: Option<&str>,
    ) -> anyhow::Result<Resolution> {
        debug_assert!(
            mode == SessionMode::Session || overrides.is_none(),
            "override options are only valid in session mode"
        );
        let empty = KconfigOptions::default();
        let overrides = overrides.unwrap_or(&empty);

        let defn = self.kconfig.definition(nickname)?;
        debug!(nickname, definition = defn, "resolving nickname");
        let parsed =
            parse_definition(defn, self.kconfig.preferences.default_kubectl.as_deref())?;

        // The search path used for reading the base configuration.  The
        // override beats the nickname, which beats the preference; empty
        // means ~/.kube/config.  The base files are read directly rather
        // than through the KUBECONFIG environment variable, so a
        // session-local file already named there can't feed back into the
        // resolution.
        let configured_path = overrides
            .kubeconfig
            .as_deref()
            .or(parsed.options.kubeconfig.as_deref())
            .or(self.kconfig.preferences.base_kubeconfig.as_deref())
            .filter(|p| !p.is_empty());
        let (search_files, search_value) = self.expand_search_path(configured_path);
        debug!(search_path = %search_value, "reading base configuration");

        let base = clean::load_search_path(&search_files)?;

        // Figure out what context the session file should refer to.
        let context_name = overrides
            .context
            .as_deref()
            .or(parsed.options.context.as_deref())
            .or(base.current_context.as_deref());
        let Some(context_name) = context_name else {
            bail!("There is no current context in search path: {search_value}");
        };
        let context = base
            .contexts
            .get(context_name)
            .with_context(|| format!("Context \"{context_name}\" doesn't exist"))?;
        debug!(context = context_name, "selected base context");

        // A namespace or user override (from either layer) forces a new
        // context definition; otherwise a current-context pointer suffices.
        let namespace = overrides
            .namespace
            .as_deref()
            .or(parsed.options.namespace.as_deref());
        let user = overrides.user.as_deref().or(parsed.options.user.as_deref());

        let mut overrides_description = Vec::new();
        if let Some(ns) = overrides.namespace.as_deref() {
            overrides_description.push(format!("ns={ns}"));
        }
        if let Some(u) = overrides.user.as_deref() {
            overrides_description.push(format!("u={u}"));
        }

        let mut content = direct::KubeConfig::default();
        let effective_namespace;
        if namespace.is_none() && user.is_none() {
            content.current_context = Some(context_name.to_string());
            effective_namespace = context.namespace.clone();
        } else {
            let mut new_context = context.clone();
            if let Some(ns) = namespace {
                new_context.namespace = Some(ns.to_string());
            }
            if let Some(user) = user {
                new_context.user = user.to_string();
            }
            effective_namespace = new_context.namespace.clone();
            content.current_context = Some(KCONFIG_CONTEXT_NAME.to_string());
            content.contexts.push(direct::Context {
                name: KCONFIG_CONTEXT_NAME.to_string(),
                context: new_context,
            });
        }

        let (session_file, created) = self.session_file_for(nickname, mode, current_kubeconfig)?;

        let yaml = serde_yaml::to_string(&content)
            .context("Serializing the session-local kubectl configuration")?;
        if let Err(err) = fs::write(&session_file, yaml) {
            if created {
                // Don't leave behind an empty file nothing refers to.
                let _ = fs::remove_file(&session_file);
            }
            return Err(err).with_context(|| {
                format!(
                    "Error creating the session-local kubectl configuration file \"{}\"",
                    session_file.display()
                )
            });
        }
        debug!(
            file = %session_file.display(),
            created,
            "wrote session-local config file"
        );

        Ok(Resolution {
            kubeconfig_env: format!(
                "{}{}{}",
                session_file.display(),
                PATH_LIST_SEPARATOR,
                search_value
            ),
            kubectl: parsed.kubectl,
            overrides_description: overrides_description.join(","),
            namespace: effective_namespace.unwrap_or_else(|| "default".to_string()),
            session_file,
        })
    }

    /// Splits a configured search path into files to read, expanding `~`.
    /// Also returns the string to embed in the emitted `KUBECONFIG` value.
    fn expand_search_path(&self, configured: Option<&str>) -> (Vec<PathBuf>, String) {
        let Some(configured) = configured else {
            let default = self.default_kubeconfig.display().to_string();
            return (vec![self.default_kubeconfig.clone()], default);
        };

        let entries: Vec<String> = configured
            .split(PATH_LIST_SEPARATOR)
            .filter(|entry| !entry.is_empty())
            .map(|entry| shellexpand::tilde(entry).into_owned())
            .collect();
        let files = entries.iter().map(PathBuf::from).collect();
        (files, entries.join(&PATH_LIST_SEPARATOR.to_string()))
    }

    /// Picks the file to write: in session mode, the one already named in
    /// `KUBECONFIG` when there is one, otherwise a fresh randomly named
    /// file; in one-shot mode, a fixed per-nickname name.  The boolean says
    /// whether the file was newly created.
    fn session_file_for(
        &self,
        nickname: &str,
        mode: SessionMode,
        current_kubeconfig: Option<&str>,
    ) -> anyhow::Result<(PathBuf, bool)> {
        match mode {
            SessionMode::OneShot => {
                fs::create_dir_all(&self.dirs.nickname_dir).with_context(|| {
                    format!(
                        "Unable to create temporary directory \"{}\"",
                        self.dirs.nickname_dir.display()
                    )
                })?;
                Ok((
                    self.dirs.nickname_dir.join(format!("{nickname}.yaml")),
                    false,
                ))
            }
            SessionMode::Session => {
                fs::create_dir_all(&self.dirs.session_dir).with_context(|| {
                    format!(
                        "Unable to create temporary directory \"{}\"",
                        self.dirs.session_dir.display()
                    )
                })?;

                if let Some(existing) = current_kubeconfig
                    .and_then(|env| existing_session_file(env, &self.dirs.session_dir))
                {
                    debug!(file = %existing.display(), "reusing session-local config file");
                    return Ok((existing, false));
                }

                let file = tempfile::Builder::new()
                    .suffix(".yaml")
                    .tempfile_in(&self.dirs.session_dir)
                    .context("Unable to create the session-local temporary kubectl config file")?;
                let (_, path) = file
                    .keep()
                    .context("Unable to keep the session-local temporary kubectl config file")?;
                Ok((path, true))
            }
        }
    }
}

/// Interprets the passed value as a `KUBECONFIG` search path.  If its first
/// element names a session-local config file, that path is returned.
pub fn existing_session_file(kubeconfig_env: &str, session_dir: &Path) -> Option<PathBuf> {
    let first = kubeconfig_env.split(PATH_LIST_SEPARATOR).next()?;
    if first.is_empty() {
        return None;
    }
    let path = Path::new(first);
    path.starts_with(session_dir).then(|| path.to_path_buf())
}
