pub mod clean;
pub mod direct;
pub mod nickname;
pub mod prefs;
pub mod session;

use std::path::PathBuf;

use anyhow::Context as _;

pub use nickname::{KconfigOptions, NicknameDefinition};
pub use prefs::{Kconfig, Preferences};
pub use session::{Resolution, Resolver, SessionDirs, SessionMode};

/// The user's ~/.kube directory.
pub fn kube_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("Unable to determine the user's home directory")?
        .join(".kube"))
}
