use std::{env, fs, io};

use tracing::debug;

use kconfig::{session, Kconfig, SessionDirs};

pub fn run() -> anyhow::Result<()> {
    let kubeconfig_env = env::var("KUBECONFIG").unwrap_or_default();
    if kubeconfig_env.is_empty() {
        return Ok(());
    }

    let dirs = SessionDirs::default();
    if let Some(file) = session::existing_session_file(&kubeconfig_env, &dirs.session_dir) {
        debug!(file = %file.display(), "removing session-local config file");
        match fs::remove_file(&file) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                // Not fatal; still restore the environment below.
                eprintln!("Error removing session-local kubectl configuration file: {err}");
            }
        }
    }

    let kconfig = Kconfig::load()?;
    match kconfig
        .preferences
        .base_kubeconfig
        .as_deref()
        .filter(|base| !base.is_empty())
    {
        Some(base) => println!("export KUBECONFIG={base}"),
        None => println!("unset KUBECONFIG"),
    }

    // The koff shell function unsets _KCONFIG_KUBECTL itself.
    Ok(())
}
