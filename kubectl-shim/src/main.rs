//! A kubectl stand-in meant to sit ahead of the real executable on PATH.
//!
//! With a leading `-k <nickname>` it synthesizes a one-shot kconfig file and
//! points `KUBECONFIG` at it; either way it then execs the real kubectl
//! (whatever `_KCONFIG_KUBECTL` or the nickname names), passing the
//! remaining arguments through.  Unix-only, since it replaces the process.

use std::os::unix::fs::PermissionsExt as _;
use std::os::unix::process::CommandExt as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::{env, fs};

use anyhow::{bail, Context as _};
use tracing::debug;

use kconfig::{Kconfig, Resolver, SessionMode};

fn main() -> anyhow::Result<()> {
    init_logging();

    let me = env::current_exe()
        .and_then(|path| path.canonicalize())
        .context("Unable to deduce the location of this executable")?;

    let mut args: Vec<String> = env::args().skip(1).collect();
    let nickname_kubectl = resolve_leading_nickname(&mut args)?;

    let kubectl = nickname_kubectl
        .or_else(|| env::var("_KCONFIG_KUBECTL").ok().filter(|exe| !exe.is_empty()))
        .unwrap_or_else(|| "kubectl".to_string());

    let executable = find_executable(&kubectl, &me)?;
    debug!(executable = %executable.display(), "exec'ing");

    let err = Command::new(&executable).args(&args).exec();
    Err(err).with_context(|| format!("Error executing \"{}\"", executable.display()))
}

/// Handles a leading `-k`/`--kconfig <nickname>` pair: creates the one-shot
/// config file, exports it to the child through `KUBECONFIG`, strips the two
/// arguments, and returns the nickname's kubectl executable.
fn resolve_leading_nickname(args: &mut Vec<String>) -> anyhow::Result<Option<String>> {
    let Some(flag) = args
        .first()
        .filter(|flag| flag.as_str() == "-k" || flag.as_str() == "--kconfig")
        .cloned()
    else {
        return Ok(None);
    };

    let Some(nickname) = args.get(1).filter(|n| !n.starts_with('-')).cloned() else {
        bail!("The kconfig nickname is missing after the \"{flag}\" option");
    };

    let kconfig = Kconfig::load()?;
    let resolver = Resolver::new(&kconfig)?;
    let resolution = resolver.resolve(&nickname, None, SessionMode::OneShot, None)?;

    env::set_var("KUBECONFIG", &resolution.kubeconfig_env);
    args.drain(..2);

    Ok(Some(resolution.kubectl))
}

/// Locates the executable to run, never returning this binary itself.  A
/// name containing a slash is used as a path; anything else is searched for
/// on PATH.
fn find_executable(name: &str, me: &Path) -> anyhow::Result<PathBuf> {
    if name.contains('/') {
        let path = Path::new(name);
        if !is_executable(path) {
            bail!("Executable not found (or is not executable): {name}");
        }
        if is_same_file(path, me) {
            bail!("Specified path name is this executable: {}", me.display());
        }
        return Ok(path.to_path_buf());
    }

    let search = env::var_os("PATH").unwrap_or_default();
    for dir in env::split_paths(&search) {
        let dir = if dir.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            dir
        };
        let candidate = dir.join(name);
        if is_same_file(&candidate, me) {
            continue;
        }
        if is_executable(&candidate) {
            return Ok(candidate);
        }
    }

    bail!("Executable not found or is not executable: {name}")
}

fn is_executable(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => !meta.is_dir() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

fn is_same_file(path: &Path, me: &Path) -> bool {
    path.canonicalize().map(|abs| abs == me).unwrap_or(false)
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch_mode(path: &Path, mode: u32) {
        fs::write(path, "#!/bin/sh\n").unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(mode);
        fs::set_permissions(path, perms).unwrap();
    }

    #[test]
    fn path_search_skips_this_executable() {
        let dir = tempfile::tempdir().unwrap();
        let shadow = dir.path().join("bin-a");
        let real = dir.path().join("bin-b");
        fs::create_dir(&shadow).unwrap();
        fs::create_dir(&real).unwrap();

        // both dirs hold an executable "kubectl"; the first is "us"
        touch_mode(&shadow.join("kubectl"), 0o755);
        touch_mode(&real.join("kubectl"), 0o755);
        let me = shadow.join("kubectl").canonicalize().unwrap();

        env::set_var(
            "PATH",
            env::join_paths([&shadow, &real]).unwrap(),
        );
        let found = find_executable("kubectl", &me).unwrap();
        assert_eq!(found, real.join("kubectl"));
    }

    #[test]
    fn non_executable_files_are_not_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("kubectl");
        touch_mode(&plain, 0o644);
        assert!(!is_executable(&plain));

        let err = find_executable(
            &plain.display().to_string(),
            Path::new("/nonexistent/self"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not executable"));
    }
}
