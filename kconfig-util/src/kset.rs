use std::env;

use anyhow::bail;
use clap::Args;
use tracing::debug;

use kconfig::{Kconfig, KconfigOptions, Preferences, Resolution, Resolver, SessionMode};

/// ASCII unit separator, used to delimit the recorded kset arguments when
/// any of them contains a blank.
const KSET_ENV_VAR_DELIMITER: char = '\x1f';

#[derive(Args, Debug)]
pub struct KsetArgs {
    /// The nickname to activate, or "-" for the previous one.  May be
    /// omitted when a nickname is already in effect.
    nickname: Option<String>,

    #[command(flatten)]
    options: KconfigOptions,
}

pub fn run(args: KsetArgs) -> anyhow::Result<()> {
    let nickname = match args.nickname.as_deref() {
        None => {
            let current = env::var("_KCONFIG_KSET").unwrap_or_default();
            let Some(nickname) = first_kset_arg(&current) else {
                bail!("A kconfig nickname must be specified unless one is already in effect.");
            };
            debug!(%nickname, "no nickname given, reusing the one in effect");
            nickname
        }
        Some("-") => {
            // A plain "kset -" is rewritten from _KCONFIG_OLDKSET in main()
            // before parsing, so reaching here means further arguments were
            // given and only the previous nickname is wanted.
            let previous = env::var("_KCONFIG_OLDKSET").unwrap_or_default();
            let Some(nickname) = first_kset_arg(&previous) else {
                bail!(
                    "A kconfig nickname of \"-\" can only be used when a previous kconfig \
                     environment is in effect."
                );
            };
            debug!(%nickname, "nickname of \"-\", reusing the previous one");
            nickname
        }
        Some(name) => name.to_string(),
    };

    let kconfig = Kconfig::load()?;
    let resolver = Resolver::new(&kconfig)?;
    let current_kubeconfig = env::var("KUBECONFIG").ok();
    let resolution = resolver.resolve(
        &nickname,
        Some(&args.options),
        SessionMode::Session,
        current_kubeconfig.as_deref(),
    )?;

    // Shell operations for the kset function to eval.
    println!("export KUBECONFIG={}", resolution.kubeconfig_env);

    let prefs = &kconfig.preferences;
    if prefs.change_prompt.unwrap_or(true) {
        println!("_KP={}", prompt_prefix(prefs, &nickname, &resolution));
    }

    // Used by the companion kubectl launcher.
    println!("export _KCONFIG_KUBECTL={}", resolution.kubectl);

    // Record the current kset request so a later bare "kset" or "kset -"
    // can reconstruct it, demoting the previous one first.
    let description = kset_args_description(&nickname, &args.options);
    let previous = env::var("_KCONFIG_KSET").unwrap_or_default();
    if !previous.is_empty() && previous != description {
        println!("export _KCONFIG_OLDKSET=\"$_KCONFIG_KSET\"");
    }
    println!("export _KCONFIG_KSET=\"{description}\"");

    Ok(())
}

/// The prefix the kset shell function splices into the prompt.
fn prompt_prefix(prefs: &Preferences, nickname: &str, resolution: &Resolution) -> String {
    let mut overrides = resolution.overrides_description.clone();
    if !overrides.is_empty() && prefs.show_overrides_in_prompt.unwrap_or(true) {
        if prefs.always_show_namespace_in_prompt && !overrides.contains("ns=") {
            overrides = format!("ns={},{}", resolution.namespace, overrides);
        }
        format!("{nickname}[{overrides}]")
    } else if prefs.always_show_namespace_in_prompt {
        format!("{nickname}[ns={}]", resolution.namespace)
    } else {
        nickname.to_string()
    }
}

/// Describes a kset environment (nickname plus overrides) as a single
/// string that can be split again later.  Fields are blank-delimited unless
/// a value contains a blank, in which case the unit separator is used.
fn kset_args_description(nickname: &str, options: &KconfigOptions) -> String {
    if options.is_empty() {
        return nickname.to_string();
    }

    let mut args = vec![nickname.to_string()];
    if let Some(value) = &options.kubeconfig {
        args.push("--kubeconfig".to_string());
        args.push(value.clone());
    }
    if let Some(value) = &options.context {
        args.push("--context".to_string());
        args.push(value.clone());
    }
    if let Some(value) = &options.namespace {
        args.push("-n".to_string());
        args.push(value.clone());
    }
    if let Some(value) = &options.user {
        args.push("--user".to_string());
        args.push(value.clone());
    }

    let delimiter = if args.iter().any(|arg| arg.contains(' ')) {
        KSET_ENV_VAR_DELIMITER
    } else {
        ' '
    };
    args.join(&delimiter.to_string())
}

/// Splits a recorded kset description back into its arguments.
pub fn split_kset_args(value: &str) -> Vec<String> {
    let delimiter = if value.contains(KSET_ENV_VAR_DELIMITER) {
        KSET_ENV_VAR_DELIMITER
    } else {
        ' '
    };
    value.split(delimiter).map(str::to_string).collect()
}

/// The nickname a recorded kset description starts with, if any.
fn first_kset_arg(value: &str) -> Option<String> {
    split_kset_args(value)
        .into_iter()
        .next()
        .filter(|nickname| !nickname.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_of_a_bare_nickname_is_the_nickname() {
        assert_eq!(
            kset_args_description("dev", &KconfigOptions::default()),
            "dev"
        );
    }

    #[test]
    fn description_round_trips_through_split() {
        let options = KconfigOptions {
            namespace: Some("myspace".to_string()),
            user: Some("admin".to_string()),
            ..Default::default()
        };
        let description = kset_args_description("dev", &options);
        assert_eq!(description, "dev -n myspace --user admin");
        assert_eq!(
            split_kset_args(&description),
            vec!["dev", "-n", "myspace", "--user", "admin"]
        );
        assert_eq!(first_kset_arg(&description).as_deref(), Some("dev"));
    }

    #[test]
    fn blanks_in_values_switch_to_the_unit_separator() {
        let options = KconfigOptions {
            namespace: Some("my space".to_string()),
            ..Default::default()
        };
        let description = kset_args_description("dev", &options);
        assert!(description.contains(KSET_ENV_VAR_DELIMITER));
        assert_eq!(
            split_kset_args(&description),
            vec!["dev", "-n", "my space"]
        );
    }

    #[test]
    fn first_kset_arg_of_empty_value_is_none() {
        assert_eq!(first_kset_arg(""), None);
    }

    fn resolution(overrides: &str, namespace: &str) -> Resolution {
        Resolution {
            kubeconfig_env: String::new(),
            kubectl: "kubectl".to_string(),
            overrides_description: overrides.to_string(),
            namespace: namespace.to_string(),
            session_file: Default::default(),
        }
    }

    #[test]
    fn prompt_is_the_nickname_without_overrides() {
        let prefs = Preferences::default();
        assert_eq!(prompt_prefix(&prefs, "dev", &resolution("", "devspace")), "dev");
    }

    #[test]
    fn prompt_includes_overrides() {
        let prefs = Preferences::default();
        assert_eq!(
            prompt_prefix(&prefs, "dev", &resolution("ns=other", "other")),
            "dev[ns=other]"
        );
    }

    #[test]
    fn prompt_can_suppress_overrides() {
        let prefs = Preferences {
            show_overrides_in_prompt: Some(false),
            ..Default::default()
        };
        assert_eq!(
            prompt_prefix(&prefs, "dev", &resolution("ns=other", "other")),
            "dev"
        );
    }

    #[test]
    fn prompt_always_shows_namespace_when_asked() {
        let prefs = Preferences {
            always_show_namespace_in_prompt: true,
            ..Default::default()
        };
        assert_eq!(
            prompt_prefix(&prefs, "dev", &resolution("", "devspace")),
            "dev[ns=devspace]"
        );
        // a namespace is prepended to overrides that don't mention one
        assert_eq!(
            prompt_prefix(&prefs, "dev", &resolution("u=admin", "devspace")),
            "dev[ns=devspace,u=admin]"
        );
        // but not duplicated when they do
        assert_eq!(
            prompt_prefix(&prefs, "dev", &resolution("ns=other,u=admin", "other")),
            "dev[ns=other,u=admin]"
        );
    }
}
