//! Nickname definitions: a shell-quoted string naming an optional kubectl
//! executable followed by the same flags `kset` accepts as overrides.

use anyhow::{bail, Context as _};
use clap::{Args, Parser};

pub const DEFAULT_KUBECTL: &str = "kubectl";

/// The options that can appear in a nickname definition, and equally as
/// override flags on the `kset` command line.
#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct KconfigOptions {
    /// Path to the kubectl config file to use.  If not specified, the
    /// default is ~/.kube/config.
    #[arg(long, value_name = "FILE")]
    pub kubeconfig: Option<String>,

    /// The name of the context to use from the kubectl config file.  If not
    /// specified, the default context is used.
    #[arg(long, value_name = "NAME")]
    pub context: Option<String>,

    /// The namespace to use.  If not specified, the namespace associated
    /// with the specified or default context is used.
    #[arg(short = 'n', long, value_name = "NAME")]
    pub namespace: Option<String>,

    /// The user name to use.  If not specified, the user associated with
    /// the specified or default context is used.
    #[arg(long, value_name = "NAME")]
    pub user: Option<String>,
}

impl KconfigOptions {
    pub fn is_empty(&self) -> bool {
        *self == KconfigOptions::default()
    }
}

/// A parsed nickname definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicknameDefinition {
    pub options: KconfigOptions,
    /// The kubectl executable this nickname uses.
    pub kubectl: String,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct DefinitionArgs {
    #[command(flatten)]
    options: KconfigOptions,
}

/// Parses a nickname definition string.  A leading bare word (anything not
/// starting with a dash) names the kubectl executable; the rest are options.
pub fn parse_definition(
    definition: &str,
    default_kubectl: Option<&str>,
) -> anyhow::Result<NicknameDefinition> {
    let mut tokens = shlex::split(definition)
        .with_context(|| format!("Error parsing kconfig specification \"{definition}\""))?;

    if tokens.is_empty() {
        bail!("The kconfig specification is empty");
    }

    let mut kubectl = default_kubectl.unwrap_or(DEFAULT_KUBECTL).to_string();
    if !tokens[0].is_empty() && !tokens[0].starts_with('-') {
        kubectl = tokens.remove(0);
    }

    let args = DefinitionArgs::try_parse_from(tokens)
        .with_context(|| format!("Error in kconfig specification \"{definition}\""))?;

    Ok(NicknameDefinition {
        options: args.options,
        kubectl,
    })
}
