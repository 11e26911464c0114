use std::env;

use anyhow::bail;
use clap::{Parser, Subcommand};

mod complete;
mod koff;
mod kset;

/// Helper invoked by the kconfig shell functions.  Subcommands print shell
/// assignments on stdout for the calling function to eval; diagnostics go
/// to stderr.
#[derive(Parser, Debug)]
#[command(name = "kconfig-util")]
struct Cli {
    /// Enable debug-level messages
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update a session-local kubectl configuration file
    ///
    /// The KUBECONFIG environment variable is set to a path that makes the
    /// session-local configuration file active.
    Kset(kset::KsetArgs),

    /// Clean up the session-local kubectl config file
    ///
    /// Removes any session-local kubectl config file and restores the
    /// KUBECONFIG env var to its normal value.
    Koff,

    /// Print eligible auto-completion results
    ///
    /// Prints the nicknames that are valid completions of the part entered
    /// so far.
    Complete { nickname_prefix: String },

    /// Print the kconfig version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_from(effective_args()?);
    init_logging(cli.debug);

    match cli.command {
        Command::Kset(args) => kset::run(args),
        Command::Koff => koff::run(),
        Command::Complete { nickname_prefix } => complete::run(&nickname_prefix),
        Command::Version => {
            println!(env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Expands a plain "kset -" into the previously recorded kset arguments
/// before clap sees them.  "kset -" followed by further arguments is left
/// alone; the kset command then reuses only the previous nickname.
fn effective_args() -> anyhow::Result<Vec<String>> {
    let args: Vec<String> = env::args().collect();
    if args.len() == 3 && args[1] == "kset" && args[2] == "-" {
        let previous = env::var("_KCONFIG_OLDKSET").unwrap_or_default();
        if previous.is_empty() {
            bail!(
                "A kconfig nickname of \"-\" can only be used when a kconfig environment \
                 was previously in effect."
            );
        }
        let mut expanded = vec![args[0].clone(), "kset".to_string()];
        expanded.extend(kset::split_kset_args(&previous));
        return Ok(expanded);
    }
    Ok(args)
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
