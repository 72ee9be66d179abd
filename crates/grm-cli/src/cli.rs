use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use grm_core::Key;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "grm",
    about = "GitHub Release Monitor: manage remotes, credentials and per-repository settings",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Base directory for the configuration (default: current user's home).
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,
    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Configure remote GitHub user definitions.
    #[command(subcommand)]
    Remote(RemoteCommand),
    /// Configure credentials for a remote (stored encrypted, bound to this machine).
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Set, get and remove properties of a remote or of the shared defaults.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Export a remote's properties (credentials are never exported).
    Export {
        name: String,
        /// Target file (default: `<name>.config`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import properties from an exported file into a remote.
    Import {
        file: PathBuf,
        /// Remote to import into (default: the file name without extension).
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    Add {
        name: String,
        /// GitHub user or organisation to monitor (default: the remote name).
        #[arg(long)]
        user: Option<String>,
        /// Include private repositories.
        #[arg(long)]
        show_private: bool,
    },
    Remove {
        name: String,
    },
    List,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum AuthCommand {
    /// Prompt for and store credentials.
    Set {
        name: String,
        #[arg(long)]
        username: Option<String>,
    },
    /// Show the stored username and check that the password decrypts.
    Show { name: String },
    Clear { name: String },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    Set {
        key: Key,
        value: String,
        #[command(flatten)]
        scope: Scope,
    },
    /// Print the value in effect (remote, then defaults).
    Get {
        key: Key,
        #[command(flatten)]
        scope: Scope,
    },
    Unset {
        key: Key,
        #[command(flatten)]
        scope: Scope,
    },
    List {
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        json: bool,
    },
}

/// Where a property lives: a remote (or the defaults) and optionally one repository.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    /// Remote to edit; the shared defaults when absent.
    #[arg(long)]
    pub remote: Option<String>,
    /// Repository the value applies to (overridable keys only).
    #[arg(long)]
    pub repo: Option<String>,
}

impl Scope {
    pub fn specifier(&self) -> &str {
        self.repo.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("grm").chain(args.iter().copied()))
            .expect("parse should succeed")
    }

    #[test]
    fn parses_remote_add() {
        let cli = parse(&["remote", "add", "acme", "--user", "acme-inc", "--show-private"]);
        assert_eq!(
            cli.command,
            Command::Remote(RemoteCommand::Add {
                name: "acme".into(),
                user: Some("acme-inc".into()),
                show_private: true,
            })
        );
    }

    #[test]
    fn parses_config_set_with_scope() {
        let cli = parse(&[
            "config",
            "set",
            "release-pattern",
            "^v",
            "--remote",
            "acme",
            "--repo",
            "api",
        ]);
        assert_eq!(
            cli.command,
            Command::Config(ConfigCommand::Set {
                key: Key::RELEASE_PATTERN,
                value: "^v".into(),
                scope: Scope {
                    remote: Some("acme".into()),
                    repo: Some("api".into()),
                },
            })
        );
    }

    #[test]
    fn rejects_unknown_key() {
        let err = Cli::try_parse_from(["grm", "config", "get", "colour"]).expect_err("unknown key");
        assert!(err.to_string().contains("unknown configuration key"));
    }

    #[test]
    fn global_flags_anywhere() {
        let cli = parse(&["remote", "list", "--home", "/tmp/grm", "-v"]);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/grm")));
        assert!(cli.verbose);
        assert_eq!(cli.command, Command::Remote(RemoteCommand::List));
    }

    #[test]
    fn parses_export_and_import() {
        assert_eq!(
            parse(&["export", "acme", "-o", "out.config"]).command,
            Command::Export {
                name: "acme".into(),
                output: Some(PathBuf::from("out.config")),
            }
        );
        assert_eq!(
            parse(&["import", "acme.config"]).command,
            Command::Import {
                file: PathBuf::from("acme.config"),
                name: None,
            }
        );
    }
}
