mod cli;
mod commands;
mod paths;
mod prompt;

use std::io;

use clap::Parser;
use color_eyre::Result;
use grm_core::ConfigStore;
use grm_storage::{file_backend::FileBackend, machine_key::SystemMachineId};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Entry point: load the config file once, run one command.
fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();
    init_tracing(cli.verbose);

    let home = paths::resolve_home(cli.home.as_deref())?;
    let backend = FileBackend::in_home(&home);
    debug!(path = %backend.path().display(), "using config file");
    let mut store = ConfigStore::open(backend)?;

    let mut prompter = prompt::TerminalPrompter;
    let mut stdout = io::stdout().lock();
    let mut env = commands::Env {
        machine: &SystemMachineId,
        prompter: &mut prompter,
        out: &mut stdout,
    };
    commands::run(cli.command, &mut store, &mut env)
}

fn init_tracing(verbose: bool) {
    // --verbose wins over RUST_LOG; otherwise stay quiet unless asked.
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
