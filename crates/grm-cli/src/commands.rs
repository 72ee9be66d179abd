use std::io::Write;

use color_eyre::{eyre::bail, Result};
use grm_core::{ConfigBackend, ConfigStore, Entries, Key, DEFAULTS, REMOTE};
use grm_storage::{
    credentials::{self, Credentials},
    machine_key::{machine_key, MachineIdProvider},
    transfer,
};
use serde::Serialize;
use tracing::debug;

use crate::{
    cli::{AuthCommand, Command, ConfigCommand, RemoteCommand, Scope},
    prompt::Prompter,
};

/// Collaborators a command needs besides the store.
pub struct Env<'a> {
    pub machine: &'a dyn MachineIdProvider,
    pub prompter: &'a mut dyn Prompter,
    pub out: &'a mut dyn Write,
}

/// Execute one command against the loaded store.
pub fn run<B: ConfigBackend>(
    command: Command,
    store: &mut ConfigStore<B>,
    env: &mut Env<'_>,
) -> Result<()> {
    debug!(?command, "running command");
    match command {
        Command::Remote(cmd) => remote(cmd, store, env),
        Command::Auth(cmd) => auth(cmd, store, env),
        Command::Config(cmd) => config(cmd, store, env),
        Command::Export { name, output } => {
            let path = output.unwrap_or_else(|| transfer::default_export_path(&name));
            let count = transfer::export_to_file(store, &name, REMOTE, &path)?;
            writeln!(
                env.out,
                "Exported {count} entries of '{name}' to {}",
                path.display()
            )?;
            Ok(())
        }
        Command::Import { file, name } => {
            let name = match name {
                Some(name) => name,
                None => match file.file_stem().and_then(|s| s.to_str()) {
                    Some(stem) => stem.to_string(),
                    None => bail!(
                        "cannot derive a remote name from {}; pass --name",
                        file.display()
                    ),
                },
            };
            let count = transfer::import_from_file(store, &file, &name, REMOTE)?;
            writeln!(env.out, "Imported {count} entries into '{name}'")?;
            Ok(())
        }
    }
}

fn remote<B: ConfigBackend>(
    cmd: RemoteCommand,
    store: &mut ConfigStore<B>,
    env: &mut Env<'_>,
) -> Result<()> {
    match cmd {
        RemoteCommand::Add {
            name,
            user,
            show_private,
        } => {
            if store.contains_named(&name, REMOTE) {
                bail!("remote '{name}' already exists");
            }
            let user = user.unwrap_or_else(|| name.clone());
            store.apply_changes(|m| {
                m.ensure_named(&name, REMOTE)?;
                m.named_set(&name, REMOTE, Key::REMOTE_USER, "", &user)?;
                m.named_set(
                    &name,
                    REMOTE,
                    Key::SHOW_PRIVATE,
                    "",
                    if show_private { "true" } else { "false" },
                )
            })?;
            writeln!(env.out, "Added remote '{name}' for GitHub user '{user}'")?;
        }
        RemoteCommand::Remove { name } => {
            require_remote(store, &name)?;
            store.apply_changes(|m| Ok(m.delete_named(&name, REMOTE)))?;
            writeln!(env.out, "Removed remote '{name}'")?;
        }
        RemoteCommand::List => {
            let names = store.named_sections(REMOTE);
            if names.is_empty() {
                writeln!(
                    env.out,
                    "No remotes yet. Add one with `grm remote add <name>`."
                )?;
            }
            for name in names {
                let user = store
                    .named_get(&name, REMOTE, Key::REMOTE_USER, "")
                    .unwrap_or_default();
                let auth = if store.named_get(&name, REMOTE, Key::PASSWORD, "").is_some() {
                    " (authenticated)"
                } else {
                    ""
                };
                writeln!(env.out, "{name}\t{user}{auth}")?;
            }
        }
    }
    Ok(())
}

fn auth<B: ConfigBackend>(
    cmd: AuthCommand,
    store: &mut ConfigStore<B>,
    env: &mut Env<'_>,
) -> Result<()> {
    match cmd {
        AuthCommand::Set { name, username } => {
            require_remote(store, &name)?;
            let username = match username {
                Some(username) => username,
                None => {
                    let current = store.named_get(&name, REMOTE, Key::USERNAME, "");
                    env.prompter.line("GitHub username:", current.as_deref())?
                }
            };
            if username.is_empty() {
                bail!("username must not be empty");
            }
            let password = env.prompter.secret("GitHub password or token:")?;
            if password.is_empty() {
                bail!("password must not be empty");
            }

            let key = machine_key(env.machine)?;
            credentials::store_credentials(
                store,
                &name,
                &Credentials { username, password },
                &key,
            )?;
            writeln!(env.out, "Stored credentials for '{name}'")?;
        }
        AuthCommand::Show { name } => {
            require_remote(store, &name)?;
            let key = machine_key(env.machine)?;
            match credentials::load_credentials(store, &name, &key)? {
                Some(creds) => {
                    writeln!(env.out, "username: {}", creds.username)?;
                    writeln!(env.out, "password: stored, decrypts on this machine")?;
                }
                None => writeln!(env.out, "No credentials stored for '{name}'")?,
            }
        }
        AuthCommand::Clear { name } => {
            require_remote(store, &name)?;
            if credentials::clear_credentials(store, &name)? {
                writeln!(env.out, "Removed credentials of '{name}'")?;
            } else {
                writeln!(env.out, "No credentials stored for '{name}'")?;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    section: String,
    entries: &'a Entries,
}

fn config<B: ConfigBackend>(
    cmd: ConfigCommand,
    store: &mut ConfigStore<B>,
    env: &mut Env<'_>,
) -> Result<()> {
    match cmd {
        ConfigCommand::Set { key, value, scope } => {
            settable(key)?;
            let specifier = scope.specifier();
            match scope.remote.as_deref() {
                Some(name) => {
                    require_remote(store, name)?;
                    store.apply_changes(|m| m.named_set(name, REMOTE, key, specifier, &value))?;
                }
                None => {
                    store.apply_changes(|m| m.set(DEFAULTS, key, specifier, &value))?;
                }
            }
            writeln!(env.out, "{} = {value}", describe(key, &scope))?;
        }
        ConfigCommand::Get { key, scope } => {
            settable(key)?;
            let specifier = scope.specifier();
            let value = match scope.remote.as_deref() {
                Some(name) => {
                    require_remote(store, name)?;
                    store.effective(name, key, specifier)
                }
                None => store.get(DEFAULTS, key, specifier),
            };
            match value {
                Some(value) => writeln!(env.out, "{value}")?,
                None => writeln!(env.out, "{} is not set", describe(key, &scope))?,
            }
        }
        ConfigCommand::Unset { key, scope } => {
            settable(key)?;
            let specifier = scope.specifier();
            let removed = match scope.remote.as_deref() {
                Some(name) => {
                    require_remote(store, name)?;
                    store.apply_changes(|m| Ok(m.named_unset(name, REMOTE, key, specifier)))?
                }
                None => store.apply_changes(|m| Ok(m.unset(DEFAULTS, key, specifier)))?,
            };
            if removed {
                writeln!(env.out, "Removed {}", describe(key, &scope))?;
            } else {
                writeln!(env.out, "{} was not set", describe(key, &scope))?;
            }
        }
        ConfigCommand::List { remote, json } => {
            let (section, entries) = match remote.as_deref() {
                Some(name) => {
                    require_remote(store, name)?;
                    (
                        REMOTE.instance(name).to_string(),
                        store.named_section(name, REMOTE),
                    )
                }
                None => (DEFAULTS.name().to_string(), store.section(DEFAULTS)),
            };
            let entries = mask_secrets(entries);

            if json {
                let listing = Listing {
                    section,
                    entries: &entries,
                };
                writeln!(env.out, "{}", serde_json::to_string_pretty(&listing)?)?;
            } else {
                writeln!(env.out, "[{section}]")?;
                for (entry, value) in &entries {
                    writeln!(env.out, "\t{entry} = {value}")?;
                }
            }
        }
    }
    Ok(())
}

fn require_remote<B: ConfigBackend>(store: &ConfigStore<B>, name: &str) -> Result<()> {
    if !store.contains_named(name, REMOTE) {
        bail!("remote '{name}' does not exist; add it with `grm remote add {name}`");
    }
    Ok(())
}

/// Credentials are only written through `grm auth`.
fn settable(key: Key) -> Result<()> {
    if !key.exportable() {
        bail!("`{key}` is a credential; use `grm auth set` instead");
    }
    Ok(())
}

fn describe(key: Key, scope: &Scope) -> String {
    let mut text = key.to_string();
    if let Some(name) = &scope.remote {
        text = format!("{name}.{text}");
    }
    if let Some(repo) = &scope.repo {
        text.push_str(&format!(" ({repo})"));
    }
    text
}

fn mask_secrets(entries: Entries) -> Entries {
    entries
        .into_iter()
        .map(|(entry, value)| match Key::parse_entry(&entry) {
            Some((key, _)) if key == Key::PASSWORD || key == Key::SALT => {
                (entry, "********".to_string())
            }
            _ => (entry, value),
        })
        .collect()
}
