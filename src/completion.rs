//! # Shell Completion Module
//!
//! Completion scripts via `clap_complete`, plus a hidden command that lists the
//! track names of the imported catalog for dynamic song completion.
//!
//! ## Usage
//!
//! ```bash
//! muziki completion bash > ~/.local/share/bash-completion/completions/muziki
//! muziki completion zsh > ~/.config/zsh/completions/_muziki
//! ```

use crate::cli::Shell;
use crate::db;
use anyhow::Result;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use log::debug;
use std::io::{self, Write};
use std::path::Path;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    let name = cmd.get_name().to_string();
    generate(gen, cmd, name, &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub const fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Track names stored in the catalog at `db_path`.
///
/// A missing or unreadable database yields no completions rather than an error.
#[must_use]
pub fn get_song_completions(db_path: &Path) -> Vec<String> {
    if !db_path.exists() {
        return Vec::new();
    }
    match db::open(db_path).and_then(|conn| db::track_names(&conn)) {
        Ok(names) => names,
        Err(err) => {
            debug!("No song completions: {err:#}");
            Vec::new()
        }
    }
}

/// Print one completion per line, quoting names with whitespace.
pub fn write_song_completions<W: Write>(out: &mut W, names: &[String]) -> Result<()> {
    for name in names {
        if name.contains(char::is_whitespace) {
            writeln!(out, "\"{}\"", name.replace('"', "\\\""))?;
        } else {
            writeln!(out, "{name}")?;
        }
    }
    Ok(())
}

/// Print completion candidates for song names to stdout.
///
/// Called by the hidden `complete-songs` command from the generated shell
/// scripts. A missing or unreadable database prints nothing.
///
/// # Errors
///
/// Fails only if stdout cannot be written.
pub fn print_song_completions(db_path: &Path) -> Result<()> {
    let names = get_song_completions(db_path);
    write_song_completions(&mut io::stdout().lock(), &names)
}
