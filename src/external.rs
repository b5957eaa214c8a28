use crate::command::ExitCode;
use crate::env::Environment;
use anyhow::{Result, anyhow};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus};

/// Locates `name` on the executable search path and prepares a command
/// running in the shell's working directory, with `args` as its arguments.
///
/// Stream bindings are left for the caller to attach, so the same
/// preparation serves the plain, redirected and piped launch paths.
pub fn prepare(env: &Environment, name: &str, args: &[String]) -> Result<Command> {
    let search_paths = std::env::var_os("PATH").unwrap_or_default();
    let path = find_command_path(&search_paths, Path::new(name))
        .ok_or_else(|| anyhow!("command not found: {name}"))?;

    let mut command = Command::new(path.as_ref());
    command.args(args).current_dir(&env.current_dir);
    Ok(command)
}

/// Blocks until the child reaches a terminal state (exit or signal), which
/// is the only kind of state change `wait` reports.
pub fn wait_foreground(name: &str, child: &mut Child) -> ExitCode {
    match child.wait() {
        Ok(status) => exit_code(status),
        Err(e) => {
            eprintln!("lsh: {name}: {e}");
            1
        }
    }
}

/// Maps a terminal process status onto a shell-style exit code; on Unix a
/// child killed by signal N reports `128 + N`.
pub fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => code,
        None => signal_code(status),
    }
}

#[cfg(unix)]
fn signal_code(status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(signal) => 128 + signal,
        None => -1,
    }
}

#[cfg(not(unix))]
fn signal_code(_status: ExitStatus) -> ExitCode {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - `./`-prefixed or multi-component relative path: returned if it exists.
/// - Single component: the first match while walking `search_paths` (PATH).
/// - Empty path: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(only), None) => find_in_path(search_paths, only.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    for dir in std::env::split_paths(search_paths) {
        let candidate = dir.join(cmd);
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
