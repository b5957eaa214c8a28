use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::interpreter::{BANNER, Factory};
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Names of every built-in, in the order `help` lists them.
pub const BUILTIN_NAMES: [&str; 8] = [
    "cd", "help", "exit", "pwd", "echo", "clear", "history", "mkdir",
];

/// Built-in commands known to the shell at compile time.
///
/// Built-ins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// directly in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Executes the command using the provided IO streams and environment.
    ///
    /// Return value follows shell conventions: 0 for success, non-zero for
    /// error. A built-in never terminates the interpreter by itself; `exit`
    /// requests termination through [`Environment::should_exit`].
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        mut stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        match T::execute(*self, &mut stdin, &mut stdout, env) {
            Ok(code) => Ok(code),
            Err(e) => {
                // A failing built-in aborts only its own line.
                eprintln!("lsh: {e:#}");
                Ok(1)
            }
        }
    }
}

/// Fallback command produced when argh rejects the arguments; carries the
/// usage or error text argh generated.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        _stdin: Box<dyn Stdin>,
        mut stdout: Box<dyn Stdout>,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if self.is_error {
            eprint!("{}", self.output);
            Ok(1)
        } else {
            stdout.write_all(self.output.as_bytes())?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::from_args(&[name], args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to, absolute or relative to the current one.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let Some(target) = self.target.filter(|t| !t.is_empty()) else {
            return Err(anyhow::anyhow!("expected argument to \"cd\""));
        };

        let target = PathBuf::from(target);
        let new_dir = if target.is_absolute() {
            target
        } else {
            env.current_dir.join(target)
        };

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {}", new_dir.display()))?;
        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show the built-in commands.
pub struct Help {}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{BANNER}")?;
        writeln!(stdout, "Type program names and arguments, and hit enter.")?;
        writeln!(stdout, "The following are built in:")?;
        for name in BUILTIN_NAMES {
            writeln!(stdout, "  {name}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; exiting with a specific status is not supported.
    pub args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed.
pub struct Echo {
    #[argh(switch, short = 'n')]
    /// do not output the trailing newline.
    pub no_newline: bool,

    #[argh(positional, greedy)]
    /// values to print as-is, separated by spaces.
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{s}")?;
        } else {
            writeln!(stdout, "{s}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Clear the terminal screen.
pub struct Clear {}

impl BuiltinCommand for Clear {
    fn name() -> &'static str {
        "clear"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        // Cursor to home, then erase to end of screen.
        write!(stdout, "\x1b[H\x1b[J")?;
        stdout.flush()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the retained command history, oldest first.
pub struct History {}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        for (number, line) in env.history.iter() {
            writeln!(stdout, "{number}: {line}")?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Create a directory.
pub struct Mkdir {
    #[argh(positional)]
    /// name of the directory to create.
    pub dir: Option<String>,
}

impl BuiltinCommand for Mkdir {
    fn name() -> &'static str {
        "mkdir"
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let Some(dir) = self.dir else {
            return Err(anyhow::anyhow!("mkdir: missing operand"));
        };

        let path = PathBuf::from(&dir);
        let path = if path.is_absolute() {
            path
        } else {
            env.current_dir.join(path)
        };
        fs::create_dir(&path).with_context(|| format!("mkdir: {dir}"))?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env as stdenv;
    use std::io::Cursor;
    use std::sync::{Mutex, MutexGuard, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn lock_current_dir() -> MutexGuard<'static, ()> {
        static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        MUTEX.get_or_init(|| Mutex::new(())).lock().unwrap()
    }

    fn make_unique_temp_dir() -> PathBuf {
        let mut p = stdenv::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        p.push(format!("lsh_test_{}_{}", std::process::id(), nanos));
        fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn pwd_prints_current_dir() {
        let _lock = lock_current_dir();
        let mut env = Environment::new();
        let mut out = Vec::new();

        let res = Pwd {}.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env);

        assert!(res.is_ok());
        let expected = format!("{}\n", env.current_dir.to_string_lossy());
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn echo_with_and_without_newline() {
        let mut env = Environment::new();

        let mut out = Vec::new();
        let echo = Echo {
            no_newline: false,
            args: vec!["hello".to_string(), "world".to_string()],
        };
        echo.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello world\n");

        let mut out = Vec::new();
        let echo = Echo {
            no_newline: true,
            args: vec!["foo".to_string(), "bar".to_string()],
        };
        echo.execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "foo bar");
    }

    #[test]
    fn cd_without_argument_is_an_error() {
        let _lock = lock_current_dir();
        let before = stdenv::current_dir().unwrap();
        let mut env = Environment::new();

        let res = Cd { target: None }.execute(
            &mut Cursor::new(Vec::new()),
            &mut Vec::new(),
            &mut env,
        );

        assert!(res.is_err());
        assert_eq!(stdenv::current_dir().unwrap(), before);
    }

    #[test]
    fn cd_changes_process_and_environment_dir() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir();
        let canonical = fs::canonicalize(&temp).unwrap();
        let orig = stdenv::current_dir().unwrap();

        let mut env = Environment::new();
        let cd = Cd {
            target: Some(canonical.to_string_lossy().to_string()),
        };
        let res = cd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert_eq!(env.current_dir, canonical);
        assert_eq!(fs::canonicalize(stdenv::current_dir().unwrap()).unwrap(), canonical);

        stdenv::set_current_dir(orig).expect("restore cwd");
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn cd_to_nonexistent_path_errors() {
        let _lock = lock_current_dir();
        let orig = stdenv::current_dir().unwrap();
        let mut env = Environment::new();

        let cd = Cd {
            target: Some(format!("missing_dir_{}", std::process::id())),
        };
        let res = cd.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_err());
        assert_eq!(stdenv::current_dir().unwrap(), orig);
    }

    #[test]
    fn exit_sets_the_termination_flag() {
        let mut env = Environment::new();
        let exit = Exit { args: Vec::new() };
        let res = exit.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert_eq!(res.unwrap(), 0);
        assert!(env.should_exit);
    }

    #[test]
    fn clear_emits_the_escape_sequence() {
        let mut env = Environment::new();
        let mut out = Vec::new();
        Clear {}
            .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        assert_eq!(out, b"\x1b[H\x1b[J");
    }

    #[test]
    fn history_prints_numbered_entries() {
        let mut env = Environment::new();
        env.history.add("echo one");
        env.history.add("pwd");

        let mut out = Vec::new();
        History {}
            .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "1: echo one\n2: pwd\n");
    }

    #[test]
    fn mkdir_creates_directory() {
        let _lock = lock_current_dir();
        let temp = make_unique_temp_dir();
        let mut env = Environment::new();

        let target = temp.join("made_by_builtin");
        let mkdir = Mkdir {
            dir: Some(target.to_string_lossy().to_string()),
        };
        let res = mkdir.execute(&mut Cursor::new(Vec::new()), &mut Vec::new(), &mut env);

        assert!(res.is_ok());
        assert!(target.is_dir());
        let _ = fs::remove_dir_all(temp);
    }

    #[test]
    fn mkdir_without_operand_is_an_error() {
        let mut env = Environment::new();
        let res = Mkdir { dir: None }.execute(
            &mut Cursor::new(Vec::new()),
            &mut Vec::new(),
            &mut env,
        );
        assert!(res.is_err());
    }

    #[test]
    fn help_lists_every_builtin() {
        let mut env = Environment::new();
        let mut out = Vec::new();
        Help {}
            .execute(&mut Cursor::new(Vec::new()), &mut out, &mut env)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        for name in BUILTIN_NAMES {
            assert!(text.contains(name), "help output misses {name}");
        }
    }
}
