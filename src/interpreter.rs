use crate::command::{CommandFactory, ExecutableCommand, ExitCode, Stdin, Stdout};
use crate::env::Environment;
use crate::external;
use crate::io_adapters::{InheritedStdin, MemReader, MemWriter};
use crate::jobs::JobRegistry;
use crate::lexer;
use crate::parser::{self, CommandSegment, Pipeline};
use anyhow::{Context, Result, bail};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs::File;
use std::io::Write;
use std::marker::PhantomData;
use std::process::{Child, ChildStdout, Stdio};
use std::thread;

pub(crate) const BANNER: &str = r"
 _     _
| |___| |__
| / __| '_ \
| \__ \ | | |
|_|___/_| |_|
";

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_GREEN: &str = "\x1b[1;32m";
const COLOR_BLUE: &str = "\x1b[1;34m";
const COLOR_RED: &str = "\x1b[1;31m";
const COLOR_YELLOW: &str = "\x1b[1;33m";

/// Factory allowing creation of instances of one built-in command type.
pub(crate) struct Factory<T> {
    _phantom: PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Factory {
            _phantom: PhantomData,
        }
    }
}

/// Where a pipeline stage takes its standard input from.
///
/// Owning the handles here means every pipe end is closed exactly once:
/// either it moves into a child's `Stdio`, or it drops with this value.
enum StageInput {
    Inherit,
    Pipe(ChildStdout),
    Buffer(Vec<u8>),
    File(File),
}

/// The interactive command interpreter.
///
/// Holds the [`Environment`] (working directory, termination flag,
/// history), the registered built-in factories, and the background job
/// registry. One line at a time passes through the lexer and parser and is
/// then launched, either as a single command or as a pipeline.
pub struct Interpreter {
    env: Environment,
    builtins: Vec<Box<dyn CommandFactory>>,
    jobs: JobRegistry,
}

impl Default for Interpreter {
    /// Create an interpreter with the full built-in set:
    /// `cd`, `help`, `exit`, `pwd`, `echo`, `clear`, `history`, `mkdir`.
    fn default() -> Self {
        use crate::builtin::*;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Help>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Clear>::default()),
            Box::new(Factory::<History>::default()),
            Box::new(Factory::<Mkdir>::default()),
        ])
    }
}

impl Interpreter {
    /// Create a new interpreter with a custom set of built-in factories.
    pub fn new(builtins: Vec<Box<dyn CommandFactory>>) -> Self {
        Interpreter {
            env: Environment::new(),
            builtins,
            jobs: JobRegistry::default(),
        }
    }

    /// The Read-Eval-Print Loop.
    ///
    /// Each iteration first collects finished background jobs, then blocks
    /// on the prompt. The loop ends cleanly on end-of-input (Ctrl-D) or
    /// after the `exit` built-in ran; Ctrl-C merely discards the current
    /// line. Errors from executing a line are reported and never break the
    /// loop.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        println!("{BANNER}");
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            for (pid, name, state) in self.jobs.reap() {
                println!("[{pid}] done: {name} ({state})");
            }

            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    // History bookkeeping failures are not worth killing
                    // the shell over.
                    if let Err(e) = rl.add_history_entry(line.as_str()) {
                        eprintln!("lsh: history: {e}");
                    }
                    if let Err(e) = self.execute_line(&line) {
                        eprintln!("lsh: {e:#}");
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// `user@host:path>> `, with the home directory shortened to `~`.
    fn prompt(&self) -> String {
        let user = std::env::var("USER").unwrap_or_else(|_| "user".to_string());
        let host = hostname();
        let cwd = self.env.current_dir.to_string_lossy();
        let path = match std::env::var("HOME") {
            Ok(home) if cwd.starts_with(home.as_str()) => {
                format!("~{}", &cwd[home.len()..])
            }
            _ => cwd.into_owned(),
        };
        format!(
            "{COLOR_RED}{user}{COLOR_GREEN}@{host}{COLOR_YELLOW}:{COLOR_BLUE}{path}{COLOR_RESET}>> "
        )
    }

    /// Records `line` in history, then tokenizes, builds and runs it.
    ///
    /// An error aborts only this line; the caller reports it and keeps the
    /// loop alive.
    pub fn execute_line(&mut self, line: &str) -> Result<ExitCode> {
        self.env.history.add(line);

        let tokens = lexer::split_into_tokens(line);
        if tokens.is_empty() {
            return Ok(0);
        }

        let mut pipeline = parser::build_pipeline(tokens)?;
        if pipeline.segments.len() == 1 {
            let segment = pipeline.segments.remove(0);
            self.launch(segment)
        } else {
            self.run_pipeline(pipeline)
        }
    }

    /// Whether the `exit` built-in has requested loop termination.
    pub fn should_exit(&self) -> bool {
        self.env.should_exit
    }

    /// Runs a single, non-piped segment: a built-in in-process, or an
    /// external child process.
    ///
    /// Redirection files are opened here and owned by this call frame, so
    /// they are released on every exit path, error or not.
    fn launch(&mut self, segment: CommandSegment) -> Result<ExitCode> {
        if segment.argv.is_empty() {
            bail!("expected a command");
        }

        let stdin: Box<dyn Stdin> = match &segment.stdin_path {
            Some(path) => Box::new(
                File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
            ),
            None => Box::new(InheritedStdin::new()),
        };
        let stdout: Box<dyn Stdout> = match &segment.stdout_path {
            Some(path) => Box::new(
                File::create(path).with_context(|| format!("cannot open {}", path.display()))?,
            ),
            None => Box::new(std::io::stdout()),
        };

        let name = &segment.argv[0];
        let args = &segment.argv[1..];

        if let Some(cmd) = self.create_builtin(name, args) {
            // Built-ins run in-process; the background flag has no effect
            // on them.
            return cmd.execute(stdin, stdout, &mut self.env);
        }

        let mut command = external::prepare(&self.env, name, args)?;
        command.stdin(stdin.stdio()).stdout(stdout.stdio());
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to start {name}"))?;

        if segment.background {
            let pid = self.jobs.register(name, child);
            println!("[{pid}] {name}");
            return Ok(0);
        }
        Ok(external::wait_foreground(name, &mut child))
    }

    /// Runs N >= 2 segments wired stdout-to-stdin.
    ///
    /// External stages run concurrently as children; built-in stages run
    /// in-process between them with buffered streams, against a private
    /// copy of the environment so a mid-pipeline `exit` cannot stop the
    /// loop. The parent waits for every spawned child before returning.
    fn run_pipeline(&mut self, pipeline: Pipeline) -> Result<ExitCode> {
        for segment in &pipeline.segments {
            if segment.argv.is_empty() {
                bail!("expected a command");
            }
        }

        // Open every redirection target up front so an unopenable file
        // aborts the whole pipeline before any child exists.
        let count = pipeline.segments.len();
        let mut stages = Vec::with_capacity(count);
        for segment in pipeline.segments {
            let in_file = match &segment.stdin_path {
                Some(path) => Some(
                    File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
                ),
                None => None,
            };
            let out_file = match &segment.stdout_path {
                Some(path) => Some(
                    File::create(path)
                        .with_context(|| format!("cannot open {}", path.display()))?,
                ),
                None => None,
            };
            stages.push((segment, in_file, out_file));
        }

        let mut children: Vec<(String, Child)> = Vec::new();
        let mut feeders: Vec<thread::JoinHandle<()>> = Vec::new();
        let mut carry = StageInput::Inherit;
        let mut last_code = 0;
        let mut final_stage_spawned = false;

        for (i, (segment, in_file, out_file)) in stages.into_iter().enumerate() {
            let is_last = i == count - 1;

            // A file redirection beats the pipe binding on both ends; a
            // dropped pipe end simply reads as end-of-input downstream.
            let mut input = std::mem::replace(&mut carry, StageInput::Inherit);
            if let Some(file) = in_file {
                input = StageInput::File(file);
            }

            let name = segment.argv[0].clone();
            let args = &segment.argv[1..];

            if let Some(cmd) = self.create_builtin(&name, args) {
                let stdin: Box<dyn Stdin> = match input {
                    StageInput::Inherit => Box::new(InheritedStdin::new()),
                    StageInput::Pipe(out) => Box::new(out),
                    StageInput::Buffer(bytes) => Box::new(MemReader::new(bytes)),
                    StageInput::File(file) => Box::new(file),
                };
                let mut stage_env = self.env.clone();

                if is_last {
                    let stdout: Box<dyn Stdout> = match out_file {
                        Some(file) => Box::new(file),
                        None => Box::new(std::io::stdout()),
                    };
                    last_code = cmd.execute(stdin, stdout, &mut stage_env).unwrap_or(1);
                } else {
                    let (writer, handle) = MemWriter::with_handle();
                    cmd.execute(stdin, Box::new(writer), &mut stage_env).ok();
                    let bytes = std::mem::take(&mut *handle.borrow_mut());
                    match out_file {
                        Some(mut file) => {
                            file.write_all(&bytes)
                                .with_context(|| format!("{name}: write failed"))?;
                            carry = StageInput::Buffer(Vec::new());
                        }
                        None => carry = StageInput::Buffer(bytes),
                    }
                }
                continue;
            }

            match external::prepare(&self.env, &name, args) {
                Ok(mut command) => {
                    let mut feed = None;
                    match input {
                        StageInput::Inherit => {
                            command.stdin(Stdio::inherit());
                        }
                        StageInput::Pipe(out) => {
                            command.stdin(Stdio::from(out));
                        }
                        StageInput::File(file) => {
                            command.stdin(Stdio::from(file));
                        }
                        StageInput::Buffer(bytes) => {
                            command.stdin(Stdio::piped());
                            feed = Some(bytes);
                        }
                    }

                    let piped_out = out_file.is_none() && !is_last;
                    match out_file {
                        Some(file) => {
                            command.stdout(Stdio::from(file));
                        }
                        None if is_last => {
                            command.stdout(Stdio::inherit());
                        }
                        None => {
                            command.stdout(Stdio::piped());
                        }
                    }

                    match command.spawn() {
                        Ok(mut child) => {
                            if let Some(bytes) = feed {
                                if let Some(mut sink) = child.stdin.take() {
                                    // The buffer can exceed the pipe
                                    // capacity, and the child won't drain
                                    // it until its own output is consumed.
                                    // Feed from a thread so the parent
                                    // stays free to spawn the remaining
                                    // stages; writing here would block.
                                    feeders.push(thread::spawn(move || {
                                        // A write error means the child
                                        // closed its input early; that is
                                        // its call.
                                        let _ = sink.write_all(&bytes);
                                    }));
                                }
                            }
                            carry = if piped_out {
                                match child.stdout.take() {
                                    Some(out) => StageInput::Pipe(out),
                                    None => StageInput::Buffer(Vec::new()),
                                }
                            } else {
                                StageInput::Buffer(Vec::new())
                            };
                            if is_last {
                                final_stage_spawned = true;
                            }
                            children.push((name, child));
                        }
                        Err(e) => {
                            eprintln!("lsh: {name}: {e}");
                            carry = StageInput::Buffer(Vec::new());
                        }
                    }
                }
                Err(e) => {
                    // An unresolvable stage feeds nothing downstream; the
                    // rest of the pipeline still runs.
                    eprintln!("lsh: {e:#}");
                    carry = StageInput::Buffer(Vec::new());
                }
            }
        }

        let total = children.len();
        for (idx, (name, mut child)) in children.into_iter().enumerate() {
            let code = external::wait_foreground(&name, &mut child);
            if final_stage_spawned && idx == total - 1 {
                last_code = code;
            }
        }
        // Every fed child has exited by now, so the feeders are done or
        // failing fast against closed pipes.
        for feeder in feeders {
            let _ = feeder.join();
        }
        Ok(last_code)
    }

    fn create_builtin(&self, name: &str, args: &[String]) -> Option<Box<dyn ExecutableCommand>> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.builtins
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, &args))
    }
}

/// The machine's hostname for the prompt.
///
/// `HOSTNAME` is a bash convenience and usually absent from the environment
/// of a directly executed process, so the kernel's view is consulted next.
fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }
    if let Ok(name) = std::fs::read_to_string("/proc/sys/kernel/hostname") {
        let name = name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
    }
    "localhost".to_string()
}
