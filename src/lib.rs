//! An interactive line-oriented shell.
//!
//! A line read at the prompt is split into tokens by [`lexer`], assembled
//! into a [`parser::Pipeline`] of command segments with their redirections,
//! and executed by the [`Interpreter`]: built-in commands run in-process,
//! everything else is resolved through `PATH` and spawned as a child
//! process. Stages of a pipeline are wired stdout-to-stdin, and every
//! executed line lands in a bounded [`history::History`] buffer.

mod builtin;
pub mod command;
pub mod env;
mod external;
pub mod history;
mod interpreter;
mod io_adapters;
mod jobs;
pub mod lexer;
pub mod parser;

pub use interpreter::Interpreter;
