//! Builds an executable [`Pipeline`] out of the tokenizer's output.

use crate::lexer::Token;
use std::fmt;
use std::path::PathBuf;

/// One command's argument vector within a pipeline, with its own optional
/// redirections.
///
/// `argv[0]` names the program or built-in; the redirection operators and
/// their filenames, and a trailing `&`, are stripped out of `argv` during
/// building.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandSegment {
    pub argv: Vec<String>,
    /// Standard input is read from this file instead of the terminal/pipe.
    pub stdin_path: Option<PathBuf>,
    /// Standard output is written to this file (created or truncated).
    pub stdout_path: Option<PathBuf>,
    /// Run without waiting. Only ever set when this segment is the sole
    /// member of its pipeline.
    pub background: bool,
}

/// An ordered sequence of one or more segments, each stage's output feeding
/// the next stage's input. Lives only for the duration of one execute call.
#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline {
    pub segments: Vec<CommandSegment>,
}

/// Errors that abort building the whole pipeline; nothing is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsingError {
    /// A redirect operator was not followed by a filename word.
    MissingRedirectTarget(char),
}

impl fmt::Display for ParsingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsingError::MissingRedirectTarget(op) => {
                write!(f, "syntax error: expected a filename after '{op}'")
            }
        }
    }
}

impl std::error::Error for ParsingError {}

/// Partitions a token sequence into a [`Pipeline`] of command segments.
///
/// The sequence is split on `|`; zero-length runs (leading, trailing or
/// adjacent pipes) are kept as segments with an empty argv and rejected
/// later, at launch time. A final `&` marks background execution, and only
/// for a lone command: backgrounding is mutually exclusive with piping, so
/// a trailing `&` in a multi-segment pipeline stays an ordinary argument.
pub fn build_pipeline(tokens: Vec<Token>) -> Result<Pipeline, ParsingError> {
    let mut segments = Vec::new();
    let mut run = Vec::new();

    for token in tokens {
        if token == Token::PipeOp {
            segments.push(build_segment(std::mem::take(&mut run))?);
        } else {
            run.push(token);
        }
    }
    segments.push(build_segment(run)?);

    if segments.len() == 1 {
        let segment = &mut segments[0];
        if segment.argv.last().is_some_and(|arg| arg == "&") {
            segment.argv.pop();
            segment.background = true;
        }
    }

    Ok(Pipeline { segments })
}

/// Builds one segment from a pipe-free run of tokens, extracting the
/// redirection targets. A later redirect of the same kind overwrites an
/// earlier one.
fn build_segment(tokens: Vec<Token>) -> Result<CommandSegment, ParsingError> {
    let mut segment = CommandSegment::default();
    let mut tokens = tokens.into_iter();

    while let Some(token) = tokens.next() {
        match token {
            Token::Word(word) => segment.argv.push(word),
            Token::RedirectLeft => {
                segment.stdin_path = Some(redirect_target('<', &mut tokens)?);
            }
            Token::RedirectRight => {
                segment.stdout_path = Some(redirect_target('>', &mut tokens)?);
            }
            Token::PipeOp => unreachable!("pipes are split off by build_pipeline"),
        }
    }

    Ok(segment)
}

fn redirect_target(
    op: char,
    tokens: &mut impl Iterator<Item = Token>,
) -> Result<PathBuf, ParsingError> {
    match tokens.next() {
        Some(Token::Word(path)) => Ok(PathBuf::from(path)),
        _ => Err(ParsingError::MissingRedirectTarget(op)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_tokens;

    fn build(line: &str) -> Result<Pipeline, ParsingError> {
        build_pipeline(split_into_tokens(line))
    }

    #[test]
    fn simple_command() {
        let pipeline = build("echo hello world").unwrap();
        assert_eq!(pipeline.segments.len(), 1);
        let segment = &pipeline.segments[0];
        assert_eq!(segment.argv, ["echo", "hello", "world"]);
        assert_eq!(segment.stdin_path, None);
        assert_eq!(segment.stdout_path, None);
        assert!(!segment.background);
    }

    #[test]
    fn splits_into_segments_on_pipes() {
        let pipeline = build("cat notes | grep x | wc").unwrap();
        let argvs: Vec<_> = pipeline.segments.iter().map(|s| s.argv.clone()).collect();
        assert_eq!(
            argvs,
            [
                vec!["cat".to_string(), "notes".to_string()],
                vec!["grep".to_string(), "x".to_string()],
                vec!["wc".to_string()],
            ]
        );
    }

    #[test]
    fn extracts_redirections_from_argv() {
        let pipeline = build("sort -r < in.txt > out.txt").unwrap();
        let segment = &pipeline.segments[0];
        assert_eq!(segment.argv, ["sort", "-r"]);
        assert_eq!(segment.stdin_path, Some(PathBuf::from("in.txt")));
        assert_eq!(segment.stdout_path, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn later_redirect_of_same_kind_wins() {
        let pipeline = build("cmd > first > second").unwrap();
        assert_eq!(
            pipeline.segments[0].stdout_path,
            Some(PathBuf::from("second"))
        );
    }

    #[test]
    fn trailing_redirect_is_a_syntax_error() {
        assert_eq!(build("echo hi >"), Err(ParsingError::MissingRedirectTarget('>')));
        assert_eq!(build("cat <"), Err(ParsingError::MissingRedirectTarget('<')));
    }

    #[test]
    fn redirect_followed_by_operator_is_a_syntax_error() {
        assert_eq!(
            build("cat < | wc"),
            Err(ParsingError::MissingRedirectTarget('<'))
        );
    }

    #[test]
    fn trailing_ampersand_sets_background() {
        let pipeline = build("sleep 10 &").unwrap();
        let segment = &pipeline.segments[0];
        assert_eq!(segment.argv, ["sleep", "10"]);
        assert!(segment.background);
    }

    #[test]
    fn ampersand_is_ordinary_argument_in_pipelines() {
        let pipeline = build("echo hi | cat &").unwrap();
        assert_eq!(pipeline.segments.len(), 2);
        assert_eq!(pipeline.segments[1].argv, ["cat", "&"]);
        assert!(pipeline.segments.iter().all(|s| !s.background));
    }

    #[test]
    fn empty_segments_are_built_not_rejected() {
        let pipeline = build("| cat").unwrap();
        assert_eq!(pipeline.segments.len(), 2);
        assert!(pipeline.segments[0].argv.is_empty());
        assert_eq!(pipeline.segments[1].argv, ["cat"]);
    }
}
