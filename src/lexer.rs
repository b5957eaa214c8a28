//! A module implementing lexical analysis (tokenization) for input lines.

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word: a command name, an argument, a filename, or the `&` marker.
    Word(String),
    /// The pipe operator, `|`.
    PipeOp,
    /// Input redirection symbol, `<`.
    RedirectLeft,
    /// Output redirection symbol, `>`.
    RedirectRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    /// Inside quotes; remembers the character that closes them.
    ReadingQuote(char),
}

struct LexingFSM {
    state: LexingState,
    buffer: String,
    tokens: Vec<Token>,
}

impl LexingFSM {
    fn new() -> Self {
        LexingFSM {
            state: LexingState::Start,
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    /// Scans the line left to right, updating the FSM state and
    /// accumulating tokens.
    ///
    /// Tokenization never fails: an unterminated quote swallows the rest
    /// of the line into the current accumulation, which is flushed at end
    /// of input like any other word.
    fn make_tokens(mut self, line: &str) -> Vec<Token> {
        for ch in line.chars() {
            match self.state {
                LexingState::Start | LexingState::ReadingWord => self.handle_unquoted(ch),
                LexingState::ReadingQuote(closer) => self.handle_quoted(ch, closer),
            }
        }
        self.flush_word();
        self.tokens
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            ' ' | '\t' | '\n' => {
                self.flush_word();
                self.state = LexingState::Start;
            }
            '|' | '<' | '>' => {
                self.flush_word();
                let token = match ch {
                    '|' => Token::PipeOp,
                    '<' => Token::RedirectLeft,
                    _ => Token::RedirectRight,
                };
                self.tokens.push(token);
                self.state = LexingState::Start;
            }
            '\'' | '"' => self.state = LexingState::ReadingQuote(ch),
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_quoted(&mut self, ch: char, closer: char) {
        if ch == closer {
            // The closing quote always ends the token, even an empty one,
            // so `""` denotes an empty argument.
            self.tokens.push(Token::Word(std::mem::take(&mut self.buffer)));
            self.state = LexingState::Start;
        } else {
            // Whitespace, operators and the other quote character are all
            // literal in here.
            self.buffer.push(ch);
        }
    }

    fn flush_word(&mut self) {
        if !self.buffer.is_empty() {
            self.tokens.push(Token::Word(std::mem::take(&mut self.buffer)));
        }
    }
}

/// Splits one input line into tokens.
///
/// Whitespace separates words and is discarded; `|`, `<` and `>` become
/// single-character operator tokens regardless of surrounding whitespace;
/// single and double quotes group characters into one word without the
/// quotes themselves. Runs of whitespace never produce empty tokens.
pub fn split_into_tokens(line: &str) -> Vec<Token> {
    LexingFSM::new().make_tokens(line)
}
