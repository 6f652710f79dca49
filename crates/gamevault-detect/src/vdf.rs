//! Reader for Valve's text KeyValues format (`.vdf`, `.acf`)
//!
//! ```text
//! "AppState"
//! {
//!     "appid"      "440"
//!     "name"       "Team Fortress 2"
//! }
//! ```
//!
//! Keys are matched case-insensitively, as Steam itself does.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VdfError {
    #[error("unexpected end of input inside a block")]
    UnexpectedEof,

    #[error("unexpected closing brace at line {0}")]
    UnexpectedClose(usize),

    #[error("key without a value at line {0}")]
    MissingValue(usize),

    #[error("unterminated string at line {0}")]
    UnterminatedString(usize),
}

/// A KeyValues node: either a string or an ordered block of children
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VdfNode {
    Value(String),
    Block(Vec<(String, VdfNode)>),
}

impl VdfNode {
    /// Child node by key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&VdfNode> {
        match self {
            VdfNode::Block(entries) => entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v),
            VdfNode::Value(_) => None,
        }
    }

    /// String child by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(VdfNode::as_str)
    }

    /// Follow a chain of keys
    pub fn path(&self, keys: &[&str]) -> Option<&VdfNode> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            VdfNode::Value(value) => Some(value),
            VdfNode::Block(_) => None,
        }
    }

    /// Ordered children of a block, empty for values
    pub fn entries(&self) -> &[(String, VdfNode)] {
        match self {
            VdfNode::Block(entries) => entries,
            VdfNode::Value(_) => &[],
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Text(String),
    Open,
    Close,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
        }
    }

    fn next_token(&mut self) -> Result<Option<(Token, usize)>, VdfError> {
        loop {
            let Some(&ch) = self.chars.peek() else {
                return Ok(None);
            };

            match ch {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() || c == '\u{feff}' => {
                    self.chars.next();
                }
                '/' => {
                    self.chars.next();
                    if self.chars.peek() == Some(&'/') {
                        // Line comment
                        for c in self.chars.by_ref() {
                            if c == '\n' {
                                self.line += 1;
                                break;
                            }
                        }
                    } else {
                        let mut text = String::from("/");
                        text.push_str(&self.bare_word());
                        return Ok(Some((Token::Text(text), self.line)));
                    }
                }
                '{' => {
                    self.chars.next();
                    return Ok(Some((Token::Open, self.line)));
                }
                '}' => {
                    self.chars.next();
                    return Ok(Some((Token::Close, self.line)));
                }
                '"' => {
                    self.chars.next();
                    let line = self.line;
                    return self.quoted().map(|text| Some((Token::Text(text), line)));
                }
                // Conditionals like [$WIN32] are ignored
                '[' => {
                    for c in self.chars.by_ref() {
                        if c == ']' {
                            break;
                        }
                    }
                }
                _ => {
                    let line = self.line;
                    return Ok(Some((Token::Text(self.bare_word()), line)));
                }
            }
        }
    }

    fn quoted(&mut self) -> Result<String, VdfError> {
        let start = self.line;
        let mut text = String::new();

        while let Some(c) = self.chars.next() {
            match c {
                '"' => return Ok(text),
                '\\' => match self.chars.next() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('\\') => text.push('\\'),
                    Some('"') => text.push('"'),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => break,
                },
                '\n' => {
                    self.line += 1;
                    text.push('\n');
                }
                other => text.push(other),
            }
        }

        Err(VdfError::UnterminatedString(start))
    }

    fn bare_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == '{' || c == '}' || c == '"' {
                break;
            }
            text.push(c);
            self.chars.next();
        }
        text
    }
}

/// Parse a whole document into a root block
pub fn parse(input: &str) -> Result<VdfNode, VdfError> {
    let mut lexer = Lexer::new(input);
    let mut stack: Vec<(String, Vec<(String, VdfNode)>)> = Vec::new();
    let mut current: Vec<(String, VdfNode)> = Vec::new();

    while let Some((token, line)) = lexer.next_token()? {
        match token {
            Token::Text(key) => match lexer.next_token()? {
                Some((Token::Text(value), _)) => current.push((key, VdfNode::Value(value))),
                Some((Token::Open, _)) => {
                    stack.push((key, std::mem::take(&mut current)));
                }
                Some((Token::Close, close_line)) => return Err(VdfError::MissingValue(close_line)),
                None => return Err(VdfError::MissingValue(line)),
            },
            Token::Open => {
                // Anonymous block, keyed by an empty string
                stack.push((String::new(), std::mem::take(&mut current)));
            }
            Token::Close => {
                let Some((key, mut parent)) = stack.pop() else {
                    return Err(VdfError::UnexpectedClose(line));
                };
                let block = VdfNode::Block(std::mem::take(&mut current));
                parent.push((key, block));
                current = parent;
            }
        }
    }

    if !stack.is_empty() {
        return Err(VdfError::UnexpectedEof);
    }

    Ok(VdfNode::Block(current))
}
