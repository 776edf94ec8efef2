use crate::SyntaxError;
use std::fmt;

/// A single step in a [`crate::FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    /// Descend into a mapping at the given key.
    MapKey(String),
    /// Descend into a sequence at the given position.
    ArrayIndex(usize),
    /// Select the single sequence element whose value at `key` satisfies
    /// `op argument`.
    Query(Query),
}

/// The comparison performed by a [`Index::Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOp {
    Eq,
}

impl fmt::Display for QueryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOp::Eq => f.write_str("="),
        }
    }
}

/// The predicate carried by a [`Index::Query`] step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub key: String,
    pub op: QueryOp,
    pub argument: String,
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    ch: u8,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        let bytes = source.as_bytes();
        let ch = bytes.first().copied().unwrap_or(0);
        Lexer {
            source,
            bytes,
            pos: 0,
            ch,
        }
    }

    fn advance(&mut self) {
        self.pos += 1;
        self.ch = self.bytes.get(self.pos).copied().unwrap_or(0);
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Parses the next `Index`, or `Ok(None)` at end of input.
    fn next_index(&mut self) -> Result<Option<Index>, SyntaxError> {
        match self.ch {
            0 if self.at_eof() => Ok(None),
            b'\'' | b'"' => self.lex_quoted().map(Some),
            b'[' => self.lex_bracket().map(Some),
            b'.' => {
                self.advance();
                self.next_index()
            }
            b']' => Err(SyntaxError::UnexpectedCharacter {
                ch: self.ch as char,
                pos: self.pos,
            }),
            ch if ch.is_ascii_digit() => Ok(Some(self.lex_number()?)),
            ch if ch.is_ascii_alphabetic() => Ok(Some(self.lex_bare_identifier())),
            ch => Err(SyntaxError::UnexpectedCharacter {
                ch: ch as char,
                pos: self.pos,
            }),
        }
    }

    fn lex_quoted(&mut self) -> Result<Index, SyntaxError> {
        let open = self.ch;
        let open_pos = self.pos;
        self.advance();
        let start = self.pos;
        while !self.at_eof() && self.ch != open {
            self.advance();
        }
        if self.at_eof() {
            return Err(SyntaxError::UnterminatedQuote {
                quote: open as char,
                pos: open_pos,
            });
        }
        let key = self.source[start..self.pos].to_string();
        self.advance();
        Ok(Index::MapKey(key))
    }

    fn lex_number(&mut self) -> Result<Index, SyntaxError> {
        let start = self.pos;
        while !self.at_eof() && self.ch.is_ascii_digit() {
            self.advance();
        }
        let digits = &self.source[start..self.pos];
        let index = digits.parse::<usize>().map_err(|_| SyntaxError::UnexpectedCharacter {
            ch: digits.chars().next().unwrap_or('\0'),
            pos: start,
        })?;
        Ok(Index::ArrayIndex(index))
    }

    fn lex_bare_identifier(&mut self) -> Index {
        let start = self.pos;
        while !self.at_eof() && (self.ch.is_ascii_alphanumeric()) {
            self.advance();
        }
        Index::MapKey(self.source[start..self.pos].to_string())
    }

    /// Lexes the content of a `[...]` bracket. A bare identifier followed
    /// by `=` becomes the left operand of a `Query`; otherwise the
    /// contained index is returned unchanged.
    fn lex_bracket(&mut self) -> Result<Index, SyntaxError> {
        let open_pos = self.pos;
        self.advance();
        let inner = self.next_index_inner_map_key()?;
        match self.ch {
            b'=' => {
                self.advance();
                let arg = self.next_index_inner_map_key()?;
                if self.ch != b']' {
                    return Err(SyntaxError::UnterminatedBracket { pos: open_pos });
                }
                self.advance();
                let key = match inner {
                    Index::MapKey(k) => k,
                    _ => {
                        return Err(SyntaxError::UnexpectedCharacter {
                            ch: '=',
                            pos: open_pos,
                        })
                    }
                };
                let argument = match arg {
                    Index::MapKey(v) => v,
                    Index::ArrayIndex(v) => v.to_string(),
                    Index::Query(_) => {
                        return Err(SyntaxError::UnexpectedCharacter {
                            ch: '=',
                            pos: open_pos,
                        })
                    }
                };
                Ok(Index::Query(Query {
                    key,
                    op: QueryOp::Eq,
                    argument,
                }))
            }
            b']' => {
                self.advance();
                Ok(inner)
            }
            _ if self.at_eof() => Err(SyntaxError::UnexpectedEof { pos: self.pos }),
            ch => Err(SyntaxError::UnexpectedCharacter {
                ch: ch as char,
                pos: self.pos,
            }),
        }
    }

    /// Like `next_index`, but a bare identifier inside brackets is always
    /// a `MapKey`, never an `ArrayIndex` — matching the grammar rule that
    /// `foo[0]` is positional but `foo[name=main]`'s `name` is a key.
    fn next_index_inner_map_key(&mut self) -> Result<Index, SyntaxError> {
        match self.ch {
            b'\'' | b'"' => self.lex_quoted(),
            ch if ch.is_ascii_digit() => self.lex_number(),
            ch if ch.is_ascii_alphabetic() => Ok(self.lex_bare_identifier()),
            0 if self.at_eof() => Err(SyntaxError::UnexpectedEof { pos: self.pos }),
            ch => Err(SyntaxError::UnexpectedCharacter {
                ch: ch as char,
                pos: self.pos,
            }),
        }
    }
}

pub(crate) fn lex(source: &str) -> Result<Vec<Index>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    let mut indexes = Vec::new();
    while let Some(index) = lexer.next_index()? {
        indexes.push(index);
    }
    Ok(indexes)
}
