use crate::core::{DynSqlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Sql,
    Comment,
    Else,
    BindVariable,
    Eof,
}

/// Streaming tokenizer over a two-way SQL string. Yields plain SQL runs,
/// `/* ... */` comment bodies, `-- ELSE` markers, and bare `?` bind
/// positions (named `$1`, `$2`, ... in appearance order). The parser also
/// uses `skip_token`/`skip_whitespace` to consume the test value that
/// follows a variable comment.
pub struct Tokenizer<'a> {
    sql: &'a str,
    position: usize,
    token: String,
    kind: TokenKind,
    next_kind: TokenKind,
    bind_count: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self {
            sql,
            position: 0,
            token: String::new(),
            kind: TokenKind::Sql,
            next_kind: TokenKind::Sql,
            bind_count: 0,
        }
    }

    pub fn sql(&self) -> &'a str {
        self.sql
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Everything consumed so far, including the current token.
    pub fn before(&self) -> &'a str {
        &self.sql[..self.position]
    }

    /// Everything not yet consumed.
    pub fn after(&self) -> &'a str {
        &self.sql[self.position..]
    }

    pub fn next(&mut self) -> Result<TokenKind> {
        match self.next_kind {
            TokenKind::Sql => {
                if self.parse_sql_run() {
                    // The SQL run was empty (a marker starts right here);
                    // skip straight to it instead of yielding "".
                    return self.next();
                }
            }
            TokenKind::Comment => self.parse_comment()?,
            TokenKind::Else => {
                self.token.clear();
                self.kind = TokenKind::Else;
                self.next_kind = TokenKind::Sql;
            }
            TokenKind::BindVariable => self.parse_bind_variable(),
            TokenKind::Eof => {
                self.token.clear();
                self.kind = TokenKind::Eof;
            }
        }
        Ok(self.kind)
    }

    /// Returns true when the run is empty and the caller should advance
    /// again immediately.
    fn parse_sql_run(&mut self) -> bool {
        let comment_start = find_from(self.sql, "/*", self.position);
        let bind_start = find_from(self.sql, "?", self.position);
        let else_start = self.find_else_comment();

        let candidates = [
            comment_start.map(|p| (p, TokenKind::Comment)),
            else_start.map(|(p, _)| (p, TokenKind::Else)),
            bind_start.map(|p| (p, TokenKind::BindVariable)),
        ];
        let next = candidates
            .iter()
            .flatten()
            .min_by_key(|(p, _)| *p)
            .copied();

        match next {
            None => {
                self.token = self.sql[self.position..].to_string();
                self.kind = TokenKind::Sql;
                self.next_kind = TokenKind::Eof;
                self.position = self.sql.len();
                false
            }
            Some((start, upcoming)) => {
                self.token = self.sql[self.position..start].to_string();
                self.kind = TokenKind::Sql;
                let empty = start == self.position;
                match upcoming {
                    TokenKind::Comment => {
                        self.position = start + 2;
                        self.next_kind = TokenKind::Comment;
                    }
                    TokenKind::Else => {
                        // Consume "--", the whitespace, and "ELSE" itself.
                        if let Some((_, marker_end)) = else_start {
                            self.position = marker_end;
                        }
                        self.next_kind = TokenKind::Else;
                    }
                    TokenKind::BindVariable => {
                        self.position = start;
                        self.next_kind = TokenKind::BindVariable;
                    }
                    _ => {}
                }
                empty
            }
        }
    }

    /// Detects a `-- ELSE` line marker: the first `--` ahead, with `ELSE`
    /// as the next word. Returns (marker start, end of the ELSE word).
    fn find_else_comment(&self) -> Option<(usize, usize)> {
        let start = find_from(self.sql, "--", self.position)?;
        let mut word_start = start + 2;
        for (offset, ch) in self.sql[start + 2..].char_indices() {
            if !ch.is_whitespace() {
                word_start = start + 2 + offset;
                break;
            }
        }
        let end = word_start + 4;
        if self.sql.get(word_start..end) == Some("ELSE") {
            Some((start, end))
        } else {
            None
        }
    }

    fn parse_comment(&mut self) -> Result<()> {
        let Some(end) = find_from(self.sql, "*/", self.position) else {
            return Err(DynSqlError::TemplateSyntax(format!(
                "Comment is not terminated with '*/': fragment='{}' at position {}",
                &self.sql[self.position..],
                self.position
            )));
        };
        self.token = self.sql[self.position..end].to_string();
        self.position = end + 2;
        self.kind = TokenKind::Comment;
        self.next_kind = TokenKind::Sql;
        Ok(())
    }

    fn parse_bind_variable(&mut self) {
        self.bind_count += 1;
        self.token = format!("${}", self.bind_count);
        self.kind = TokenKind::BindVariable;
        self.position += 1;
        self.next_kind = TokenKind::Sql;
    }

    /// Skips one SQL token starting at the current position: a bare word, a
    /// single-quoted string, or a parenthesized group. This is how the test
    /// value after a variable comment is consumed without reaching the
    /// output.
    pub fn skip_token(&mut self) -> &'a str {
        let rest = &self.sql[self.position..];
        let chars: Vec<(usize, char)> = rest.char_indices().collect();
        let quote = match chars.first() {
            Some((_, '\'')) => Some('\''),
            Some((_, '(')) => Some(')'),
            _ => None,
        };
        let quoting = quote.is_some();
        let scan_from = if quoting { 1 } else { 0 };

        let mut end = rest.len();
        let mut window = scan_from;
        while window < chars.len() {
            let (offset, ch) = chars[window];
            let next_ch = chars.get(window + 1).map(|(_, c)| *c);
            if !quoting && (ch.is_whitespace() || ch == ',' || ch == ')' || ch == '(') {
                end = offset;
                break;
            } else if ch == '/' && next_ch == Some('*') {
                end = offset;
                break;
            } else if ch == '-' && next_ch == Some('-') {
                end = offset;
                break;
            } else if quoting && quote == Some('\'') && ch == '\'' {
                if next_ch == Some('\'') {
                    // Doubled quote stays inside the token.
                    window += 2;
                    continue;
                }
                end = offset + 1;
                break;
            } else if quoting && quote == Some(')') && ch == ')' {
                end = offset + 1;
                break;
            }
            window += 1;
        }

        let token = &rest[..end];
        self.position += end;
        self.token = token.to_string();
        self.kind = TokenKind::Sql;
        self.next_kind = TokenKind::Sql;
        token
    }

    pub fn skip_whitespace(&mut self) -> &'a str {
        let rest = &self.sql[self.position..];
        let skipped = rest.len() - rest.trim_start().len();
        let start = self.position;
        self.position += skipped;
        &self.sql[start..self.position]
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack[from..].find(needle).map(|idx| from + idx)
}
