// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Delimiter-aware scanning of Nix source text.
//!
//! The registry is never evaluated. The scanner only understands enough of
//! the Nix surface syntax to tell code apart from __trivia__ (whitespace and
//! comments) and string literals, and to keep track of how deeply nested each
//! delimiter is. That is enough to find the `name = value;` bindings of an
//! attribute set along with the exact byte span each binding occupies.
//!
//! Because nesting is tracked explicitly, a `};` hiding inside a string, an
//! interpolation, or a nested attribute set can never end a binding early,
//! and commented-out bindings are never reported.
//!
//! # Limitations
//!
//! - Only `"..."` strings may be used as quoted attribute names.
//! - List items are split on whitespace at depth zero, so a selection written
//!   after a parenthesised term, e.g., `(import ./x).y`, is reported as two
//!   items.

use std::fmt::Write as _;

/// Contiguous byte range `[start, end)` of some source text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Construct new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by span.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if span covers nothing.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Borrow the text covered by span.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// A `name = value;` binding found directly inside an attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Attribute path with quoted segments unquoted, joined by `.`.
    pub name: String,

    /// Attribute path exactly as written.
    pub key: Span,

    /// Span from the first byte of the name up to and including the `;`.
    pub span: Span,

    /// Span of the bound expression, without surrounding whitespace.
    pub value: Span,
}

/// Source text does not scan as well-formed Nix.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at byte {offset}")]
pub struct ScanError {
    pub message: String,
    pub offset: usize,
}

impl ScanError {
    /// Construct new scan error.
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = ScanError> = std::result::Result<T, E>;

const KEYWORDS: [&str; 10] = [
    "assert", "else", "if", "in", "inherit", "let", "or", "rec", "then", "with",
];

/// Check if name can be written as a bare Nix attribute name.
pub fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    let Some(first) = bytes.next() else {
        return false;
    };

    is_ident_start(first) && bytes.all(is_ident_continue) && !KEYWORDS.contains(&name)
}

/// Everything declared directly inside an attribute set body.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Members {
    pub bindings: Vec<Binding>,

    /// Whole `inherit ...;` statements, including the `;`.
    pub inherits: Vec<Span>,
}

/// List bindings declared directly inside the attribute set body `body`.
///
/// # Errors
///
/// - Return [`ScanError`] if the body contains something other than
///   bindings and `inherit` statements, or if any delimiter, string, or
///   comment is left unterminated.
pub fn bindings(text: &str, body: Span) -> Result<Vec<Binding>> {
    Ok(members(text, body)?.bindings)
}

/// List bindings and `inherit` statements of the attribute set body `body`.
///
/// # Errors
///
/// - Return [`ScanError`] under the same conditions as [`bindings`].
pub fn members(text: &str, body: Span) -> Result<Members> {
    let mut scanner = Scanner::within(text, body);
    let mut found = Members::default();

    loop {
        scanner.skip_trivia()?;
        let start = scanner.pos;
        if scanner.peek().is_none() {
            return Ok(found);
        }

        if scanner.keyword("inherit") {
            let terminator = scanner.skip_expression()?;
            scanner.bump(1);
            found.inherits.push(Span::new(start, terminator + 1));
            continue;
        }

        let Some(name) = scanner.read_attrpath()? else {
            return Err(ScanError::new("expected attribute name", start));
        };
        let key = Span::new(start, scanner.pos);

        scanner.skip_trivia()?;
        if scanner.peek() != Some(b'=') {
            return Err(ScanError::new(
                format!("expected `=` after `{name}`"),
                scanner.pos,
            ));
        }
        scanner.bump(1);
        scanner.skip_trivia()?;

        let value_start = scanner.pos;
        let terminator = scanner.skip_expression()?;
        scanner.bump(1);

        found.bindings.push(Binding {
            name,
            key,
            span: Span::new(start, terminator + 1),
            value: Span::new(value_start, trim_end(text, value_start, terminator)),
        });
    }
}

/// Find every assignment to `name` anywhere in `text`.
///
/// An attribute path matches when it is `name` itself, or ends with `.name`,
/// so `flake.nixosConfigurations = { ... };` matches `nixosConfigurations`.
/// Strings and comments are skipped. Assignments nested inside a matching
/// assignment are not reported.
///
/// # Errors
///
/// - Return [`ScanError`] if a string or comment is left unterminated, or if
///   the value of a matching assignment cannot be scanned.
pub fn find_assignments(text: &str, name: &str) -> Result<Vec<Binding>> {
    let dotted = format!(".{name}");
    let mut scanner = Scanner::new(text);
    let mut found = Vec::new();

    loop {
        scanner.skip_trivia()?;
        match scanner.peek() {
            None => return Ok(found),
            Some(b'"') => scanner.skip_string()?,
            Some(b'\'') if scanner.starts_with("''") => scanner.skip_indented_string()?,
            Some(byte) if is_ident_start(byte) => {
                let start = scanner.pos;
                let path = scanner.read_attrpath()?.unwrap_or_default();
                let resume = scanner.pos;
                scanner.skip_trivia()?;

                let is_assignment =
                    scanner.peek() == Some(b'=') && scanner.peek_at(1) != Some(b'=');
                if !is_assignment || (path != name && !path.ends_with(&dotted)) {
                    scanner.pos = resume;
                    continue;
                }

                scanner.bump(1);
                scanner.skip_trivia()?;
                let value_start = scanner.pos;
                let terminator = scanner.skip_expression()?;
                scanner.bump(1);

                found.push(Binding {
                    name: path,
                    key: Span::new(start, resume),
                    span: Span::new(start, terminator + 1),
                    value: Span::new(value_start, trim_end(text, value_start, terminator)),
                });
            }
            Some(_) => scanner.bump(1),
        }
    }
}

/// Find inner span of value if value is exactly one `open ... close` group.
///
/// # Errors
///
/// - Return [`ScanError`] if the group is unbalanced.
pub fn enclosed(text: &str, value: Span, open: u8) -> Result<Option<Span>> {
    let mut scanner = Scanner::within(text, value);
    if scanner.peek() != Some(open) {
        return Ok(None);
    }

    let close = scanner.skip_balanced(value.start)?;
    scanner.skip_trivia()?;
    if scanner.peek().is_some() {
        return Ok(None);
    }

    Ok(Some(Span::new(value.start + 1, close)))
}

/// Find the inner span of the list that value evaluates to, skipping any
/// leading `with <expr>;` scopes, e.g., `with pkgs; [ git vim ]`.
///
/// # Errors
///
/// - Return [`ScanError`] if the value cannot be scanned.
pub fn leading_list(text: &str, value: Span) -> Result<Option<Span>> {
    let mut scanner = Scanner::within(text, value);
    loop {
        scanner.skip_trivia()?;
        if !scanner.keyword("with") {
            break;
        }
        scanner.skip_expression()?;
        scanner.bump(1);
    }

    if scanner.peek() != Some(b'[') {
        return Ok(None);
    }

    let open = scanner.pos;
    let close = scanner.skip_balanced(open)?;
    Ok(Some(Span::new(open + 1, close)))
}

/// Split list body into spans of its items.
///
/// # Errors
///
/// - Return [`ScanError`] if an item cannot be scanned, or a stray closing
///   delimiter shows up.
pub fn list_items(text: &str, inner: Span) -> Result<Vec<Span>> {
    let mut scanner = Scanner::within(text, inner);
    let mut items = Vec::new();

    loop {
        scanner.skip_trivia()?;
        let start = scanner.pos;
        match scanner.peek() {
            None => return Ok(items),
            Some(b'"') => scanner.skip_string()?,
            Some(b'\'') if scanner.starts_with("''") => scanner.skip_indented_string()?,
            Some(b'{' | b'[' | b'(') => {
                scanner.skip_balanced(start)?;
            }
            Some(byte @ (b'}' | b']' | b')' | b';')) => {
                return Err(ScanError::new(
                    format!("unexpected `{}` in list", byte as char),
                    start,
                ));
            }
            Some(_) => scanner.skip_term()?,
        }
        items.push(Span::new(start, scanner.pos));
    }
}

/// Decode value if it is exactly one plain `"..."` string literal.
///
/// Strings holding an interpolation are not plain, since their value is only
/// known after evaluation.
pub fn string_value(text: &str, value: Span) -> Option<String> {
    let mut scanner = Scanner::within(text, value);
    if scanner.peek() != Some(b'"') {
        return None;
    }

    scanner.skip_string().ok()?;
    if scanner.pos != value.end {
        return None;
    }

    let literal = value.slice(text);
    if interpolates(literal) {
        return None;
    }

    unquote(literal)
}

/// Decode list of plain string literals.
///
/// # Errors
///
/// - Return [`ScanError`] if value is not a list, or any item is not a plain
///   string literal.
pub fn string_list(text: &str, value: Span) -> Result<Vec<String>> {
    let Some(inner) = enclosed(text, value, b'[')? else {
        return Err(ScanError::new("expected list of strings", value.start));
    };

    list_items(text, inner)?
        .into_iter()
        .map(|item| {
            string_value(text, item)
                .ok_or_else(|| ScanError::new("expected string literal", item.start))
        })
        .collect()
}

/// Check that every delimiter, string, and comment in text is terminated.
///
/// # Errors
///
/// - Return [`ScanError`] at the first problem found.
pub fn check_balanced(text: &str) -> Result<()> {
    let mut scanner = Scanner::new(text);
    loop {
        scanner.skip_trivia()?;
        match scanner.peek() {
            None => return Ok(()),
            Some(b'"') => scanner.skip_string()?,
            Some(b'\'') if scanner.starts_with("''") => scanner.skip_indented_string()?,
            Some(b'{' | b'[' | b'(') => {
                scanner.skip_balanced(scanner.pos)?;
            }
            Some(byte @ (b'}' | b']' | b')')) => {
                return Err(ScanError::new(
                    format!("unexpected `{}`", byte as char),
                    scanner.pos,
                ));
            }
            Some(byte) if is_ident_start(byte) => {
                scanner.read_ident();
            }
            Some(_) => scanner.bump(1),
        }
    }
}

/// Quote value as a Nix string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write name as an attribute name, quoting it unless it is an identifier.
pub fn attr_name(name: &str) -> String {
    if is_identifier(name) {
        name.to_owned()
    } else {
        quote(name)
    }
}

/// Render strings as a list of string literals, e.g., `[ "a" "b" ]`.
pub fn quote_list(values: &[String]) -> String {
    if values.is_empty() {
        return "[]".into();
    }

    let mut out = String::from("[");
    for value in values {
        let _ = write!(out, " {}", quote(value));
    }
    out.push_str(" ]");
    out
}

fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        out.push(match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            other => other,
        });
    }

    Some(out)
}

fn interpolates(literal: &str) -> bool {
    let mut bytes = literal.bytes().peekable();
    while let Some(byte) = bytes.next() {
        match byte {
            b'\\' => {
                bytes.next();
            }
            b'$' if matches!(bytes.peek(), Some(b'{' | b'$')) => return true,
            _ => {}
        }
    }
    false
}

fn trim_end(text: &str, start: usize, mut end: usize) -> usize {
    let bytes = text.as_bytes();
    while end > start && bytes[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    end
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'\'' | b'-')
}

fn closing(open: u8) -> u8 {
    match open {
        b'{' => b'}',
        b'[' => b']',
        _ => b')',
    }
}

/// Cursor over a bounded region of source text.
///
/// All positions are absolute byte offsets into the full text, so spans
/// produced while scanning a sub-region can be used on the whole document.
pub(crate) struct Scanner<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self::within(text, Span::new(0, text.len()))
    }

    pub(crate) fn within(text: &'a str, span: Span) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: span.start,
            end: span.end,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        let at = self.pos + offset;
        (at < self.end).then(|| self.bytes[at])
    }

    fn bump(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.end);
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.bytes
            .get(self.pos..self.end)
            .is_some_and(|rest| rest.starts_with(pattern.as_bytes()))
    }

    fn keyword(&mut self, word: &str) -> bool {
        if !self.starts_with(word) {
            return false;
        }

        let after = self.pos + word.len();
        if after < self.end && is_ident_continue(self.bytes[after]) {
            return false;
        }

        self.pos = after;
        true
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(byte) if byte.is_ascii_whitespace() => self.bump(1),
                Some(b'#') => {
                    while self.peek().is_some_and(|byte| byte != b'\n') {
                        self.bump(1);
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.bump(2);
                    loop {
                        match self.peek() {
                            None => {
                                return Err(ScanError::new("unterminated block comment", start))
                            }
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.bump(2);
                                break;
                            }
                            Some(_) => self.bump(1),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_string(&mut self) -> Result<()> {
        let start = self.pos;
        self.bump(1);
        loop {
            match self.peek() {
                None => return Err(ScanError::new("unterminated string", start)),
                Some(b'\\') => self.bump(2),
                Some(b'"') => {
                    self.bump(1);
                    return Ok(());
                }
                Some(b'$') if self.peek_at(1) == Some(b'$') => self.bump(2),
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    self.skip_balanced(self.pos + 1)?;
                }
                Some(_) => self.bump(1),
            }
        }
    }

    fn skip_indented_string(&mut self) -> Result<()> {
        let start = self.pos;
        self.bump(2);
        loop {
            if self.starts_with("''") {
                match self.peek_at(2) {
                    Some(b'\'' | b'$') => self.bump(3),
                    Some(b'\\') => self.bump(4),
                    _ => {
                        self.bump(2);
                        return Ok(());
                    }
                }
                continue;
            }

            match self.peek() {
                None => return Err(ScanError::new("unterminated indented string", start)),
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    self.skip_balanced(self.pos + 1)?;
                }
                Some(_) => self.bump(1),
            }
        }
    }

    /// Skip past the group opened at `open_at`, returning offset of its
    /// matching closing delimiter.
    fn skip_balanced(&mut self, open_at: usize) -> Result<usize> {
        let open = self.bytes[open_at];
        let mut expected = vec![closing(open)];
        self.pos = open_at + 1;

        while let Some(&close) = expected.last() {
            self.skip_trivia()?;
            match self.peek() {
                None => {
                    return Err(ScanError::new(
                        format!("unclosed `{}`", open as char),
                        open_at,
                    ))
                }
                Some(b'"') => self.skip_string()?,
                Some(b'\'') if self.starts_with("''") => self.skip_indented_string()?,
                Some(byte @ (b'{' | b'[' | b'(')) => {
                    expected.push(closing(byte));
                    self.bump(1);
                }
                Some(byte @ (b'}' | b']' | b')')) => {
                    if byte != close {
                        return Err(ScanError::new(
                            format!("expected `{}` but found `{}`", close as char, byte as char),
                            self.pos,
                        ));
                    }
                    expected.pop();
                    self.bump(1);
                }
                Some(byte) if is_ident_start(byte) => {
                    self.read_ident();
                }
                Some(_) => self.bump(1),
            }
        }

        Ok(self.pos - 1)
    }

    /// Skip expression up to the `;` that terminates it at depth zero.
    ///
    /// Leaves the cursor on the `;` and returns its offset. A `;` that
    /// belongs to a `let ... in` block, or closes a `with` or `assert`
    /// prefix, does not terminate the expression.
    fn skip_expression(&mut self) -> Result<usize> {
        let start = self.pos;
        let mut open_lets = 0usize;
        let mut open_prefixes = 0usize;
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(ScanError::new("expected `;`", start)),
                Some(b';') if open_prefixes > 0 => {
                    open_prefixes -= 1;
                    self.bump(1);
                }
                Some(b';') if open_lets == 0 => return Ok(self.pos),
                Some(b';') => self.bump(1),
                Some(b'"') => self.skip_string()?,
                Some(b'\'') if self.starts_with("''") => self.skip_indented_string()?,
                Some(b'{' | b'[' | b'(') => {
                    self.skip_balanced(self.pos)?;
                }
                Some(byte @ (b'}' | b']' | b')')) => {
                    return Err(ScanError::new(
                        format!("unexpected `{}`", byte as char),
                        self.pos,
                    ));
                }
                Some(byte) if is_ident_start(byte) => {
                    if let Some(ident) = self.read_ident() {
                        match ident.slice(self.text) {
                            "let" => open_lets += 1,
                            "in" => open_lets = open_lets.saturating_sub(1),
                            "with" | "assert" => open_prefixes += 1,
                            _ => {}
                        }
                    }
                }
                Some(_) => self.bump(1),
            }
        }
    }

    /// Skip a bare list item such as `pkgs.git` or `./module.nix`.
    fn skip_term(&mut self) -> Result<()> {
        while let Some(byte) = self.peek() {
            match byte {
                b'$' if self.peek_at(1) == Some(b'{') => {
                    self.skip_balanced(self.pos + 1)?;
                }
                b'[' | b']' | b'(' | b')' | b'{' | b'}' | b'"' | b';' | b'#' => break,
                byte if byte.is_ascii_whitespace() => break,
                _ => self.bump(1),
            }
        }
        Ok(())
    }

    fn read_ident(&mut self) -> Option<Span> {
        let start = self.pos;
        if !self.peek().is_some_and(is_ident_start) {
            return None;
        }

        self.bump(1);
        while self.peek().is_some_and(is_ident_continue) {
            self.bump(1);
        }

        Some(Span::new(start, self.pos))
    }

    /// Read dotted attribute path like `flake.nixosConfigurations`.
    ///
    /// Stops before a trailing `.` that is not followed by another segment.
    fn read_attrpath(&mut self) -> Result<Option<String>> {
        let mut segments = Vec::new();
        loop {
            let start = self.pos;
            match self.peek() {
                Some(b'"') => {
                    self.skip_string()?;
                    let literal = Span::new(start, self.pos).slice(self.text);
                    segments.push(unquote(literal).unwrap_or_else(|| literal.to_owned()));
                }
                Some(b'$') if self.peek_at(1) == Some(b'{') => {
                    self.skip_balanced(start + 1)?;
                    segments.push(Span::new(start, self.pos).slice(self.text).to_owned());
                }
                Some(byte) if is_ident_start(byte) => {
                    if let Some(ident) = self.read_ident() {
                        segments.push(ident.slice(self.text).to_owned());
                    }
                }
                _ if segments.is_empty() => return Ok(None),
                _ => {
                    // INVARIANT: Dangling `.` is not part of the path.
                    self.pos = start;
                    return Ok(Some(segments.join(".")));
                }
            }

            let resume = self.pos;
            self.skip_trivia()?;
            if self.peek() != Some(b'.') {
                self.pos = resume;
                return Ok(Some(segments.join(".")));
            }
            self.bump(1);
            self.skip_trivia()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    fn names(text: &str) -> Vec<String> {
        bindings(text, Span::new(0, text.len()))
            .unwrap()
            .into_iter()
            .map(|binding| binding.name)
            .collect()
    }

    #[test]
    fn bindings_skip_terminators_hiding_in_strings() {
        let text = indoc! {r#"
            a = "};";
            b = { c = "}; };"; d = ''
              };
            ''; };
            e = [ "x" ];
        "#};
        assert_eq!(names(text), vec!["a", "b", "e"]);

        let found = bindings(text, Span::new(0, text.len())).unwrap();
        assert_eq!(found[0].value.slice(text), r#""};""#);
        assert_eq!(found[2].span.slice(text), r#"e = [ "x" ];"#);
    }

    #[test]
    fn bindings_ignore_comments() {
        let text = indoc! {r#"
            # gone = lib.mkSystem { };
            kept = 1; /* also = gone; */
            inherit lib;
            "quoted.name" = 2;
            nested.path = 3;
        "#};
        assert_eq!(names(text), vec!["kept", "quoted.name", "nested.path"]);
    }

    #[test]
    fn members_keep_inherit_statements() {
        let text = indoc! {r#"
            inherit specialArgs;
            "my key" = 1;
            inherit (pkgs) lib stdenv;
            a . b = 2;
        "#};
        let found = members(text, Span::new(0, text.len())).unwrap();
        let inherits = found
            .inherits
            .iter()
            .map(|span| span.slice(text))
            .collect::<Vec<_>>();
        assert_eq!(inherits, vec!["inherit specialArgs;", "inherit (pkgs) lib stdenv;"]);

        let keys = found
            .bindings
            .iter()
            .map(|binding| (binding.name.as_str(), binding.key.slice(text)))
            .collect::<Vec<_>>();
        assert_eq!(keys, vec![("my key", r#""my key""#), ("a.b", "a . b")]);
    }

    #[test]
    fn attr_name_quotes_when_needed() {
        assert_eq!(attr_name("system"), "system");
        assert_eq!(attr_name("my key"), r#""my key""#);
        assert_eq!(attr_name("a.b"), r#""a.b""#);
        assert_eq!(attr_name("with"), r#""with""#);
    }

    #[test]
    fn bindings_allow_let_in_values() {
        let text = "x = let y = 1; z = 2; in y + z; w = 0;";
        assert_eq!(names(text), vec!["x", "w"]);
    }

    #[test]
    fn bindings_keep_with_prefix_in_value() {
        let text = "pkgs = with p; assert ok; [ git ]; after = 1;";
        let found = bindings(text, Span::new(0, text.len())).unwrap();
        assert_eq!(found[0].value.slice(text), "with p; assert ok; [ git ]");
        assert_eq!(found[1].name, "after");
    }

    #[test_case("a = { b = 1;"; "unclosed brace")]
    #[test_case("a = [ 1 ); "; "mismatched delimiter")]
    #[test_case("a = \"oops;"; "unterminated string")]
    #[test_case("a = 1 /* never closed"; "unterminated comment")]
    #[test_case("a = 1"; "missing terminator")]
    #[test_case("= 1;"; "missing name")]
    #[test]
    fn bindings_reject_malformed_text(text: &str) {
        assert!(bindings(text, Span::new(0, text.len())).is_err());
    }

    #[test]
    fn find_assignments_matches_attribute_path_suffix() {
        let text = indoc! {r#"
            {
              outputs = { ... }: {
                # nixosConfigurations = { broken
                desc = "nixosConfigurations = { };";
                flake.nixosConfigurations = { a = 1; };
              };
            }
        "#};
        let found = find_assignments(text, "nixosConfigurations").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "flake.nixosConfigurations");
        assert_eq!(found[0].value.slice(text), "{ a = 1; }");
    }

    #[test]
    fn leading_list_skips_with_scopes() {
        let text = "with pkgs; with lib; [ git vim # editor\n htop ]";
        let inner = leading_list(text, Span::new(0, text.len()))
            .unwrap()
            .unwrap();
        let items = list_items(text, inner)
            .unwrap()
            .into_iter()
            .map(|item| item.slice(text))
            .collect::<Vec<_>>();
        assert_eq!(items, vec!["git", "vim", "htop"]);
    }

    #[test]
    fn list_items_keep_compound_terms_whole() {
        let text = r#"[ ./a.nix (import ./b.nix) inputs.x.nixosModules.${name} "c" { d = 1; } ]"#;
        let inner = enclosed(text, Span::new(0, text.len()), b'[').unwrap().unwrap();
        let items = list_items(text, inner)
            .unwrap()
            .into_iter()
            .map(|item| item.slice(text))
            .collect::<Vec<_>>();
        assert_eq!(
            items,
            vec![
                "./a.nix",
                "(import ./b.nix)",
                "inputs.x.nixosModules.${name}",
                r#""c""#,
                "{ d = 1; }"
            ]
        );
    }

    #[test]
    fn string_list_decodes_escapes() {
        let text = r#"[ "plain" "with \"quote\"" "\${literal}" ]"#;
        let result = string_list(text, Span::new(0, text.len())).unwrap();
        assert_eq!(result, vec!["plain", "with \"quote\"", "${literal}"]);
    }

    #[test]
    fn interpolated_strings_are_not_plain() {
        let text = r#""${prefix}-web""#;
        assert_eq!(string_value(text, Span::new(0, text.len())), None);

        let text = r#""a$${b}""#;
        assert_eq!(string_value(text, Span::new(0, text.len())), None);

        let text = r#""\${prefix}-web $5""#;
        assert_eq!(
            string_value(text, Span::new(0, text.len())).as_deref(),
            Some("${prefix}-web $5")
        );

        let text = r#"[ "ok" "${x}" ]"#;
        assert!(string_list(text, Span::new(0, text.len())).is_err());
    }

    #[test]
    fn quote_escapes_interpolation() {
        assert_eq!(quote(r#"a "b" ${c} $d \e"#), r#""a \"b\" \${c} $d \\e""#);
        assert_eq!(quote_list(&[]), "[]");
        assert_eq!(quote_list(&["a".into(), "b".into()]), r#"[ "a" "b" ]"#);
    }

    #[test_case("web1", true; "plain")]
    #[test_case("nixos-wsl", true; "dashed")]
    #[test_case("_x'", true; "prime")]
    #[test_case("1host", false; "leading digit")]
    #[test_case("with", false; "keyword")]
    #[test_case("a.b", false; "dotted")]
    #[test_case("", false; "empty")]
    #[test]
    fn identifier_validation(name: &str, expect: bool) {
        assert_eq!(is_identifier(name), expect);
    }

    #[test]
    fn primed_identifiers_are_not_indented_strings() {
        let text = "a = { x'' = 1; y = x''; }; b = [ (f x'') ];";
        assert_eq!(names(text), vec!["a", "b"]);
        assert!(check_balanced("{ x'' = x' + 1; }").is_ok());
    }

    #[test]
    fn check_balanced_reports_stray_closer() {
        assert!(check_balanced("{ a = ''}''; }").is_ok());
        let result = check_balanced("{ a = 1; } }");
        assert_eq!(result, Err(ScanError::new("unexpected `}`", 11)));
    }
}
