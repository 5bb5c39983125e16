use super::Error;
use crate::error;

type Result<T> = std::result::Result<T, Error>;

fn is_word_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// ## Source cursor
///
/// The compiler works directly on the source text; this tracks the byte
/// position and knows how to step over whitespace, comments, words,
/// numbers and string literals.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    first_line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str, first_line: usize) -> Scanner<'a> {
        Scanner {
            src,
            pos: 0,
            first_line,
        }
    }

    pub fn source(&self) -> &'a str {
        self.src
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos.min(self.src.len());
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    pub fn is(&self, c: u8) -> bool {
        self.peek() == Some(c)
    }

    pub fn bump(&mut self, len: usize) {
        self.set_pos(self.pos + len);
    }

    /// Consumes `c` after skipping space, or fails with `msg`.
    pub fn expect(&mut self, c: u8, msg: &'static str) -> Result<()> {
        self.skip_space()?;
        if self.is(c) {
            self.bump(1);
            Ok(())
        } else {
            Err(self.error(error!(SyntaxError; msg)))
        }
    }

    pub fn skip_space(&mut self) -> Result<()> {
        let b = self.src.as_bytes();
        loop {
            match b.get(self.pos) {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') => self.pos += 1,
                Some(b'/') if b.get(self.pos + 1) == Some(&b'/') => {
                    while self.pos < b.len() && b[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                Some(b'/') if b.get(self.pos + 1) == Some(&b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        if self.pos + 1 >= b.len() {
                            self.pos = start;
                            return Err(self.error(error!(SyntaxError; "unexpected eof @ block comment")));
                        }
                        if b[self.pos] == b'*' && b[self.pos + 1] == b'/' {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Length of the word at `at`: an optional variable prefix, name
    /// characters, and an optional trailing `$`.
    pub fn word_len_at(&self, at: usize) -> usize {
        let b = self.src.as_bytes();
        let get = |i: usize| b.get(i).copied().unwrap_or(0);
        let mut p = at;
        match get(p) {
            b'@' | b'\'' => p += 1,
            b'#' => p += if get(p + 1) == b'#' { 2 } else { 1 },
            b'.' | b'$' => p += if get(p + 1) == b'@' { 2 } else { 1 },
            _ => {}
        }
        let name_start = p;
        while is_word_char(get(p)) {
            p += 1;
        }
        if p == name_start {
            return 0;
        }
        if get(p) == b'$' {
            p += 1;
        }
        p - at
    }

    pub fn word_len(&self) -> usize {
        self.word_len_at(self.pos)
    }

    /// Returns the word at the cursor without consuming it.
    pub fn peek_word(&self) -> &'a str {
        &self.src[self.pos..self.pos + self.word_len()]
    }

    pub fn word(&mut self) -> &'a str {
        let w = self.peek_word();
        self.pos += w.len();
        w
    }

    /// True when the cursor is at an optionally signed decimal digit.
    pub fn is_number(&self) -> bool {
        match self.peek() {
            Some(b'-') | Some(b'+') => self.peek_at(1).map_or(false, |c| c.is_ascii_digit()),
            Some(c) => c.is_ascii_digit(),
            None => false,
        }
    }

    /// Reads an optionally signed decimal or `0x` literal. The value is
    /// not clamped; callers decide how to treat overflow.
    pub fn number(&mut self) -> i64 {
        let b = self.src.as_bytes();
        let mut negative = false;
        match b.get(self.pos) {
            Some(b'-') => {
                negative = true;
                self.pos += 1;
            }
            Some(b'+') => self.pos += 1,
            _ => {}
        }
        while b.get(self.pos) == Some(&b'0') && b.get(self.pos + 1).map_or(false, u8::is_ascii_digit) {
            self.pos += 1;
        }
        let is_hex = b.get(self.pos) == Some(&b'0')
            && matches!(b.get(self.pos + 1), Some(b'x') | Some(b'X'))
            && b.get(self.pos + 2).map_or(false, u8::is_ascii_hexdigit);
        let (radix, start) = if is_hex {
            (16, self.pos + 2)
        } else {
            (10, self.pos)
        };
        let mut end = start;
        while b.get(end).map_or(false, |c| c.is_ascii_digit() || (radix == 16 && c.is_ascii_hexdigit())) {
            end += 1;
        }
        self.pos = end;
        let magnitude = i64::from_str_radix(&self.src[start..end], radix).unwrap_or(i64::MAX / 2);
        if negative {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Reads a `"..."` literal with C escapes, returning its bytes.
    pub fn string(&mut self) -> Result<Vec<u8>> {
        let b = self.src.as_bytes();
        let mut out = vec![];
        debug_assert_eq!(b.get(self.pos), Some(&b'"'));
        self.pos += 1;
        loop {
            match b.get(self.pos) {
                None => return Err(self.error(error!(SyntaxError; "unexpected eof @ string"))),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\n') => {
                    return Err(self.error(error!(SyntaxError; "unexpected newline @ string")))
                }
                Some(b'\\') => {
                    let c = match b.get(self.pos + 1) {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'r') => b'\r',
                        Some(b'0') => 0,
                        Some(&c) => c,
                        None => {
                            return Err(self.error(error!(SyntaxError; "unexpected eof @ string")))
                        }
                    };
                    if c != 0 {
                        out.push(c);
                    }
                    self.pos += 2;
                }
                Some(&c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    /// One-based line and column of a byte offset.
    pub fn location(&self, at: usize) -> (usize, usize) {
        let before = &self.src[..at.min(self.src.len())];
        let line = before.matches('\n').count() + self.first_line;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        (line, column)
    }

    /// Attaches the cursor's location to an error.
    pub fn error(&self, error: Error) -> Error {
        if error.line().is_some() {
            return error;
        }
        let (line, column) = self.location(self.pos);
        error.at(line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_with_prefixes() {
        let s = Scanner::new(".@name$ = 1", 1);
        assert_eq!(s.peek_word(), ".@name$");
        let s = Scanner::new("##acc;", 1);
        assert_eq!(s.peek_word(), "##acc");
        let s = Scanner::new("$@x", 1);
        assert_eq!(s.peek_word(), "$@x");
        let s = Scanner::new(".;", 1);
        assert_eq!(s.peek_word(), "");
    }

    #[test]
    fn test_comments() {
        let mut s = Scanner::new("  // one\n /* two\n */ x", 1);
        s.skip_space().unwrap();
        assert_eq!(s.peek(), Some(b'x'));
        assert_eq!(s.location(s.pos()), (3, 5));
        let mut s = Scanner::new("/* never ends", 1);
        assert!(s.skip_space().is_err());
    }

    #[test]
    fn test_numbers() {
        assert_eq!(Scanner::new("0x1f;", 1).number(), 31);
        assert_eq!(Scanner::new("0010", 1).number(), 10);
        assert_eq!(Scanner::new("-12", 1).number(), -12);
        assert_eq!(Scanner::new("3000000000", 1).number(), 3_000_000_000);
    }

    #[test]
    fn test_strings() {
        let mut s = Scanner::new(r#""a\"b\n" rest"#, 1);
        assert_eq!(s.string().unwrap(), b"a\"b\n".to_vec());
        assert_eq!(s.rest(), " rest");
        assert!(Scanner::new("\"open\n\"", 1).string().is_err());
    }
}
