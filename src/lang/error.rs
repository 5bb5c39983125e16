use std::borrow::Cow;

pub struct Error {
    code: u16,
    line: Option<usize>,
    column: Option<usize>,
    message: Cow<'static, str>,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message($msg)
    };
    ($err:ident, $line:expr, ..$col:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).at($line, $col)
    };
    ($err:ident, $line:expr, ..$col:expr; $msg:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .at($line, $col)
            .message($msg)
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code: code as u16,
            line: None,
            column: None,
            message: Cow::Borrowed(""),
        }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code as u16
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn text(&self) -> &str {
        &self.message
    }

    pub fn at(self, line: usize, column: usize) -> Error {
        debug_assert!(self.line.is_none());
        Error {
            line: Some(line),
            column: Some(column),
            ..self
        }
    }

    pub fn message<S: Into<Cow<'static, str>>>(self, message: S) -> Error {
        debug_assert!(self.message.is_empty());
        Error {
            message: message.into(),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SyntaxError = 2,
    IllegalFunctionCall = 5,
    Overflow = 6,
    OutOfMemory = 7,
    UndefinedLabel = 8,
    SubscriptOutOfRange = 9,
    DivisionByZero = 11,
    TypeMismatch = 13,
    DuplicateLabel = 20,
    InvalidLabel = 21,
    DuplicateCase = 22,
    UnexpectedBreak = 23,
    UnresolvedFunction = 24,
    DuplicateConstant = 25,
    EmptyScript = 26,
    NoPlayerAttached = 30,
    InfiniteLoop = 31,
    InternalError = 51,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let code_str = match self.code {
            2 => "SYNTAX ERROR",
            5 => "ILLEGAL FUNCTION CALL",
            6 => "OVERFLOW",
            7 => "OUT OF MEMORY",
            8 => "UNDEFINED LABEL",
            9 => "SUBSCRIPT OUT OF RANGE",
            11 => "DIVISION BY ZERO",
            13 => "TYPE MISMATCH",
            20 => "DUPLICATE LABEL",
            21 => "INVALID LABEL NAME",
            22 => "DUPLICATE CASE",
            23 => "UNEXPECTED BREAK",
            24 => "UNRESOLVED FUNCTION REFERENCES",
            25 => "DUPLICATE CONSTANT",
            26 => "EMPTY SCRIPT",
            30 => "NO PLAYER ATTACHED",
            31 => "INFINITE LOOP",
            51 => "INTERNAL ERROR",
            _ => "",
        };
        let mut suffix = String::new();
        if let Some(line) = self.line {
            suffix.push_str(&format!(" {}", line));
            if let Some(column) = self.column {
                suffix.push_str(&format!(":{}", column));
            }
        }
        if !self.message.is_empty() {
            suffix.push_str(&format!("; {}", self.message));
        }
        if code_str.is_empty() {
            write!(f, "SCRIPT ERROR {}{}", self.code, suffix)
        } else if self.line.is_some() {
            write!(f, "{} IN{}", code_str, suffix)
        } else {
            write!(f, "{}{}", code_str, suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(error!(SyntaxError).to_string(), "SYNTAX ERROR");
        assert_eq!(
            error!(SyntaxError, 3, ..7; "need ';'").to_string(),
            "SYNTAX ERROR IN 3:7; need ';'"
        );
        assert_eq!(
            error!(DivisionByZero; format!("{} / {}", 5, 0)).to_string(),
            "DIVISION BY ZERO; 5 / 0"
        );
    }
}
