use crate::mach::Opcode;

/// Words the compiler handles itself instead of treating as commands.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Word {
    Break,
    Case,
    Continue,
    Default,
    Do,
    Else,
    For,
    Function,
    If,
    Switch,
    While,
}

impl Word {
    pub fn from_str(s: &str) -> Option<Word> {
        use Word::*;
        [
            Break, Case, Continue, Default, Do, Else, For, Function, If, Switch, While,
        ]
        .iter()
        .copied()
        .find(|w| w.to_string().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Word::*;
        match self {
            Break => write!(f, "break"),
            Case => write!(f, "case"),
            Continue => write!(f, "continue"),
            Default => write!(f, "default"),
            Do => write!(f, "do"),
            Else => write!(f, "else"),
            For => write!(f, "for"),
            Function => write!(f, "function"),
            If => write!(f, "if"),
            Switch => write!(f, "switch"),
            While => write!(f, "while"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Operator {
    Ternary,
    LogicalOr,
    LogicalAnd,
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    BitXor,
    BitOr,
    BitAnd,
    ShiftLeft,
    ShiftRight,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulus,
}

/// Binding power of prefix `-`, `!` and `~`.
pub const UNARY_PRECEDENCE: i32 = 10;

impl Operator {
    /// Recognizes the operator at the start of `s`, preferring the longer
    /// spelling (`<<` over `<`, `&&` over `&`).
    pub fn scan(s: &str) -> Option<Operator> {
        use Operator::*;
        let b = s.as_bytes();
        let second = b.get(1).copied().unwrap_or(0);
        let op = match (b.first()?, second) {
            (b'?', _) => Ternary,
            (b'+', _) => Plus,
            (b'-', _) => Minus,
            (b'*', _) => Multiply,
            (b'/', _) => Divide,
            (b'%', _) => Modulus,
            (b'&', b'&') => LogicalAnd,
            (b'&', _) => BitAnd,
            (b'|', b'|') => LogicalOr,
            (b'|', _) => BitOr,
            (b'^', _) => BitXor,
            (b'=', b'=') => Equal,
            (b'!', b'=') => NotEqual,
            (b'>', b'>') => ShiftRight,
            (b'>', b'=') => GreaterEqual,
            (b'>', _) => Greater,
            (b'<', b'<') => ShiftLeft,
            (b'<', b'=') => LessEqual,
            (b'<', _) => Less,
            _ => return None,
        };
        Some(op)
    }

    pub fn len(self) -> usize {
        self.to_string().len()
    }

    pub fn precedence(self) -> i32 {
        use Operator::*;
        match self {
            Ternary => 0,
            LogicalOr => 1,
            LogicalAnd => 2,
            Equal | NotEqual | Greater | GreaterEqual | Less | LessEqual => 3,
            BitXor => 4,
            BitOr => 5,
            BitAnd => 6,
            ShiftLeft | ShiftRight => 7,
            Plus | Minus => 8,
            Multiply | Divide | Modulus => 9,
        }
    }

    pub fn opcode(self) -> Opcode {
        use Operator::*;
        match self {
            Ternary => Opcode::Op3,
            LogicalOr => Opcode::LOr,
            LogicalAnd => Opcode::LAnd,
            Equal => Opcode::Eq,
            NotEqual => Opcode::Ne,
            Greater => Opcode::Gt,
            GreaterEqual => Opcode::Ge,
            Less => Opcode::Lt,
            LessEqual => Opcode::Le,
            BitXor => Opcode::Xor,
            BitOr => Opcode::Or,
            BitAnd => Opcode::And,
            ShiftLeft => Opcode::Shl,
            ShiftRight => Opcode::Shr,
            Plus => Opcode::Add,
            Minus => Opcode::Sub,
            Multiply => Opcode::Mul,
            Divide => Opcode::Div,
            Modulus => Opcode::Mod,
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Operator::*;
        match self {
            Ternary => write!(f, "?"),
            LogicalOr => write!(f, "||"),
            LogicalAnd => write!(f, "&&"),
            Equal => write!(f, "=="),
            NotEqual => write!(f, "!="),
            Greater => write!(f, ">"),
            GreaterEqual => write!(f, ">="),
            Less => write!(f, "<"),
            LessEqual => write!(f, "<="),
            BitXor => write!(f, "^"),
            BitOr => write!(f, "|"),
            BitAnd => write!(f, "&"),
            ShiftLeft => write!(f, "<<"),
            ShiftRight => write!(f, ">>"),
            Plus => write!(f, "+"),
            Minus => write!(f, "-"),
            Multiply => write!(f, "*"),
            Divide => write!(f, "/"),
            Modulus => write!(f, "%"),
        }
    }
}

/// Statement-level assignment forms, all lowered to the `set` command.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Assign {
    Set,
    Compound(Operator),
    Increment,
    Decrement,
}

impl Assign {
    /// Returns the assignment at the start of `s` and its length.
    pub fn scan(s: &str) -> Option<(Assign, usize)> {
        use Operator::*;
        let b = s.as_bytes();
        let at = |i: usize| b.get(i).copied().unwrap_or(0);
        let found = match (at(0), at(1), at(2)) {
            (b'=', b'=', _) => return None,
            (b'=', _, _) => (Assign::Set, 1),
            (b'+', b'+', _) => (Assign::Increment, 2),
            (b'-', b'-', _) => (Assign::Decrement, 2),
            (b'<', b'<', b'=') => (Assign::Compound(ShiftLeft), 3),
            (b'>', b'>', b'=') => (Assign::Compound(ShiftRight), 3),
            (c, b'=', _) => {
                let op = match c {
                    b'+' => Plus,
                    b'-' => Minus,
                    b'*' => Multiply,
                    b'/' => Divide,
                    b'%' => Modulus,
                    b'&' => BitAnd,
                    b'|' => BitOr,
                    b'^' => BitXor,
                    _ => return None,
                };
                (Assign::Compound(op), 2)
            }
            _ => return None,
        };
        Some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_operator() {
        assert_eq!(Operator::scan("<<1"), Some(Operator::ShiftLeft));
        assert_eq!(Operator::scan("<=1"), Some(Operator::LessEqual));
        assert_eq!(Operator::scan("&&b"), Some(Operator::LogicalAnd));
        assert_eq!(Operator::scan("=b"), None);
        assert_eq!(Operator::ShiftLeft.len(), 2);
    }

    #[test]
    fn test_assign() {
        assert_eq!(Assign::scan("= 1"), Some((Assign::Set, 1)));
        assert_eq!(Assign::scan("== 1"), None);
        assert_eq!(Assign::scan("++;"), Some((Assign::Increment, 2)));
        assert_eq!(
            Assign::scan(">>= 2"),
            Some((Assign::Compound(Operator::ShiftRight), 3))
        );
        assert_eq!(Assign::scan("!= 2"), None);
    }

    #[test]
    fn test_word() {
        assert_eq!(Word::from_str("WHILE"), Some(Word::While));
        assert_eq!(Word::from_str("mes"), None);
    }
}
