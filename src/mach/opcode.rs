use crate::error;
use crate::lang::Error;
use std::convert::TryFrom;

/// ## Virtual machine instruction set
///
/// The machine has no registers. Operands are pushed on the stack and a
/// statement is closed by `Eol`, which discards whatever the statement
/// left behind.
///
/// For example: `.@a = 3 * .@b;` compiles to
/// `[NAME(set), ARG, NAME(.@a), INT(3), NAME(.@b), MUL, FUNC, EOL]`
///
/// Tags and literal integers share one variable length encoding; see
/// [`Code`](super::Code) for the byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Opcode {
    /// Ends execution.
    Nop = 0,
    /// Followed by a 3 byte label position.
    Pos,
    /// Never appears in code; literal integers use their own encoding.
    Int,
    /// Followed by a 3 byte symbol id.
    Name,
    /// Followed by a NUL terminated string.
    Str,
    /// Followed by a 3 byte user function position.
    FuncPos,
    /// Marks the start of a call's arguments.
    Arg,
    /// Calls the built-in named just below the nearest `Arg`.
    Func,
    Eol,
    /// The next binary operator writes back into its left reference.
    Ref,

    // *** Expression operations
    LOr,
    LAnd,
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
    Ne,
    Xor,
    Or,
    And,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    LNot,
    Not,
    Shl,
    Shr,
    Op3,
}

const ALL: [Opcode; 32] = {
    use Opcode::*;
    [
        Nop, Pos, Int, Name, Str, FuncPos, Arg, Func, Eol, Ref, LOr, LAnd, Le, Lt, Ge, Gt, Eq, Ne,
        Xor, Or, And, Add, Sub, Mul, Div, Mod, Neg, LNot, Not, Shl, Shr, Op3,
    ]
};

impl Opcode {
    /// True for tags that carry a 3 byte operand.
    pub fn has_operand(self) -> bool {
        matches!(self, Opcode::Pos | Opcode::Name | Opcode::FuncPos)
    }

    pub fn is_binary(self) -> bool {
        (self >= Opcode::LOr && self <= Opcode::Mod) || self == Opcode::Shl || self == Opcode::Shr
    }

    pub fn is_unary(self) -> bool {
        matches!(self, Opcode::Neg | Opcode::LNot | Opcode::Not)
    }
}

impl TryFrom<u32> for Opcode {
    type Error = Error;
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match ALL.get(value as usize) {
            Some(op) => Ok(*op),
            None => Err(error!(InternalError; format!("unknown opcode {}", value))),
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Opcode::*;
        let s = match self {
            Nop => "NOP",
            Pos => "POS",
            Int => "INT",
            Name => "NAME",
            Str => "STR",
            FuncPos => "FUNCPOS",
            Arg => "ARG",
            Func => "FUNC",
            Eol => "EOL",
            Ref => "REF",
            LOr => "LOR",
            LAnd => "LAND",
            Le => "LE",
            Lt => "LT",
            Ge => "GE",
            Gt => "GT",
            Eq => "EQ",
            Ne => "NE",
            Xor => "XOR",
            Or => "OR",
            And => "AND",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            LNot => "LNOT",
            Not => "NOT",
            Shl => "SHL",
            Shr => "SHR",
            Op3 => "OP3",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_match_table() {
        for (i, op) in ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(Opcode::try_from(i as u32).unwrap(), *op);
        }
        assert!(Opcode::try_from(ALL.len() as u32).is_err());
    }

    #[test]
    fn test_classes() {
        assert!(Opcode::Add.is_binary());
        assert!(Opcode::Shr.is_binary());
        assert!(!Opcode::Neg.is_binary());
        assert!(Opcode::Not.is_unary());
        assert!(Opcode::Name.has_operand());
    }
}
