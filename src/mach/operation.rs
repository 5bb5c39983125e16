use super::{Opcode, Val};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// Operators on values that have already been dereferenced. Integer
/// arithmetic saturates at the `i32` range with a warning instead of
/// wrapping.
pub struct Operation {}

fn saturate(wide: i64, op: Opcode) -> i32 {
    if wide > i32::MAX as i64 {
        log::warn!("{} overflow detected, capping value to INT_MAX", op);
        i32::MAX
    } else if wide < i32::MIN as i64 {
        log::warn!("{} underflow detected, capping value to INT_MIN", op);
        i32::MIN
    } else {
        wide as i32
    }
}

fn flag(b: bool) -> Val {
    Val::Int(b as i32)
}

impl Operation {
    pub fn unary(op: Opcode, val: Val) -> Result<Val> {
        let n = match val {
            Val::Int(n) => n,
            Val::Nil => 0,
            v => {
                return Err(error!(TypeMismatch; format!(
                    "operator {} needs an integer, got {}",
                    op,
                    v.type_name()
                )))
            }
        };
        Ok(match op {
            Opcode::Neg => Val::Int(saturate(-(n as i64), op)),
            Opcode::Not => Val::Int(!n),
            Opcode::LNot => flag(n == 0),
            _ => return Err(error!(InternalError; format!("{} is not a unary operator", op))),
        })
    }

    /// Applies a binary operator. When exactly one side is a string the
    /// integer side is converted for concatenation and comparison.
    pub fn binary(op: Opcode, lhs: Val, rhs: Val) -> Result<Val> {
        match (lhs, rhs) {
            (Val::Int(l), Val::Int(r)) => Operation::integer(op, l, r),
            (l, r) if l.is_str() || r.is_str() => {
                let l = Operation::promote(l)?;
                let r = Operation::promote(r)?;
                Operation::string(op, &l, &r)
            }
            (l, r) => Err(error!(TypeMismatch; format!(
                "operator {} cannot combine {} and {}",
                op,
                l.type_name(),
                r.type_name()
            ))),
        }
    }

    fn promote(val: Val) -> Result<String> {
        match val {
            Val::Int(n) => Ok(n.to_string()),
            Val::Str(s) => Ok(s),
            Val::ConstStr(s) => Ok(s.to_string()),
            Val::Nil => Ok(String::new()),
            v => Err(error!(TypeMismatch; format!("{} used as a string", v.type_name()))),
        }
    }

    fn integer(op: Opcode, l: i32, r: i32) -> Result<Val> {
        use Opcode::*;
        let (wl, wr) = (l as i64, r as i64);
        Ok(match op {
            Add => Val::Int(saturate(wl + wr, op)),
            Sub => Val::Int(saturate(wl - wr, op)),
            Mul => Val::Int(saturate(wl * wr, op)),
            Div | Mod if r == 0 => {
                return Err(error!(DivisionByZero; format!("{} by zero", op)))
            }
            Div => Val::Int(saturate(wl / wr, op)),
            Mod => Val::Int((wl % wr) as i32),
            Eq => flag(l == r),
            Ne => flag(l != r),
            Gt => flag(l > r),
            Ge => flag(l >= r),
            Lt => flag(l < r),
            Le => flag(l <= r),
            And => Val::Int(l & r),
            Or => Val::Int(l | r),
            Xor => Val::Int(l ^ r),
            LAnd => flag(l != 0 && r != 0),
            LOr => flag(l != 0 || r != 0),
            Shl => Val::Int(l.wrapping_shl(r as u32)),
            Shr => Val::Int(l.wrapping_shr(r as u32)),
            _ => return Err(error!(InternalError; format!("{} is not a binary operator", op))),
        })
    }

    fn string(op: Opcode, l: &str, r: &str) -> Result<Val> {
        use Opcode::*;
        Ok(match op {
            Add => Val::Str(format!("{}{}", l, r)),
            Eq => flag(l == r),
            Ne => flag(l != r),
            Gt => flag(l > r),
            Ge => flag(l >= r),
            Lt => flag(l < r),
            Le => flag(l <= r),
            _ => {
                return Err(error!(TypeMismatch; format!(
                    "illegal string operator {}",
                    op
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(op: Opcode, l: i32, r: i32) -> Val {
        Operation::binary(op, Val::Int(l), Val::Int(r)).unwrap()
    }

    #[test]
    fn test_saturation() {
        assert_eq!(int(Opcode::Add, i32::MAX, 1), Val::Int(i32::MAX));
        assert_eq!(int(Opcode::Sub, -2147483647, 10), Val::Int(i32::MIN));
        assert_eq!(int(Opcode::Mul, 65536, 65536), Val::Int(i32::MAX));
        assert_eq!(int(Opcode::Div, i32::MIN, -1), Val::Int(i32::MAX));
        assert_eq!(int(Opcode::Mod, i32::MIN, -1), Val::Int(0));
        assert_eq!(
            Operation::unary(Opcode::Neg, Val::Int(i32::MIN)).unwrap(),
            Val::Int(i32::MAX)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let e = Operation::binary(Opcode::Div, Val::Int(5), Val::Int(0)).unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::DivisionByZero));
        assert!(Operation::binary(Opcode::Mod, Val::Int(5), Val::Int(0)).is_err());
    }

    #[test]
    fn test_string_promotion() {
        let s = |v: &str| Val::Str(v.to_string());
        assert_eq!(
            Operation::binary(Opcode::Add, s("5"), Val::Int(3)).unwrap(),
            s("53")
        );
        assert_eq!(
            Operation::binary(Opcode::Add, Val::Int(3), s("5")).unwrap(),
            s("35")
        );
        assert_eq!(
            Operation::binary(Opcode::Eq, s("abc"), s("abc")).unwrap(),
            Val::Int(1)
        );
        assert_eq!(
            Operation::binary(Opcode::Lt, s("abc"), s("abd")).unwrap(),
            Val::Int(1)
        );
        assert!(Operation::binary(Opcode::Mul, s("a"), Val::Int(2)).is_err());
    }

    #[test]
    fn test_logic() {
        assert_eq!(int(Opcode::LAnd, 2, 3), Val::Int(1));
        assert_eq!(int(Opcode::LOr, 0, 0), Val::Int(0));
        assert_eq!(int(Opcode::Shl, 1, 4), Val::Int(16));
        assert_eq!(
            Operation::unary(Opcode::LNot, Val::Int(7)).unwrap(),
            Val::Int(0)
        );
        assert_eq!(Operation::unary(Opcode::Not, Val::Int(0)).unwrap(), Val::Int(-1));
    }
}
