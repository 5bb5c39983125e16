use super::Bridge;
use crate::lang::Error;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// Native body of a command. Reads its arguments and pushes its result
/// through the [`Bridge`].
///
/// A handler that suspends with [`Bridge::rerun`] is called again from the
/// top on resumption, with the same argument window, so it must not
/// consume anything before it knows it will complete.
pub type Handler = Rc<dyn Fn(&mut Bridge) -> Result<()>>;

/// ## Registered command
#[derive(Clone)]
pub struct Function {
    name: String,
    handler: Handler,
}

impl Function {
    pub fn new(name: &str, handler: Handler) -> Function {
        Function {
            name: name.to_string(),
            handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> Handler {
        self.handler.clone()
    }
}

/// Argument type codes accepted in a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Str,
    Any,
    Label,
    Reference,
}

impl ArgType {
    fn from_code(code: u8) -> Option<ArgType> {
        match code {
            b'i' => Some(ArgType::Int),
            b's' => Some(ArgType::Str),
            b'v' => Some(ArgType::Any),
            b'l' => Some(ArgType::Label),
            b'r' => Some(ArgType::Reference),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ArgType::Int => write!(f, "int"),
            ArgType::Str => write!(f, "string"),
            ArgType::Any => write!(f, "value"),
            ArgType::Label => write!(f, "label"),
            ArgType::Reference => write!(f, "variable"),
        }
    }
}

/// Expected type of every passed argument. `?` is one optional argument
/// of any type and `*` any number of them; arguments past the end of a
/// signature get `None`.
pub fn expected_types(signature: &str, count: usize) -> Vec<Option<ArgType>> {
    let codes = signature.as_bytes();
    (0..count)
        .map(|i| {
            if codes[..i.min(codes.len())].contains(&b'*') {
                return Some(ArgType::Any);
            }
            match codes.get(i) {
                Some(b'?') | Some(b'*') => Some(ArgType::Any),
                Some(&c) => ArgType::from_code(c),
                None => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_types() {
        use ArgType::*;
        assert_eq!(
            expected_types("sl*", 4),
            vec![Some(Str), Some(Label), Some(Any), Some(Any)]
        );
        assert_eq!(
            expected_types("r??", 3),
            vec![Some(Reference), Some(Any), Some(Any)]
        );
        assert_eq!(expected_types("i", 2), vec![Some(Int), None]);
        assert_eq!(expected_types("", 1), vec![None]);
    }
}
