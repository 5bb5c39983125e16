use super::{Script, Var, VarId};
use std::cell::RefCell;
use std::rc::Rc;

/// A call frame's `.@` variables. Shared by the running state, the
/// references it hands to callees and the return info that restores it.
pub type Scope = Rc<RefCell<Var>>;

/// Where a reference reads and writes when it does not use the running
/// state's own stores.
#[derive(Clone)]
pub enum Store {
    Scope(Scope),
    Script(Rc<Script>),
}

impl Store {
    pub fn same(&self, other: &Store) -> bool {
        match (self, other) {
            (Store::Scope(a), Store::Scope(b)) => Rc::ptr_eq(a, b),
            (Store::Script(a), Store::Script(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct Ref {
    pub id: VarId,
    pub store: Option<Store>,
}

impl Ref {
    pub fn new(id: VarId) -> Ref {
        Ref { id, store: None }
    }
}

/// Everything needed to continue the caller once a `callsub` or
/// `callfunc` returns.
#[derive(Clone)]
pub struct RetInfo {
    pub script: Rc<Script>,
    pub pos: usize,
    pub nargs: usize,
    pub scope: Scope,
    pub defsp: usize,
}

/// ## Operand stack value
#[derive(Clone)]
pub enum Val {
    Nil,
    Int(i32),
    Str(String),
    ConstStr(Rc<str>),
    Ref(Ref),
    Pos(usize),
    FuncPos(usize),
    Arg,
    RetInfo(Box<RetInfo>),
}

impl Val {
    pub fn is_str(&self) -> bool {
        matches!(self, Val::Str(_) | Val::ConstStr(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Val::Int(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            Val::ConstStr(s) => Some(s),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Nil => "nil",
            Val::Int(_) => "int",
            Val::Str(_) | Val::ConstStr(_) => "string",
            Val::Ref(_) => "reference",
            Val::Pos(_) => "label",
            Val::FuncPos(_) => "function",
            Val::Arg => "argument marker",
            Val::RetInfo(_) => "return info",
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Val) -> bool {
        use Val::*;
        match (self, other) {
            (Nil, Nil) | (Arg, Arg) => true,
            (Int(a), Int(b)) => a == b,
            (Pos(a), Pos(b)) | (FuncPos(a), FuncPos(b)) => a == b,
            (Ref(a), Ref(b)) => a.id == b.id,
            (RetInfo(a), RetInfo(b)) => a.pos == b.pos && a.defsp == b.defsp,
            (a, b) => match (a.as_str(), b.as_str()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl std::fmt::Debug for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Val::*;
        match self {
            Nil => write!(f, "Nil"),
            Int(i) => write!(f, "Int({})", i),
            Str(s) => write!(f, "Str({:?})", s),
            ConstStr(s) => write!(f, "ConstStr({:?})", s),
            Ref(r) => write!(f, "Ref({}[{}])", r.id.symbol, r.id.index),
            Pos(p) => write!(f, "Pos({})", p),
            FuncPos(p) => write!(f, "FuncPos({})", p),
            Arg => write!(f, "Arg"),
            RetInfo(r) => write!(f, "RetInfo(pos={}, nargs={})", r.pos, r.nargs),
        }
    }
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Val::Int(i) => write!(f, "{}", i),
            Val::Str(s) => write!(f, "{}", s),
            Val::ConstStr(s) => write!(f, "{}", s),
            v => write!(f, "{:?}", v),
        }
    }
}
