use super::code::disassemble;
use super::Var;
use std::cell::{Ref, RefCell, RefMut};

/// ## Compiled script
///
/// Immutable bytecode plus the script's own `.` variables, which live as
/// long as the script does.
pub struct Script {
    file: String,
    line: usize,
    code: Box<[u8]>,
    vars: RefCell<Var>,
    labels: Vec<(String, usize)>,
}

impl Script {
    pub fn new(file: &str, line: usize, code: Vec<u8>, labels: Vec<(String, usize)>) -> Script {
        Script {
            file: file.to_string(),
            line,
            code: code.into_boxed_slice(),
            vars: RefCell::new(Var::new()),
            labels,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn vars(&self) -> Ref<'_, Var> {
        self.vars.borrow()
    }

    pub fn vars_mut(&self) -> RefMut<'_, Var> {
        self.vars.borrow_mut()
    }

    /// Event labels (names starting with `On`) and their positions.
    pub fn labels(&self) -> &[(String, usize)] {
        &self.labels
    }

    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, pos)| *pos)
    }

    pub fn listing(&self) -> String {
        disassemble(&self.code)
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Script({}:{}, {} bytes)", self.file, self.line, self.code.len())
    }
}
