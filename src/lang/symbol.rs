use super::Error;
use crate::error;
use std::collections::BTreeSet;

type Result<T> = std::result::Result<T, Error>;

pub type SymbolId = usize;

const HASH_SIZE: usize = 1021;

/// What an interned name currently stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A variable name or a label that has not been placed yet.
    Name,
    Constant,
    Param,
    Builtin,
    /// Declared with `function Name;` but no body yet.
    UserFunc,
    /// A user function whose body has been placed.
    UserFuncPos,
    Label,
}

impl Kind {
    /// Process-global intrinsics that a compile must never overwrite.
    pub fn is_intrinsic(self) -> bool {
        matches!(self, Kind::Constant | Kind::Param | Kind::Builtin)
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: Kind,
    offset: usize,
    len: usize,
    pub value: i32,
    pub label: Option<usize>,
    pub backpatch: Option<usize>,
    next: Option<SymbolId>,
}

/// ## Interned names
///
/// Every identifier, label and keyword seen by the compiler, plus every
/// built-in and constant registered by the host, lives here exactly once.
/// Lookups are case-insensitive. Ids are stable for the life of the table.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    buckets: Vec<Option<SymbolId>>,
    symbols: Vec<Symbol>,
    strings: String,
    signatures: Vec<String>,
    functions: BTreeSet<SymbolId>,
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

fn hash(name: &str) -> usize {
    let lower = name.to_ascii_lowercase();
    crc::crc32::checksum_ieee(lower.as_bytes()) as usize % HASH_SIZE
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            buckets: vec![None; HASH_SIZE],
            symbols: vec![],
            strings: String::new(),
            signatures: vec![],
            functions: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<SymbolId> {
        let mut cursor = self.buckets[hash(name)];
        while let Some(id) = cursor {
            if self.name(id).eq_ignore_ascii_case(name) {
                return Some(id);
            }
            cursor = self.symbols[id].next;
        }
        None
    }

    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let bucket = hash(name);
        let id = self.symbols.len();
        let offset = self.strings.len();
        self.strings.push_str(name);
        self.symbols.push(Symbol {
            kind: Kind::Name,
            offset,
            len: name.len(),
            value: 0,
            label: None,
            backpatch: None,
            next: self.buckets[bucket],
        });
        self.buckets[bucket] = Some(id);
        id
    }

    pub fn name(&self, id: SymbolId) -> &str {
        match self.symbols.get(id) {
            Some(sym) => &self.strings[sym.offset..sym.offset + sym.len],
            None => "",
        }
    }

    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id)
    }

    pub fn kind(&self, id: SymbolId) -> Kind {
        self.symbols.get(id).map_or(Kind::Name, |s| s.kind)
    }

    pub fn value(&self, id: SymbolId) -> i32 {
        self.symbols.get(id).map_or(0, |s| s.value)
    }

    pub fn define_constant(&mut self, name: &str, value: i32, is_param: bool) -> Result<SymbolId> {
        let id = self.intern(name);
        let sym = &mut self.symbols[id];
        match sym.kind {
            Kind::Name => {
                sym.kind = if is_param { Kind::Param } else { Kind::Constant };
                sym.value = value;
                Ok(id)
            }
            Kind::Constant | Kind::Param => Err(error!(DuplicateConstant; format!(
                "attempted to overwrite existing {} '{}' (old value={}, new value={})",
                if sym.kind == Kind::Param { "parameter" } else { "constant" },
                name,
                sym.value,
                value
            ))),
            kind => Err(error!(DuplicateConstant; format!(
                "invalid name for {} '{}' (already defined as {:?})",
                if is_param { "parameter" } else { "constant" },
                name,
                kind
            ))),
        }
    }

    /// Registers a built-in command name and returns its dispatch index.
    pub fn define_builtin(&mut self, name: &str, signature: &str) -> Result<usize> {
        let id = self.intern(name);
        if self.symbols[id].kind != Kind::Name {
            return Err(error!(DuplicateConstant; format!(
                "built-in '{}' is already defined",
                name
            )));
        }
        let index = self.signatures.len();
        self.signatures.push(signature.to_string());
        let sym = &mut self.symbols[id];
        sym.kind = Kind::Builtin;
        sym.value = index as i32;
        Ok(index)
    }

    pub fn signature(&self, index: usize) -> &str {
        self.signatures.get(index).map_or("", |s| s.as_str())
    }

    pub fn builtin_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn constant(&self, name: &str) -> Option<i32> {
        let id = self.find(name)?;
        match self.symbols[id].kind {
            Kind::Constant => Some(self.symbols[id].value),
            _ => None,
        }
    }

    /// Loads `NAME,VALUE[,IS_PARAMETER]` lines. Returns the number of
    /// constants defined; bad lines are skipped with a warning.
    pub fn load_constants(&mut self, text: &str) -> usize {
        let mut count = 0;
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            let mut fields = line.split(',').map(str::trim);
            let name = fields.next().unwrap_or("");
            let value = fields.next().and_then(parse_int);
            let is_param = match fields.next() {
                Some(flag) => parse_int(flag).map_or(false, |v| v != 0),
                None => false,
            };
            let valid_name =
                !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            match value {
                Some(value) if valid_name => match self.define_constant(name, value, is_param) {
                    Ok(_) => count += 1,
                    Err(e) => log::warn!("constants line {}: {}", n + 1, e),
                },
                _ => log::warn!("constants line {}: skipping malformed entry '{}'", n + 1, line),
            }
        }
        count
    }

    /// Records `name` as a function the host can run through
    /// `callfunc`, so `Name(args)` compiles to a call.
    pub fn mark_function(&mut self, name: &str) -> SymbolId {
        let id = self.intern(name);
        self.functions.insert(id);
        id
    }

    pub fn is_function(&self, id: SymbolId) -> bool {
        self.functions.contains(&id)
    }

    /// Returns labels and user functions to unresolved names so one
    /// compile cannot see another's positions.
    pub fn reset_labels(&mut self) {
        for sym in self.symbols.iter_mut() {
            match sym.kind {
                Kind::Label | Kind::UserFunc | Kind::UserFuncPos => sym.kind = Kind::Name,
                _ => {}
            }
            sym.label = None;
            sym.backpatch = None;
        }
    }
}

/// Parses decimal, `0x` hex and signed integers the way script sources
/// and constant files write them.
pub fn parse_int(s: &str) -> Option<i32> {
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let magnitude = if digits.len() > 2 && digits[..2].eq_ignore_ascii_case("0x") {
        i64::from_str_radix(&digits[2..], 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    let value = if negative { -magnitude } else { magnitude };
    Some(value.max(i32::MIN as i64).min(i32::MAX as i64) as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_case_insensitive() {
        let mut t = SymbolTable::new();
        let a = t.intern("Zeny");
        let b = t.intern("ZENY");
        assert_eq!(a, b);
        assert_eq!(t.name(a), "Zeny");
        assert_ne!(a, t.intern("zeny$"));
    }

    #[test]
    fn test_many_names_survive_collisions() {
        let mut t = SymbolTable::new();
        let ids: Vec<SymbolId> = (0..5000).map(|i| t.intern(&format!("v{}", i))).collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(t.find(&format!("V{}", i)), Some(*id));
        }
    }

    #[test]
    fn test_constants() {
        let mut t = SymbolTable::new();
        assert!(t.define_constant("Job_Novice", 0, false).is_ok());
        assert!(t.define_constant("job_novice", 1, false).is_err());
        assert_eq!(t.constant("JOB_NOVICE"), Some(0));
        t.define_builtin("mes", "s").unwrap();
        assert!(t.define_constant("mes", 1, false).is_err());
        assert!(t.define_builtin("mes", "s").is_err());
    }

    #[test]
    fn test_load_constants() {
        let mut t = SymbolTable::new();
        let n = t.load_constants("// header\nA,1\nB,0x10\n\nbroken line\nZeny,20,1\nC,-5\n");
        assert_eq!(n, 4);
        assert_eq!(t.constant("B"), Some(16));
        assert_eq!(t.constant("C"), Some(-5));
        let zeny = t.find("zeny").unwrap();
        assert_eq!(t.kind(zeny), Kind::Param);
        assert_eq!(t.value(zeny), 20);
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-0x1F"), Some(-31));
        assert_eq!(parse_int("99999999999"), Some(i32::MAX));
        assert_eq!(parse_int("x"), None);
    }
}
