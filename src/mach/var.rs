use super::Val;
use crate::error;
use crate::lang::symbol::SymbolId;
use crate::lang::Error;
use std::collections::BTreeMap;

type Result<T> = std::result::Result<T, Error>;

/// Highest array index plus one.
pub const MAX_ARRAY_SIZE: u32 = 128;

/// A variable or one element of an array variable. Index 0 is the plain
/// variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId {
    pub symbol: SymbolId,
    pub index: u32,
}

impl VarId {
    pub fn new(symbol: SymbolId) -> VarId {
        VarId { symbol, index: 0 }
    }

    pub fn element(symbol: SymbolId, index: i32) -> Result<VarId> {
        if index < 0 || index as u32 >= MAX_ARRAY_SIZE {
            return Err(error!(SubscriptOutOfRange; format!(
                "array index {} out of range 0..{}",
                index, MAX_ARRAY_SIZE
            )));
        }
        Ok(VarId {
            symbol,
            index: index as u32,
        })
    }
}

/// Storage class selected by the name's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Char,
    CharTemp,
    Account,
    AccountGlobal,
    Global,
    GlobalTemp,
    Script,
    Scope,
    Instance,
}

impl Class {
    pub fn of(name: &str) -> Class {
        let b = name.as_bytes();
        match (b.first(), b.get(1)) {
            (Some(b'@'), _) => Class::CharTemp,
            (Some(b'#'), Some(b'#')) => Class::AccountGlobal,
            (Some(b'#'), _) => Class::Account,
            (Some(b'$'), Some(b'@')) => Class::GlobalTemp,
            (Some(b'$'), _) => Class::Global,
            (Some(b'.'), Some(b'@')) => Class::Scope,
            (Some(b'.'), _) => Class::Script,
            (Some(b'\''), _) => Class::Instance,
            _ => Class::Char,
        }
    }

    pub fn needs_actor(self) -> bool {
        matches!(
            self,
            Class::Char | Class::CharTemp | Class::Account | Class::AccountGlobal
        )
    }
}

pub fn is_string_name(name: &str) -> bool {
    name.ends_with('$')
}

/// ## Variable memory
///
/// Unset variables read as `0` or `""` and storing either removes the
/// entry, so a store only holds values that matter.
#[derive(Debug, Default, Clone)]
pub struct Var {
    vars: BTreeMap<VarId, Val>,
}

impl Var {
    pub fn new() -> Var {
        Var::default()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn fetch(&self, id: VarId, is_string: bool) -> Val {
        match self.vars.get(&id) {
            Some(val) => val.clone(),
            None if is_string => Val::Str(String::new()),
            None => Val::Int(0),
        }
    }

    pub fn fetch_int(&self, id: VarId) -> i32 {
        match self.vars.get(&id) {
            Some(Val::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn store(&mut self, id: VarId, value: Val) {
        let empty = match &value {
            Val::Int(i) => *i == 0,
            Val::Str(s) => s.is_empty(),
            Val::ConstStr(s) => s.is_empty(),
            _ => true,
        };
        if empty {
            self.vars.remove(&id);
        } else {
            let value = match value {
                Val::ConstStr(s) => Val::Str(s.to_string()),
                v => v,
            };
            self.vars.insert(id, value);
        }
    }

    fn elements(&self, symbol: SymbolId) -> impl Iterator<Item = (&VarId, &Val)> {
        self.vars
            .range(VarId { symbol, index: 0 }..VarId {
                symbol,
                index: MAX_ARRAY_SIZE,
            })
    }

    /// Highest set index plus one.
    pub fn array_size(&self, symbol: SymbolId) -> u32 {
        self.elements(symbol)
            .last()
            .map_or(0, |(id, _)| id.index + 1)
    }

    /// Removes `count` elements starting at `from`, shifting later
    /// elements down.
    pub fn delete_elements(&mut self, symbol: SymbolId, from: u32, count: u32) {
        let moved: Vec<(VarId, Val)> = self
            .elements(symbol)
            .filter(|(id, _)| id.index >= from)
            .map(|(id, v)| (*id, v.clone()))
            .collect();
        for (id, _) in &moved {
            self.vars.remove(id);
        }
        for (id, v) in moved {
            if id.index >= from + count {
                self.vars.insert(
                    VarId {
                        symbol,
                        index: id.index - count,
                    },
                    v,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert_eq!(Class::of("zeny"), Class::Char);
        assert_eq!(Class::of("@menu"), Class::CharTemp);
        assert_eq!(Class::of("#bank"), Class::Account);
        assert_eq!(Class::of("##pts"), Class::AccountGlobal);
        assert_eq!(Class::of("$count"), Class::Global);
        assert_eq!(Class::of("$@tmp$"), Class::GlobalTemp);
        assert_eq!(Class::of(".npc"), Class::Script);
        assert_eq!(Class::of(".@i"), Class::Scope);
        assert_eq!(Class::of("'inst"), Class::Instance);
        assert!(!Class::Global.needs_actor());
        assert!(Class::Account.needs_actor());
    }

    #[test]
    fn test_default_removes() {
        let mut v = Var::new();
        let id = VarId::new(3);
        v.store(id, Val::Int(5));
        assert_eq!(v.len(), 1);
        v.store(id, Val::Int(0));
        assert!(v.is_empty());
        assert_eq!(v.fetch(id, true), Val::Str(String::new()));
    }

    #[test]
    fn test_arrays() {
        let mut v = Var::new();
        for i in 0..5 {
            v.store(VarId::element(1, i).unwrap(), Val::Int(i + 10));
        }
        v.store(VarId::new(2), Val::Int(1));
        assert_eq!(v.array_size(1), 5);
        v.delete_elements(1, 1, 2);
        assert_eq!(v.array_size(1), 3);
        assert_eq!(v.fetch_int(VarId::element(1, 1).unwrap()), 13);
        assert_eq!(v.fetch_int(VarId::new(2)), 1);
        assert!(VarId::element(1, 128).is_err());
        assert!(VarId::element(1, -1).is_err());
    }
}
