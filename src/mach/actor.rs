use super::{ActorId, ScriptState, Var};
use std::collections::BTreeMap;

pub type AccountId = u32;

/// What a suspended dialog is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Next,
    Close,
    Menu,
    Input,
}

/// An answer delivered by the host, read back by the command that asked.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Menu(i32),
    Number(i32),
    Text(String),
}

/// Dialog bookkeeping kept on the actor rather than in the script state,
/// so the host can find and answer the right state.
#[derive(Debug, Default, Clone)]
pub struct Dialog {
    pub waiting: Option<Wait>,
    pub reply: Option<Reply>,
    /// Choices shown by the pending menu.
    pub options: usize,
}

/// ## External actor
///
/// A connected player or anything else a script can attach to. Owns the
/// character-scoped variables and, while a dialog is open, the suspended
/// state waiting on it.
#[derive(Debug)]
pub struct Actor {
    id: ActorId,
    account: AccountId,
    pub(crate) vars: Var,
    pub(crate) temp: Var,
    params: BTreeMap<i32, i32>,
    pub(crate) state: Option<ScriptState>,
    pub(crate) dialog: Dialog,
}

impl Actor {
    pub fn new(id: ActorId, account: AccountId) -> Actor {
        Actor {
            id,
            account,
            vars: Var::new(),
            temp: Var::new(),
            params: BTreeMap::new(),
            state: None,
            dialog: Dialog::default(),
        }
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn param(&self, selector: i32) -> i32 {
        self.params.get(&selector).copied().unwrap_or(0)
    }

    pub fn set_param(&mut self, selector: i32, value: i32) {
        self.params.insert(selector, value);
    }

    pub fn waiting(&self) -> Option<Wait> {
        self.dialog.waiting
    }

    pub fn has_script(&self) -> bool {
        self.state.is_some()
    }
}
