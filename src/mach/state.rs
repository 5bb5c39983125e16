use super::{Dialog, Scope, Script, Stack, Val, Var};
use crate::lang::Error;
use std::cell::RefCell;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

pub type ActorId = u32;
pub type EntityId = u32;
pub type InstanceId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Run,
    /// Waiting for the actor; resumes after the current statement.
    Stop,
    End,
    Goto,
    Return,
    /// Ended with a dialog the actor still has to dismiss.
    Close,
    /// Waiting; resumes by calling the same command again with the same
    /// arguments.
    RerunLine,
}

/// A state displaced from its actor by a newer one, put back when the
/// newer one finishes.
pub struct Backup {
    pub state: Box<ScriptState>,
    pub dialog: Dialog,
}

/// ## Execution state
///
/// One in-flight run of a script. `defsp` marks the bottom of the
/// current call frame; `start..end` is the argument window of the
/// command being executed.
pub struct ScriptState {
    pub stack: Stack<Val>,
    pub defsp: usize,
    pub start: usize,
    pub end: usize,
    pub pos: usize,
    pub script: Rc<Script>,
    pub scope: Scope,
    pub state: RunState,
    pub owner: EntityId,
    pub actor: Option<ActorId>,
    pub instance: Option<InstanceId>,
    pub freeloop: bool,
    pub op2ref: bool,
    pub mes_active: bool,
    /// Milliseconds requested by `sleep`, pending until parked.
    pub sleep: Option<u32>,
    /// Set by `sleep2`: the actor stays attached while parked.
    pub keep_actor: bool,
    pub failed: bool,
    pub backup: Option<Backup>,
}

impl ScriptState {
    pub fn new(script: Rc<Script>, pos: usize, owner: EntityId, max_stack: usize) -> ScriptState {
        ScriptState {
            stack: Stack::new("stack overflow", max_stack),
            defsp: 0,
            start: 0,
            end: 0,
            pos,
            script,
            scope: Rc::new(RefCell::new(Var::new())),
            state: RunState::Run,
            owner,
            actor: None,
            instance: None,
            freeloop: false,
            op2ref: false,
            mes_active: false,
            sleep: None,
            keep_actor: false,
            failed: false,
            backup: None,
        }
    }

    /// Removes `start..end` from the stack and moves the markers that
    /// point above it.
    pub fn pop_range(&mut self, start: usize, end: usize) -> Result<()> {
        self.stack.remove(start, end)?;
        let len = end - start;
        let adjust = |mark: &mut usize| {
            if *mark > end {
                *mark -= len;
            } else if *mark > start {
                *mark = start;
            }
        };
        adjust(&mut self.start);
        adjust(&mut self.end);
        adjust(&mut self.defsp);
        Ok(())
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.state, RunState::Stop | RunState::RerunLine)
    }
}

impl std::fmt::Debug for ScriptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ScriptState({:?} @{} {:?}, sp={} defsp={})",
            self.script,
            self.pos,
            self.state,
            self.stack.len(),
            self.defsp
        )
    }
}
