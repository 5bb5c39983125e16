use super::var::{is_string_name, Class};
use super::{
    Actor, ActorId, Event, Reply, Ref, RunState, Runtime, ScriptState, Store, Val, Var, Wait,
};
use crate::error;
use crate::lang::symbol::{parse_int, Kind, SymbolId};
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Host bridge
///
/// What a command sees while it runs: its arguments, the running state
/// and the runtime that owns everything else. The interpreter itself runs
/// through the same bridge.
pub struct Bridge<'a> {
    pub(crate) rt: &'a mut Runtime,
    pub(crate) st: &'a mut ScriptState,
    pub(crate) command: Option<SymbolId>,
}

impl<'a> Bridge<'a> {
    pub fn new(rt: &'a mut Runtime, st: &'a mut ScriptState) -> Bridge<'a> {
        Bridge {
            rt,
            st,
            command: None,
        }
    }

    pub fn runtime(&mut self) -> &mut Runtime {
        self.rt
    }

    pub fn state(&mut self) -> &mut ScriptState {
        self.st
    }

    /// Name of the command being run, for messages.
    pub fn command_name(&self) -> &str {
        match self.command {
            Some(id) => self.rt.symbols.name(id),
            None => "",
        }
    }

    /// An error that ends the script, naming the running command.
    pub fn fail(&self, message: &str) -> Error {
        error!(IllegalFunctionCall; format!("{}: {}", self.command_name(), message))
    }

    pub fn arg_count(&self) -> usize {
        (self.st.end - self.st.start).saturating_sub(2)
    }

    pub fn has_arg(&self, i: usize) -> bool {
        i < self.arg_count()
    }

    /// The argument exactly as it was pushed, references not followed.
    pub fn arg_raw(&self, i: usize) -> Option<&Val> {
        if self.has_arg(i) {
            self.st.stack.get(self.st.start + 2 + i)
        } else {
            None
        }
    }

    /// The argument's value, `Nil` when it was not passed.
    pub fn arg(&mut self, i: usize) -> Result<Val> {
        match self.arg_raw(i).cloned() {
            Some(val) => self.deref(val),
            None => Ok(Val::Nil),
        }
    }

    pub fn int(&mut self, i: usize) -> Result<i32> {
        let val = self.arg(i)?;
        self.to_int(val)
    }

    pub fn str(&mut self, i: usize) -> Result<String> {
        let val = self.arg(i)?;
        self.to_str(val)
    }

    pub fn reference(&self, i: usize) -> Result<Ref> {
        match self.arg_raw(i) {
            Some(Val::Ref(r)) => Ok(r.clone()),
            Some(v) => Err(self.fail(&format!(
                "argument {} must be a variable, got {}",
                i + 1,
                v.type_name()
            ))),
            None => Err(self.fail(&format!("argument {} is missing", i + 1))),
        }
    }

    pub fn label(&self, i: usize) -> Result<usize> {
        match self.arg_raw(i) {
            Some(Val::Pos(p)) | Some(Val::FuncPos(p)) => Ok(*p),
            Some(v) => Err(self.fail(&format!(
                "argument {} must be a label, got {}",
                i + 1,
                v.type_name()
            ))),
            None => Err(self.fail(&format!("argument {} is missing", i + 1))),
        }
    }

    pub fn push(&mut self, val: Val) -> Result<()> {
        self.st.stack.push(val)
    }

    pub fn push_int(&mut self, n: i32) -> Result<()> {
        self.push(Val::Int(n))
    }

    pub fn push_str(&mut self, s: String) -> Result<()> {
        self.push(Val::Str(s))
    }

    pub fn push_nil(&mut self) -> Result<()> {
        self.push(Val::Nil)
    }

    /// Ends the statement here and waits; the host resumes after it.
    pub fn stop(&mut self) {
        self.st.state = RunState::Stop;
    }

    /// Waits and calls this command again with the same arguments when
    /// the host resumes.
    pub fn rerun(&mut self) {
        self.st.state = RunState::RerunLine;
    }

    pub fn end(&mut self) {
        self.st.state = RunState::End;
    }

    pub fn close(&mut self) {
        self.st.state = RunState::Close;
    }

    pub fn jump(&mut self, pos: usize) {
        self.st.pos = pos;
        self.st.state = RunState::Goto;
    }

    /// Parks the state for `ms` milliseconds. The command is called
    /// again when the timer fires, and sees [`Bridge::sleep_done`].
    pub fn sleep(&mut self, ms: u32, keep_actor: bool) {
        self.st.sleep = Some(ms);
        self.st.keep_actor = keep_actor;
        self.st.state = RunState::RerunLine;
    }

    /// True when this call is the wake-up after [`Bridge::sleep`]. Clears
    /// the request.
    pub fn sleep_done(&mut self) -> bool {
        if self.st.sleep.take().is_some() {
            self.st.keep_actor = false;
            true
        } else {
            false
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.rt.emit(event)
    }

    pub fn actor_id(&self) -> Option<ActorId> {
        self.st.actor
    }

    pub fn actor(&mut self) -> Option<&mut Actor> {
        let id = self.st.actor?;
        self.rt.actors.get_mut(&id)
    }

    /// The attached actor, or a failure for commands that cannot work
    /// without one.
    pub fn require_actor(&mut self) -> Result<ActorId> {
        match self.st.actor {
            Some(id) if self.rt.actors.contains_key(&id) => Ok(id),
            _ => Err(error!(NoPlayerAttached; format!(
                "{}: no actor attached",
                self.command_name()
            ))),
        }
    }

    /// Marks the dialog as waiting and suspends until answered.
    pub fn wait(&mut self, wait: Wait, options: usize) -> Result<()> {
        let id = self.require_actor()?;
        if let Some(actor) = self.rt.actors.get_mut(&id) {
            actor.dialog.waiting = Some(wait);
            actor.dialog.options = options;
        }
        match wait {
            Wait::Next | Wait::Close => self.stop(),
            Wait::Menu | Wait::Input => self.rerun(),
        }
        Ok(())
    }

    /// The actor's answer to this command, if it has given one yet.
    pub fn take_reply(&mut self) -> Option<Reply> {
        self.actor()?.dialog.reply.take()
    }

    pub fn menu_options(&mut self) -> usize {
        self.actor().map_or(0, |a| a.dialog.options)
    }

    pub fn deref(&mut self, val: Val) -> Result<Val> {
        match val {
            Val::Ref(r) => self.get_var(&r),
            v => Ok(v),
        }
    }

    pub fn to_int(&mut self, val: Val) -> Result<i32> {
        match self.deref(val)? {
            Val::Int(n) => Ok(n),
            Val::Nil => Ok(0),
            Val::Str(s) => Ok(str_to_int(&s)),
            Val::ConstStr(s) => Ok(str_to_int(&s)),
            v => Err(self.fail(&format!("expected a number, got {}", v.type_name()))),
        }
    }

    pub fn to_str(&mut self, val: Val) -> Result<String> {
        match self.deref(val)? {
            Val::Int(n) => Ok(n.to_string()),
            Val::Nil => Ok(String::new()),
            Val::Str(s) => Ok(s),
            Val::ConstStr(s) => Ok(s.to_string()),
            v => Err(self.fail(&format!("expected a string, got {}", v.type_name()))),
        }
    }

    pub fn var_name(&self, r: &Ref) -> &str {
        self.rt.symbols.name(r.id.symbol)
    }

    pub fn is_string_ref(&self, r: &Ref) -> bool {
        is_string_name(self.var_name(r))
    }

    fn param(&self, r: &Ref) -> Option<i32> {
        match self.rt.symbols.kind(r.id.symbol) {
            Kind::Param => Some(self.rt.symbols.value(r.id.symbol)),
            _ => None,
        }
    }

    fn missing(&self, r: &Ref, what: &str) {
        log::warn!(
            "variable '{}' needs {} (owner {})",
            self.var_name(r),
            what,
            self.st.owner
        );
    }

    /// Runs `f` on the store `r` lives in. `None` when that store needs
    /// an actor or instance the state does not have.
    pub fn with_var<R>(&mut self, r: &Ref, f: impl FnOnce(&mut Var) -> R) -> Option<R> {
        match &r.store {
            Some(Store::Scope(scope)) => return Some(f(&mut *scope.borrow_mut())),
            Some(Store::Script(script)) => return Some(f(&mut *script.vars_mut())),
            None => {}
        }
        let class = Class::of(self.var_name(r));
        match class {
            Class::Scope => Some(f(&mut *self.st.scope.borrow_mut())),
            Class::Script => Some(f(&mut *self.st.script.vars_mut())),
            Class::Global => Some(f(&mut self.rt.globals)),
            Class::GlobalTemp => Some(f(&mut self.rt.global_temp)),
            Class::Instance => {
                let found = self.st.instance.filter(|id| self.rt.instances.contains_key(id));
                match found.and_then(|id| self.rt.instances.get_mut(&id)) {
                    Some(vars) => Some(f(vars)),
                    None => {
                        self.missing(r, "an instance");
                        None
                    }
                }
            }
            Class::Char | Class::CharTemp | Class::Account | Class::AccountGlobal => {
                let account = match self.st.actor.and_then(|id| self.rt.actors.get(&id)) {
                    Some(actor) => actor.account(),
                    None => {
                        self.missing(r, "an attached actor");
                        return None;
                    }
                };
                let id = self.st.actor?;
                match class {
                    Class::Char => self.rt.actors.get_mut(&id).map(|a| f(&mut a.vars)),
                    Class::CharTemp => self.rt.actors.get_mut(&id).map(|a| f(&mut a.temp)),
                    Class::Account => Some(f(&mut self.rt.accounts.entry(account).or_default().local)),
                    _ => Some(f(&mut self.rt.accounts.entry(account).or_default().global)),
                }
            }
        }
    }

    pub fn get_var(&mut self, r: &Ref) -> Result<Val> {
        if let Some(selector) = self.param(r) {
            return Ok(match self.actor() {
                Some(actor) => Val::Int(actor.param(selector)),
                None => {
                    self.missing(r, "an attached actor");
                    Val::Int(0)
                }
            });
        }
        let is_string = self.is_string_ref(r);
        let id = r.id;
        Ok(self
            .with_var(r, |vars| vars.fetch(id, is_string))
            .unwrap_or_else(|| {
                if is_string {
                    Val::Str(String::new())
                } else {
                    Val::Int(0)
                }
            }))
    }

    /// Stores `val` converted to the variable's type. Writes that need a
    /// missing actor are dropped with a warning.
    pub fn set_var(&mut self, r: &Ref, val: Val) -> Result<()> {
        if let Some(selector) = self.param(r) {
            let value = self.to_int(val)?;
            match self.actor() {
                Some(actor) => actor.set_param(selector, value),
                None => self.missing(r, "an attached actor"),
            }
            return Ok(());
        }
        let val = if self.is_string_ref(r) {
            Val::Str(self.to_str(val)?)
        } else {
            Val::Int(self.to_int(val)?)
        };
        let id = r.id;
        self.with_var(r, |vars| vars.store(id, val));
        Ok(())
    }
}

/// Leading integer of a string, `0` when there is none.
pub fn str_to_int(s: &str) -> i32 {
    let t = s.trim();
    if let Some(n) = parse_int(t) {
        return n;
    }
    let end = t
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(t.len(), |(i, _)| i);
    parse_int(&t[..end]).unwrap_or(0)
}
