use super::{
    builtins, AccountId, Actor, ActorId, Backup, Bridge, Config, EntityId, Function, InstanceId,
    Reply, Ref, RunState, Script, ScriptState, Val, Var, VarId, Wait,
};
use crate::error;
use crate::lang::{self, report, CompileOptions, Error, SymbolTable};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ended,
    /// Ended with a dialog left open for the actor to dismiss.
    Closed,
    Failed,
    Cancelled,
}

/// ## Events
///
/// Everything a script does that the host has to show or act on. The
/// runtime queues them; the host drains the queue with
/// [`Runtime::events`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Message {
        actor: ActorId,
        text: String,
    },
    /// A "next" button; continue with [`Runtime::next`].
    Next {
        actor: ActorId,
    },
    /// A "close" button. After `close2` the script continues once
    /// [`Runtime::close`] is called.
    Close {
        actor: ActorId,
    },
    /// Answer with [`Runtime::select_menu`], choices counted from 1.
    Menu {
        actor: ActorId,
        options: Vec<String>,
    },
    /// Answer with [`Runtime::input_number`] or [`Runtime::input_string`].
    Input {
        actor: ActorId,
        text: bool,
    },
    Debug {
        owner: EntityId,
        text: String,
    },
    Finished {
        actor: Option<ActorId>,
        owner: EntityId,
        status: Status,
    },
}

#[derive(Debug, Default)]
pub struct AccountVars {
    pub local: Var,
    pub global: Var,
}

struct Sleeper {
    deadline: u64,
    state: ScriptState,
}

/// ## Script engine
///
/// Owns every registry a script can reach: symbols, commands, variable
/// stores, actors and parked states. Single threaded; the host calls in
/// from its own loop and drains [`Event`]s after each call.
pub struct Runtime {
    pub(crate) config: Config,
    pub(crate) symbols: SymbolTable,
    pub(crate) builtins: Vec<Function>,
    pub(crate) globals: Var,
    pub(crate) global_temp: Var,
    pub(crate) accounts: BTreeMap<AccountId, AccountVars>,
    pub(crate) actors: BTreeMap<ActorId, Actor>,
    pub(crate) instances: BTreeMap<InstanceId, Var>,
    next_instance: InstanceId,
    functions: BTreeMap<String, Rc<Script>>,
    sleeping: Vec<Sleeper>,
    pub(crate) tick: u64,
    events: VecDeque<Event>,
    pub(crate) rng: StdRng,
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Runtime {
        let mut rt = Runtime {
            config,
            symbols: SymbolTable::new(),
            builtins: vec![],
            globals: Var::new(),
            global_temp: Var::new(),
            accounts: BTreeMap::new(),
            actors: BTreeMap::new(),
            instances: BTreeMap::new(),
            next_instance: 1,
            functions: BTreeMap::new(),
            sleeping: vec![],
            tick: 0,
            events: VecDeque::new(),
            rng: StdRng::from_entropy(),
        };
        if let Err(e) = builtins::install(&mut rt) {
            log::error!("installing built-ins: {}", e);
        }
        rt
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Seeds `rand` so runs can be reproduced.
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn load_constants(&mut self, text: &str) -> usize {
        self.symbols.load_constants(text)
    }

    /// Adds a host command. Scripts compiled afterwards can call it.
    pub fn register<F>(&mut self, name: &str, signature: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut Bridge) -> Result<()> + 'static,
    {
        let index = self.symbols.define_builtin(name, signature)?;
        debug_assert_eq!(index, self.builtins.len());
        self.builtins.push(Function::new(name, Rc::new(handler)));
        Ok(())
    }

    pub fn compile(&mut self, source: &str, file: &str, line: usize) -> Result<Option<Rc<Script>>> {
        let options = CompileOptions {
            strict_arguments: self.config.warn_func_mismatch_paramnum,
            ..CompileOptions::default()
        };
        self.compile_with(source, file, line, options)
    }

    /// Compiles a body; failures are logged with source context before
    /// being returned.
    pub fn compile_with(
        &mut self,
        source: &str,
        file: &str,
        line: usize,
        options: CompileOptions,
    ) -> Result<Option<Rc<Script>>> {
        match lang::compile(&mut self.symbols, source, file, line, options) {
            Ok(script) => Ok(script.map(Rc::new)),
            Err(e) => {
                log::error!("{}", report::context(file, source, line, &e));
                Err(e)
            }
        }
    }

    /// Makes `script` callable as `callfunc "name"` and, in scripts
    /// compiled afterwards, as `name(...)`.
    pub fn add_function(&mut self, name: &str, script: Rc<Script>) {
        self.symbols.mark_function(name);
        if self
            .functions
            .insert(name.to_ascii_lowercase(), script)
            .is_some()
        {
            log::warn!("function '{}' redefined", name);
        }
    }

    pub fn function(&self, name: &str) -> Option<Rc<Script>> {
        self.functions.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn add_actor(&mut self, id: ActorId, account: AccountId) {
        self.actors.insert(id, Actor::new(id, account));
    }

    /// Drops the actor. A dialog it was in is ended as cancelled; sleeping
    /// states that keep it end when their timer fires.
    pub fn remove_actor(&mut self, id: ActorId) -> Option<Actor> {
        let mut actor = self.actors.remove(&id)?;
        if let Some(st) = actor.state.take() {
            self.abandon(st, id);
        }
        Some(actor)
    }

    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    pub fn create_instance(&mut self) -> InstanceId {
        let id = self.next_instance;
        self.next_instance += 1;
        self.instances.insert(id, Var::new());
        id
    }

    pub fn destroy_instance(&mut self, id: InstanceId) -> bool {
        self.instances.remove(&id).is_some()
    }

    pub fn globals(&self) -> &Var {
        &self.globals
    }

    /// Starts `script` at `pos`. If the actor is already in a dialog, that
    /// state is set aside and restored when this run finishes.
    pub fn run(
        &mut self,
        script: &Rc<Script>,
        pos: usize,
        actor: Option<ActorId>,
        owner: EntityId,
    ) -> Result<()> {
        let st = self.start(script, pos, actor, owner)?;
        self.run_state(st);
        Ok(())
    }

    /// Runs without the loop governors, for scripts the host trusts.
    pub fn run_trusted(
        &mut self,
        script: &Rc<Script>,
        pos: usize,
        actor: Option<ActorId>,
        owner: EntityId,
    ) -> Result<()> {
        let mut st = self.start(script, pos, actor, owner)?;
        st.freeloop = true;
        self.run_state(st);
        Ok(())
    }

    pub fn run_in_instance(
        &mut self,
        script: &Rc<Script>,
        pos: usize,
        instance: InstanceId,
        actor: Option<ActorId>,
        owner: EntityId,
    ) -> Result<()> {
        if !self.instances.contains_key(&instance) {
            return Err(error!(IllegalFunctionCall; format!("no instance {}", instance)));
        }
        let mut st = self.start(script, pos, actor, owner)?;
        st.instance = Some(instance);
        self.run_state(st);
        Ok(())
    }

    /// Starts at an `On...` label. Returns false when the script has no
    /// such label.
    pub fn run_event(
        &mut self,
        script: &Rc<Script>,
        label: &str,
        actor: Option<ActorId>,
        owner: EntityId,
    ) -> Result<bool> {
        match script.label(label) {
            Some(pos) => {
                self.run(script, pos, actor, owner)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn start(
        &mut self,
        script: &Rc<Script>,
        pos: usize,
        actor: Option<ActorId>,
        owner: EntityId,
    ) -> Result<ScriptState> {
        if pos >= script.len() {
            return Err(error!(IllegalFunctionCall; format!(
                "start position {} is outside the script",
                pos
            )));
        }
        let mut st = ScriptState::new(Rc::clone(script), pos, owner, self.config.max_stack);
        if let Some(id) = actor {
            let found = match self.actors.get_mut(&id) {
                Some(a) => a,
                None => return Err(error!(NoPlayerAttached; format!("no actor {}", id))),
            };
            if let Some(old) = found.state.take() {
                st.backup = Some(Backup {
                    state: Box::new(old),
                    dialog: std::mem::take(&mut found.dialog),
                });
            }
            st.actor = Some(id);
        }
        Ok(st)
    }

    /// Executes until the state waits or ends, then files it where the
    /// host can find it again.
    fn run_state(&mut self, mut st: ScriptState) {
        Bridge::new(self, &mut st).execute();
        if st.state == RunState::RerunLine {
            if let Some(ms) = st.sleep {
                self.park(st, ms);
                return;
            }
        }
        if st.is_waiting() {
            let stored = match st.actor.and_then(|id| self.actors.get_mut(&id)) {
                Some(actor) => {
                    actor.state = Some(st);
                    None
                }
                None => Some(st),
            };
            if let Some(mut st) = stored {
                log::error!(
                    "script waiting for input has no actor (owner {}, pos {})",
                    st.owner,
                    st.pos
                );
                st.failed = true;
                self.finish(st, None);
            }
            return;
        }
        self.finish(st, None);
    }

    fn park(&mut self, mut st: ScriptState, ms: u32) {
        if !st.keep_actor {
            if let Some(id) = st.actor.take() {
                self.restore_backup(&mut st, id);
            }
        }
        let deadline = self.tick + ms as u64;
        self.sleeping.push(Sleeper { deadline, state: st });
    }

    fn restore_backup(&mut self, st: &mut ScriptState, id: ActorId) {
        if let Some(backup) = st.backup.take() {
            if let Some(actor) = self.actors.get_mut(&id) {
                actor.state = Some(*backup.state);
                actor.dialog = backup.dialog;
            }
        }
    }

    fn finish(&mut self, mut st: ScriptState, status: Option<Status>) {
        let status = status.unwrap_or(if st.failed {
            Status::Failed
        } else if st.state == RunState::Close {
            Status::Closed
        } else {
            Status::Ended
        });
        if let Some(id) = st.actor {
            if let Some(actor) = self.actors.get_mut(&id) {
                actor.dialog = Default::default();
            }
            self.restore_backup(&mut st, id);
        }
        self.emit(Event::Finished {
            actor: st.actor,
            owner: st.owner,
            status,
        });
    }

    /// Ends a state whose actor went away, along with any it displaced.
    fn abandon(&mut self, mut st: ScriptState, id: ActorId) {
        let backup = st.backup.take();
        self.emit(Event::Finished {
            actor: Some(id),
            owner: st.owner,
            status: Status::Cancelled,
        });
        if let Some(backup) = backup {
            self.abandon(*backup.state, id);
        }
    }

    /// Hands a reply to the state waiting on `actor` and runs it.
    fn resume(&mut self, actor: ActorId, expect: &[Wait], reply: Option<Reply>) -> Result<()> {
        let found = match self.actors.get_mut(&actor) {
            Some(a) => a,
            None => return Err(error!(NoPlayerAttached; format!("no actor {}", actor))),
        };
        match found.dialog.waiting {
            Some(w) if expect.contains(&w) => {}
            w => {
                return Err(error!(IllegalFunctionCall; format!(
                    "actor {} is not waiting for that (waiting: {:?})",
                    actor, w
                )))
            }
        }
        let st = match found.state.take() {
            Some(st) => st,
            None => return Err(error!(InternalError; format!("actor {} has no script", actor))),
        };
        found.dialog.waiting = None;
        found.dialog.reply = reply;
        self.run_state(st);
        Ok(())
    }

    pub fn next(&mut self, actor: ActorId) -> Result<()> {
        self.resume(actor, &[Wait::Next], None)
    }

    /// Dismisses a `close2` dialog.
    pub fn close(&mut self, actor: ActorId) -> Result<()> {
        self.resume(actor, &[Wait::Close], None)
    }

    /// `choice` counts from 1; 255 cancels.
    pub fn select_menu(&mut self, actor: ActorId, choice: i32) -> Result<()> {
        self.resume(actor, &[Wait::Menu], Some(Reply::Menu(choice)))
    }

    pub fn input_number(&mut self, actor: ActorId, n: i32) -> Result<()> {
        self.resume(actor, &[Wait::Input], Some(Reply::Number(n)))
    }

    pub fn input_string(&mut self, actor: ActorId, s: &str) -> Result<()> {
        self.resume(actor, &[Wait::Input], Some(Reply::Text(s.to_string())))
    }

    /// Ends whatever dialog the actor is in. Returns false if none.
    pub fn cancel(&mut self, actor: ActorId) -> bool {
        let st = match self.actors.get_mut(&actor) {
            Some(found) => {
                found.dialog = Default::default();
                found.state.take()
            }
            None => None,
        };
        match st {
            Some(st) => {
                self.finish(st, Some(Status::Cancelled));
                true
            }
            None => false,
        }
    }

    /// Advances the clock to `now` milliseconds and wakes every state
    /// whose delay has run out, earliest first.
    pub fn run_timers(&mut self, now: u64) {
        self.tick = self.tick.max(now);
        loop {
            let due = self
                .sleeping
                .iter()
                .enumerate()
                .filter(|(_, s)| s.deadline <= self.tick)
                .min_by_key(|(_, s)| s.deadline)
                .map(|(i, _)| i);
            let st = match due {
                Some(i) => self.sleeping.remove(i).state,
                None => break,
            };
            if st.keep_actor {
                if let Some(id) = st.actor {
                    if !self.actors.contains_key(&id) {
                        log::warn!("sleeping script lost actor {} (owner {})", id, st.owner);
                        self.finish(st, Some(Status::Cancelled));
                        continue;
                    }
                }
            }
            self.run_state(st);
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn sleeping(&self) -> usize {
        self.sleeping.len()
    }

    /// Discards the parked states of one owner. Returns how many.
    pub fn stop_sleep_timers(&mut self, owner: EntityId) -> usize {
        let before = self.sleeping.len();
        let (gone, kept): (Vec<Sleeper>, Vec<Sleeper>) = std::mem::take(&mut self.sleeping)
            .into_iter()
            .partition(|s| s.state.owner == owner);
        self.sleeping = kept;
        for s in gone {
            self.finish(s.state, Some(Status::Cancelled));
        }
        before - self.sleeping.len()
    }

    /// Frees every parked and waiting state.
    pub fn shutdown(&mut self) {
        self.sleeping.clear();
        for actor in self.actors.values_mut() {
            actor.state = None;
            actor.dialog = Default::default();
        }
        self.events.clear();
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    /// Reads a variable the way a script running for `actor` would.
    pub fn variable(&mut self, actor: Option<ActorId>, name: &str) -> Result<Val> {
        let mut st = self.scratch_state(actor);
        let r = Ref::new(VarId::new(self.symbols.intern(name)));
        Bridge::new(self, &mut st).get_var(&r)
    }

    pub fn set_variable(&mut self, actor: Option<ActorId>, name: &str, val: Val) -> Result<()> {
        let mut st = self.scratch_state(actor);
        let r = Ref::new(VarId::new(self.symbols.intern(name)));
        Bridge::new(self, &mut st).set_var(&r, val)
    }

    fn scratch_state(&self, actor: Option<ActorId>) -> ScriptState {
        let script = Rc::new(Script::new("<host>", 0, vec![0], vec![]));
        let mut st = ScriptState::new(script, 0, 0, self.config.max_stack);
        st.actor = actor;
        st
    }
}
