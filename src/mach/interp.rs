use super::code::{decode, Instr};
use super::function::{expected_types, ArgType};
use super::var::is_string_name;
use super::{Bridge, Opcode, Operation, Ref, RunState, Val, VarId};
use crate::error;
use crate::lang::symbol::Kind;
use crate::lang::Error;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Error>;

impl Bridge<'_> {
    /// Runs until the state stops, ends or fails. Errors are reported
    /// and leave the state ended with `failed` set.
    pub fn execute(&mut self) {
        if let Err(e) = self.execute_inner() {
            self.report(&e);
        }
    }

    fn execute_inner(&mut self) -> Result<()> {
        let config = self.rt.config.clone();
        let mut cmdcount = config.check_cmdcount;
        let mut gotocount = config.check_gotocount;
        match self.st.state {
            RunState::End => return Ok(()),
            RunState::RerunLine => {
                self.st.state = RunState::Run;
                self.run_func()?;
                match self.st.state {
                    RunState::Goto => self.st.state = RunState::Run,
                    RunState::Run => {}
                    _ => return Ok(()),
                }
            }
            _ => self.st.state = RunState::Run,
        }
        while self.st.state == RunState::Run {
            if !self.st.freeloop && config.check_cmdcount > 0 {
                if cmdcount == 0 {
                    return Err(error!(InfiniteLoop; format!(
                        "too many commands without a pause (more than {})",
                        config.check_cmdcount
                    )));
                }
                cmdcount -= 1;
            }
            if self.step()? && !self.st.freeloop && config.check_gotocount > 0 {
                if gotocount == 0 {
                    return Err(error!(InfiniteLoop; format!(
                        "too many jumps without a pause (more than {})",
                        config.check_gotocount
                    )));
                }
                gotocount -= 1;
            }
        }
        Ok(())
    }

    /// Executes one instruction. Returns true when it jumped.
    fn step(&mut self) -> Result<bool> {
        let script = Rc::clone(&self.st.script);
        let (instr, next) = decode(script.code(), self.st.pos)?;
        self.st.pos = next;
        match instr {
            Instr::Int(n) => self.push(Val::Int(n))?,
            Instr::Pos(p) => self.push(Val::Pos(p))?,
            Instr::FuncPos(p) => self.push(Val::FuncPos(p))?,
            Instr::Name(id) => self.push(Val::Ref(Ref::new(VarId::new(id))))?,
            Instr::Str(bytes) => {
                let s: Rc<str> = Rc::from(String::from_utf8_lossy(bytes).as_ref());
                self.push(Val::ConstStr(s))?
            }
            Instr::Op(op) => match op {
                Opcode::Nop => self.st.state = RunState::End,
                Opcode::Arg => self.push(Val::Arg)?,
                Opcode::Func => {
                    self.run_func()?;
                    if self.st.state == RunState::Goto {
                        self.st.state = RunState::Run;
                        return Ok(true);
                    }
                }
                Opcode::Eol => {
                    if self.st.stack.len() < self.st.defsp {
                        return Err(error!(InternalError; format!(
                            "stack below frame (sp={} defsp={})",
                            self.st.stack.len(),
                            self.st.defsp
                        )));
                    }
                    self.st.stack.truncate(self.st.defsp);
                }
                Opcode::Ref => self.st.op2ref = true,
                Opcode::Op3 => self.op_3()?,
                op if op.is_binary() => self.op_2(op)?,
                op if op.is_unary() => self.op_1(op)?,
                op => {
                    return Err(error!(InternalError; format!("unexpected {} in code", op)))
                }
            },
        }
        Ok(false)
    }

    fn operand(&mut self, val: Val) -> Result<Val> {
        match self.deref(val)? {
            Val::ConstStr(s) => Ok(Val::Str(s.to_string())),
            v => Ok(v),
        }
    }

    fn op_1(&mut self, op: Opcode) -> Result<()> {
        let val = self.st.stack.pop()?;
        let val = self.operand(val)?;
        let val = Operation::unary(op, val)?;
        self.push(val)
    }

    fn op_2(&mut self, op: Opcode) -> Result<()> {
        let (lhs, rhs) = self.st.stack.pop_2()?;
        let target = match (&lhs, self.st.op2ref) {
            (Val::Ref(r), true) => Some(r.clone()),
            _ => None,
        };
        self.st.op2ref = false;
        let lhs = self.operand(lhs)?;
        let rhs = self.operand(rhs)?;
        let val = Operation::binary(op, lhs, rhs)?;
        if let Some(r) = target {
            self.set_var(&r, val.clone())?;
        }
        self.push(val)
    }

    /// `cond ? a : b` with all three operands already evaluated.
    fn op_3(&mut self) -> Result<()> {
        let (cond, yes, no) = self.st.stack.pop_3()?;
        let cond = self.to_int(cond)?;
        let val = if cond != 0 { yes } else { no };
        let val = self.operand(val)?;
        self.push(val)
    }

    /// Calls the command whose arguments start at the nearest `Arg`.
    pub(crate) fn run_func(&mut self) -> Result<()> {
        let end = self.st.stack.len();
        let marker = (self.st.defsp..end)
            .rev()
            .find(|&i| matches!(self.st.stack.get(i), Some(Val::Arg)));
        let start = match marker {
            Some(m) if m > self.st.defsp => m - 1,
            _ => return Err(error!(InternalError; "function call without arguments marker")),
        };
        let id = match self.st.stack.get(start) {
            Some(Val::Ref(r)) if self.rt.symbols.kind(r.id.symbol) == Kind::Builtin => r.id.symbol,
            Some(v) => {
                return Err(error!(InternalError; format!(
                    "called value is not a command: {:?}",
                    v
                )))
            }
            None => return Err(error!(InternalError; "stack underflow")),
        };
        self.st.start = start;
        self.st.end = end;
        self.command = Some(id);
        let index = self.rt.symbols.value(id) as usize;
        self.check_arguments(index)?;
        let handler = match self.rt.builtins.get(index) {
            Some(f) => f.handler(),
            None => {
                return Err(error!(InternalError; format!(
                    "command '{}' has no handler",
                    self.rt.symbols.name(id)
                )))
            }
        };
        handler(self)?;
        if self.st.state == RunState::RerunLine {
            return Ok(());
        }
        let (start, end) = (self.st.start, self.st.end);
        self.st.pop_range(start, end)?;
        if self.st.state == RunState::Return {
            self.return_from_call()?;
        }
        Ok(())
    }

    fn check_arguments(&mut self, index: usize) -> Result<()> {
        if !self.rt.config.warn_func_mismatch_argtypes {
            return Ok(());
        }
        let signature = self.rt.symbols.signature(index).to_string();
        for (i, expect) in expected_types(&signature, self.arg_count()).into_iter().enumerate() {
            let expect = match expect {
                Some(t) => t,
                None => continue,
            };
            let raw = match self.arg_raw(i) {
                Some(v) => v.clone(),
                None => continue,
            };
            let fits = match (expect, &raw) {
                (ArgType::Any, _) => true,
                (ArgType::Reference, v) => matches!(v, Val::Ref(_)),
                (ArgType::Label, v) => matches!(v, Val::Pos(_) | Val::FuncPos(_)),
                (ArgType::Int, Val::Ref(r)) => !is_string_name(self.var_name(r)),
                (ArgType::Str, Val::Ref(r)) => is_string_name(self.var_name(r)),
                (ArgType::Int, v) => v.is_int() || *v == Val::Nil,
                (ArgType::Str, v) => v.is_str() || *v == Val::Nil,
            };
            if fits {
                continue;
            }
            let message = format!(
                "{}: argument {} should be {}, got {}",
                self.command_name(),
                i + 1,
                expect,
                raw.type_name()
            );
            if self.rt.config.argtype_mismatch_fatal {
                return Err(error!(TypeMismatch; message));
            }
            log::warn!(
                "{} ({}:{} pos {})",
                message,
                self.st.script.file(),
                self.st.script.line(),
                self.st.pos
            );
        }
        Ok(())
    }

    fn return_from_call(&mut self) -> Result<()> {
        let olddefsp = self.st.defsp;
        let start = self.st.start;
        self.st.pop_range(olddefsp, start)?;
        let info = match olddefsp.checked_sub(1).and_then(|i| self.st.stack.get(i)) {
            Some(Val::RetInfo(info)) => info.as_ref().clone(),
            _ => return Err(error!(IllegalFunctionCall; "return without callsub or callfunc")),
        };
        self.st.pos = info.pos;
        self.st.script = info.script;
        self.st.scope = info.scope;
        self.st.defsp = info.defsp;
        self.st.pop_range(olddefsp - info.nargs - 1, olddefsp)?;
        self.st.state = RunState::Goto;
        Ok(())
    }

    fn report(&mut self, e: &Error) {
        log::error!(
            "{} in {}:{} (command '{}', owner {}, pos {})",
            e,
            self.st.script.file(),
            self.st.script.line(),
            self.command_name(),
            self.st.owner,
            self.st.pos
        );
        self.st.failed = true;
        self.st.state = RunState::End;
    }
}
