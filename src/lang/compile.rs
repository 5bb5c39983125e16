use super::lex::Scanner;
use super::symbol::{Kind, SymbolId, SymbolTable};
use super::syntax::{ArgStyle, Block, Syntax};
use super::token::{Assign, Operator, Word, UNARY_PRECEDENCE};
use super::Error;
use crate::error;
use crate::mach::{Code, Opcode, Script, NEXT_LINE};

type Result<T> = std::result::Result<T, Error>;

/// Event label names longer than this are deprecated.
const EVENT_NAME_LENGTH: usize = 23;

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// The body is not wrapped in `{ }`.
    pub ignore_external_braces: bool,
    /// An empty body compiles to a script holding only `Nop` instead of
    /// `None`.
    pub return_empty_script: bool,
    /// Record `On...` labels in the script's label table.
    pub use_label_db: bool,
    /// Too few arguments for a command is an error rather than a warning.
    pub strict_arguments: bool,
}

impl Default for CompileOptions {
    fn default() -> CompileOptions {
        CompileOptions {
            ignore_external_braces: false,
            return_empty_script: false,
            use_label_db: true,
            strict_arguments: true,
        }
    }
}

/// Compiles one script body.
///
/// Returns `Ok(None)` for an empty body unless
/// [`CompileOptions::return_empty_script`] is set. Labels and function
/// declarations never outlive the call, whether it succeeds or fails.
pub fn compile(
    symbols: &mut SymbolTable,
    source: &str,
    file: &str,
    line: usize,
    options: CompileOptions,
) -> Result<Option<Script>> {
    symbols.reset_labels();
    let result = Compiler::new(symbols, source, file, line, options).script();
    symbols.reset_labels();
    result
}

struct Compiler<'s, 'a> {
    sym: &'s mut SymbolTable,
    scan: Scanner<'a>,
    file: &'a str,
    line: usize,
    options: CompileOptions,
    code: Code,
    syntax: Syntax,
    for_step: bool,
    label_refs: Vec<(SymbolId, usize)>,
    event_labels: Vec<(String, usize)>,
}

impl<'s, 'a> Compiler<'s, 'a> {
    fn new(
        sym: &'s mut SymbolTable,
        source: &'a str,
        file: &'a str,
        line: usize,
        options: CompileOptions,
    ) -> Compiler<'s, 'a> {
        Compiler {
            sym,
            scan: Scanner::new(source, line),
            file,
            line,
            options,
            code: Code::new(),
            syntax: Syntax::new(),
            for_step: false,
            label_refs: vec![],
            event_labels: vec![],
        }
    }

    fn err(&self, message: &'static str) -> Error {
        self.scan.error(error!(SyntaxError; message))
    }

    fn err_at(&self, pos: usize, error: Error) -> Error {
        let (line, column) = self.scan.location(pos);
        error.at(line, column)
    }

    fn warn(&self, pos: usize, message: &str) {
        let (line, column) = self.scan.location(pos);
        log::warn!("{}:{}:{}: {}", self.file, line, column, message);
    }

    fn script(mut self) -> Result<Option<Script>> {
        self.scan.skip_space()?;
        let end = if self.options.ignore_external_braces {
            if self.scan.at_end() && !self.options.return_empty_script {
                return Ok(None);
            }
            None
        } else {
            if !self.scan.is(b'{') {
                return Err(self.err("not found '{'"));
            }
            self.scan.bump(1);
            self.scan.skip_space()?;
            if self.scan.is(b'}') && !self.options.return_empty_script {
                return Ok(None);
            }
            Some(b'}')
        };
        loop {
            self.scan.skip_space()?;
            if self.syntax.depth() == 0 && self.scan.peek() == end {
                break;
            }
            if self.scan.at_end() {
                return Err(self.err("unexpected end of script"));
            }
            if self.parse_label()? {
                continue;
            }
            self.parse_line()?;
        }
        if end.is_some() {
            self.scan.bump(1);
            self.scan.skip_space()?;
            if !self.scan.at_end() {
                return Err(self.err("unexpected text after end of script"));
            }
        }
        self.code.emit_op(Opcode::Nop);
        self.finish()
    }

    fn finish(mut self) -> Result<Option<Script>> {
        let undefined: Vec<String> = (0..self.sym.len())
            .filter(|id| self.sym.kind(*id) == Kind::UserFunc)
            .map(|id| self.sym.name(id).to_string())
            .collect();
        if !undefined.is_empty() {
            return Err(error!(UnresolvedFunction; format!(
                "function '{}' declared but not defined",
                undefined.join("', '")
            )));
        }
        for (id, pos) in &self.label_refs {
            match self.sym.kind(*id) {
                Kind::Label | Kind::UserFuncPos => {}
                _ => {
                    let msg = format!("label '{}' is not defined", self.sym.name(*id));
                    return Err(self.err_at(*pos, error!(UndefinedLabel; msg)));
                }
            }
        }
        self.code.finish(self.sym);
        Ok(Some(Script::new(
            self.file,
            self.line,
            self.code.into_bytes(),
            self.event_labels,
        )))
    }

    fn builtin(&self, name: &str) -> Result<SymbolId> {
        match self.sym.find(name) {
            Some(id) if self.sym.kind(id) == Kind::Builtin => Ok(id),
            _ => Err(error!(InternalError; format!("built-in '{}' is not registered", name))),
        }
    }

    fn emit_symbol(&mut self, id: SymbolId) -> Result<()> {
        let pos = self.scan.pos();
        match self.code.emit_symbol(self.sym, id) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.err_at(pos, e)),
        }
    }

    fn emit_word(&mut self, name: &str) -> Result<()> {
        let id = self.sym.intern(name);
        self.emit_symbol(id)
    }

    fn begin_call(&mut self, builtin: &str) -> Result<()> {
        let id = self.builtin(builtin)?;
        self.emit_symbol(id)?;
        self.code.emit_op(Opcode::Arg);
        Ok(())
    }

    fn end_call(&mut self) {
        self.code.emit_op(Opcode::Func);
        self.code.emit_op(Opcode::Eol);
    }

    fn emit_goto(&mut self, label: &str) -> Result<()> {
        self.begin_call("goto")?;
        self.emit_word(label)?;
        self.end_call();
        Ok(())
    }

    fn set_label(&mut self, name: &str) -> Result<()> {
        let id = self.sym.intern(name);
        self.place(id, Kind::Label)
    }

    fn place(&mut self, id: SymbolId, kind: Kind) -> Result<()> {
        let pos = self.code.len();
        let at = self.scan.pos();
        match self.code.resolve_label(self.sym, id, pos, kind) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.err_at(at, e)),
        }
    }

    /// `jump_zero (COND), label;` with the cursor at `(`.
    fn emit_jump_zero(&mut self, label: &str) -> Result<()> {
        self.scan.skip_space()?;
        if !self.scan.is(b'(') {
            return Err(self.err("need '('"));
        }
        self.begin_call("jump_zero")?;
        self.parse_expr()?;
        self.emit_word(label)?;
        self.end_call();
        Ok(())
    }

    fn parse_label(&mut self) -> Result<bool> {
        let word = self.scan.peek_word();
        if word.is_empty() || word.eq_ignore_ascii_case("default") {
            return Ok(false);
        }
        let mut look = self.scan.clone();
        look.bump(word.len());
        look.skip_space()?;
        if !look.is(b':') {
            return Ok(false);
        }
        let id = self.sym.intern(word);
        self.place(id, Kind::Label)?;
        if word.starts_with("On") {
            if word.len() > EVENT_NAME_LENGTH {
                self.warn(
                    self.scan.pos(),
                    &format!("label name '{}' is longer than {} characters", word, EVENT_NAME_LENGTH),
                );
            }
            if self.options.use_label_db {
                self.event_labels.push((word.to_string(), self.code.len()));
            }
        }
        look.bump(1);
        self.scan = look;
        Ok(true)
    }

    fn expect_terminator(&mut self) -> Result<()> {
        self.scan.skip_space()?;
        if self.for_step {
            if !self.scan.is(b')') {
                return Err(self.err("expected ')'"));
            }
        } else if !self.scan.is(b';') {
            return Err(self.err("expected ';'"));
        }
        self.scan.bump(1);
        Ok(())
    }

    fn parse_line(&mut self) -> Result<()> {
        self.scan.skip_space()?;
        match self.scan.peek() {
            Some(b';') => {
                self.scan.bump(1);
                return self.syntax_close();
            }
            Some(b')') if self.for_step => {
                self.scan.bump(1);
                return Ok(());
            }
            Some(b'{') => {
                self.syntax.open_null();
                self.scan.bump(1);
                return Ok(());
            }
            Some(b'}') => return self.curly_close(),
            _ => {}
        }
        if self.parse_syntax()? {
            return Ok(());
        }
        if self.parse_variable()? {
            self.expect_terminator()?;
            return self.syntax_close();
        }
        self.parse_callfunc(false)?;
        self.code.emit_op(Opcode::Eol);
        self.expect_terminator()?;
        self.syntax_close()
    }

    /// Parses a statement fenced so closing it cannot close the
    /// surrounding structure.
    fn parse_nested_line(&mut self) -> Result<()> {
        self.syntax.open_null();
        let result = self.parse_line();
        self.syntax.close();
        result
    }

    fn curly_close(&mut self) -> Result<()> {
        match self.syntax.top().map(|f| (f.block, f.index, f.count, f.flag)) {
            Some((Block::Null, ..)) => {
                self.syntax.close();
                self.scan.bump(1);
                self.syntax_close()
            }
            Some((Block::Switch, index, count, has_default)) => {
                self.emit_switch_reset(index)?;
                self.emit_goto(&format!("__SW{:x}_FIN", index))?;
                self.set_label(&format!("__SW{:x}_{:x}", index, count))?;
                if has_default {
                    self.emit_goto(&format!("__SW{:x}_DEF", index))?;
                }
                self.set_label(&format!("__SW{:x}_FIN", index))?;
                self.syntax.close();
                self.scan.bump(1);
                self.syntax_close()
            }
            _ => Err(self.err("unexpected '}'")),
        }
    }

    fn emit_switch_reset(&mut self, index: u32) -> Result<()> {
        self.begin_call("set")?;
        self.emit_word(&format!("$@__SW{:x}_VAL", index))?;
        self.code.emit_int(0);
        self.end_call();
        Ok(())
    }

    fn syntax_close(&mut self) -> Result<()> {
        while self.syntax_close_one()? {}
        Ok(())
    }

    /// Closes the innermost structure if the statement just parsed
    /// completes it. Returns true when the next one out should be tried.
    fn syntax_close_one(&mut self) -> Result<bool> {
        let (block, index, count, flag) = match self.syntax.top() {
            Some(f) => (f.block, f.index, f.count, f.flag),
            None => return Ok(false),
        };
        match block {
            Block::If => {
                self.emit_goto(&format!("__IF{:x}_FIN", index))?;
                self.set_label(&format!("__IF{:x}_{:x}", index, count))?;
                if let Some(frame) = self.syntax.top_mut() {
                    frame.count += 1;
                }
                self.scan.skip_space()?;
                if !flag && Word::from_str(self.scan.peek_word()) == Some(Word::Else) {
                    self.scan.word();
                    self.scan.skip_space()?;
                    if Word::from_str(self.scan.peek_word()) == Some(Word::If) {
                        self.scan.word();
                        self.emit_jump_zero(&format!("__IF{:x}_{:x}", index, count + 1))?;
                    } else if let Some(frame) = self.syntax.top_mut() {
                        frame.flag = true;
                    }
                    return Ok(false);
                }
                self.syntax.close();
                self.set_label(&format!("__IF{:x}_FIN", index))?;
                Ok(true)
            }
            Block::Do => {
                if flag {
                    self.set_label(&format!("__DO{:x}_NXT", index))?;
                }
                self.scan.skip_space()?;
                if Word::from_str(self.scan.peek_word()) != Some(Word::While) {
                    return Err(self.err("need 'while'"));
                }
                self.scan.word();
                self.emit_jump_zero(&format!("__DO{:x}_FIN", index))?;
                self.emit_goto(&format!("__DO{:x}_BGN", index))?;
                self.set_label(&format!("__DO{:x}_FIN", index))?;
                self.scan.expect(b';', "need ';'")?;
                self.syntax.close();
                Ok(true)
            }
            Block::For => {
                self.emit_goto(&format!("__FR{:x}_NXT", index))?;
                self.set_label(&format!("__FR{:x}_FIN", index))?;
                self.syntax.close();
                Ok(true)
            }
            Block::While => {
                self.emit_goto(&format!("__WL{:x}_NXT", index))?;
                self.set_label(&format!("__WL{:x}_FIN", index))?;
                self.syntax.close();
                Ok(true)
            }
            Block::Function => {
                self.begin_call("return")?;
                self.end_call();
                self.set_label(&format!("__FN{:x}_FIN", index))?;
                self.syntax.close();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn parse_syntax(&mut self) -> Result<bool> {
        let word = match Word::from_str(self.scan.peek_word()) {
            Some(word) => word,
            None => return Ok(false),
        };
        let start = self.scan.pos();
        self.scan.word();
        match word {
            Word::Break | Word::Continue => {
                let is_break = word == Word::Break;
                let target = self.syntax.enclosing_loop(is_break).map(|frame| {
                    let prefix = match frame.block {
                        Block::Do => {
                            if !is_break {
                                frame.flag = true;
                            }
                            "DO"
                        }
                        Block::For => "FR",
                        Block::While => "WL",
                        _ => "SW",
                    };
                    let suffix = if is_break { "FIN" } else { "NXT" };
                    format!("__{}{:x}_{}", prefix, frame.index, suffix)
                });
                let label = match target {
                    Some(label) => label,
                    None => {
                        return Err(self.err_at(
                            start,
                            error!(UnexpectedBreak; format!("unexpected '{}'", word)),
                        ))
                    }
                };
                self.emit_goto(&label)?;
                self.scan.expect(b';', "expected ';'")?;
                self.syntax_close()?;
            }
            Word::Case => self.parse_case(start)?,
            Word::Default => self.parse_default(start)?,
            Word::Do => {
                let index = self.syntax.open(Block::Do);
                self.set_label(&format!("__DO{:x}_BGN", index))?;
            }
            Word::For => self.parse_for()?,
            Word::Function => self.parse_function()?,
            Word::If => {
                let index = self.syntax.open(Block::If);
                self.emit_jump_zero(&format!("__IF{:x}_1", index))?;
            }
            Word::Switch => {
                self.scan.skip_space()?;
                if !self.scan.is(b'(') {
                    return Err(self.err("need '('"));
                }
                let index = self.syntax.open(Block::Switch);
                self.begin_call("set")?;
                self.emit_word(&format!("$@__SW{:x}_VAL", index))?;
                self.parse_expr()?;
                self.end_call();
                self.scan.expect(b'{', "expected '{'")?;
            }
            Word::While => {
                let index = self.syntax.open(Block::While);
                self.set_label(&format!("__WL{:x}_NXT", index))?;
                self.emit_jump_zero(&format!("__WL{:x}_FIN", index))?;
            }
            Word::Else => return Err(self.err_at(start, error!(SyntaxError; "unexpected 'else'"))),
        }
        Ok(true)
    }

    fn switch_frame(&self, start: usize, what: &str) -> Result<(u32, u32, bool)> {
        match self.syntax.top() {
            Some(f) if f.block == Block::Switch => Ok((f.index, f.count, f.flag)),
            _ => Err(self.err_at(
                start,
                error!(SyntaxError; format!("unexpected '{}'", what)),
            )),
        }
    }

    fn parse_case(&mut self, start: usize) -> Result<()> {
        let (index, count, _) = self.switch_frame(start, "case")?;
        if count != 1 {
            self.emit_goto(&format!("__SW{:x}_{:x}J", index, count))?;
            self.set_label(&format!("__SW{:x}_{:x}", index, count))?;
        }
        let before = self.scan.pos();
        self.scan.skip_space()?;
        if self.scan.pos() == before {
            return Err(self.err("expect space ' '"));
        }
        let value_pos = self.scan.pos();
        let value = if self.scan.is_number() {
            let n = self.scan.number();
            if self.scan.word_len() > 0 {
                return Err(self.err("'case' label is not an integer"));
            }
            self.clamp(n, value_pos)
        } else {
            let word = self.scan.word();
            match self.sym.constant(word) {
                Some(v) if !word.is_empty() => v,
                _ => {
                    return Err(self.err_at(
                        value_pos,
                        error!(SyntaxError; "'case' label is not an integer"),
                    ))
                }
            }
        };
        self.scan.expect(b':', "expect ':'")?;
        let duplicate = match self.syntax.top_mut() {
            Some(frame) => !frame.cases.insert(value),
            None => false,
        };
        if duplicate {
            return Err(self.err_at(
                value_pos,
                error!(DuplicateCase; format!("dup 'case' {}", value)),
            ));
        }
        self.begin_call("jump_zero")?;
        self.code.emit_int(value);
        self.emit_word(&format!("$@__SW{:x}_VAL", index))?;
        self.code.emit_op(Opcode::Eq);
        self.emit_word(&format!("__SW{:x}_{:x}", index, count + 1))?;
        self.end_call();
        if count != 1 {
            self.set_label(&format!("__SW{:x}_{:x}J", index, count))?;
        }
        self.emit_switch_reset(index)?;
        if let Some(frame) = self.syntax.top_mut() {
            frame.count += 1;
        }
        Ok(())
    }

    fn parse_default(&mut self, start: usize) -> Result<()> {
        let (index, count, has_default) = self.switch_frame(start, "default")?;
        if has_default {
            return Err(self.err_at(start, error!(DuplicateCase; "dup 'default'")));
        }
        self.scan.expect(b':', "need ':'")?;
        if count != 1 {
            self.emit_goto(&format!("__SW{:x}_DEF", index))?;
        }
        self.set_label(&format!("__SW{:x}_{:x}", index, count))?;
        self.emit_goto(&format!("__SW{:x}_{:x}", index, count + 1))?;
        self.set_label(&format!("__SW{:x}_DEF", index))?;
        if let Some(frame) = self.syntax.top_mut() {
            frame.flag = true;
            frame.count += 1;
        }
        Ok(())
    }

    fn parse_for(&mut self) -> Result<()> {
        let index = self.syntax.open(Block::For);
        self.scan.expect(b'(', "need '('")?;
        self.parse_nested_line()?;
        self.set_label(&format!("__FR{:x}_J", index))?;
        self.scan.skip_space()?;
        if !self.scan.is(b';') {
            self.begin_call("jump_zero")?;
            self.parse_expr()?;
            self.emit_word(&format!("__FR{:x}_FIN", index))?;
            self.end_call();
        }
        self.scan.expect(b';', "need ';'")?;
        self.emit_goto(&format!("__FR{:x}_BGN", index))?;
        self.set_label(&format!("__FR{:x}_NXT", index))?;
        self.for_step = true;
        let step = self.parse_nested_line();
        self.for_step = false;
        step?;
        self.emit_goto(&format!("__FR{:x}_J", index))?;
        self.set_label(&format!("__FR{:x}_BGN", index))
    }

    fn parse_function(&mut self) -> Result<()> {
        self.scan.skip_space()?;
        let name_pos = self.scan.pos();
        let name = self.scan.word();
        if name.is_empty() {
            return Err(self.err("function name is missing or invalid"));
        }
        let id = self.sym.intern(name);
        let invalid = || error!(SyntaxError; "function name is invalid");
        self.scan.skip_space()?;
        if self.scan.is(b';') {
            match self.sym.kind(id) {
                Kind::Name => {
                    if let Some(sym) = self.sym.get_mut(id) {
                        sym.kind = Kind::UserFunc;
                    }
                }
                Kind::UserFunc | Kind::UserFuncPos => {}
                _ => return Err(self.err_at(name_pos, invalid())),
            }
            self.scan.bump(1);
            return self.syntax_close();
        }
        if !self.scan.is(b'{') {
            return Err(self.err("expect ';' or '{' at function syntax"));
        }
        if !matches!(self.sym.kind(id), Kind::Name | Kind::UserFunc | Kind::UserFuncPos) {
            return Err(self.err_at(name_pos, invalid()));
        }
        let index = self.syntax.open(Block::Function);
        self.emit_goto(&format!("__FN{:x}_FIN", index))?;
        self.place(id, Kind::UserFuncPos)
    }

    fn clamp(&self, n: i64, pos: usize) -> i32 {
        if n > i32::MAX as i64 {
            self.warn(pos, "overflow detected, capping value to INT_MAX");
            i32::MAX
        } else if n < i32::MIN as i64 {
            self.warn(pos, "underflow detected, capping value to INT_MIN");
            i32::MIN
        } else {
            n as i32
        }
    }

    /// Statement-level assignment, lowered to `set`. Returns false with
    /// the cursor untouched when the statement is not an assignment.
    fn parse_variable(&mut self) -> Result<bool> {
        let start = self.scan.pos();
        let mut pre = None;
        if self.scan.rest().starts_with("++") {
            pre = Some(Opcode::Add);
        } else if self.scan.rest().starts_with("--") {
            pre = Some(Opcode::Sub);
        }
        if pre.is_some() {
            self.scan.bump(2);
            self.scan.skip_space()?;
        }
        let var_pos = self.scan.pos();
        let name = self.scan.word();
        if name.is_empty() {
            self.scan.set_pos(start);
            return Ok(false);
        }
        self.scan.skip_space()?;
        let index = if self.scan.is(b'[') {
            let open = self.scan.pos();
            self.skip_brackets()?;
            self.scan.skip_space()?;
            Some(open + 1)
        } else {
            None
        };
        let assign = match pre {
            Some(_) => None,
            None => match Assign::scan(self.scan.rest()) {
                Some((assign, len)) => {
                    self.scan.bump(len);
                    Some(assign)
                }
                None => {
                    self.scan.set_pos(start);
                    return Ok(false);
                }
            },
        };
        let id = self.sym.intern(name);
        match self.sym.kind(id) {
            Kind::Name | Kind::Param => {}
            _ => {
                return Err(self.err_at(
                    var_pos,
                    error!(SyntaxError; "cannot modify a variable which has the same name as a function, label or constant"),
                ))
            }
        }
        self.begin_call("set")?;
        self.syntax.open_arglist(ArgStyle::Paren);
        self.push_variable(id, index)?;
        let step = match (pre, assign) {
            (Some(op), _) => Some(op),
            (None, Some(Assign::Increment)) => Some(Opcode::Add),
            (None, Some(Assign::Decrement)) => Some(Opcode::Sub),
            _ => None,
        };
        match (step, assign) {
            (Some(op), _) => {
                self.push_variable(id, index)?;
                self.code.emit_int(1);
                self.code.emit_op(op);
            }
            (None, Some(Assign::Compound(op))) => {
                self.push_variable(id, index)?;
                self.parse_subexpr(-1)?;
                self.code.emit_op(op.opcode());
            }
            _ => self.parse_subexpr(-1)?,
        }
        self.syntax.close();
        self.end_call();
        Ok(true)
    }

    /// Moves past a balanced `[ ... ]`.
    fn skip_brackets(&mut self) -> Result<()> {
        let mut depth = 0;
        loop {
            match self.scan.peek() {
                Some(b'[') => depth += 1,
                Some(b']') => {
                    depth -= 1;
                    if depth == 0 {
                        self.scan.bump(1);
                        return Ok(());
                    }
                }
                Some(b'"') => {
                    self.scan.string()?;
                    continue;
                }
                Some(b';') | None => return Err(self.err("unmatched '['")),
                _ => {}
            }
            self.scan.bump(1);
        }
    }

    /// Pushes a reference to `id`, or to `id[index]` by re-reading the
    /// index expression at `index`.
    fn push_variable(&mut self, id: SymbolId, index: Option<usize>) -> Result<()> {
        let at = match index {
            Some(at) => at,
            None => return self.emit_symbol(id),
        };
        let resume = self.scan.pos();
        self.scan.set_pos(at);
        self.begin_call("getelementofarray")?;
        self.emit_symbol(id)?;
        self.parse_subexpr(-1)?;
        self.scan.skip_space()?;
        if !self.scan.is(b']') {
            return Err(self.err("unmatched ']'"));
        }
        self.code.emit_op(Opcode::Func);
        self.scan.set_pos(resume);
        Ok(())
    }

    fn parse_callfunc(&mut self, require_paren: bool) -> Result<()> {
        let start = self.scan.pos();
        let name = self.scan.word();
        let id = self.sym.intern(name);
        let signature: Vec<u8> = match self.sym.kind(id) {
            Kind::Builtin => {
                self.emit_symbol(id)?;
                self.code.emit_op(Opcode::Arg);
                let index = self.sym.value(id) as usize;
                self.sym.signature(index).bytes().collect()
            }
            Kind::UserFunc | Kind::UserFuncPos => {
                self.begin_call("callsub")?;
                self.emit_symbol(id)?;
                self.tail_signature("callsub")?
            }
            _ if self.sym.is_function(id) && !name.is_empty() => {
                self.begin_call("callfunc")?;
                self.code.emit_str(name.as_bytes());
                self.tail_signature("callfunc")?
            }
            _ => {
                return Err(self.err_at(
                    start,
                    error!(SyntaxError; "expect command, missing function name or calling undeclared function"),
                ))
            }
        };
        self.scan.skip_space()?;
        let mut arg = 0;
        let style = if self.scan.is(b';') {
            ArgStyle::NoParen
        } else if self.empty_parens()? {
            ArgStyle::Paren
        } else {
            let style = if require_paren {
                if !self.scan.is(b'(') {
                    return Err(self.err("need '('"));
                }
                self.scan.bump(1);
                ArgStyle::Paren
            } else if self.scan.is(b'(') {
                ArgStyle::Undefined
            } else {
                ArgStyle::NoParen
            };
            self.syntax.open_arglist(style);
            let parsed = self.parse_arguments(&signature, &mut arg);
            let frame = self.syntax.close();
            parsed?;
            frame.map_or(style, |f| f.style)
        };
        if let Some(&code) = signature.get(arg) {
            if code != b'?' && code != b'*' {
                if self.options.strict_arguments {
                    return Err(self.err("not enough arguments, expected ','"));
                }
                self.warn(self.scan.pos(), &format!("not enough arguments for '{}'", name));
            }
        }
        if style == ArgStyle::Paren {
            self.scan.skip_space()?;
            if !self.scan.is(b')') {
                return Err(self.err("expected ')' to close argument list"));
            }
            self.scan.bump(1);
        }
        self.code.emit_op(Opcode::Func);
        Ok(())
    }

    /// Consumes `(` when it is immediately closed by `)`.
    fn empty_parens(&mut self) -> Result<bool> {
        if !self.scan.is(b'(') {
            return Ok(false);
        }
        let mut look = self.scan.clone();
        look.bump(1);
        look.skip_space()?;
        if !look.is(b')') {
            return Ok(false);
        }
        self.scan = look;
        Ok(true)
    }

    /// The callee's signature without the leading target argument.
    fn tail_signature(&self, builtin: &str) -> Result<Vec<u8>> {
        let id = self.builtin(builtin)?;
        let sig: Vec<u8> = self.sym.signature(self.sym.value(id) as usize).bytes().collect();
        match sig.first() {
            None => Err(error!(InternalError; format!("{} has no arguments", builtin))),
            Some(b'*') => Ok(sig),
            Some(_) => Ok(sig[1..].to_vec()),
        }
    }

    fn parse_arguments(&mut self, signature: &[u8], arg: &mut usize) -> Result<()> {
        while let Some(&code) = signature.get(*arg) {
            self.scan.skip_space()?;
            let before = self.scan.pos();
            let label = if code == b'l' {
                Some(self.scan.peek_word())
            } else {
                None
            };
            self.parse_subexpr(-1)?;
            if self.scan.pos() == before {
                break;
            }
            if let Some(word) = label {
                let consumed = self.scan.source()[before..self.scan.pos()].trim_end();
                if !word.is_empty() && consumed == word {
                    let id = self.sym.intern(word);
                    if matches!(self.sym.kind(id), Kind::Name | Kind::Label) {
                        self.label_refs.push((id, before));
                    }
                }
            }
            if code != b'*' {
                *arg += 1;
            }
            self.scan.skip_space()?;
            if *arg >= signature.len() || !self.scan.is(b',') {
                break;
            }
            self.scan.bump(1);
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<()> {
        self.scan.skip_space()?;
        match self.scan.peek() {
            Some(b')') | Some(b';') | Some(b':') | Some(b'[') | Some(b']') | Some(b'}') => {
                Err(self.err("unexpected char"))
            }
            _ => self.parse_subexpr(-1),
        }
    }

    fn parse_subexpr(&mut self, limit: i32) -> Result<()> {
        self.scan.skip_space()?;
        if self.scan.is(b'-') {
            let mut look = self.scan.clone();
            look.bump(1);
            look.skip_space()?;
            if look.is(b';') || look.is(b',') {
                self.code.emit_pos(NEXT_LINE)?;
                self.scan.bump(1);
                return Ok(());
            }
        }
        let rest = self.scan.rest();
        if rest.starts_with("++") || rest.starts_with("--") {
            self.parse_pre_increment()?;
        } else if let Some(op) = match self.scan.peek() {
            Some(b'-') => Some(Opcode::Neg),
            Some(b'!') => Some(Opcode::LNot),
            Some(b'~') => Some(Opcode::Not),
            _ => None,
        } {
            self.scan.bump(1);
            self.parse_subexpr(UNARY_PRECEDENCE)?;
            self.code.emit_op(op);
        } else {
            self.parse_simpleexpr()?;
        }
        self.scan.skip_space()?;
        while let Some(op) = Operator::scan(self.scan.rest()) {
            let rest = self.scan.rest();
            if (op == Operator::Plus && rest.starts_with("++"))
                || (op == Operator::Minus && rest.starts_with("--"))
                || op.precedence() <= limit
            {
                break;
            }
            self.scan.bump(op.len());
            if op == Operator::Ternary {
                self.parse_subexpr(-1)?;
                self.scan.skip_space()?;
                if !self.scan.is(b':') {
                    return Err(self.err("need ':'"));
                }
                self.scan.bump(1);
                self.parse_subexpr(-1)?;
            } else {
                self.parse_subexpr(op.precedence())?;
            }
            self.code.emit_op(op.opcode());
            self.scan.skip_space()?;
        }
        Ok(())
    }

    /// `++x` inside an expression updates `x` in place and yields it.
    fn parse_pre_increment(&mut self) -> Result<()> {
        let op = if self.scan.is(b'+') {
            Opcode::Add
        } else {
            Opcode::Sub
        };
        self.scan.bump(2);
        self.scan.skip_space()?;
        let var_pos = self.scan.pos();
        let name = self.scan.word();
        if name.is_empty() {
            return Err(self.err("expected variable after '++' or '--'"));
        }
        let id = self.sym.intern(name);
        if !matches!(self.sym.kind(id), Kind::Name | Kind::Param) {
            return Err(self.err_at(var_pos, error!(SyntaxError; "invalid variable")));
        }
        let index = if self.scan.is(b'[') {
            let open = self.scan.pos();
            self.skip_brackets()?;
            Some(open + 1)
        } else {
            None
        };
        self.push_variable(id, index)?;
        self.code.emit_op(Opcode::Ref);
        self.code.emit_int(1);
        self.code.emit_op(op);
        Ok(())
    }

    fn parse_simpleexpr(&mut self) -> Result<()> {
        self.scan.skip_space()?;
        match self.scan.peek() {
            None => Err(self.err("unexpected end of script")),
            Some(b';') | Some(b',') => Err(self.err("unexpected end of expression")),
            Some(b'(') => self.parse_paren(),
            Some(b'"') => {
                let bytes = self.scan.string()?;
                self.code.emit_str(&bytes);
                Ok(())
            }
            _ if self.scan.is_number() => {
                let pos = self.scan.pos();
                let n = self.scan.number();
                let value = self.clamp(n, pos);
                self.code.emit_int(value);
                Ok(())
            }
            _ => {
                let word = self.scan.peek_word();
                if word.is_empty() {
                    return Err(self.err("unexpected character"));
                }
                let id = self.sym.intern(word);
                match self.sym.kind(id) {
                    Kind::Builtin | Kind::UserFunc | Kind::UserFuncPos => {
                        return self.parse_callfunc(true)
                    }
                    _ if self.sym.is_function(id) => return self.parse_callfunc(true),
                    _ => {}
                }
                self.scan.word();
                if self.scan.is(b'[') {
                    self.begin_call("getelementofarray")?;
                    self.emit_symbol(id)?;
                    self.scan.bump(1);
                    self.parse_subexpr(-1)?;
                    self.scan.skip_space()?;
                    if !self.scan.is(b']') {
                        return Err(self.err("unmatched ']'"));
                    }
                    self.scan.bump(1);
                    self.code.emit_op(Opcode::Func);
                    Ok(())
                } else {
                    self.emit_symbol(id)
                }
            }
        }
    }

    /// A parenthesized expression. Inside an argument list that opened
    /// with `(`, a `,` before the matching `)` shows the paren belongs
    /// to the call.
    fn parse_paren(&mut self) -> Result<()> {
        if let Some(frame) = self.syntax.top_mut() {
            if frame.block == Block::ArgList {
                frame.count += 1;
            }
        }
        self.scan.bump(1);
        self.parse_subexpr(-1)?;
        self.scan.skip_space()?;
        let at_comma = self.scan.is(b',');
        if let Some(frame) = self.syntax.top_mut() {
            if frame.block == Block::ArgList && frame.style == ArgStyle::Undefined {
                frame.count -= 1;
                if frame.count == 0 {
                    if at_comma {
                        frame.style = ArgStyle::Paren;
                        return Ok(());
                    }
                    frame.style = ArgStyle::NoParen;
                }
            }
        }
        if !self.scan.is(b')') {
            return Err(self.err("unmatched ')'"));
        }
        self.scan.bump(1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mach::code::{decode, Instr};

    fn table() -> SymbolTable {
        let mut t = SymbolTable::new();
        for (name, sig) in &[
            ("set", "rv?"),
            ("getelementofarray", "ri"),
            ("goto", "l"),
            ("jump_zero", "il"),
            ("callsub", "l*"),
            ("callfunc", "s*"),
            ("return", "?"),
            ("mes", "s"),
            ("end", ""),
            ("select", "s*"),
        ] {
            t.define_builtin(name, sig).unwrap();
        }
        t
    }

    fn build(t: &mut SymbolTable, src: &str) -> Result<Script> {
        compile(t, src, "test", 1, CompileOptions::default()).map(|s| s.unwrap())
    }

    fn ops(script: &Script) -> Vec<String> {
        let mut v = vec![];
        let mut pos = 0;
        while pos < script.len() {
            let (i, next) = decode(script.code(), pos).unwrap();
            v.push(match i {
                Instr::Op(op) => op.to_string(),
                Instr::Int(n) => n.to_string(),
                Instr::Pos(p) => format!("@{}", p),
                Instr::FuncPos(p) => format!("fn@{}", p),
                Instr::Name(_) => "name".to_string(),
                Instr::Str(s) => format!("{:?}", String::from_utf8_lossy(s)),
            });
            pos = next;
        }
        v
    }

    #[test]
    fn test_empty_script() {
        let mut t = table();
        assert!(compile(&mut t, "{ }", "t", 1, CompileOptions::default())
            .unwrap()
            .is_none());
        let opts = CompileOptions {
            return_empty_script: true,
            ..CompileOptions::default()
        };
        let s = compile(&mut t, "{}", "t", 1, opts).unwrap().unwrap();
        assert_eq!(ops(&s), vec!["NOP"]);
    }

    #[test]
    fn test_statement_layout() {
        let mut t = table();
        let s = build(&mut t, "{ .@a = 3 * .@b; }").unwrap();
        assert_eq!(
            ops(&s),
            vec!["name", "ARG", "name", "3", "name", "MUL", "FUNC", "EOL", "NOP"]
        );
    }

    #[test]
    fn test_negative_literal() {
        let mut t = table();
        let s = build(&mut t, "{ mes -5; }").unwrap();
        assert_eq!(ops(&s), vec!["name", "ARG", "5", "NEG", "FUNC", "EOL", "NOP"]);
    }

    #[test]
    fn test_literal_overflow_is_clamped() {
        let mut t = table();
        let s = build(&mut t, "{ .@a = 99999999999; }").unwrap();
        assert!(ops(&s).contains(&i32::MAX.to_string()));
    }

    #[test]
    fn test_goto_forward_label() {
        let mut t = table();
        let s = build(&mut t, "{ goto L_End; goto L_End; mes \"x\"; L_End: end; }").unwrap();
        let o = ops(&s);
        let targets: Vec<&String> = o.iter().filter(|x| x.starts_with('@')).collect();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], targets[1]);
    }

    #[test]
    fn test_errors() {
        let mut t = table();
        let e = build(&mut t, "{ goto L_Nowhere; }").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::UndefinedLabel));
        let e = build(&mut t, "{ L_A: L_A: end; }").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::DuplicateLabel));
        let e = build(&mut t, "{ break; }").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::UnexpectedBreak));
        let e = build(&mut t, "{ switch(1) { case 5: case 5: break; } }").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::DuplicateCase));
        let e = build(&mut t, "{ function F; }").unwrap_err();
        assert!(e.is(crate::lang::ErrorCode::UnresolvedFunction));
        let e = build(&mut t, "{ mes \"a\" }").unwrap_err();
        assert_eq!(e.line(), Some(1));
        assert!(build(&mut t, "{ nosuchcommand; }").is_err());
        assert!(build(&mut t, "{ mes; }").is_err());
        assert!(build(&mut t, "{ .@x = (1 ? 2); }").is_err());
    }

    #[test]
    fn test_labels_do_not_leak_between_compiles() {
        let mut t = table();
        build(&mut t, "{ L_A: end; }").unwrap();
        build(&mut t, "{ L_A: end; }").unwrap();
        assert!(build(&mut t, "{ goto L_A; }").is_err());
    }

    #[test]
    fn test_event_labels() {
        let mut t = table();
        let s = build(&mut t, "{ end; OnInit: end; L_Other: end; }").unwrap();
        assert_eq!(s.labels().len(), 1);
        assert_eq!(s.labels()[0].0, "OnInit");
        assert!(s.label("oninit").is_some());
    }

    #[test]
    fn test_paren_call_forms() {
        let mut t = table();
        assert!(build(&mut t, "{ mes(\"a\"); mes (\"a\") + \"b\"; mes \"a\"; }").is_ok());
        assert!(build(&mut t, "{ select(\"a\", \"b\"); select \"a\", \"b\"; }").is_ok());
    }

    #[test]
    fn test_user_function_forms() {
        let mut t = table();
        assert!(build(&mut t, "{ function F; F(); end; function F { return 1; } }").is_ok());
        assert!(build(&mut t, "{ function G { return; } .@x = G(); }").is_ok());
    }
}
