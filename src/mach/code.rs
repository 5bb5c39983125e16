use super::Opcode;
use crate::error;
use crate::lang::symbol::{Kind, SymbolId, SymbolTable};
use crate::lang::Error;
use std::convert::TryFrom;

type Result<T> = std::result::Result<T, Error>;

/// Largest position or symbol id a 3 byte operand can hold.
pub const MAX_OPERAND: usize = 0xFF_FFFF;
const CHAIN_END: usize = MAX_OPERAND;

/// `Pos` operand standing for the line after the current one, written
/// in source as a lone `-` argument.
pub const NEXT_LINE: usize = MAX_OPERAND;

const CONTINUE: u8 = 0x40;
const INT_CLASS: u8 = 0x80;
const PAYLOAD: u8 = 0x3F;

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr<'a> {
    Op(Opcode),
    Int(i32),
    Pos(usize),
    FuncPos(usize),
    Name(SymbolId),
    Str(&'a [u8]),
}

/// ## Bytecode buffer
///
/// Every byte carries a two bit class and six payload bits, least
/// significant group first. `00` ends a tag and `01` continues it; `10`
/// ends a literal integer and `11` continues it. `Pos`, `Name` and
/// `FuncPos` tags are followed by a 3 byte little endian operand, `Str`
/// by raw bytes and a NUL.
///
/// References to symbols that are not yet resolved are written as
/// placeholders holding the offset of the previous placeholder for the
/// same symbol, so the buffer itself threads the backpatch chain.
#[derive(Debug, Default, Clone)]
pub struct Code {
    buf: Vec<u8>,
}

impl Code {
    pub fn new() -> Code {
        Code::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buf.shrink_to_fit();
        self.buf
    }

    fn emit_varint(&mut self, mut value: u32, class: u8) {
        while value > PAYLOAD as u32 {
            self.buf.push(class | CONTINUE | (value as u8 & PAYLOAD));
            value >>= 6;
        }
        self.buf.push(class | value as u8);
    }

    pub fn emit_op(&mut self, op: Opcode) {
        self.emit_varint(op as u32, 0)
    }

    /// Emits an integer constant as its magnitude followed by `Neg` when
    /// negative.
    pub fn emit_int(&mut self, value: i32) {
        if value == i32::MIN {
            self.emit_varint(i32::MAX as u32, INT_CLASS);
            self.emit_op(Opcode::Neg);
            self.emit_varint(1, INT_CLASS);
            self.emit_op(Opcode::Sub);
        } else if value < 0 {
            self.emit_varint(value.unsigned_abs(), INT_CLASS);
            self.emit_op(Opcode::Neg);
        } else {
            self.emit_varint(value as u32, INT_CLASS);
        }
    }

    fn emit_u24(&mut self, value: usize) -> Result<()> {
        if value > MAX_OPERAND {
            return Err(error!(Overflow; "script too large"));
        }
        self.buf.push(value as u8);
        self.buf.push((value >> 8) as u8);
        self.buf.push((value >> 16) as u8);
        Ok(())
    }

    fn read_u24(&self, at: usize) -> usize {
        read_u24(&self.buf, at)
    }

    fn write_u24(&mut self, at: usize, value: usize) {
        self.buf[at] = value as u8;
        self.buf[at + 1] = (value >> 8) as u8;
        self.buf[at + 2] = (value >> 16) as u8;
    }

    pub fn emit_pos(&mut self, pos: usize) -> Result<()> {
        self.emit_op(Opcode::Pos);
        self.emit_u24(pos)
    }

    pub fn emit_str(&mut self, bytes: &[u8]) {
        self.emit_op(Opcode::Str);
        self.buf.extend(bytes.iter().copied().filter(|&b| b != 0));
        self.buf.push(0);
    }

    /// Emits a reference to `id` in its final form when the symbol is
    /// resolved, otherwise as a link in its backpatch chain.
    pub fn emit_symbol(&mut self, symbols: &mut SymbolTable, id: SymbolId) -> Result<()> {
        let sym = match symbols.get(id) {
            Some(sym) => sym.clone(),
            None => return Err(error!(InternalError; "unknown symbol")),
        };
        match sym.kind {
            Kind::Constant => self.emit_int(sym.value),
            Kind::Label => self.emit_pos(sym.label.unwrap_or(0))?,
            Kind::UserFuncPos => {
                self.emit_op(Opcode::FuncPos);
                self.emit_u24(sym.label.unwrap_or(0))?
            }
            Kind::Param | Kind::Builtin => {
                self.emit_op(Opcode::Name);
                self.emit_u24(id)?
            }
            Kind::Name | Kind::UserFunc => {
                if id > MAX_OPERAND {
                    return Err(error!(Overflow; "too many symbols"));
                }
                self.emit_op(Opcode::Name);
                let at = self.buf.len();
                self.emit_u24(sym.backpatch.unwrap_or(CHAIN_END))?;
                if let Some(sym) = symbols.get_mut(id) {
                    sym.backpatch = Some(at);
                }
            }
        }
        Ok(())
    }

    /// Places a label (or a user function body when `kind` is
    /// `UserFuncPos`) at `pos` and patches every earlier reference.
    pub fn resolve_label(
        &mut self,
        symbols: &mut SymbolTable,
        id: SymbolId,
        pos: usize,
        kind: Kind,
    ) -> Result<()> {
        let name = symbols.name(id).to_string();
        let sym = match symbols.get_mut(id) {
            Some(sym) => sym,
            None => return Err(error!(InternalError; "unknown symbol")),
        };
        match sym.kind {
            Kind::Label | Kind::UserFuncPos => {
                return Err(error!(DuplicateLabel; format!("duplicate label '{}'", name)))
            }
            k if k.is_intrinsic() => {
                return Err(error!(InvalidLabel; format!("invalid label name '{}'", name)))
            }
            _ => {}
        }
        let tag = if kind == Kind::UserFuncPos {
            Opcode::FuncPos
        } else {
            Opcode::Pos
        };
        let mut cursor = sym.backpatch.take();
        sym.kind = kind;
        sym.label = Some(pos);
        while let Some(at) = cursor {
            let next = self.read_u24(at);
            self.write_u24(at, pos);
            self.buf[at - 1] = tag as u8;
            cursor = if next == CHAIN_END { None } else { Some(next) };
        }
        Ok(())
    }

    /// Rewrites the remaining placeholders with their symbol ids so they
    /// decode as variable names.
    pub fn finish(&mut self, symbols: &mut SymbolTable) {
        for id in 0..symbols.len() {
            let head = match symbols.get_mut(id) {
                Some(sym) => sym.backpatch.take(),
                None => None,
            };
            let mut cursor = head;
            while let Some(at) = cursor {
                let next = self.read_u24(at);
                self.write_u24(at, id);
                cursor = if next == CHAIN_END { None } else { Some(next) };
            }
        }
    }

    pub fn disassemble(&self) -> String {
        disassemble(&self.buf)
    }
}

fn read_u24(bytes: &[u8], at: usize) -> usize {
    bytes[at] as usize | (bytes[at + 1] as usize) << 8 | (bytes[at + 2] as usize) << 16
}

/// Decodes the instruction at `pos`, returning it and the next position.
pub fn decode(bytes: &[u8], pos: usize) -> Result<(Instr<'_>, usize)> {
    let truncated = || error!(InternalError; "bytecode truncated");
    let first = *bytes.get(pos).ok_or_else(truncated)?;
    let class = first & INT_CLASS;
    let mut value: u32 = 0;
    let mut shift = 0;
    let mut at = pos;
    loop {
        let b = *bytes.get(at).ok_or_else(truncated)?;
        if b & INT_CLASS != class || shift > 30 {
            return Err(error!(InternalError; "malformed varint"));
        }
        value |= ((b & PAYLOAD) as u32) << shift;
        shift += 6;
        at += 1;
        if b & CONTINUE == 0 {
            break;
        }
    }
    if class == INT_CLASS {
        return Ok((Instr::Int(value.min(i32::MAX as u32) as i32), at));
    }
    let op = Opcode::try_from(value)?;
    if op.has_operand() {
        if at + 3 > bytes.len() {
            return Err(truncated());
        }
        let operand = read_u24(bytes, at);
        let instr = match op {
            Opcode::Pos => Instr::Pos(operand),
            Opcode::FuncPos => Instr::FuncPos(operand),
            _ => Instr::Name(operand),
        };
        return Ok((instr, at + 3));
    }
    if op == Opcode::Str {
        let len = bytes[at..].iter().position(|&b| b == 0).ok_or_else(truncated)?;
        return Ok((Instr::Str(&bytes[at..at + len]), at + len + 1));
    }
    Ok((Instr::Op(op), at))
}

/// One instruction per line, prefixed with its position.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut s = String::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match decode(bytes, pos) {
            Ok((instr, next)) => {
                let text = match instr {
                    Instr::Op(op) => op.to_string(),
                    Instr::Int(i) => format!("INT {}", i),
                    Instr::Pos(p) => format!("POS {:06}", p),
                    Instr::FuncPos(p) => format!("FUNCPOS {:06}", p),
                    Instr::Name(id) => format!("NAME #{}", id),
                    Instr::Str(b) => format!("STR {:?}", String::from_utf8_lossy(b)),
                };
                s.push_str(&format!("{:06}: {}\n", pos, text));
                pos = next;
            }
            Err(e) => {
                s.push_str(&format!("{:06}: {}\n", pos, e));
                break;
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(code: &Code) -> Vec<Instr<'_>> {
        let mut v = vec![];
        let mut pos = 0;
        while pos < code.len() {
            let (i, next) = decode(code.as_bytes(), pos).unwrap();
            v.push(i);
            pos = next;
        }
        v
    }

    #[test]
    fn test_class_bits() {
        let mut c = Code::new();
        c.emit_int(100);
        c.emit_op(Opcode::Eol);
        assert_eq!(c.as_bytes(), &[0xC0 | 36, 0x80 | 1, Opcode::Eol as u8]);
    }

    #[test]
    fn test_negative_and_min() {
        let mut c = Code::new();
        c.emit_int(-5);
        c.emit_int(i32::MIN);
        assert_eq!(
            all(&c),
            vec![
                Instr::Int(5),
                Instr::Op(Opcode::Neg),
                Instr::Int(i32::MAX),
                Instr::Op(Opcode::Neg),
                Instr::Int(1),
                Instr::Op(Opcode::Sub),
            ]
        );
    }

    #[test]
    fn test_forward_references_are_all_patched() {
        let mut t = SymbolTable::new();
        let l = t.intern("L_Done");
        let mut c = Code::new();
        for _ in 0..3 {
            c.emit_symbol(&mut t, l).unwrap();
            c.emit_op(Opcode::Eol);
        }
        let target = c.len();
        c.resolve_label(&mut t, l, target, Kind::Label).unwrap();
        c.emit_symbol(&mut t, l).unwrap();
        let decoded = all(&c);
        let positions: Vec<_> = decoded
            .iter()
            .filter(|i| matches!(i, Instr::Pos(_)))
            .collect();
        assert_eq!(positions.len(), 4);
        assert!(positions.iter().all(|i| **i == Instr::Pos(target)));
        assert!(c.resolve_label(&mut t, l, 0, Kind::Label).unwrap_err().is(crate::lang::ErrorCode::DuplicateLabel));
    }

    #[test]
    fn test_finish_writes_names() {
        let mut t = SymbolTable::new();
        let v = t.intern(".@x");
        let mut c = Code::new();
        c.emit_symbol(&mut t, v).unwrap();
        c.emit_symbol(&mut t, v).unwrap();
        c.finish(&mut t);
        assert_eq!(all(&c), vec![Instr::Name(v), Instr::Name(v)]);
        assert!(c.disassemble().contains("NAME #0"));
    }

    #[test]
    fn test_constants_are_inlined() {
        let mut t = SymbolTable::new();
        let k = t.define_constant("Minus", -3, false).unwrap();
        let mut c = Code::new();
        c.emit_symbol(&mut t, k).unwrap();
        c.emit_str(b"hi");
        assert_eq!(
            all(&c),
            vec![Instr::Int(3), Instr::Op(Opcode::Neg), Instr::Str(b"hi")]
        );
        assert!(c.resolve_label(&mut t, k, 0, Kind::Label).is_err());
    }
}
