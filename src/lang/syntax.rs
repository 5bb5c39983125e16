use std::collections::BTreeSet;

/// What an open syntax context is waiting to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// A plain `{ }` block, also used to fence nested statements.
    Null,
    If,
    Switch,
    While,
    For,
    Do,
    Function,
    ArgList,
}

/// How a command's argument list is delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgStyle {
    NoParen,
    Paren,
    /// Started with `(` but it is not yet known whether that paren
    /// belongs to the call or to the first argument.
    Undefined,
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub block: Block,
    /// Unique per compile, used to name synthetic labels.
    pub index: u32,
    /// Branches or cases emitted so far; paren depth for argument lists.
    pub count: u32,
    /// `If`: an else was seen. `Switch`: a default was seen. `Do`: a
    /// continue was used.
    pub flag: bool,
    pub style: ArgStyle,
    pub cases: BTreeSet<i32>,
}

/// ## Open syntax contexts
#[derive(Debug, Default)]
pub struct Syntax {
    frames: Vec<Frame>,
    next_index: u32,
}

impl Syntax {
    pub fn new() -> Syntax {
        Syntax::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn top_block(&self) -> Option<Block> {
        self.frames.last().map(|f| f.block)
    }

    fn push(&mut self, block: Block, index: u32, count: u32, style: ArgStyle) {
        self.frames.push(Frame {
            block,
            index,
            count,
            flag: false,
            style,
            cases: BTreeSet::new(),
        });
    }

    /// Opens a control structure and returns its label index.
    pub fn open(&mut self, block: Block) -> u32 {
        let index = self.next_index;
        self.next_index += 1;
        self.push(block, index, 1, ArgStyle::NoParen);
        index
    }

    pub fn open_null(&mut self) {
        self.push(Block::Null, 0, 0, ArgStyle::NoParen);
    }

    pub fn open_arglist(&mut self, style: ArgStyle) {
        self.push(Block::ArgList, 0, 0, style);
    }

    pub fn close(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Innermost loop or switch a `break` (or loop a `continue`) applies
    /// to. Function bodies are a boundary.
    pub fn enclosing_loop(&mut self, allow_switch: bool) -> Option<&mut Frame> {
        for frame in self.frames.iter_mut().rev() {
            match frame.block {
                Block::Do | Block::For | Block::While => return Some(frame),
                Block::Switch if allow_switch => return Some(frame),
                Block::Function => return None,
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indexes_are_unique() {
        let mut s = Syntax::new();
        assert_eq!(s.open(Block::If), 0);
        s.open_null();
        assert_eq!(s.open(Block::While), 1);
        assert_eq!(s.depth(), 3);
        s.close();
        s.close();
        assert_eq!(s.open(Block::For), 2);
    }

    #[test]
    fn test_enclosing_loop() {
        let mut s = Syntax::new();
        s.open(Block::While);
        s.open(Block::Switch);
        s.open(Block::If);
        assert_eq!(s.enclosing_loop(true).map(|f| f.block), Some(Block::Switch));
        assert_eq!(s.enclosing_loop(false).map(|f| f.block), Some(Block::While));
        s.open(Block::Function);
        assert!(s.enclosing_loop(true).is_none());
    }
}
