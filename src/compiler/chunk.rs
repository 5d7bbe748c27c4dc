// Scorch Instruction Chunk
// Contains encoded instructions, constants, line table and exception handlers

use super::opcode::OpCode;
use crate::types::Type;
use std::fmt::Write;

/// Constant values stored in the constant pool
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Double(f64),
    String(String),
    /// Regex validated at compile time; the host compiles it once per unit
    Pattern { pattern: String, flags: String },
}

/// A protected code range and where control goes when it throws
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    /// First protected offset
    pub start: usize,
    /// One past the last protected offset
    pub end: usize,
    /// Offset of the catch code
    pub target: usize,
    /// Slot that receives the thrown value before control reaches `target`
    pub slot: u16,
    /// Constant index of the exception class name; `None` matches everything
    pub exception: Option<usize>,
}

/// An immutable-once-built sequence of instructions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chunk {
    /// Raw instruction bytes
    pub code: Vec<u8>,
    /// Constant pool
    pub constants: Vec<Constant>,
    /// Source line for each byte, for runtime error reporting
    pub lines: Vec<usize>,
    /// Exception handlers, innermost first
    pub handlers: Vec<Handler>,
}

impl Chunk {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            constants: Vec::new(),
            lines: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Write a single byte to the chunk with line info
    pub fn write(&mut self, byte: u8, line: usize) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write an opcode to the chunk
    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.write(op.into(), line);
    }

    /// Write a u16 operand (big-endian)
    pub fn write_u16(&mut self, value: u16, line: usize) {
        self.write((value >> 8) as u8, line);
        self.write((value & 0xFF) as u8, line);
    }

    /// Overwrite a previously written u16 operand
    pub fn patch_u16(&mut self, offset: usize, value: u16) {
        self.code[offset] = (value >> 8) as u8;
        self.code[offset + 1] = (value & 0xFF) as u8;
    }

    /// Add a constant and return its index
    pub fn add_constant(&mut self, constant: Constant) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    /// Get the current code offset
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Read a u16 at the given offset
    pub fn read_u16(&self, offset: usize) -> u16 {
        ((self.code[offset] as u16) << 8) | (self.code[offset + 1] as u16)
    }

    /// Get line number for instruction at offset
    pub fn get_line(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or_default()
    }

    /// Decoded opcodes in order, skipping operands
    pub fn opcodes(&self) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = 0;
        while offset < self.code.len() {
            match OpCode::try_from(self.code[offset]) {
                Ok(op) => {
                    ops.push(op);
                    offset += 1 + op.operand_bytes();
                }
                Err(_) => break,
            }
        }
        ops
    }

    /// Render the chunk as text for debugging and tests
    pub fn disassemble(&self, name: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- {} ---", name);
        let _ = writeln!(
            out,
            "{} bytes, {} constants, {} handlers",
            self.code.len(),
            self.constants.len(),
            self.handlers.len()
        );
        out.push('\n');

        let mut offset = 0;
        while offset < self.code.len() {
            offset = self.disassemble_instruction(&mut out, offset);
        }

        if !self.handlers.is_empty() {
            out.push('\n');
            for handler in &self.handlers {
                let matches = handler
                    .exception
                    .map(|idx| self.format_constant(idx))
                    .unwrap_or_else(|| "*".to_string());
                let _ = writeln!(
                    out,
                    "catch [{:04}, {:04}) {} -> @{} [{}]",
                    handler.start, handler.end, matches, handler.target, handler.slot
                );
            }
        }
        out
    }

    fn format_constant(&self, idx: usize) -> String {
        match self.constants.get(idx) {
            Some(Constant::Int(n)) => format!("{}", n),
            Some(Constant::Double(n)) => format!("{:?}", n),
            Some(Constant::String(s)) => {
                // Use chars to safely truncate Unicode strings
                if s.chars().count() > 32 {
                    let truncated: String = s.chars().take(29).collect();
                    format!("\"{}...\"", truncated)
                } else {
                    format!("\"{}\"", s)
                }
            }
            Some(Constant::Pattern { pattern, flags }) => format!("/{}/{}", pattern, flags),
            None => format!("???[{}]", idx),
        }
    }

    fn format_type(code: u8) -> String {
        Type::from_code(code)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| format!("?{}", code))
    }

    fn disassemble_instruction(&self, out: &mut String, offset: usize) -> usize {
        let line = self.get_line(offset);

        // Line info
        if offset > 0 && line == self.get_line(offset - 1) {
            let _ = write!(out, "{:04}      ", offset);
        } else {
            let _ = write!(out, "{:04} {:4} ", offset, line);
        }

        let instruction = match OpCode::try_from(self.code[offset]) {
            Ok(op) => op,
            Err(byte) => {
                let _ = writeln!(out, "??? 0x{:02x}", byte);
                return offset + 1;
            }
        };

        let text = match instruction {
            OpCode::Constant => {
                let idx = self.read_u16(offset + 1) as usize;
                format!("const          {}", self.format_constant(idx))
            }
            OpCode::True => "push           true".to_string(),
            OpCode::False => "push           false".to_string(),
            OpCode::Null => "push           null".to_string(),
            OpCode::LoadLocal => format!("load           [{}]", self.read_u16(offset + 1)),
            OpCode::StoreLocal => format!("store          [{}]", self.read_u16(offset + 1)),
            OpCode::Pop => "pop".to_string(),
            OpCode::Dup => "dup".to_string(),
            OpCode::Add => "add".to_string(),
            OpCode::Sub => "sub".to_string(),
            OpCode::Mul => "mul".to_string(),
            OpCode::Div => "div".to_string(),
            OpCode::Rem => "rem".to_string(),
            OpCode::Negate => "neg".to_string(),
            OpCode::Not => "not".to_string(),
            OpCode::Equal => "eq".to_string(),
            OpCode::NotEqual => "neq".to_string(),
            OpCode::Less => "lt".to_string(),
            OpCode::LessEqual => "le".to_string(),
            OpCode::Greater => "gt".to_string(),
            OpCode::GreaterEqual => "ge".to_string(),
            OpCode::Cast => format!(
                "cast           {} -> {}",
                Self::format_type(self.code[offset + 1]),
                Self::format_type(self.code[offset + 2])
            ),
            OpCode::Jump => format!("jmp            @{}", self.read_u16(offset + 1)),
            OpCode::JumpIfFalse => format!("jz             @{}", self.read_u16(offset + 1)),
            OpCode::JumpIfTrue => format!("jnz            @{}", self.read_u16(offset + 1)),
            OpCode::Loop => format!("loop           @{}", self.read_u16(offset + 1)),
            OpCode::LoopGuard => format!(
                "loop_guard     [{}] cost {}",
                self.read_u16(offset + 1),
                self.read_u16(offset + 3)
            ),
            OpCode::Call => {
                let idx = self.read_u16(offset + 1) as usize;
                let argc = self.read_u16(offset + 3);
                format!("call           {} ({})", self.format_constant(idx), argc)
            }
            OpCode::GetField => {
                let idx = self.read_u16(offset + 1) as usize;
                format!("get_field      {}", self.format_constant(idx))
            }
            OpCode::GetIndex => "get_index".to_string(),
            OpCode::Throw => "throw".to_string(),
            OpCode::Return => "ret".to_string(),
        };
        let _ = writeln!(out, "{}", text);
        offset + 1 + instruction.operand_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_patch() {
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Jump, 1);
        chunk.write_u16(0xFFFF, 1);
        chunk.write_op(OpCode::Null, 2);
        chunk.patch_u16(1, 3);

        assert_eq!(chunk.read_u16(1), 3);
        assert_eq!(chunk.get_line(3), 2);
        assert_eq!(chunk.get_line(99), 0);
        assert_eq!(chunk.opcodes(), vec![OpCode::Jump, OpCode::Null]);
    }

    #[test]
    fn test_disassemble() {
        let mut chunk = Chunk::new();
        let idx = chunk.add_constant(Constant::Int(7));
        chunk.write_op(OpCode::Constant, 1);
        chunk.write_u16(idx as u16, 1);
        chunk.write_op(OpCode::Cast, 1);
        chunk.write(Type::Int.code(), 1);
        chunk.write(Type::Double.code(), 1);
        chunk.write_op(OpCode::Return, 2);

        let text = chunk.disassemble("score");
        let expected = "--- score ---\n\
                        7 bytes, 1 constants, 0 handlers\n\
                        \n\
                        0000    1 const          7\n\
                        0003      cast           int -> double\n\
                        0006    2 ret\n";
        assert_eq!(text, expected);
    }
}
