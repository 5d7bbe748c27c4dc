// Scorch Instructions

/// Instruction operation codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // Constants and stack operations
    Constant, // Push constant onto stack
    Pop,      // Pop top of stack
    Dup,      // Duplicate top of stack

    // Literals
    Null,  // Push null
    True,  // Push true
    False, // Push false

    // Locals
    LoadLocal,  // Push the value in a slot
    StoreLocal, // Pop into a slot

    // Arithmetic operations
    Add,    // a + b (string concatenation when either side is a string)
    Sub,    // a - b
    Mul,    // a * b
    Div,    // a / b
    Rem,    // a % b
    Negate, // -a

    // Comparison operations
    Equal,        // a == b
    NotEqual,     // a != b
    Less,         // a < b
    LessEqual,    // a <= b
    Greater,      // a > b
    GreaterEqual, // a >= b

    // Logical operations
    Not, // !a

    // Conversions
    Cast, // Convert top of stack (operands: from type, to type)

    // Control flow (targets are absolute offsets)
    Jump,        // Unconditional forward jump
    JumpIfFalse, // Jump if top of stack is false (condition stays on the stack)
    JumpIfTrue,  // Jump if top of stack is true (condition stays on the stack)
    Loop,        // Back edge to the head of a loop
    LoopGuard,   // Charge loop work against the counter slot (operands: slot, cost)

    // Host access
    Call,     // Call host function (operands: name constant, argument count)
    GetField, // Read a named field of a dynamic value
    GetIndex, // Read an element of a dynamic value

    // Exits
    Throw,  // Throw the value on top of the stack
    Return, // Return the value on top of the stack
}

impl OpCode {
    pub const ALL: [OpCode; 32] = [
        OpCode::Constant,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::Null,
        OpCode::True,
        OpCode::False,
        OpCode::LoadLocal,
        OpCode::StoreLocal,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Rem,
        OpCode::Negate,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Less,
        OpCode::LessEqual,
        OpCode::Greater,
        OpCode::GreaterEqual,
        OpCode::Not,
        OpCode::Cast,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::JumpIfTrue,
        OpCode::Loop,
        OpCode::LoopGuard,
        OpCode::Call,
        OpCode::GetField,
        OpCode::GetIndex,
        OpCode::Throw,
        OpCode::Return,
    ];

    /// Get the number of bytes this opcode reads as operands
    pub fn operand_bytes(&self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::LoadLocal
            | OpCode::StoreLocal
            | OpCode::Cast
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::Loop
            | OpCode::GetField => 2, // u16 operand, or two type codes for Cast

            OpCode::LoopGuard | OpCode::Call => 4, // two u16 operands

            _ => 0,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        OpCode::ALL.get(byte as usize).copied().ok_or(byte)
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self {
        op as u8
    }
}
