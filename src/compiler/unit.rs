// Scorch Compiled Script
// The immutable unit handed to the host

use super::chunk::Chunk;
use crate::types::Type;

/// A script parameter and the slot the host stores its value in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSlot {
    pub name: String,
    pub ty: Type,
    pub slot: u16,
}

/// Output of a successful compile
///
/// Holds no compile-time state and is never mutated after construction, so a
/// host may share it across threads behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledScript {
    name: String,
    chunk: Chunk,
    params: Vec<ParamSlot>,
    return_type: Type,
    max_locals: u16,
    loop_counter: Option<u16>,
    statement_count: usize,
}

impl CompiledScript {
    pub(crate) fn new(
        name: String,
        chunk: Chunk,
        params: Vec<ParamSlot>,
        return_type: Type,
        max_locals: u16,
        loop_counter: Option<u16>,
        statement_count: usize,
    ) -> Self {
        Self {
            name,
            chunk,
            params,
            return_type,
            max_locals,
            loop_counter,
            statement_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    /// Parameters in declaration order
    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    pub fn return_type(&self) -> Type {
        self.return_type
    }

    /// Local slots the host must allocate per execution
    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }

    /// Slot of the hidden loop counter, when the loop guard is enabled
    pub fn loop_counter(&self) -> Option<u16> {
        self.loop_counter
    }

    /// Statements in the script
    pub fn statement_count(&self) -> usize {
        self.statement_count
    }

    /// Text listing of the unit: a signature line followed by the chunk
    pub fn disassemble(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| format!("{} {} [{}]", p.ty, p.name, p.slot))
            .collect::<Vec<_>>()
            .join(", ");
        let mut out = format!(
            "{} {}({}) locals={} statements={}\n",
            self.return_type, self.name, params, self.max_locals, self.statement_count
        );
        out.push_str(&self.chunk.disassemble(&self.name));
        out
    }
}
