// Scorch Scope Table
// Nested name -> (type, slot) bindings with stack-discipline slot allocation

use crate::error::{AnalysisErrorKind, CompileError, CompileResult, Location};
use crate::types::Type;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// A declared variable and the storage slot assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: Type,
    pub slot: u16,
    pub location: Location,
}

/// One lexical scope
#[derive(Debug, Default)]
struct Frame {
    variables: FxHashMap<String, Variable>,
    /// First slot owned by this scope; popping rewinds allocation to here
    base: u16,
}

/// Stack of live scopes for one compile
#[derive(Debug, Default)]
pub struct Scopes {
    frames: SmallVec<[Frame; 8]>,
    next_slot: u16,
    max_slots: u16,
}

impl Scopes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        tracing::trace!(depth = self.frames.len() + 1, base = self.next_slot, "push scope");
        self.frames.push(Frame {
            variables: FxHashMap::default(),
            base: self.next_slot,
        });
    }

    /// Pop the innermost scope, releasing its slots for reuse
    pub fn pop_scope(&mut self) -> CompileResult<()> {
        let frame = self.frames.pop().ok_or_else(|| {
            CompileError::codegen("scope stack underflow", Location::synthetic())
        })?;
        tracing::trace!(depth = self.frames.len(), released = self.next_slot - frame.base, "pop scope");
        self.next_slot = frame.base;
        Ok(())
    }

    /// Bind a name written in the script; `#`-prefixed names are reserved
    pub fn declare_user(&mut self, name: &str, ty: Type, location: Location) -> CompileResult<u16> {
        if name.starts_with('#') {
            return Err(CompileError::analysis(
                AnalysisErrorKind::DuplicateDeclaration,
                format!("Variable name '{}' is reserved for the compiler", name),
                location,
            ));
        }
        self.declare(name, ty, location)
    }

    /// Bind `name` in the innermost scope
    pub fn declare(&mut self, name: &str, ty: Type, location: Location) -> CompileResult<u16> {
        let slot = self.next_slot;
        let frame = self.frames.last_mut().ok_or_else(|| {
            CompileError::codegen(
                format!("declaration of '{}' outside of any scope", name),
                location.clone(),
            )
        })?;

        if frame.variables.contains_key(name) {
            return Err(CompileError::duplicate_declaration(name, location));
        }

        self.next_slot = slot.checked_add(1).ok_or_else(|| {
            CompileError::limit_exceeded(
                format!("Too many local variables to declare '{}'", name),
                location.clone(),
            )
        })?;
        self.max_slots = self.max_slots.max(self.next_slot);

        frame.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                ty,
                slot,
                location,
            },
        );
        Ok(slot)
    }

    /// Find `name`, searching innermost to outermost
    pub fn resolve(&self, name: &str, location: &Location) -> CompileResult<&Variable> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.variables.get(name))
            .ok_or_else(|| CompileError::undeclared_variable(name, location.clone()))
    }

    /// High-water mark of simultaneously live slots
    pub fn max_locals(&self) -> u16 {
        self.max_slots
    }
}
