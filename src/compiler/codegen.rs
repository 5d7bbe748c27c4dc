// Scorch Code Generator
// Writes an analyzed tree into an instruction chunk

use super::chunk::{Chunk, Constant, Handler};
use super::driver::AnalyzedProgram;
use super::opcode::OpCode;
use crate::ast::*;
use crate::error::{CompileError, CompileResult, Location};
use crate::settings::CompilerSettings;
use crate::types::Type;

/// Symbolic jump target, bound to an offset once its position is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

/// Jump targets a statement inherits from the enclosing loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteContext {
    pub continue_target: Option<Label>,
    pub break_target: Option<Label>,
}

/// A try range waiting for its labels to be resolved
struct PendingHandler {
    start: Label,
    end: Label,
    target: Label,
    slot: u16,
    exception: Option<usize>,
    location: Location,
}

/// Generate the chunk for an analyzed program
///
/// Takes the tree by shared reference; writing the same tree twice yields
/// identical chunks.
pub fn generate(analyzed: &AnalyzedProgram, settings: &CompilerSettings) -> CompileResult<Chunk> {
    let mut writer = Writer::new(analyzed.loop_counter);

    if let Some(slot) = analyzed.loop_counter {
        writer.emit_constant(Constant::Int(i64::from(settings.max_loop_counter)), 0)?;
        writer.emit_op(OpCode::StoreLocal, 0);
        writer.emit_u16(slot, 0);
    }

    let body = &analyzed.program.body;
    writer.write_sequence(&body.statements, WriteContext::default())?;

    if !analyzed.flow.method_escape {
        let line = body.statements.last().map_or(0, |s| s.location.line);
        writer.write_default(analyzed.return_type, line)?;
        writer.emit_op(OpCode::Return, line);
    }

    writer.finish()
}

struct Writer {
    chunk: Chunk,
    /// Bound offset of each label, by label index
    labels: Vec<Option<usize>>,
    /// Operand offsets still holding a placeholder, with the statement that jumps
    fixups: Vec<(usize, Label, Location)>,
    handlers: Vec<PendingHandler>,
    /// Hidden counter slot charged by `LoopGuard`; `None` disables the guard
    loop_counter: Option<u16>,
    /// Statement being written; operand limits are reported here
    site: Location,
}

impl Writer {
    fn new(loop_counter: Option<u16>) -> Self {
        Self {
            chunk: Chunk::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            handlers: Vec::new(),
            loop_counter,
            site: Location::synthetic(),
        }
    }

    // ==================== Labels ====================

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    fn bind(&mut self, label: Label) -> CompileResult<()> {
        let offset = self.chunk.current_offset();
        match self.labels.get_mut(label.0) {
            Some(entry) if entry.is_none() => {
                *entry = Some(offset);
                Ok(())
            }
            _ => Err(CompileError::codegen(
                format!("Label {} bound twice", label.0),
                Location::synthetic(),
            )),
        }
    }

    fn resolve(&self, label: Label, site: &Location) -> CompileResult<u16> {
        let offset = self
            .labels
            .get(label.0)
            .copied()
            .flatten()
            .ok_or_else(|| {
                CompileError::codegen(
                    format!("Label {} was never bound", label.0),
                    Location::synthetic(),
                )
            })?;
        u16::try_from(offset).map_err(|_| {
            CompileError::limit_exceeded(
                format!("Script is too long, jump target {} is out of range", offset),
                site.clone(),
            )
        })
    }

    /// Resolve every label and handler and hand over the chunk
    fn finish(mut self) -> CompileResult<Chunk> {
        for (offset, label, site) in std::mem::take(&mut self.fixups) {
            let target = self.resolve(label, &site)?;
            tracing::trace!(offset, target, "resolve label");
            self.chunk.patch_u16(offset, target);
        }

        for pending in std::mem::take(&mut self.handlers) {
            let handler = Handler {
                start: usize::from(self.resolve(pending.start, &pending.location)?),
                end: usize::from(self.resolve(pending.end, &pending.location)?),
                target: usize::from(self.resolve(pending.target, &pending.location)?),
                slot: pending.slot,
                exception: pending.exception,
            };
            self.chunk.handlers.push(handler);
        }

        Ok(self.chunk)
    }

    // ==================== Emit Helpers ====================

    fn emit_op(&mut self, op: OpCode, line: usize) {
        self.chunk.write_op(op, line);
    }

    fn emit_u16(&mut self, value: u16, line: usize) {
        self.chunk.write_u16(value, line);
    }

    /// Emit a jump to `label`; the operand is patched in `finish`
    fn emit_jump(&mut self, op: OpCode, label: Label, line: usize) {
        self.emit_op(op, line);
        self.fixups.push((self.chunk.current_offset(), label, self.site.clone()));
        self.emit_u16(0xFFFF, line);
    }

    /// Unconditional transfer; a label that is already bound is a back edge
    fn emit_goto(&mut self, label: Label, line: usize) {
        let backward = matches!(self.labels.get(label.0), Some(Some(_)));
        let op = if backward { OpCode::Loop } else { OpCode::Jump };
        self.emit_jump(op, label, line);
    }

    fn make_constant(&mut self, constant: Constant) -> CompileResult<u16> {
        let idx = self.chunk.add_constant(constant);
        u16::try_from(idx).map_err(|_| {
            CompileError::limit_exceeded("Too many constants in one script", self.site.clone())
        })
    }

    fn emit_constant(&mut self, constant: Constant, line: usize) -> CompileResult<()> {
        let idx = self.make_constant(constant)?;
        self.emit_op(OpCode::Constant, line);
        self.emit_u16(idx, line);
        Ok(())
    }

    fn emit_cast(&mut self, from: Type, to: Type, line: usize) {
        self.emit_op(OpCode::Cast, line);
        self.chunk.write(from.code(), line);
        self.chunk.write(to.code(), line);
    }

    /// Charge one iteration against the loop counter, when the guard is on
    fn emit_loop_guard(&mut self, cost: usize, line: usize) {
        let Some(slot) = self.loop_counter else {
            return;
        };
        let cost = u16::try_from(cost.max(1)).unwrap_or(u16::MAX);
        self.emit_op(OpCode::LoopGuard, line);
        self.emit_u16(slot, line);
        self.emit_u16(cost, line);
    }

    /// Push the zero value of `ty`
    fn write_default(&mut self, ty: Type, line: usize) -> CompileResult<()> {
        match ty {
            Type::Int => self.emit_constant(Constant::Int(0), line)?,
            Type::Double => self.emit_constant(Constant::Double(0.0), line)?,
            Type::Bool => self.emit_op(OpCode::False, line),
            _ => self.emit_op(OpCode::Null, line),
        }
        Ok(())
    }

    // ==================== Statements ====================

    fn write_sequence(&mut self, statements: &[Stmt], ctx: WriteContext) -> CompileResult<()> {
        for statement in statements {
            self.write_stmt(statement, ctx)?;
        }
        Ok(())
    }

    fn write_stmt(&mut self, stmt: &Stmt, ctx: WriteContext) -> CompileResult<()> {
        let outer = std::mem::replace(&mut self.site, stmt.location.clone());
        self.write_stmt_kind(stmt, ctx)?;
        self.site = outer;
        Ok(())
    }

    fn write_stmt_kind(&mut self, stmt: &Stmt, ctx: WriteContext) -> CompileResult<()> {
        let flow = stmt.flow.ok_or_else(|| {
            CompileError::codegen(
                format!("{} statement reached code generation unanalyzed", stmt.kind_name()),
                stmt.location.clone(),
            )
        })?;
        let line = stmt.location.line;

        match &stmt.kind {
            StmtKind::Block(block) => self.write_sequence(&block.statements, ctx)?,

            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                let else_label = self.new_label();
                let end_label = self.new_label();

                self.write_expr(condition)?;
                self.emit_jump(OpCode::JumpIfFalse, else_label, line);
                self.emit_op(OpCode::Pop, line);

                self.write_sequence(&then.statements, ctx)?;
                if !escapes(then) {
                    self.emit_goto(end_label, line);
                }

                self.bind(else_label)?;
                self.emit_op(OpCode::Pop, line);
                if let Some(otherwise) = otherwise {
                    self.write_sequence(&otherwise.statements, ctx)?;
                }
                self.bind(end_label)?;
            }

            StmtKind::While { condition, body } => {
                let begin = self.new_label();
                let exit = self.new_label();
                let end = self.new_label();
                let inner = WriteContext {
                    continue_target: Some(begin),
                    break_target: Some(end),
                };

                self.bind(begin)?;
                self.write_expr(condition)?;
                self.emit_jump(OpCode::JumpIfFalse, exit, line);
                self.emit_op(OpCode::Pop, line);

                self.emit_loop_guard(statement_count(body), line);
                self.write_sequence(&body.statements, inner)?;
                if !escapes(body) {
                    self.emit_goto(begin, line);
                }

                self.bind(exit)?;
                self.emit_op(OpCode::Pop, line);
                self.bind(end)?;
            }

            StmtKind::Do { body, condition } => {
                let begin = self.new_label();
                let next = self.new_label();
                let exit = self.new_label();
                let end = self.new_label();
                let inner = WriteContext {
                    continue_target: Some(next),
                    break_target: Some(end),
                };

                self.bind(begin)?;
                self.emit_loop_guard(statement_count(body), line);
                self.write_sequence(&body.statements, inner)?;

                self.bind(next)?;
                self.write_expr(condition)?;
                self.emit_jump(OpCode::JumpIfFalse, exit, line);
                self.emit_op(OpCode::Pop, line);
                self.emit_goto(begin, line);

                self.bind(exit)?;
                self.emit_op(OpCode::Pop, line);
                self.bind(end)?;
            }

            StmtKind::For {
                initializer,
                condition,
                afterthought,
                body,
            } => {
                if let Some(initializer) = initializer {
                    self.write_stmt(initializer, ctx)?;
                }

                let begin = self.new_label();
                let next = self.new_label();
                let exit = self.new_label();
                let end = self.new_label();
                let inner = WriteContext {
                    continue_target: Some(next),
                    break_target: Some(end),
                };

                self.bind(begin)?;
                if let Some(condition) = condition {
                    self.write_expr(condition)?;
                    self.emit_jump(OpCode::JumpIfFalse, exit, line);
                    self.emit_op(OpCode::Pop, line);
                }

                self.emit_loop_guard(statement_count(body), line);
                self.write_sequence(&body.statements, inner)?;

                self.bind(next)?;
                if let Some(afterthought) = afterthought {
                    self.write_expr(afterthought)?;
                    if afterthought.actual != Some(Type::Void) {
                        self.emit_op(OpCode::Pop, line);
                    }
                }
                self.emit_goto(begin, line);

                self.bind(exit)?;
                if condition.is_some() {
                    self.emit_op(OpCode::Pop, line);
                }
                self.bind(end)?;
            }

            StmtKind::Return { value } => {
                match value {
                    Some(value) => self.write_expr(value)?,
                    None => self.emit_op(OpCode::Null, line),
                }
                self.emit_op(OpCode::Return, line);
            }

            StmtKind::Break => {
                let target = ctx.break_target.ok_or_else(|| {
                    CompileError::codegen("Break without a loop to leave", stmt.location.clone())
                })?;
                self.emit_goto(target, line);
            }

            StmtKind::Continue => {
                let target = ctx.continue_target.ok_or_else(|| {
                    CompileError::codegen("Continue without a loop to resume", stmt.location.clone())
                })?;
                self.emit_goto(target, line);
            }

            StmtKind::Try { body, catches } => {
                let start = self.new_label();
                let end = self.new_label();
                let after = self.new_label();

                self.bind(start)?;
                self.write_sequence(&body.statements, ctx)?;
                self.bind(end)?;
                if !escapes(body) && !catches.is_empty() {
                    self.emit_goto(after, line);
                }

                for (index, catch) in catches.iter().enumerate() {
                    let slot = catch.slot.ok_or_else(|| {
                        CompileError::codegen(
                            format!("Catch variable '{}' has no slot", catch.name),
                            catch.location.clone(),
                        )
                    })?;
                    let exception = match &catch.exception {
                        Some(name) => Some(usize::from(
                            self.make_constant(Constant::String(name.clone()))?,
                        )),
                        None => None,
                    };

                    let target = self.new_label();
                    self.bind(target)?;
                    self.handlers.push(PendingHandler {
                        start,
                        end,
                        target,
                        slot,
                        exception,
                        location: stmt.location.clone(),
                    });

                    self.write_sequence(&catch.body.statements, ctx)?;
                    let is_last = index + 1 == catches.len();
                    if !is_last && !escapes(&catch.body) {
                        self.emit_goto(after, catch.location.line);
                    }
                }

                self.bind(after)?;
            }

            StmtKind::Throw { value } => {
                self.write_expr(value)?;
                self.emit_op(OpCode::Throw, line);
            }

            StmtKind::Expression { expr } => {
                self.write_expr(expr)?;
                if flow.method_escape {
                    // Implicit return of the script's final value
                    self.emit_op(OpCode::Return, line);
                } else if expr.actual != Some(Type::Void) {
                    self.emit_op(OpCode::Pop, line);
                }
            }

            StmtKind::Declaration {
                ty,
                name,
                initializer,
                slot,
            } => {
                let slot = slot.ok_or_else(|| {
                    CompileError::codegen(
                        format!("Variable '{}' has no slot", name),
                        stmt.location.clone(),
                    )
                })?;
                match initializer {
                    Some(initializer) => self.write_expr(initializer)?,
                    None => self.write_default(*ty, line)?,
                }
                self.emit_op(OpCode::StoreLocal, line);
                self.emit_u16(slot, line);
            }
        }

        Ok(())
    }

    // ==================== Expressions ====================

    fn write_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        let actual = expr.actual.ok_or_else(|| {
            CompileError::codegen("Expression reached code generation untyped", expr.location.clone())
        })?;
        let line = expr.location.line;

        match &expr.kind {
            ExprKind::Literal { value } => match value {
                Literal::Null => self.emit_op(OpCode::Null, line),
                Literal::Bool(true) => self.emit_op(OpCode::True, line),
                Literal::Bool(false) => self.emit_op(OpCode::False, line),
                Literal::Int(n) => self.emit_constant(Constant::Int(*n), line)?,
                Literal::Double(n) => self.emit_constant(Constant::Double(*n), line)?,
                Literal::String(s) => self.emit_constant(Constant::String(s.clone()), line)?,
            },

            ExprKind::Regex { pattern, flags } => {
                let constant = Constant::Pattern {
                    pattern: pattern.clone(),
                    flags: flags.clone(),
                };
                self.emit_constant(constant, line)?;
            }

            ExprKind::Variable { name, slot } => {
                let slot = slot.ok_or_else(|| {
                    CompileError::codegen(
                        format!("Variable '{}' was never resolved", name),
                        expr.location.clone(),
                    )
                })?;
                self.emit_op(OpCode::LoadLocal, line);
                self.emit_u16(slot, line);
            }

            ExprKind::Assign { name, value, slot } => {
                let slot = slot.ok_or_else(|| {
                    CompileError::codegen(
                        format!("Variable '{}' was never resolved", name),
                        expr.location.clone(),
                    )
                })?;
                self.write_expr(value)?;
                // Assignment is an expression; its value stays on the stack
                self.emit_op(OpCode::Dup, line);
                self.emit_op(OpCode::StoreLocal, line);
                self.emit_u16(slot, line);
            }

            ExprKind::Unary { op, operand } => {
                self.write_expr(operand)?;
                match op {
                    UnaryOp::Negate => self.emit_op(OpCode::Negate, line),
                    UnaryOp::Not => self.emit_op(OpCode::Not, line),
                }
            }

            ExprKind::Binary { op, left, right } => self.write_binary(*op, left, right, line)?,

            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let else_label = self.new_label();
                let end_label = self.new_label();

                self.write_expr(condition)?;
                self.emit_jump(OpCode::JumpIfFalse, else_label, line);
                self.emit_op(OpCode::Pop, line);
                self.write_expr(then)?;
                self.emit_goto(end_label, line);

                self.bind(else_label)?;
                self.emit_op(OpCode::Pop, line);
                self.write_expr(otherwise)?;
                self.bind(end_label)?;
            }

            ExprKind::Cast { ty, expr: inner } => {
                self.write_expr(inner)?;
                if let Some(from) = inner.actual {
                    if from != *ty && from != Type::Null {
                        self.emit_cast(from, *ty, line);
                    }
                }
            }

            ExprKind::Call { name, args } => {
                for arg in args {
                    self.write_expr(arg)?;
                }
                let idx = self.make_constant(Constant::String(name.clone()))?;
                let argc = u16::try_from(args.len()).map_err(|_| {
                    CompileError::limit_exceeded("Too many call arguments", expr.location.clone())
                })?;
                self.emit_op(OpCode::Call, line);
                self.emit_u16(idx, line);
                self.emit_u16(argc, line);
            }

            ExprKind::Field { object, name } => {
                self.write_expr(object)?;
                let idx = self.make_constant(Constant::String(name.clone()))?;
                self.emit_op(OpCode::GetField, line);
                self.emit_u16(idx, line);
            }

            ExprKind::Index { object, index } => {
                self.write_expr(object)?;
                self.write_expr(index)?;
                self.emit_op(OpCode::GetIndex, line);
            }
        }

        // Conversion the consumer asked for; null already fits any reference type
        if let Some(expected) = expr.expected {
            if expected != actual && actual != Type::Null {
                self.emit_cast(actual, expected, line);
            }
        }

        Ok(())
    }

    fn write_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr, line: usize) -> CompileResult<()> {
        let instruction = match op {
            BinaryOp::And => return self.write_short_circuit(OpCode::JumpIfFalse, left, right, line),
            BinaryOp::Or => return self.write_short_circuit(OpCode::JumpIfTrue, left, right, line),
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Sub => OpCode::Sub,
            BinaryOp::Mul => OpCode::Mul,
            BinaryOp::Div => OpCode::Div,
            BinaryOp::Rem => OpCode::Rem,
            BinaryOp::Equal => OpCode::Equal,
            BinaryOp::NotEqual => OpCode::NotEqual,
            BinaryOp::Less => OpCode::Less,
            BinaryOp::LessEqual => OpCode::LessEqual,
            BinaryOp::Greater => OpCode::Greater,
            BinaryOp::GreaterEqual => OpCode::GreaterEqual,
        };

        self.write_expr(left)?;
        self.write_expr(right)?;
        self.emit_op(instruction, line);
        Ok(())
    }

    /// `&&` and `||`: the left value is the result unless it is the neutral one
    fn write_short_circuit(
        &mut self,
        jump: OpCode,
        left: &Expr,
        right: &Expr,
        line: usize,
    ) -> CompileResult<()> {
        let end = self.new_label();
        self.write_expr(left)?;
        self.emit_jump(jump, end, line);
        self.emit_op(OpCode::Pop, line);
        self.write_expr(right)?;
        self.bind(end)
    }
}

/// Whether control never falls out of the end of `block`
fn escapes(block: &Block) -> bool {
    block
        .statements
        .last()
        .and_then(|s| s.flow)
        .map_or(false, |flow| flow.all_escape)
}

/// Statements in `block`, used to weigh one loop iteration
fn statement_count(block: &Block) -> usize {
    block
        .statements
        .iter()
        .filter_map(|s| s.flow)
        .map(|flow| flow.statement_count)
        .sum()
}
