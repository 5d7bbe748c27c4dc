// Scorch Analyzer
// Resolves names, types expressions and computes control-flow annotations

use super::scope::Scopes;
use crate::ast::*;
use crate::context::ScriptContext;
use crate::error::{AnalysisErrorKind, CompileError, CompileResult, Location};
use crate::settings::{CompilerSettings, REGEX_ENABLED};
use crate::types::{Conversion, Type};

/// Facts a statement inherits from its parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalyzeContext {
    /// Inside the body of some loop
    pub in_loop: bool,
    /// Last statement of the unit's outermost sequence
    pub last_source: bool,
    /// Last statement of the nearest enclosing loop body
    pub last_loop: bool,
}

impl AnalyzeContext {
    /// Context of the unit's outermost sequence
    pub fn root() -> Self {
        Self {
            in_loop: false,
            last_source: true,
            last_loop: false,
        }
    }

    fn loop_body() -> Self {
        Self {
            in_loop: true,
            last_source: false,
            last_loop: false,
        }
    }
}

/// Single-pass semantic analysis over one program
pub(crate) struct Analyzer<'a> {
    settings: &'a CompilerSettings,
    context: &'a ScriptContext,
    pub(crate) scopes: Scopes,
}

impl<'a> Analyzer<'a> {
    pub fn new(settings: &'a CompilerSettings, context: &'a ScriptContext) -> Self {
        Self {
            settings,
            context,
            scopes: Scopes::new(),
        }
    }

    /// Analyze the outermost sequence in the current (root) scope
    pub fn analyze_program(&mut self, program: &mut Program) -> CompileResult<Flow> {
        self.analyze_sequence(&mut program.body.statements, AnalyzeContext::root(), false)
    }

    // ==================== Statements ====================

    /// Analyze a block in its own scope
    fn analyze_block(
        &mut self,
        block: &mut Block,
        ctx: AnalyzeContext,
        loop_body: bool,
    ) -> CompileResult<Flow> {
        self.scopes.push_scope();
        let flow = self.analyze_sequence(&mut block.statements, ctx, loop_body)?;
        self.scopes.pop_scope()?;
        Ok(flow)
    }

    /// Analyze statements in order and aggregate their flow
    fn analyze_sequence(
        &mut self,
        statements: &mut [Stmt],
        ctx: AnalyzeContext,
        loop_body: bool,
    ) -> CompileResult<Flow> {
        let mut flow = Flow {
            last_source: ctx.last_source,
            last_loop: ctx.last_loop,
            ..Flow::default()
        };

        let count = statements.len();
        for (index, statement) in statements.iter_mut().enumerate() {
            // A previous sibling never falls through, so nothing reaches this one
            if flow.all_escape {
                return Err(CompileError::unreachable_code(statement.location.clone()));
            }

            let is_last = index + 1 == count;
            let child_ctx = AnalyzeContext {
                in_loop: ctx.in_loop,
                last_source: ctx.last_source && is_last,
                last_loop: (ctx.last_loop || loop_body) && is_last,
            };
            let child = self.analyze_stmt(statement, child_ctx)?;

            flow.method_escape = child.method_escape;
            flow.loop_escape = child.loop_escape;
            flow.all_escape = child.all_escape;
            flow.any_continue |= child.any_continue;
            flow.any_break |= child.any_break;
            flow.statement_count += child.statement_count;
        }

        Ok(flow)
    }

    fn analyze_stmt(&mut self, stmt: &mut Stmt, ctx: AnalyzeContext) -> CompileResult<Flow> {
        if stmt.flow.is_some() {
            return Err(CompileError::codegen(
                "Statement was analyzed twice",
                stmt.location.clone(),
            ));
        }
        tracing::trace!(kind = stmt.kind_name(), line = stmt.location.line, "analyze");

        let location = &stmt.location;
        let mut flow = Flow {
            last_source: ctx.last_source,
            last_loop: ctx.last_loop,
            statement_count: 1,
            ..Flow::default()
        };

        match &mut stmt.kind {
            StmtKind::Block(block) => {
                let inner = self.analyze_block(block, ctx, false)?;
                flow = Flow {
                    last_source: ctx.last_source,
                    last_loop: ctx.last_loop,
                    ..inner
                };
            }

            StmtKind::If {
                condition,
                then,
                otherwise,
            } => {
                self.analyze_condition(condition)?;
                let then_flow = self.analyze_block(then, ctx, false)?;
                flow.any_continue = then_flow.any_continue;
                flow.any_break = then_flow.any_break;
                flow.statement_count += then_flow.statement_count;

                if let Some(otherwise) = otherwise {
                    let else_flow = self.analyze_block(otherwise, ctx, false)?;
                    flow.method_escape = then_flow.method_escape && else_flow.method_escape;
                    flow.loop_escape = then_flow.loop_escape && else_flow.loop_escape;
                    flow.all_escape = then_flow.all_escape && else_flow.all_escape;
                    flow.any_continue |= else_flow.any_continue;
                    flow.any_break |= else_flow.any_break;
                    flow.statement_count += else_flow.statement_count;
                }
            }

            StmtKind::While { condition, body } => {
                self.analyze_condition(condition)?;
                let continuous = condition.is_constant_true();
                let body_flow = self.analyze_block(body, AnalyzeContext::loop_body(), true)?;
                Self::finish_loop(&mut flow, continuous, &body_flow);
            }

            StmtKind::Do { body, condition } => {
                let body_flow = self.analyze_block(body, AnalyzeContext::loop_body(), true)?;
                self.analyze_condition(condition)?;
                let continuous = condition.is_constant_true();
                Self::finish_loop(&mut flow, continuous, &body_flow);
            }

            StmtKind::For {
                initializer,
                condition,
                afterthought,
                body,
            } => {
                // The initializer's declarations live in their own scope around the loop
                self.scopes.push_scope();

                if let Some(initializer) = initializer {
                    if !matches!(
                        initializer.kind,
                        StmtKind::Declaration { .. } | StmtKind::Expression { .. }
                    ) {
                        return Err(CompileError::type_mismatch(
                            format!(
                                "A for-loop initializer must be a declaration or an expression, found {}",
                                initializer.kind_name()
                            ),
                            initializer.location.clone(),
                        ));
                    }
                    let init_ctx = AnalyzeContext {
                        in_loop: ctx.in_loop,
                        last_source: false,
                        last_loop: false,
                    };
                    self.analyze_stmt(initializer, init_ctx)?;
                }

                let continuous = match condition {
                    Some(condition) => {
                        self.analyze_condition(condition)?;
                        condition.is_constant_true()
                    }
                    None => true,
                };

                if let Some(afterthought) = afterthought {
                    self.analyze_expr(afterthought)?;
                }

                let body_flow = self.analyze_block(body, AnalyzeContext::loop_body(), true)?;
                self.scopes.pop_scope()?;

                Self::finish_loop(&mut flow, continuous, &body_flow);
            }

            StmtKind::Return { value } => {
                let return_type = self.context.return_type;
                match value {
                    Some(value) => {
                        if return_type == Type::Void {
                            return Err(CompileError::type_mismatch(
                                "Cannot return a value from a script that returns void",
                                location.clone(),
                            ));
                        }
                        self.analyze_value(value)?;
                        self.coerce(value, return_type)?;
                    }
                    None if return_type != Type::Void => {
                        return Err(CompileError::type_mismatch(
                            format!("Missing return value of type {}", return_type),
                            location.clone(),
                        ));
                    }
                    None => {}
                }
                flow.method_escape = true;
                flow.loop_escape = true;
                flow.all_escape = true;
            }

            StmtKind::Break => {
                if !ctx.in_loop {
                    return Err(CompileError::invalid_control_transfer(
                        "Break statement outside of a loop",
                        location.clone(),
                    ));
                }
                flow.loop_escape = true;
                flow.all_escape = true;
                flow.any_break = true;
            }

            StmtKind::Continue => {
                if !ctx.in_loop {
                    return Err(CompileError::invalid_control_transfer(
                        "Continue statement outside of a loop",
                        location.clone(),
                    ));
                }
                if ctx.last_loop {
                    return Err(CompileError::invalid_control_transfer(
                        "Extraneous continue statement at the end of a loop body",
                        location.clone(),
                    )
                    .with_help("Remove it; the loop continues anyway"));
                }
                flow.all_escape = true;
                flow.any_continue = true;
            }

            StmtKind::Try { body, catches } => {
                if catches.is_empty() {
                    return Err(CompileError::type_mismatch(
                        "A try statement needs at least one catch clause",
                        location.clone(),
                    ));
                }
                let body_flow = self.analyze_block(body, ctx, false)?;
                flow.method_escape = body_flow.method_escape;
                flow.loop_escape = body_flow.loop_escape;
                flow.all_escape = body_flow.all_escape;
                flow.any_continue = body_flow.any_continue;
                flow.any_break = body_flow.any_break;
                flow.statement_count += body_flow.statement_count;

                let mut caught_all = false;
                for catch in catches.iter_mut() {
                    if caught_all {
                        return Err(CompileError::unreachable_code(catch.location.clone())
                            .with_help("An earlier catch clause already matches every exception"));
                    }
                    caught_all = catch.exception.is_none();

                    // The exception variable shares the scope of the catch body
                    self.scopes.push_scope();
                    let slot = self
                        .scopes
                        .declare_user(&catch.name, Type::Def, catch.location.clone())?;
                    catch.slot = Some(slot);
                    let catch_flow =
                        self.analyze_sequence(&mut catch.body.statements, ctx, false)?;
                    self.scopes.pop_scope()?;

                    flow.method_escape &= catch_flow.method_escape;
                    flow.loop_escape &= catch_flow.loop_escape;
                    flow.all_escape &= catch_flow.all_escape;
                    flow.any_continue |= catch_flow.any_continue;
                    flow.any_break |= catch_flow.any_break;
                    flow.statement_count += catch_flow.statement_count;
                }
            }

            StmtKind::Throw { value } => {
                self.analyze_value(value)?;
                self.coerce(value, Type::Def)?;
                flow.method_escape = true;
                flow.loop_escape = true;
                flow.all_escape = true;
            }

            StmtKind::Expression { expr } => {
                let actual = self.analyze_expr(expr)?;
                let return_type = self.context.return_type;

                // The value of the script's final expression is its result
                if ctx.last_source && actual != Type::Void && return_type != Type::Void {
                    self.coerce(expr, return_type)?;
                    flow.method_escape = true;
                    flow.loop_escape = true;
                    flow.all_escape = true;
                }
            }

            StmtKind::Declaration {
                ty,
                name,
                initializer,
                slot,
            } => {
                if matches!(*ty, Type::Void | Type::Null) {
                    return Err(CompileError::type_mismatch(
                        format!("Cannot declare variable '{}' of type {}", name, ty),
                        location.clone(),
                    ));
                }
                // The initializer is analyzed before the name is visible
                if let Some(initializer) = initializer {
                    self.analyze_value(initializer)?;
                    self.coerce(initializer, *ty)?;
                }
                *slot = Some(self.scopes.declare_user(name, *ty, location.clone())?);
            }
        }

        stmt.flow = Some(flow);
        Ok(flow)
    }

    /// Loop escape rules: the loop absorbs its body's breaks and continues, and a
    /// continuous loop with no break never falls through
    fn finish_loop(flow: &mut Flow, continuous: bool, body: &Flow) {
        flow.statement_count += body.statement_count;
        if continuous && !body.any_break {
            flow.method_escape = true;
            flow.all_escape = true;
        }
    }

    // ==================== Expressions ====================

    fn analyze_condition(&mut self, condition: &mut Expr) -> CompileResult<()> {
        self.analyze_value(condition)?;
        self.coerce(condition, Type::Bool)
    }

    /// Analyze an expression whose value is consumed
    fn analyze_value(&mut self, expr: &mut Expr) -> CompileResult<Type> {
        let ty = self.analyze_expr(expr)?;
        if ty == Type::Void {
            return Err(CompileError::type_mismatch(
                "A void expression has no value",
                expr.location.clone(),
            ));
        }
        Ok(ty)
    }

    fn analyze_expr(&mut self, expr: &mut Expr) -> CompileResult<Type> {
        let context = self.context;
        let location = &expr.location;

        let ty = match &mut expr.kind {
            ExprKind::Literal { value } => value.ty(),

            ExprKind::Regex { pattern, flags } => {
                self.check_regex(pattern, flags, location)?;
                Type::Pattern
            }

            ExprKind::Variable { name, slot } => {
                let variable = self.scopes.resolve(name, location)?;
                *slot = Some(variable.slot);
                variable.ty
            }

            ExprKind::Assign { name, value, slot } => {
                let (target_slot, target_ty) = {
                    let variable = self.scopes.resolve(name, location)?;
                    (variable.slot, variable.ty)
                };
                self.analyze_value(value)?;
                self.coerce(value, target_ty)?;
                *slot = Some(target_slot);
                target_ty
            }

            ExprKind::Unary { op, operand } => {
                let operand_ty = self.analyze_value(operand)?;
                match op {
                    UnaryOp::Not => {
                        self.coerce(operand, Type::Bool)?;
                        Type::Bool
                    }
                    UnaryOp::Negate if operand_ty.is_numeric() || operand_ty == Type::Def => {
                        operand_ty
                    }
                    UnaryOp::Negate => {
                        return Err(CompileError::type_mismatch(
                            format!("Cannot negate a value of type {}", operand_ty),
                            location.clone(),
                        ));
                    }
                }
            }

            ExprKind::Binary { op, left, right } => {
                self.analyze_binary(*op, left, right, location)?
            }

            ExprKind::Conditional {
                condition,
                then,
                otherwise,
            } => {
                self.analyze_condition(condition)?;
                let then_ty = self.analyze_value(then)?;
                let else_ty = self.analyze_value(otherwise)?;
                let common = Self::common_type(then_ty, else_ty);
                self.coerce(then, common)?;
                self.coerce(otherwise, common)?;
                common
            }

            ExprKind::Cast { ty, expr: inner } => {
                let from = self.analyze_value(inner)?;
                if !from.converts_to(*ty, Conversion::Explicit) {
                    return Err(CompileError::type_mismatch(
                        format!("Cannot cast from {} to {}", from, ty),
                        location.clone(),
                    ));
                }
                *ty
            }

            ExprKind::Call { name, args } => {
                let signature = context.function(name).ok_or_else(|| {
                    CompileError::analysis(
                        AnalysisErrorKind::UndefinedFunction,
                        format!("Unknown function '{}'", name),
                        location.clone(),
                    )
                })?;
                if signature.params.len() != args.len() {
                    return Err(CompileError::type_mismatch(
                        format!(
                            "Function '{}' expects {} argument(s), found {}",
                            name,
                            signature.params.len(),
                            args.len()
                        ),
                        location.clone(),
                    ));
                }
                for (arg, param) in args.iter_mut().zip(&signature.params) {
                    self.analyze_value(arg)?;
                    self.coerce(arg, *param)?;
                }
                signature.returns
            }

            ExprKind::Field { object, name } => {
                let object_ty = self.analyze_value(object)?;
                if object_ty != Type::Def {
                    return Err(CompileError::type_mismatch(
                        format!("Cannot access field '{}' on a value of type {}", name, object_ty),
                        location.clone(),
                    ));
                }
                Type::Def
            }

            ExprKind::Index { object, index } => {
                let object_ty = self.analyze_value(object)?;
                if object_ty != Type::Def {
                    return Err(CompileError::type_mismatch(
                        format!("Cannot index a value of type {}", object_ty),
                        location.clone(),
                    ));
                }
                let index_ty = self.analyze_value(index)?;
                if !matches!(index_ty, Type::Int | Type::String | Type::Def) {
                    return Err(CompileError::type_mismatch(
                        format!("Cannot use a value of type {} as an index", index_ty),
                        index.location.clone(),
                    ));
                }
                Type::Def
            }
        };

        expr.actual = Some(ty);
        expr.expected = Some(ty);
        Ok(ty)
    }

    fn analyze_binary(
        &mut self,
        op: BinaryOp,
        left: &mut Expr,
        right: &mut Expr,
        location: &Location,
    ) -> CompileResult<Type> {
        let left_ty = self.analyze_value(left)?;
        let right_ty = self.analyze_value(right)?;

        if op.is_logical() {
            self.coerce(left, Type::Bool)?;
            self.coerce(right, Type::Bool)?;
            return Ok(Type::Bool);
        }

        if op == BinaryOp::Add && (left_ty == Type::String || right_ty == Type::String) {
            return Ok(Type::String);
        }

        if let Some(promoted) = Type::promote_numeric(left_ty, right_ty) {
            self.coerce(left, promoted)?;
            self.coerce(right, promoted)?;
            return Ok(if op.is_arithmetic() { promoted } else { Type::Bool });
        }

        if op.is_equality() {
            let comparable = left_ty == right_ty
                || left_ty == Type::Def
                || right_ty == Type::Def
                || (left_ty == Type::Null && right_ty.is_reference())
                || (right_ty == Type::Null && left_ty.is_reference());
            if comparable {
                return Ok(Type::Bool);
            }
        }

        Err(CompileError::type_mismatch(
            format!(
                "Operator {} cannot be applied to {} and {}",
                op.symbol(),
                left_ty,
                right_ty
            ),
            location.clone(),
        ))
    }

    /// Type both arms of a conditional are converted to
    fn common_type(a: Type, b: Type) -> Type {
        if a == b {
            return a;
        }
        if a == Type::Null && b.is_reference() {
            return b;
        }
        if b == Type::Null && a.is_reference() {
            return a;
        }
        Type::promote_numeric(a, b).unwrap_or(Type::Def)
    }

    /// Record that `expr` is consumed as `target`, checking the implicit conversion
    fn coerce(&self, expr: &mut Expr, target: Type) -> CompileResult<()> {
        let actual = expr.actual.ok_or_else(|| {
            CompileError::codegen("Expression coerced before analysis", expr.location.clone())
        })?;

        let conversion = Conversion::Implicit {
            strict: self.settings.strict_numeric_conversion,
        };
        if !actual.converts_to(target, conversion) {
            let mut err = CompileError::type_mismatch(
                format!("Cannot convert {} to {}", actual, target),
                expr.location.clone(),
            );
            if actual.converts_to(target, Conversion::Explicit) {
                err = err.with_help(format!("Use an explicit cast: ({}) ...", target));
            }
            return Err(err);
        }

        expr.expected = Some(target);
        Ok(())
    }

    fn check_regex(&self, pattern: &str, flags: &str, location: &Location) -> CompileResult<()> {
        if !self.settings.regex_enabled {
            return Err(CompileError::analysis(
                AnalysisErrorKind::RegexDisabled,
                "Regex literals are disabled",
                location.clone(),
            )
            .with_help(format!("Set {}=true to allow them", REGEX_ENABLED)));
        }

        let mut builder = regex::RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'U' => builder.swap_greed(true),
                other => {
                    return Err(CompileError::analysis(
                        AnalysisErrorKind::InvalidRegex,
                        format!("Unknown regex flag '{}'", other),
                        location.clone(),
                    ));
                }
            };
        }

        builder.build().map(|_| ()).map_err(|e| {
            CompileError::analysis(
                AnalysisErrorKind::InvalidRegex,
                format!("Invalid regex: {}", e),
                location.clone(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::compiler::analyze;
    use crate::context::ScriptContext;
    use crate::error::{AnalysisErrorKind, CompileResult, Location};
    use crate::settings::CompilerSettings;
    use crate::types::Type;

    fn loc() -> Location {
        Location::new(1, 0, "")
    }

    fn lit(value: Literal) -> Expr {
        Expr::literal(value, loc())
    }

    /// Analyze `return <expr>;` and hand back the typed expression
    fn typed(return_type: Type, expr: Expr) -> CompileResult<Expr> {
        let context = ScriptContext::new(return_type).with_param("doc", Type::Def);
        let program = Program::new(vec![Stmt::new(StmtKind::Return { value: Some(expr) }, loc())]);
        let analyzed = analyze(program, &context, &CompilerSettings::new())?;
        match &analyzed.program().body.statements[0].kind {
            StmtKind::Return { value: Some(value) } => Ok(value.clone()),
            other => panic!("expected return, got {:?}", other),
        }
    }

    #[test]
    fn test_arithmetic_promotes() {
        let expr = typed(
            Type::Def,
            Expr::binary(BinaryOp::Add, lit(Literal::Int(1)), lit(Literal::Double(2.0)), loc()),
        )
        .unwrap();
        assert_eq!(expr.actual(), Some(Type::Double));
        assert_eq!(expr.expected(), Some(Type::Def));

        let ExprKind::Binary { left, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.actual(), Some(Type::Int));
        assert_eq!(left.expected(), Some(Type::Double));
    }

    #[test]
    fn test_string_concatenation() {
        let expr = typed(
            Type::String,
            Expr::binary(
                BinaryOp::Add,
                lit(Literal::String("n=".to_string())),
                lit(Literal::Int(3)),
                loc(),
            ),
        )
        .unwrap();
        assert_eq!(expr.actual(), Some(Type::String));
    }

    #[test]
    fn test_comparisons_produce_bool() {
        let expr = typed(
            Type::Bool,
            Expr::binary(BinaryOp::Equal, Expr::variable("doc", loc()), lit(Literal::Null), loc()),
        )
        .unwrap();
        assert_eq!(expr.actual(), Some(Type::Bool));

        let err = typed(
            Type::Bool,
            Expr::binary(BinaryOp::Less, lit(Literal::Bool(true)), lit(Literal::Int(1)), loc()),
        )
        .unwrap_err();
        assert_eq!(err.analysis_kind(), Some(AnalysisErrorKind::TypeMismatch));
    }

    #[test]
    fn test_conditional_unifies_arms() {
        let conditional = |then: Literal, otherwise: Literal| {
            Expr::new(
                ExprKind::Conditional {
                    condition: Box::new(lit(Literal::Bool(true))),
                    then: Box::new(lit(then)),
                    otherwise: Box::new(lit(otherwise)),
                },
                loc(),
            )
        };

        let expr = typed(Type::Def, conditional(Literal::Int(1), Literal::Double(2.0))).unwrap();
        assert_eq!(expr.actual(), Some(Type::Double));

        let expr = typed(Type::Def, conditional(Literal::Null, Literal::String("s".into()))).unwrap();
        assert_eq!(expr.actual(), Some(Type::String));

        let expr = typed(Type::Def, conditional(Literal::Bool(true), Literal::Int(1))).unwrap();
        assert_eq!(expr.actual(), Some(Type::Def));
    }

    #[test]
    fn test_explicit_cast() {
        let cast = |ty: Type, value: Literal| {
            Expr::new(
                ExprKind::Cast {
                    ty,
                    expr: Box::new(lit(value)),
                },
                loc(),
            )
        };

        let expr = typed(Type::Int, cast(Type::Int, Literal::Double(2.5))).unwrap();
        assert_eq!(expr.actual(), Some(Type::Int));

        let err = typed(Type::Int, cast(Type::Int, Literal::String("2".into()))).unwrap_err();
        assert_eq!(err.analysis_kind(), Some(AnalysisErrorKind::TypeMismatch));
    }

    #[test]
    fn test_not_requires_bool() {
        let not = |value: Literal| {
            Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(lit(value)),
                },
                loc(),
            )
        };
        assert!(typed(Type::Bool, not(Literal::Bool(false))).is_ok());

        let err = typed(Type::Bool, not(Literal::Int(0))).unwrap_err();
        assert_eq!(err.analysis_kind(), Some(AnalysisErrorKind::TypeMismatch));
    }
}
