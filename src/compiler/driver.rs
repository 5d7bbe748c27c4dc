// Scorch Compiler Driver
// Runs analysis then generation for one script and packages the result

use super::analyzer::Analyzer;
use super::codegen::generate;
use super::unit::{CompiledScript, ParamSlot};
use crate::ast::{Flow, Program};
use crate::context::ScriptContext;
use crate::error::{CompileError, CompileResult, Location};
use crate::settings::CompilerSettings;
use crate::types::Type;
use tracing::debug;

/// Name of the hidden local that counts loop iterations
pub const LOOP_COUNTER: &str = "#loop";

/// Where a compilation is in its life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parsed,
    Analyzing,
    Analyzed,
    /// Terminal: a `CompiledScript` was produced
    Generated,
    /// Terminal: an error was returned and no unit exists
    Failed,
}

/// A program that passed analysis, with every annotation filled in
///
/// Only `analyze` constructs one, so generation never sees an unanalyzed tree.
#[derive(Debug, Clone)]
pub struct AnalyzedProgram {
    pub(crate) program: Program,
    pub(crate) flow: Flow,
    pub(crate) params: Vec<ParamSlot>,
    pub(crate) loop_counter: Option<u16>,
    pub(crate) max_locals: u16,
    pub(crate) return_type: Type,
}

impl AnalyzedProgram {
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Flow of the outermost sequence
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn max_locals(&self) -> u16 {
        self.max_locals
    }
}

/// Analyze `program` against the host context
pub fn analyze(
    mut program: Program,
    context: &ScriptContext,
    settings: &CompilerSettings,
) -> CompileResult<AnalyzedProgram> {
    let mut analyzer = Analyzer::new(settings, context);
    analyzer.scopes.push_scope();

    let mut params = Vec::with_capacity(context.params.len());
    for param in &context.params {
        if matches!(param.ty, Type::Void | Type::Null) {
            return Err(CompileError::type_mismatch(
                format!("Parameter '{}' cannot have type {}", param.name, param.ty),
                Location::synthetic(),
            ));
        }
        let slot = analyzer
            .scopes
            .declare_user(&param.name, param.ty, Location::synthetic())?;
        params.push(ParamSlot {
            name: param.name.clone(),
            ty: param.ty,
            slot,
        });
    }

    let loop_counter = if settings.loop_guard_enabled() {
        Some(
            analyzer
                .scopes
                .declare(LOOP_COUNTER, Type::Int, Location::synthetic())?,
        )
    } else {
        None
    };

    let flow = analyzer.analyze_program(&mut program)?;
    analyzer.scopes.pop_scope()?;

    Ok(AnalyzedProgram {
        program,
        flow,
        params,
        loop_counter,
        max_locals: analyzer.scopes.max_locals(),
        return_type: context.return_type,
    })
}

/// One compile of one script, driven through its stages by `run`
pub struct Compilation<'a> {
    name: String,
    program: Option<Program>,
    context: &'a ScriptContext,
    settings: &'a CompilerSettings,
    stage: Stage,
}

impl<'a> Compilation<'a> {
    pub fn new(
        name: impl Into<String>,
        program: Program,
        context: &'a ScriptContext,
        settings: &'a CompilerSettings,
    ) -> Self {
        Self {
            name: name.into(),
            program: Some(program),
            context,
            settings,
            stage: Stage::Parsed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Analyze and generate; on error the compilation ends in `Failed`
    pub fn run(&mut self) -> CompileResult<CompiledScript> {
        let program = match (self.stage, self.program.take()) {
            (Stage::Parsed, Some(program)) => program,
            _ => {
                return Err(CompileError::codegen(
                    format!("Compilation '{}' has already run", self.name),
                    Location::synthetic(),
                ));
            }
        };
        let source = program.source.clone();

        self.advance(Stage::Analyzing, None);
        let analyzed = analyze(program, self.context, self.settings)
            .map_err(|err| self.fail(err, source.as_deref()))?;
        self.advance(Stage::Analyzed, Some(analyzed.flow.statement_count));

        let chunk = generate(&analyzed, self.settings)
            .map_err(|err| self.fail(err, source.as_deref()))?;

        let script = CompiledScript::new(
            self.name.clone(),
            chunk,
            analyzed.params,
            analyzed.return_type,
            analyzed.max_locals,
            analyzed.loop_counter,
            analyzed.flow.statement_count,
        );
        self.advance(Stage::Generated, Some(script.statement_count()));
        Ok(script)
    }

    fn advance(&mut self, stage: Stage, statements: Option<usize>) {
        debug!(script = %self.name, from = ?self.stage, to = ?stage, statements, "compile stage");
        self.stage = stage;
    }

    fn fail(&mut self, err: CompileError, source: Option<&str>) -> CompileError {
        debug!(script = %self.name, stage = ?self.stage, kind = %err.kind, "compile failed");
        self.stage = Stage::Failed;
        match source {
            Some(source) => err.with_source(source),
            None => err,
        }
    }
}

/// Compile `program` in one call
pub fn compile(
    name: impl Into<String>,
    program: Program,
    context: &ScriptContext,
    settings: &CompilerSettings,
) -> CompileResult<CompiledScript> {
    Compilation::new(name, program, context, settings).run()
}
