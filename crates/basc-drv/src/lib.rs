//! basc-drv - Pipeline driver.
//!
//! Orchestrates the compilation stages: semantic analysis over the AST
//! contract, lowering to the basic-block IR, the optimizer, and structured
//! C# emission. Each stage fully owns its inputs and produces its outputs
//! before the next stage begins; the driver aborts between stages when
//! errors accumulated, so emission never sees an erroneous program.
//!
//! The driver is a library: reading source files, command-line parsing, and
//! writing output belong to the embedder.

use basc_ast::Program;
use basc_emit::{CsharpEmitter, EmitError, EmitterConfig};
use basc_ir::{lower_program, optimize_module, LowerError, LowerOptions, OptimizeConfig};
use basc_sem::Analyzer;
use basc_util::{Diagnostic, Handler};
use thiserror::Error;

/// Options for one compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub emitter: EmitterConfig,
    pub lower: LowerOptions,
    /// Run the optimizer between lowering and emission.
    pub optimize: bool,
    pub optimizer: OptimizeConfig,
}

/// The product of a successful compilation.
#[derive(Debug)]
pub struct CompiledOutput {
    /// Emitted target source text.
    pub code: String,
    /// Accumulated diagnostics (warnings only; errors abort).
    pub diagnostics: Vec<Diagnostic>,
    /// Total optimizer modifications, zero when the optimizer is off.
    pub optimizations: usize,
}

/// A failed compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("semantic analysis failed with {errors} error(s)")]
    Analysis {
        errors: usize,
        diagnostics: Vec<Diagnostic>,
    },

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl CompileError {
    /// Diagnostics attached to the failure, when the failing stage produced
    /// any.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Analysis { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

/// The compilation pipeline.
pub struct Pipeline {
    options: CompileOptions,
}

impl Pipeline {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// A pipeline with default options and the optimizer enabled.
    pub fn with_defaults() -> Self {
        Self {
            options: CompileOptions {
                optimize: true,
                ..CompileOptions::default()
            },
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile an analyzed program to C# text.
    pub fn compile(&self, program: &Program) -> Result<CompiledOutput, CompileError> {
        let handler = Handler::new();

        log::debug!("stage: semantic analysis");
        let analysis = Analyzer::new(&handler)
            .analyze(program)
            .map_err(|failed| CompileError::Analysis {
                errors: failed.errors,
                diagnostics: handler.diagnostics(),
            })?;

        log::debug!("stage: IR lowering");
        let mut module = lower_program(program, &analysis, &self.options.lower)?;

        let optimizations = if self.options.optimize {
            log::debug!("stage: optimization");
            let result = optimize_module(&mut module, &self.options.optimizer);
            log::debug!("optimizer made {} modifications", result.total_modifications);
            result.total_modifications
        } else {
            0
        };

        log::debug!("stage: emission");
        let code = CsharpEmitter::new(
            &module,
            &analysis.types,
            &analysis.stdlib,
            &self.options.emitter,
        )
        .emit()?;

        Ok(CompiledOutput {
            code,
            diagnostics: handler.diagnostics(),
            optimizations,
        })
    }
}

/// Convenience wrapper for embedders that only want the text.
pub fn compile_to_string(program: &Program) -> anyhow::Result<String> {
    use anyhow::Context;
    let output = Pipeline::with_defaults()
        .compile(program)
        .context("compilation failed")?;
    Ok(output.code)
}
