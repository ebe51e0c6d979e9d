//! tex2pdf-core - LaTeX compilation with structured diagnostics
//!
//! Compiles a single LaTeX document via an external engine (tectonic or
//! latexmk) and turns the raw engine log into typed [`Diagnostic`]s:
//! - [`Compiler`] runs the engine as a child process under a wall-clock
//!   deadline and assembles the terminal [`CompileResult`]
//! - [`LogAnalyzer`] holds the ordered, extensible (pattern, handler) rule
//!   registry that extracts findings from log text
//! - [`resolver`] picks the engine binary, explicitly or by probing the
//!   search path
//!
//! Callers embed the library through [`Compiler::compile`] (or the
//! free-standing [`compile`]); compilation failures come back as a
//! `CompileResult`, never as an error.

pub mod analysis;
pub mod compiler;
pub mod model;
pub mod resolver;
pub mod telemetry;

// Re-export key types
pub use analysis::{LogAnalyzer, RuleHandler};
pub use compiler::{compile, CompileError, Compiler, DEFAULT_TIMEOUT};
pub use model::{
    CompileResult, Diagnostic, Engine, EngineConfig, Severity, UnknownEngine, TIMEOUT_RETURN_CODE,
};
pub use resolver::{resolve_engine, PathResolver, ResolveError, ResolvedEngine, SystemPath};
pub use telemetry::init_tracing;
