//! Compilation orchestrator.
//!
//! One compile call owns one child process: the engine invocation is built
//! deterministically from the resolved engine and the given paths, run with
//! its output captured, and raced against a wall-clock deadline. Everything
//! downstream of a successful spawn folds into a [`CompileResult`];
//! everything upstream (bad input, unresolvable engine, spawn failure)
//! surfaces as a [`CompileError`].

use crate::analysis::LogAnalyzer;
use crate::model::{
    CompileResult, Diagnostic, Engine, EngineConfig, Severity, TIMEOUT_RETURN_CODE,
};
use crate::resolver::{resolve_engine, PathResolver, ResolveError, ResolvedEngine, SystemPath};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default per-compile deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Raw excerpt length for the synthesized generic diagnostic.
const FALLBACK_RAW_LEN: usize = 500;

/// Usage and environment errors, reported to the caller before (or instead
/// of) producing a [`CompileResult`].
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("input file not found: {0}")]
    InputNotFound(PathBuf),

    #[error("input path is not a file: {0}")]
    InputNotAFile(PathBuf),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to create output directory {dir}: {source}")]
    OutputDir {
        dir: PathBuf,
        source: std::io::Error,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to spawn {engine}: {source}")]
    Spawn {
        engine: Engine,
        source: std::io::Error,
    },
}

/// Compilation orchestrator: owns the diagnostic rule registry and the
/// executable lookup capability. Holds no state across invocations.
pub struct Compiler {
    analyzer: LogAnalyzer,
    resolver: Box<dyn PathResolver>,
}

impl Compiler {
    /// Compiler with the built-in rules and the system `PATH` resolver.
    pub fn new() -> Self {
        Self::with_resolver(Box::new(SystemPath))
    }

    /// Compiler with an injected executable lookup (used by tests).
    pub fn with_resolver(resolver: Box<dyn PathResolver>) -> Self {
        Self {
            analyzer: LogAnalyzer::new(),
            resolver,
        }
    }

    /// Mutable access to the rule registry, for registering custom rules.
    /// Must not be called concurrently with in-flight compiles.
    pub fn analyzer_mut(&mut self) -> &mut LogAnalyzer {
        &mut self.analyzer
    }

    /// Compile `input` into `outdir`, racing the engine against `timeout`.
    ///
    /// Returns `Err` only for usage/environment problems; expected
    /// compilation failures (nonzero exit, missing artifact, timeout) are a
    /// `CompileResult` with `success == false` and non-empty diagnostics.
    pub async fn compile(
        &self,
        input: &Path,
        outdir: &Path,
        engine: Option<EngineConfig>,
        timeout: Duration,
    ) -> Result<CompileResult, CompileError> {
        if !input.exists() {
            return Err(CompileError::InputNotFound(input.to_path_buf()));
        }
        if !input.is_file() {
            return Err(CompileError::InputNotAFile(input.to_path_buf()));
        }
        let input = input.canonicalize().map_err(|source| CompileError::Io {
            path: input.to_path_buf(),
            source,
        })?;

        let resolved = resolve_engine(engine.as_ref(), self.resolver.as_ref())?;

        std::fs::create_dir_all(outdir).map_err(|source| CompileError::OutputDir {
            dir: outdir.to_path_buf(),
            source,
        })?;
        let outdir = outdir.canonicalize().map_err(|source| CompileError::Io {
            path: outdir.to_path_buf(),
            source,
        })?;

        let pdf_path = expected_pdf(&input, &outdir);
        let mut cmd = build_command(&resolved, &input, &outdir);

        info!(
            engine = %resolved.engine,
            input = %input.display(),
            outdir = %outdir.display(),
            timeout_secs = timeout.as_secs(),
            "starting compilation"
        );

        let child = cmd.spawn().map_err(|source| CompileError::Spawn {
            engine: resolved.engine,
            source,
        })?;
        let pid = child.id();

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                // Past the spawn point, surprises fold into the result
                // instead of escaping as unstructured failures.
                warn!(engine = %resolved.engine, error = %source, "failed to collect engine output");
                return Ok(wait_failure_result(resolved.engine, &source));
            }
            Err(_) => {
                warn!(engine = %resolved.engine, timeout_secs = timeout.as_secs(), "compilation timed out");
                kill_process_group(pid);
                return Ok(timeout_result(resolved.engine, timeout));
            }
        };

        let return_code = output.status.code().unwrap_or(-1);
        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        // The artifact check is authoritative: exit 0 without a PDF is a
        // failure.
        let success = output.status.success() && pdf_path.is_file();
        debug!(return_code, success, log_bytes = log.len(), "engine exited");

        let diagnostics = if success {
            self.analyzer
                .analyze(&log)
                .into_iter()
                .filter(|d| d.level == Severity::Warning)
                .collect()
        } else {
            let mut diagnostics = self.analyzer.analyze(&log);
            if !diagnostics.iter().any(|d| d.level == Severity::Error) {
                diagnostics.push(Diagnostic::error(
                    "latex-error",
                    "Compilation failed; check the log for details.",
                    log_tail(&log, FALLBACK_RAW_LEN),
                ));
            }
            diagnostics
        };

        Ok(CompileResult {
            success,
            pdf_path: success.then_some(pdf_path),
            log,
            diagnostics,
            engine: resolved.engine,
            return_code,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot compile with the default rule set and system resolver.
pub async fn compile(
    input: &Path,
    outdir: &Path,
    engine: Option<EngineConfig>,
    timeout: Duration,
) -> Result<CompileResult, CompileError> {
    Compiler::new().compile(input, outdir, engine, timeout).await
}

/// Engine-specific argument list.
fn engine_args(engine: Engine, input: &Path, outdir: &Path) -> Vec<OsString> {
    match engine {
        Engine::Tectonic => {
            let mut args = vec![input.as_os_str().to_os_string()];
            let mut outdir_flag = OsString::from("--outdir=");
            outdir_flag.push(outdir.as_os_str());
            args.push(outdir_flag);
            args
        }
        Engine::Latexmk => {
            let mut args: Vec<OsString> = ["-pdf", "-interaction=nonstopmode", "-halt-on-error"]
                .into_iter()
                .map(OsString::from)
                .collect();
            let mut outdir_flag = OsString::from("-outdir=");
            outdir_flag.push(outdir.as_os_str());
            args.push(outdir_flag);
            args.push(
                input
                    .file_name()
                    .unwrap_or(input.as_os_str())
                    .to_os_string(),
            );
            args
        }
    }
}

fn build_command(resolved: &ResolvedEngine, input: &Path, outdir: &Path) -> Command {
    let mut cmd = Command::new(&resolved.binary);
    cmd.args(engine_args(resolved.engine, input, outdir));
    if let Some(parent) = input.parent().filter(|p| !p.as_os_str().is_empty()) {
        cmd.current_dir(parent);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // New process group, so a timeout can signal engine-spawned helpers
    // (latexmk runs pdflatex underneath), not just the direct child.
    #[cfg(unix)]
    cmd.process_group(0);

    cmd
}

/// SIGKILL the child's entire process group. The child was spawned into its
/// own group, so the group id equals its pid and the negative pid addresses
/// every member. `kill_on_drop` still reaps the direct child as a backstop.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // SAFETY: kill(2) with a group id; no memory is touched.
        unsafe {
            libc::kill(-(pid as i32), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

/// Expected artifact location: `<outdir>/<input stem>.pdf`.
fn expected_pdf(input: &Path, outdir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    outdir.join(stem).with_extension("pdf")
}

/// Result for a post-spawn wait/capture failure.
fn wait_failure_result(engine: Engine, source: &std::io::Error) -> CompileResult {
    let log = format!("failed to collect engine output: {source}");
    let diagnostic = Diagnostic::error(
        "latex-error",
        "Compilation failed; check the log for details.",
        log.clone(),
    );
    CompileResult {
        success: false,
        pdf_path: None,
        log,
        diagnostics: vec![diagnostic],
        engine,
        return_code: -1,
    }
}

/// Result for a deadline expiry. The log is necessarily incomplete, so the
/// diagnostic is injected directly instead of going through rule scanning.
fn timeout_result(engine: Engine, timeout: Duration) -> CompileResult {
    let log = format!(
        "compilation timed out after {} seconds",
        timeout.as_secs()
    );
    let diagnostic = Diagnostic::error(
        "timeout-exceeded",
        format!(
            "Compilation exceeded the {}-second deadline and the engine \
             process was terminated. Simplify the document or raise the \
             timeout.",
            timeout.as_secs()
        ),
        log.clone(),
    );
    CompileResult {
        success: false,
        pdf_path: None,
        log,
        diagnostics: vec![diagnostic],
        engine,
        return_code: TIMEOUT_RETURN_CODE,
    }
}

/// Last `max` bytes of `log`, nudged forward to a char boundary.
fn log_tail(log: &str, max: usize) -> &str {
    if log.len() <= max {
        return log;
    }
    let mut start = log.len() - max;
    while !log.is_char_boundary(start) {
        start += 1;
    }
    &log[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_pdf_uses_input_stem() {
        let pdf = expected_pdf(Path::new("/work/paper.tex"), Path::new("/out"));
        assert_eq!(pdf, PathBuf::from("/out/paper.pdf"));
    }

    #[test]
    fn test_tectonic_args() {
        let args = engine_args(
            Engine::Tectonic,
            Path::new("/work/paper.tex"),
            Path::new("/out"),
        );
        assert_eq!(args[0], OsString::from("/work/paper.tex"));
        assert_eq!(args[1], OsString::from("--outdir=/out"));
    }

    #[test]
    fn test_latexmk_args() {
        let args = engine_args(
            Engine::Latexmk,
            Path::new("/work/paper.tex"),
            Path::new("/out"),
        );
        let args: Vec<_> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-pdf",
                "-interaction=nonstopmode",
                "-halt-on-error",
                "-outdir=/out",
                "paper.tex"
            ]
        );
    }

    #[test]
    fn test_timeout_result_shape() {
        let result = timeout_result(Engine::Tectonic, Duration::from_secs(5));
        assert!(!result.success);
        assert!(result.pdf_path.is_none());
        assert_eq!(result.return_code, TIMEOUT_RETURN_CODE);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, "timeout-exceeded");
        assert!(result.log.contains("5 seconds"));
    }

    #[test]
    fn test_log_tail_short_log_unchanged() {
        assert_eq!(log_tail("short", 500), "short");
    }

    #[test]
    fn test_log_tail_truncates_on_char_boundary() {
        // 'é' is two bytes; a cut of 6 would land inside it.
        let log = format!("{}é tail", "x".repeat(600));
        let tail = log_tail(&log, 6);
        assert_eq!(tail, " tail");
        assert!(log.ends_with(tail));
    }
}
