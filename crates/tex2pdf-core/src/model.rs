//! Data model for compilation results and diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Return code recorded when the compile deadline fired before the engine
/// exited. Distinct from `-1`, which is recorded for a child killed by a
/// signal (no exit code available).
pub const TIMEOUT_RETURN_CODE: i32 = -2;

/// Supported LaTeX engines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Self-contained engine; fetches packages on demand.
    Tectonic,

    /// Build-tool driver over a TeX Live installation.
    Latexmk,
}

impl Engine {
    /// Auto-detection preference order.
    pub const DETECTION_ORDER: [Engine; 2] = [Engine::Tectonic, Engine::Latexmk];

    /// The engine identifier, which is also its binary name.
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Tectonic => "tectonic",
            Engine::Latexmk => "latexmk",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown engine identifier.
#[derive(Debug, thiserror::Error)]
#[error("unsupported engine '{0}' (expected 'tectonic' or 'latexmk')")]
pub struct UnknownEngine(pub String);

impl FromStr for Engine {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tectonic" => Ok(Engine::Tectonic),
            "latexmk" => Ok(Engine::Latexmk),
            other => Err(UnknownEngine(other.to_string())),
        }
    }
}

/// Caller-supplied engine selection for one compile call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Which engine to invoke.
    pub engine: Engine,

    /// Explicit binary path, bypassing the search-path lookup.
    pub binary: Option<PathBuf>,
}

impl EngineConfig {
    /// Select an engine, locating its binary on the search path.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            binary: None,
        }
    }

    /// Pin the engine to an explicit binary path.
    pub fn with_binary(mut self, binary: PathBuf) -> Self {
        self.binary = Some(binary);
        self
    }
}

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// A single structured finding extracted from a compilation log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Diagnostic {
    /// Severity level.
    pub level: Severity,

    /// Stable identifier (e.g. "undefined-control-sequence").
    pub code: String,

    /// Human-readable explanation with fix guidance.
    pub message: String,

    /// The exact log excerpt that triggered this finding.
    pub raw: String,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(
        level: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            level,
            code: code.into(),
            message: message.into(),
            raw: raw.into(),
        }
    }

    /// Create an error-level diagnostic.
    pub fn error(
        code: impl Into<String>,
        message: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Error, code, message, raw)
    }

    /// Create a warning-level diagnostic.
    pub fn warning(
        code: impl Into<String>,
        message: impl Into<String>,
        raw: impl Into<String>,
    ) -> Self {
        Self::new(Severity::Warning, code, message, raw)
    }
}

/// Terminal result of one compilation attempt.
///
/// Invariants: `success` implies `pdf_path` is set and diagnostics (if any)
/// are warnings; `!success` implies `pdf_path` is `None` and `diagnostics`
/// is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompileResult {
    /// Whether the engine exited 0 and the PDF exists.
    pub success: bool,

    /// Path to the produced PDF; present iff `success`.
    pub pdf_path: Option<PathBuf>,

    /// Full captured engine output (stdout + stderr), for audit.
    pub log: String,

    /// Ordered findings: rule-registration order, then order of appearance.
    pub diagnostics: Vec<Diagnostic>,

    /// Engine actually used.
    pub engine: Engine,

    /// Child exit status, or [`TIMEOUT_RETURN_CODE`] on deadline expiry.
    pub return_code: i32,
}

impl CompileResult {
    /// Error-level findings only.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == Severity::Error)
    }

    /// Warning-level findings only.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.level == Severity::Warning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_serde_identifiers() {
        assert_eq!(
            serde_json::to_string(&Engine::Tectonic).expect("serialize"),
            "\"tectonic\""
        );
        assert_eq!(
            serde_json::to_string(&Engine::Latexmk).expect("serialize"),
            "\"latexmk\""
        );
    }

    #[test]
    fn test_engine_from_str() {
        assert_eq!("tectonic".parse::<Engine>().unwrap(), Engine::Tectonic);
        assert_eq!("LATEXMK".parse::<Engine>().unwrap(), Engine::Latexmk);
        assert!("pdflatex".parse::<Engine>().is_err());
    }

    #[test]
    fn test_engine_display_matches_name() {
        for engine in Engine::DETECTION_ORDER {
            assert_eq!(engine.to_string(), engine.name());
        }
    }

    #[test]
    fn test_severity_serde() {
        for sev in [Severity::Warning, Severity::Error] {
            let json = serde_json::to_string(&sev).expect("serialize");
            let back: Severity = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(sev, back);
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Warning < Severity::Error);
    }

    #[test]
    fn test_engine_config_with_binary() {
        let config =
            EngineConfig::new(Engine::Latexmk).with_binary(PathBuf::from("/opt/texlive/latexmk"));
        assert_eq!(config.engine, Engine::Latexmk);
        assert_eq!(
            config.binary.as_deref(),
            Some(std::path::Path::new("/opt/texlive/latexmk"))
        );
    }

    #[test]
    fn test_compile_result_round_trip() {
        let result = CompileResult {
            success: false,
            pdf_path: None,
            log: "! Undefined control sequence.\nl.12 \\foo".to_string(),
            diagnostics: vec![
                Diagnostic::error("undefined-control-sequence", "check for typos", "l.12 \\foo"),
                Diagnostic::warning("latex-warning", "overfull hbox", "LaTeX Warning: ..."),
            ],
            engine: Engine::Tectonic,
            return_code: 1,
        };

        let json = serde_json::to_string(&result).expect("serialize");
        let back: CompileResult = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(back.success, result.success);
        assert_eq!(back.engine, result.engine);
        assert_eq!(back.return_code, result.return_code);
        assert_eq!(back.diagnostics, result.diagnostics);
    }

    #[test]
    fn test_compile_result_severity_filters() {
        let result = CompileResult {
            success: false,
            pdf_path: None,
            log: String::new(),
            diagnostics: vec![
                Diagnostic::error("latex-error", "see raw", "! Something bad"),
                Diagnostic::warning("latex-warning", "citation undefined", "LaTeX Warning: ..."),
            ],
            engine: Engine::Latexmk,
            return_code: 1,
        };

        assert_eq!(result.errors().count(), 1);
        assert_eq!(result.warnings().count(), 1);
    }
}
