//! Diagnostic rule engine for LaTeX compilation logs.
//!
//! [`LogAnalyzer`] holds an ordered registry of (pattern, handler) rules.
//! [`LogAnalyzer::analyze`] applies every primary rule over all
//! non-overlapping occurrences in the log, in registration order; fallback
//! rules contribute only when no primary rule produced an error-level
//! finding, so a failed compile always yields at least one diagnostic
//! without drowning specific findings in generic ones.

use crate::model::{Diagnostic, Severity};
use regex::{Captures, Regex};

/// Handler invoked once per pattern occurrence; may emit zero or more
/// diagnostics for it.
pub type RuleHandler = Box<dyn Fn(&Captures<'_>) -> Vec<Diagnostic> + Send + Sync>;

struct Rule {
    pattern: Regex,
    handler: RuleHandler,
    fallback: bool,
}

/// Ordered, extensible registry of log-analysis rules.
///
/// Safe to share across threads for concurrent `analyze` calls; rule
/// registration requires exclusive access.
pub struct LogAnalyzer {
    rules: Vec<Rule>,
}

impl LogAnalyzer {
    /// Analyzer with the built-in LaTeX rules registered.
    pub fn new() -> Self {
        let mut analyzer = Self::empty();
        analyzer.register_builtin_rules();
        analyzer
    }

    /// Analyzer with no rules; useful for testing custom rule sets.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    fn register_builtin_rules(&mut self) {
        // "Undefined control sequence", optionally followed by the
        // `l.<n> \cmd` echo naming the offending token.
        self.add_rule(
            Regex::new(r"Undefined control sequence[^\n]*(?:\nl\.\d+\s+(\\[a-zA-Z@]+[a-zA-Z0-9@]*))?")
                .expect("built-in pattern"),
            handle_undefined_control_sequence,
        );

        // Missing .sty file in the preamble.
        self.add_rule(
            Regex::new(r"LaTeX Error: File `([^']+\.sty)' not found").expect("built-in pattern"),
            handle_missing_package,
        );

        // Runaway argument: unclosed brace or environment.
        self.add_rule(
            Regex::new(r"Runaway argument\??").expect("built-in pattern"),
            handle_runaway_argument,
        );

        // Warning lines; attached even on successful compiles.
        self.add_rule(
            Regex::new(r"(?m)^LaTeX Warning: (.+)$").expect("built-in pattern"),
            handle_latex_warning,
        );

        // Generic `!` error line; safety net when nothing specific matched.
        self.add_fallback_rule(
            Regex::new(r"(?m)^!(.*)$").expect("built-in pattern"),
            handle_generic_error,
        );
    }

    /// Register a primary rule. Rules run in registration order and their
    /// findings append in that order.
    pub fn add_rule(
        &mut self,
        pattern: Regex,
        handler: impl Fn(&Captures<'_>) -> Vec<Diagnostic> + Send + Sync + 'static,
    ) {
        self.rules.push(Rule {
            pattern,
            handler: Box::new(handler),
            fallback: false,
        });
    }

    /// Register a fallback rule. Fallback rules run only when no primary
    /// rule produced an error-level finding, and contribute at most one
    /// occurrence per analysis.
    pub fn add_fallback_rule(
        &mut self,
        pattern: Regex,
        handler: impl Fn(&Captures<'_>) -> Vec<Diagnostic> + Send + Sync + 'static,
    ) {
        self.rules.push(Rule {
            pattern,
            handler: Box::new(handler),
            fallback: true,
        });
    }

    /// Extract diagnostics from a compilation log.
    ///
    /// Deterministic and side-effect free: the same log always yields the
    /// same ordered sequence.
    pub fn analyze(&self, log: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        for rule in self.rules.iter().filter(|r| !r.fallback) {
            for caps in rule.pattern.captures_iter(log) {
                diagnostics.extend((rule.handler)(&caps));
            }
        }

        let has_error = diagnostics.iter().any(|d| d.level == Severity::Error);
        if !has_error {
            for rule in self.rules.iter().filter(|r| r.fallback) {
                if let Some(caps) = rule.pattern.captures(log) {
                    let produced = (rule.handler)(&caps);
                    if !produced.is_empty() {
                        diagnostics.extend(produced);
                        break;
                    }
                }
            }
        }

        diagnostics
    }
}

impl Default for LogAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_undefined_control_sequence(caps: &Captures<'_>) -> Vec<Diagnostic> {
    let raw = caps[0].trim();
    let message = match caps.get(1) {
        Some(token) => format!(
            "Undefined control sequence '{}'. Check for typos or a missing \
             \\usepackage/\\newcommand.",
            token.as_str()
        ),
        None => "Undefined control sequence. Check for typos or a missing \
                 \\usepackage/\\newcommand."
            .to_string(),
    };
    vec![Diagnostic::error("undefined-control-sequence", message, raw)]
}

fn handle_missing_package(caps: &Captures<'_>) -> Vec<Diagnostic> {
    let package = &caps[1];
    let raw = caps[0].trim();
    vec![Diagnostic::error(
        "missing-package",
        format!(
            "Missing package file '{package}'. Install the corresponding LaTeX \
             package or adjust your preamble."
        ),
        raw,
    )]
}

fn handle_runaway_argument(caps: &Captures<'_>) -> Vec<Diagnostic> {
    vec![Diagnostic::error(
        "runaway-argument",
        "Runaway argument: likely an unclosed brace or environment. Check for \
         a missing '}' or \\end{...} above.",
        caps[0].trim(),
    )]
}

fn handle_latex_warning(caps: &Captures<'_>) -> Vec<Diagnostic> {
    vec![Diagnostic::warning(
        "latex-warning",
        format!("LaTeX warning: {}", caps[1].trim()),
        caps[0].trim(),
    )]
}

fn handle_generic_error(caps: &Captures<'_>) -> Vec<Diagnostic> {
    vec![Diagnostic::error(
        "latex-error",
        "LaTeX reported an error; see the raw excerpt for details.",
        caps[0].trim(),
    )]
}
