//! Engine resolution against the executable search path.
//!
//! Lookup goes through the [`PathResolver`] trait so tests can substitute a
//! fake environment; the production [`SystemPath`] resolver scans `PATH` at
//! call time and caches nothing.

use crate::model::{Engine, EngineConfig};
use std::path::PathBuf;
use tracing::debug;

/// Executable lookup capability.
pub trait PathResolver: Send + Sync {
    /// Locate `binary` on the search path, returning its full path.
    fn locate(&self, binary: &str) -> Option<PathBuf>;
}

/// Resolver backed by the process's `PATH` environment variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPath;

impl PathResolver for SystemPath {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path)
            .map(|dir| dir.join(binary))
            .find(|candidate| candidate.is_file())
    }
}

/// Engine selection errors; these are caller-facing configuration errors,
/// never part of a `CompileResult`.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("engine '{0}' not found on the search path")]
    EngineNotFound(Engine),

    #[error("engine binary does not exist: {0}")]
    BinaryNotFound(PathBuf),

    #[error("no supported engine available (tried tectonic, latexmk)")]
    NoEngineAvailable,
}

/// A concrete, invocable engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEngine {
    /// Engine identifier.
    pub engine: Engine,

    /// Full path to the engine binary.
    pub binary: PathBuf,
}

/// Resolve the engine for one compile call.
///
/// An explicit request is verified (honouring a binary override when set);
/// with no request, [`Engine::DETECTION_ORDER`] is probed and the first
/// locatable engine wins.
pub fn resolve_engine(
    requested: Option<&EngineConfig>,
    resolver: &dyn PathResolver,
) -> Result<ResolvedEngine, ResolveError> {
    match requested {
        Some(config) => {
            let binary = match &config.binary {
                Some(path) => {
                    if !path.is_file() {
                        return Err(ResolveError::BinaryNotFound(path.clone()));
                    }
                    path.clone()
                }
                None => resolver
                    .locate(config.engine.name())
                    .ok_or(ResolveError::EngineNotFound(config.engine))?,
            };
            debug!(engine = %config.engine, binary = %binary.display(), "resolved requested engine");
            Ok(ResolvedEngine {
                engine: config.engine,
                binary,
            })
        }
        None => {
            for engine in Engine::DETECTION_ORDER {
                if let Some(binary) = resolver.locate(engine.name()) {
                    debug!(engine = %engine, binary = %binary.display(), "auto-detected engine");
                    return Ok(ResolvedEngine { engine, binary });
                }
            }
            Err(ResolveError::NoEngineAvailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fake resolver over a fixed binary table.
    struct FakePath(HashMap<&'static str, PathBuf>);

    impl FakePath {
        fn with(binaries: &[&'static str]) -> Self {
            Self(
                binaries
                    .iter()
                    .map(|name| (*name, PathBuf::from(format!("/fake/bin/{name}"))))
                    .collect(),
            )
        }
    }

    impl PathResolver for FakePath {
        fn locate(&self, binary: &str) -> Option<PathBuf> {
            self.0.get(binary).cloned()
        }
    }

    #[test]
    fn test_explicit_request_found() {
        let resolver = FakePath::with(&["latexmk"]);
        let config = EngineConfig::new(Engine::Latexmk);

        let resolved = resolve_engine(Some(&config), &resolver).expect("resolve failed");
        assert_eq!(resolved.engine, Engine::Latexmk);
        assert_eq!(resolved.binary, PathBuf::from("/fake/bin/latexmk"));
    }

    #[test]
    fn test_explicit_request_missing() {
        let resolver = FakePath::with(&["latexmk"]);
        let config = EngineConfig::new(Engine::Tectonic);

        let err = resolve_engine(Some(&config), &resolver).unwrap_err();
        assert!(matches!(err, ResolveError::EngineNotFound(Engine::Tectonic)));
    }

    #[test]
    fn test_auto_detect_prefers_tectonic() {
        let resolver = FakePath::with(&["tectonic", "latexmk"]);

        let resolved = resolve_engine(None, &resolver).expect("resolve failed");
        assert_eq!(resolved.engine, Engine::Tectonic);
    }

    #[test]
    fn test_auto_detect_falls_back_to_latexmk() {
        let resolver = FakePath::with(&["latexmk"]);

        let resolved = resolve_engine(None, &resolver).expect("resolve failed");
        assert_eq!(resolved.engine, Engine::Latexmk);
    }

    #[test]
    fn test_auto_detect_none_available() {
        let resolver = FakePath::with(&[]);

        let err = resolve_engine(None, &resolver).unwrap_err();
        assert!(matches!(err, ResolveError::NoEngineAvailable));
    }

    #[test]
    fn test_binary_override_must_exist() {
        let resolver = FakePath::with(&[]);
        let config = EngineConfig::new(Engine::Tectonic)
            .with_binary(PathBuf::from("/nonexistent/tectonic"));

        let err = resolve_engine(Some(&config), &resolver).unwrap_err();
        assert!(matches!(err, ResolveError::BinaryNotFound(_)));
    }

    #[test]
    fn test_binary_override_is_used() {
        let dir = tempfile::tempdir().expect("tempdir");
        let binary = dir.path().join("tectonic");
        std::fs::write(&binary, "#!/bin/sh\n").expect("write");

        // Resolver knows nothing; the override carries the lookup.
        let resolver = FakePath::with(&[]);
        let config = EngineConfig::new(Engine::Tectonic).with_binary(binary.clone());

        let resolved = resolve_engine(Some(&config), &resolver).expect("resolve failed");
        assert_eq!(resolved.binary, binary);
    }
}
