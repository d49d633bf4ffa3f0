//! Two-pass compilation
//!
//! Pass 1 binds the user's tree against the full reference set so that the
//! console rewriter can match by symbol. Pass 2 re-binds the rewritten tree
//! against the sandbox reference set; its diagnostics are the ones reported
//! and its model drives emission.

use crate::ast::Program;
use crate::binder::{bind, Binding};
use crate::diagnostics::{sort_by_position, Diagnostic};
use crate::emit::{encode_artifact, write_artifact, Emitter};
use crate::ir::Artifact;
use crate::lexer::Lexer;
use crate::library::ReferenceSet;
use crate::parser::Parser;
use crate::rewriter::ConsoleRewriter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerOptions {
    pub assembly_name: String,
    pub warnings_as_errors: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            assembly_name: "ConsoleApp".to_string(),
            warnings_as_errors: false,
        }
    }
}

/// Where the emitted artifact went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub assembly_name: String,
    /// `None` for in-memory emission
    pub location: Option<PathBuf>,
    pub size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompilationOutcome {
    Ready {
        artifact: ArtifactHandle,
        diagnostics: Vec<Diagnostic>,
    },
    Failed {
        diagnostics: Vec<Diagnostic>,
    },
}

impl CompilationOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, CompilationOutcome::Ready { .. })
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompilationOutcome::Ready { diagnostics, .. }
            | CompilationOutcome::Failed { diagnostics } => diagnostics,
        }
    }

    pub fn artifact(&self) -> Option<&ArtifactHandle> {
        match self {
            CompilationOutcome::Ready { artifact, .. } => Some(artifact),
            CompilationOutcome::Failed { .. } => None,
        }
    }
}

/// Compiles source text into executable artifacts.
pub struct Compiler {
    options: CompilerOptions,
    analysis: ReferenceSet,
    sandbox: ReferenceSet,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            analysis: ReferenceSet::analysis(),
            sandbox: ReferenceSet::sandbox(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile `source` and write the artifact to `destination`.
    ///
    /// The artifact is named after the destination's file stem.
    pub fn compile(&self, source: &str, destination: &Path) -> CompilationOutcome {
        let assembly_name = destination
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.options.assembly_name.clone());
        let (artifact, diagnostics) = match self.compile_core(source, &assembly_name) {
            Ok(compiled) => compiled,
            Err(diagnostics) => return CompilationOutcome::Failed { diagnostics },
        };

        match write_artifact(destination, &artifact) {
            Ok(size_bytes) => {
                debug!(path = %destination.display(), size_bytes, "artifact written");
                CompilationOutcome::Ready {
                    artifact: ArtifactHandle {
                        assembly_name: artifact.assembly_name,
                        location: Some(destination.to_path_buf()),
                        size_bytes,
                    },
                    diagnostics,
                }
            }
            Err(error) => {
                warn!(path = %destination.display(), %error, "failed to write artifact");
                emit_failure(diagnostics, &error.to_string())
            }
        }
    }

    /// Same compilation as [`Compiler::compile`], emitting into memory only.
    pub fn check_only(&self, source: &str) -> CompilationOutcome {
        let (artifact, diagnostics) = match self.compile_core(source, &self.options.assembly_name) {
            Ok(compiled) => compiled,
            Err(diagnostics) => return CompilationOutcome::Failed { diagnostics },
        };

        match encode_artifact(&artifact) {
            Ok(bytes) => CompilationOutcome::Ready {
                artifact: ArtifactHandle {
                    assembly_name: artifact.assembly_name,
                    location: None,
                    size_bytes: bytes.len(),
                },
                diagnostics,
            },
            Err(error) => emit_failure(diagnostics, &error.to_string()),
        }
    }

    /// Parse, bind, rewrite, re-bind and lower. `Err` carries the diagnostics
    /// of a compilation that must not produce an artifact.
    fn compile_core(
        &self,
        source: &str,
        assembly_name: &str,
    ) -> Result<(Artifact, Vec<Diagnostic>), Vec<Diagnostic>> {
        let program = parse_source(source)?;

        let first_pass = bind(&program, &self.analysis);
        let (rewritten, replaced) = ConsoleRewriter::new(&first_pass.model).rewrite(program);
        debug!(replaced, "console references retargeted");

        let Binding { model, diagnostics } = bind(&rewritten, &self.sandbox);
        let diagnostics = self.finish_diagnostics(diagnostics);
        if diagnostics.iter().any(Diagnostic::is_fatal) {
            return Err(diagnostics);
        }

        match Emitter::new(&model).emit(&rewritten, assembly_name) {
            Ok(artifact) => Ok((artifact, diagnostics)),
            Err(error) => Err(with_emit_error(diagnostics, &error.to_string())),
        }
    }

    fn finish_diagnostics(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        let mut diagnostics: Vec<Diagnostic> = if self.options.warnings_as_errors {
            diagnostics.into_iter().map(Diagnostic::escalate).collect()
        } else {
            diagnostics
        };
        sort_by_position(&mut diagnostics);
        diagnostics
    }
}

/// Lex and parse, reporting every lexical and syntax error.
fn parse_source(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let (tokens, lex_errors) = Lexer::new(source).tokenize_with_errors();
    let (program, parse_errors) = Parser::new(tokens).parse_with_recovery();

    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .iter()
        .chain(parse_errors.iter())
        .map(Diagnostic::from)
        .collect();
    if diagnostics.is_empty() {
        return Ok(program);
    }
    sort_by_position(&mut diagnostics);
    Err(diagnostics)
}

fn with_emit_error(mut diagnostics: Vec<Diagnostic>, message: &str) -> Vec<Diagnostic> {
    diagnostics.push(Diagnostic::error(
        "CB7038",
        format!("Failed to emit module: {}", message),
        Default::default(),
    ));
    diagnostics
}

fn emit_failure(diagnostics: Vec<Diagnostic>, message: &str) -> CompilationOutcome {
    CompilationOutcome::Failed {
        diagnostics: with_emit_error(diagnostics, message),
    }
}
