pub mod ast;
pub mod binder;
pub mod compiler;
pub mod completion;
pub mod diagnostics;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod library;
pub mod parser;
pub mod rewriter;

pub use binder::{bind, SemanticModel, Symbol};
pub use compiler::{ArtifactHandle, CompilationOutcome, Compiler, CompilerOptions};
pub use completion::{complete, CompletionItem, CompletionItemKind};
pub use diagnostics::{Diagnostic, EditorRange, LineSpan, Severity};
pub use emit::{decode_artifact, encode_artifact, read_artifact, write_artifact};
pub use error::{EmitError, LangError, Result};
pub use ir::{Artifact, HostMemberRef};
pub use library::ReferenceSet;
pub use rewriter::ConsoleRewriter;
