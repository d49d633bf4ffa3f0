//! Compiler behaviour on sample programs
mod common;

use lang::ir::{CallTarget, Expr, Stmt};
use lang::{
    complete, decode_artifact, read_artifact, CompilationOutcome, Compiler, CompilerOptions,
    CompletionItemKind, Severity,
};

fn compiler() -> Compiler {
    Compiler::new(CompilerOptions::default())
}

/// Host members called directly by `main`'s expression statements.
fn host_calls(statements: &[Stmt]) -> Vec<String> {
    statements
        .iter()
        .filter_map(|statement| match statement {
            Stmt::Expr {
                expr:
                    Expr::Call {
                        target: CallTarget::Host { member },
                        ..
                    },
                ..
            } => Some(member.qualified_name()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_hello_sample_compiles_and_is_retargeted() {
    let source = common::read_file("tests/samples/hello.cb");
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ConsoleApp_hello.cbx");

    let outcome = compiler().compile(&source, &path);
    assert!(outcome.is_ready(), "{:?}", outcome.diagnostics());
    assert_eq!(
        outcome.artifact().unwrap().assembly_name,
        "ConsoleApp_hello"
    );

    let artifact = read_artifact(&path).unwrap();
    let main = &artifact.functions[artifact.entry_point];
    assert_eq!(main.name, "main");
    assert_eq!(
        host_calls(&main.body),
        vec![
            "Sandbox.Capture.Console.Write".to_string(),
            "Sandbox.Capture.Console.WriteLine".to_string(),
        ]
    );

    let references: Vec<String> = artifact
        .host_references()
        .iter()
        .map(|r| r.qualified_name())
        .collect();
    assert!(references.iter().all(|r| !r.starts_with("System.Console.")));
}

#[test]
fn test_control_flow_sample_compiles() {
    let source = common::read_file("tests/samples/control_flow.cb");
    let outcome = compiler().check_only(&source);
    assert!(outcome.is_ready(), "{:?}", outcome.diagnostics());
    assert!(outcome.diagnostics().is_empty());
}

#[test]
fn test_broken_sample_reports_every_syntax_error() {
    let source = common::read_file("tests/samples/broken.cb");
    let outcome = compiler().check_only(&source);
    let CompilationOutcome::Failed { diagnostics } = outcome else {
        panic!("broken sample compiled");
    };
    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.severity() == Severity::Error));
    assert!(diagnostics[0].span().start_line < diagnostics[1].span().start_line);
    assert_eq!(
        diagnostics[0].readable_error_text(),
        format!("CB1002 | {} | Line: 1", diagnostics[0].message())
    );
}

#[test]
fn test_surviving_console_reference_is_rejected() {
    // Console.Error is not part of the capture surface and does not exist in
    // the sandbox view of System.Console.
    let outcome = compiler().check_only("function main() { let e = System.Console.Error; e(); }");
    assert!(!outcome.is_ready());
    assert_eq!(outcome.diagnostics()[0].id(), "CB0117");
}

#[test]
fn test_set_out_compiles() {
    let outcome = compiler().check_only("function main() { System.Console.SetOut(null); }");
    assert!(outcome.is_ready(), "{:?}", outcome.diagnostics());
}

#[test]
fn test_check_only_matches_compile() {
    let source = "function main() { let unused = 1; System.Console.WriteLine(\"x\"); }";
    let dir = tempfile::tempdir().unwrap();
    let compiled = compiler().compile(source, &dir.path().join("ConsoleApp_a.cbx"));
    let checked = compiler().check_only(source);
    assert_eq!(compiled.diagnostics(), checked.diagnostics());
    assert_eq!(compiled.is_ready(), checked.is_ready());
}

#[test]
fn test_corrupted_artifact_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ConsoleApp_c.cbx");
    assert!(compiler()
        .compile("function main() { System.Console.Write(\"abc\"); }", &path)
        .is_ready());

    let bytes = std::fs::read(&path).unwrap();
    let tampered = String::from_utf8(bytes).unwrap().replace("abc", "xyz");
    assert!(decode_artifact(tampered.as_bytes()).is_err());
}

#[test]
fn test_completion_on_sample() {
    let source = common::read_file("tests/samples/hello.cb");
    let offset = source.find("Console.Write(").unwrap() + "Console.".len();
    let items = complete(&source, offset);
    assert!(items
        .iter()
        .any(|item| item.label == "ReadKey" && item.kind == CompletionItemKind::Method));
    assert!(items.iter().any(|item| item.kind == CompletionItemKind::Keyword));
}
