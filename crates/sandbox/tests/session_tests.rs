//! End-to-end session behaviour: compile, execute, time out and recycle.

use consolebox_sandbox::{ExecutionOutcome, SandboxConfig, Session, SessionError, SessionState};
use tempfile::TempDir;

fn session_with_budget(dir: &TempDir, time_budget_ms: u64) -> Session {
    Session::new(SandboxConfig {
        work_dir: dir.path().to_path_buf(),
        time_budget_ms,
        poll_interval_ms: 5,
        ..Default::default()
    })
    .unwrap()
}

fn session(dir: &TempDir) -> Session {
    session_with_budget(dir, 5_000)
}

async fn run_once(source: &str) -> ExecutionOutcome {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&dir);
    let compiled = session.compile(source).unwrap();
    assert!(compiled.is_ready(), "{:?}", compiled.diagnostics());
    session.execute().await.unwrap()
}

async fn expect_security_exception(source: &str) {
    let outcome = run_once(source).await;
    let failure = outcome
        .failure_info()
        .unwrap_or_else(|| panic!("expected failure, got {:?}", outcome));
    assert_eq!(failure.type_name, "System.Security.SecurityException");
    assert!(failure.message.starts_with("Request for the permission of type"));
}

#[tokio::test]
async fn test_repeated_compile_run_recycle_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&dir);

    for _ in 0..50 {
        let compiled = session
            .compile("function main() { System.Console.WriteLine(\"Hi\"); }")
            .unwrap();
        assert!(compiled.is_ready());

        for _ in 0..2 {
            let outcome = session.execute().await.unwrap();
            assert_eq!(outcome.output(), Some("Hi\n"));
        }
        session.recycle();
        assert_eq!(session.state(), SessionState::Empty);
    }

    assert_eq!(session.stats().runs, 100);
    assert_eq!(session.stats().successes, 100);
}

#[tokio::test]
async fn test_output_is_exact_concatenation() {
    let outcome = run_once(
        r#"
        function main() {
            System.Console.Write("a");
            System.Console.WriteLine("b");
            System.Console.Write(1 + 2);
            System.Console.WriteLine();
        }
        "#,
    )
    .await;
    assert_eq!(outcome.output(), Some("ab\n3\n"));
}

#[tokio::test]
async fn test_uncaught_exception_is_reported() {
    let outcome = run_once(
        "using System;\nfunction main() {\n    Console.Write(\"lost\");\n    throw new InvalidOperationException(\"boom\");\n}",
    )
    .await;

    let failure = outcome.failure_info().unwrap();
    assert_eq!(failure.type_name, "System.InvalidOperationException");
    assert_eq!(failure.message, "boom");
    assert_eq!(failure.stack_trace, "   at main() in line 4");
    assert_eq!(outcome.output(), None);
}

#[tokio::test]
async fn test_sleep_past_budget_times_out_and_recycle_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with_budget(&dir, 300);

    session
        .compile("function main() { System.Threading.Thread.Sleep(10000); }")
        .unwrap();
    let started = std::time::Instant::now();
    let outcome = session.execute().await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Timeout);
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
    assert_eq!(session.stats().timeouts, 1);

    assert!(matches!(
        session.execute().await,
        Err(SessionError::DomainAbandoned(_))
    ));

    session.recycle();
    session
        .compile("function main() { System.Console.Write(\"back\"); }")
        .unwrap();
    let outcome = session.execute().await.unwrap();
    assert_eq!(outcome.output(), Some("back"));
}

#[tokio::test]
async fn test_blocking_reads_time_out() {
    for source in [
        "function main() { let line = System.Console.ReadLine(); System.Console.Write(line); }",
        "function main() { System.Console.Read(); }",
        "function main() { System.Console.Write(\"a\"); System.Console.ReadKey(); }",
    ] {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with_budget(&dir, 200);
        session.compile(source).unwrap();
        assert_eq!(session.execute().await.unwrap(), ExecutionOutcome::Timeout, "{}", source);
    }
}

#[tokio::test]
async fn test_redirecting_the_real_console_is_denied() {
    expect_security_exception("function main() { System.Console.SetOut(null); }").await;
}

#[tokio::test]
async fn test_console_in_is_denied() {
    expect_security_exception("function main() { let reader = System.Console.In; }").await;
}

#[tokio::test]
async fn test_read_key_is_denied() {
    expect_security_exception("function main() { System.Console.ReadKey(true); }").await;
}

#[tokio::test]
async fn test_file_outside_allow_list_is_denied() {
    expect_security_exception(
        "function main() { System.Console.Write(System.IO.File.ReadAllText(\"/etc/passwd\")); }",
    )
    .await;
}

#[tokio::test]
async fn test_network_is_denied() {
    expect_security_exception(
        "function main() { System.Net.Dns.GetHostAddresses(\"example.com\"); }",
    )
    .await;
}

#[tokio::test]
async fn test_user_defined_write_line_is_not_retargeted() {
    let outcome = run_once(
        r#"
        using static System.Console;

        class Log {
            function WriteLine(text) {
                Write("[" + text + "]");
            }
        }

        function WriteLine(text) {
            Write("<" + text + ">");
        }

        function main() {
            WriteLine("x");
            Log.WriteLine("y");
        }
        "#,
    )
    .await;
    assert_eq!(outcome.output(), Some("<x>[y]"));
}

#[tokio::test]
async fn test_user_sandbox_names_leave_capture_intact() {
    for source in [
        "using System;\nfunction main() { let Sandbox = 1; Console.Write(\"x\"); }",
        "function Sandbox() { }\nfunction main() { System.Console.Write(\"x\"); }",
    ] {
        let outcome = run_once(source).await;
        assert_eq!(outcome.output(), Some("x"), "{}: {:?}", source, outcome);
    }
}

#[tokio::test]
async fn test_every_console_spelling_reaches_capture() {
    let outcome = run_once(
        r#"
        using System;
        using static System.Console;

        function main() {
            WriteLine("static");
            let print = Console.WriteLine;
            print("delegate");
            Console.Out.WriteLine("writer");
            System.Console.Write("qualified");
        }
        "#,
    )
    .await;
    assert_eq!(outcome.output(), Some("static\ndelegate\nwriter\nqualified"));
}

#[tokio::test]
async fn test_composite_formatting() {
    let outcome =
        run_once("function main() { System.Console.WriteLine(\"{0} + {1} = {2}\", 1, 2, 1 + 2); }")
            .await;
    assert_eq!(outcome.output(), Some("1 + 2 = 3\n"));
}

#[tokio::test]
async fn test_usage_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session(&dir);

    assert!(matches!(session.execute().await, Err(SessionError::NotCompiled)));

    let failed = session.compile("function main() { missing(); }").unwrap();
    assert!(!failed.is_ready());
    assert!(!session.is_ready());
    assert!(matches!(session.execute().await, Err(SessionError::NotCompiled)));

    session.compile("function main() { }").unwrap();
    assert!(matches!(
        session.compile("function main() { }"),
        Err(SessionError::AlreadyCompiled)
    ));
}

#[tokio::test]
async fn test_completion_is_independent_of_state() {
    let dir = tempfile::tempdir().unwrap();
    let session = session(&dir);
    let source = "function main() { System.Console. }";
    let offset = source.find(". }").unwrap() + 1;

    let items = session.complete(source, offset);
    assert!(items.iter().any(|item| item.label == "WriteLine"));
}
