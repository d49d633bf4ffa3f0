//! `consolebox run` subcommand: compile, stage and execute in a session.

use super::{print_diagnostics, read_source};
use clap::ArgMatches;
use consolebox_sandbox::{ExecutionOutcome, SandboxConfig, Session};
use std::io::Write;
use tracing::debug;

pub async fn run(matches: &ArgMatches, mut config: SandboxConfig) -> anyhow::Result<bool> {
    let (file, source) = read_source(matches)?;
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.time_budget_ms = *timeout;
    }
    let repeat = matches.get_one::<u32>("repeat").copied().unwrap_or(1);
    let json = matches.get_flag("json");
    debug!(file = %file, repeat, budget_ms = config.time_budget_ms, "running program");

    let mut session = Session::new(config)?;
    let compiled = session.compile(&source)?;
    print_diagnostics(&file, compiled.diagnostics());
    if !compiled.is_ready() {
        return Ok(false);
    }

    let mut all_succeeded = true;
    for _ in 0..repeat {
        let outcome = session.execute().await?;
        all_succeeded &= outcome.is_success();
        report(&outcome, json)?;
        if outcome.is_timeout() {
            // The domain is abandoned; nothing else can run in it.
            break;
        }
    }

    if json {
        eprintln!("{}", serde_json::to_string(session.stats())?);
    }
    session.recycle();
    Ok(all_succeeded)
}

fn report(outcome: &ExecutionOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        ExecutionOutcome::Success { output, .. } => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
        }
        ExecutionOutcome::Timeout => {
            eprintln!("Execution exceeded its time budget and was abandoned.");
        }
        ExecutionOutcome::Failure(failure) => {
            eprintln!("Unhandled exception. {}: {}", failure.type_name, failure.message);
            if !failure.stack_trace.is_empty() {
                eprintln!("{}", failure.stack_trace);
            }
        }
    }
    Ok(())
}
