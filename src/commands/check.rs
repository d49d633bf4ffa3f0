//! `consolebox check` subcommand: compile without staging or running.

use super::{print_diagnostics, read_source};
use clap::ArgMatches;
use consolebox_sandbox::SandboxConfig;
use lang::{Compiler, CompilerOptions};

pub fn run(matches: &ArgMatches, config: &SandboxConfig) -> anyhow::Result<bool> {
    let (file, source) = read_source(matches)?;
    let compiler = Compiler::new(CompilerOptions {
        warnings_as_errors: config.warnings_as_errors,
        ..Default::default()
    });
    let outcome = compiler.check_only(&source);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_diagnostics(&file, outcome.diagnostics());
        for text in outcome
            .diagnostics()
            .iter()
            .map(|d| d.readable_error_text())
            .filter(|text| !text.is_empty())
        {
            println!("{}", text);
        }
        if outcome.is_ready() {
            println!("{}: ok", file);
        }
    }

    Ok(outcome.is_ready())
}
