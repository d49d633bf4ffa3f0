pub mod check;
pub mod complete;
pub mod run;

use anyhow::Context;
use clap::ArgMatches;

/// Read the `--file` argument's contents.
pub fn read_source(matches: &ArgMatches) -> anyhow::Result<(String, String)> {
    let file = matches
        .get_one::<String>("file")
        .context("--file is required")?;
    let source = std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file))?;
    Ok((file.clone(), source))
}

/// Print diagnostics in `file(line,col): severity ID: message` form.
pub fn print_diagnostics(file: &str, diagnostics: &[lang::Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}{}", file, diagnostic);
    }
}
