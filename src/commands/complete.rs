//! `consolebox complete` subcommand: completion candidates as JSON.

use super::read_source;
use anyhow::bail;
use clap::ArgMatches;

pub fn run(matches: &ArgMatches) -> anyhow::Result<bool> {
    let (_, source) = read_source(matches)?;
    let offset = matches.get_one::<usize>("offset").copied().unwrap_or(0);
    let length = source.chars().count();
    if offset > length {
        bail!("offset {} is past the end of the source ({} characters)", offset, length);
    }

    let items = lang::complete(&source, offset);
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(true)
}
