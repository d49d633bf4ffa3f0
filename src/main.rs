#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Arg, ArgAction, Command};
use consolebox_sandbox::{LogFormat, SandboxConfig};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn file_arg() -> Arg {
    Arg::new("file")
        .short('f')
        .long("file")
        .value_name("FILE")
        .help("Program source file")
        .required(true)
}

#[tokio::main]
async fn main() {
    let matches = Command::new("consolebox")
        .version(VERSION)
        .about("ConsoleBox - compile and run console programs in a time-boxed sandbox")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("CONFIG")
                .help("TOML configuration file")
                .global(true),
        )
        .subcommand(
            Command::new("check")
                .about("Compile a program and report diagnostics without running it")
                .arg(file_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print diagnostics as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Compile a program and execute it in an isolation domain")
                .arg(file_arg())
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("MS")
                        .help("Time budget in milliseconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    Arg::new("repeat")
                        .short('n')
                        .long("repeat")
                        .value_name("COUNT")
                        .help("Execute the staged program this many times")
                        .value_parser(clap::value_parser!(u32).range(1..))
                        .default_value("1"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the execution outcome as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("complete")
                .about("List completion candidates at a source offset")
                .arg(file_arg())
                .arg(
                    Arg::new("offset")
                        .short('o')
                        .long("offset")
                        .value_name("OFFSET")
                        .help("Character offset of the caret")
                        .value_parser(clap::value_parser!(usize))
                        .required(true),
                ),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let config = match SandboxConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(&config);

    let result = match matches.subcommand() {
        Some(("check", sub_matches)) => commands::check::run(sub_matches, &config),
        Some(("run", sub_matches)) => commands::run::run(sub_matches, config).await,
        Some(("complete", sub_matches)) => commands::complete::run(sub_matches),
        _ => {
            println!("ConsoleBox v{}", VERSION);
            println!("Use --help for available commands");
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Logs go to stderr; stdout carries program output.
fn init_tracing(config: &SandboxConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}
