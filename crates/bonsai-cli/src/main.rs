use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bonsai_blobstore::StoreConfig;
use bonsai_types::IdDomain;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod commands;

fn cli() -> Command {
    Command::new("bonsai")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Encode, decode and validate bonsai changesets")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .env("BONSAI_CONFIG")
                .value_parser(value_parser!(PathBuf))
                .help("JSON store configuration"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("encode")
                .about("Freeze a JSON changeset and print its id and canonical bytes")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("decode")
                .about("Decode hex canonical bytes into JSON")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("hash")
                .about("Hash raw bytes within a domain")
                .arg(
                    Arg::new("domain")
                        .long("domain")
                        .default_value("content")
                        .value_parser(["content", "changeset"])
                        .help("Hash domain"),
                )
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("check-pcf")
                .about("Check changed paths for path conflicts")
                .arg(
                    Arg::new("paths")
                        .required(true)
                        .num_args(1..)
                        .help("Changed paths"),
                ),
        )
}

fn input_arg() -> Arg {
    Arg::new("input")
        .default_value("-")
        .help("Input file, or - for stdin")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> Result<StoreConfig> {
    let Some(path) = matches.get_one::<PathBuf>("config") else {
        return Ok(StoreConfig::default());
    };
    let raw = std::fs::read(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: StoreConfig = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), ?config, "loaded store config");
    Ok(config)
}

fn read_input(args: &ArgMatches) -> Result<Vec<u8>> {
    let input = args.get_one::<String>("input").map_or("-", String::as_str);
    if input == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading stdin")?;
        Ok(buf)
    } else {
        std::fs::read(input).with_context(|| format!("reading {input}"))
    }
}

fn print_json<T: Serialize>(report: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("encode", args)) => {
            let input = read_input(args)?;
            print_json(&commands::encode(&input, &config).await?)
        }
        Some(("decode", args)) => {
            let input = read_input(args)?;
            let input = String::from_utf8(input).context("hex input is not UTF-8")?;
            print_json(&commands::decode(&input, &config)?)
        }
        Some(("hash", args)) => {
            let domain = match args.get_one::<String>("domain").map(String::as_str) {
                Some("changeset") => IdDomain::Changeset,
                _ => IdDomain::Content,
            };
            let input = read_input(args)?;
            print_json(&commands::hash(&input, domain, &config))
        }
        Some(("check-pcf", args)) => {
            let paths: Vec<&String> = args
                .get_many::<String>("paths")
                .into_iter()
                .flatten()
                .collect();
            let report = commands::check_paths(&paths)?;
            print_json(&report)?;
            if report.conflict.is_some() {
                std::process::exit(1);
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["bonsai", "check-pcf", "a", "a/b", "--json"])
            .unwrap();
        assert!(matches.get_flag("json"));
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "check-pcf");
        assert_eq!(args.get_many::<String>("paths").unwrap().count(), 2);
    }

    #[test]
    fn rejects_unknown_domain() {
        assert!(cli()
            .try_get_matches_from(["bonsai", "hash", "--domain", "tree"])
            .is_err());
    }
}
