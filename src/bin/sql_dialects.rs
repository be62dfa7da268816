use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sql_dialects::prelude::*;

/// Resolve SQL template directories for one dialect and print what would run.
#[derive(Debug, Parser)]
#[command(name = "sql-dialects", version, about)]
struct Cli {
    /// Target dialect.
    #[arg(long, value_enum)]
    dialect: Dialect,

    /// Template group as `<group>=<dir>`; repeat for several groups.
    #[arg(long = "source", value_name = "GROUP=DIR", required = true, value_parser = parse_source)]
    sources: Vec<(String, PathBuf)>,

    /// Print only the statement keys.
    #[arg(long)]
    keys_only: bool,
}

fn parse_source(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((group, dir)) if !group.is_empty() && !dir.is_empty() => {
            Ok((group.to_string(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected <group>=<dir>, got `{raw}`")),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let sources = cli
        .sources
        .into_iter()
        .map(|(group, dir)| TemplateSource::dir(group, dir))
        .collect();

    let registry = match TemplateLoader::new(cli.dialect).load(sources) {
        Ok(registry) => registry,
        Err(e) => {
            tracing::error!(error = %e, "loading templates failed");
            return ExitCode::FAILURE;
        }
    };

    for key in registry.keys() {
        if cli.keys_only {
            println!("{key}");
        } else if let Some(sql) = registry.get(key) {
            println!("-- {key}\n{}\n", sql.trim_end());
        }
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_argument_needs_group_and_dir() {
        assert_eq!(
            parse_source("users=sql/users").unwrap(),
            ("users".to_string(), PathBuf::from("sql/users"))
        );
        assert!(parse_source("users").is_err());
        assert!(parse_source("=dir").is_err());
    }
}
