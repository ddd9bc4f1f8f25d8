use anyhow::{bail, Context, Result};
use clap::Parser;
use gqlsql::cgi::{render, CgiRequest};
use gqlsql::db::{open_source, split_tables, ConnectionConfig, Response};
use gqlsql::export::{to_csv, to_html, to_json, to_tsv, OutputFormat};
use gqlsql::{Dialect, Executor};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Run Google visualization queries against a SQL database
///
/// Without queries the program answers a single CGI request taken from
/// QUERY_STRING.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// DB URL (postgresql://user:pw@host:port/db) or config file
    /// [default: <config dir>/gqlsql/config.toml]
    source: Option<String>,

    /// Queries to run
    queries: Vec<String>,

    /// Table used by bare column names
    #[arg(short = 'd', long = "default-table")]
    default_table: Option<String>,

    /// Additional tables queries may reference (space, comma or semicolon separated)
    #[arg(short = 't', long = "tables")]
    tables: Option<String>,

    /// Allow functions outside the standard query language
    #[arg(short = 'e', long = "extended")]
    extended: bool,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    format: Option<OutputFormat>,

    /// Print the SQL for this dialect instead of running the queries
    #[arg(long = "translate", value_name = "DIALECT")]
    translate: Option<Dialect>,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so CGI replies on stdout stay clean
    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cgi = cli.queries.is_empty();
    if cgi && cli.format.is_some() {
        bail!("the --format option is not supported in cgi mode");
    }

    let mut config = match &cli.source {
        Some(source) => ConnectionConfig::from_source(source)?,
        None => ConnectionConfig::load(&ConnectionConfig::get_config_path())?,
    }
    .with_env_password();
    if let Some(table) = &cli.default_table {
        config.default_table = table.clone();
    }
    if let Some(tables) = &cli.tables {
        config.tables = split_tables(tables);
    }
    if cli.extended {
        config.extended = true;
    }

    if let Some(dialect) = cli.translate {
        return translate(&config, dialect, &cli.queries);
    }

    let mut executor = Executor::new(open_source(&config), config.translator());
    executor.connect().await;

    let mut stdout = std::io::stdout().lock();
    if cgi {
        let query_string = std::env::var("QUERY_STRING")
            .context("CGI query not found (QUERY_STRING env variable not set)")?;
        let request = CgiRequest::parse(&query_string);
        let response = executor.execute(&request.query).await;
        stdout.write_all(&render(&request, response, &config.default_table))?;
    } else {
        let format = cli.format.unwrap_or_default();
        for query in &cli.queries {
            let response = executor.execute(query).await;
            write_response(&mut stdout, format, &response, &config.default_table)?;
        }
    }
    stdout.flush()?;
    Ok(())
}

fn write_response(
    out: &mut impl Write,
    format: OutputFormat,
    response: &Response,
    title: &str,
) -> Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "{}", to_json(response))?,
        OutputFormat::Csv => out.write_all(to_csv(response).as_bytes())?,
        OutputFormat::Tsv => out.write_all(&to_tsv(response))?,
        OutputFormat::Html => out.write_all(to_html(response, title).as_bytes())?,
    }
    Ok(())
}

fn translate(config: &ConnectionConfig, dialect: Dialect, queries: &[String]) -> Result<()> {
    let mut translator = config.translator();
    translator.dialect = dialect;

    let mut failed = false;
    for query in queries {
        let translation = translator.translate(query);
        match &translation.error {
            None => println!("{}", translation.sql),
            Some(err) => {
                eprintln!("{}: {}", query, err);
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
    Ok(())
}
