use clap::{Parser as ClapParser, Subcommand};
use mapq_lang::{
    Config, Registry, Syntax,
    cli::{self, CheckOptions, CheckResult, CliError},
    to_json, to_json_pretty,
};
use std::{
    io::{self, Read},
    path::PathBuf,
};

#[derive(ClapParser)]
#[command(name = "mapq")]
#[command(about = "mapq - A query and mapping language for structured messages")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and execute a query against one message
    Check {
        /// The query to execute
        query: String,

        /// Message content (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<String>,

        /// Message metadata as key=value, may be repeated
        #[arg(short, long = "meta")]
        meta: Vec<String>,

        /// Parse with the deprecated grammar
        #[arg(long)]
        deprecated: bool,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Only validate syntax, don't execute
        #[arg(long)]
        syntax_only: bool,
    },

    /// List the available functions and methods
    Functions,
}

fn main() {
    let cli = Cli::parse();

    let result = load_config(cli.config.as_ref()).and_then(|config| {
        init_logging(&config);
        let registry = Registry::with_builtins()?;
        match cli.command {
            Commands::Check {
                query,
                input,
                meta,
                deprecated,
                pretty,
                syntax_only,
            } => {
                let metadata = meta
                    .iter()
                    .map(|m| cli::parse_metadata(m))
                    .collect::<Result<Vec<_>, _>>()?;
                let syntax = if deprecated {
                    Syntax::Deprecated
                } else {
                    config.parser.syntax
                };
                let options = CheckOptions {
                    query,
                    input,
                    metadata,
                    syntax,
                    allow_trailing: config.parser.allow_trailing,
                    max_depth: Some(config.parser.max_depth),
                    syntax_only,
                };
                run_check(&registry, options, pretty)
            }
            Commands::Functions => {
                print!("{}", cli::functions_listing(&registry));
                Ok(())
            }
        }
    });

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, CliError> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}

/// `RUST_LOG` takes precedence over the configured level
fn init_logging(config: &Config) {
    let level = config
        .log
        .level_filter()
        .unwrap_or(log::LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run_check(registry: &Registry, mut options: CheckOptions, pretty: bool) -> Result<(), CliError> {
    if options.input.is_none() && !options.syntax_only && !atty::is(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        options.input = Some(buffer);
    }

    match cli::execute_check(registry, &options)? {
        CheckResult::SyntaxValid => println!("Syntax is valid"),
        CheckResult::Success(output) if pretty => println!("{}", to_json_pretty(&output)),
        CheckResult::Success(output) => println!("{}", to_json(&output)),
    }
    Ok(())
}
