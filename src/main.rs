use banded_report::cli::{self, CliError, RunOptions};
use clap::{Parser as ClapParser, Subcommand};
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "banded")]
#[command(about = "Banded report engine - grouped, paginated text reports from JSON rows")]
#[command(version)]
struct Cli {
    /// Log traversal decisions (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the syntax of an expression
    Check {
        /// The expression to parse
        expression: String,
    },

    /// Generate a report
    Run {
        /// JSON template definition
        #[arg(short, long)]
        template: PathBuf,

        /// JSON array of rows (reads from stdin if not provided)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// JSON object mapping subreport sources to row arrays
        #[arg(short, long)]
        subreports: Option<PathBuf>,

        /// TOML engine configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Report parameter, NAME=VALUE (repeatable)
        #[arg(short, long = "param")]
        param: Vec<String>,

        /// Override the page height
        #[arg(long)]
        lines_per_page: Option<usize>,

        /// Print a marker for undeclared fields instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Show documentation (overview, or one topic)
    Docs {
        /// Topic name (use 'banded docs' to list topics)
        topic: Option<String>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Check { expression } => run_check(&expression),
        Commands::Run {
            template,
            data,
            subreports,
            config,
            param,
            lines_per_page,
            lenient,
        } => run_report(
            RunOptions {
                template,
                data: None,
                data_path: data,
                subreports,
                config,
                params: HashMap::new(),
                lines_per_page,
                lenient,
            },
            &param,
        ),
        Commands::Docs { topic: None } => {
            print!("{}", cli::get_docs_overview());
            Ok(())
        }
        Commands::Docs { topic: Some(topic) } => cli::get_doc_topic(&topic).map(|content| {
            print!("{}", content);
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(expression: &str) -> Result<(), CliError> {
    let result = cli::execute_check(expression)?;
    println!("Syntax is valid: {}", result.symbol);
    if !result.aggregates.is_empty() {
        let names: Vec<&str> = result.aggregates.iter().map(|f| f.name()).collect();
        println!("Aggregates: {}", names.join(", "));
    }
    Ok(())
}

fn run_report(mut options: RunOptions, params: &[String]) -> Result<(), CliError> {
    for param in params {
        let (name, value) = cli::parse_param(param)?;
        options.params.insert(name, value);
    }

    if options.data_path.is_none() {
        if atty::is(atty::Stream::Stdin) {
            return Err(CliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|source| CliError::Io {
                path: PathBuf::from("<stdin>"),
                source,
            })?;
        options.data = Some(buffer);
    }

    let pages = cli::execute_run(&options)?;
    print!("{}", cli::render_pages(&pages));
    Ok(())
}
