use adl_gen::{AdlError, Generator, Grammar, Pipeline, RuleTable, DEFAULT_MAX_DEPTH};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Neural-network architecture generator and checker
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate random architectures from a grammar
    Generate {
        /// Grammar file; the built-in grammar is used when omitted
        #[arg(long)]
        grammar: Option<PathBuf>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum self-recursion depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Number of architectures to generate
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check an architecture file for syntax and semantic errors
    Validate {
        file: PathBuf,

        /// Rule table in JSON
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Validate an architecture file and print its IR as JSON
    Interpret {
        file: PathBuf,

        /// Rule table in JSON
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Write the built-in grammar
    Grammar {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, AdlError> {
    match cli.command {
        Commands::Generate {
            grammar,
            seed,
            max_depth,
            count,
            output,
        } => {
            let grammar = match grammar {
                Some(path) => {
                    info!("Loading grammar from {}", path.display());
                    Grammar::from_file(&path)?
                }
                None => Grammar::adl(),
            };
            info!("Loaded {} rules", grammar.rules().len());

            let generator = Generator::new(grammar);
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };

            let mut samples = Vec::with_capacity(count);
            for i in 0..count {
                match generator.generate(&mut rng, max_depth) {
                    Some(text) => samples.push(text),
                    None => warn!("sample {} came out empty", i + 1),
                }
            }
            emit(&samples.join("\n\n"), output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { file, rules } => {
            let text = fs::read_to_string(&file)?;
            let diagnostics = pipeline(rules.as_deref())?.check(&text)?;
            if diagnostics.is_empty() {
                println!("{}: valid", file.display());
                return Ok(ExitCode::SUCCESS);
            }
            for diagnostic in &diagnostics {
                println!("{}: {}", file.display(), diagnostic);
            }
            println!("{}: invalid, {} error(s)", file.display(), diagnostics.len());
            Ok(ExitCode::FAILURE)
        }
        Commands::Interpret { file, rules } => {
            let text = fs::read_to_string(&file)?;
            match pipeline(rules.as_deref())?.compile(&text) {
                Ok(ir) => {
                    println!("{}", serde_json::to_string_pretty(&ir)?);
                    Ok(ExitCode::SUCCESS)
                }
                Err(AdlError::Invalid(diagnostics)) => {
                    for diagnostic in &diagnostics {
                        println!("{}: {}", file.display(), diagnostic);
                    }
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => Err(err),
            }
        }
        Commands::Grammar { output } => {
            emit(adl_gen::grammar::ADL_GRAMMAR, output.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn pipeline(rules: Option<&Path>) -> Result<Pipeline, AdlError> {
    let pipeline = Pipeline::new();
    Ok(match rules {
        Some(path) => pipeline.with_rules(RuleTable::from_json_file(path)?),
        None => pipeline,
    })
}

fn emit(text: &str, output: Option<&Path>) -> Result<(), AdlError> {
    match output {
        Some(path) => {
            fs::write(path, text)?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}
