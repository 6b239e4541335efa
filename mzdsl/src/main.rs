#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, NamedSource};
use tracing_subscriber::EnvFilter;

use mzdsl::config::{self, IndexBaseSetting, TranslatorConfig};
use mzdsl::{DeclKind, Goal};

#[derive(Parser, Debug)]
#[command(name = "mzdsl", version, about = "Translate constraint models into MiniZinc")]
struct Cli {
    /// Raise log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum IndexBaseArg {
    One,
    Zero,
}

impl From<IndexBaseArg> for IndexBaseSetting {
    fn from(v: IndexBaseArg) -> Self {
        match v {
            IndexBaseArg::One => IndexBaseSetting::One,
            IndexBaseArg::Zero => IndexBaseSetting::Zero,
        }
    }
}

#[derive(clap::Args, Debug)]
struct Options {
    /// Configuration file. Defaults to `mzdsl.toml` next to the input.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Indexing convention of the source. Overrides the configuration file.
    #[arg(long, value_enum)]
    index_base: Option<IndexBaseArg>,

    /// Always unroll aggregates instead of emitting `sum(i in a..b)(..)`.
    #[arg(long, default_value_t = false)]
    no_native_aggregates: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Translate a model and write the MiniZinc program
    Translate {
        /// Input model file
        path: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: Options,
    },

    /// Translate a model and print a summary of the result
    Check {
        /// Input model file
        path: PathBuf,

        #[command(flatten)]
        options: Options,
    },
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Translate { path, output, options } => {
            let config = resolve_config(&path, &options)?;
            let (src, source) = read_source(&path)?;
            let text = mzdsl::translate_with_config(&src, &config)
                .map_err(|e| miette::Report::new(e).with_source_code(source))?;
            match output {
                Some(out) => fs::write(&out, text.as_str()).into_diagnostic()?,
                None => print!("{text}"),
            }
        }
        Cmd::Check { path, options } => {
            let config = resolve_config(&path, &options)?;
            let (src, source) = read_source(&path)?;
            let program =
                mzdsl::lower(&src, &config).map_err(|e| miette::Report::new(e).with_source_code(source))?;
            let goal = match program.goal {
                Goal::Satisfy => "satisfy",
                Goal::Minimize(_) => "minimize",
                Goal::Maximize(_) => "maximize",
            };
            println!(
                "{} declarations, {} constraints, goal: {goal}",
                program.declarations.len(),
                program.constraints.len(),
            );
            tracing::debug!(
                types = program.count(DeclKind::TypeAlias),
                constants = program.count(DeclKind::Constant),
                variables = program.count(DeclKind::Variable),
                "declarations by kind"
            );
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_config(path: &Path, options: &Options) -> miette::Result<TranslatorConfig> {
    let file = options.config.clone().or_else(|| config::find_config(path));
    let mut config = match &file {
        Some(file) => config::load_config(file)?,
        None => TranslatorConfig::default(),
    };
    if let Some(base) = options.index_base {
        config.index_base = base.into();
    }
    if options.no_native_aggregates {
        config.native_aggregates = false;
    }
    tracing::debug!(config = ?file, "configuration");
    Ok(config)
}

fn read_source(path: &Path) -> miette::Result<(String, NamedSource<String>)> {
    let src = fs::read_to_string(path).into_diagnostic()?;
    let source = NamedSource::new(display_path(path), src.clone());
    Ok((src, source))
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
