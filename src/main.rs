use anyhow::{bail, Context};
use binstapler::{
    build_archive_tree, extract_entry, list_archive_entries, open_archive_entry, staple_files,
    StapleConfig,
};
use clap::builder::{OsStringValueParser, TypedValueParser};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "binstapler",
    about = "Staple files and folders onto an executable and read them back",
    version
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create <target> from <binary> with the given files and folders stapled on
    Staple {
        /// Read binary, target and paths from a TOML file instead
        #[arg(short, long, conflicts_with_all = ["binary", "target", "paths"])]
        config: Option<PathBuf>,

        /// Read relative paths from this directory, keeping their names
        #[arg(short = 'C', long = "directory")]
        directory: Option<PathBuf>,

        binary: Option<PathBuf>,
        target: Option<PathBuf>,
        paths: Vec<PathBuf>,
    },

    /// List the entries stapled onto a file (default: this executable)
    List {
        #[arg(value_parser = stapled_path())]
        stapled: Option<PathBuf>,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the stapled entries as a folder tree
    Tree {
        #[arg(value_parser = stapled_path())]
        stapled: Option<PathBuf>,

        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write one stapled entry to stdout
    Cat {
        /// Stapled file; use "" for this executable
        #[arg(value_parser = stapled_path())]
        stapled: PathBuf,
        entry: String,
    },

    /// Copy one stapled entry to a new file
    Extract {
        /// Stapled file; use "" for this executable
        #[arg(value_parser = stapled_path())]
        stapled: PathBuf,
        entry: String,
        dest: PathBuf,
    },
}

/// Accepts the empty path, which stands for the running executable
fn stapled_path() -> impl TypedValueParser<Value = PathBuf> {
    OsStringValueParser::new().map(PathBuf::from)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(cli.log_level.into()).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Staple {
            config,
            directory,
            binary,
            target,
            paths,
        } => {
            let mut config = match (config, binary, target) {
                (Some(file), _, _) => StapleConfig::from_file(&file)?,
                (None, Some(binary), Some(target)) => StapleConfig::new(binary, target, paths),
                _ => bail!("usage: binstapler staple <binary> <target> [fileOrFolder ...]"),
            };
            if let Some(directory) = directory {
                config = config.with_base_dir(directory);
            }
            let summary = staple_files(&config)
                .with_context(|| format!("stapling onto {}", config.binary.display()))?;
            println!(
                "{}: {} binary bytes + {} archive bytes ({} bytes of file contents)",
                config.output.display(),
                summary.binary_len,
                summary.archive_len,
                summary.content_len
            );
        }
        Commands::List { stapled, json } => {
            let stapled = stapled.unwrap_or_default();
            let entries = list_archive_entries(&stapled).context("listing stapled files")?;
            let mut out = io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut out, &entries)?;
                writeln!(out)?;
            } else {
                for entry in &entries {
                    if entry.is_dir {
                        writeln!(out, "{:>12}  {}/", "-", entry.path)?;
                    } else {
                        writeln!(out, "{:>12}  {}", entry.size, entry.path)?;
                    }
                }
            }
        }
        Commands::Tree { stapled, json } => {
            let stapled = stapled.unwrap_or_default();
            let tree = build_archive_tree(&stapled).context("building the stapled tree")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print!("{}", tree);
            }
        }
        Commands::Cat { stapled, entry } => {
            let mut reader = open_archive_entry(&stapled, &entry)
                .with_context(|| format!("retrieving {}", entry))?;
            let mut out = io::stdout().lock();
            io::copy(&mut reader, &mut out).with_context(|| format!("reading {}", entry))?;
            out.flush()?;
            reader.close();
        }
        Commands::Extract {
            stapled,
            entry,
            dest,
        } => {
            let written = extract_entry(&stapled, &entry, &dest)
                .with_context(|| format!("extracting {}", entry))?;
            println!("{} -> {} ({} bytes)", entry, dest.display(), written);
        }
    }

    Ok(())
}
