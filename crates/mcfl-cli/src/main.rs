//! MCFL reachability CLI
//!
//! - `analyze`: the staged Dyck analysis over graph files and directories
//! - `grammar`: normalize a grammar and print its normal form
//! - `reach`: run the raw solver for one grammar over one graph

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use mcfl_grammar::{load_grammar, ExternalNormalizer, Mcfg, NormalFormCheck, Normalizer};
use mcfl_reach::text_format::{linear_graph, read_graph, read_graph_with, write_paths, LabelStyle};
use mcfl_reach::{
    solve, AnalysisFamily, AnalysisReport, Pipeline, SessionConfig, SolverOptions, StageResults,
};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcfl")]
#[command(
    author,
    version,
    about = "CFL / MCFL reachability with mutual refinement"
)]
struct Cli {
    /// Log more (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(flatten)]
    session: SessionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct SessionArgs {
    /// Session config (JSON); the flags below override its fields
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Benchmark label convention: taint or value-flow
    #[arg(long, global = true)]
    family: Option<AnalysisFamily>,
    /// Residue classes of the augmented grammar
    #[arg(long, global = true)]
    parity_classes: Option<usize>,
    /// On-demand queries between memo resets
    #[arg(long, global = true)]
    cache_clear_interval: Option<usize>,
    /// Normalizer command line, e.g. "python3 mcfg.py -n" (default: input must already be in normal form)
    #[arg(long, global = true)]
    normalizer: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the staged analysis on graph files.
    ///
    /// Directories are walked for `.dot` and `.txt` files. Every file gets
    /// its own session; files are analyzed in parallel.
    Analyze {
        /// Graph files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Write one result file per input here
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Result file format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Also write the on-demand paths as `<name>.paths`
        #[arg(long)]
        paths: bool,
    },

    /// Normalize a grammar and print it with its dimension and rank.
    Grammar {
        /// Grammar text
        file: PathBuf,
    },

    /// Solve one grammar over one graph and print the start-symbol paths.
    Reach {
        /// Graph file (omit with --word)
        graph: Option<PathBuf>,
        /// Grammar text
        #[arg(long)]
        grammar: PathBuf,
        /// Analyze a path graph spelling this word instead of a graph file
        #[arg(long, conflicts_with = "graph")]
        word: Option<String>,
        /// Collapse bracket labels to a/b/A/B and everything else to epsilon
        #[arg(long)]
        collapsed: bool,
        /// Write the paths here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl SessionArgs {
    fn resolve(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)
                .with_context(|| format!("loading session config {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(family) = self.family {
            config.family = family;
        }
        if let Some(k) = self.parity_classes {
            config.parity_classes = k;
        }
        if let Some(interval) = self.cache_clear_interval {
            config.cache_clear_interval = interval;
        }
        config.validate()?;
        Ok(config)
    }

    fn normalizer(&self) -> Result<Box<dyn Normalizer>> {
        match &self.normalizer {
            None => Ok(Box::new(NormalFormCheck)),
            Some(line) => ExternalNormalizer::from_command_line(line)
                .map(|n| Box::new(n) as Box<dyn Normalizer>)
                .ok_or_else(|| anyhow!("--normalizer needs a program name")),
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Analyze {
            inputs,
            out_dir,
            format,
            paths,
        } => {
            let config = cli.session.resolve()?;
            cmd_analyze(&inputs, &config, out_dir.as_deref(), format, paths)
        }
        Commands::Grammar { file } => {
            let normalizer = cli.session.normalizer()?;
            cmd_grammar(&file, normalizer.as_ref())
        }
        Commands::Reach {
            graph,
            grammar,
            word,
            collapsed,
            out,
        } => {
            let normalizer = cli.session.normalizer()?;
            let style = if collapsed {
                LabelStyle::Collapsed
            } else {
                LabelStyle::Raw
            };
            cmd_reach(
                graph.as_deref(),
                word.as_deref(),
                &grammar,
                normalizer.as_ref(),
                style,
                out.as_deref(),
            )
        }
    }
}

// ============================================================================
// analyze
// ============================================================================

fn is_graph_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("dot") | Some("txt")
    )
}

/// Files named directly are kept as given; directories contribute their
/// `.dot` / `.txt` files in path order.
fn discover_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = walkdir::WalkDir::new(input)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable directory entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file() && is_graph_file(e.path()))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        files.extend(found);
    }
    files
}

fn analyze_file(path: &Path, config: &SessionConfig) -> Result<StageResults> {
    let graph = read_graph(path)?;
    tracing::info!(
        input = %path.display(),
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "analyzing"
    );
    let mut pipeline = Pipeline::new(config.clone());
    Ok(pipeline.run(&graph))
}

#[derive(Serialize)]
struct JsonReport<'a> {
    input: String,
    #[serde(flatten)]
    report: &'a AnalysisReport,
}

fn write_results(
    dir: &Path,
    input: &Path,
    results: &StageResults,
    format: OutputFormat,
    with_paths: bool,
) -> Result<()> {
    let name = input
        .file_name()
        .ok_or_else(|| anyhow!("input {} has no file name", input.display()))?;
    let report = results.report();
    let (target, body) = match format {
        OutputFormat::Text => (dir.join(name), report.to_string()),
        OutputFormat::Json => {
            let json = JsonReport {
                input: input.display().to_string(),
                report: &report,
            };
            let mut file_name = name.to_os_string();
            file_name.push(".json");
            (dir.join(file_name), serde_json::to_string_pretty(&json)?)
        }
    };
    fs::write(&target, body).with_context(|| format!("writing {}", target.display()))?;

    if with_paths {
        let mut file_name = name.to_os_string();
        file_name.push(".paths");
        let target = dir.join(file_name);
        fs::write(&target, write_paths(&results.on_demand))
            .with_context(|| format!("writing {}", target.display()))?;
    }
    Ok(())
}

fn cmd_analyze(
    inputs: &[PathBuf],
    config: &SessionConfig,
    out_dir: Option<&Path>,
    format: OutputFormat,
    with_paths: bool,
) -> Result<()> {
    let files = discover_inputs(inputs);
    if files.is_empty() {
        return Err(anyhow!("no graph files found"));
    }
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    println!(
        "{} {} input(s) ({:?} family)",
        "Analyzing".green().bold(),
        files.len(),
        config.family
    );

    let outcomes: Vec<(&PathBuf, Result<StageResults>)> = files
        .par_iter()
        .map(|file| (file, analyze_file(file, config)))
        .collect();

    let mut failed = 0usize;
    for (file, outcome) in outcomes {
        let written = outcome.and_then(|results| {
            if let Some(dir) = out_dir {
                write_results(dir, file, &results, format, with_paths)?;
            }
            Ok(results.report())
        });
        match written {
            Ok(report) => {
                println!("{}", file.display().to_string().bold());
                for line in report.lines() {
                    println!("  {line}");
                }
            }
            Err(err) => {
                failed += 1;
                tracing::error!(input = %file.display(), error = %format!("{err:#}"), "analysis failed");
            }
        }
    }

    if failed == 0 {
        println!("{} {} input(s)", "ok".green().bold(), files.len());
    } else {
        println!(
            "{} {} of {} input(s) failed",
            "warning:".yellow().bold(),
            failed,
            files.len()
        );
    }
    Ok(())
}

// ============================================================================
// grammar / reach
// ============================================================================

fn read_grammar(path: &Path, normalizer: &dyn Normalizer) -> Result<Mcfg> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    load_grammar(normalizer, &raw).with_context(|| format!("loading grammar {}", path.display()))
}

fn cmd_grammar(path: &Path, normalizer: &dyn Normalizer) -> Result<()> {
    let grammar = read_grammar(path, normalizer)?;
    println!(
        "% dimension {}, rank {}, {} rule(s)",
        grammar.dimension(),
        grammar.rank(),
        grammar.len()
    );
    print!("{grammar}");
    Ok(())
}

fn cmd_reach(
    graph_path: Option<&Path>,
    word: Option<&str>,
    grammar_path: &Path,
    normalizer: &dyn Normalizer,
    style: LabelStyle,
    out: Option<&Path>,
) -> Result<()> {
    let grammar = read_grammar(grammar_path, normalizer)?;
    let graph = match (graph_path, word) {
        (_, Some(word)) => linear_graph(word),
        (Some(path), None) => read_graph_with(path, style)?,
        (None, None) => return Err(anyhow!("give a graph file or --word")),
    };

    let reach = solve(&graph, &grammar, SolverOptions::without_provenance());
    let text = write_paths(&reach.paths);
    match out {
        Some(target) => {
            fs::write(target, text).with_context(|| format!("writing {}", target.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), target.display().to_string().bold());
        }
        None => print!("{text}"),
    }
    eprintln!(
        "{} {} path(s), {} derivation(s)",
        "ok".green().bold(),
        reach.paths.len(),
        reach.derivations.len()
    );
    Ok(())
}
