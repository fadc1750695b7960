//! glab-pipeviz CLI - GitLab CI pipeline visualizer

use clap::{CommandFactory, Parser, ValueEnum};
use colored::Colorize;

use glab_pipeviz::mermaid::{self, MermaidRenderer};
use glab_pipeviz::share::{self, LiveMode};
use glab_pipeviz::{FixSuggestion, PipelineParser, PipevizError, DEFAULT_MERMAID_CONFIG};

#[derive(Parser)]
#[command(name = "glab-pipeviz")]
#[command(about = "Visualize GitLab CI/CD pipeline configuration as a Mermaid diagram")]
#[command(version)]
struct Cli {
    /// Path to GitLab CI YAML file (e.g. .gitlab-ci.yml, main_pipeline.yaml)
    yaml_file: String,

    /// Visualization mode: job dependencies or stage grouping
    #[arg(long, value_enum, default_value_t = Mode::Deps)]
    mode: Mode,

    /// Output format: raw mermaid document or a shareable URL
    #[arg(long, value_enum, default_value_t = Output::Raw)]
    output: Output,

    /// Open the URL in the default web browser (URL outputs only)
    #[arg(long)]
    open: bool,

    /// Increase verbosity (use -v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Dependencies between jobs
    Deps,
    /// Jobs grouped by stage
    Stages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    /// Raw mermaid document
    Raw,
    /// URL to view the diagram on mermaid.live
    View,
    /// URL to edit the diagram on mermaid.live
    Edit,
    /// URL of a jpg image on mermaid.ink
    Jpg,
    /// URL of a png image on mermaid.ink
    Png,
    /// URL of a webp image on mermaid.ink
    Webp,
    /// URL of an svg image on mermaid.ink
    Svg,
    /// URL of a pdf on mermaid.ink
    Pdf,
}

fn main() {
    let cli = Cli::parse();

    if cli.open && cli.output == Output::Raw {
        Cli::command()
            .error(
                clap::error::ErrorKind::ArgumentConflict,
                "--open can only be used with URL outputs",
            )
            .exit();
    }

    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<(), PipevizError> {
    let parser = PipelineParser::new(&cli.yaml_file);
    let (jobs, stages) = parser.parse()?;
    if jobs.is_empty() {
        return Err(PipevizError::EmptyPipeline);
    }

    let renderer = MermaidRenderer::new(&jobs, &stages);
    let content = match cli.mode {
        Mode::Deps => renderer.dependencies_diagram(),
        Mode::Stages => renderer.stages_diagram(),
    };
    let document = mermaid::document(&content, DEFAULT_MERMAID_CONFIG);

    let url = match cli.output {
        Output::Raw => None,
        Output::View => Some(share::live_url(&document, LiveMode::View)?),
        Output::Edit => Some(share::live_url(&document, LiveMode::Edit)?),
        Output::Jpg => Some(share::ink_url(&document, "jpg")),
        Output::Png => Some(share::ink_url(&document, "png")),
        Output::Webp => Some(share::ink_url(&document, "webp")),
        Output::Svg => Some(share::ink_url(&document, "svg")),
        Output::Pdf => Some(share::ink_url(&document, "pdf")),
    };

    match &url {
        Some(url) => println!("{url}"),
        None => println!("{document}"),
    }

    if cli.open {
        if let Some(url) = &url {
            if let Err(e) = share::open_in_browser(url) {
                tracing::warn!("failed to open browser: {e}");
            }
        }
    }

    Ok(())
}
