//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::task::LocalSet;
use tracing::{info, warn};
use url::Url;

use pagecraft_core::{
    BuildResult, ContentEntry, FsContentStore, ProgressReporter, RenderOptions, build_site,
    render_markdown,
};
use pagecraft_enhance::{Document, EnhanceConfig, Enhancer, MemoryHost};
use pagecraft_markdown::{SectionMarkers, split_with, validate_sections};
use pagecraft_shared::{AppConfig, init_config, load_config, load_config_from};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pagecraft — render exercise-style markdown into interactive pages.
#[derive(Parser)]
#[command(
    name = "pagecraft",
    version,
    about = "Render markdown content into HTML with anchors, copy buttons, and gated solutions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.pagecraft/pagecraft.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Render one markdown file to page HTML.
    Render {
        /// Markdown file to render.
        file: PathBuf,

        /// Print the full render result as JSON instead of HTML.
        #[arg(long)]
        json: bool,

        /// Ship anchor and copy controls in the HTML.
        #[arg(long)]
        prerender: bool,
    },

    /// Show how a file splits into body, hidden, and after segments.
    Split {
        /// Markdown file to split.
        file: PathBuf,
    },

    /// List a file's headings with their ids as JSON.
    Headings {
        /// Markdown file to inspect.
        file: PathBuf,
    },

    /// Check files for section-marker mistakes and unsafe output.
    Check {
        /// Markdown files to check.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Render a file and run the client-side enhancement pass headlessly.
    Enhance {
        /// Markdown file to render and enhance.
        file: PathBuf,

        /// Page URL, including any #fragment (defaults to site.base_url + file stem).
        #[arg(long)]
        url: Option<String>,
    },

    /// Render every document under a content root.
    Build {
        /// Content root holding posts/, guides/, and checklists/.
        #[arg(long, default_value = "content")]
        content: PathBuf,

        /// Output directory.
        #[arg(short, long, default_value = "dist")]
        out: PathBuf,

        /// Ship anchor and copy controls in the HTML.
        #[arg(long)]
        prerender: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pagecraft=info",
        1 => "pagecraft=debug",
        _ => "pagecraft=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Command::Render {
            file,
            json,
            prerender,
        } => cmd_render(&config, &file, json, prerender),
        Command::Split { file } => cmd_split(&config, &file),
        Command::Headings { file } => cmd_headings(&config, &file),
        Command::Check { files } => cmd_check(&config, &files),
        Command::Enhance { file, url } => cmd_enhance(&config, &file, url.as_deref()).await,
        Command::Build {
            content,
            out,
            prerender,
        } => cmd_build(&config, &content, &out, prerender),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

fn read_markdown(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).map_err(|e| eyre!("cannot read '{}': {e}", file.display()))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_render(config: &AppConfig, file: &Path, json: bool, prerender: bool) -> Result<()> {
    let markdown = read_markdown(file)?;
    let mut opts = RenderOptions::from(config);
    opts.prerender_controls |= prerender;

    let page = render_markdown(&markdown, &opts)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
    } else {
        print!("{}", page.html);
    }
    Ok(())
}

fn cmd_split(config: &AppConfig, file: &Path) -> Result<()> {
    let markdown = read_markdown(file)?;
    let segments = split_with(&markdown, &SectionMarkers::from(&config.sections));
    println!("{}", serde_json::to_string_pretty(&segments)?);
    Ok(())
}

fn cmd_headings(config: &AppConfig, file: &Path) -> Result<()> {
    let markdown = read_markdown(file)?;
    let page = render_markdown(&markdown, &RenderOptions::from(config))?;
    println!("{}", serde_json::to_string_pretty(&page.headings)?);
    Ok(())
}

fn cmd_check(config: &AppConfig, files: &[PathBuf]) -> Result<()> {
    let markers = SectionMarkers::from(&config.sections);
    let opts = RenderOptions {
        verify_output: true,
        ..RenderOptions::from(config)
    };

    let mut failures = 0;
    for file in files {
        let outcome = read_markdown(file).and_then(|markdown| {
            validate_sections(&markdown, &markers)?;
            Ok(render_markdown(&markdown, &opts)?)
        });

        match outcome {
            Ok(page) if page.degraded_blocks > 0 => {
                println!(
                    "  warn  {} ({} block(s) rendered as text)",
                    file.display(),
                    page.degraded_blocks
                );
            }
            Ok(page) => {
                println!("  ok    {} ({} headings)", file.display(), page.headings.len());
            }
            Err(e) => {
                failures += 1;
                println!("  FAIL  {}: {e}", file.display());
            }
        }
    }

    if failures > 0 {
        return Err(eyre!("{failures} of {} file(s) failed checks", files.len()));
    }
    Ok(())
}

async fn cmd_enhance(config: &AppConfig, file: &Path, url: Option<&str>) -> Result<()> {
    let markdown = read_markdown(file)?;
    let page = render_markdown(&markdown, &RenderOptions::from(config))?;

    let location = match url {
        Some(url) => Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?,
        None => {
            let stem = file
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| eyre!("cannot derive a page URL from '{}'", file.display()))?;
            config.base_url()?.join(stem)?
        }
    };

    let enhance_config = EnhanceConfig::from(&config.enhance);
    let host = Rc::new(MemoryHost::new());
    let enhancer = Enhancer::with_config(
        Document::parse(&page.html),
        Rc::clone(&host),
        location,
        enhance_config,
    );

    // The enhancer's tasks are !Send; drive them on this thread.
    let local = LocalSet::new();
    let report = local
        .run_until(async {
            let report = enhancer.mount();
            tokio::time::sleep(enhance_config.scroll_delay + Duration::from_millis(10)).await;
            report
        })
        .await;

    info!(
        headings = report.headings.len(),
        code_blocks = report.code_blocks.len(),
        disclosures = report.disclosures,
        scrolled = !host.scrolls().is_empty(),
        location = %enhancer.location(),
        "page enhanced"
    );
    if enhancer.location().fragment().is_some() && host.scrolls().is_empty() {
        warn!("location fragment does not name a heading on this page");
    }

    print!("{}", enhancer.document().borrow().to_html());
    Ok(())
}

fn cmd_build(config: &AppConfig, content: &Path, out: &Path, prerender: bool) -> Result<()> {
    if !content.is_dir() {
        return Err(eyre!("content root '{}' is not a directory", content.display()));
    }

    let mut opts = RenderOptions::from(config);
    opts.prerender_controls |= prerender;

    info!(content = %content.display(), out = %out.display(), "building site");

    let store = FsContentStore::new(content);
    let reporter = CliProgress::new();
    let result = build_site(&store, &opts, out, &reporter)?;

    println!();
    println!("  Site built.");
    println!("  Pages:  {}", result.rendered);
    if result.failed > 0 {
        println!("  Failed: {} (see log)", result.failed);
    }
    println!("  Path:   {}", result.out_dir.display());
    println!("  Time:   {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_rendered(&self, entry: &ContentEntry, current: usize, total: usize) {
        self.spinner.set_message(format!(
            "Rendering [{current}/{total}] {}/{}",
            entry.kind.dir_name(),
            entry.slug
        ));
    }

    fn done(&self, _result: &BuildResult) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}
