// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Use library instead of local modules
use fiscal_shift::config::{Config, Overrides};
use fiscal_shift::dashboard::{self, Dashboard};
use fiscal_shift::derive::{CardValues, MetricValues};
use fiscal_shift::{export, format_percent, logging, CategoryFilter, LoadState};

#[derive(Parser, Debug)]
#[command(name = "fiscal-shift", version, about = "Compare two fiscal projection baselines")]
struct Cli {
    /// Fetch snapshots over HTTP from this base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Read snapshots from this directory (expects data/*.json under it)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Category filter: all, revenue, spending, income or cpi
    #[arg(long, global = true, default_value = "all")]
    category: CategoryFilter,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive dashboard (default)
    Tui,
    /// Print one card per parameter
    Cards,
    /// Print the percentage-change heatmap
    Heatmap,
    /// Print the aggregate revenue, spending and balance cards
    Aggregates,
    /// Write the heatmap matrix to a CSV file
    ExportHeatmap { path: PathBuf },
    /// Write the parameter cards to a CSV file
    ExportCards { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Tui);

    let config = Config::load(Overrides {
        base_url: cli.base_url,
        data_dir: cli.data_dir,
        log_json: cli.log_json.then_some(true),
        bind: None,
    })?;

    // The TUI owns the terminal, so keep logs quiet there
    let default_level = if matches!(command, Command::Tui) { "warn" } else { "info" };
    logging::init(default_level, config.log_json);
    tracing::debug!(?config, "configuration resolved");

    match command {
        Command::Tui => run_ui_mode(&config, cli.category),
        Command::Cards => run_cards(&config, cli.category).await,
        Command::Heatmap => run_heatmap(&config, cli.category).await,
        Command::Aggregates => run_aggregates(&config).await,
        Command::ExportHeatmap { path } => run_export_heatmap(&config, cli.category, path).await,
        Command::ExportCards { path } => run_export_cards(&config, cli.category, path).await,
    }
}

async fn load(config: &Config, filter: CategoryFilter) -> Result<Dashboard> {
    let source = config.source.build();
    println!("📂 Loading snapshots from {}...", source.describe());

    let mut dash = dashboard::load_once(source.as_ref()).await;
    dash.set_filter(filter);
    Ok(dash)
}

/// Bail on a failed comparison load; an empty document is not an error
fn require_comparison(dash: &Dashboard) -> Result<()> {
    if let LoadState::Failed(message) = &dash.comparison {
        bail!("{}", message);
    }
    Ok(())
}

async fn run_cards(config: &Config, filter: CategoryFilter) -> Result<()> {
    let dash = load(config, filter).await?;
    require_comparison(&dash)?;

    let Some(doc) = dash.comparison.data() else {
        println!("No data");
        return Ok(());
    };

    println!(
        "✓ {} → {} ({})\n",
        doc.metadata.old_baseline,
        doc.metadata.new_baseline,
        filter.label()
    );

    let cards = dash.cards();
    for card in &cards {
        let trend = card
            .sparkline
            .as_ref()
            .map(|s| fiscal_shift::sparkline::to_glyphs(&s.new, s.frame))
            .unwrap_or_default();
        let year = card.year.as_deref().unwrap_or("-");

        match &card.values {
            CardValues::Compared {
                old_text,
                new_text,
                badge,
            } => {
                let change = badge.as_ref().map(|b| b.text.as_str()).unwrap_or("");
                println!(
                    "{:<40} {:>5}  {:>12} → {:<12} {:>7}  {}",
                    card.label, year, old_text, new_text, change, trend
                );
            }
            CardValues::NewOnly { new_text } => {
                println!("{:<40} {:>5}  {:>12}   {:<12} {:>7}  {}", card.label, year, "", new_text, "", trend);
            }
            CardValues::Empty => println!("{:<40} {:>5}  no data", card.label, year),
        }
    }

    println!("\n✅ {} parameters", cards.len());
    Ok(())
}

async fn run_heatmap(config: &Config, filter: CategoryFilter) -> Result<()> {
    let dash = load(config, filter).await?;
    require_comparison(&dash)?;

    let Some(matrix) = dash.heatmap() else {
        println!("No projection-year changes to show");
        return Ok(());
    };

    print!("{:<40}", "Parameter");
    for year in &matrix.years {
        print!(" {:>7}", year);
    }
    println!();

    for (row, cells) in matrix.cells.iter().enumerate() {
        print!("{:<40}", truncate(&matrix.row_labels[row], 40));
        for cell in cells {
            if cell.present {
                print!(" {:>7}", format_percent(cell.value));
            } else {
                print!(" {:>7}", "·");
            }
        }
        println!();
    }

    println!("\n📊 Color scale: ±{}", format_percent(matrix.bound()));
    Ok(())
}

async fn run_aggregates(config: &Config) -> Result<()> {
    let dash = load(config, CategoryFilter::All).await?;
    if let LoadState::Failed(message) = &dash.aggregate {
        bail!("{}", message);
    }

    let cards = dash.metric_cards();
    if cards.is_empty() {
        println!("No data");
        return Ok(());
    }

    for card in &cards {
        println!("\n💰 {}", card.label);
        println!("   {}", card.description);
        match &card.values {
            MetricValues::Compared {
                old_text,
                new_text,
                badge,
                diff_text,
            } => {
                println!("   {} → {}", old_text, new_text);
                let change = badge.as_ref().map(|b| b.text.as_str()).unwrap_or("");
                let diff = diff_text.as_deref().unwrap_or("");
                if !change.is_empty() || !diff.is_empty() {
                    println!("   {} {}", change, diff);
                }
            }
            MetricValues::NoData => {}
        }
        println!("   {}", card.footnote());
    }

    Ok(())
}

async fn run_export_heatmap(config: &Config, filter: CategoryFilter, path: PathBuf) -> Result<()> {
    let dash = load(config, filter).await?;
    require_comparison(&dash)?;

    let Some(matrix) = dash.heatmap() else {
        bail!("Nothing to export: no projection-year changes for {}", filter.label());
    };

    export::export_heatmap(&path, &matrix)?;
    println!("✅ Wrote {} rows to {:?}", matrix.row_keys.len(), path);
    Ok(())
}

async fn run_export_cards(config: &Config, filter: CategoryFilter, path: PathBuf) -> Result<()> {
    let dash = load(config, filter).await?;
    require_comparison(&dash)?;

    let cards = dash.cards();
    export::export_cards(&path, &cards)?;
    println!("✅ Wrote {} cards to {:?}", cards.len(), path);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config, filter: CategoryFilter) -> Result<()> {
    let source = config.source.build();
    println!("🖥️  Loading Fiscal Shift dashboard from {}...", source.describe());
    println!("Starting UI... (Press 'q' to quit)\n");

    // Create and run app; fetches land while the UI is already up
    let session = dashboard::ViewSession::mount(source);
    let mut app = ui::App::new(session);
    app.apply_filter(filter);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config, _filter: CategoryFilter) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin fiscal-server --features server");
    std::process::exit(1);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
