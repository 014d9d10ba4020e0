//! Keiba CLI - scrape, clean, train and predict from the command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use keiba::data::{clean_file, DatasetWriter, FieldNormalizer};
use keiba::model::ModelStore;
use keiba::models::{Column, PredictionMode, RaceContext};
use keiba::predictor::{Imputation, MedianSource, PredictionOutcome, Predictor};
use keiba::scraper::{
    collect_entries, collect_horse_urls, collect_results, dedup_urls, EntryFileNamer,
    list_page_urls, read_url_file, write_entry_list, write_url_file, HttpFetcher, PageReport,
    PageStatus,
};
use keiba::trainer::{Trainer, TrainingSummary};
use keiba::{PipelineConfig, PipelineError};

#[derive(Parser)]
#[command(name = "keiba")]
#[command(author, version, about = "netkeiba race data pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $KEIBA_CONFIG, then ./keiba.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect horse detail URLs from the horse search list
    Urls {
        /// Number of list pages to visit
        #[arg(long)]
        pages: Option<u32>,

        /// Drop repeated URLs
        #[arg(long)]
        unique: bool,

        /// Output file (one URL per line)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scrape race results of every horse in the URL list into the dataset
    Scrape {
        /// URL list file
        #[arg(long)]
        urls: Option<PathBuf>,

        /// Dataset to append to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Scrape a race card into a prediction input file
    Entries {
        /// Race card URL
        url: String,

        #[arg(long)]
        race_name: Option<String>,

        #[arg(long)]
        weather: Option<String>,

        /// Race number, e.g. 11 or 11R
        #[arg(long)]
        round: Option<String>,

        #[arg(long)]
        field_size: Option<u32>,

        #[arg(long)]
        track_condition: Option<String>,

        /// Directory for predict_data_<race name>.csv
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Drop incomplete rows from the scraped dataset
    Clean {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train the finishing-position model on the cleaned dataset
    Train {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Rank the horses of an entry list by predicted finishing position
    Predict {
        /// Entry list CSV (predict_data_*.csv)
        csv: Option<PathBuf>,

        /// Probability-weighted finishing position instead of the most likely one
        #[arg(long)]
        expected: bool,

        /// Source of the median used for missing values
        #[arg(long, value_enum)]
        imputation: Option<Imputation>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    println!("{}", "Keiba CLI v0.1.0".cyan().bold());
    println!();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Missing inputs are reported without the error chain
            match e.downcast_ref::<PipelineError>() {
                Some(p) if p.is_missing_input() => println!("{}: {}", "Error".red(), p),
                _ => println!("{}: {:#}", "Error".red(), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::resolve(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Urls {
            pages,
            unique,
            output,
        } => {
            let output = output.unwrap_or_else(|| config.paths.url_list.clone());
            run_urls(&config, pages.unwrap_or(config.scrape.list_pages), unique, &output)
        }
        Commands::Scrape { urls, output } => {
            let urls = urls.unwrap_or_else(|| config.paths.url_list.clone());
            let output = output.unwrap_or_else(|| config.paths.dataset.clone());
            run_scrape(&config, &urls, &output)
        }
        Commands::Entries {
            url,
            race_name,
            weather,
            round,
            field_size,
            track_condition,
            output_dir,
        } => {
            let context = race_context(race_name, weather, round, field_size, track_condition)?;
            run_entries(&config, &url, &context, &output_dir)
        }
        Commands::Clean { input, output } => {
            let input = input.unwrap_or_else(|| config.paths.dataset.clone());
            let output = output.unwrap_or_else(|| config.paths.cleaned.clone());
            run_clean(&input, &output)
        }
        Commands::Train { input } => {
            let input = input.unwrap_or_else(|| config.paths.cleaned.clone());
            run_train(&config, &input)
        }
        Commands::Predict {
            csv,
            expected,
            imputation,
        } => {
            let Some(csv) = csv else {
                println!("Usage: keiba predict <ENTRY_CSV> [--expected]");
                println!("Example: keiba predict predict_data_有馬記念.csv");
                return Ok(());
            };
            let mode = if expected {
                PredictionMode::Expected
            } else {
                PredictionMode::Class
            };
            let imputation = imputation.unwrap_or(config.prediction.imputation);
            run_predict(&config, &csv, mode, imputation)
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")
}

fn page_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Progress callback shared by the multi-page commands
fn report_page(pb: &ProgressBar, report: &PageReport) {
    match &report.status {
        PageStatus::Collected { records, skipped } => {
            pb.set_message(format!("{} rows ({} skipped)", records, skipped));
        }
        PageStatus::NoTable => {
            pb.println(format!("{} no table on {}", "Warning".yellow(), report.url));
        }
        PageStatus::Failed(e) => {
            pb.println(format!("{} {}: {}", "Failed".red(), report.url, e));
        }
    }
    pb.inc(1);
}

fn run_urls(config: &PipelineConfig, pages: u32, unique: bool, output: &Path) -> Result<()> {
    println!(
        "{}: {} list pages from {}",
        "Collecting horse URLs".green(),
        pages,
        config.scrape.horse_list_url
    );

    let fetcher = HttpFetcher::new(config.scrape.client.clone())?;
    let page_urls = list_page_urls(&config.scrape.horse_list_url, pages);
    let pb = page_bar(page_urls.len());

    let (mut urls, summary) = runtime()?.block_on(collect_horse_urls(
        &fetcher,
        &page_urls,
        &config.scrape.layouts.horse_list,
        |report| report_page(&pb, report),
    ));
    pb.finish_and_clear();

    if unique {
        let before = urls.len();
        urls = dedup_urls(urls);
        println!("Removed {} duplicate URLs", before - urls.len());
    }

    write_url_file(output, &urls).with_context(|| format!("Failed to write {:?}", output))?;
    println!(
        "\n{}: {} URLs from {} pages ({} failed) saved to {:?}",
        "Complete".green(),
        urls.len(),
        summary.pages_ok,
        summary.pages_failed,
        output
    );
    Ok(())
}

fn run_scrape(config: &PipelineConfig, url_file: &Path, output: &Path) -> Result<()> {
    let urls = read_url_file(url_file)?;
    println!(
        "{}: {} horse pages into {:?}",
        "Scraping".green(),
        urls.len(),
        output
    );

    let fetcher = HttpFetcher::new(config.scrape.client.clone())?;
    let mut writer = DatasetWriter::open(output, &Column::RESULT_ORDER)?;
    let pb = page_bar(urls.len());

    let summary = runtime()?.block_on(collect_results(
        &fetcher,
        &urls,
        &config.scrape.layouts.horse_results,
        &mut writer,
        |report| report_page(&pb, report),
    ))?;
    pb.finish_and_clear();

    println!("\n{}", "Scrape summary:".yellow().bold());
    println!("  Pages collected: {}", summary.pages_ok);
    println!("  Pages failed:    {}", summary.pages_failed);
    println!("  Rows written:    {}", summary.records);
    println!("  Rows skipped:    {}", summary.rows_skipped);
    println!("{}: {:?}", "Saved".green(), writer.path());
    Ok(())
}

/// Fill in race context values not given on the command line
fn race_context(
    race_name: Option<String>,
    weather: Option<String>,
    round: Option<String>,
    field_size: Option<u32>,
    track_condition: Option<String>,
) -> Result<RaceContext> {
    let theme = ColorfulTheme::default();
    let prompt = |value: Option<String>, label: &str| -> Result<String> {
        match value {
            Some(v) => Ok(v),
            None => Ok(Input::<String>::with_theme(&theme)
                .with_prompt(label)
                .interact_text()?),
        }
    };

    let race_name = prompt(race_name, "レース名 (race name)")?;
    let weather = prompt(weather, "天気 (weather)")?;
    let round = prompt(round, "R (race number)")?;
    let field_size = match field_size {
        Some(n) => n,
        None => Input::<u32>::with_theme(&theme)
            .with_prompt("頭数 (field size)")
            .interact_text()?,
    };
    let track_condition = prompt(track_condition, "馬場 (track condition)")?;

    let round = FieldNormalizer::new()
        .parse_round(&round)
        .with_context(|| format!("Invalid race number: {}", round))?;

    Ok(RaceContext {
        race_name,
        weather,
        round: Some(round),
        field_size: Some(field_size),
        track_condition,
    })
}

fn run_entries(config: &PipelineConfig, url: &str, context: &RaceContext, output_dir: &Path) -> Result<()> {
    println!("{}: {} ({})", "Fetching race card".green(), context.race_name, url);

    let fetcher = HttpFetcher::new(config.scrape.client.clone())?;
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message("Loading race card...");
    let page = runtime()?.block_on(collect_entries(
        &fetcher,
        url,
        &config.scrape.layouts.race_card,
        context,
    ));
    pb.finish_and_clear();
    let page = page.with_context(|| format!("Failed to collect entries from {}", url))?;

    if page.records.is_empty() {
        println!(
            "{}",
            format!("No entries found ({} rows skipped); nothing written.", page.skipped_count()).yellow()
        );
        return Ok(());
    }

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output_dir))?;
    let path = output_dir.join(EntryFileNamer::new().file_name(&context.race_name));
    write_entry_list(&path, &page.records)?;

    println!("{}", "出馬表 (Race Entries):".yellow().bold());
    for record in &page.records {
        println!(
            "  {:>2}  {}  {}",
            record.horse_number.map(|n| n.to_string()).unwrap_or_default(),
            record.horse_name.as_deref().unwrap_or(""),
            record.jockey
        );
    }
    println!("\n{}: {} entries saved to {:?}", "Complete".green(), page.records.len(), path);
    Ok(())
}

fn run_clean(input: &Path, output: &Path) -> Result<()> {
    println!("{}: {:?}", "Cleaning".green(), input);
    let report = clean_file(input, output)?;

    println!("  Rows before: {}", report.rows_before);
    println!("  Rows after:  {}", report.rows_after);
    println!("  Removed:     {}", report.rows_removed);
    println!("{}: {:?}", "Saved".green(), output);
    Ok(())
}

fn run_train(config: &PipelineConfig, input: &Path) -> Result<()> {
    println!("{}: {:?}", "Training".green(), input);

    let store = ModelStore::new(&config.paths.model_dir);
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Fitting {} trees...", config.training.forest.n_trees));
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    let summary = Trainer::new(config.training.clone()).train_file(input, &store);
    pb.finish_and_clear();

    print_training_summary(&summary?);
    println!(
        "\n{}: {:?} and {:?}",
        "Saved".green(),
        store.model_path(),
        store.encoders_path()
    );
    Ok(())
}

fn print_training_summary(summary: &TrainingSummary) {
    println!("{}", "Data:".yellow().bold());
    println!("  Rows read:                {}", summary.rows_read);
    println!("  Dropped (not numeric):    {}", summary.dropped_uncoercible);
    println!("  Dropped (rare position):  {}", summary.dropped_rare_class);
    println!("  Rows used:                {}", summary.rows_used);
    println!("  Train / test:             {} / {}", summary.train_rows, summary.test_rows);
    println!("  Classes:                  {:?}", summary.classes);

    println!("\n{}", "Evaluation:".yellow().bold());
    println!("  Accuracy: {:.4}\n", summary.report.accuracy);
    print!("{}", summary.report);

    println!("\n{}", "Feature importance:".yellow().bold());
    for (name, importance) in &summary.importances {
        println!("  {:<12} {:.4}", name, importance);
    }
    println!("\nModel id: {}", summary.model_id);
}

fn run_predict(config: &PipelineConfig, csv: &Path, mode: PredictionMode, imputation: Imputation) -> Result<()> {
    let store = ModelStore::new(&config.paths.model_dir);
    let predictor = Predictor::load(&store, imputation)?;

    println!("{}: {:?}", "Predicting".green(), csv);
    let outcome = predictor.predict_file(csv, mode)?;
    print_prediction(&outcome);
    Ok(())
}

fn print_prediction(outcome: &PredictionOutcome) {
    println!("{}", "Preprocessing:".yellow().bold());
    for column in &outcome.imputed {
        let source = match column.source {
            MedianSource::Batch => "batch median",
            MedianSource::Training => "training median",
            MedianSource::Zero => "no median available, used 0",
        };
        println!(
            "  {}: filled {} missing values with {} ({})",
            column.feature, column.cells, column.value, source
        );
    }
    for column in &outcome.encoded {
        println!(
            "  {}: encoded with saved categories ({} unseen)",
            column.feature, column.unseen
        );
    }

    let heading = match outcome.mode {
        PredictionMode::Class => "予測着順 (Predicted finishing position):",
        PredictionMode::Expected => "予測着順 (期待値) (Expected finishing position):",
    };
    println!("\n{}", heading.yellow().bold());
    println!("{}", "-".repeat(40));
    for (i, horse) in outcome.ranking.iter().enumerate() {
        let value = match outcome.mode {
            PredictionMode::Class => format!("{:.0}", horse.value),
            PredictionMode::Expected => format!("{:.2}", horse.value),
        };
        let line = format!("{:>3}. {:<20} {:>6}", i + 1, truncate_name(&horse.horse_name, 18), value);
        if i < 3 {
            println!("{}", line.green());
        } else {
            println!("{}", line);
        }
    }
}

/// Truncate name to fit display width
fn truncate_name(name: &str, max_len: usize) -> String {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() <= max_len {
        name.to_string()
    } else {
        chars[..max_len - 1].iter().collect::<String>() + "…"
    }
}
