// Entry point and CLI flow.
//
// Two modes share the same page view:
// - one-shot: load a domain, apply the filters given on the command line,
//   print the chart series and ranking tables and optionally write the
//   visible data summary as JSON;
// - interactive (`--interactive`): a menu that drills down Regency →
//   District → Village, shows summaries and forwards questions to the
//   chat assistant when one is configured.
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use village_dash::chat::{ChatAssistant, OpenAiCompletionClient};
use village_dash::config::{builtin_domains, AppConfig, StoreSettings};
use village_dash::dashboard::{PageView, ViewSettings, ViewState};
use village_dash::loader::{CsvDirStore, RecordStore, RestStore, DEFAULT_PAGE_SIZE};
use village_dash::output::{self, preview_table_rows, ranking_rows, series_rows, village_rows};
use village_dash::util;
use village_dash::ChatRequest;

const SESSION: &str = "cli";

#[derive(Debug, Parser)]
#[command(name = "village_dash", about = "Village-level regional statistics with drill-down")]
struct Args {
    /// TOML config file; defaults to village_dash.toml or the environment.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Domain page id (infrastructure, economy, health, ...).
    #[arg(long, default_value = "infrastructure")]
    domain: String,
    /// Read `<table>.csv` files from this directory instead of the configured store.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    #[arg(long)]
    region: Option<String>,
    #[arg(long)]
    subregion: Option<String>,
    #[arg(long)]
    locality: Option<String>,
    /// Write the visible data summary to this JSON file.
    #[arg(long)]
    summary_out: Option<String>,
    #[arg(long)]
    interactive: bool,
}

struct AppState {
    config: AppConfig,
    store: Box<dyn RecordStore>,
    page_size: usize,
    page: Option<PageView>,
    table_page: usize,
    assistant: Option<ChatAssistant<OpenAiCompletionClient>>,
}

fn build_store(config: &AppConfig, data_dir: Option<PathBuf>) -> Result<(Box<dyn RecordStore>, usize)> {
    if let Some(dir) = data_dir {
        return Ok((Box::new(CsvDirStore::new(dir)), DEFAULT_PAGE_SIZE));
    }
    match &config.store {
        StoreSettings::CsvDir { dir } => Ok((Box::new(CsvDirStore::new(dir.clone())), DEFAULT_PAGE_SIZE)),
        StoreSettings::Rest {
            base_url,
            api_key,
            page_size,
        } => {
            let store = RestStore::new(base_url, api_key, Duration::from_secs(30))
                .context("Failed to build record store client")?;
            Ok((Box::new(store), *page_size))
        }
    }
}

/// Read a single line of input after printing `prompt`.
fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    read_line("Enter choice: ")
}

/// Print numbered options and return the picked one; `0` or blank means "all".
fn pick_option(title: &str, options: &[String]) -> Option<String> {
    if options.is_empty() {
        println!("No {} options available.\n", title);
        return None;
    }
    println!("Select {} (0 = all):", title);
    for (idx, opt) in options.iter().enumerate() {
        println!("[{}] {}", idx + 1, opt);
    }
    match read_choice().parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => Some(options[n - 1].clone()),
        _ => Some(String::new()),
    }
}

fn print_view(page: &PageView) {
    let view = page.view();
    match &view.state {
        ViewState::Loading => {
            println!("Loading...\n");
            return;
        }
        ViewState::Error(message) => {
            println!("Error: could not load data ({}).\n", message);
            return;
        }
        ViewState::NoData => {
            println!("No data for the current selection.\n");
            return;
        }
        ViewState::Ready => {}
    }

    if let Some(summary) = &view.summary {
        println!(
            "{}: {} ({} villages)\n",
            page.config().title,
            summary.region_label,
            util::format_int(summary.village_count)
        );
    }
    for series in &view.series {
        println!("{} by {}", series.label, view.level);
        preview_table_rows(&series_rows(&series.points), 10);
    }
    if let Some(ranking) = &view.ranking {
        let label = page.config().metric_label(&ranking.metric);
        println!("Top {} by {}", view.level, label);
        preview_table_rows(&ranking_rows(&ranking.top), ranking.top.len());
        println!("Bottom {} by {}", view.level, label);
        preview_table_rows(&ranking_rows(&ranking.bottom), ranking.bottom.len());
    }
    println!("Map markers: {}\n", util::format_int(view.markers.len()));
}

fn handle_load(state: &mut AppState) {
    let ids: Vec<String> = builtin_domains().iter().map(|d| d.page_id.clone()).collect();
    let Some(page_id) = pick_option("domain", &ids).filter(|id| !id.is_empty()) else {
        println!("No domain selected.\n");
        return;
    };
    if let Err(e) = load_page(state, &page_id) {
        eprintln!("Failed to load domain: {:#}\n", e);
    }
}

fn load_page(state: &mut AppState, page_id: &str) -> Result<()> {
    let domain = state.config.domain(page_id)?;
    let mut page = PageView::new(domain, ViewSettings::from_app(&state.config));
    let report = page.load(state.store.as_ref(), state.page_size);
    println!(
        "Processing {}... ({} rows in {} pages)",
        report.table,
        util::format_int(report.total_rows),
        report.pages
    );
    if report.missing_metrics > 0 {
        println!(
            "Note: {} metric values were missing and follow the {:?} policy.",
            util::format_int(report.missing_metrics),
            page.config().missing
        );
    }
    println!();
    publish(state.assistant.as_mut(), &page);
    state.page = Some(page);
    state.table_page = 1;
    Ok(())
}

fn publish(assistant: Option<&mut ChatAssistant<OpenAiCompletionClient>>, page: &PageView) {
    if let Some(assistant) = assistant {
        assistant.publish(page.config(), page.view().summary.as_ref());
    }
}

fn handle_drill(state: &mut AppState, level: usize) {
    let Some(page) = state.page.as_mut() else {
        println!("Error: No data loaded. Please load a domain first (option 1).\n");
        return;
    };
    let selection = page.filter().selection().clone();
    match level {
        1 => {
            let options = page.filter().region_options().to_vec();
            if let Some(r) = pick_option("regency", &options) {
                page.set_region(&r);
            }
        }
        2 if selection.region.is_some() => {
            let options = page.filter().subregion_options().to_vec();
            if let Some(s) = pick_option("district", &options) {
                page.set_subregion(&s);
            }
        }
        3 if selection.subregion.is_some() => {
            let options = page.filter().locality_options().to_vec();
            if let Some(l) = pick_option("village", &options) {
                page.set_locality(&l);
            }
        }
        _ => {
            println!("Select the level above first.\n");
            return;
        }
    }
    state.table_page = 1;
    publish(state.assistant.as_mut(), page);
    print_view(page);
}

fn handle_villages(state: &mut AppState) {
    let Some(page) = state.page.as_ref() else {
        println!("Error: No data loaded. Please load a domain first (option 1).\n");
        return;
    };
    let table = page.table_page(state.table_page);
    println!("Villages (page {} of {})", table.page, table.total_pages);
    preview_table_rows(&village_rows(&table.items), table.items.len());
    state.table_page = if table.page >= table.total_pages { 1 } else { table.page + 1 };
}

fn handle_ask(state: &mut AppState) {
    let Some(page) = state.page.as_ref() else {
        println!("Error: No data loaded. Please load a domain first (option 1).\n");
        return;
    };
    let Some(assistant) = state.assistant.as_mut() else {
        println!("Chat assistant is not configured.\n");
        return;
    };
    let prompt = read_line("Question: ");
    if prompt.is_empty() {
        return;
    }
    let send_history = read_line("Include conversation history (Y/N): ").eq_ignore_ascii_case("y");
    let request = ChatRequest { prompt, send_history };
    match assistant.ask(SESSION, &page.config().page_id, &request) {
        Ok(answer) => println!("\n{}\n", answer.response),
        Err(e) => eprintln!("Assistant error: {}\n", e),
    }
}

fn handle_reset(state: &mut AppState) {
    if let Some(page) = state.page.as_mut() {
        page.reset();
        state.table_page = 1;
        publish(state.assistant.as_mut(), page);
        print_view(page);
    }
    if let Some(assistant) = state.assistant.as_mut() {
        assistant.reset(SESSION);
    }
}

fn run_interactive(mut state: AppState) {
    loop {
        println!("Village Dashboard:");
        println!("[1] Load a domain");
        println!("[2] Select regency");
        println!("[3] Select district");
        println!("[4] Select village");
        println!("[5] Show current view");
        println!("[6] List villages (next page)");
        println!("[7] Ask the assistant");
        println!("[8] Reset filters and conversation");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(&mut state),
            "2" => handle_drill(&mut state, 1),
            "3" => handle_drill(&mut state, 2),
            "4" => handle_drill(&mut state, 3),
            "5" => match state.page.as_ref() {
                Some(page) => print_view(page),
                None => println!("Error: No data loaded. Please load a domain first (option 1).\n"),
            },
            "6" => handle_villages(&mut state),
            "7" => handle_ask(&mut state),
            "8" => handle_reset(&mut state),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-8.\n"),
        }
    }
}

fn run_once(mut state: AppState, args: &Args) -> Result<()> {
    load_page(&mut state, &args.domain)?;
    let page = state
        .page
        .as_mut()
        .ok_or_else(|| anyhow!("page {} did not load", args.domain))?;

    if args.region.is_some() || args.subregion.is_some() || args.locality.is_some() {
        page.select_path(
            args.region.as_deref(),
            args.subregion.as_deref(),
            args.locality.as_deref(),
        );
    }
    print_view(page);

    if let Some(path) = &args.summary_out {
        match &page.view().summary {
            Some(summary) => {
                output::write_json(path, summary).map_err(|e| anyhow!("{}", e))?;
                info!("Summary written to {}", path);
            }
            None => warn!("No summary to write; nothing was loaded"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_config_file(path),
        None => AppConfig::from_default_sources(),
    }
    .context("Failed to load configuration")?;

    let (store, page_size) = build_store(&config, args.data_dir.clone())?;
    let assistant = match &config.llm {
        Some(llm) => match ChatAssistant::from_settings(llm) {
            Ok(a) => Some(a),
            Err(e) => {
                warn!("Chat assistant disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let state = AppState {
        config,
        store,
        page_size,
        page: None,
        table_page: 1,
        assistant,
    };
    if args.interactive {
        run_interactive(state);
        Ok(())
    } else {
        run_once(state, &args)
    }
}
