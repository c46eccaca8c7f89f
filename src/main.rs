//! AI Translator
//!
//! Interactive terminal front end: type text to translate it, pick languages,
//! browse and filter the saved history, or scan text from an image.

use ai_translator::config::Config;
use ai_translator::dashboard::{Dashboard, DashboardEntry, LanguagePair};
use ai_translator::events::{current_timestamp_ms, SessionEvent};
use ai_translator::languages::LanguageDictionary;
use ai_translator::ocr::{capture_image, ImageSource, TesseractRecognizer, TextSelection};
use ai_translator::quality::{report, run_benchmark, BENCHMARK_CASES};
use ai_translator::session::{
    LanguageRole, SessionError, SessionPhase, TranslateOutcome, TranslationSession,
};
use ai_translator::share::{default_share_dir, ShareCard};
use ai_translator::store::{SqliteStore, TranslationStore};
use ai_translator::timefmt::format_local;
use ai_translator::translator::{HttpTranslator, WhatlangDetector};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use terminal_size::{terminal_size, Width};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
Type any text to translate it. Commands:
  :from <language>|-     set or clear the source language
  :to <language>|-       set or clear the target language
  :translate             translate again
  :save                  save the current translation
  :open <id>             load a saved translation
  :new                   start over
  :history [text]        list saved translations, optionally filtered
  :pair <src> <tgt>|-    filter the history by language codes
  :delete <id>           delete a saved translation
  :share <id> [dir]      print a translation card and save it to a file
  :scan camera|gallery [path]  pick text from an image
  :languages [from|to]   list available languages
  :quit";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - use RUST_LOG env var, defaulting to info level
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ai_translator=info")),
        )
        .init();

    let config = Config::load()?;
    let args: Vec<String> = std::env::args().skip(1).collect();

    let translator = Arc::new(
        HttpTranslator::new(
            &config.translation_api_url,
            config.translation_backend.clone(),
            config.translate_timeout,
        )
        .context("Failed to build the HTTP client")?,
    );

    match args.first().map(String::as_str) {
        Some("eval") => {
            let results = run_benchmark(translator.as_ref(), &BENCHMARK_CASES).await;
            println!("{}", report(&results));
            return Ok(());
        }
        Some("history") => {
            let store = SqliteStore::open(&config.database_path)
                .context("Failed to open the translation history")?;
            let json = args.iter().any(|a| a == "--json");
            let filter: Vec<&str> = args[1..]
                .iter()
                .filter(|a| *a != "--json")
                .map(String::as_str)
                .collect();
            let mut dashboard = Dashboard::new(Arc::new(LanguageDictionary::new()));
            dashboard.set_text_filter(&filter.join(" "));
            let entries = dashboard.project(&store.get_all()?);
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_history(&entries);
            }
            return Ok(());
        }
        Some(other) if other != "repl" => {
            eprintln!("Usage: ai-translator [repl | eval | history [--json] [text]]");
            std::process::exit(2);
        }
        _ => {}
    }

    print_banner();
    println!(
        "{} {} {}\n",
        "Backend:".bright_yellow(),
        format!("{:?}", config.translation_backend).bright_green().bold(),
        config.translation_api_url.dimmed()
    );

    let dictionary = Arc::new(LanguageDictionary::new());
    let store: Arc<dyn TranslationStore> = Arc::new(
        SqliteStore::open(&config.database_path)
            .context("Failed to open the translation history")?,
    );
    let session = Arc::new(TranslationSession::new(
        dictionary.clone(),
        Arc::new(WhatlangDetector::new(config.detection_confidence_threshold)),
        translator,
        store.clone(),
        config.session_settings(),
    ));
    let mut dashboard = Dashboard::new(dictionary);

    spawn_toasts(&session);
    info!("Ready");
    println!("{}\n", "Type :help for commands.".dimmed());

    let mut input: Input = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, arg) = match line.strip_prefix(':') {
            Some(rest) => {
                let (cmd, arg) = rest.split_once(' ').unwrap_or((rest, ""));
                (Some(cmd), arg.trim())
            }
            None => (None, line),
        };

        match command {
            None => report_outcome(&session, session.on_text_changed(arg).await),
            Some("from") => select(&session, LanguageRole::Source, arg).await,
            Some("to") => select(&session, LanguageRole::Target, arg).await,
            Some("translate") => report_outcome(&session, session.translate().await.map(Some)),
            Some("save") => match session.save().await {
                Ok(id) => println!("{} #{}", "Saved".bright_green(), id),
                Err(e) => print_error(&e),
            },
            Some("open") => match arg.parse() {
                Ok(id) => match session.load(id).await {
                    Ok(text) => {
                        println!("{} {}", "Text:".bright_yellow(), text);
                        print_state(&session);
                    }
                    Err(e) => print_error(&e),
                },
                Err(_) => println!("{}", "Usage: :open <id>".red()),
            },
            Some("new") => {
                session.reset();
                println!("{}", "New translation".dimmed());
            }
            Some("history") => {
                dashboard.set_text_filter(arg);
                match store.get_all() {
                    Ok(records) => print_history(&dashboard.project(&records)),
                    Err(e) => print_error(&e),
                }
            }
            Some("pair") => {
                let pair = match arg.split_whitespace().collect::<Vec<_>>()[..] {
                    [source, target] => Some(LanguagePair::new(source, target)),
                    _ => None,
                };
                match &pair {
                    Some(pair) => println!("{} {}", "Filtering by".dimmed(), pair),
                    None => println!("{}", "Pair filter cleared".dimmed()),
                }
                dashboard.set_pair_filter(pair);
            }
            Some("delete") => match arg.parse() {
                Ok(id) => match dashboard.delete(store.as_ref(), id) {
                    Ok(remaining) => println!(
                        "{} #{} ({} left)",
                        "Deleted".bright_green(),
                        id,
                        remaining.len()
                    ),
                    Err(e) => print_error(&e),
                },
                Err(_) => println!("{}", "Usage: :delete <id>".red()),
            },
            Some("share") => share(store.as_ref(), &mut dashboard, arg),
            Some("scan") => scan(&session, &config, arg, &mut input).await?,
            Some("languages") => {
                let selector = if arg.is_empty() { "to" } else { arg };
                let names = session.dictionary().names_for_selector(selector);
                if names.is_empty() {
                    println!("{}", "Usage: :languages [from|to]".red());
                } else {
                    println!("{}", names.join(", "));
                }
            }
            Some("help") => println!("{}", HELP),
            Some("quit") | Some("q") => break,
            Some(other) => println!("{} :{}", "Unknown command".red(), other),
        }

        // The error flag is a one-shot signal.
        if session.take_error() {
            println!("{}", "Something went wrong, please try again.".red().bold());
        }
    }

    Ok(())
}

fn print_banner() {
    // Get terminal width for dynamic box sizing
    let term_width = terminal_size()
        .map(|(Width(w), _)| w as usize)
        .unwrap_or(80)
        .saturating_sub(1);

    let title = "AI Translator";
    let subtitle = "Type, detect, translate, remember";
    let inner_width = term_width.saturating_sub(2);

    let top_border = format!("╔{}╗", "═".repeat(inner_width));
    let bottom_border = format!("╚{}╝", "═".repeat(inner_width));

    println!("\n{}", top_border.bright_cyan().bold());
    println!("{}", centered(title, inner_width).bright_cyan().bold());
    println!("{}", centered(subtitle, inner_width).bright_cyan().bold());
    println!("{}\n", bottom_border.bright_cyan().bold());
}

fn centered(text: &str, inner_width: usize) -> String {
    let len = text.chars().count();
    let padding = inner_width.saturating_sub(len) / 2;
    format!(
        "║{}{}{: <width$}║",
        " ".repeat(padding),
        text,
        "",
        width = inner_width.saturating_sub(padding + len)
    )
}

/// Prints session notifications as they arrive.
fn spawn_toasts(session: &TranslationSession) {
    let mut events = session.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::LanguageDetected(e) => {
                    println!("{} {}", "Detected:".bright_yellow(), e.name.bright_magenta())
                }
                SessionEvent::Saved(e) if e.created => {
                    println!("{}", format!("Saved as #{}", e.id).dimmed())
                }
                SessionEvent::Saved(_) => {}
                SessionEvent::SaveFailed(e) => {
                    println!("{} {}", "Failed to save:".red(), e.reason)
                }
                SessionEvent::TranslationFailed(e) => {
                    println!("{} {}", "Translation failed:".red(), e.reason)
                }
                SessionEvent::LoadFailed(e) => println!("{} {}", "Failed to load:".red(), e.reason),
            }
        }
    });
}

async fn select(session: &TranslationSession, role: LanguageRole, arg: &str) {
    let name = match arg {
        "" | "-" => None,
        name => Some(name),
    };
    report_outcome(session, session.select_language(role, name).await);
}

fn report_outcome(
    session: &TranslationSession,
    outcome: Result<Option<TranslateOutcome>, SessionError>,
) {
    match outcome {
        Ok(Some(TranslateOutcome::Superseded)) => {}
        Ok(_) => print_state(session),
        // Translation failures are already reported by the toast task.
        Err(SessionError::Timeout(_)) | Err(SessionError::Translation(_)) => {}
        Err(e) => print_error(&e),
    }
}

fn print_state(session: &TranslationSession) {
    let state = session.state();
    let from = state.source_language.as_deref().unwrap_or("?");
    let to = state.target_language.as_deref().unwrap_or("?");

    match state.phase {
        SessionPhase::Ready => println!(
            "{} {}",
            format!("[{} → {}]", from, to).bright_blue(),
            state.translated_text.bright_white().bold()
        ),
        SessionPhase::AwaitingTarget => {
            println!("{} {}", from.bright_magenta(), "- pick a target with :to".dimmed())
        }
        SessionPhase::AwaitingDetection => {
            println!("{}", "Source language unknown, set it with :from".dimmed())
        }
        _ => {}
    }
}

fn print_error(e: &dyn std::error::Error) {
    println!("{} {}", "Error:".red().bold(), e);
}

fn print_history(entries: &[DashboardEntry]) {
    if entries.is_empty() {
        println!("{}", "No translations yet".dimmed());
        return;
    }

    for entry in entries {
        let record = &entry.record;
        let text = entry.color.darker();
        let badge = format!(" {} ", entry.pair)
            .on_truecolor(entry.color.r, entry.color.g, entry.color.b)
            .truecolor(text.r, text.g, text.b);
        println!(
            "{} {} {}  {}",
            format!("#{}", record.id.unwrap_or_default()).dimmed(),
            badge,
            format_local(record.created_at_millis).dimmed(),
            record.source_text
        );
        if !record.translated_text.is_empty() {
            println!("      {}", record.translated_text.bright_white());
        }
    }
}

fn share(store: &dyn TranslationStore, dashboard: &mut Dashboard, arg: &str) {
    let (id, dir) = arg.split_once(' ').unwrap_or((arg, ""));
    let Ok(id) = id.parse() else {
        println!("{}", "Usage: :share <id> [dir]".red());
        return;
    };
    let record = match store.get_by_id(id) {
        Ok(record) => record,
        Err(e) => {
            print_error(&e);
            return;
        }
    };

    let pair = LanguagePair::from_record(dashboard.dictionary(), &record);
    let color = dashboard.color_for(&pair);
    let card = ShareCard::new(&record, format_local(record.created_at_millis));
    println!("{}", card.render().truecolor(color.r, color.g, color.b));

    let dir = match dir.trim() {
        "" => default_share_dir(),
        dir => PathBuf::from(dir),
    };
    match card.write_to(&dir, current_timestamp_ms()) {
        Ok(path) => println!("{} {}", "Saved card to".bright_green(), path.display()),
        Err(e) => print_error(&e),
    }
}

async fn scan(
    session: &TranslationSession,
    config: &Config,
    arg: &str,
    input: &mut Input,
) -> Result<()> {
    let (selector, path) = arg.split_once(' ').unwrap_or((arg, ""));

    let source = match ImageSource::from_selector(selector) {
        Ok(source) => source,
        Err(e) => {
            print_error(&e);
            return Ok(());
        }
    };

    let image = match source {
        ImageSource::Gallery if path.trim().is_empty() => {
            println!("{}", "Usage: :scan gallery <path>".red());
            return Ok(());
        }
        ImageSource::Gallery => PathBuf::from(path.trim()),
        ImageSource::Camera => {
            let dest = std::env::temp_dir().join("ai-translator-capture.jpg");
            if let Err(e) = capture_image(&config.camera_command, &dest).await {
                print_error(&e);
                return Ok(());
            }
            dest
        }
    };

    let mut selection = TextSelection::new(Arc::new(TesseractRecognizer::new(
        config.tesseract_bin.clone(),
    )));
    let fetched = selection.fetch(&image).await.map(|_| ());
    if let Err(e) = fetched {
        selection.take_error();
        print_error(&e);
        return Ok(());
    }

    for (i, block) in selection.blocks().iter().enumerate() {
        println!("{} {}", format!("[{}]", i + 1).bright_yellow(), block);
    }
    println!("{}", "Pick a block number (empty to cancel):".dimmed());

    let Some(choice) = input.next_line().await? else {
        return Ok(());
    };
    let picked = choice
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| selection.select(i))
        .map(str::to_string);

    if let Some(text) = picked {
        println!("{} {}", "Text:".bright_yellow(), text);
        report_outcome(session, session.on_text_changed(&text).await);
    }
    Ok(())
}
