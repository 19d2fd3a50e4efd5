//! Page Reader CLI - read a document page by page, translated into your language.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use page_reader_core::{
    AppConfig, DisplayState, DisplayStatus, Document, Granularity, Lang, OcrPipeline, PageRenderer,
    PdfDocument, ReadingSession, VisionRecognizer, display_languages, language_name,
    session_options,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "page-reader")]
#[command(author, version, about = "Read documents page by page in your own language", long_about = None)]
struct Args {
    /// Document to read (PDF or plain text)
    #[arg(required = true)]
    input: PathBuf,

    /// Language to read in
    #[arg(short = 'd', long)]
    display_lang: Option<String>,

    /// Document language ("auto" to detect)
    #[arg(short = 's', long)]
    source_lang: Option<String>,

    /// Page to open at (default: last saved position)
    #[arg(long)]
    page: Option<usize>,

    /// Skip OCR for pages without extractable text
    #[arg(long)]
    no_ocr: bool,

    /// Recognize fewer pages at a time
    #[arg(long)]
    low_memory: bool,

    /// Do not save reading progress
    #[arg(long)]
    no_save: bool,

    /// Translation API base URL
    #[arg(long, env = "OPENAI_API_BASE")]
    api_base: Option<String>,

    /// Translation API key
    #[arg(long, env = "OPENAI_API_KEY")]
    api_key: Option<String>,

    /// Translation model
    #[arg(long, env = "OPENAI_MODEL")]
    model: Option<String>,

    /// OCR (vision model) API base URL
    #[arg(long, env = "OCR_API_BASE")]
    ocr_api_base: Option<String>,

    /// OCR API key
    #[arg(long, env = "OCR_API_KEY")]
    ocr_api_key: Option<String>,

    /// OCR vision model
    #[arg(long, env = "OCR_MODEL")]
    ocr_model: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Layer command-line flags over the loaded configuration
    fn apply(&self, config: &mut AppConfig) {
        if let Some(lang) = &self.display_lang {
            config.display_lang = Lang::new(lang);
        }
        if let Some(lang) = &self.source_lang {
            config.source_lang = Lang::new(lang);
        }
        if let Some(api_base) = &self.api_base {
            config.translator.api_base.clone_from(api_base);
        }
        if let Some(api_key) = &self.api_key {
            config.translator.api_key = Some(api_key.clone());
        }
        if let Some(model) = &self.model {
            config.translator.model.clone_from(model);
        }
        if let Some(api_base) = &self.ocr_api_base {
            config.ocr.api_base.clone_from(api_base);
        }
        if let Some(api_key) = &self.ocr_api_key {
            config.ocr.api_key = Some(api_key.clone());
        }
        if let Some(model) = &self.ocr_model {
            config.ocr.model.clone_from(model);
        }
        if self.no_ocr {
            config.ocr.enabled = false;
        }
        if self.low_memory {
            config.ocr.low_memory = true;
        }
        if self.no_save {
            config.storage.enabled = false;
        }
    }
}

/// A line typed at the prompt
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Next,
    Previous,
    GoTo(usize),
    Lang(String),
    Languages,
    Word(String),
    Paragraph(String),
    Mark(Option<String>),
    Back,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(h, r)| (h, r.trim()));

        match (head, rest) {
            ("", _) => Self::Empty,
            ("n" | "next", "") => Self::Next,
            ("p" | "prev", "") => Self::Previous,
            ("g" | "go", page) => page
                .parse()
                .map_or_else(|_| Self::Invalid(format!("not a page number: {page}")), Self::GoTo),
            ("lang", "") => Self::Languages,
            ("lang", code) => Self::Lang(code.to_string()),
            ("word", text) if !text.is_empty() => Self::Word(text.to_string()),
            ("para", text) if !text.is_empty() => Self::Paragraph(text.to_string()),
            ("mark", "") => Self::Mark(None),
            ("mark", label) => Self::Mark(Some(label.to_string())),
            ("back", "") => Self::Back,
            ("h" | "help" | "?", "") => Self::Help,
            ("q" | "quit", "") => Self::Quit,
            _ => Self::Invalid(format!("unknown command: {line}")),
        }
    }
}

const HELP: &str = "\
n | p            next / previous page
g <page>         go to page
lang [code]      read in another language (e.g. lang es); list languages
word <text>      translate a word
para <text>      translate a passage
mark [label]     bookmark this page
back             return to the bookmark
q                quit";

/// Terminal output that stays out of the way of the OCR progress bar
struct Screen {
    progress: Option<ProgressBar>,
}

impl Screen {
    #[allow(clippy::print_stdout)]
    fn print(&self, text: &str) {
        match &self.progress {
            Some(pb) if !pb.is_finished() => pb.suspend(|| println!("{text}")),
            _ => println!("{text}"),
        }
    }

    fn render(&self, display: &DisplayState, total: usize) {
        let header = format!("──── Page {}/{} ────", display.page, total);
        let body = match &display.status {
            DisplayStatus::Translating { language } => {
                format!("(translating into {}...)", language.display_name())
            }
            DisplayStatus::AwaitingOcr => "(waiting for text recognition...)".to_string(),
            DisplayStatus::Unreadable => "(this page could not be recognized)".to_string(),
            DisplayStatus::Original { fallback: true } => {
                format!("(translation unavailable, showing original)\n\n{}", display.text())
            }
            DisplayStatus::Original { fallback: false } | DisplayStatus::Translated { .. } => {
                display.text().to_string()
            }
        };
        self.print(&format!("\n{header}\n{body}\n"));
    }

    fn track_ocr(&self, session: &ReadingSession) {
        let state = session.ocr_state();
        let Some(pb) = &self.progress else {
            return;
        };

        #[allow(clippy::cast_possible_truncation)]
        pb.set_position(state.completed as u64);
        if !state.in_progress && !pb.is_finished() {
            if state.failed {
                pb.abandon_with_message("OCR failed");
            } else {
                pb.finish_with_message("OCR complete");
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Ingest the input file. Returns a rasterizer for OCR when the file is a PDF.
fn load_document(path: &Path, config: &AppConfig) -> Result<(Document, Option<PageRenderer>)> {
    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled")
        .to_string();
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    if mime == mime_guess::mime::APPLICATION_PDF {
        info!("Loading PDF: {}", path.display());
        let pdf = PdfDocument::from_file(path)
            .with_context(|| format!("Failed to load PDF: {}", path.display()))?;
        let document = Document::from_pdf(&pdf, &title, config.display_lang.clone())
            .context("PDF has no pages")?;
        let renderer = PageRenderer::with_scale(pdf, config.ocr.render_scale);
        return Ok((document, Some(renderer)));
    }

    if mime.type_() == mime_guess::mime::TEXT {
        info!("Loading text: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let document = Document::from_text(
            &title,
            &text,
            config.chars_per_page,
            config.display_lang.clone(),
        )
        .context("Document is empty")?;
        return Ok((document, None));
    }

    bail!("Unsupported file type {} for {}", mime, path.display())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };
    args.apply(&mut config);

    let (mut document, renderer) = load_document(&args.input, &config)?;
    document.source_language = config.asserted_source_lang();
    let needs_ocr = document.needs_ocr();

    let mut session = ReadingSession::open(document, session_options(&config)).await;
    if let Some(page) = args.page {
        session
            .go_to_page(page)
            .with_context(|| format!("Cannot open at page {page}"))?;
    }

    let mut screen = Screen { progress: None };

    match renderer {
        Some(renderer) if needs_ocr && config.ocr.enabled => {
            let pipeline = OcrPipeline::new(Arc::new(VisionRecognizer::new(&config.ocr)), &config.ocr);

            #[allow(clippy::cast_possible_truncation)]
            let pb = ProgressBar::new(session.total_pages() as u64);
            // Template is hardcoded and valid, unwrap is safe
            #[allow(clippy::unwrap_used)]
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} OCR [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            screen.progress = Some(pb);

            session.start_ocr(pipeline, Arc::new(renderer));
        }
        _ if needs_ocr => warn!("Some pages have no text and OCR is off; they will stay empty"),
        _ => {}
    }

    screen.print(&format!(
        "{} ({} pages), reading in {}. Type 'help' for commands.",
        session.title(),
        session.total_pages(),
        language_name(session.display_language().as_str())
    ));

    let mut display_rx = session.subscribe();
    screen.render(&display_rx.borrow_and_update(), session.total_pages());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                match Command::parse(&line) {
                    Command::Quit => break,
                    command => run_command(&mut session, &screen, command).await,
                }
            }
            Some(event) = session.next_event() => {
                session.handle_event(event);
                screen.track_ocr(&session);
            }
            Ok(()) = display_rx.changed() => {
                let display = display_rx.borrow_and_update().clone();
                screen.render(&display, session.total_pages());
            }
        }
    }

    session.close().await;
    Ok(())
}

async fn run_command(session: &mut ReadingSession, screen: &Screen, command: Command) {
    match command {
        Command::Next => {
            if !session.next_page() {
                screen.print("(last page)");
            }
        }
        Command::Previous => {
            if !session.previous_page() {
                screen.print("(first page)");
            }
        }
        Command::GoTo(page) => {
            if let Err(e) = session.go_to_page(page) {
                screen.print(&e.to_string());
            }
        }
        Command::Lang(code) => session.set_display_language(Lang::new(code)),
        Command::Languages => {
            let list: Vec<String> = display_languages()
                .iter()
                .map(|l| format!("{:6} {}", l.code, l.name))
                .collect();
            screen.print(&list.join("\n"));
        }
        Command::Word(text) => lookup(session, screen, &text, Granularity::Word).await,
        Command::Paragraph(text) => lookup(session, screen, &text, Granularity::Paragraph).await,
        Command::Mark(label) => {
            session.set_bookmark(label);
            screen.print(&format!("Bookmarked page {}", session.current_page()));
        }
        Command::Back => match session.go_to_bookmark() {
            Ok(true) => {}
            Ok(false) => screen.print("No bookmark set"),
            Err(e) => screen.print(&e.to_string()),
        },
        Command::Help => screen.print(HELP),
        Command::Invalid(message) => screen.print(&format!("{message} (type 'help')")),
        Command::Empty | Command::Quit => {}
    }
}

async fn lookup(session: &ReadingSession, screen: &Screen, text: &str, granularity: Granularity) {
    match session.translate_selection(text, granularity).await {
        Some(translated) => screen.print(&format!("{text} → {translated}")),
        None => screen.print("(translation unavailable)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("n"), Command::Next);
        assert_eq!(Command::parse("  p "), Command::Previous);
        assert_eq!(Command::parse("g 12"), Command::GoTo(12));
        assert_eq!(Command::parse("lang es"), Command::Lang("es".to_string()));
        assert_eq!(Command::parse("lang"), Command::Languages);
        assert_eq!(
            Command::parse("word  bonjour"),
            Command::Word("bonjour".to_string())
        );
        assert_eq!(Command::parse("mark"), Command::Mark(None));
        assert_eq!(
            Command::parse("mark chapter 3"),
            Command::Mark(Some("chapter 3".to_string()))
        );
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(Command::parse("q"), Command::Quit);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(Command::parse("g twelve"), Command::Invalid(_)));
        assert!(matches!(Command::parse("word"), Command::Invalid(_)));
        assert!(matches!(Command::parse("jump 3"), Command::Invalid(_)));
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "page-reader",
            "book.pdf",
            "--display-lang",
            "es",
            "--no-ocr",
            "--model",
            "local",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);

        assert_eq!(config.display_lang.as_str(), "es");
        assert!(!config.ocr.enabled);
        assert_eq!(config.translator.model, "local");
        assert!(config.source_lang.is_auto());
    }
}
