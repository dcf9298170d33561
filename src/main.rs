//! Tome - chapter indexer and windowed layout for huge plain-text novels.
//!
//! # Usage
//!
//! ```bash
//! tome novel.txt --list
//! tome novel.txt --chapter 12 --width 60
//! tome novel.txt --encoding gbk --pattern '^Chapter [0-9]+'
//! ```

use std::io::{Write, stdout};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use tome::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    parse_flag_tokens, save_config_flags,
};
use tome::layout::{CellMetrics, ChapterWindow, DEFAULT_INDENT, LayoutStyle};
use tome::perf;
use tome::reader::{Message, Model, Reader};

const DEFAULT_COLUMNS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;
const INDEX_TIMEOUT: Duration = Duration::from_secs(600);

/// Chapter indexer and reader for very large plain-text novels
#[derive(Parser, Debug)]
#[command(name = "tome", version, about, long_about = None)]
struct Cli {
    /// Plain-text novel to open
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Print the chapter titles and exit
    #[arg(short, long)]
    list: bool,

    /// Chapter to lay out (1-based)
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    chapter: usize,

    /// Layout width in columns (default: terminal width)
    #[arg(short, long, value_name = "COLS")]
    width: Option<u16>,

    /// Regular expression matching chapter headings
    #[arg(long, value_name = "REGEX")]
    pattern: Option<String>,

    /// Text encoding label such as gbk or utf-8, or auto
    #[arg(long, value_name = "LABEL")]
    encoding: Option<String>,

    /// Maximum chapters kept laid out at once
    #[arg(long, value_name = "K")]
    window: Option<usize>,

    /// Print timing information
    #[arg(long)]
    perf: bool,

    /// Write indexing and layout events to a file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

/// One terminal cell per column and row, a blank row between paragraphs.
fn terminal_style() -> LayoutStyle {
    LayoutStyle {
        font_size: 16.0,
        line_spacing: 1.0,
        letter_spacing: 0.0,
        paragraph_spacing: 1.0,
        indent: DEFAULT_INDENT.to_string(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = effective
        .debug_log
        .clone()
        .or_else(|| std::env::var_os("TOME_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(debug_log_path.as_deref()) {
        tracing::warn!(
            path = ?debug_log_path,
            %err,
            "failed to initialize debug log"
        );
    }

    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }

    let index_config = effective.index_config()?;
    let (columns, rows) = crossterm::terminal::size().unwrap_or((DEFAULT_COLUMNS, DEFAULT_ROWS));
    let columns = cli.width.or(effective.width).unwrap_or(columns).max(1);
    let window = ChapterWindow::new(
        CellMetrics::terminal(16.0),
        terminal_style(),
        effective.window_config(),
        f64::from(columns),
        f64::from(rows),
    );

    let mut reader = Reader::new(Model::new(window), index_config);
    reader.open(cli.file.clone());
    if !cli.list {
        reader.dispatch(Message::JumpToChapter(cli.chapter.saturating_sub(1)));
    }
    if !reader.run_until_idle(INDEX_TIMEOUT) {
        anyhow::bail!("Timed out reading {}", cli.file.display());
    }

    let model = reader.model();
    let mut out = stdout().lock();
    if cli.list {
        for (i, title) in model.titles.iter().enumerate() {
            writeln!(out, "{:>5}  {title}", i + 1).context("Failed to write output")?;
        }
        eprintln!("{}", model.status);
        return Ok(());
    }

    let chapter = cli.chapter.saturating_sub(1);
    let Some(slot) = model
        .window
        .slot_of_chapter(chapter)
        .and_then(|idx| model.window.slot(idx))
    else {
        anyhow::bail!("{}", model.status);
    };
    for (i, paragraph) in slot.paragraphs().iter().enumerate() {
        if i > 0 {
            writeln!(out).context("Failed to write output")?;
        }
        for line in 0..paragraph.lines().len() {
            writeln!(out, "{}", paragraph.line_text(line)).context("Failed to write output")?;
        }
    }
    if let Some(progress) = model.progress_label() {
        eprintln!("{progress}  ({})", model.status);
    }
    Ok(())
}
