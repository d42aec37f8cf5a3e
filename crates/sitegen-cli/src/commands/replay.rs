use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use sitegen::patch::LineRange;
use sitegen::transport::from_chunks;
use sitegen::{
    EngineConfig, GenerationMode, GenerationSession, Page, PageCollection, ReconcileStats,
    SessionEvent,
};
use std::path::{Component, Path, PathBuf};
use tokio::sync::mpsc;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Full,
    NewPage,
    Patch,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Full => GenerationMode::FullRegeneration,
            ModeArg::NewPage => GenerationMode::NewPage,
            ModeArg::Patch => GenerationMode::IncrementalPatch,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// How the response was requested
    #[arg(long, value_enum)]
    mode: ModeArg,

    /// File holding the raw model output
    #[arg(long)]
    stream: PathBuf,

    /// Directory of existing `*.html` pages to start from
    #[arg(long)]
    pages: Option<PathBuf>,

    /// Directory to write the resulting pages to
    #[arg(long)]
    out: Option<PathBuf>,

    /// Bytes per simulated network chunk
    #[arg(long, default_value_t = 64)]
    chunk_size: usize,

    /// Model that produced the output; enables reasoning detection for thinkers
    #[arg(long)]
    model: Option<String>,

    /// YAML engine configuration
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    pages: Vec<&'a str>,
    active_page: Option<&'a str>,
    updated_lines: &'a [LineRange],
    stats: &'a ReconcileStats,
    cancelled: bool,
}

pub async fn run(args: ReplayArgs) -> Result<()> {
    if args.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }

    let config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?
            .with_env_overrides()?,
        None => EngineConfig::from_env()?,
    };
    let base = match &args.pages {
        Some(dir) => load_pages(dir)?,
        None => PageCollection::new(),
    };
    let text = std::fs::read_to_string(&args.stream)
        .with_context(|| format!("failed to read {}", args.stream.display()))?;

    let mut session = GenerationSession::new(args.mode.into(), base, &config);
    if let Some(model) = &args.model {
        session = session.with_model(model, &config);
    }
    tracing::info!(session_id = %session.id(), bytes = text.len(), "replaying stream");

    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let (tx, mut rx) = mpsc::channel(64);
    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            report(&event);
        }
    });

    let chunks = split_chunks(&text, args.chunk_size);
    let result = session.run(from_chunks(chunks), tx).await;
    reporter.await.context("event reporter panicked")?;
    let outcome = result.context("generation failed")?;

    if let Some(out) = &args.out {
        write_pages(out, &outcome.pages)?;
    }

    let summary = Summary {
        pages: outcome.pages.paths().collect(),
        active_page: outcome.active_page.as_deref(),
        updated_lines: &outcome.updated_lines,
        stats: &outcome.stats,
        cancelled: outcome.cancelled,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::Thinking(thought) => {
            tracing::debug!(chars = thought.len(), "thinking");
        }
        SessionEvent::FinishedThinking => tracing::info!("finished thinking"),
        SessionEvent::Updated(update) => tracing::info!(
            pages = update.pages.len(),
            active_page = update.active_page.as_deref().unwrap_or("-"),
            updated_lines = update.updated_lines.len(),
            "pages updated"
        ),
    }
}

/// Splits `text` into pieces of at most `size` bytes without cutting a
/// character in half. A piece grows past `size` only when a single character
/// is wider than `size`.
fn split_chunks(text: &str, size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > size {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn load_pages(dir: &Path) -> Result<PageCollection> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "html"))
        .collect();
    files.sort();

    let mut pages = PageCollection::new();
    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let html = std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        pages.upsert(Page::new(name, html));
    }
    tracing::info!(pages = pages.len(), dir = %dir.display(), "loaded base pages");
    Ok(pages)
}

/// Location of `page_path` inside `out`. Root-like paths map to `index.html`;
/// paths that would escape `out` are rejected.
fn output_path(out: &Path, page_path: &str) -> Result<PathBuf> {
    let relative = page_path.trim_start_matches('/');
    let relative = match relative {
        "" | "index" => "index.html",
        other => other,
    };
    let candidate = Path::new(relative);
    if candidate
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        bail!("refusing to write page outside the output directory: {page_path}");
    }
    Ok(out.join(candidate))
}

fn write_pages(out: &Path, pages: &PageCollection) -> Result<()> {
    for page in pages {
        let target = output_path(out, &page.path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&target, &page.html)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    Ok(())
}
