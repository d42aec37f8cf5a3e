use anyhow::{Context, Result};
use serde::Serialize;
use sitegen::protocol::BlockKind;
use sitegen::scanner::scan;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct ScanArgs {
    /// File holding the raw model output
    #[arg(long)]
    stream: PathBuf,
}

#[derive(Debug, Serialize)]
struct BlockSummary<'a> {
    kind: BlockKind,
    path: &'a str,
    content_len: usize,
    provisional: bool,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.stream)
        .with_context(|| format!("failed to read {}", args.stream.display()))?;

    let blocks: Vec<BlockSummary<'_>> = scan(&text)
        .into_iter()
        .map(|block| BlockSummary {
            kind: block.kind,
            path: block.path,
            content_len: block.content.len(),
            provisional: block.provisional,
        })
        .collect();
    tracing::debug!(blocks = blocks.len(), "scanned stream");

    println!("{}", serde_json::to_string_pretty(&blocks)?);
    Ok(())
}
