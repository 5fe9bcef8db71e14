use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use rayon::prelude::*;

use pdfcrop::ParseError;
use pdfcrop::bbox::{BoundsProvider, FixedBounds, Ghostscript, RecordedBounds};
use pdfcrop::crop::{plan_crop, Margins, Rect};
use pdfcrop::pages::enumerate_pages;
use pdfcrop::reader::Document;
use pdfcrop::writer::{Update, WriterError};

/// Crop PDF pages by appending updated page layouts to the file instead of re-rendering
/// it entirely, which preserves bookmarks, annotations and other document metadata.
#[derive(Parser, Debug)]
#[command(name = "pdfcrop", version)]
struct Args {
    /// Input PDF files, modified in place unless --output is given
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// GhostScript bounding box resolution (dpi)
    #[arg(short, long, default_value_t = 100)]
    resolution: u32,

    /// Manual bounding box for all pages: "<x1> <y1> <x2> <y2>"
    #[arg(short, long, value_parser = parse_rect)]
    bbox: Option<Rect>,

    /// File with pre-recorded %%BoundingBox lines, one per page
    #[arg(short = 'B', long = "bbox-file")]
    bbox_file: Option<PathBuf>,

    /// Pad bounding boxes with extra margins: "<l> [<b> [<r> [<t>]]]" points
    #[arg(short, long, default_value = "0")]
    margin: Margins,

    /// 1-based pages to process, e.g. "1,3-5" (default: all)
    #[arg(short, long, value_parser = parse_pages)]
    pages: Option<PageSelection>,

    /// Write the result here instead of appending to the input (single input only)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds to wait for the bounding box renderer
    #[arg(short, long, default_value_t = 60)]
    timeout: u64,

    /// Increase log verbosity (-v: info, -vv: debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Silence all log output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone)]
struct PageSelection(Vec<(usize, usize)>);

impl PageSelection {
    fn contains(&self, page: usize) -> bool {
        self.0.iter().any(|&(from, to)| (from..=to).contains(&page))
    }
}

fn parse_pages(s: &str) -> Result<PageSelection, String> {
    let parse_one = |part: &str| part.trim().parse::<usize>()
        .ok()
        .filter(|&page| page >= 1)
        .ok_or_else(|| format!("invalid page number: {part}"));
    let ranges = s.split(',')
        .map(|part| match part.split_once('-') {
            Some((from, to)) => {
                let (from, to) = (parse_one(from)?, parse_one(to)?);
                if from <= to { Ok((from, to)) } else { Err(format!("empty page range: {part}")) }
            },
            None => parse_one(part).map(|page| (page, page))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PageSelection(ranges))
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    let vals = s.split_whitespace()
        .map(|part| part.parse::<f64>().map_err(|_| format!("invalid number: {part}")))
        .collect::<Result<Vec<_>, _>>()?;
    let &[x1, y1, x2, y2] = &vals[..] else {
        return Err("expected four numbers".to_owned())
    };
    Ok(Rect::new(x1, y1, x2, y2))
}

#[derive(Debug, thiserror::Error)]
enum CropError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Write(#[from] WriterError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default)]
struct Summary {
    cropped: usize,
    unchanged: usize,
    failed: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    stderrlog::new()
        .quiet(args.quiet)
        .verbosity(args.verbose as usize + 1)
        .init()
        .unwrap();

    if args.output.is_some() && args.files.len() > 1 {
        log::error!("--output cannot be used with multiple input files");
        return ExitCode::FAILURE;
    }

    // documents are independent, each works on its own reader/writer pair
    let results = args.files.par_iter()
        .map(|path| (path, crop_file(path, &args)))
        .collect::<Vec<_>>();

    let mut failed_docs = 0;
    for (path, result) in &results {
        match result {
            Ok(Summary { cropped, unchanged, failed }) =>
                println!("{}: {cropped} cropped, {unchanged} unchanged, {failed} failed",
                    path.display()),
            Err(err) => {
                failed_docs += 1;
                log::error!("{}: {err}", path.display());
            }
        }
    }
    if failed_docs > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn crop_file(path: &Path, args: &Args) -> Result<Summary, CropError> {
    let doc = Document::open(path)?;
    let pages = enumerate_pages(&doc)?;
    log::info!("{}: {} page(s)", path.display(), pages.len());

    let mut provider: Box<dyn BoundsProvider> = match (&args.bbox, &args.bbox_file) {
        (Some(rect), _) => Box::new(FixedBounds(*rect)),
        (None, Some(file)) => Box::new(RecordedBounds::from_file(file)?),
        (None, None) => Box::new(Ghostscript::new(path, args.resolution,
            Duration::from_secs(args.timeout))),
    };

    let mut update = Update::new(&doc);
    let mut summary = Summary::default();
    for (ix, page) in pages.iter().enumerate() {
        if args.pages.as_ref().is_some_and(|sel| !sel.contains(ix + 1)) {
            continue;
        }
        let raw = match provider.bounds(ix) {
            Ok(raw) => raw,
            Err(err) => {
                log::warn!("{}: page {}: {err}", path.display(), ix + 1);
                summary.failed += 1;
                continue;
            }
        };
        let planned = plan_crop(page.effective_box(), page.rotate, raw, &args.margin);
        log::debug!("page {}: {raw:?} -> {planned:?}", ix + 1);
        if update.set_page_crop(page, planned) {
            summary.cropped += 1;
        } else {
            summary.unchanged += 1;
        }
    }

    let target = match &args.output {
        Some(output) => {
            std::fs::copy(path, output)?;
            output.as_path()
        },
        None => path
    };
    if !update.is_empty() {
        update.append_to_file(target)?;
    }
    Ok(summary)
}
