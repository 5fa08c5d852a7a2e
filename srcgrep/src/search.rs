use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use termcolor::{Ansi, NoColor};
use tracing::{debug, info};

use crate::config::SearchOptions;
use crate::discovery::Discovery;
use crate::errors::{SearchError, SearchResult};
use crate::ingest;
use crate::matcher::Matcher;
use crate::pool::ThreadPool;
use crate::printer::Printer;
use crate::results::{FileResult, Match, SearchStats};
use crate::sink::MatchSink;

struct TaskContext {
    matcher: Matcher,
    printer: Printer,
    colors: bool,
    sink: Arc<MatchSink>,
    files_searched: AtomicUsize,
    files_matched: AtomicUsize,
    total_matches: AtomicUsize,
}

/// Runs a search with the given options, writing match blocks to stdout.
pub fn search(options: &SearchOptions) -> SearchResult<SearchStats> {
    search_with_sink(options, Arc::new(MatchSink::stdout()))
}

/// Runs a search against an explicit sink.
///
/// Discovery streams paths into the pool so walking and matching overlap;
/// dropping the pool drains the queue and joins the workers before the sink
/// is flushed.
pub fn search_with_sink(
    options: &SearchOptions,
    sink: Arc<MatchSink>,
) -> SearchResult<SearchStats> {
    let root = options.source.root();
    if !root.is_dir() {
        return Err(SearchError::bad_root(root));
    }

    let context = Arc::new(TaskContext {
        matcher: Matcher::new(&options.term, options.mode)?,
        printer: Printer::new(options.output),
        colors: options.colors_enabled,
        sink: Arc::clone(&sink),
        files_searched: AtomicUsize::new(0),
        files_matched: AtomicUsize::new(0),
        total_matches: AtomicUsize::new(0),
    });

    info!(
        "searching for '{}' under {} with {} threads",
        options.term,
        root.display(),
        options.threads
    );
    let started = Instant::now();

    {
        let pool = ThreadPool::new(options.threads);
        for path in Discovery::new(&options.source) {
            let context = Arc::clone(&context);
            pool.submit(move |scratch| search_file(&path, &context, scratch))?;
        }
        // pool drop: drain the queue, join the workers
    }

    sink.finish()?;

    let stats = SearchStats {
        files_searched: context.files_searched.load(Ordering::Relaxed),
        files_matched: context.files_matched.load(Ordering::Relaxed),
        total_matches: context.total_matches.load(Ordering::Relaxed),
        elapsed: started.elapsed(),
    };
    info!(
        "search complete: {} matches in {} of {} files",
        stats.total_matches, stats.files_matched, stats.files_searched
    );
    Ok(stats)
}

/// The per-file task: ingest, match line by line, format the whole block on
/// this worker, then take the sink mutex once.
fn search_file(path: &Path, ctx: &TaskContext, scratch: &mut Vec<u8>) {
    ctx.files_searched.fetch_add(1, Ordering::Relaxed);

    let view = ingest::read_file(path, scratch);
    if view.lines.is_empty() {
        return;
    }
    let content = &scratch[..view.size];

    let mut matches = Vec::new();
    for (i, line) in view.lines.iter().enumerate() {
        let hit_spans = ctx.matcher.find_spans(line.slice(content));
        if hit_spans.is_empty() {
            continue;
        }
        matches.push(Match {
            line_number: i + 1,
            line: *line,
            hit_spans,
        });
    }
    if matches.is_empty() {
        return;
    }

    debug!("{}: {} matching lines", path.display(), matches.len());
    ctx.files_matched.fetch_add(1, Ordering::Relaxed);
    ctx.total_matches.fetch_add(matches.len(), Ordering::Relaxed);

    let result = FileResult {
        path: path.to_path_buf(),
        matches,
    };

    // writes into a Vec, so formatting itself cannot fail
    let block: Vec<u8> = if ctx.colors {
        let mut wtr = Ansi::new(Vec::new());
        if ctx.printer.format_block(&result, content, &mut wtr).is_err() {
            return;
        }
        wtr.into_inner()
    } else {
        let mut wtr = NoColor::new(Vec::new());
        if ctx.printer.format_block(&result, content, &mut wtr).is_err() {
            return;
        }
        wtr.into_inner()
    };

    ctx.sink.append(&block);
}
