use memchr::memmem;
use regex::bytes::Regex;

use crate::config::SearchMode;
use crate::errors::{SearchError, SearchResult};

/// Per-line matching strategy, fixed once at orchestrator construction.
///
/// All variants share one contract: returned spans are sorted ascending,
/// non-overlapping, and bounded by the line length.
#[derive(Debug, Clone)]
pub enum Matcher {
    CaseSensitive(memmem::Finder<'static>),
    CaseInsensitive(FoldedNeedle),
    Regex(Regex),
}

impl Matcher {
    /// Builds the matcher for `term`, compiling the regex exactly once.
    pub fn new(term: &str, mode: SearchMode) -> SearchResult<Self> {
        if term.is_empty() {
            return Err(SearchError::config_error("search term must not be empty"));
        }
        Ok(match mode {
            SearchMode::CaseSensitive => {
                Matcher::CaseSensitive(memmem::Finder::new(term.as_bytes()).into_owned())
            }
            SearchMode::CaseInsensitive => {
                Matcher::CaseInsensitive(FoldedNeedle::new(term.as_bytes()))
            }
            SearchMode::Regex => Matcher::Regex(Regex::new(term)?),
        })
    }

    /// Finds all non-overlapping hits of the needle in one line.
    pub fn find_spans(&self, line: &[u8]) -> Vec<(usize, usize)> {
        match self {
            Matcher::CaseSensitive(finder) => {
                let len = finder.needle().len();
                let mut spans = Vec::new();
                let mut pos = 0;
                while let Some(i) = finder.find(&line[pos..]) {
                    let start = pos + i;
                    spans.push((start, start + len));
                    pos = start + len;
                }
                spans
            }
            Matcher::CaseInsensitive(needle) => needle.find_all(line),
            Matcher::Regex(re) => re
                .find_iter(line)
                // zero-length matches carry no hit text and would loop forever
                // when rendered as non-overlapping spans
                .filter(|m| m.end() > m.start())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

/// Boyer-Moore-Horspool scan under ASCII case folding.
///
/// The needle is folded once at construction; haystack bytes are folded at
/// compare time. Bytes outside `A-Z` compare raw.
#[derive(Debug, Clone)]
pub struct FoldedNeedle {
    folded: Vec<u8>,
    shift: [usize; 256],
}

impl FoldedNeedle {
    fn new(needle: &[u8]) -> Self {
        let folded: Vec<u8> = needle.iter().map(|b| b.to_ascii_lowercase()).collect();
        let mut shift = [folded.len(); 256];
        for (i, &b) in folded[..folded.len() - 1].iter().enumerate() {
            shift[b as usize] = folded.len() - 1 - i;
        }
        FoldedNeedle { folded, shift }
    }

    fn find_all(&self, hay: &[u8]) -> Vec<(usize, usize)> {
        let len = self.folded.len();
        let mut spans = Vec::new();
        let mut pos = 0;
        while pos + len <= hay.len() {
            let mut j = len;
            while j > 0 && hay[pos + j - 1].to_ascii_lowercase() == self.folded[j - 1] {
                j -= 1;
            }
            if j == 0 {
                spans.push((pos, pos + len));
                pos += len;
            } else {
                pos += self.shift[hay[pos + len - 1].to_ascii_lowercase() as usize];
            }
        }
        spans
    }
}
