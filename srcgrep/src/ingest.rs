//! File ingestion: read a candidate file into the worker's scratch buffer,
//! reject binaries, and index its lines without copying them.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Once;

use memchr::{memchr_iter, memmem};
use tracing::{trace, warn};

/// How many leading bytes the binary heuristic inspects.
const BINARY_CHECK_LEN: usize = 100;

/// Files above this size are skipped so a worker's buffer stays bounded.
pub const MAX_FILE_LEN: u64 = 1024 * 1024 * 1024;

static LARGE_FILE_NOTE: Once = Once::new();

/// A zero-copy descriptor of one line inside a file buffer.
///
/// Covers neither the terminating `\n` nor a preceding `\r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineView {
    pub start: usize,
    pub len: usize,
}

impl LineView {
    pub fn slice<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.start..self.start + self.len]
    }
}

/// The ingest result for one file. Rejected, unreadable and empty files all
/// yield an empty view, which downstream code treats as "no matches".
#[derive(Debug, Default)]
pub struct FileView {
    pub size: usize,
    pub lines: Vec<LineView>,
}

impl FileView {
    pub fn empty() -> Self {
        FileView::default()
    }
}

/// Decides whether a buffer head looks like text.
///
/// Binary files almost always carry zero padding near the start, text files
/// almost never do, so a `\x00\x00` probe over the head is enough. PDF and
/// PostScript are text-like at offset zero and need their own check.
pub fn is_text(head: &[u8]) -> bool {
    if head.starts_with(b"%PDF") || head.starts_with(b"%!PS") {
        return false;
    }
    memmem::find(head, b"\x00\x00").is_none()
}

/// Splits a buffer into line views at `\n`, tolerating `\r\n` endings.
pub fn split_lines(buf: &[u8]) -> Vec<LineView> {
    let mut lines = Vec::with_capacity(128);
    if buf.is_empty() {
        return lines;
    }

    let mut start = 0;
    for nl in memchr_iter(b'\n', buf) {
        let mut end = nl;
        if end > start && buf[end - 1] == b'\r' {
            end -= 1;
        }
        lines.push(LineView {
            start,
            len: end - start,
        });
        start = nl + 1;
    }

    // trailing line without a terminator
    if start != buf.len() {
        lines.push(LineView {
            start,
            len: buf.len() - start,
        });
    }

    lines
}

/// Reads `path` into `buf` and returns its line index.
///
/// The buffer grows to the file size and is never shrunk, so a worker reuses
/// one allocation across all the files it services. Every failure path
/// (open, stat, short read, binary content) returns an empty view.
pub fn read_file(path: &Path, buf: &mut Vec<u8>) -> FileView {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            trace!("skipping {}: {}", path.display(), err);
            return FileView::empty();
        }
    };

    let len = match file.metadata() {
        Ok(meta) => meta.len(),
        Err(err) => {
            trace!("skipping {}: {}", path.display(), err);
            return FileView::empty();
        }
    };
    if len == 0 {
        return FileView::empty();
    }
    if len > MAX_FILE_LEN {
        LARGE_FILE_NOTE.call_once(|| {
            warn!(
                "skipping files larger than {} bytes, first: {}",
                MAX_FILE_LEN,
                path.display()
            );
        });
        return FileView::empty();
    }

    let size = len as usize;
    if buf.len() < size {
        buf.resize(size, 0);
    }

    match file.read(&mut buf[..size]) {
        Ok(n) if n == size => {}
        _ => return FileView::empty(),
    }

    if !is_text(&buf[..size.min(BINARY_CHECK_LEN)]) {
        return FileView::empty();
    }

    FileView {
        size,
        lines: split_lines(&buf[..size]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn lines_as_strings(buf: &[u8]) -> Vec<String> {
        split_lines(buf)
            .iter()
            .map(|l| String::from_utf8_lossy(l.slice(buf)).into_owned())
            .collect()
    }

    #[test]
    fn test_split_basic() {
        assert_eq!(lines_as_strings(b"hello\nworld\n"), vec!["hello", "world"]);
    }

    #[test]
    fn test_split_trailing_line_without_newline() {
        assert_eq!(lines_as_strings(b"hello\nworld"), vec!["hello", "world"]);
    }

    #[test]
    fn test_split_empty_buffer() {
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_split_strips_carriage_return() {
        let lines = lines_as_strings(b"alpha\r\nbeta\r\n");
        assert_eq!(lines, vec!["alpha", "beta"]);
        for line in &lines {
            assert!(!line.contains('\r'));
        }
    }

    #[test]
    fn test_split_keeps_empty_lines() {
        assert_eq!(lines_as_strings(b"a\n\nb\n"), vec!["a", "", "b"]);
        assert_eq!(lines_as_strings(b"\r\n"), vec![""]);
    }

    #[test]
    fn test_split_round_trip() {
        let inputs: &[&[u8]] = &[b"a\nb\nc\n", b"a\nb", b"\n\n\n", b"single"];
        for &input in inputs {
            let buf = input;
            let mut rebuilt: Vec<u8> = Vec::new();
            for (i, line) in split_lines(buf).iter().enumerate() {
                if i > 0 {
                    rebuilt.push(b'\n');
                }
                rebuilt.extend_from_slice(line.slice(buf));
            }
            if buf.ends_with(b"\n") {
                rebuilt.push(b'\n');
            }
            assert_eq!(rebuilt, buf);
        }
    }

    #[test]
    fn test_is_text_rejects_pdf_and_postscript() {
        assert!(!is_text(b"%PDF-1.4\nneedle"));
        assert!(!is_text(b"%!PS-Adobe-3.0\n"));
    }

    #[test]
    fn test_is_text_rejects_double_zero() {
        assert!(!is_text(b"ELF\x00\x00\x01\x02"));
        assert!(is_text(b"one\x00zero bytes are fine alone"));
        assert!(is_text(b"plain text"));
    }

    #[test]
    fn test_read_file_indexes_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello\nworld\n").unwrap();

        let mut buf = Vec::new();
        let view = read_file(&path, &mut buf);
        assert_eq!(view.size, 12);
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.lines[1].slice(&buf), b"world");
    }

    #[test]
    fn test_read_file_missing_and_empty() {
        let dir = tempdir().unwrap();
        let mut buf = Vec::new();

        let view = read_file(&dir.path().join("absent.txt"), &mut buf);
        assert_eq!(view.lines.len(), 0);

        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "").unwrap();
        let view = read_file(&path, &mut buf);
        assert_eq!(view.size, 0);
        assert!(view.lines.is_empty());
    }

    #[test]
    fn test_read_file_rejects_binary() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"%PDF-1.4\nthis contains needle\n").unwrap();
        drop(file);

        let mut buf = Vec::new();
        let view = read_file(&path, &mut buf);
        assert!(view.lines.is_empty());
    }

    #[test]
    fn test_buffer_grows_and_is_reused() {
        let dir = tempdir().unwrap();
        let big = dir.path().join("big.txt");
        let small = dir.path().join("small.txt");
        std::fs::write(&big, "x".repeat(4096)).unwrap();
        std::fs::write(&small, "tiny\n").unwrap();

        let mut buf = Vec::new();
        let view = read_file(&big, &mut buf);
        assert_eq!(view.size, 4096);
        let grown = buf.len();

        let view = read_file(&small, &mut buf);
        assert_eq!(view.size, 5);
        assert_eq!(buf.len(), grown, "buffer must not shrink between files");
        assert_eq!(view.lines[0].slice(&buf), b"tiny");
    }
}
