use std::io::{self, Write};
use std::path::Path;

use once_cell::sync::Lazy;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::config::OutputFormat;
use crate::results::{FileResult, Match};

// Shared read-only color table; whether the escapes actually reach the
// output is decided by the writer wrapping the block buffer.
static PATH_COLOR: Lazy<ColorSpec> = Lazy::new(|| {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Blue)).set_bold(true);
    spec
});

static HIT_COLOR: Lazy<ColorSpec> = Lazy::new(|| {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Red)).set_bold(true);
    spec
});

/// Renders one file's matches as a single output block.
///
/// Formatting runs on the worker that produced the matches, so the sink
/// mutex is taken exactly once per file, for a finished block.
#[derive(Debug, Clone, Copy)]
pub enum Printer {
    Pretty,
    Piped,
    Html,
}

impl Printer {
    pub fn new(output: OutputFormat) -> Self {
        match output {
            OutputFormat::Pretty => Printer::Pretty,
            OutputFormat::Piped => Printer::Piped,
            OutputFormat::Html => Printer::Html,
        }
    }

    /// Writes the whole block for `result` into `wtr`. Line text is resolved
    /// against `content`, the worker's file buffer.
    pub fn format_block(
        &self,
        result: &FileResult,
        content: &[u8],
        wtr: &mut dyn WriteColor,
    ) -> io::Result<()> {
        match self {
            Printer::Pretty => self.format_pretty(result, content, wtr),
            Printer::Piped => self.format_piped(result, content, wtr),
            Printer::Html => self.format_html(result, content, wtr),
        }
    }

    fn format_pretty(
        &self,
        result: &FileResult,
        content: &[u8],
        wtr: &mut dyn WriteColor,
    ) -> io::Result<()> {
        wtr.set_color(&PATH_COLOR)?;
        write!(wtr, "{}", display_path(&result.path))?;
        wtr.reset()?;
        writeln!(wtr)?;

        for m in &result.matches {
            let line = m.line.slice(content);
            write!(wtr, "{}: ", m.line_number)?;
            write_hit_segments(m, line, wtr)?;
            writeln!(wtr)?;
        }

        writeln!(wtr)
    }

    fn format_piped(
        &self,
        result: &FileResult,
        content: &[u8],
        wtr: &mut dyn WriteColor,
    ) -> io::Result<()> {
        let path = display_path(&result.path);
        for m in &result.matches {
            write!(wtr, "{}:{}:", path, m.line_number)?;
            wtr.write_all(m.line.slice(content))?;
            writeln!(wtr)?;
        }
        Ok(())
    }

    fn format_html(
        &self,
        result: &FileResult,
        content: &[u8],
        wtr: &mut dyn WriteColor,
    ) -> io::Result<()> {
        write!(wtr, "<h3>")?;
        write_html_escaped(display_path(&result.path).as_bytes(), wtr)?;
        writeln!(wtr, "</h3>")?;

        for m in &result.matches {
            let line = m.line.slice(content);
            write!(wtr, "<pre>{}: ", m.line_number)?;
            let mut pos = 0;
            for &(start, end) in &m.hit_spans {
                write_html_escaped(&line[pos..start], wtr)?;
                write!(wtr, "<span class=\"hit\">")?;
                write_html_escaped(&line[start..end], wtr)?;
                write!(wtr, "</span>")?;
                pos = end;
            }
            write_html_escaped(&line[pos..], wtr)?;
            writeln!(wtr, "</pre>")?;
        }

        writeln!(wtr)
    }
}

fn write_hit_segments(m: &Match, line: &[u8], wtr: &mut dyn WriteColor) -> io::Result<()> {
    let mut pos = 0;
    for &(start, end) in &m.hit_spans {
        wtr.write_all(&line[pos..start])?;
        wtr.set_color(&HIT_COLOR)?;
        wtr.write_all(&line[start..end])?;
        wtr.reset()?;
        pos = end;
    }
    wtr.write_all(&line[pos..])
}

fn write_html_escaped(text: &[u8], wtr: &mut dyn WriteColor) -> io::Result<()> {
    let mut pos = 0;
    for (i, byte) in text.iter().enumerate() {
        let escaped: &[u8] = match byte {
            b'&' => b"&amp;",
            b'<' => b"&lt;",
            b'>' => b"&gt;",
            _ => continue,
        };
        wtr.write_all(&text[pos..i])?;
        wtr.write_all(escaped)?;
        pos = i + 1;
    }
    wtr.write_all(&text[pos..])
}

/// Paths are printed as discovered, minus a noisy leading `./`.
fn display_path(path: &Path) -> String {
    let display = path.display().to_string();
    match display.strip_prefix("./") {
        Some(stripped) => stripped.to_string(),
        None => display,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::split_lines;
    use std::path::PathBuf;
    use termcolor::{Ansi, NoColor};

    fn sample_result(content: &[u8], spans: Vec<Vec<(usize, usize)>>) -> FileResult {
        let lines = split_lines(content);
        let matches = lines
            .iter()
            .zip(spans)
            .enumerate()
            .filter(|(_, (_, spans))| !spans.is_empty())
            .map(|(i, (line, hit_spans))| Match {
                line_number: i + 1,
                line: *line,
                hit_spans,
            })
            .collect();
        FileResult {
            path: PathBuf::from("a.txt"),
            matches,
        }
    }

    fn render_plain(printer: Printer, result: &FileResult, content: &[u8]) -> String {
        let mut wtr = NoColor::new(Vec::new());
        printer.format_block(result, content, &mut wtr).unwrap();
        String::from_utf8(wtr.into_inner()).unwrap()
    }

    #[test]
    fn test_piped_format_is_stable() {
        let content = b"hello\nworld\n";
        let result = sample_result(content, vec![vec![], vec![(0, 5)]]);
        assert_eq!(
            render_plain(Printer::Piped, &result, content),
            "a.txt:2:world\n"
        );
    }

    #[test]
    fn test_pretty_plain_layout() {
        let content = b"hello\nworld\n";
        let result = sample_result(content, vec![vec![(0, 5)], vec![(0, 5)]]);
        assert_eq!(
            render_plain(Printer::Pretty, &result, content),
            "a.txt\n1: hello\n2: world\n\n"
        );
    }

    #[test]
    fn test_pretty_colorized_wraps_hits() {
        let content = b"say hello twice: hello\n";
        let result = sample_result(content, vec![vec![(4, 9), (17, 22)]]);
        let mut wtr = Ansi::new(Vec::new());
        Printer::Pretty
            .format_block(&result, content, &mut wtr)
            .unwrap();
        let out = String::from_utf8(wtr.into_inner()).unwrap();
        assert!(out.contains("\x1b["));
        assert_eq!(out.matches("hello").count(), 2);
    }

    #[test]
    fn test_colorless_writer_emits_no_escapes() {
        let content = b"hello\n";
        let result = sample_result(content, vec![vec![(0, 5)]]);
        let out = render_plain(Printer::Pretty, &result, content);
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_html_structure_and_escaping() {
        let content = b"if a < b && c > d\n";
        let result = sample_result(content, vec![vec![(3, 4)]]);
        let out = render_plain(Printer::Html, &result, content);
        assert!(out.starts_with("<h3>a.txt</h3>\n"));
        assert!(out.contains("<pre>1: if <span class=\"hit\">a</span> &lt; b &amp;&amp; c &gt; d</pre>\n"));
    }

    #[test]
    fn test_display_path_strips_dot_slash() {
        assert_eq!(display_path(Path::new("./src/main.rs")), "src/main.rs");
        assert_eq!(display_path(Path::new("src/main.rs")), "src/main.rs");
    }

    #[test]
    fn test_multiple_hits_per_line_keep_text_intact() {
        let content = b"Foo foo FOO\n";
        let result = sample_result(content, vec![vec![(0, 3), (4, 7), (8, 11)]]);
        assert_eq!(
            render_plain(Printer::Piped, &result, content),
            "a.txt:1:Foo foo FOO\n"
        );
    }
}
