//! Pretty rendering of parse failures against their source file, using
//! `ariadne` the way the teacher's own diagnostic module drives it.

use crate::error::Error;

/// Render `err` against `source` (the full text of `filename`), pointing at
/// the offending line when `err` carries one. Non-positional errors (I/O,
/// capacity, numeric) fall back to a plain one-line report.
pub fn render(err: &Error, filename: &str, source: &str) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let offset = match err {
        Error::MalformedInput { line, .. } => line_offset(source, *line),
        _ => 0,
    };

    let report = Report::build(ReportKind::Error, filename, offset)
        .with_message(err.to_string())
        .with_label(
            Label::new((filename, offset..line_end(source, offset)))
                .with_message(err.to_string())
                .with_color(Color::Red),
        )
        .finish();

    let _ = report.eprint((filename, Source::from(source)));
}

/// Byte offset of the start of 1-indexed `line` in `source`. Clamped to the
/// end of the source when `line` runs past it.
fn line_offset(source: &str, line: usize) -> usize {
    if line <= 1 {
        return 0;
    }
    source
        .match_indices('\n')
        .nth(line - 2)
        .map(|(i, _)| i + 1)
        .unwrap_or(source.len())
}

fn line_end(source: &str, start: usize) -> usize {
    source[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(source.len())
        .max(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_offset_finds_second_line() {
        let source = "first\nsecond\nthird\n";
        assert_eq!(line_offset(source, 2), 6);
        assert_eq!(line_offset(source, 3), 13);
    }

    #[test]
    fn line_offset_clamps_past_end() {
        let source = "only one line";
        assert_eq!(line_offset(source, 5), source.len());
    }

    #[test]
    fn render_does_not_panic_on_malformed_input() {
        let err = Error::MalformedInput {
            line: 2,
            detail: "expected 7 fields".into(),
        };
        render(&err, "sample.feat", "phoneme,\nbad line\n");
    }

    #[test]
    fn render_does_not_panic_on_non_positional_error() {
        let err = Error::NumericDegenerate { detail: "T=0" };
        render(&err, "sample.feat", "phoneme,\n");
    }
}
