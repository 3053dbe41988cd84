//! Line-oriented `.FEAT` feature-file parser (see §6 of the spec).
//!
//! `phoneme_name, numeric_label, start_time, end_time, source_file,
//! feature_count, frame_count, <frame_count x feature_count floats>`
//!
//! Fields may be comma- or whitespace-separated: the parser strips leading/
//! trailing whitespace per line and replaces commas with spaces before
//! splitting on whitespace.

use crate::buffer::Matrix;
use crate::error::{Error, Result};

pub struct FeatureRecord {
    pub phoneme: String,
    pub label: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub source_file: String,
    pub frames: Matrix,
}

/// Parse an entire feature file's text, skipping an optional `phoneme,`
/// header line and any zero-frame records.
///
/// `num_features` is the configured `F` (14 TIMIT, 6 HAR); a record whose
/// declared `feature_count` disagrees yields `DimensionMismatch`. Any
/// unparsable numeric field yields `MalformedInput { line }`.
pub fn parse_feature_file(text: &str, num_features: usize) -> Result<Vec<FeatureRecord>> {
    let mut records = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with("phoneme,") || trimmed.starts_with("phoneme ") {
            continue;
        }

        let normalized = trimmed.replace(',', " ");
        let fields: Vec<&str> = normalized.split_whitespace().collect();
        if fields.len() < 7 {
            return Err(Error::MalformedInput {
                line: line_no,
                detail: format!("expected at least 7 fields, found {}", fields.len()),
            });
        }

        let phoneme = fields[0].to_string();
        let label = parse_usize(fields[1], line_no)?;
        let start_time = parse_f64(fields[2], line_no)?;
        let end_time = parse_f64(fields[3], line_no)?;
        let source_file = fields[4].to_string();
        let feature_count = parse_usize(fields[5], line_no)?;
        let frame_count = parse_usize(fields[6], line_no)?;

        if frame_count == 0 {
            continue;
        }

        if feature_count != num_features {
            return Err(Error::DimensionMismatch {
                expected: num_features,
                found: feature_count,
            });
        }

        let expected_values = frame_count * feature_count;
        let rest = &fields[7..];
        if rest.len() != expected_values {
            return Err(Error::MalformedInput {
                line: line_no,
                detail: format!(
                    "expected {} frame values, found {}",
                    expected_values,
                    rest.len()
                ),
            });
        }

        let mut frames = Matrix::zeros(frame_count, feature_count);
        for (i, tok) in rest.iter().enumerate() {
            let v: f32 = tok
                .parse()
                .map_err(|_| Error::MalformedInput {
                    line: line_no,
                    detail: format!("unparsable feature value '{tok}'"),
                })?;
            frames.as_mut_slice()[i] = v;
        }

        records.push(FeatureRecord {
            phoneme,
            label,
            start_time,
            end_time,
            source_file,
            frames,
        });
    }

    Ok(records)
}

fn parse_usize(s: &str, line: usize) -> Result<usize> {
    s.parse().map_err(|_| Error::MalformedInput {
        line,
        detail: format!("expected integer, found '{s}'"),
    })
}

fn parse_f64(s: &str, line: usize) -> Result<f64> {
    s.parse().map_err(|_| Error::MalformedInput {
        line,
        detail: format!("expected number, found '{s}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_record_with_comma_fields() {
        let text = "phoneme,label,start,end,file,fcount,frames\nsh,1,0.0,0.1,utt1,2,2,0.1,0.2,0.3,0.4";
        let records = parse_feature_file(text, 2).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].phoneme, "sh");
        assert_eq!(records[0].frames.rows(), 2);
        assert_eq!(records[0].frames.cols(), 2);
    }

    #[test]
    fn parses_whitespace_separated_record() {
        let text = "sh 1 0.0 0.1 utt1 1 1 0.5";
        let records = parse_feature_file(text, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].frames.get(0, 0), 0.5);
    }

    #[test]
    fn zero_frame_record_is_skipped() {
        let text = "sh 1 0.0 0.1 utt1 2 0";
        let records = parse_feature_file(text, 2).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn mismatched_feature_count_errors() {
        let text = "sh 1 0.0 0.1 utt1 3 1 0.1 0.2 0.3";
        let err = parse_feature_file(text, 14).unwrap_err();
        matches!(err, Error::DimensionMismatch { .. });
    }

    #[test]
    fn unparsable_value_reports_line_number() {
        let text = "ok 1 0.0 0.1 utt1 1 1 0.5\nsh 1 0.0 0.1 utt1 1 1 notanumber";
        let err = parse_feature_file(text, 1).unwrap_err();
        match err {
            Error::MalformedInput { line, .. } => assert_eq!(line, 2),
            _ => panic!("expected MalformedInput"),
        }
    }
}
