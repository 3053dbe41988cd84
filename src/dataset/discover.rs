//! Directory walking, file-list loading, and the per-file/per-experiment
//! assembly of raw feature records into training `Sequence`s.

use std::path::Path;

use crate::buffer::Matrix;
use crate::delta::delta_inplace;
use crate::diagnostic;
use crate::dataset::feature_file::parse_feature_file;
use crate::dataset::{Dataset, Sequence};
use crate::error::{Error, Result};

/// Default delta windows for TIMIT's two-scale expansion (short, long).
pub const TIMIT_SHORT_WINDOW: usize = 2;
pub const TIMIT_LONG_WINDOW: usize = 5;
/// HAR uses a single delta window.
pub const HAR_WINDOW: usize = 2;

/// Read a plain-text file-list (one stem per line) and join each stem with
/// `input_dir`, appending `.FEAT`.
pub fn load_file_list(list_path: &Path, input_dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let text = std::fs::read_to_string(list_path).map_err(|e| Error::IoFailure {
        path: list_path.to_path_buf(),
        source: e,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|stem| input_dir.join(format!("{stem}.FEAT")))
        .collect())
}

/// Expand a raw `[T, F]` frame matrix into TIMIT's 5F-column layout:
/// `[0,F)` raw, `[F,2F)` short delta, `[2F,3F)` short delta-delta,
/// `[3F,4F)` long delta, `[4F,5F)` long delta-delta.
///
/// The delta window operates over the *whole* matrix passed in — per the
/// documented resolution of the per-file-vs-per-phoneme accumulation open
/// question, that matrix is the concatenation of every record belonging to
/// one source file, not a single phoneme's frames (see DESIGN.md).
pub fn expand_timit_frame(raw: &Matrix, short_window: usize, long_window: usize) -> Matrix {
    let f = raw.cols();
    let t = raw.rows();
    let mut out = Matrix::zeros(t, 5 * f);
    for row in 0..t {
        out.row_mut(row)[0..f].copy_from_slice(raw.row(row));
    }
    delta_inplace(&mut out, 0, f, f, short_window);
    delta_inplace(&mut out, f, 2 * f, f, short_window);
    delta_inplace(&mut out, 0, 3 * f, f, long_window);
    delta_inplace(&mut out, 3 * f, 4 * f, f, long_window);
    out
}

/// Expand a raw `[T, F]` frame matrix into HAR's 3F-column layout:
/// `[0,F)` raw, `[F,2F)` delta, `[2F,3F)` delta-delta.
pub fn expand_har_frame(raw: &Matrix, window: usize) -> Matrix {
    let f = raw.cols();
    let t = raw.rows();
    let mut out = Matrix::zeros(t, 3 * f);
    for row in 0..t {
        out.row_mut(row)[0..f].copy_from_slice(raw.row(row));
    }
    delta_inplace(&mut out, 0, f, f, window);
    delta_inplace(&mut out, f, 2 * f, f, window);
    out
}

/// Load the TIMIT dataset from a file list. Each `.FEAT` file becomes one
/// `Sequence`, the concatenation of every non-empty phoneme record in that
/// file in the order parsed, with the last frame of each record's label
/// augmented by `+num_classes` (EOP marking, stripped back into `eop`
/// before returning). A malformed file is skipped (zero contribution) and
/// its offending line is printed; training is not aborted.
pub fn load_timit_dataset(
    list_path: &Path,
    input_dir: &Path,
    num_features: usize,
    num_classes: usize,
) -> Result<Dataset> {
    let files = load_file_list(list_path, input_dir)?;
    let mut sequences = Vec::new();

    for path in files {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let records = match parse_feature_file(&text, num_features) {
            Ok(r) => r,
            Err(e) => {
                diagnostic::render(&e, &path.display().to_string(), &text);
                continue;
            }
        };

        if records.is_empty() {
            continue;
        }

        let total_frames: usize = records.iter().map(|r| r.frames.rows()).sum();
        let mut raw = Matrix::zeros(total_frames, num_features);
        let mut labels = Vec::with_capacity(total_frames);
        let mut eop = vec![false; total_frames];

        let mut t = 0;
        for record in &records {
            let n = record.frames.rows();
            for r in 0..n {
                raw.row_mut(t + r).copy_from_slice(record.frames.row(r));
                labels.push(record.label);
            }
            if n > 0 {
                eop[t + n - 1] = true;
            }
            t += n;
        }

        let expanded = expand_timit_frame(&raw, TIMIT_SHORT_WINDOW, TIMIT_LONG_WINDOW);
        let _ = num_classes; // EOP encoding is represented out-of-band via `eop`, not `label + C`
        sequences.push(Sequence {
            frames: expanded,
            labels,
            eop,
        });
    }

    Ok(Dataset { sequences })
}

/// One parsed HAR label-file entry.
struct HarSegment {
    experiment_id: u32,
    subject_id: u32,
    activity_id: usize,
    start_sample: usize,
    end_sample: usize,
}

fn parse_har_labels(text: &str) -> Vec<HarSegment> {
    text.lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(HarSegment {
                experiment_id: fields[0].parse().ok()?,
                subject_id: fields[1].parse().ok()?,
                activity_id: fields[2].parse::<usize>().ok()?.saturating_sub(1),
                start_sample: fields[3].parse().ok()?,
                end_sample: fields[4].parse().ok()?,
            })
        })
        .collect()
}

/// Load the HAR dataset: one sequence per labeled segment, sliced from the
/// per-experiment sensor file `{sensor_dir}/expXX_userYY.txt` (whitespace
/// separated, `num_features` columns per sample row).
pub fn load_har_dataset(
    sensor_dir: &Path,
    label_file: &Path,
    num_features: usize,
) -> Result<Dataset> {
    let label_text = std::fs::read_to_string(label_file).map_err(|e| Error::IoFailure {
        path: label_file.to_path_buf(),
        source: e,
    })?;
    let segments = parse_har_labels(&label_text);

    let mut sequences = Vec::new();
    let mut cache: Option<(u32, u32, Matrix)> = None;

    for seg in segments {
        if cache.as_ref().map(|(e, s, _)| (*e, *s)) != Some((seg.experiment_id, seg.subject_id)) {
            let path = sensor_dir.join(format!(
                "exp{:02}_user{:02}.txt",
                seg.experiment_id, seg.subject_id
            ));
            let text = match std::fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let rows: Vec<Vec<f32>> = text
                .lines()
                .filter_map(|line| {
                    let vals: Result<Vec<f32>> = line
                        .split_whitespace()
                        .map(|tok| {
                            tok.parse::<f32>().map_err(|_| Error::MalformedInput {
                                line: 0,
                                detail: format!("unparsable HAR sample '{tok}'"),
                            })
                        })
                        .collect();
                    vals.ok()
                })
                .collect();
            let t_max = rows.len();
            let mut raw = Matrix::zeros(t_max, num_features);
            for (r, row) in rows.iter().enumerate() {
                let n = row.len().min(num_features);
                raw.row_mut(r)[..n].copy_from_slice(&row[..n]);
            }
            cache = Some((seg.experiment_id, seg.subject_id, raw));
        }

        let Some((_, _, ref raw)) = cache else {
            continue;
        };
        if seg.end_sample >= raw.rows() || seg.start_sample > seg.end_sample {
            continue;
        }

        let n = seg.end_sample - seg.start_sample + 1;
        let mut slice = Matrix::zeros(n, num_features);
        for r in 0..n {
            slice.row_mut(r).copy_from_slice(raw.row(seg.start_sample + r));
        }

        let expanded = expand_har_frame(&slice, HAR_WINDOW);
        let labels = vec![seg.activity_id; n];
        let eop = vec![false; n];
        sequences.push(Sequence {
            frames: expanded,
            labels,
            eop,
        });
    }

    Ok(Dataset { sequences })
}
