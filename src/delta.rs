//! Windowed delta / delta-delta feature expansion (C3).
//!
//! Appends finite-difference derivatives of each frame's static features as
//! extra columns, clamping at the sequence boundary by repeating the first
//! or last frame rather than zero-padding.

use crate::buffer::Matrix;

/// Half-width of the delta window; the derivative at frame `t` looks at
/// frames `t-window..=t+window`.
pub const DEFAULT_WINDOW: usize = 2;

/// Compute a first-order delta matrix from `frames` (T x F) using `window`.
///
/// Output is T x F. Boundary frames are clamped: a lookup past the first or
/// last row reuses that row instead of reading out of bounds.
///
/// Note: when `window >= frames.rows()`, consecutive frames' windows overlap
/// the full sequence and the result degenerates toward a constant row; this
/// is accepted as documented behavior rather than special-cased (see
/// DESIGN.md Open Question on delta window/sequence-length interaction).
pub fn delta(frames: &Matrix, window: usize) -> Matrix {
    let t_max = frames.rows();
    let f = frames.cols();
    let mut out = Matrix::zeros(t_max, f);
    if t_max == 0 {
        return out;
    }

    let denom: f32 = 2.0 * (1..=window).map(|n| (n * n) as f32).sum::<f32>();
    let denom = if denom == 0.0 { 1.0 } else { denom };

    for t in 0..t_max {
        let row_out = out.row_mut(t);
        for n in 1..=window {
            let up = clamp_index(t as isize + n as isize, t_max);
            let down = clamp_index(t as isize - n as isize, t_max);
            let up_row = frames.row(up);
            let down_row = frames.row(down);
            for c in 0..f {
                row_out[c] += n as f32 * (up_row[c] - down_row[c]);
            }
        }
        for c in 0..f {
            row_out[c] /= denom;
        }
    }

    out
}

/// Concatenate `frames` with its delta and delta-delta, yielding a T x 3F
/// matrix (static, delta, delta-delta columns in that order).
pub fn delta_delta(frames: &Matrix, window: usize) -> Matrix {
    let d1 = delta(frames, window);
    let d2 = delta(&d1, window);
    let t_max = frames.rows();
    let f = frames.cols();
    let mut out = Matrix::zeros(t_max, 3 * f);

    for t in 0..t_max {
        let (s, a, b) = (frames.row(t), d1.row(t), d2.row(t));
        let row = out.row_mut(t);
        row[0..f].copy_from_slice(s);
        row[f..2 * f].copy_from_slice(a);
        row[2 * f..3 * f].copy_from_slice(b);
    }

    out
}

/// In-place variant matching the source routine's exact contract: read
/// columns `[soff, soff+fcnt)`, write the derivative into `[doff,
/// doff+fcnt)` of the same matrix. Calling this twice with the second
/// call's `soff` equal to the first call's `doff` produces second-order
/// deltas (see `dataset::discover` for the column layout this feeds).
pub fn delta_inplace(frames: &mut Matrix, soff: usize, doff: usize, fcnt: usize, window: usize) {
    let t_max = frames.rows();
    if t_max == 0 {
        return;
    }
    let denom: f32 = 2.0 * (1..=window).map(|n| (n * n) as f32).sum::<f32>();
    let denom = if denom == 0.0 { 1.0 } else { denom };

    let mut result = vec![0.0f32; t_max * fcnt];
    for t in 0..t_max {
        for n in 1..=window {
            let up = clamp_index(t as isize + n as isize, t_max);
            let down = clamp_index(t as isize - n as isize, t_max);
            let up_row = &frames.row(up)[soff..soff + fcnt];
            let down_row = &frames.row(down)[soff..soff + fcnt];
            for c in 0..fcnt {
                result[t * fcnt + c] += n as f32 * (up_row[c] - down_row[c]);
            }
        }
        for c in 0..fcnt {
            result[t * fcnt + c] /= denom;
        }
    }

    for t in 0..t_max {
        frames.row_mut(t)[doff..doff + fcnt].copy_from_slice(&result[t * fcnt..(t + 1) * fcnt]);
    }
}

fn clamp_index(i: isize, len: usize) -> usize {
    if i < 0 {
        0
    } else if i as usize >= len {
        len - 1
    } else {
        i as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_sequence_has_zero_delta() {
        let mut frames = Matrix::zeros(5, 2);
        for t in 0..5 {
            frames.row_mut(t).copy_from_slice(&[1.0, 2.0]);
        }
        let d = delta(&frames, DEFAULT_WINDOW);
        for t in 0..5 {
            assert_eq!(d.row(t), &[0.0, 0.0]);
        }
    }

    #[test]
    fn linear_ramp_has_constant_delta_in_interior() {
        let mut frames = Matrix::zeros(7, 1);
        for t in 0..7 {
            frames.set(t, 0, t as f32);
        }
        let d = delta(&frames, 2);
        // interior frames (index 2..=4) are far enough from both edges that
        // clamping doesn't perturb the slope estimate
        for t in 2..=4 {
            assert!((d.get(t, 0) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn delta_delta_triples_column_count() {
        let frames = Matrix::zeros(4, 3);
        let dd = delta_delta(&frames, DEFAULT_WINDOW);
        assert_eq!(dd.cols(), 9);
        assert_eq!(dd.rows(), 4);
    }

    #[test]
    fn empty_sequence_yields_empty_output() {
        let frames = Matrix::zeros(0, 4);
        let d = delta(&frames, DEFAULT_WINDOW);
        assert_eq!(d.rows(), 0);
    }

    #[test]
    fn scenario_s3_inplace() {
        let mut frames = Matrix::zeros(5, 2);
        for t in 0..5 {
            frames.set(t, 0, t as f32);
        }
        delta_inplace(&mut frames, 0, 1, 1, 1);
        let expected = [0.5, 1.0, 1.0, 1.0, 0.5];
        for t in 0..5 {
            assert!((frames.get(t, 1) - expected[t]).abs() < 1e-5);
        }
    }

    #[test]
    fn single_frame_sequence_is_all_zero() {
        let mut frames = Matrix::zeros(1, 2);
        frames.row_mut(0).copy_from_slice(&[5.0, -3.0]);
        let d = delta(&frames, DEFAULT_WINDOW);
        assert_eq!(d.row(0), &[0.0, 0.0]);
    }
}
