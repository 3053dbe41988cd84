//! CTC loss, gradient and accuracy over a log-space forward/backward lattice (C4).

use crate::buffer::Matrix;
use crate::edit_distance::edit_distance;

const NEG_INF: f32 = f32::NEG_INFINITY;

/// logsumexp of two values with explicit -inf absorption.
pub(crate) fn logsumexp2(a: f32, b: f32) -> f32 {
    if a == NEG_INF {
        return b;
    }
    if b == NEG_INF {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

fn logsumexp3(a: f32, b: f32, c: f32) -> f32 {
    logsumexp2(logsumexp2(a, b), c)
}

/// Collapse adjacent equal entries then drop blanks.
pub(crate) fn dedup_strip(labels: &[i32], blank: i32) -> Vec<i32> {
    let mut out = Vec::new();
    let mut last: Option<i32> = None;
    for &l in labels {
        if Some(l) != last {
            out.push(l);
            last = Some(l);
        }
    }
    out.retain(|&l| l != blank);
    out
}

fn build_padded_label(u: &[i32], blank: i32) -> Vec<i32> {
    let mut s = Vec::with_capacity(2 * u.len() + 1);
    s.push(blank);
    for &tok in u {
        s.push(tok);
        s.push(blank);
    }
    s
}

/// Preallocated forward/backward buffers for CTC over sequences bounded by
/// `(t_max, l_max, blank_index)`. Reused across calls; single-threaded.
pub struct CtcContext {
    t_max: usize,
    l_max: usize,
    blank: usize,
    log_yp: Matrix,
    alpha: Matrix,
    beta: Matrix,
    rho: Vec<f32>,
    label: Vec<i32>,
    u: Vec<i32>,
    y_hat: Vec<i32>,
    t: usize,
    s: usize,
}

impl CtcContext {
    pub fn new(t_max: usize, l_max: usize, blank: usize) -> Self {
        let s_max = 2 * t_max + 1;
        CtcContext {
            t_max,
            l_max,
            blank,
            log_yp: Matrix::zeros(t_max, l_max),
            alpha: Matrix::zeros(t_max, s_max),
            beta: Matrix::zeros(t_max, s_max),
            rho: vec![0.0; t_max],
            label: Vec::with_capacity(s_max),
            u: Vec::new(),
            y_hat: Vec::new(),
            t: 0,
            s: 0,
        }
    }

    /// Compute the CTC loss for `yp[T][L]` (row-stochastic probabilities)
    /// against one-hot true labels `yt[T][L]`. `T <= t_max`, `L <= l_max`.
    ///
    /// Returns `+inf` when `T == 0`, per the degenerate-input contract.
    pub fn loss(&mut self, yp: &Matrix, yt: &Matrix) -> f32 {
        let t = yp.rows();
        let l = yp.cols();
        self.t = t;
        if t == 0 {
            return f32::INFINITY;
        }

        for row in 0..t {
            for c in 0..l {
                let p = yp.get(row, c);
                self.log_yp.set(row, c, p.ln());
            }
        }

        let yt_argmax: Vec<i32> = (0..t)
            .map(|row| {
                let mut best_c = 0usize;
                let mut best_v = f32::NEG_INFINITY;
                for c in 0..l {
                    let v = yt.get(row, c);
                    if v > best_v {
                        best_v = v;
                        best_c = c;
                    }
                }
                best_c as i32
            })
            .collect();

        self.u = dedup_strip(&yt_argmax, self.blank as i32);
        self.label = build_padded_label(&self.u, self.blank as i32);
        let s = self.label.len();
        self.s = s;

        for row in 0..t {
            let a_row = self.alpha.row_mut(row);
            for v in a_row.iter_mut().take(s) {
                *v = NEG_INF;
            }
        }

        let log_yp_at = |row: usize, c: usize| -> f32 { self.log_yp.get(row, c) };

        self.alpha.set(0, 0, log_yp_at(0, self.label[0] as usize));
        if s > 1 {
            self.alpha.set(0, 1, log_yp_at(0, self.label[1] as usize));
        }

        for row in 1..t {
            let lo = if 2 * (t - row) >= s { 0 } else { s - 2 * (t - row) };
            let hi = (2 * (row + 1)).min(s);
            for sidx in lo..hi {
                let a1 = self.alpha.get(row - 1, sidx);
                let a2 = if sidx >= 1 {
                    self.alpha.get(row - 1, sidx - 1)
                } else {
                    NEG_INF
                };
                let a3 = if sidx >= 2
                    && self.label[sidx] != self.blank as i32
                    && self.label[sidx - 2] != self.label[sidx]
                {
                    self.alpha.get(row - 1, sidx - 2)
                } else {
                    NEG_INF
                };
                let acc = logsumexp3(a1, a2, a3);
                let v = acc + log_yp_at(row, self.label[sidx] as usize);
                self.alpha.set(row, sidx, v);
            }
        }

        for row in 0..t {
            let b_row = self.beta.row_mut(row);
            for v in b_row.iter_mut().take(s) {
                *v = NEG_INF;
            }
        }
        self.beta.set(t - 1, s - 1, 0.0);
        if s > 1 {
            self.beta.set(t - 1, s - 2, 0.0);
        }

        for row in (0..t - 1).rev() {
            let lo = if 2 * (t - row) >= s { 0 } else { s - 2 * (t - row) };
            let hi = (2 * (row + 1)).min(s);
            for sidx in lo..hi {
                let b1 = self.beta.get(row + 1, sidx) + log_yp_at(row + 1, self.label[sidx] as usize);
                let b2 = if sidx + 1 < s {
                    self.beta.get(row + 1, sidx + 1) + log_yp_at(row + 1, self.label[sidx + 1] as usize)
                } else {
                    NEG_INF
                };
                let b3 = if sidx + 2 < s
                    && self.label[sidx] != self.blank as i32
                    && self.label[sidx + 2] != self.label[sidx]
                {
                    self.beta.get(row + 1, sidx + 2) + log_yp_at(row + 1, self.label[sidx + 2] as usize)
                } else {
                    NEG_INF
                };
                self.beta.set(row, sidx, logsumexp3(b1, b2, b3));
            }
        }

        for row in 0..t {
            let mut acc = NEG_INF;
            for sidx in 0..s {
                acc = logsumexp2(acc, self.alpha.get(row, sidx) + self.beta.get(row, sidx));
            }
            self.rho[row] = acc;
        }

        self.y_hat = {
            let argmax: Vec<i32> = (0..t)
                .map(|row| {
                    let mut best_c = 0usize;
                    let mut best_v = f32::NEG_INFINITY;
                    for c in 0..l {
                        let v = self.log_yp.get(row, c);
                        if v > best_v {
                            best_v = v;
                            best_c = c;
                        }
                    }
                    best_c as i32
                })
                .collect();
            dedup_strip(&argmax, self.blank as i32)
        };

        let sum_neg_rho: f32 = self.rho[..t].iter().map(|&r| -r).sum();
        sum_neg_rho / t as f32
    }

    /// dL/dy[t][l], valid only immediately after a `loss` call with the same
    /// buffers (unchanged T, L).
    pub fn gradient(&self, yp: &Matrix, out: &mut Matrix) {
        let t = self.t;
        let s = self.s;
        let l = yp.cols();

        for row in 0..t {
            for c in 0..l {
                out.set(row, c, 0.0);
            }
        }

        for row in 0..t {
            let rho = self.rho[row];
            // accumulate per-label logsumexp(alpha+beta) over positions sharing that label
            let mut acc_per_label = vec![NEG_INF; l];
            for sidx in 0..s {
                let lab = self.label[sidx] as usize;
                let v = self.alpha.get(row, sidx) + self.beta.get(row, sidx);
                acc_per_label[lab] = logsumexp2(acc_per_label[lab], v);
            }
            for c in 0..l {
                let p = yp.get(row, c);
                let back = if acc_per_label[c] == NEG_INF {
                    0.0
                } else {
                    (acc_per_label[c] - rho).exp()
                };
                out.set(row, c, p - back);
            }
        }
    }

    /// `T * (1 - dist(y_hat, u) / max(|y_hat|, |u|))`, `T` when both empty.
    pub fn accuracy(&self) -> f32 {
        let t = self.t as f32;
        if self.y_hat.is_empty() && self.u.is_empty() {
            return t;
        }
        let dist = edit_distance(&self.y_hat, &self.u) as f32;
        let denom = self.y_hat.len().max(self.u.len()) as f32;
        t * (1.0 - dist / denom)
    }
}
