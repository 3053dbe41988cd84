//! Needleman–Wunsch global alignment over integer alphabets (C2).

use crate::error::{Error, Result};

const MATCH_SCORE: i32 = 1;
const MISMATCH_SCORE: i32 = -1;
const INDEL_SCORE: i32 = -1;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Trace {
    Diag,
    Up,
    Left,
}

/// Result of an alignment: two gap-padded, forward-ordered sequences of
/// equal length (trailing entries past the real length are `sentinel`), and
/// the edit distance of the aligned pair.
pub struct Alignment {
    pub rp: Vec<i32>,
    pub rt: Vec<i32>,
    pub distance: usize,
}

/// Align `p` and `t`, writing gap-padded sequences into two `rlen`-length
/// buffers (`rlen >= 2 * max(p.len(), t.len())`, else `InsufficientBuffer`).
///
/// Traceback tie-break priority is diagonal > up > left (match preferred
/// over either kind of indel).
pub fn align(p: &[i32], t: &[i32], sentinel: i32, rlen: usize) -> Result<Alignment> {
    let needed = 2 * p.len().max(t.len());
    if rlen < needed {
        return Err(Error::InsufficientBuffer {
            needed,
            got: rlen,
        });
    }

    let n = p.len();
    let m = t.len();

    // score[i][j]: best score aligning p[..i] with t[..j]
    let mut score = vec![0i32; (n + 1) * (m + 1)];
    let mut trace = vec![Trace::Diag; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;

    for i in 0..=n {
        score[idx(i, 0)] = i as i32 * INDEL_SCORE;
        trace[idx(i, 0)] = Trace::Up;
    }
    for j in 0..=m {
        score[idx(0, j)] = j as i32 * INDEL_SCORE;
        trace[idx(0, j)] = Trace::Left;
    }
    score[idx(0, 0)] = 0;

    for i in 1..=n {
        for j in 1..=m {
            let sub = if p[i - 1] == t[j - 1] {
                MATCH_SCORE
            } else {
                MISMATCH_SCORE
            };
            let diag = score[idx(i - 1, j - 1)] + sub;
            let up = score[idx(i - 1, j)] + INDEL_SCORE;
            let left = score[idx(i, j - 1)] + INDEL_SCORE;

            // diagonal > up > left
            let (best, tr) = if diag >= up && diag >= left {
                (diag, Trace::Diag)
            } else if up >= left {
                (up, Trace::Up)
            } else {
                (left, Trace::Left)
            };
            score[idx(i, j)] = best;
            trace[idx(i, j)] = tr;
        }
    }

    // Traceback from (n, m), producing reversed sequences.
    let mut rp_rev = Vec::new();
    let mut rt_rev = Vec::new();
    let mut substitutions = 0usize;
    let mut insertions = 0usize;
    let mut deletions = 0usize;
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        let tr = if i == 0 {
            Trace::Left
        } else if j == 0 {
            Trace::Up
        } else {
            trace[idx(i, j)]
        };
        match tr {
            Trace::Diag => {
                rp_rev.push(p[i - 1]);
                rt_rev.push(t[j - 1]);
                if p[i - 1] != t[j - 1] {
                    substitutions += 1;
                }
                i -= 1;
                j -= 1;
            }
            Trace::Up => {
                rp_rev.push(p[i - 1]);
                rt_rev.push(sentinel);
                deletions += 1;
                i -= 1;
            }
            Trace::Left => {
                rp_rev.push(sentinel);
                rt_rev.push(t[j - 1]);
                insertions += 1;
                j -= 1;
            }
        }
    }

    let mut rp: Vec<i32> = rp_rev.into_iter().rev().collect();
    let mut rt: Vec<i32> = rt_rev.into_iter().rev().collect();
    rp.resize(rlen, sentinel);
    rt.resize(rlen, sentinel);

    Ok(Alignment {
        rp,
        rt,
        distance: insertions + deletions + substitutions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s2() {
        let result = align(&[1, 2, 3], &[1, 3], 0, 6).unwrap();
        assert_eq!(result.rp, vec![1, 2, 3, 0, 0, 0]);
        assert_eq!(result.rt, vec![1, 0, 3, 0, 0, 0]);
        assert_eq!(result.distance, 1);
    }

    #[test]
    fn insufficient_buffer_errors() {
        let err = align(&[1, 2, 3], &[1, 3], 0, 2).unwrap_err();
        matches!(err, Error::InsufficientBuffer { .. });
    }

    #[test]
    fn identical_sequences_have_zero_distance() {
        let result = align(&[1, 2, 3], &[1, 2, 3], 0, 6).unwrap();
        assert_eq!(result.distance, 0);
        assert_eq!(&result.rp[..3], &[1, 2, 3]);
        assert_eq!(&result.rt[..3], &[1, 2, 3]);
    }

    #[test]
    fn equal_length_post_condition() {
        let result = align(&[1, 2, 3, 4], &[9, 2, 9, 4], 0, 8).unwrap();
        assert_eq!(result.rp.len(), result.rt.len());
    }
}
