//! Dataset shape adapter (C7): arranges sequences into time-major batches.

use crate::buffer::Matrix;
use crate::dataset::onehot::to_one_hot;
use crate::dataset::Sequence;

/// One time-major mini-batch: `x[b]` is `[Tmax, D]`, `y[b]` is `[Tmax,
/// num_classes]` (blank one-hot past each slot's valid length), and
/// `valid_len[b]` is the real sequence length for slot `b`.
pub struct Batch {
    pub x: Vec<Matrix>,
    pub y: Vec<Matrix>,
    pub valid_len: Vec<usize>,
}

/// Split `sequences` into batches of size `b` (last batch may be smaller),
/// sorted by descending length first so that batch membership minimizes
/// total padding.
pub fn make_batches(
    sequences: &[Sequence],
    batch_size: usize,
    feature_dim: usize,
    num_classes: usize,
    blank: usize,
) -> Vec<Batch> {
    let mut order: Vec<usize> = (0..sequences.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(sequences[i].len()));

    let mut batches = Vec::new();
    for chunk in order.chunks(batch_size) {
        let t_max = chunk.iter().map(|&i| sequences[i].len()).max().unwrap_or(0);
        let mut x = Vec::with_capacity(chunk.len());
        let mut y = Vec::with_capacity(chunk.len());
        let mut valid_len = Vec::with_capacity(chunk.len());

        for &i in chunk {
            let seq = &sequences[i];
            let mut xm = Matrix::zeros(t_max, feature_dim);
            let mut ym = Matrix::zeros(t_max, num_classes);
            for t in 0..t_max {
                if t < seq.len() {
                    xm.row_mut(t).copy_from_slice(seq.frames.row(t));
                    to_one_hot(&mut ym, t, seq.labels[t], num_classes);
                } else {
                    to_one_hot(&mut ym, t, blank, num_classes);
                }
            }
            x.push(xm);
            y.push(ym);
            valid_len.push(seq.len());
        }

        batches.push(Batch { x, y, valid_len });
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(len: usize, feature_dim: usize) -> Sequence {
        Sequence {
            frames: Matrix::zeros(len, feature_dim),
            labels: vec![1; len],
            eop: vec![false; len],
        }
    }

    #[test]
    fn batches_pad_shorter_sequences_with_blank_one_hot() {
        let sequences = vec![seq(5, 3), seq(2, 3)];
        let batches = make_batches(&sequences, 2, 3, 4, 0);
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.x[0].rows(), 5);
        assert_eq!(batch.valid_len, vec![5, 2]);
        // slot 1's tail (t=2..5) should be blank-one-hot
        for t in 2..5 {
            assert_eq!(batch.y[1].row(t)[0], 1.0);
        }
    }

    #[test]
    fn descending_length_grouping_minimizes_padding() {
        let sequences = vec![seq(1, 2), seq(10, 2), seq(9, 2), seq(2, 2)];
        let batches = make_batches(&sequences, 2, 2, 3, 0);
        // first batch should pair the two longest sequences (10, 9)
        assert_eq!(batches[0].valid_len, vec![10, 9]);
    }

    #[test]
    fn empty_input_yields_no_batches() {
        let sequences: Vec<Sequence> = Vec::new();
        let batches = make_batches(&sequences, 4, 2, 3, 0);
        assert!(batches.is_empty());
    }
}
