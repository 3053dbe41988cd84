//! Class index <-> one-hot row conversion.

use crate::buffer::Matrix;

/// Write a one-hot row for `class` into `row(t)` of `out` (width `num_classes`).
pub fn to_one_hot(out: &mut Matrix, t: usize, class: usize, num_classes: usize) {
    let row = out.row_mut(t);
    row.iter_mut().for_each(|v| *v = 0.0);
    if class < num_classes {
        row[class] = 1.0;
    }
}

/// Argmax of `m.row(t)`.
pub fn from_one_hot(m: &Matrix, t: usize) -> usize {
    let row = m.row(t);
    let mut best_c = 0usize;
    let mut best_v = f32::NEG_INFINITY;
    for (c, &v) in row.iter().enumerate() {
        if v > best_v {
            best_v = v;
            best_c = c;
        }
    }
    best_c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_class_index() {
        let mut m = Matrix::zeros(1, 5);
        to_one_hot(&mut m, 0, 3, 5);
        assert_eq!(from_one_hot(&m, 0), 3);
    }

    #[test]
    fn out_of_range_class_leaves_all_zero_row() {
        let mut m = Matrix::filled(1, 4, 1.0);
        to_one_hot(&mut m, 0, 10, 4);
        assert_eq!(m.row(0), &[0.0, 0.0, 0.0, 0.0]);
    }
}
