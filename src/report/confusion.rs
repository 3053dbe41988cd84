//! Confusion-matrix accumulation and the CSV format from §6: header row is
//! a leading comma then class names; each subsequent row starts with the
//! true class name followed by `C` counts.

/// Square `num_classes x num_classes` accumulator, `counts[true][pred]`.
pub struct ConfusionMatrix {
    counts: Vec<usize>,
    num_classes: usize,
    names: Vec<String>,
}

impl ConfusionMatrix {
    pub fn new(names: Vec<String>) -> Self {
        let num_classes = names.len();
        ConfusionMatrix {
            counts: vec![0; num_classes * num_classes],
            num_classes,
            names,
        }
    }

    /// Accumulate one `(true, predicted)` pair from a C2-aligned pair.
    /// Positions where both are the blank class are skipped by the caller
    /// before reaching here.
    pub fn record(&mut self, true_class: usize, predicted_class: usize) {
        if true_class < self.num_classes && predicted_class < self.num_classes {
            self.counts[true_class * self.num_classes + predicted_class] += 1;
        }
    }

    /// Accumulate over an aligned pair of equal-length label sequences,
    /// skipping positions where both entries equal `blank`.
    pub fn record_aligned(&mut self, rt: &[i32], rp: &[i32], blank: i32) {
        for (&t, &p) in rt.iter().zip(rp.iter()) {
            if t == blank && p == blank {
                continue;
            }
            if t >= 0 && p >= 0 {
                self.record(t as usize, p as usize);
            }
        }
    }

    pub fn get(&self, true_class: usize, predicted_class: usize) -> usize {
        self.counts[true_class * self.num_classes + predicted_class]
    }

    /// Render as the CSV format from §6.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push(',');
        out.push_str(&self.names.join(","));
        out.push('\n');
        for (r, name) in self.names.iter().enumerate() {
            out.push_str(name);
            for c in 0..self.num_classes {
                out.push(',');
                out.push_str(&self.get(r, c).to_string());
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_header_has_leading_comma() {
        let cm = ConfusionMatrix::new(vec!["a".into(), "b".into()]);
        let csv = cm.to_csv();
        assert!(csv.starts_with(",a,b\n"));
    }

    #[test]
    fn record_increments_the_right_cell() {
        let mut cm = ConfusionMatrix::new(vec!["a".into(), "b".into()]);
        cm.record(0, 1);
        cm.record(0, 1);
        assert_eq!(cm.get(0, 1), 2);
        assert_eq!(cm.get(1, 0), 0);
    }

    #[test]
    fn record_aligned_skips_blank_blank_positions() {
        let mut cm = ConfusionMatrix::new(vec!["blank".into(), "a".into()]);
        cm.record_aligned(&[0, 1, 0], &[0, 1, 0], 0);
        assert_eq!(cm.get(0, 0), 0);
        assert_eq!(cm.get(1, 1), 1);
    }
}
