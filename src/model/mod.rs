//! Layer-chain assembly on top of `layers::{Dense, Lstm}`.

pub mod checkpoint;

use crate::layers::{Activation, Dense, Lstm, LayerChain, LayerKind};

/// Build a stack of `Lstm` layers (sizes from `-L`) followed by an implicit
/// dense-softmax head of width `num_classes`, per the CLI contract in §6.
pub fn build_chain(input_dim: usize, hidden_sizes: &[usize], num_classes: usize) -> LayerChain {
    let mut layers = Vec::new();
    let mut prev = input_dim;
    for &h in hidden_sizes {
        layers.push(LayerKind::Lstm(Lstm::new(prev, h)));
        prev = h;
    }
    layers.push(LayerKind::Dense(Dense::new(prev, num_classes, Activation::Softmax)));
    LayerChain::new(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Layer;

    #[test]
    fn chain_forward_yields_class_probabilities() {
        let mut chain = build_chain(4, &[8], 3);
        chain.set_batch_size(2);
        let x = crate::buffer::Matrix::zeros(2, 4);
        let y = chain.forward(&x);
        assert_eq!((y.rows(), y.cols()), (2, 3));
        for row in 0..2 {
            let sum: f32 = (0..3).map(|c| y.get(row, c)).sum();
            assert!((sum - 1.0).abs() < 1e-3);
        }
    }
}
