//! Layer chain (C8): `Dense` and `Lstm` behind a narrow `Layer` trait.
//!
//! Matrix storage and matmul/activation primitives ride on `burn`'s
//! `Tensor<NdArray>` (no autodiff, no GPU backend); gradients are
//! hand-derived closed forms, not produced by `burn`'s autodiff graph.

pub mod dense;
pub mod lstm;

use crate::buffer::Matrix;

pub use dense::Dense;
pub use lstm::Lstm;

/// Softmax is applied only by the head layer; hidden layers pass through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Softmax,
}

/// A single stage in the training/inference stack. `forward`/`backward`
/// operate on row-major `[batch, features]` matrices; time stepping is
/// driven by the caller (the driver in `driver::train`), one call per
/// time step, with `Lstm` carrying hidden/cell state across calls until
/// `reset_state`.
pub trait Layer {
    fn forward(&mut self, x: &Matrix) -> Matrix;
    fn backward(&mut self, d_out: &Matrix) -> Matrix;
    fn apply_gradients(&mut self, lr: f64, wd: f64);
    fn reset_state(&mut self);
    fn set_batch_size(&mut self, b: usize);
}

/// An ordered stack of layers, the head producing class probabilities.
pub struct LayerChain {
    pub layers: Vec<LayerKind>,
}

pub enum LayerKind {
    Dense(Dense),
    Lstm(Lstm),
}

impl Layer for LayerKind {
    fn forward(&mut self, x: &Matrix) -> Matrix {
        match self {
            LayerKind::Dense(l) => l.forward(x),
            LayerKind::Lstm(l) => l.forward(x),
        }
    }

    fn backward(&mut self, d_out: &Matrix) -> Matrix {
        match self {
            LayerKind::Dense(l) => l.backward(d_out),
            LayerKind::Lstm(l) => l.backward(d_out),
        }
    }

    fn apply_gradients(&mut self, lr: f64, wd: f64) {
        match self {
            LayerKind::Dense(l) => l.apply_gradients(lr, wd),
            LayerKind::Lstm(l) => l.apply_gradients(lr, wd),
        }
    }

    fn reset_state(&mut self) {
        match self {
            LayerKind::Dense(l) => l.reset_state(),
            LayerKind::Lstm(l) => l.reset_state(),
        }
    }

    fn set_batch_size(&mut self, b: usize) {
        match self {
            LayerKind::Dense(l) => l.set_batch_size(b),
            LayerKind::Lstm(l) => l.set_batch_size(b),
        }
    }
}

impl LayerChain {
    pub fn new(layers: Vec<LayerKind>) -> Self {
        LayerChain { layers }
    }

    pub fn forward(&mut self, x: &Matrix) -> Matrix {
        let mut cur = x.clone();
        for layer in &mut self.layers {
            cur = layer.forward(&cur);
        }
        cur
    }

    pub fn backward(&mut self, d_out: &Matrix) -> Matrix {
        let mut cur = d_out.clone();
        for layer in self.layers.iter_mut().rev() {
            cur = layer.backward(&cur);
        }
        cur
    }

    pub fn apply_gradients(&mut self, lr: f64, wd: f64) {
        for layer in &mut self.layers {
            layer.apply_gradients(lr, wd);
        }
    }

    pub fn reset_state(&mut self) {
        for layer in &mut self.layers {
            layer.reset_state();
        }
    }

    pub fn set_batch_size(&mut self, b: usize) {
        for layer in &mut self.layers {
            layer.set_batch_size(b);
        }
    }
}
