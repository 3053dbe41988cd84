//! Fully-connected layer with an embedded AdamW moment state.

use burn::module::{Module, Param};
use burn::prelude::*;
use burn::tensor::activation::softmax;

use crate::buffer::Matrix;
use crate::layers::{Activation, Layer};

type Backend = burn::backend::NdArray;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

fn matrix_to_tensor(m: &Matrix, device: &<Backend as burn::tensor::backend::Backend>::Device) -> Tensor<Backend, 2> {
    Tensor::<Backend, 2>::from_data(
        burn::tensor::TensorData::new(m.as_slice().to_vec(), [m.rows(), m.cols()]),
        device,
    )
}

fn tensor_to_matrix(t: &Tensor<Backend, 2>) -> Matrix {
    let dims = t.dims();
    let data: Vec<f32> = t.to_data().to_vec().unwrap();
    Matrix::from_vec(data, dims[0], dims[1])
}

/// `y = activation(x W + b)`. Gradients for `W`/`b` accumulate across the
/// calls made between two `apply_gradients` invocations (a full sequence's
/// worth of time steps); `apply_gradients` then runs one AdamW step.
///
/// The driver runs all of a sequence's forwards before any of its
/// backwards (see `driver::train`), so each `forward`'s input is pushed
/// onto `x_cache` and `backward` pops the matching one LIFO — the same
/// stack discipline `Lstm` uses, needed because a single `Option` would
/// only ever hold the last time step's input.
#[derive(Module, Debug, Clone)]
pub struct Dense {
    w: Param<Tensor<Backend, 2>>,
    b: Param<Tensor<Backend, 2>>,
    #[module(skip)]
    activation: Activation,
    #[module(skip)]
    device: <Backend as burn::tensor::backend::Backend>::Device,

    #[module(skip)]
    x_cache: Vec<Tensor<Backend, 2>>,
    #[module(skip)]
    grad_w: Option<Tensor<Backend, 2>>,
    #[module(skip)]
    grad_b: Option<Tensor<Backend, 2>>,

    #[module(skip)]
    m_w: Tensor<Backend, 2>,
    #[module(skip)]
    v_w: Tensor<Backend, 2>,
    #[module(skip)]
    m_b: Tensor<Backend, 2>,
    #[module(skip)]
    v_b: Tensor<Backend, 2>,
    #[module(skip)]
    step: i32,
}

impl Dense {
    pub fn new(in_dim: usize, out_dim: usize, activation: Activation) -> Self {
        let device = Default::default();
        let bound = (1.0 / in_dim as f64).sqrt();
        let w = Tensor::<Backend, 2>::random(
            [in_dim, out_dim],
            burn::tensor::Distribution::Uniform(-bound, bound),
            &device,
        );
        let b = Tensor::<Backend, 2>::zeros([1, out_dim], &device);
        Dense {
            w: Param::from_tensor(w),
            b: Param::from_tensor(b),
            activation,
            device,
            x_cache: Vec::new(),
            grad_w: None,
            grad_b: None,
            m_w: Tensor::zeros([in_dim, out_dim], &device),
            v_w: Tensor::zeros([in_dim, out_dim], &device),
            m_b: Tensor::zeros([1, out_dim], &device),
            v_b: Tensor::zeros([1, out_dim], &device),
            step: 0,
        }
    }

    pub fn in_dim(&self) -> usize {
        self.w.val().dims()[0]
    }

    pub fn out_dim(&self) -> usize {
        self.w.val().dims()[1]
    }
}

impl Layer for Dense {
    fn forward(&mut self, x: &Matrix) -> Matrix {
        let x_t = matrix_to_tensor(x, &self.device);
        let batch = x_t.dims()[0];
        let z = x_t.clone().matmul(self.w.val()) + self.b.val().reshape([1, self.out_dim()]).repeat(&[batch, 1]);
        let y = match self.activation {
            Activation::Identity => z,
            Activation::Softmax => softmax(z, 1),
        };
        self.x_cache.push(x_t);
        tensor_to_matrix(&y)
    }

    fn backward(&mut self, d_out: &Matrix) -> Matrix {
        let d_out_t = matrix_to_tensor(d_out, &self.device);
        let x_t = self
            .x_cache
            .pop()
            .expect("backward called more times than forward");

        // d_out here is dL/dz already (softmax-crossentropy and identity
        // heads both fold their Jacobian into the caller-supplied gradient,
        // per the driver's contract in driver::train).
        let dw = x_t.clone().transpose().matmul(d_out_t.clone());
        let db = d_out_t.clone().sum_dim(0);
        let dx = d_out_t.matmul(self.w.val().transpose());

        self.grad_w = Some(match self.grad_w.take() {
            Some(g) => g + dw,
            None => dw,
        });
        self.grad_b = Some(match self.grad_b.take() {
            Some(g) => g + db,
            None => db,
        });

        tensor_to_matrix(&dx)
    }

    fn apply_gradients(&mut self, lr: f64, wd: f64) {
        let (Some(gw), Some(gb)) = (self.grad_w.take(), self.grad_b.take()) else {
            return;
        };
        self.step += 1;

        self.m_w = self.m_w.clone() * ADAM_BETA1 + gw.clone() * (1.0 - ADAM_BETA1);
        self.v_w = self.v_w.clone() * ADAM_BETA2 + gw.clone().powf_scalar(2.0) * (1.0 - ADAM_BETA2);
        let bias_correction1 = 1.0 - ADAM_BETA1.powi(self.step);
        let bias_correction2 = 1.0 - ADAM_BETA2.powi(self.step);
        let m_hat_w = self.m_w.clone() / bias_correction1;
        let v_hat_w = self.v_w.clone() / bias_correction2;
        let update_w = m_hat_w / (v_hat_w.sqrt() + ADAM_EPS);
        let new_w = self.w.val() * (1.0 - lr * wd) - update_w * lr;
        self.w = Param::from_tensor(new_w);

        self.m_b = self.m_b.clone() * ADAM_BETA1 + gb.clone() * (1.0 - ADAM_BETA1);
        self.v_b = self.v_b.clone() * ADAM_BETA2 + gb.clone().powf_scalar(2.0) * (1.0 - ADAM_BETA2);
        let m_hat_b = self.m_b.clone() / bias_correction1;
        let v_hat_b = self.v_b.clone() / bias_correction2;
        let update_b = m_hat_b / (v_hat_b.sqrt() + ADAM_EPS);
        let new_b = self.b.val() - update_b * lr;
        self.b = Param::from_tensor(new_b);
    }

    fn reset_state(&mut self) {
        self.x_cache.clear();
    }

    fn set_batch_size(&mut self, _b: usize) {
        // Dense carries no per-step state; batch size is read off the input.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_produces_expected_shape() {
        let mut dense = Dense::new(4, 3, Activation::Identity);
        let x = Matrix::zeros(2, 4);
        let y = dense.forward(&x);
        assert_eq!((y.rows(), y.cols()), (2, 3));
    }

    #[test]
    fn softmax_head_rows_sum_to_one() {
        let mut dense = Dense::new(3, 5, Activation::Softmax);
        let mut x = Matrix::zeros(2, 3);
        x.set(0, 0, 0.3);
        x.set(1, 1, -0.7);
        let y = dense.forward(&x);
        for row in 0..2 {
            let sum: f32 = (0..5).map(|c| y.get(row, c)).sum();
            assert!((sum - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn backward_without_forward_panics() {
        let mut dense = Dense::new(2, 2, Activation::Identity);
        let d_out = Matrix::zeros(1, 2);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dense.backward(&d_out)
        }));
        assert!(result.is_err());
    }

    #[test]
    fn backward_pairs_with_its_own_forwards_input_not_the_last_one() {
        // Two distinct, orthogonal inputs forwarded before any backward
        // (matching the driver's forward-all-steps-then-backward-all-steps
        // order). If `backward` used a single overwritten `last_x` instead
        // of a popped stack entry, both calls would use x2 and the x1 row
        // of the weight gradient would stay zero.
        let mut dense = Dense::new(2, 2, Activation::Identity);
        let mut x1 = Matrix::zeros(1, 2);
        x1.set(0, 0, 1.0);
        let mut x2 = Matrix::zeros(1, 2);
        x2.set(0, 1, 1.0);

        dense.forward(&x1);
        dense.forward(&x2);

        let d_out = Matrix::filled(1, 2, 1.0);
        dense.backward(&d_out); // pops x2's cache entry
        dense.backward(&d_out); // pops x1's cache entry

        let grad_w = tensor_to_matrix(&dense.grad_w.expect("gradient accumulated"));
        assert_eq!(grad_w.get(0, 0), 1.0);
        assert_eq!(grad_w.get(0, 1), 1.0);
        assert_eq!(grad_w.get(1, 0), 1.0);
        assert_eq!(grad_w.get(1, 1), 1.0);
        assert!(dense.x_cache.is_empty());
    }
}
