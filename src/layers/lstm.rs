//! Standard four-gate LSTM cell with manual backprop-through-time.
//!
//! `forward` is called once per time step by the driver; hidden/cell state
//! persists across those calls until `reset_state`. `backward` is called
//! once per time step in reverse chronological order; the carried
//! `dh`/`dc` from the later step is threaded through internal state rather
//! than the `Layer` trait's per-call signature.

use burn::module::{Module, Param};
use burn::prelude::*;
use burn::tensor::activation::{sigmoid, tanh};

use crate::buffer::Matrix;
use crate::layers::Layer;

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

#[derive(Clone)]
struct StepCache {
    x: Tensor<Backend, 2>,
    h_prev: Tensor<Backend, 2>,
    c_prev: Tensor<Backend, 2>,
    i: Tensor<Backend, 2>,
    f: Tensor<Backend, 2>,
    g: Tensor<Backend, 2>,
    o: Tensor<Backend, 2>,
    c: Tensor<Backend, 2>,
    tanh_c: Tensor<Backend, 2>,
}

#[derive(Module, Debug, Clone)]
pub struct Lstm {
    wx: Param<Tensor<Backend, 2>>,
    wh: Param<Tensor<Backend, 2>>,
    b: Param<Tensor<Backend, 2>>,

    #[module(skip)]
    hidden: usize,
    #[module(skip)]
    device: <Backend as burn::tensor::backend::Backend>::Device,

    #[module(skip)]
    h: Tensor<Backend, 2>,
    #[module(skip)]
    c: Tensor<Backend, 2>,
    #[module(skip)]
    cache: Vec<StepCache>,
    #[module(skip)]
    dh_carry: Tensor<Backend, 2>,
    #[module(skip)]
    dc_carry: Tensor<Backend, 2>,

    #[module(skip)]
    grad_wx: Option<Tensor<Backend, 2>>,
    #[module(skip)]
    grad_wh: Option<Tensor<Backend, 2>>,
    #[module(skip)]
    grad_b: Option<Tensor<Backend, 2>>,

    #[module(skip)]
    m_wx: Tensor<Backend, 2>,
    #[module(skip)]
    v_wx: Tensor<Backend, 2>,
    #[module(skip)]
    m_wh: Tensor<Backend, 2>,
    #[module(skip)]
    v_wh: Tensor<Backend, 2>,
    #[module(skip)]
    m_b: Tensor<Backend, 2>,
    #[module(skip)]
    v_b: Tensor<Backend, 2>,
    #[module(skip)]
    step: i32,
}

impl Lstm {
    pub fn new(in_dim: usize, hidden: usize) -> Self {
        let device = Default::default();
        let bound = (1.0 / hidden as f64).sqrt();
        let wx = Tensor::<Backend, 2>::random(
            [in_dim, 4 * hidden],
            burn::tensor::Distribution::Uniform(-bound, bound),
            &device,
        );
        let wh = Tensor::<Backend, 2>::random(
            [hidden, 4 * hidden],
            burn::tensor::Distribution::Uniform(-bound, bound),
            &device,
        );
        let b = Tensor::<Backend, 2>::zeros([1, 4 * hidden], &device);
        Lstm {
            wx: Param::from_tensor(wx),
            wh: Param::from_tensor(wh),
            b: Param::from_tensor(b),
            hidden,
            device,
            h: Tensor::zeros([1, hidden], &device),
            c: Tensor::zeros([1, hidden], &device),
            cache: Vec::new(),
            dh_carry: Tensor::zeros([1, hidden], &device),
            dc_carry: Tensor::zeros([1, hidden], &device),
            grad_wx: None,
            grad_wh: None,
            grad_b: None,
            m_wx: Tensor::zeros([in_dim, 4 * hidden], &device),
            v_wx: Tensor::zeros([in_dim, 4 * hidden], &device),
            m_wh: Tensor::zeros([hidden, 4 * hidden], &device),
            v_wh: Tensor::zeros([hidden, 4 * hidden], &device),
            m_b: Tensor::zeros([1, 4 * hidden], &device),
            v_b: Tensor::zeros([1, 4 * hidden], &device),
            step: 0,
        }
    }
}

impl Lstm {
    pub fn in_dim(&self) -> usize {
        self.wx.val().dims()[0]
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }
}

impl Layer for Lstm {
    fn forward(&mut self, x: &Matrix) -> Matrix {
        let x_t = matrix_to_tensor(x, &self.device);
        let h_prev = self.h.clone();
        let c_prev = self.c.clone();
        let hidden = self.hidden;

        let z = x_t.clone().matmul(self.wx.val())
            + h_prev.clone().matmul(self.wh.val())
            + self.b.val().repeat(&[x_t.dims()[0], 1]);

        let i = sigmoid(z.clone().slice([0..z.dims()[0], 0..hidden]));
        let f = sigmoid(z.clone().slice([0..z.dims()[0], hidden..2 * hidden]));
        let g = tanh(z.clone().slice([0..z.dims()[0], 2 * hidden..3 * hidden]));
        let o = sigmoid(z.slice([0..x_t.dims()[0], 3 * hidden..4 * hidden]));

        let c_new = f.clone() * c_prev.clone() + i.clone() * g.clone();
        let tanh_c = tanh(c_new.clone());
        let h_new = o.clone() * tanh_c.clone();

        self.cache.push(StepCache {
            x: x_t,
            h_prev,
            c_prev,
            i,
            f,
            g,
            o,
            c: c_new.clone(),
            tanh_c: tanh_c.clone(),
        });

        self.h = h_new.clone();
        self.c = c_new;

        tensor_to_matrix(&h_new)
    }

    fn backward(&mut self, d_out: &Matrix) -> Matrix {
        let cache = self
            .cache
            .pop()
            .expect("backward called more times than forward");
        let d_out_t = matrix_to_tensor(d_out, &self.device);

        let dh = d_out_t + self.dh_carry.clone();
        let one_minus_tanh_c2 = tanh_c_grad(&cache.tanh_c);
        let dc = dh.clone() * cache.o.clone() * one_minus_tanh_c2 + self.dc_carry.clone();

        let d_o = dh * cache.tanh_c.clone() * sigmoid_grad(&cache.o);
        let d_g = dc.clone() * cache.i.clone() * tanh_grad(&cache.g);
        let d_i = dc.clone() * cache.g.clone() * sigmoid_grad(&cache.i);
        let d_f = dc.clone() * cache.c_prev.clone() * sigmoid_grad(&cache.f);

        let dz = Tensor::cat(vec![d_i, d_f, d_g, d_o], 1);

        let dwx = cache.x.clone().transpose().matmul(dz.clone());
        let dwh = cache.h_prev.clone().transpose().matmul(dz.clone());
        let db = dz.clone().sum_dim(0);

        self.grad_wx = Some(match self.grad_wx.take() {
            Some(g) => g + dwx,
            None => dwx,
        });
        self.grad_wh = Some(match self.grad_wh.take() {
            Some(g) => g + dwh,
            None => dwh,
        });
        self.grad_b = Some(match self.grad_b.take() {
            Some(g) => g + db,
            None => db,
        });

        let dx = dz.clone().matmul(self.wx.val().transpose());
        self.dh_carry = dz.clone().matmul(self.wh.val().transpose());
        self.dc_carry = dc * cache.f;

        tensor_to_matrix(&dx)
    }

    fn apply_gradients(&mut self, lr: f64, wd: f64) {
        let (Some(gwx), Some(gwh), Some(gb)) =
            (self.grad_wx.take(), self.grad_wh.take(), self.grad_b.take())
        else {
            return;
        };
        self.step += 1;
        let bc1 = 1.0 - ADAM_BETA1.powi(self.step);
        let bc2 = 1.0 - ADAM_BETA2.powi(self.step);

        self.m_wx = self.m_wx.clone() * ADAM_BETA1 + gwx.clone() * (1.0 - ADAM_BETA1);
        self.v_wx = self.v_wx.clone() * ADAM_BETA2 + gwx.powf_scalar(2.0) * (1.0 - ADAM_BETA2);
        let upd = (self.m_wx.clone() / bc1) / ((self.v_wx.clone() / bc2).sqrt() + ADAM_EPS);
        self.wx = Param::from_tensor(self.wx.val() * (1.0 - lr * wd) - upd * lr);

        self.m_wh = self.m_wh.clone() * ADAM_BETA1 + gwh.clone() * (1.0 - ADAM_BETA1);
        self.v_wh = self.v_wh.clone() * ADAM_BETA2 + gwh.powf_scalar(2.0) * (1.0 - ADAM_BETA2);
        let upd = (self.m_wh.clone() / bc1) / ((self.v_wh.clone() / bc2).sqrt() + ADAM_EPS);
        self.wh = Param::from_tensor(self.wh.val() * (1.0 - lr * wd) - upd * lr);

        self.m_b = self.m_b.clone() * ADAM_BETA1 + gb.clone() * (1.0 - ADAM_BETA1);
        self.v_b = self.v_b.clone() * ADAM_BETA2 + gb.powf_scalar(2.0) * (1.0 - ADAM_BETA2);
        let upd = (self.m_b.clone() / bc1) / ((self.v_b.clone() / bc2).sqrt() + ADAM_EPS);
        self.b = Param::from_tensor(self.b.val() - upd * lr);
    }

    fn reset_state(&mut self) {
        let batch = self.h.dims()[0];
        self.h = Tensor::zeros([batch, self.hidden], &self.device);
        self.c = Tensor::zeros([batch, self.hidden], &self.device);
        self.dh_carry = Tensor::zeros([batch, self.hidden], &self.device);
        self.dc_carry = Tensor::zeros([batch, self.hidden], &self.device);
        self.cache.clear();
    }

    fn set_batch_size(&mut self, b: usize) {
        // No-op on `h`/`c` when the shape already matches: this is what lets
        // `train_epoch_with_mode`'s `stateful` mode carry hidden state across
        // batches (it calls this every batch regardless of mode). Only a
        // genuine batch-size change forces a zeroed reinit.
        if self.h.dims()[0] != b {
            self.h = Tensor::zeros([b, self.hidden], &self.device);
            self.c = Tensor::zeros([b, self.hidden], &self.device);
            self.dh_carry = Tensor::zeros([b, self.hidden], &self.device);
            self.dc_carry = Tensor::zeros([b, self.hidden], &self.device);
        }
        self.cache.clear();
    }
}

fn sigmoid_grad(s: &Tensor<Backend, 2>) -> Tensor<Backend, 2> {
    s.clone() * (-s.clone() + 1.0)
}

fn tanh_grad(t: &Tensor<Backend, 2>) -> Tensor<Backend, 2> {
    -t.clone().powf_scalar(2.0) + 1.0
}

fn tanh_c_grad(tanh_c: &Tensor<Backend, 2>) -> Tensor<Backend, 2> {
    tanh_grad(tanh_c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_preserves_batch_and_hidden_size() {
        let mut lstm = Lstm::new(4, 6);
        lstm.set_batch_size(2);
        let x = Matrix::zeros(2, 4);
        let h = lstm.forward(&x);
        assert_eq!((h.rows(), h.cols()), (2, 6));
    }

    #[test]
    fn set_batch_size_preserves_state_when_shape_is_unchanged() {
        let mut lstm = Lstm::new(3, 4);
        lstm.set_batch_size(1);
        let x = Matrix::zeros(1, 3);
        lstm.forward(&x);
        let h_before = tensor_to_matrix(&lstm.h);
        lstm.set_batch_size(1);
        let h_after = tensor_to_matrix(&lstm.h);
        assert_eq!(h_before.as_slice(), h_after.as_slice());
    }

    #[test]
    fn set_batch_size_resets_state_on_shape_change() {
        let mut lstm = Lstm::new(3, 4);
        lstm.set_batch_size(1);
        let x = Matrix::zeros(1, 3);
        lstm.forward(&x);
        lstm.set_batch_size(2);
        assert_eq!(lstm.h.dims()[0], 2);
        assert!(tensor_to_matrix(&lstm.h).as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn reset_state_clears_cache_and_carries() {
        let mut lstm = Lstm::new(3, 5);
        lstm.set_batch_size(1);
        let x = Matrix::zeros(1, 3);
        lstm.forward(&x);
        lstm.forward(&x);
        lstm.reset_state();
        assert!(lstm.cache.is_empty());
    }

    #[test]
    fn backward_through_two_steps_produces_input_gradients() {
        let mut lstm = Lstm::new(3, 4);
        lstm.set_batch_size(1);
        let x = Matrix::zeros(1, 3);
        lstm.forward(&x);
        lstm.forward(&x);
        let d_out = Matrix::filled(1, 4, 0.1);
        let dx2 = lstm.backward(&d_out);
        let dx1 = lstm.backward(&d_out);
        assert_eq!(dx2.cols(), 3);
        assert_eq!(dx1.cols(), 3);
    }
}
