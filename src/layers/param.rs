/// A trainable tensor together with its accumulated gradient.
///
/// Layers own their `Param`s; optimizers only ever see them through
/// `Model::params_mut()`, in a stable order.
#[derive(Debug, Clone)]
pub struct Param {
    pub value: Vec<f64>,
    pub grad: Vec<f64>,
}

impl Param {
    pub fn new(value: Vec<f64>) -> Param {
        let grad = vec![0.0; value.len()];
        Param { value, grad }
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn zero_grad(&mut self) {
        self.grad.iter_mut().for_each(|g| *g = 0.0);
    }
}
