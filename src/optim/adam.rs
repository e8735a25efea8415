use crate::error::ModelError;
use crate::layers::param::Param;
use crate::optim::optimizer::{Optimizer, OptimizerState};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPS: f64 = 1e-8;

/// Adam with bias-corrected first and second moment estimates.
///
/// Moment buffers are created lazily on the first step, one per parameter
/// tensor in `Model::params_mut()` order.
pub struct Adam {
    pub learning_rate: f64,
    step: u64,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam { learning_rate, step: 0, m: Vec::new(), v: Vec::new() }
    }

    pub fn steps_taken(&self) -> u64 {
        self.step
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<&mut Param>) {
        if self.m.len() != params.len() {
            self.m = params.iter().map(|p| vec![0.0; p.len()]).collect();
            self.v = params.iter().map(|p| vec![0.0; p.len()]).collect();
        }
        self.step += 1;
        let t = self.step as i32;
        let bc1 = 1.0 - BETA1.powi(t);
        let bc2 = 1.0 - BETA2.powi(t);

        for ((param, m), v) in params.into_iter().zip(&mut self.m).zip(&mut self.v) {
            for i in 0..param.value.len() {
                let g = param.grad[i];
                m[i] = BETA1 * m[i] + (1.0 - BETA1) * g;
                v[i] = BETA2 * v[i] + (1.0 - BETA2) * g * g;
                let m_hat = m[i] / bc1;
                let v_hat = v[i] / bc2;
                param.value[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + EPS);
            }
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn state(&self) -> OptimizerState {
        OptimizerState::Adam {
            learning_rate: self.learning_rate,
            step: self.step,
            m: self.m.clone(),
            v: self.v.clone(),
        }
    }

    fn load_state(&mut self, state: &OptimizerState, param_sizes: &[usize]) -> Result<(), ModelError> {
        match state {
            OptimizerState::Adam { step, m, v, .. } => {
                // Empty buffers: saved before the first step.
                if !(m.is_empty() && v.is_empty()) {
                    check_moments("first", m, param_sizes)?;
                    check_moments("second", v, param_sizes)?;
                }
                self.step = *step;
                self.m = m.clone();
                self.v = v.clone();
                Ok(())
            }
            other => Err(ModelError::Optimizer(format!("expected Adam state, found {other:?}"))),
        }
    }
}

fn check_moments(which: &str, moments: &[Vec<f64>], param_sizes: &[usize]) -> Result<(), ModelError> {
    if moments.len() != param_sizes.len() {
        return Err(ModelError::Optimizer(format!(
            "{which} moments cover {} tensors, model has {}",
            moments.len(),
            param_sizes.len()
        )));
    }
    for (i, (buf, &size)) in moments.iter().zip(param_sizes).enumerate() {
        if buf.len() != size {
            return Err(ModelError::Optimizer(format!(
                "{which} moment {i} has {} values, parameter has {size}",
                buf.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_learning_rate() {
        let mut p = Param::new(vec![1.0, -1.0]);
        p.grad = vec![0.5, -2.0];
        let mut adam = Adam::new(0.1);
        adam.step(vec![&mut p]);
        // With bias correction the first update is lr * sign(g).
        assert!((p.value[0] - 0.9).abs() < 1e-6);
        assert!((p.value[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn state_restores_moments() {
        let mut p = Param::new(vec![0.0]);
        p.grad = vec![1.0];
        let mut a = Adam::new(0.01);
        a.step(vec![&mut p]);

        let mut b = Adam::new(0.01);
        b.load_state(&a.state(), &[1]).unwrap();
        assert_eq!(b.steps_taken(), 1);
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn moments_must_match_parameter_lengths() {
        let mut p = Param::new(vec![0.0, 0.0]);
        p.grad = vec![1.0, 1.0];
        let mut a = Adam::new(0.01);
        a.step(vec![&mut p]);
        let state = a.state();

        let mut b = Adam::new(0.01);
        assert!(matches!(b.load_state(&state, &[3]), Err(ModelError::Optimizer(_))));
        assert!(matches!(b.load_state(&state, &[2, 2]), Err(ModelError::Optimizer(_))));
        assert_eq!(b.steps_taken(), 0);

        let OptimizerState::Adam { learning_rate, step, m, mut v } = state else { unreachable!() };
        v[0].pop();
        let truncated = OptimizerState::Adam { learning_rate, step, m, v };
        assert!(b.load_state(&truncated, &[2]).is_err());

        b.load_state(&Adam::new(0.01).state(), &[2]).unwrap();
    }
}
