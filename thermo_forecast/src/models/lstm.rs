//! Single-layer LSTM regressor with a dense output head
//!
//! Each training sample is a window of `seq_len` consecutive rows (target
//! first, then any exogenous columns) and the label is the target on the
//! row that follows. Inputs and labels are standardized with training
//! statistics; predictions are mapped back to the original units.
//!
//! Training uses full backpropagation through time, mean squared error and
//! Adam over shuffled mini-batches. All randomness comes from one seeded
//! generator, so a given seed always yields the same model.

use crate::data::Dataset;
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thermo_math::stats::Standardizer;
use tracing::debug;

/// Sequence lengths tried by the search, outermost axis
pub const SEQ_LEN_GRID: [usize; 3] = [6, 8, 12];
/// Hidden-unit counts tried by the search
pub const HIDDEN_GRID: [usize; 3] = [2, 10, 25];
/// Default number of training epochs
pub const DEFAULT_EPOCHS: usize = 1000;

const LEARNING_RATE: f64 = 0.001;
const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// Epoch counts at which the search scores a model: 1, 10, 20, 30, 40 and
/// then every tenth of `total`
pub fn epoch_checkpoints(total: usize) -> Vec<usize> {
    let mut checkpoints: Vec<usize> = [1, 10, 20, 30, 40]
        .into_iter()
        .filter(|&e| e <= total)
        .collect();
    let step = (total / 10).max(1);
    checkpoints.extend((step..=total).step_by(step));
    checkpoints.sort_unstable();
    checkpoints.dedup();
    checkpoints
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Weights laid out as `[W (4H x I) | U (4H x H) | b (4H) | v (H) | c]`,
/// gates ordered input, forget, cell, output.
#[derive(Debug, Clone)]
struct Network {
    input: usize,
    hidden: usize,
    params: Vec<f64>,
}

/// Activations of one time step kept for the backward pass
struct StepCache {
    x: Vec<f64>,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    gates: Vec<f64>,
    tanh_c: Vec<f64>,
}

impl Network {
    fn new(input: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let len = 4 * hidden * input + 4 * hidden * hidden + 4 * hidden + hidden + 1;
        let bound = 1.0 / (hidden as f64).sqrt();
        let params = (0..len).map(|_| rng.gen_range(-bound..bound)).collect();
        Self {
            input,
            hidden,
            params,
        }
    }

    fn u_offset(&self) -> usize {
        4 * self.hidden * self.input
    }

    fn b_offset(&self) -> usize {
        self.u_offset() + 4 * self.hidden * self.hidden
    }

    fn v_offset(&self) -> usize {
        self.b_offset() + 4 * self.hidden
    }

    fn c_offset(&self) -> usize {
        self.v_offset() + self.hidden
    }

    fn forward(&self, window: &[Vec<f64>]) -> (f64, Vec<StepCache>) {
        let (h_dim, i_dim) = (self.hidden, self.input);
        let (uo, bo) = (self.u_offset(), self.b_offset());
        let p = &self.params;

        let mut h = vec![0.0; h_dim];
        let mut c = vec![0.0; h_dim];
        let mut caches = Vec::with_capacity(window.len());

        for x in window {
            let mut gates = vec![0.0; 4 * h_dim];
            for (r, gate) in gates.iter_mut().enumerate() {
                let mut z = p[bo + r];
                for (k, xk) in x.iter().enumerate() {
                    z += p[r * i_dim + k] * xk;
                }
                for (k, hk) in h.iter().enumerate() {
                    z += p[uo + r * h_dim + k] * hk;
                }
                *gate = if (2 * h_dim..3 * h_dim).contains(&r) {
                    z.tanh()
                } else {
                    sigmoid(z)
                };
            }

            let mut c_next = vec![0.0; h_dim];
            let mut h_next = vec![0.0; h_dim];
            let mut tanh_c = vec![0.0; h_dim];
            for j in 0..h_dim {
                let (ig, fg, gg, og) = (
                    gates[j],
                    gates[h_dim + j],
                    gates[2 * h_dim + j],
                    gates[3 * h_dim + j],
                );
                c_next[j] = fg * c[j] + ig * gg;
                tanh_c[j] = c_next[j].tanh();
                h_next[j] = og * tanh_c[j];
            }

            caches.push(StepCache {
                x: x.clone(),
                h_prev: std::mem::replace(&mut h, h_next),
                c_prev: std::mem::replace(&mut c, c_next),
                gates,
                tanh_c,
            });
        }

        let vo = self.v_offset();
        let y = p[self.c_offset()] + (0..h_dim).map(|j| p[vo + j] * h[j]).sum::<f64>();
        (y, caches)
    }

    fn predict(&self, window: &[Vec<f64>]) -> f64 {
        self.forward(window).0
    }

    /// Accumulate `dy * dY/dparams` into `grad`
    fn backward(&self, caches: &[StepCache], dy: f64, grad: &mut [f64]) {
        let (h_dim, i_dim) = (self.hidden, self.input);
        let (uo, bo, vo, co) = (
            self.u_offset(),
            self.b_offset(),
            self.v_offset(),
            self.c_offset(),
        );
        let p = &self.params;

        let Some(last) = caches.last() else {
            return;
        };
        let mut dh = vec![0.0; h_dim];
        for j in 0..h_dim {
            let h_last = last.gates[3 * h_dim + j] * last.tanh_c[j];
            grad[vo + j] += dy * h_last;
            dh[j] = dy * p[vo + j];
        }
        grad[co] += dy;

        let mut dcell = vec![0.0; h_dim];
        let mut dz = vec![0.0; 4 * h_dim];
        for step in caches.iter().rev() {
            for j in 0..h_dim {
                let (ig, fg, gg, og) = (
                    step.gates[j],
                    step.gates[h_dim + j],
                    step.gates[2 * h_dim + j],
                    step.gates[3 * h_dim + j],
                );
                let tc = step.tanh_c[j];
                let d_o = dh[j] * tc;
                let dct = dh[j] * og * (1.0 - tc * tc) + dcell[j];
                let d_i = dct * gg;
                let d_g = dct * ig;
                let d_f = dct * step.c_prev[j];
                dcell[j] = dct * fg;

                dz[j] = d_i * ig * (1.0 - ig);
                dz[h_dim + j] = d_f * fg * (1.0 - fg);
                dz[2 * h_dim + j] = d_g * (1.0 - gg * gg);
                dz[3 * h_dim + j] = d_o * og * (1.0 - og);
            }

            let mut dh_prev = vec![0.0; h_dim];
            for (r, &dzr) in dz.iter().enumerate() {
                if dzr == 0.0 {
                    continue;
                }
                grad[bo + r] += dzr;
                for (k, xk) in step.x.iter().enumerate() {
                    grad[r * i_dim + k] += dzr * xk;
                }
                for k in 0..h_dim {
                    grad[uo + r * h_dim + k] += dzr * step.h_prev[k];
                    dh_prev[k] += p[uo + r * h_dim + k] * dzr;
                }
            }
            dh = dh_prev;
        }
    }
}

/// Adam optimizer state
#[derive(Debug, Clone)]
struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grad: &[f64]) {
        self.t += 1;
        let bias1 = 1.0 - BETA1.powi(self.t);
        let bias2 = 1.0 - BETA2.powi(self.t);
        for (k, g) in grad.iter().enumerate() {
            self.m[k] = BETA1 * self.m[k] + (1.0 - BETA1) * g;
            self.v[k] = BETA2 * self.v[k] + (1.0 - BETA2) * g * g;
            let m_hat = self.m[k] / bias1;
            let v_hat = self.v[k] / bias2;
            params[k] -= LEARNING_RATE * m_hat / (v_hat.sqrt() + ADAM_EPS);
        }
    }
}

/// Per-column standardizers for the input rows, target first
#[derive(Debug, Clone)]
struct RowScaler {
    columns: Vec<Standardizer>,
}

impl RowScaler {
    fn fit(rows: &[Vec<f64>], width: usize) -> Result<Self> {
        let columns = (0..width)
            .map(|j| {
                let col: Vec<f64> = rows.iter().map(|r| r[j]).collect();
                Ok(Standardizer::fit(&col)?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    fn scale_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.columns)
            .map(|(v, s)| (v - s.mean) / s.scale)
            .collect()
    }

    fn target(&self) -> Standardizer {
        self.columns[0]
    }
}

fn check_rows(rows: &[Vec<f64>]) -> Result<()> {
    if rows.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ForecastError::DataError(
            "LSTM inputs contain missing values".to_string(),
        ));
    }
    Ok(())
}

/// LSTM model trained for a fixed number of epochs
#[derive(Debug, Clone)]
pub struct Lstm {
    name: String,
    seq_len: usize,
    hidden: usize,
    epochs: usize,
    seed: u64,
}

impl Lstm {
    pub fn new(seq_len: usize, hidden: usize, epochs: usize, seed: u64) -> Result<Self> {
        if seq_len == 0 || hidden == 0 || epochs == 0 {
            return Err(ForecastError::ConfigError(
                "Sequence length, hidden units and epochs must be positive".to_string(),
            ));
        }
        Ok(Self {
            name: format!("lstm(seq_len={}, hidden={}, epochs={})", seq_len, hidden, epochs),
            seq_len,
            hidden,
            epochs,
            seed,
        })
    }
}

impl ForecastModel for Lstm {
    type Trained = TrainedLstm;

    fn train(&self, data: &Dataset) -> Result<Self::Trained> {
        let mut trainer = LstmTrainer::new(data, self.seq_len, self.hidden, self.seed)?;
        for _ in 0..self.epochs {
            trainer.train_epoch()?;
        }
        Ok(trainer.snapshot())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Incremental trainer, so a search can score the same network after
/// several epoch counts without retraining from scratch
#[derive(Debug, Clone)]
pub struct LstmTrainer {
    network: Network,
    adam: Adam,
    scaler: RowScaler,
    windows: Vec<(Vec<Vec<f64>>, f64)>,
    context: Vec<Vec<f64>>,
    seq_len: usize,
    batch_size: usize,
    epochs: usize,
    rng: StdRng,
}

impl LstmTrainer {
    pub fn new(data: &Dataset, seq_len: usize, hidden: usize, seed: u64) -> Result<Self> {
        let rows = data.rows();
        check_rows(&rows)?;
        if rows.len() <= seq_len {
            return Err(ForecastError::FitError(format!(
                "Sequence length {} needs more than {} training rows",
                seq_len,
                rows.len()
            )));
        }

        let width = data.width();
        let scaler = RowScaler::fit(&rows, width)?;
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.scale_row(r)).collect();
        let windows: Vec<(Vec<Vec<f64>>, f64)> = (0..scaled.len() - seq_len)
            .map(|i| (scaled[i..i + seq_len].to_vec(), scaled[i + seq_len][0]))
            .collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let network = Network::new(width, hidden, &mut rng);
        let adam = Adam::new(network.params.len());
        let batch_size = (windows.len() / 10).max(1);

        Ok(Self {
            network,
            adam,
            scaler,
            context: rows[rows.len() - seq_len..].to_vec(),
            windows,
            seq_len,
            batch_size,
            epochs: 0,
            rng,
        })
    }

    /// Run one pass over the shuffled windows, returning the mean batch loss
    pub fn train_epoch(&mut self) -> Result<f64> {
        let mut order: Vec<usize> = (0..self.windows.len()).collect();
        order.shuffle(&mut self.rng);

        let mut total = 0.0;
        let mut batches = 0usize;
        let mut grad = vec![0.0; self.network.params.len()];
        for batch in order.chunks(self.batch_size) {
            grad.iter_mut().for_each(|g| *g = 0.0);
            let scale = 1.0 / batch.len() as f64;
            let mut loss = 0.0;
            for &idx in batch {
                let (window, label) = &self.windows[idx];
                let (y, caches) = self.network.forward(window);
                let err = y - label;
                loss += err * err * scale;
                self.network.backward(&caches, 2.0 * err * scale, &mut grad);
            }
            if !loss.is_finite() {
                return Err(ForecastError::FitError(format!(
                    "Training loss diverged after {} epochs",
                    self.epochs
                )));
            }
            self.adam.step(&mut self.network.params, &grad);
            total += loss;
            batches += 1;
        }

        self.epochs += 1;
        let mean = total / batches as f64;
        debug!(epoch = self.epochs, loss = mean, "lstm epoch");
        Ok(mean)
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Freeze the current weights into a trained model
    pub fn snapshot(&self) -> TrainedLstm {
        TrainedLstm {
            name: format!(
                "lstm(seq_len={}, hidden={}, epochs={})",
                self.seq_len, self.network.hidden, self.epochs
            ),
            network: self.network.clone(),
            scaler: self.scaler.clone(),
            context: self.context.clone(),
            seq_len: self.seq_len,
            epochs: self.epochs,
        }
    }
}

/// Trained LSTM
#[derive(Debug, Clone)]
pub struct TrainedLstm {
    name: String,
    network: Network,
    scaler: RowScaler,
    /// Last `seq_len` training rows, the context for the first test row
    context: Vec<Vec<f64>>,
    seq_len: usize,
    epochs: usize,
}

impl TrainedLstm {
    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn hidden(&self) -> usize {
        self.network.hidden
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Predict the row after each full window of `rows`
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let target = self.scaler.target();
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| self.scaler.scale_row(r)).collect();
        (0..scaled.len().saturating_sub(self.seq_len))
            .map(|i| {
                let y = self.network.predict(&scaled[i..i + self.seq_len]);
                y * target.scale + target.mean
            })
            .collect()
    }

    fn check_width(&self, data: &Dataset) -> Result<()> {
        if data.width() != self.network.input {
            return Err(ForecastError::DataError(format!(
                "Model was trained on {} columns but got {}",
                self.network.input,
                data.width()
            )));
        }
        Ok(())
    }
}

impl TrainedForecastModel for TrainedLstm {
    /// Recursive multi-step forecast, only defined without exogenous inputs
    fn forecast(&self, horizons: usize) -> Result<ForecastResult> {
        if self.network.input != 1 {
            return Err(ForecastError::ConfigError(
                "Multi-step forecasts need future exogenous values; use predict_holdout"
                    .to_string(),
            ));
        }
        let target = self.scaler.target();
        let mut history = self.context.clone();
        let mut values = Vec::with_capacity(horizons);
        for _ in 0..horizons {
            let window: Vec<Vec<f64>> = history[history.len() - self.seq_len..]
                .iter()
                .map(|r| self.scaler.scale_row(r))
                .collect();
            let y = self.network.predict(&window) * target.scale + target.mean;
            values.push(y);
            history.push(vec![y]);
        }
        ForecastResult::new(values, horizons)
    }

    /// Predictions for every training row after the first `seq_len`
    fn predict(&self, data: &Dataset) -> Result<ForecastResult> {
        self.check_width(data)?;
        let rows = data.rows();
        check_rows(&rows)?;
        let values = self.predict_rows(&rows);
        Ok(ForecastResult::with_offset(values, self.seq_len))
    }

    /// Predictions for every test row, using the end of training as context
    fn predict_holdout(&self, test: &Dataset) -> Result<ForecastResult> {
        self.check_width(test)?;
        let rows = test.rows();
        check_rows(&rows)?;
        let combined = [self.context.clone(), rows].concat();
        let values = self.predict_rows(&combined);
        let len = values.len();
        ForecastResult::new(values, len)
    }

    fn observations(&self) -> Vec<String> {
        vec![format!(
            "seq_len: {}, hidden: {}, epochs: {}",
            self.seq_len, self.network.hidden, self.epochs
        )]
    }

    fn name(&self) -> &str {
        &self.name
    }
}
