use rand_distr::{Distribution, StandardNormal};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::market::MarketEnvironment;
use crate::math::stream_rng;
use crate::models::Model;

/// Simulated price paths stored row-major in one contiguous buffer.
///
/// Row `i` holds `S(t_0), ..., S(t_n)` with `t_k = k T / n`. With antithetic
/// sampling rows `2k` and `2k + 1` are driven by the same normals with
/// opposite signs.
#[derive(Debug, Clone)]
pub struct PathSet {
    num_paths: usize,
    num_steps: usize,
    antithetic: bool,
    times: Vec<f64>,
    values: Vec<f64>,
}

/// Per-step exact transition: `s -> s * growth * exp(-var/2 + sd z)` for
/// Black-Scholes, `s -> s * growth + sd z` for Bachelier.
#[derive(Debug, Clone, Copy)]
struct StepKernel {
    growth: f64,
    log_convexity: f64,
    sd: f64,
}

impl PathSet {
    /// Simulates `num_paths` paths of `num_steps` exact transitions each.
    ///
    /// Path `i` draws from sub-stream `i` (or `i / 2` for antithetic pairs)
    /// of `seed`, so the result is independent of generation order.
    pub fn generate(
        model: Model,
        market: &MarketEnvironment,
        maturity: f64,
        num_paths: usize,
        num_steps: usize,
        antithetic: bool,
        seed: u64,
    ) -> Self {
        let dt = maturity / num_steps as f64;
        let times: Vec<f64> = (0..=num_steps).map(|k| k as f64 * dt).collect();
        let mu = market.carry();
        let kernels: Vec<StepKernel> = times
            .windows(2)
            .map(|w| {
                let var = model.transition_variance(market, w[0], w[1]).max(0.0);
                StepKernel {
                    growth: (mu * (w[1] - w[0])).exp(),
                    log_convexity: -0.5 * var,
                    sd: var.sqrt(),
                }
            })
            .collect();

        let stride = num_steps + 1;
        let mut values = vec![0.0; num_paths * stride];
        let spot = market.spot;

        let fill = |(i, row): (usize, &mut [f64])| {
            let (stream, sign) = if antithetic {
                (i / 2, if i % 2 == 0 { 1.0 } else { -1.0 })
            } else {
                (i, 1.0)
            };
            let mut rng = stream_rng(seed, stream);
            row[0] = spot;
            let mut s = spot;
            for (k, kernel) in kernels.iter().enumerate() {
                let z: f64 = StandardNormal.sample(&mut rng);
                let z = sign * z;
                s = match model {
                    Model::BlackScholes => {
                        s * kernel.growth * kernel.sd.mul_add(z, kernel.log_convexity).exp()
                    }
                    Model::Bachelier => kernel.sd.mul_add(z, s * kernel.growth),
                };
                row[k + 1] = s;
            }
        };

        #[cfg(feature = "parallel")]
        values.par_chunks_mut(stride).enumerate().for_each(fill);
        #[cfg(not(feature = "parallel"))]
        values.chunks_mut(stride).enumerate().for_each(fill);

        Self {
            num_paths,
            num_steps,
            antithetic,
            times,
            values,
        }
    }

    #[inline]
    pub fn num_paths(&self) -> usize {
        self.num_paths
    }

    #[inline]
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    #[inline]
    pub fn is_antithetic(&self) -> bool {
        self.antithetic
    }

    /// Monitoring times `t_0 = 0, ..., t_n = T`.
    #[inline]
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    #[inline]
    pub fn path(&self, i: usize) -> &[f64] {
        let stride = self.num_steps + 1;
        &self.values[i * stride..(i + 1) * stride]
    }

    /// `S(t_step)` on path `i`.
    #[inline]
    pub fn value(&self, i: usize, step: usize) -> f64 {
        self.values[i * (self.num_steps + 1) + step]
    }

    #[inline]
    pub fn terminal(&self, i: usize) -> f64 {
        self.value(i, self.num_steps)
    }

    pub fn paths(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.values.chunks(self.num_steps + 1)
    }
}
