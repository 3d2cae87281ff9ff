use emu_core::{EmuError, ErrorInfo, ParameterSpace, RngHandle};
use rand::seq::{index, SliceRandom};
use serde::{Deserialize, Serialize};

/// Where a point is placed inside its Latin-hypercube cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LhdMethod {
    /// Cell centre.
    #[default]
    Center,
    /// Uniformly inside the cell.
    Random,
}

/// Latin-hypercube design settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Placement of points inside their cells.
    #[serde(default)]
    pub method: LhdMethod,
    /// Designs drawn per training set; the one with the largest minimum
    /// pairwise distance wins. One disables the maximin search.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

fn default_iterations() -> usize {
    100
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            method: LhdMethod::default(),
            iterations: default_iterations(),
        }
    }
}

impl SamplingConfig {
    /// Rejects a zero iteration count.
    pub fn validate(&self) -> Result<(), EmuError> {
        if self.iterations == 0 {
            return Err(EmuError::Config(
                ErrorInfo::new("config_invalid", "at least one design iteration is required")
                    .with_context("field", "sampling.iterations"),
            ));
        }
        Ok(())
    }
}

fn unit_design(n: usize, dim: usize, method: LhdMethod, rng: &mut RngHandle) -> Vec<Vec<f64>> {
    let mut design = vec![vec![0.0; dim]; n];
    let mut cells: Vec<usize> = (0..n).collect();
    for axis in 0..dim {
        cells.shuffle(rng.inner_mut());
        for (point, &cell) in design.iter_mut().zip(&cells) {
            let offset = match method {
                LhdMethod::Center => 0.5,
                LhdMethod::Random => rng.unit(),
            };
            point[axis] = (cell as f64 + offset) / n as f64;
        }
    }
    design
}

/// Smallest squared distance between two points of a unit design.
pub fn min_pairwise_distance(design: &[Vec<f64>]) -> f64 {
    let mut best = f64::INFINITY;
    for (i, a) in design.iter().enumerate() {
        for b in &design[i + 1..] {
            let dist: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
            best = best.min(dist);
        }
    }
    best
}

/// Latin-hypercube design of `n` points over `space`, in model units.
pub fn latin_hypercube(
    n: usize,
    space: &ParameterSpace,
    method: LhdMethod,
    iterations: usize,
    rng: &mut RngHandle,
) -> Vec<Vec<f64>> {
    if n == 0 {
        return Vec::new();
    }
    let mut best = unit_design(n, space.dim(), method, rng);
    if iterations > 1 && n > 1 {
        let mut best_score = min_pairwise_distance(&best);
        for _ in 1..iterations {
            let design = unit_design(n, space.dim(), method, rng);
            let score = min_pairwise_distance(&design);
            if score > best_score {
                best = design;
                best_score = score;
            }
        }
    }
    best.into_iter()
        .map(|unit| {
            space
                .ranges
                .iter()
                .zip(unit)
                .map(|(range, u)| range.from_unit(u))
                .collect()
        })
        .collect()
}

/// Picks `n` distinct pool indices, returned in ascending order.
pub fn choose_indices(pool: &[usize], n: usize, rng: &mut RngHandle) -> Vec<usize> {
    if n >= pool.len() {
        return pool.to_vec();
    }
    let mut chosen: Vec<usize> = index::sample(rng.inner_mut(), pool.len(), n)
        .into_iter()
        .map(|pos| pool[pos])
        .collect();
    chosen.sort_unstable();
    chosen
}
