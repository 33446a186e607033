//! Random-forest regression engine.
//!
//! An ensemble of variance-reduction CART trees: each tree is grown on a
//! bootstrap resample of the training rows, considering a random third of
//! the features at every split. Trees are stored as flat node arenas. The
//! model maps a covariate vector to a scalar, so prediction runs per pixel
//! at the covariate grid's native resolution; the coarse target only ever
//! enters through the training labels.
//!
//! A model is bound to one variable and one day. Nothing is persisted or
//! reused across calls, and all randomness flows from the configured seed,
//! so retraining reproduces the same forest.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DownscaleError, DownscaleResult};
use crate::raster::RasterField;
use crate::sampling::TrainingSet;

/// Band name of the fine-resolution prediction.
pub const PREDICTION_BAND: &str = "highres";

/// Tuning knobs of the ensemble. Defaults are the fixed design values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub seed: u64,
    /// Minimum rows per leaf; splits leaving fewer are not considered.
    pub min_leaf: usize,
    pub max_depth: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self { n_trees: 80, seed: 42, min_leaf: 3, max_depth: 14 }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { value: f32 },
    Split { feature: usize, threshold: f32, left: usize, right: usize },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    root: usize,
}

impl Tree {
    fn predict(&self, features: &[f32]) -> f32 {
        let mut at = self.root;
        loop {
            match self.nodes[at] {
                Node::Leaf { value } => return value,
                Node::Split { feature, threshold, left, right } => {
                    at = if features[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// A trained regression forest for one (variable, day) pair.
#[derive(Debug, Clone)]
pub struct RegressionForest {
    trees: Vec<Tree>,
    feature_bands: Vec<String>,
}

impl RegressionForest {
    /// Train a fresh forest mapping `feature_bands` to `target_band`.
    ///
    /// Rows where any value is non-finite are discarded (the sampler already
    /// drops them; this guards direct callers). An empty usable set is an
    /// `InsufficientTrainingData` error and no model is produced.
    pub fn train(
        samples: &TrainingSet,
        target_band: &str,
        feature_bands: &[String],
        config: &ForestConfig,
    ) -> DownscaleResult<Self> {
        let y_col = samples.column(target_band)?;
        let x_cols: Vec<Vec<f32>> = feature_bands
            .iter()
            .map(|b| samples.column(b))
            .collect::<DownscaleResult<_>>()?;
        let n_features = feature_bands.len();

        // Row-major usable matrix.
        let mut x = Vec::new();
        let mut y = Vec::new();
        'rows: for (i, &target) in y_col.iter().enumerate() {
            if !target.is_finite() {
                continue;
            }
            let row_start = x.len();
            for col in &x_cols {
                if !col[i].is_finite() {
                    x.truncate(row_start);
                    continue 'rows;
                }
                x.push(col[i]);
            }
            y.push(target);
        }

        if y.is_empty() {
            return Err(DownscaleError::InsufficientTrainingData { rows: 0 });
        }

        let n_rows = y.len();
        let trees = (0..config.n_trees)
            .map(|t| {
                let tree_seed =
                    config.seed ^ (t as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
                grow_tree(&x, &y, n_rows, n_features, config, tree_seed)
            })
            .collect();

        debug!(
            band = target_band,
            rows = n_rows,
            trees = config.n_trees,
            "trained regression forest"
        );
        Ok(Self { trees, feature_bands: feature_bands.to_vec() })
    }

    /// Ensemble prediction for one covariate vector, ordered as
    /// `feature_bands`. Any non-finite feature yields NaN.
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        if features.iter().any(|v| !v.is_finite()) {
            return f32::NAN;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(features) as f64).sum();
        (sum / self.trees.len() as f64) as f32
    }

    /// Predict over every pixel of `field`, producing the single-band
    /// fine-resolution output.
    pub fn predict(&self, field: &RasterField) -> DownscaleResult<RasterField> {
        let bands: Vec<&[f32]> = self
            .feature_bands
            .iter()
            .map(|b| field.band(b))
            .collect::<DownscaleResult<_>>()?;

        let n_cells = field.width * field.height;
        let mut features = vec![0.0f32; bands.len()];
        let mut out = Vec::with_capacity(n_cells);
        for i in 0..n_cells {
            for (f, band) in bands.iter().enumerate() {
                features[f] = band[i];
            }
            out.push(self.predict_row(&features));
        }
        RasterField::from_data(
            field.width,
            field.height,
            field.extent,
            field.scale_m,
            PREDICTION_BAND,
            out,
        )
    }
}

/// Grow one CART regression tree on a bootstrap resample.
fn grow_tree(
    x: &[f32],
    y: &[f32],
    n_rows: usize,
    n_features: usize,
    config: &ForestConfig,
    seed: u64,
) -> Tree {
    let mut rng = StdRng::seed_from_u64(seed);
    let bootstrap: Vec<usize> = (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect();

    let mut nodes = Vec::new();
    let root = grow_node(&mut nodes, x, y, n_features, bootstrap, 0, config, &mut rng);
    Tree { nodes, root }
}

#[allow(clippy::too_many_arguments)]
fn grow_node(
    nodes: &mut Vec<Node>,
    x: &[f32],
    y: &[f32],
    n_features: usize,
    idx: Vec<usize>,
    depth: usize,
    config: &ForestConfig,
    rng: &mut StdRng,
) -> usize {
    let n = idx.len();
    let mean = (idx.iter().map(|&i| y[i] as f64).sum::<f64>() / n as f64) as f32;

    let stop = depth >= config.max_depth
        || n < 2 * config.min_leaf
        || idx.iter().all(|&i| y[i] == y[idx[0]]);
    if !stop {
        if let Some((feature, threshold)) =
            best_split(x, y, n_features, &idx, config.min_leaf, rng)
        {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = idx
                .into_iter()
                .partition(|&i| x[i * n_features + feature] <= threshold);
            let left = grow_node(nodes, x, y, n_features, left_idx, depth + 1, config, rng);
            let right = grow_node(nodes, x, y, n_features, right_idx, depth + 1, config, rng);
            nodes.push(Node::Split { feature, threshold, left, right });
            return nodes.len() - 1;
        }
    }

    nodes.push(Node::Leaf { value: mean });
    nodes.len() - 1
}

/// Best variance-reduction split over a random subset of features.
///
/// Candidate features are the regression-standard third of the feature set;
/// they are scanned in ascending index order and only a strict improvement
/// replaces the incumbent, so ties break deterministically toward the first
/// candidate found.
fn best_split(
    x: &[f32],
    y: &[f32],
    n_features: usize,
    idx: &[usize],
    min_leaf: usize,
    rng: &mut StdRng,
) -> Option<(usize, f32)> {
    let n = idx.len();
    if n_features == 0 {
        return None;
    }
    let mtry = (n_features / 3).max(1);
    let mut candidates = rand::seq::index::sample(rng, n_features, mtry).into_vec();
    candidates.sort_unstable();

    let mut best: Option<(usize, f32)> = None;
    let mut best_sse = f64::INFINITY;

    let mut pairs: Vec<(f32, f32)> = Vec::with_capacity(n);
    for &feature in &candidates {
        pairs.clear();
        pairs.extend(idx.iter().map(|&i| (x[i * n_features + feature], y[i])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Prefix sums over the sorted order.
        let total_y: f64 = pairs.iter().map(|p| p.1 as f64).sum();
        let total_y2: f64 = pairs.iter().map(|p| (p.1 as f64) * (p.1 as f64)).sum();
        let mut left_y = 0.0f64;
        let mut left_y2 = 0.0f64;

        for k in 1..n {
            let (v_prev, y_prev) = pairs[k - 1];
            left_y += y_prev as f64;
            left_y2 += (y_prev as f64) * (y_prev as f64);

            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let v_next = pairs[k].0;
            if v_prev == v_next {
                continue;
            }

            let right_y = total_y - left_y;
            let right_y2 = total_y2 - left_y2;
            let sse = (left_y2 - left_y * left_y / k as f64)
                + (right_y2 - right_y * right_y / (n - k) as f64);
            if sse < best_sse {
                best_sse = sse;
                best = Some((feature, (v_prev + v_next) / 2.0));
            }
        }
    }
    best
}
