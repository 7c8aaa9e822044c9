//! Geometry layer: project market states into a low-dimensional field.
//!
//! A projector fits a linear basis (the top principal directions of a
//! mean-centred history), projects new state vectors into coordinates,
//! classifies a coarse motif from where the point lands, and estimates local
//! drift from the trailing coordinates. The basis comes from a symmetric
//! Jacobi eigendecomposition of the history's scatter matrix, whose
//! eigenvectors are the right singular vectors of the centred history.
//!
//! `fit` is the only mutating operation. Between fits the projector can be
//! shared read-only.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    CALM_RADIUS, DRIFT_WINDOW, HORIZONS, JACOBI_MAX_SWEEPS, JACOBI_TOLERANCE, MIN_HISTORY,
    N_COMPONENTS, N_FEATURES,
};
use crate::error::Result;
use crate::state::{StateVector, validate_vector};

/// Discrete regime label assigned from projected coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Motif {
    CalmLeverageBuild,
    GrindingSqueeze,
    PanicUnwind,
    NeutralBalance,
}

impl Motif {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CalmLeverageBuild => "calm_leverage_build",
            Self::GrindingSqueeze => "grinding_squeeze",
            Self::PanicUnwind => "panic_unwind",
            Self::NeutralBalance => "neutral_balance",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "calm_leverage_build" => Some(Self::CalmLeverageBuild),
            "grinding_squeeze" => Some(Self::GrindingSqueeze),
            "panic_unwind" => Some(Self::PanicUnwind),
            "neutral_balance" => Some(Self::NeutralBalance),
            _ => None,
        }
    }

    /// Up-move probability per horizon, in `HORIZONS` order.
    fn horizon_probabilities(&self) -> [f64; 3] {
        match self {
            Self::GrindingSqueeze => [0.6, 0.65, 0.5],
            Self::PanicUnwind => [0.4, 0.35, 0.3],
            Self::CalmLeverageBuild => [0.55, 0.6, 0.55],
            Self::NeutralBalance => [0.5, 0.5, 0.5],
        }
    }
}

impl std::fmt::Display for Motif {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry of a single state, ready for publishing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometrySnapshot {
    pub coords: Vec<f64>,
    pub motif_id: Option<Motif>,
    pub motif_transition_probs: BTreeMap<String, f64>,
    pub local_drift: Vec<f64>,
}

impl GeometrySnapshot {
    /// The degraded snapshot: zero coordinates and drift, no motif.
    pub fn empty(n_components: usize) -> Self {
        Self {
            coords: vec![0.0; n_components],
            motif_id: None,
            motif_transition_probs: BTreeMap::new(),
            local_drift: vec![0.0; n_components],
        }
    }
}

/// A fitted projection basis.
#[derive(Clone, Debug)]
pub struct Basis {
    pub mean: StateVector,
    /// Unit-length principal directions, strongest first.
    pub components: Vec<StateVector>,
    /// Scatter-matrix eigenvalue for each component.
    pub variances: Vec<f64>,
    /// Coordinates of the fit history, oldest first.
    pub fit_coords: Vec<Vec<f64>>,
}

impl Basis {
    fn project(&self, vector: &StateVector) -> Vec<f64> {
        self.components
            .iter()
            .map(|component| {
                vector
                    .iter()
                    .zip(&self.mean)
                    .zip(component)
                    .map(|((v, m), c)| (v - m) * c)
                    .sum()
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub enum Projection {
    #[default]
    Unfitted,
    Fitted(Basis),
}

#[derive(Clone, Debug)]
pub struct GeometryProjector {
    n_components: usize,
    min_history: usize,
    drift_window: usize,
    projection: Projection,
}

impl Default for GeometryProjector {
    fn default() -> Self {
        Self::new(N_COMPONENTS)
    }
}

impl GeometryProjector {
    pub fn new(n_components: usize) -> Self {
        Self::with_params(n_components, MIN_HISTORY, DRIFT_WINDOW)
    }

    pub fn with_params(n_components: usize, min_history: usize, drift_window: usize) -> Self {
        let n_components = n_components.clamp(1, N_FEATURES);
        Self {
            n_components,
            min_history: min_history.max(n_components),
            drift_window: drift_window.max(2),
            projection: Projection::Unfitted,
        }
    }

    pub fn n_components(&self) -> usize {
        self.n_components
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.projection, Projection::Fitted(_))
    }

    /// Fit the basis from a history of state vectors, oldest first.
    ///
    /// Rows of the wrong length are skipped. With fewer than `min_history`
    /// usable rows the projector becomes unfitted.
    pub fn fit<V: AsRef<[f64]>>(&mut self, history: &[V]) {
        let mut rows: Vec<StateVector> = Vec::with_capacity(history.len());
        for (i, row) in history.iter().enumerate() {
            match validate_vector(row.as_ref()) {
                Ok(v) => rows.push(v),
                Err(e) => warn!("skipping history row {i}: {e}"),
            }
        }

        if rows.len() < self.min_history {
            debug!(
                usable = rows.len(),
                required = self.min_history,
                "insufficient history, projector unfitted"
            );
            self.projection = Projection::Unfitted;
            return;
        }

        let n = rows.len() as f64;
        let mut mean = [0.0; N_FEATURES];
        for row in &rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut scatter = vec![vec![0.0; N_FEATURES]; N_FEATURES];
        for row in &rows {
            let centered: Vec<f64> = row.iter().zip(&mean).map(|(v, m)| v - m).collect();
            for i in 0..N_FEATURES {
                for j in i..N_FEATURES {
                    scatter[i][j] += centered[i] * centered[j];
                }
            }
        }
        for i in 0..N_FEATURES {
            for j in 0..i {
                scatter[i][j] = scatter[j][i];
            }
        }

        let (eigenvalues, eigenvectors) = jacobi_eigen(scatter);
        let mut order: Vec<usize> = (0..N_FEATURES).collect();
        order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

        let mut components = Vec::with_capacity(self.n_components);
        let mut variances = Vec::with_capacity(self.n_components);
        for &col in order.iter().take(self.n_components) {
            let mut component = [0.0; N_FEATURES];
            for (row, slot) in component.iter_mut().enumerate() {
                *slot = eigenvectors[row][col];
            }
            orient(&mut component);
            components.push(component);
            variances.push(eigenvalues[col].max(0.0));
        }

        let mut basis = Basis {
            mean,
            components,
            variances,
            fit_coords: Vec::new(),
        };
        let fit_coords = rows.iter().map(|row| basis.project(row)).collect();
        basis.fit_coords = fit_coords;

        debug!(
            rows = rows.len(),
            variances = ?basis.variances,
            "fitted projection basis"
        );
        self.projection = Projection::Fitted(basis);
    }

    /// Project a vector into coordinates. Unfitted projectors return zeros.
    pub fn transform(&self, vector: &[f64]) -> Result<Vec<f64>> {
        let vector = validate_vector(vector)?;
        Ok(match &self.projection {
            Projection::Unfitted => vec![0.0; self.n_components],
            Projection::Fitted(basis) => basis.project(&vector),
        })
    }

    /// Classify projected coordinates.
    ///
    /// Inside radius 0.5 (strict) the regime is calm. Otherwise the first
    /// quadrant (both ≥ 0) is a squeeze, the third (both < 0) an unwind, and
    /// the mixed quadrants are neutral. A one-dimensional point lies on the
    /// first axis.
    pub fn infer_motif(coords: &[f64]) -> Option<Motif> {
        let x = *coords.first()?;
        let y = coords.get(1).copied().unwrap_or(0.0);
        let radius = coords.iter().map(|c| c * c).sum::<f64>().sqrt();
        if radius < CALM_RADIUS {
            return Some(Motif::CalmLeverageBuild);
        }
        if x >= 0.0 && y >= 0.0 {
            return Some(Motif::GrindingSqueeze);
        }
        if x < 0.0 && y < 0.0 {
            return Some(Motif::PanicUnwind);
        }
        Some(Motif::NeutralBalance)
    }

    /// Mean successive difference over the trailing window of fit-history
    /// coordinates followed by `coords`. Zero with fewer than two points.
    pub fn estimate_local_drift(&self, coords: &[f64]) -> Vec<f64> {
        let history: &[Vec<f64>] = match &self.projection {
            Projection::Fitted(basis) => &basis.fit_coords,
            Projection::Unfitted => &[],
        };
        let mut points: Vec<&[f64]> = history.iter().map(Vec::as_slice).collect();
        points.push(coords);

        if points.len() < 2 {
            return vec![0.0; self.n_components];
        }
        let recent = &points[points.len().saturating_sub(self.drift_window)..];
        let steps = (recent.len() - 1) as f64;

        let mut drift = vec![0.0; self.n_components];
        for pair in recent.windows(2) {
            for (d, (next, prev)) in drift.iter_mut().zip(pair[1].iter().zip(pair[0])) {
                *d += next - prev;
            }
        }
        drift.iter_mut().for_each(|d| *d /= steps);
        drift
    }

    pub fn transition_probabilities(motif: Option<Motif>) -> BTreeMap<String, f64> {
        let Some(motif) = motif else {
            return BTreeMap::new();
        };
        HORIZONS
            .iter()
            .zip(motif.horizon_probabilities())
            .map(|(h, p)| (h.to_string(), p))
            .collect()
    }

    /// validate → transform → motif → drift → transitions. Never fails:
    /// a bad vector or an unfitted projector yields the empty snapshot.
    pub fn snapshot(&self, vector: &[f64]) -> GeometrySnapshot {
        if !self.is_fitted() {
            return GeometrySnapshot::empty(self.n_components);
        }
        let coords = match self.transform(vector) {
            Ok(coords) => coords,
            Err(e) => {
                warn!("geometry snapshot degraded: {e}");
                return GeometrySnapshot::empty(self.n_components);
            }
        };
        let motif_id = Self::infer_motif(&coords);
        let local_drift = self.estimate_local_drift(&coords);
        GeometrySnapshot {
            motif_transition_probs: Self::transition_probabilities(motif_id),
            coords,
            motif_id,
            local_drift,
        }
    }
}

/// Flip a direction so its largest-magnitude entry is positive.
fn orient(component: &mut StateVector) {
    let mut pivot = 0.0_f64;
    for v in component.iter() {
        if v.abs() > pivot.abs() {
            pivot = *v;
        }
    }
    if pivot < 0.0 {
        component.iter_mut().for_each(|v| *v = -*v);
    }
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix.
///
/// Returns eigenvalues and a matrix whose columns are the matching unit
/// eigenvectors, both in the matrix's original index order.
fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    let norm = a.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();
    if norm == 0.0 {
        return (vec![0.0; n], v);
    }

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum();
        if off.sqrt() <= JACOBI_TOLERANCE * norm {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[p][q];
                if apq == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
                let sign = if theta >= 0.0 { 1.0 } else { -1.0 };
                let t = sign / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let eigenvalues = (0..n).map(|i| a[i][i]).collect();
    (eigenvalues, v)
}
