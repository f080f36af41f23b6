//! Physical properties at cell centres.

use crate::solver::operators::avg_1d;
use ndarray::Array3;

/// Density, viscosity, heat capacity and conductivity of the fluid.
#[derive(Debug, Clone)]
pub struct Properties {
    pub rho: Array3<f64>,
    pub mu: Array3<f64>,
    pub cap: Array3<f64>,
    pub kappa: Array3<f64>,
}

impl Properties {
    pub fn uniform(res: [usize; 3], rho: f64, mu: f64, cap: f64, kappa: f64) -> Self {
        Self {
            rho: Array3::from_elem(res, rho),
            mu: Array3::from_elem(res, mu),
            cap: Array3::from_elem(res, cap),
            kappa: Array3::from_elem(res, kappa),
        }
    }

    /// Air at 20 °C.
    pub fn air(res: [usize; 3]) -> Self {
        Self::uniform(res, 1.1763, 1.8619e-5, 1007.0, 0.0262)
    }

    /// Water at 20 °C.
    pub fn water(res: [usize; 3]) -> Self {
        Self::uniform(res, 998.9, 0.001, 4183.0, 0.599)
    }

    /// Volumetric heat capacity `rho * cap`.
    pub fn rho_cap(&self) -> Array3<f64> {
        &self.rho * &self.cap
    }
}

/// Parabolic profile with the given mean over the cells between `nodes`,
/// zero at both ends.
pub fn par(mean: f64, nodes: &[f64]) -> Vec<f64> {
    let (Some(&first), Some(&last)) = (nodes.first(), nodes.last()) else {
        return Vec::new();
    };
    let span = last - first;
    avg_1d(nodes)
        .into_iter()
        .map(|x| {
            let xi = (x - first) / span;
            6.0 * mean * xi * (1.0 - xi)
        })
        .collect()
}
