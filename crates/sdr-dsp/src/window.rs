//! Window functions.
//!
//! All windows are symmetric, generated with an `N - 1` denominator, and computed
//! in `f64` before being narrowed for application to `f32` samples.

use sdr_core::WindowKind;

const BH_A0: f64 = 0.35875;
const BH_A1: f64 = 0.48829;
const BH_A2: f64 = 0.14128;
const BH_A3: f64 = 0.01168;

/// Precomputed window coefficients and their coherent gain.
#[derive(Debug, Clone)]
pub struct Window {
    kind: WindowKind,
    coefficients: Vec<f32>,
    coherent_gain: f64,
}

impl Window {
    /// Generate `len` coefficients of `kind`.
    #[must_use]
    pub fn new(kind: WindowKind, len: usize) -> Self {
        let denom = len.saturating_sub(1).max(1) as f64;
        let phase = |i: usize| 2.0 * std::f64::consts::PI * i as f64 / denom;

        let exact: Vec<f64> = (0..len)
            .map(|i| match kind {
                WindowKind::Rectangular => 1.0,
                WindowKind::Hann => 0.5 * (1.0 - phase(i).cos()),
                WindowKind::BlackmanHarris => {
                    let x = phase(i);
                    BH_A0 - BH_A1 * x.cos() + BH_A2 * (2.0 * x).cos() - BH_A3 * (3.0 * x).cos()
                }
            })
            .collect();

        let coherent_gain = if len == 0 {
            1.0
        } else {
            exact.iter().sum::<f64>() / len as f64
        };

        Self {
            kind,
            coefficients: exact.iter().map(|&w| w as f32).collect(),
            coherent_gain,
        }
    }

    /// Window family.
    #[must_use]
    pub fn kind(&self) -> WindowKind {
        self.kind
    }

    /// Mean of the coefficients.
    #[must_use]
    pub fn coherent_gain(&self) -> f64 {
        self.coherent_gain
    }

    /// Coefficient slice.
    #[must_use]
    pub fn coefficients(&self) -> &[f32] {
        &self.coefficients
    }

    /// Number of coefficients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    /// True for a zero-length window.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular_gain_is_exactly_one() {
        for n in [16, 1024, 4096] {
            assert_eq!(Window::new(WindowKind::Rectangular, n).coherent_gain(), 1.0);
        }
    }

    #[test]
    fn test_hann_gain_matches_closed_form() {
        for n in [64usize, 1024, 2048] {
            let w = Window::new(WindowKind::Hann, n);
            let expected = 0.5 * (n as f64 - 1.0) / n as f64;
            assert!(w.coherent_gain() < 1.0);
            assert!((w.coherent_gain() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_blackman_harris_gain_matches_closed_form() {
        for n in [64usize, 1024, 2048] {
            let w = Window::new(WindowKind::BlackmanHarris, n);
            let nf = n as f64;
            let expected = (BH_A0 * nf - BH_A1 + BH_A2 - BH_A3) / nf;
            assert!(w.coherent_gain() < 1.0);
            assert!((w.coherent_gain() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_windows_are_symmetric() {
        for kind in [WindowKind::Hann, WindowKind::BlackmanHarris] {
            let w = Window::new(kind, 257);
            let c = w.coefficients();
            for i in 0..c.len() / 2 {
                assert!((c[i] - c[c.len() - 1 - i]).abs() < 1e-6);
            }
            assert!(c[0].abs() < 1e-4);
        }
    }
}
