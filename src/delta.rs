//! Discrete delta functions used for every Lagrangian/Eulerian transfer.
//!
//! Both kernels have support `|r| < 2` in grid units, so a point touches a
//! 4x4 block of grid nodes.

/// Half width of the kernel support, in grid spacings
pub const SUPPORT: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaKernel {
    /// Peskin's four-point function. Satisfies the zeroth and first moment
    /// conditions and the even/odd sum condition exactly.
    #[default]
    Peskin4,
    /// `(1 + cos(πr/2)) / 4`. Zeroth moment only.
    Cosine4,
}

impl DeltaKernel {
    /// Evaluates the 1-D kernel
    ///
    /// # Arguments
    /// * `r` - Offset from the grid node in units of grid spacing
    ///
    /// # Returns
    /// A non-negative weight, zero outside `|r| < 2`
    pub fn weight(&self, r: f64) -> f64 {
        let a = r.abs();
        if a >= SUPPORT as f64 {
            return 0.0;
        }

        match self {
            DeltaKernel::Peskin4 => {
                if a < 1.0 {
                    (3.0 - 2.0 * a + (1.0 + 4.0 * a - 4.0 * a * a).max(0.0).sqrt()) / 8.0
                } else {
                    (5.0 - 2.0 * a - (-7.0 + 12.0 * a - 4.0 * a * a).max(0.0).sqrt()) / 8.0
                }
            }
            DeltaKernel::Cosine4 => 0.25 * (1.0 + (std::f64::consts::FRAC_PI_2 * r).cos()),
        }
    }

    /// Weights for the four nodes `base-1 ..= base+2` around `s`, where `s` is
    /// a position in grid units and `base = floor(s)`
    pub fn stencil_weights(&self, s: f64) -> (i64, [f64; 4]) {
        let base = s.floor() as i64;
        let mut weights = [0.0; 4];
        for (k, w) in weights.iter_mut().enumerate() {
            let node = base - 1 + k as i64;
            *w = self.weight(s - node as f64);
        }
        (base - 1, weights)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeltaKernel::Peskin4 => "peskin4",
            DeltaKernel::Cosine4 => "cosine4",
        }
    }

    pub fn from_name(name: &str) -> Option<DeltaKernel> {
        match name.trim().to_ascii_lowercase().as_str() {
            "peskin4" | "peskin" => Some(DeltaKernel::Peskin4),
            "cosine4" | "cosine" => Some(DeltaKernel::Cosine4),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const KERNELS: [DeltaKernel; 2] = [DeltaKernel::Peskin4, DeltaKernel::Cosine4];

    fn offsets() -> impl Iterator<Item = f64> {
        (0..=400).map(|i| -3.7 + i as f64 * 0.01853)
    }

    #[test]
    fn weights_sum_to_one() {
        for kernel in KERNELS {
            for s in offsets() {
                let (_, w) = kernel.stencil_weights(s);
                assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn peskin_first_moment_vanishes() {
        let kernel = DeltaKernel::Peskin4;
        for s in offsets() {
            let (first, w) = kernel.stencil_weights(s);
            let moment: f64 = w
                .iter()
                .enumerate()
                .map(|(k, wk)| (s - (first + k as i64) as f64) * wk)
                .sum();
            assert_abs_diff_eq!(moment, 0.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn peskin_even_odd_condition() {
        let kernel = DeltaKernel::Peskin4;
        for s in offsets() {
            let (first, w) = kernel.stencil_weights(s);
            let even: f64 = w
                .iter()
                .enumerate()
                .filter(|(k, _)| (first + *k as i64).rem_euclid(2) == 0)
                .map(|(_, wk)| wk)
                .sum();
            assert_abs_diff_eq!(even, 0.5, epsilon = 1e-13);
        }
    }

    #[test]
    fn kernel_is_non_negative_with_compact_support() {
        for kernel in KERNELS {
            assert_eq!(kernel.weight(2.0), 0.0);
            assert_eq!(kernel.weight(-2.5), 0.0);
            for s in offsets() {
                assert!(kernel.weight(s) >= 0.0);
            }
        }
        assert_abs_diff_eq!(DeltaKernel::Peskin4.weight(0.0), 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(DeltaKernel::Cosine4.weight(0.0), 0.5, epsilon = 1e-15);
    }

    #[test]
    fn parses_kernel_names() {
        assert_eq!(DeltaKernel::from_name("Cosine"), Some(DeltaKernel::Cosine4));
        assert_eq!(DeltaKernel::from_name("peskin4"), Some(DeltaKernel::Peskin4));
        assert_eq!(DeltaKernel::from_name("gaussian"), None);
    }
}
