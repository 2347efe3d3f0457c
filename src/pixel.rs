//! Per-pixel evaluation: subtracting the model from the data
//! (`ComputeResidualImage`, spec.md §4.3) and accumulating one galaxy's
//! contribution to `dchi2/dp` for a single pixel (`ComputeGaussianDerivative`,
//! spec.md §4.4).

use crate::constants::{MAX_EXP_ARG, NPARAMS};
use crate::gaussian::ImageGaussian;

/// `data - sum_i C_i(xp, yp)` for the `ImageGaussian`s in `gaussians`.
///
/// Components whose Gaussian exponent argument exceeds [`MAX_EXP_ARG`] are
/// skipped outright (an infinity guard and a speed optimization; spec.md
/// §4.3/§7). `H`, the analytic second-order correction for integrating a
/// Gaussian across a unit pixel, is not clamped even though it can go
/// negative for broad or sharp Gaussians near pixel edges — accepted as
/// designed (spec.md §9).
pub fn compute_residual_image(xp: f32, yp: f32, data: f32, gaussians: &[ImageGaussian]) -> f32 {
    let mut model = 0.0_f32;
    for g in gaussians {
        if let Some(c) = gaussian_value(xp, yp, g) {
            model += c;
        }
    }
    data - model
}

/// Shared evaluation of one Gaussian component at one pixel: the early
/// `exp`-argument guard, `Gp`, and the pixel-integral correction `H`.
/// Returns `None` when the component is skipped.
fn gaussian_value(xp: f32, yp: f32, g: &ImageGaussian) -> Option<f32> {
    let (_, _, _, _, gp, h) = residual_terms(xp, yp, g)?;
    Some(g.amp * gp * h)
}

/// Computes `(dx, dy, vx, vy, Gp, H)` for one component at one pixel, or
/// `None` if `arg > MAX_EXP_ARG`.
#[allow(clippy::type_complexity)]
fn residual_terms(xp: f32, yp: f32, g: &ImageGaussian) -> Option<(f32, f32, f32, f32, f32, f32)> {
    let dx = xp - g.xcen;
    let dy = yp - g.ycen;
    let vx = g.fxx * dx + g.fxy * dy;
    let vy = g.fyy * dy + g.fxy * dx;
    let arg = dx * vx + dy * vy;
    if arg > MAX_EXP_ARG {
        return None;
    }
    let gp = (-0.5 * arg).exp();
    let h = 1.0 + (vx * vx + vy * vy - g.fxx - g.fyy) / 24.0;
    Some((dx, dy, vx, vy, gp, h))
}

/// Accumulates one galaxy's contribution to `dchi2_dp` (a 7-vector indexed
/// by `(flux, ra, dec, q, pa, sersic_n, rh)`) for a single pixel, given the
/// `ImageGaussian`s of that one galaxy across its PSF components.
///
/// `r` is `residual * ierr^2`, pre-scaled by the caller so that accumulating
/// `dC/dtheta * r` over pixels reproduces `-0.5 * dchi2/dtheta` up to sign
/// (spec.md §4.4).
pub fn compute_gaussian_derivative(xp: f32, yp: f32, r: f32, gaussians: &[ImageGaussian]) -> [f32; NPARAMS] {
    let mut dchi2_dp = [0.0_f32; NPARAMS];
    for g in gaussians {
        let Some((dx, dy, vx, vy, gp, h)) = residual_terms(xp, yp, g) else {
            continue;
        };
        let c = r * g.amp * gp * h;

        // Mathematically `C/amp`, but computed as `r.Gp.H` directly so a
        // zero-amplitude (zero-flux) source yields a finite zero instead of
        // a `0/0` (spec.md §8 Property 6).
        let dc_da = r * gp * h;
        let dc_dx = c * vx - (c / h) * (g.fxx * vx + g.fxy * vy) / 12.0;
        let dc_dy = c * vy - (c / h) * (g.fyy * vy + g.fxy * vx) / 12.0;
        let dc_dfxx = -0.5 * c * dx * dx - (c / h) * (1.0 - 2.0 * dx * vx) / 24.0;
        let dc_dfyy = -0.5 * c * dy * dy - (c / h) * (1.0 - 2.0 * dy * vy) / 24.0;
        let dc_dfxy = -c * dx * dy + (c / h) * (dy * vx + dx * vy) / 12.0;

        dchi2_dp[0] += g.da_dflux * dc_da;
        dchi2_dp[1] += g.dx_dalpha * dc_dx + g.dy_dalpha * dc_dy;
        dchi2_dp[2] += g.dx_ddelta * dc_dx + g.dy_ddelta * dc_dy;
        dchi2_dp[3] +=
            g.da_dq * dc_da + g.dfxx_dq * dc_dfxx + g.dfxy_dq * dc_dfxy + g.dfyy_dq * dc_dfyy;
        dchi2_dp[4] +=
            g.da_dpa * dc_da + g.dfxx_dpa * dc_dfxx + g.dfxy_dpa * dc_dfxy + g.dfyy_dpa * dc_dfyy;
        dchi2_dp[5] += g.da_dsersic * dc_da;
        dchi2_dp[6] += g.da_drh * dc_da;
    }
    dchi2_dp
}
