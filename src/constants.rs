/*!
Compile-time caps and tunables for the likelihood/gradient kernel.

All constants *must* match the layout baked into [`crate::gaussian::ImageGaussian`]
and the derivative chain-rule table in [`crate::pixel`]; changing `NPARAMS`
demands synchronized edits to both.
*/

/// Number of sky parameters the gradient is taken with respect to, per
/// source: `(flux, ra, dec, q, pa, sersic_n, rh)`. Hard-wired to the
/// structure of [`crate::gaussian::ImageGaussian`]'s Jacobian.
pub const NPARAMS: usize = 7;

/// Compile-time cap on the number of photometric bands in a patch.
pub const MAXBANDS: usize = 30;

/// Compile-time cap on the number of active sources in a proposal.
pub const MAXSOURCES: usize = 30;

/// Compile-time cap on the number of Sersic radial mixture bins.
pub const MAXRADII: usize = 10;

/// Number of per-block accumulators. Raising this reduces reduction
/// contention at the cost of more scratch memory; the CPU mapping (one
/// rayon task per band, no shared atomics) makes `1` the natural default,
/// so nothing in this crate currently parameterizes over it.
#[allow(dead_code)]
pub const NUMACCUMS: usize = 1;

/// Width of the warp-shuffle reduction tree that
/// [`crate::kernel::warp_reduce_sum`] generalizes. The original kernel is
/// only correct for a warp of exactly 32 lanes; the CPU rewrite keeps the
/// same chunk size so the reduction tree shape, and hence bit pattern, is
/// reproducible across runs of identical inputs.
pub const WARP_SIZE: usize = 32;

/// Upper bound on the Gaussian exponent argument `arg = dx.vx + dy.vy`. A
/// component with a larger argument contributes a negligible
/// `exp(-arg/2) <= exp(-18) ~= 1.5e-8` and is skipped outright, both as an
/// infinity guard and a speed optimization.
pub const MAX_EXP_ARG: f32 = 36.0;
