//! The accumulator and kernel driver: `EvaluateProposal` of spec.md §4.5,
//! dispatching one compute-block per band, looping over exposures, and
//! performing the warp-style reduction of spec.md §4.6.
//!
//! The SIMT grid-of-blocks-of-warps model is mapped onto the CPU per
//! spec.md §9: one `rayon` task per band (no cross-band communication, same
//! as blocks not communicating across the grid), and a fixed-width
//! stride-halving tree reduction within each [`WARP_SIZE`](crate::constants::WARP_SIZE)-sized
//! pixel chunk standing in for the warp shuffle, so the reduction tree shape
//! -- and hence its floating-point rounding -- is reproducible run to run
//! for identical `(Patch, Proposal)` (spec.md §5 "Ordering guarantees").

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{NPARAMS, WARP_SIZE};
use crate::gaussian::create_image_gaussians;
use crate::patch::Patch;
use crate::pixel::{compute_gaussian_derivative, compute_residual_image};
use crate::proposal::Proposal;

/// Per-band output: chi-square and its gradient with respect to every
/// active source's seven sky parameters, row order `[galaxy][param]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub chi2: f32,
    /// Flattened `[n_active][NPARAMS]`, param order `(flux, ra, dec, q, pa, sersic_n, rh)`.
    pub dchi2_dparam: Vec<f32>,
}

impl Response {
    fn zeroed(n_active: usize) -> Response {
        Response {
            chi2: 0.0,
            dchi2_dparam: vec![0.0; n_active * NPARAMS],
        }
    }
}

/// `warpReduceSum` of spec.md §4.6, generalized to an arbitrary reduction
/// width: reduces a lane-indexed slice to a single value via stride-halving
/// pairwise summation, the serial analog of the five shuffle-down steps in
/// the original kernel. Requires `values.len() <= WARP_SIZE`.
pub fn warp_reduce_sum(values: &[f32]) -> f32 {
    debug_assert!(values.len() <= WARP_SIZE);
    let mut buf = [0.0_f32; WARP_SIZE];
    buf[..values.len()].copy_from_slice(values);
    let mut width = WARP_SIZE;
    while width > 1 {
        let half = width / 2;
        for lane in 0..half {
            buf[lane] += buf[lane + half];
        }
        width = half;
    }
    buf[0]
}

/// Block-local mutable state for one `WARP_SIZE`-wide pixel chunk (spec.md
/// §3's `Accumulator`, §4.5 point 2c): one chi-square lane per pixel, and one
/// lane array per `[galaxy][param]` gradient slot. Every lane array is
/// warp-reduced the same way, so the gradient accumulation is reduced by the
/// same fixed-order stride-halving tree as chi-square rather than by a
/// sequential running sum.
pub struct Accumulator {
    chi2_lanes: [f32; WARP_SIZE],
    dchi2_lanes: Vec<[f32; WARP_SIZE]>,
}

impl Accumulator {
    fn new(n_active: usize) -> Accumulator {
        Accumulator {
            chi2_lanes: [0.0; WARP_SIZE],
            dchi2_lanes: vec![[0.0; WARP_SIZE]; n_active * NPARAMS],
        }
    }

    /// Records one pixel's contribution at `lane`: its chi-square term and
    /// its flattened `[galaxy][param]` gradient contribution.
    fn record(&mut self, lane: usize, chi2: f32, dchi2_dp: &[f32]) {
        self.chi2_lanes[lane] = chi2;
        for (slot, &g) in self.dchi2_lanes.iter_mut().zip(dchi2_dp) {
            slot[lane] = g;
        }
    }

    /// Warp-reduces chi-square and every gradient slot (spec.md §4.6),
    /// returning this chunk's total chi-square and flattened gradient.
    fn reduce(&self) -> (f32, Vec<f32>) {
        let chi2 = warp_reduce_sum(&self.chi2_lanes);
        let dchi2_dp = self.dchi2_lanes.iter().map(|lanes| warp_reduce_sum(lanes)).collect();
        (chi2, dchi2_dp)
    }
}

/// Evaluates chi-square and its gradient for one band's exposures, given
/// the already-built residual buffer isn't needed across bands (each band
/// owns a disjoint slice of `Patch.residual`).
fn evaluate_band(patch: &Patch, proposal: &Proposal, band: usize, residual: &mut [f32]) -> Response {
    let n_active = proposal.n_active();
    let mut response = Response::zeroed(n_active);
    let band_range = patch.bands[band];

    for exposure_index in band_range.start..band_range.start + band_range.n {
        let exposure = &patch.exposures[exposure_index];
        let gaussians = create_image_gaussians(patch, proposal, band, exposure_index);
        let n_psf = patch.n_psf_per_source[band];

        let pixel_range = exposure.pixel_start..exposure.pixel_start + exposure.pixel_n;

        // Chunk the exposure's pixels into WARP_SIZE-wide groups; a chunk is
        // reduced by a fixed stride-halving tree, and chunk totals are
        // folded together by rayon's deterministic split-based `reduce`.
        let (chi2, dchi2_dp, pixel_residuals): (f32, Vec<f32>, Vec<(usize, f32)>) = pixel_range
            .clone()
            .collect::<Vec<_>>()
            .par_chunks(WARP_SIZE)
            .map(|chunk| {
                let mut acc = Accumulator::new(n_active);
                let mut residuals = Vec::with_capacity(chunk.len());
                let mut pixel_dchi2_dp = vec![0.0_f32; n_active * NPARAMS];

                for (lane, &pix) in chunk.iter().enumerate() {
                    let xp = patch.xpix[pix];
                    let yp = patch.ypix[pix];
                    let data = patch.data[pix];
                    let ierr = patch.ierr[pix];

                    let residual = compute_residual_image(xp, yp, data, &gaussians);
                    residuals.push((pix, residual));

                    let chi = residual * ierr;
                    let r2 = residual * ierr * ierr;
                    for (gal, gal_gaussians) in gaussians.chunks(n_psf).enumerate() {
                        let grad = compute_gaussian_derivative(xp, yp, r2, gal_gaussians);
                        pixel_dchi2_dp[gal * NPARAMS..(gal + 1) * NPARAMS].copy_from_slice(&grad);
                    }
                    acc.record(lane, chi * chi, &pixel_dchi2_dp);
                }

                let (chunk_chi2, chunk_dchi2_dp) = acc.reduce();
                (chunk_chi2, chunk_dchi2_dp, residuals)
            })
            .reduce(
                || (0.0_f32, vec![0.0_f32; n_active * NPARAMS], Vec::new()),
                |mut a, b| {
                    a.0 += b.0;
                    for (acc, v) in a.1.iter_mut().zip(b.1.iter()) {
                        *acc += v;
                    }
                    a.2.extend(b.2);
                    a
                },
            );

        for (pix, r) in pixel_residuals {
            residual[pix] = r;
        }
        response.chi2 += chi2;
        for (acc, v) in response.dchi2_dparam.iter_mut().zip(dchi2_dp.iter()) {
            *acc += v;
        }
    }

    response
}

/// `EvaluateProposal` of spec.md §4.5/§6: one `Response` per band. Dispatches
/// one task per band (the CPU analog of one compute block per band), with
/// exposures processed sequentially within a band and pixels striped across
/// workers within an exposure.
///
/// `Patch.residual` is written as a side effect, matching spec.md §3's
/// "Lifecycles" note that the kernel treats `Patch` as read-only except for
/// that one scratch buffer.
pub fn evaluate_proposal(patch: &mut Patch, proposal: &Proposal) -> Vec<Response> {
    evaluate_proposal_with_progress(patch, proposal, |_band| {})
}

/// Like [`evaluate_proposal`], but invokes `on_band_done(band)` from whichever
/// `rayon` worker finishes that band's task, for progress reporting (e.g. the
/// `galphot bench` subcommand's `indicatif` bar). The callback is generic
/// rather than tied to any particular progress-bar type, so this module has
/// no UI-crate dependency of its own.
pub fn evaluate_proposal_with_progress<F: Fn(usize) + Sync>(
    patch: &mut Patch,
    proposal: &Proposal,
    on_band_done: F,
) -> Vec<Response> {
    let n_bands = patch.n_bands();
    let mut responses = vec![Response::zeroed(proposal.n_active()); n_bands];
    let mut residual = std::mem::take(&mut patch.residual);

    // Bands don't share pixels, but exposures of different bands aren't
    // guaranteed to tile `residual` as contiguous per-band slices, so each
    // band task writes through a full scratch copy rather than a sub-slice.
    let band_results: Vec<(Response, Vec<(usize, f32)>)> = (0..n_bands)
        .into_par_iter()
        .map(|band| {
            let mut scratch = residual.clone();
            let response = evaluate_band(patch, proposal, band, &mut scratch);
            let band_range = patch.bands[band];
            let mut written = Vec::new();
            for exposure_index in band_range.start..band_range.start + band_range.n {
                let exposure = &patch.exposures[exposure_index];
                let range = exposure.pixel_start..exposure.pixel_start + exposure.pixel_n;
                written.extend(range.clone().zip(scratch[range].iter().copied()));
            }
            on_band_done(band);
            (response, written)
        })
        .collect();

    for (band, (response, written)) in band_results.into_iter().enumerate() {
        responses[band] = response;
        for (pix, value) in written {
            residual[pix] = value;
        }
    }

    patch.residual = residual;
    responses
}
