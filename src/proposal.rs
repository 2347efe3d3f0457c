//! The proposed set of active sky parameters the kernel is evaluated at.

use serde::{Deserialize, Serialize};

use crate::constants::MAXSOURCES;
use crate::error::KernelError;

/// One active galaxy: the seven sky parameters the gradient is taken with
/// respect to, plus the precomputed Sersic-mixture coefficients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub ra: f64,
    pub dec: f64,
    /// Axis-ratio-squared.
    pub q: f32,
    /// Position angle.
    pub pa: f32,
    pub sersic_n: f32,
    /// Half-light radius.
    pub rh: f32,
    /// Per-band total flux.
    pub fluxes: Vec<f32>,
    /// Mixture amplitude per Sersic radial bin.
    pub mixture_amplitudes: Vec<f32>,
    /// `d(mixture_amplitude)/d(sersic_n)` per radial bin.
    pub damplitude_dnsersic: Vec<f32>,
    /// `d(mixture_amplitude)/d(rh)` per radial bin.
    pub damplitude_drh: Vec<f32>,
}

/// The contiguous array of active sources a kernel invocation is evaluated
/// against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub sources: Vec<Source>,
}

impl Proposal {
    /// Validates `n_active <= MAXSOURCES` (spec.md §3 Invariants).
    pub fn new(sources: Vec<Source>) -> Result<Proposal, KernelError> {
        if sources.len() > MAXSOURCES {
            return Err(KernelError::TooManySources {
                n_active: sources.len(),
                max: MAXSOURCES,
            });
        }
        Ok(Proposal { sources })
    }

    pub fn n_active(&self) -> usize {
        self.sources.len()
    }
}
