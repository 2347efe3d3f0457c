// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A per-patch chi-square and gradient kernel for forward-modelling galaxy
//! photometry: galaxies represented as Gaussian mixtures (a Sersic profile
//! approximation) convolved with per-exposure PSF Gaussian mixtures and
//! projected through per-exposure astrometry.

pub mod cli;
pub mod config;
pub(crate) mod constants;
pub mod error;
pub mod gaussian;
pub mod kernel;
pub mod linalg;
pub mod logging;
pub mod patch;
pub mod pixel;
pub mod proposal;

pub use constants::{MAXBANDS, MAXRADII, MAXSOURCES, NPARAMS, WARP_SIZE};
pub use error::KernelError;
pub use gaussian::{create_image_gaussians, ImageGaussian};
pub use kernel::{evaluate_proposal, evaluate_proposal_with_progress, warp_reduce_sum, Response};
pub use linalg::Mat2;
pub use patch::{BandRange, Exposure, Patch, PsfSourceGaussian};
pub use proposal::{Proposal, Source};
