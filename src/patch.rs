//! The read-only per-invocation input: a small astronomical image cutout
//! spanning several exposures and bands.

use serde::{Deserialize, Serialize};

use crate::constants::MAXRADII;
use crate::error::KernelError;

/// One component of a per-exposure PSF Gaussian mixture, paired with the
/// Sersic radial bin it convolves against.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PsfSourceGaussian {
    pub amp: f32,
    pub xcen: f32,
    pub ycen: f32,
    pub cxx: f32,
    pub cxy: f32,
    pub cyy: f32,
    /// Index into `Patch::rad2` (and into a `Source`'s mixture-amplitude
    /// arrays) this PSF component pairs with.
    pub sersic_radius_bin: usize,
}

/// The per-band index ranges into the flat exposure arrays.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandRange {
    pub start: usize,
    pub n: usize,
}

/// The per-exposure index ranges, astrometry, and photometric gain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    /// Range into the flat pixel arrays (`xpix`, `ypix`, `data`, `ierr`, `residual`).
    pub pixel_start: usize,
    pub pixel_n: usize,
    /// Offset into `Patch::psfgauss` of this exposure's PSF mixture.
    pub psfgauss_start: usize,
    /// Photometric gain (flux-to-counts factor).
    pub gain: f32,
    /// Astrometric reference pixel.
    pub crpix: [f32; 2],
    /// Astrometric reference sky coordinate.
    pub crval: [f64; 2],
    /// Per-source pixel-scale matrices `D[exposure][source]`, row-major 2x2.
    pub d: Vec<[f32; 4]>,
    /// Per-source world-coordinate Jacobians `CW[exposure][source]`, row-major 2x2.
    pub cw: Vec<[f32; 4]>,
}

/// A read-only astronomical image cutout: all pixels from all exposures of
/// all bands relevant to one small patch of sky.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub n_sources: usize,
    /// Number of PSF Gaussian components used per source, indexed by band.
    pub n_psf_per_source: Vec<usize>,
    pub bands: Vec<BandRange>,
    pub exposures: Vec<Exposure>,

    pub xpix: Vec<f32>,
    pub ypix: Vec<f32>,
    pub data: Vec<f32>,
    pub ierr: Vec<f32>,
    /// Output scratch, one entry per pixel; written by the kernel.
    #[serde(default)]
    pub residual: Vec<f32>,

    /// Squared Sersic-mixture radii, global to the patch.
    pub rad2: Vec<f32>,
    pub psfgauss: Vec<PsfSourceGaussian>,
}

impl Patch {
    pub fn n_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn n_radii(&self) -> usize {
        self.rad2.len()
    }

    /// Validates the invariants of spec.md §3 that aren't otherwise checked
    /// by Rust's type system, and constructs a `Patch` with a freshly zeroed
    /// `residual` buffer. This is the only place shape/bound violations are
    /// reported as errors; once constructed, the numeric kernel trusts the
    /// patch completely (spec.md §7).
    #[allow(clippy::too_many_arguments)]
    pub fn from_buffers(
        n_sources: usize,
        n_psf_per_source: Vec<usize>,
        bands: Vec<BandRange>,
        exposures: Vec<Exposure>,
        xpix: Vec<f32>,
        ypix: Vec<f32>,
        data: Vec<f32>,
        ierr: Vec<f32>,
        rad2: Vec<f32>,
        psfgauss: Vec<PsfSourceGaussian>,
    ) -> Result<Patch, KernelError> {
        use crate::constants::MAXBANDS;

        if bands.len() > MAXBANDS {
            return Err(KernelError::TooManyBands {
                n_bands: bands.len(),
                max: MAXBANDS,
            });
        }
        if rad2.len() > MAXRADII {
            return Err(KernelError::TooManyRadii {
                n_radii: rad2.len(),
                max: MAXRADII,
            });
        }
        if n_psf_per_source.len() != bands.len() {
            return Err(KernelError::LengthMismatch {
                array: "n_psf_per_source",
                actual: n_psf_per_source.len(),
                expected: bands.len(),
            });
        }

        let n_pixels = xpix.len();
        for (array, len) in [("ypix", ypix.len()), ("data", data.len()), ("ierr", ierr.len())] {
            if len != n_pixels {
                return Err(KernelError::LengthMismatch {
                    array,
                    actual: len,
                    expected: n_pixels,
                });
            }
        }

        for band in &bands {
            if band.start + band.n > exposures.len() {
                return Err(KernelError::RangeOutOfBounds {
                    range: "band exposure range",
                    array: "exposures",
                    start: band.start,
                    len: band.n,
                    array_len: exposures.len(),
                });
            }
        }

        for exposure in &exposures {
            if exposure.pixel_start + exposure.pixel_n > n_pixels {
                return Err(KernelError::RangeOutOfBounds {
                    range: "exposure pixel range",
                    array: "xpix/ypix/data/ierr",
                    start: exposure.pixel_start,
                    len: exposure.pixel_n,
                    array_len: n_pixels,
                });
            }
            if exposure.d.len() != n_sources || exposure.cw.len() != n_sources {
                return Err(KernelError::LengthMismatch {
                    array: "exposure.d/cw",
                    actual: exposure.d.len(),
                    expected: n_sources,
                });
            }
        }

        for (i, p) in psfgauss.iter().enumerate() {
            if p.sersic_radius_bin >= rad2.len() {
                return Err(KernelError::RadiusBinOutOfRange {
                    index: i,
                    bin: p.sersic_radius_bin,
                    n_radii: rad2.len(),
                });
            }
        }

        let residual = vec![0.0_f32; n_pixels];

        Ok(Patch {
            n_sources,
            n_psf_per_source,
            bands,
            exposures,
            xpix,
            ypix,
            data,
            ierr,
            residual,
            rad2,
            psfgauss,
        })
    }
}
