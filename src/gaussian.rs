//! Gaussian preparation: turns one (source, PSF-component) pair into a
//! fully convolved, image-plane [`ImageGaussian`] with its Jacobian to sky
//! parameters.
//!
//! This is `CreateImageGaussians` of spec.md §4.2. It is embarrassingly
//! parallel across the `n_sources * n_psf_per_source[band]` pairs of one
//! exposure; [`create_image_gaussians`] exposes that as a `rayon` parallel
//! iterator rather than a manual stride partition, since there is no shared
//! mutable state across pairs to race on.

use std::f32::consts::TAU;

use rayon::prelude::*;

use crate::linalg::Mat2;
use crate::patch::{Exposure, Patch, PsfSourceGaussian};
use crate::proposal::Source;

/// Per-(source, PSF-component) scratch record used only during preparation.
#[derive(Clone, Copy, Debug)]
pub struct PixGaussian {
    /// The raw Sersic-component variance `rad2[sersic_radius_bin]`.
    pub covar: f32,
    /// The sky-plane covariance of this Sersic component, `covar * T.T^T`.
    pub scovar_im: Mat2,
    pub xcen: f32,
    pub ycen: f32,
    pub flux: f32,
    pub gain: f32,
    /// This bin's mixture amplitude `a_s`.
    pub mixture_amplitude: f32,
    /// `amp / flux`: `G . a_s . psf_amp`, computed without dividing by
    /// `flux` so that zero-flux sources still yield a finite, zero-valued
    /// `amp` rather than propagating a `0/0` (spec.md §8 Property 6).
    pub amp_per_flux: f32,
    pub damp_dsersic: f32,
    pub damp_drh: f32,
    pub cw: Mat2,
    pub t: Mat2,
    pub dt_dq: Mat2,
    pub dt_dpa: Mat2,
}

/// The compact, fully convolved evaluation record: six Gaussian parameters
/// plus the fifteen-entry Jacobian to the seven sky parameters of spec.md
/// §4, in the exact order spec.md §3 enumerates them.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct ImageGaussian {
    pub amp: f32,
    pub xcen: f32,
    pub ycen: f32,
    pub fxx: f32,
    pub fyy: f32,
    pub fxy: f32,

    pub da_dflux: f32,
    pub dx_dalpha: f32,
    pub dy_dalpha: f32,
    pub dx_ddelta: f32,
    pub dy_ddelta: f32,

    pub da_dq: f32,
    pub dfxx_dq: f32,
    pub dfyy_dq: f32,
    pub dfxy_dq: f32,

    pub da_dpa: f32,
    pub dfxx_dpa: f32,
    pub dfyy_dpa: f32,
    pub dfxy_dpa: f32,

    pub da_dsersic: f32,
    pub da_drh: f32,
}

const _: () = assert!(std::mem::size_of::<ImageGaussian>() == 21 * 4);

/// Builds one [`PixGaussian`] for a single (source, PSF-component) pair;
/// steps 1-3 of spec.md §4.2.
fn prepare_pix_gaussian(
    source: &Source,
    band: usize,
    exposure: &Exposure,
    source_index: usize,
    psf: &PsfSourceGaussian,
    rad2: &[f32],
) -> PixGaussian {
    let d = Mat2::from_buffer(exposure.d[source_index]);
    let cw = Mat2::from_buffer(exposure.cw[source_index]);

    let r = Mat2::rot(source.pa);
    let s = Mat2::scale(source.q);
    let t = d * r * s;

    let ds_dq = Mat2::scale_matrix_deriv(source.q);
    let dr_dpa = Mat2::rotation_matrix_deriv(source.pa);
    let dt_dq = d * r * ds_dq;
    let dt_dpa = d * dr_dpa * s;

    let covar = rad2[psf.sersic_radius_bin];
    let scovar_im = t.aat() * covar;

    let sky_offset = [
        (source.ra - exposure.crval[0]) as f32,
        (source.dec - exposure.crval[1]) as f32,
    ];
    let mut pix_offset = sky_offset;
    cw.av(&mut pix_offset);
    let xcen = exposure.crpix[0] + pix_offset[0] + psf.xcen;
    let ycen = exposure.crpix[1] + pix_offset[1] + psf.ycen;

    let s_bin = psf.sersic_radius_bin;
    let mixture_amplitude = source.mixture_amplitudes[s_bin];
    let flux = source.fluxes[band];

    PixGaussian {
        covar,
        scovar_im,
        xcen,
        ycen,
        flux,
        gain: exposure.gain,
        mixture_amplitude,
        amp_per_flux: exposure.gain * mixture_amplitude * psf.amp,
        damp_dsersic: source.damplitude_dnsersic[s_bin],
        damp_drh: source.damplitude_drh[s_bin],
        cw,
        t,
        dt_dq,
        dt_dpa,
    }
}

/// Converts a [`PixGaussian`] plus PSF covariance into the final
/// [`ImageGaussian`], implementing steps 4-7 of spec.md §4.2.
fn image_gaussian_from_pix(pix: &PixGaussian, psf: &PsfSourceGaussian) -> ImageGaussian {
    let psf_covar = Mat2::new(psf.cxx, psf.cxy, psf.cxy, psf.cyy);
    let sigma = pix.scovar_im + psf_covar;
    let f = sigma.inv();
    let det_f = f.det();

    // amp = flux . G . a_s . psf_amp . sqrt(detF) / (2 pi), kept factored as
    // flux * (per-flux coefficient) so a zero flux yields a finite zero amp
    // and a finite da_dflux rather than a 0/0.
    let amp_per_flux = pix.amp_per_flux * det_f.sqrt() / TAU;
    let amp = pix.flux * amp_per_flux;

    // dSigma/dq = covar * (T . dT^T/dq + dT/dq . T^T), analogously for pa.
    let dsigma_dq = (pix.t * pix.dt_dq.transpose() + pix.dt_dq * pix.t.transpose()) * pix.covar;
    let dsigma_dpa = (pix.t * pix.dt_dpa.transpose() + pix.dt_dpa * pix.t.transpose()) * pix.covar;

    // dF/dq = -F . dSigma/dq . F (inverse-derivative identity).
    let df_dq = -Mat2::aba(f, dsigma_dq);
    let df_dpa = -Mat2::aba(f, dsigma_dpa);

    // d(detF)/dq = detF * trace(Sigma . dF/dq).
    let ddetf_dq = det_f * (sigma * df_dq).trace();
    let ddetf_dpa = det_f * (sigma * df_dpa).trace();

    ImageGaussian {
        amp,
        xcen: pix.xcen,
        ycen: pix.ycen,
        fxx: f.v11,
        fyy: f.v22,
        fxy: f.v12,

        da_dflux: amp_per_flux,
        dx_dalpha: pix.cw.v11,
        dy_dalpha: pix.cw.v21,
        dx_ddelta: pix.cw.v12,
        dy_ddelta: pix.cw.v22,

        da_dq: amp * ddetf_dq / (2.0 * det_f),
        dfxx_dq: df_dq.v11,
        dfyy_dq: df_dq.v22,
        dfxy_dq: df_dq.v12,

        da_dpa: amp * ddetf_dpa / (2.0 * det_f),
        dfxx_dpa: df_dpa.v11,
        dfyy_dpa: df_dpa.v22,
        dfxy_dpa: df_dpa.v12,

        da_dsersic: amp * (pix.damp_dsersic / pix.mixture_amplitude),
        da_drh: amp * (pix.damp_drh / pix.mixture_amplitude),
    }
}

/// Builds the `ImageGaussian`s for one exposure, laid out `[source][psf
/// component]` row-major, matching spec.md §3's "Scalars and layout" note.
pub fn create_image_gaussians(
    patch: &Patch,
    proposal: &crate::proposal::Proposal,
    band: usize,
    exposure_index: usize,
) -> Vec<ImageGaussian> {
    let exposure = &patch.exposures[exposure_index];
    let n_psf = patch.n_psf_per_source[band];
    let psf_slice = &patch.psfgauss[exposure.psfgauss_start..exposure.psfgauss_start + n_psf];

    proposal
        .sources
        .par_iter()
        .enumerate()
        .flat_map_iter(|(source_index, source)| {
            psf_slice.iter().map(move |psf| {
                let pix = prepare_pix_gaussian(source, band, exposure, source_index, psf, &patch.rad2);
                image_gaussian_from_pix(&pix, psf)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{BandRange, Exposure};
    use crate::proposal::{Proposal, Source};

    fn unit_source() -> Source {
        Source {
            ra: 0.0,
            dec: 0.0,
            q: 1.0,
            pa: 0.0,
            sersic_n: 1.0,
            rh: 1.0,
            fluxes: vec![1.0],
            mixture_amplitudes: vec![1.0],
            damplitude_dnsersic: vec![0.1],
            damplitude_drh: vec![0.2],
        }
    }

    fn unit_patch() -> Patch {
        Patch::from_buffers(
            1,
            vec![1],
            vec![BandRange { start: 0, n: 1 }],
            vec![Exposure {
                pixel_start: 0,
                pixel_n: 1,
                psfgauss_start: 0,
                gain: 1.0,
                crpix: [5.0, 5.0],
                crval: [0.0, 0.0],
                d: vec![[1.0, 0.0, 0.0, 1.0]],
                cw: vec![[1.0, 0.0, 0.0, 1.0]],
            }],
            vec![5.0],
            vec![5.0],
            vec![0.0],
            vec![1.0],
            vec![1.0],
            vec![PsfSourceGaussian {
                amp: 1.0,
                xcen: 0.0,
                ycen: 0.0,
                cxx: 1.0,
                cxy: 0.0,
                cyy: 1.0,
                sersic_radius_bin: 0,
            }],
        )
        .unwrap()
    }

    #[test]
    fn identity_transform_centers_on_crpix() {
        let patch = unit_patch();
        let proposal = Proposal::new(vec![unit_source()]).unwrap();
        let gaussians = create_image_gaussians(&patch, &proposal, 0, 0);
        assert_eq!(gaussians.len(), 1);
        let g = gaussians[0];
        assert!((g.xcen - 5.0).abs() < 1e-5);
        assert!((g.ycen - 5.0).abs() < 1e-5);
        assert!(g.fxx > 0.0 && g.fyy > 0.0);
    }

    #[test]
    fn amplitude_scales_linearly_with_flux() {
        let patch = unit_patch();
        let mut src_a = unit_source();
        src_a.fluxes = vec![1.0];
        let mut src_b = unit_source();
        src_b.fluxes = vec![2.0];
        let proposal_a = Proposal::new(vec![src_a]).unwrap();
        let proposal_b = Proposal::new(vec![src_b]).unwrap();
        let ga = create_image_gaussians(&patch, &proposal_a, 0, 0)[0];
        let gb = create_image_gaussians(&patch, &proposal_b, 0, 0)[0];
        assert!((gb.amp - 2.0 * ga.amp).abs() < 1e-5);
    }
}
