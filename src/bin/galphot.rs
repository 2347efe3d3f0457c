// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Evaluate a galaxy photometry chi-square/gradient kernel from patch and
//! proposal files on disk.

use clap::Parser;
use galphot_kernel::cli::{Args, Command};
use galphot_kernel::config::{read_patch, read_proposal, write_responses, RunConfig};
use galphot_kernel::kernel::{evaluate_proposal, evaluate_proposal_with_progress};
use galphot_kernel::{
    BandRange, Exposure, KernelError, Patch, Proposal, PsfSourceGaussian, Source,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

fn main() -> Result<(), KernelError> {
    let args = Args::parse();
    galphot_kernel::logging::setup_logging(args.verbosity).expect("failed to initialize logging");

    match args.command {
        Command::Evaluate {
            patch,
            proposal,
            output,
            config,
        } => {
            apply_run_config(config.as_deref())?;

            debug!("Reading patch from {}", patch.display());
            let mut patch = read_patch(&patch)?;
            debug!("Reading proposal from {}", proposal.display());
            let proposal = read_proposal(&proposal)?;

            let responses = evaluate_proposal(&mut patch, &proposal);

            match output {
                Some(path) => {
                    write_responses(&path, &responses)?;
                    println!("Wrote {} band responses to {}", responses.len(), path.display());
                }
                None => {
                    let text = serde_json::to_string_pretty(&responses)?;
                    println!("{text}");
                }
            }
        }

        Command::Bench {
            pixels,
            sources,
            bands,
            config,
        } => {
            apply_run_config(config.as_deref())?;

            let (mut patch, proposal) = build_synthetic_patch(pixels, sources, bands);

            let pb = ProgressBar::new(bands as u64).with_style(
                ProgressStyle::default_bar()
                    .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
                    .unwrap()
                    .progress_chars("=> "),
            );
            pb.set_message("evaluating bands");

            let responses = evaluate_proposal_with_progress(&mut patch, &proposal, |_band| {
                pb.inc(1);
            });
            pb.abandon_with_message("done");

            let total_chi2: f32 = responses.iter().map(|r| r.chi2).sum();
            println!("{} bands, total chi2 = {total_chi2}", responses.len());
        }
    }

    Ok(())
}

fn apply_run_config(config: Option<&std::path::Path>) -> Result<(), KernelError> {
    if let Some(path) = config {
        debug!("Reading run configuration from {}", path.display());
        RunConfig::read(path)?.apply();
    }
    Ok(())
}

/// Builds a synthetic `(Patch, Proposal)` for `bench`: `n_bands` identical
/// square images of `pixels * pixels` flat, zero-data pixels, one PSF
/// Gaussian component per band, and `n_sources` active sources.
fn build_synthetic_patch(pixels: usize, n_sources: usize, n_bands: usize) -> (Patch, Proposal) {
    let n_pixels_per_band = pixels * pixels;

    let mut xpix = Vec::new();
    let mut ypix = Vec::new();
    let mut data = Vec::new();
    let mut ierr = Vec::new();
    let mut exposures = Vec::new();
    let mut bands = Vec::new();
    let mut n_psf_per_source = Vec::new();
    let mut psfgauss = Vec::new();

    let d = vec![[1.0, 0.0, 0.0, 1.0]; n_sources];
    let cw = vec![[1.0, 0.0, 0.0, 1.0]; n_sources];

    for band in 0..n_bands {
        let pixel_start = xpix.len();
        for i in 0..n_pixels_per_band {
            xpix.push((i % pixels) as f32);
            ypix.push((i / pixels) as f32);
            data.push(0.0);
            ierr.push(1.0);
        }

        let psfgauss_start = psfgauss.len();
        psfgauss.push(PsfSourceGaussian {
            amp: 1.0,
            xcen: 0.0,
            ycen: 0.0,
            cxx: 1.0,
            cxy: 0.0,
            cyy: 1.0,
            sersic_radius_bin: 0,
        });

        exposures.push(Exposure {
            pixel_start,
            pixel_n: n_pixels_per_band,
            psfgauss_start,
            gain: 1.0,
            crpix: [pixels as f32 / 2.0; 2],
            crval: [0.0, 0.0],
            d: d.clone(),
            cw: cw.clone(),
        });
        bands.push(BandRange { start: band, n: 1 });
        n_psf_per_source.push(1);
    }

    let patch = Patch::from_buffers(
        n_sources,
        n_psf_per_source,
        bands,
        exposures,
        xpix,
        ypix,
        data,
        ierr,
        vec![1.0],
        psfgauss,
    )
    .expect("synthetic bench patch satisfies its own shape invariants");

    let sources = (0..n_sources)
        .map(|i| Source {
            ra: i as f64 * 1e-4,
            dec: 0.0,
            q: 0.8,
            pa: 0.3,
            sersic_n: 1.0,
            rh: 2.0,
            fluxes: vec![10.0; n_bands],
            mixture_amplitudes: vec![1.0],
            damplitude_dnsersic: vec![0.1],
            damplitude_drh: vec![0.2],
        })
        .collect();
    let proposal =
        Proposal::new(sources).expect("synthetic bench proposal satisfies its own shape invariants");

    (patch, proposal)
}
