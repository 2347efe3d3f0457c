//! Benchmarks for the per-pixel evaluator and the full kernel driver.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use galphot_kernel::kernel::evaluate_proposal;
use galphot_kernel::patch::{BandRange, Exposure, Patch, PsfSourceGaussian};
use galphot_kernel::proposal::{Proposal, Source};

fn make_patch(n_pixels_per_side: usize, n_sources: usize) -> (Patch, Proposal) {
    let n_pixels = n_pixels_per_side * n_pixels_per_side;
    let xpix: Vec<f32> = (0..n_pixels).map(|i| (i % n_pixels_per_side) as f32).collect();
    let ypix: Vec<f32> = (0..n_pixels).map(|i| (i / n_pixels_per_side) as f32).collect();
    let data = vec![0.0_f32; n_pixels];
    let ierr = vec![1.0_f32; n_pixels];

    let d = vec![[1.0, 0.0, 0.0, 1.0]; n_sources];
    let cw = vec![[1.0, 0.0, 0.0, 1.0]; n_sources];

    let patch = Patch::from_buffers(
        n_sources,
        vec![1],
        vec![BandRange { start: 0, n: 1 }],
        vec![Exposure {
            pixel_start: 0,
            pixel_n: n_pixels,
            psfgauss_start: 0,
            gain: 1.0,
            crpix: [n_pixels_per_side as f32 / 2.0; 2],
            crval: [0.0, 0.0],
            d,
            cw,
        }],
        xpix,
        ypix,
        data,
        ierr,
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
    .unwrap();

    let sources = (0..n_sources)
        .map(|i| Source {
            ra: i as f64 * 1e-4,
            dec: 0.0,
            q: 0.8,
            pa: 0.3,
            sersic_n: 1.0,
            rh: 2.0,
            fluxes: vec![10.0],
            mixture_amplitudes: vec![1.0],
            damplitude_dnsersic: vec![0.1],
            damplitude_drh: vec![0.2],
        })
        .collect();
    let proposal = Proposal::new(sources).unwrap();

    (patch, proposal)
}

fn bench_evaluate_proposal(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel/evaluate_proposal");

    for n_pixels_per_side in [16usize, 32, 64] {
        group.bench_with_input(
            BenchmarkId::new("single_source", n_pixels_per_side),
            &n_pixels_per_side,
            |b, &side| {
                let (mut patch, proposal) = make_patch(side, 1);
                b.iter(|| black_box(evaluate_proposal(&mut patch, &proposal)))
            },
        );
    }

    for n_sources in [1usize, 4, 10] {
        group.bench_with_input(
            BenchmarkId::new("fixed_32x32_image", n_sources),
            &n_sources,
            |b, &n| {
                let (mut patch, proposal) = make_patch(32, n);
                b.iter(|| black_box(evaluate_proposal(&mut patch, &proposal)))
            },
        );
    }

    group.finish();
}

criterion_group!(kernel_benches, bench_evaluate_proposal);
criterion_main!(kernel_benches);
