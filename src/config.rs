// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading `Patch` and `Proposal` inputs, and writing `Response` outputs,
//! to and from JSON or TOML files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::NUMACCUMS;
use crate::error::KernelError;
use crate::kernel::Response;
use crate::patch::Patch;
use crate::proposal::Proposal;

/// Which serialization format a `.json`/`.toml` extension selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileFormat {
    Json,
    Toml,
}

fn format_from_extension(path: &Path) -> Result<FileFormat, KernelError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Ok(FileFormat::Json),
        Some("toml") => Ok(FileFormat::Toml),
        _ => Err(KernelError::UnrecognisedFileExtension(
            path.display().to_string(),
        )),
    }
}

/// Runtime tuning for the `galphot` CLI, loaded from a `.toml` file (the
/// ambient `RunConfig` of spec.md §6's "Compile-time configuration
/// constants" note): how many `rayon` worker threads to use, and a
/// `NUMACCUMS` override carried for parity with the GPU kernel's tuning
/// knob. Unlike `Patch`/`Proposal`/`Response`, this is TOML-only -- it's a
/// small, hand-edited operator file, not a wire format produced by another
/// program.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of `rayon` worker threads. `None` (the default if the key is
    /// absent) leaves `rayon`'s default (one per logical CPU) in place.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    /// Requested `NUMACCUMS` override. The CPU kernel has no per-block
    /// accumulator-count knob to apply this to (see `constants::NUMACCUMS`),
    /// so a value other than the compile-time default only produces a
    /// warning.
    #[serde(default)]
    pub numaccums: Option<usize>,
}

impl RunConfig {
    /// Reads a `RunConfig` from a `.toml` file.
    pub fn read(path: &Path) -> Result<RunConfig, KernelError> {
        let mut contents = String::new();
        BufReader::new(File::open(path)?).read_to_string(&mut contents)?;
        toml::from_str(&contents).map_err(|e| KernelError::TomlDecode(e.to_string()))
    }

    /// Applies `worker_threads` to `rayon`'s global thread pool and warns
    /// about an unsatisfiable `numaccums` override. Idempotent only in the
    /// sense that `rayon` itself is: the global pool can be built once per
    /// process.
    pub fn apply(&self) {
        if let Some(n) = self.worker_threads {
            if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
                warn!("failed to set rayon worker thread count to {n}: {e}");
            }
        }
        if let Some(n) = self.numaccums {
            if n != NUMACCUMS {
                warn!(
                    "RunConfig requested NUMACCUMS={n}, but the CPU kernel has no per-block \
                     accumulator-count knob to apply it to; ignoring"
                );
            }
        }
    }
}

/// Reads a [`Patch`] from a `.json` or `.toml` file. `residual` is output
/// scratch and isn't expected in the file, so it's (re)sized to match
/// `xpix` here rather than trusting whatever `Patch::deserialize` defaulted
/// it to.
pub fn read_patch(path: &Path) -> Result<Patch, KernelError> {
    let mut patch: Patch = read_toml_or_json(path)?;
    patch.residual = vec![0.0; patch.xpix.len()];
    Ok(patch)
}

/// Reads a [`Proposal`] from a `.json` or `.toml` file.
pub fn read_proposal(path: &Path) -> Result<Proposal, KernelError> {
    read_toml_or_json(path)
}

/// Writes a slice of [`Response`]s to a `.json` or `.toml` file.
pub fn write_responses(path: &Path, responses: &[Response]) -> Result<(), KernelError> {
    match format_from_extension(path)? {
        FileFormat::Json => {
            let f = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(f, responses)?;
        }
        FileFormat::Toml => {
            // `toml` only serializes self-describing top-level tables, not
            // bare sequences, so wrap the responses in one.
            #[derive(serde::Serialize)]
            struct Wrapper<'a> {
                responses: &'a [Response],
            }
            let text = toml::to_string_pretty(&Wrapper { responses })
                .map_err(|e| KernelError::TomlEncode(e.to_string()))?;
            std::fs::write(path, text)?;
        }
    }
    Ok(())
}

fn read_toml_or_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, KernelError> {
    let format = format_from_extension(path)?;
    let mut contents = String::new();
    BufReader::new(File::open(path)?).read_to_string(&mut contents)?;
    match format {
        FileFormat::Json => Ok(serde_json::from_str(&contents)?),
        FileFormat::Toml => {
            toml::from_str(&contents).map_err(|e| KernelError::TomlDecode(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{BandRange, Exposure, PsfSourceGaussian};
    use crate::proposal::Source;

    fn sample_patch() -> Patch {
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
    fn patch_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.json");
        let patch = sample_patch();
        serde_json::to_writer(File::create(&path).unwrap(), &patch).unwrap();
        let read_back = read_patch(&path).unwrap();
        assert_eq!(patch, read_back);
    }

    #[test]
    fn unrecognised_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.yaml");
        std::fs::write(&path, "not used").unwrap();
        assert!(read_patch(&path).is_err());
    }

    #[test]
    fn source_toml_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proposal.toml");
        let proposal = Proposal::new(vec![Source {
            ra: 1.0,
            dec: 2.0,
            q: 0.5,
            pa: 0.1,
            sersic_n: 1.0,
            rh: 1.0,
            fluxes: vec![1.0],
            mixture_amplitudes: vec![1.0],
            damplitude_dnsersic: vec![0.1],
            damplitude_drh: vec![0.2],
        }])
        .unwrap();
        let text = toml::to_string_pretty(&proposal).unwrap();
        std::fs::write(&path, text).unwrap();
        let read_back = read_proposal(&path).unwrap();
        assert_eq!(proposal, read_back);
    }

    #[test]
    fn run_config_toml_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let run_config = RunConfig {
            worker_threads: Some(4),
            numaccums: Some(1),
        };
        std::fs::write(&path, toml::to_string_pretty(&run_config).unwrap()).unwrap();
        let read_back = RunConfig::read(&path).unwrap();
        assert_eq!(run_config, read_back);
    }

    #[test]
    fn run_config_missing_fields_default_to_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "").unwrap();
        let read_back = RunConfig::read(&path).unwrap();
        assert_eq!(read_back, RunConfig::default());
    }
}
