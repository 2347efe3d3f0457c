// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line arguments for the `galphot` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// The verbosity of the program. Can be specified multiple times
    /// (e.g. -vv) for more detail.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate chi-square and its gradient for one patch and proposal.
    Evaluate {
        /// Path to a patch file (.json or .toml).
        #[arg(long)]
        patch: PathBuf,

        /// Path to a proposal file (.json or .toml).
        #[arg(long)]
        proposal: PathBuf,

        /// Where to write the per-band responses (.json or .toml). Printed
        /// to stdout as JSON if not given.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Path to a run-configuration file (.toml) controlling `rayon`
        /// worker-thread count.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a synthetic patch through the kernel for interactive profiling,
    /// showing a progress bar over bands.
    Bench {
        /// Number of pixels per image side.
        #[arg(long, default_value_t = 64)]
        pixels: usize,

        /// Number of active sources.
        #[arg(long, default_value_t = 4)]
        sources: usize,

        /// Number of bands.
        #[arg(long, default_value_t = 4)]
        bands: usize,

        /// Path to a run-configuration file (.toml) controlling `rayon`
        /// worker-thread count.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}
