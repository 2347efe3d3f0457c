//! Error type for all galphot-kernel-related errors. This should be the
//! *only* error enum that is publicly visible.

use thiserror::Error;

/// The *only* publicly visible error from this crate.
#[derive(Error, Debug)]
pub enum KernelError {
    /// The proposal has more active sources than [`crate::constants::MAXSOURCES`].
    #[error("n_active ({n_active}) exceeds MAXSOURCES ({max})")]
    TooManySources { n_active: usize, max: usize },

    /// The patch declares more bands than [`crate::constants::MAXBANDS`].
    #[error("n_bands ({n_bands}) exceeds MAXBANDS ({max})")]
    TooManyBands { n_bands: usize, max: usize },

    /// The patch declares more Sersic radial bins than [`crate::constants::MAXRADII`].
    #[error("n_radii ({n_radii}) exceeds MAXRADII ({max})")]
    TooManyRadii { n_radii: usize, max: usize },

    /// A `psfgauss[].sersic_radius_bin` index is out of the patch's `[0, n_radii)` range.
    #[error("psf gaussian {index} has sersic_radius_bin {bin}, but n_radii is {n_radii}")]
    RadiusBinOutOfRange {
        index: usize,
        bin: usize,
        n_radii: usize,
    },

    /// A flat array did not have the length implied by the patch's header.
    #[error("{array} has length {actual}, expected {expected}")]
    LengthMismatch {
        array: &'static str,
        actual: usize,
        expected: usize,
    },

    /// A per-exposure or per-band index range reads outside its backing array.
    #[error("{range} [{start}, {start}+{len}) is out of bounds for {array} of length {array_len}")]
    RangeOutOfBounds {
        range: &'static str,
        array: &'static str,
        start: usize,
        len: usize,
        array_len: usize,
    },

    /// Reading or writing a serialized buffer failed.
    #[error("(de)serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing a buffer file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A config/patch/proposal file's extension wasn't `.json` or `.toml`.
    #[error("'{0}' must have a .json or .toml extension")]
    UnrecognisedFileExtension(String),

    /// A TOML file failed to parse.
    #[error("TOML decode error: {0}")]
    TomlDecode(String),

    /// A value failed to serialize to TOML.
    #[error("TOML encode error: {0}")]
    TomlEncode(String),
}
