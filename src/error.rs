use std::{io, path::PathBuf};

use thiserror::Error;

use crate::variant::VariantKey;

/// Structural problems with the inputs of a run. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("pedigree line {line}: expected 6 or 9 tab-delimited fields, found {found}")]
    PedigreeRowWidth {
        line: u64,
        found: usize,
        raw: String,
    },
    #[error("unsupported pedigree file extension (expected .json, .ped or .ped9): {}", path.display())]
    UnsupportedPedigreeFormat { path: PathBuf },
    #[error("individual {id} appears more than once in the pedigree")]
    DuplicateSample { id: String },
    #[error("invalid JSON pedigree: {0}")]
    PedigreeJson(#[from] serde_json::Error),
    #[error(
        "gene field '{field}' must hold exactly one gene, got '{value}' for variant {variant}"
    )]
    MultiGeneValue {
        field: String,
        value: String,
        variant: VariantKey,
    },
    #[error(
        "FORMAT field '{field}' holds {count} values for sample {sample} at {variant}; split multiallelic records first (e.g. bcftools norm -m-)"
    )]
    MultiValuedFraction {
        field: String,
        sample: usize,
        count: usize,
        variant: VariantKey,
    },
    #[error("no pedigree configured for application {app}")]
    UnknownApplication { app: String },
    #[error("invalid configuration file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Conditions that well-formed inputs can never produce.
#[derive(Debug, Error)]
pub enum InvariantError {
    #[error("family of sample {sample} lists column {index} more than once")]
    DuplicateFamilyIndex { sample: String, index: usize },
    #[error("record {ordinal} changed between passes: counted {expected}, annotating {found}")]
    RecordMismatch {
        ordinal: usize,
        expected: VariantKey,
        found: VariantKey,
    },
    #[error("input changed between passes: counted {counted} records, found {found}")]
    RecordCount { counted: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
