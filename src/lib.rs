#![doc = include_str!("../README.md")]

pub mod annotate;
pub mod barcode;
pub mod cli;
pub mod config;
pub mod error;
pub mod family;
pub mod filter;
pub mod gmc;
pub mod output;
pub mod pedigree;
pub mod report;
pub mod smart_reader;
pub mod variant;
pub mod vcf_utils;

pub use annotate::{AnnotationSummary, BarcodeJob, GmcJob, annotate_barcodes, annotate_gene_counts};
pub use error::{ConfigurationError, Error, InvariantError, Result};
pub use output::OutputFormat;
