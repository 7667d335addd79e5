use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use noodles::vcf::{self, variant::RecordBuf};

use crate::{
    barcode::BarcodeEncoder,
    config::{PedigreeSource, RunConfig},
    error::InvariantError,
    family::FamilyIndex,
    gmc::{FrozenGenes, GeneAggregator, GmcConfig},
    output::OutputWriter,
    smart_reader::VariantReader,
    vcf_utils,
};

/// Family barcode run.
#[derive(Debug, Clone)]
pub struct BarcodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pedigree: PedigreeSource,
    pub config: RunConfig,
}

/// Gene mutation count run.
#[derive(Debug, Clone)]
pub struct GmcJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub config: GmcConfig,
}

/// Counts collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub total_records: usize,
    pub records_annotated: usize,
    pub records_without_gene: usize,
    pub distinct_genes: usize,
    pub samples: usize,
    pub samples_with_family: usize,
    pub samples_without_family: usize,
    pub records_passing_filter: usize,
    /// Pedigree actually used, if any.
    pub pedigree: Option<PathBuf>,
}

fn open(path: &Path) -> Result<VariantReader> {
    VariantReader::open(path).with_context(|| format!("failed to open input {}", path.display()))
}

fn next_record(reader: &mut VariantReader, input: &Path) -> Result<Option<RecordBuf>> {
    reader
        .read_record()
        .with_context(|| format!("failed to read variant record from {}", input.display()))
}

/// Attach `BCF`/`BCFS` to every record of the input.
pub fn annotate_barcodes(job: &BarcodeJob) -> Result<AnnotationSummary> {
    tracing::info!(
        input = %job.input.display(),
        output = %job.output.display(),
        pedigree = ?job.pedigree,
        "starting barcode annotation",
    );

    let (pedigree, pedigree_path) = job
        .pedigree
        .load(&job.config)
        .context("failed to load pedigree")?;

    let mut reader = open(&job.input)?;
    let sample_names = vcf_utils::sample_names(reader.header());
    let families =
        FamilyIndex::resolve(&pedigree, &sample_names).context("failed to resolve families")?;

    let mut summary = AnnotationSummary {
        samples: families.len(),
        samples_with_family: families.samples_with_family(),
        samples_without_family: families.len() - families.samples_with_family(),
        pedigree: pedigree_path,
        ..AnnotationSummary::default()
    };
    tracing::info!(
        samples = summary.samples,
        with_family = summary.samples_with_family,
        "resolved families"
    );

    let encoder = BarcodeEncoder::new(families);
    let mut header = reader.header().clone();
    vcf_utils::add_barcode_formats(&mut header);
    let mut writer = OutputWriter::create(&job.output, header)
        .with_context(|| format!("failed to create output {}", job.output.display()))?;

    while let Some(mut record) = next_record(&mut reader, &job.input)? {
        summary.total_records += 1;
        encoder.annotate(&mut record);
        writer.write(&record)?;
        summary.records_annotated += 1;
    }

    writer.commit()?;
    Ok(summary)
}

/// Pass 1: sum per-gene counts over the whole input.
pub fn aggregate_genes(input: &Path, config: &GmcConfig) -> Result<(vcf::Header, FrozenGenes)> {
    let mut reader = open(input)?;
    let header = reader.header().clone();
    let samples = header.sample_names().len();
    let mut aggregator = GeneAggregator::new(config.clone(), samples);

    while let Some(record) = next_record(&mut reader, input)? {
        aggregator
            .observe(&record)
            .with_context(|| format!("failed to count genes in {}", input.display()))?;
    }

    Ok((header, aggregator.freeze()))
}

/// Attach `GMC` (and `GMC_FILTERED`) using two passes over the input.
pub fn annotate_gene_counts(job: &GmcJob) -> Result<AnnotationSummary> {
    tracing::info!(
        input = %job.input.display(),
        output = %job.output.display(),
        gene_field = job.config.gene_field.as_str(),
        filtered = job.config.do_filtered_gmc,
        "starting gene mutation count annotation",
    );

    let (mut header, genes) = aggregate_genes(&job.input, &job.config)?;
    vcf_utils::add_gmc_formats(&mut header, &job.config.gene_field, genes.has_filtered());

    let stats = genes.stats();
    let mut summary = AnnotationSummary {
        samples: header.sample_names().len(),
        distinct_genes: genes.gene_count(),
        records_passing_filter: stats.variants_passing_filter,
        ..AnnotationSummary::default()
    };

    // pass 2 re-reads the source in the same order; records are matched by ordinal
    let mut reader = open(&job.input)?;
    let mut writer = OutputWriter::create(&job.output, header)
        .with_context(|| format!("failed to create output {}", job.output.display()))?;

    while let Some(mut record) = next_record(&mut reader, &job.input)? {
        let annotated = genes
            .annotate(summary.total_records, &mut record)
            .with_context(|| format!("failed to annotate {}", job.input.display()))?;
        summary.total_records += 1;
        if annotated {
            summary.records_annotated += 1;
        } else {
            summary.records_without_gene += 1;
        }
        writer.write(&record)?;
    }

    if summary.total_records != genes.records() {
        let err = InvariantError::RecordCount {
            counted: genes.records(),
            found: summary.total_records,
        };
        return Err(anyhow::Error::new(err)
            .context(format!("failed to annotate {}", job.input.display())));
    }

    writer.commit()?;
    Ok(summary)
}
