use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    annotate::{self, AnnotationSummary, BarcodeJob, GmcJob},
    config::{PedigreeSource, RunConfig},
    report::RunReport,
};

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Parser)]
#[command(author, version, about = "Annotate multi-sample VCF/BCF files with family barcodes and gene mutation counts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Logging verbosity: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add per-sample family genotype barcodes (BCF, BCFS)
    Barcode(BarcodeArgs),
    /// Add per-sample gene mutation counts (GMC, GMC_FILTERED)
    Gmc(GmcArgs),
    /// Write the default configuration as YAML
    Config {
        /// Destination; printed to stdout when omitted
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct IoArgs {
    /// Input VCF (plain, gzip or BGZF) or BCF
    #[arg(long, value_name = "INPUT")]
    input: PathBuf,

    /// Output path; `.bcf` writes BCF, `.gz` gzip-compressed VCF, anything else VCF
    #[arg(long, value_name = "OUTPUT")]
    output: PathBuf,

    /// YAML run configuration
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Do not write the JSON run report next to the output
    #[arg(long)]
    no_report: bool,
}

#[derive(Debug, Args)]
struct BarcodeArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Pedigree file (.ped, .ped9 or .json); takes precedence over --app
    #[arg(long, value_name = "FILE")]
    pedigree: Option<PathBuf>,

    /// Application whose pedigree is looked up in the configuration
    #[arg(long, value_name = "APP")]
    app: Option<String>,
}

#[derive(Debug, Args)]
struct GmcArgs {
    #[command(flatten)]
    io: IoArgs,

    /// INFO field holding the gene name (overrides the configuration)
    #[arg(long, value_name = "FIELD")]
    gene_field: Option<String>,

    /// Also compute GMC_FILTERED
    #[arg(long, overrides_with = "no_filtered")]
    filtered: bool,

    /// Skip GMC_FILTERED
    #[arg(long, overrides_with = "filtered")]
    no_filtered: bool,
}

impl IoArgs {
    fn load_config(&self) -> Result<RunConfig> {
        match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("failed to load configuration {}", path.display())),
            None => Ok(RunConfig::default()),
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Command::Barcode(args) => {
            let job = BarcodeJob {
                config: args.io.load_config()?,
                input: args.io.input.clone(),
                output: args.io.output.clone(),
                pedigree: PedigreeSource::from_args(args.pedigree, args.app),
            };
            let summary = annotate::annotate_barcodes(&job)?;
            finish("barcode", &args.io, &summary)
        }
        Command::Gmc(args) => {
            let mut config = args.io.load_config()?.gmc;
            if let Some(field) = args.gene_field {
                config.gene_field = field;
            }
            if args.filtered {
                config.do_filtered_gmc = true;
            } else if args.no_filtered {
                config.do_filtered_gmc = false;
            }
            let job = GmcJob {
                input: args.io.input.clone(),
                output: args.io.output.clone(),
                config,
            };
            let summary = annotate::annotate_gene_counts(&job)?;
            finish("gmc", &args.io, &summary)
        }
        Command::Config { output } => {
            let config = RunConfig::default();
            match output {
                Some(path) => config
                    .write(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", config.to_yaml()?),
            }
            Ok(())
        }
    }
}

fn finish(command: &str, io: &IoArgs, summary: &AnnotationSummary) -> Result<()> {
    if !io.no_report {
        RunReport::new(command, &io.input, &io.output, summary)
            .write(&io.output)
            .with_context(|| format!("failed to write run report for {}", io.output.display()))?;
    }
    print_summary(command, &io.output, summary);
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        bail!(
            "unrecognised log level '{level}' (expected one of: {})",
            LOG_LEVELS.join(", ")
        );
    }
    let filter = EnvFilter::try_new(&level).context("invalid log filter")?;
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
    Ok(())
}

fn print_summary(command: &str, output: &Path, summary: &AnnotationSummary) {
    println!(
        "Processed {total} records; annotated {annotated}. Output: {output}",
        total = summary.total_records,
        annotated = summary.records_annotated,
        output = output.display(),
    );

    if command == "barcode" {
        println!(
            "{with} of {samples} samples have a family; {without} are unrelated.",
            with = summary.samples_with_family,
            samples = summary.samples,
            without = summary.samples_without_family,
        );
    } else {
        println!(
            "Counted {genes} genes; {passing} records passed the variant filter.",
            genes = summary.distinct_genes,
            passing = summary.records_passing_filter,
        );
        if summary.records_without_gene > 0 {
            println!(
                "Left {count} records without a gene unannotated.",
                count = summary.records_without_gene
            );
        }
    }
}
