use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use noodles::bcf;
use noodles::vcf::{
    self as vcf,
    variant::{RecordBuf, io::Write as VariantRecordWrite},
};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Vcf,
    /// gzip-compressed VCF
    VcfGz,
    Bcf,
}

impl OutputFormat {
    /// Picked from the file name; anything unrecognised is plain VCF.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".bcf") {
            Self::Bcf
        } else if name.ends_with(".gz") {
            Self::VcfGz
        } else {
            Self::Vcf
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vcf => "vcf",
            Self::VcfGz => "vcf.gz",
            Self::Bcf => "bcf",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vcf" => Ok(Self::Vcf),
            "vcf.gz" | "vcfgz" => Ok(Self::VcfGz),
            "bcf" => Ok(Self::Bcf),
            other => Err(anyhow!("unsupported output format: {other}")),
        }
    }
}

trait VariantWriter {
    fn write_header(&mut self, header: &vcf::Header) -> io::Result<()>;
    fn write_variant(&mut self, header: &vcf::Header, record: &RecordBuf) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

impl<W> VariantWriter for vcf::io::Writer<W>
where
    W: Write,
{
    fn write_header(&mut self, header: &vcf::Header) -> io::Result<()> {
        vcf::io::Writer::write_header(self, header)
    }

    fn write_variant(&mut self, header: &vcf::Header, record: &RecordBuf) -> io::Result<()> {
        VariantRecordWrite::write_variant_record(self, header, record)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.get_mut().flush()
    }
}

impl<W> VariantWriter for bcf::io::Writer<W>
where
    W: Write,
{
    fn write_header(&mut self, header: &vcf::Header) -> io::Result<()> {
        bcf::io::Writer::write_header(self, header)
    }

    fn write_variant(&mut self, header: &vcf::Header, record: &RecordBuf) -> io::Result<()> {
        VariantRecordWrite::write_variant_record(self, header, record)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.get_mut().flush()
    }
}

/// Writes records to a temporary file next to the destination; the
/// destination only appears once [`OutputWriter::commit`] succeeds.
pub struct OutputWriter {
    writer: Box<dyn VariantWriter>,
    header: vcf::Header,
    temp: NamedTempFile,
    destination: PathBuf,
    records: usize,
}

impl OutputWriter {
    pub fn create<P>(path: P, header: vcf::Header) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let destination = path.as_ref().to_path_buf();
        let format = OutputFormat::from_path(&destination);
        let dir = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let temp = tempfile::Builder::new()
            .prefix(".famannot-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .with_context(|| format!("failed to create temporary output in {}", dir.display()))?;
        let file = temp
            .reopen()
            .with_context(|| format!("failed to open temporary output {}", temp.path().display()))?;

        let mut writer: Box<dyn VariantWriter> = match format {
            OutputFormat::Vcf => Box::new(vcf::io::Writer::new(BufWriter::new(file))),
            OutputFormat::VcfGz => {
                let encoder = flate2::write::GzEncoder::new(
                    BufWriter::new(file),
                    flate2::Compression::default(),
                );
                Box::new(vcf::io::Writer::new(encoder))
            }
            OutputFormat::Bcf => Box::new(bcf::io::Writer::new(BufWriter::new(file))),
        };
        writer
            .write_header(&header)
            .with_context(|| format!("failed to write {} header", format.name()))?;

        tracing::debug!(
            output = %destination.display(),
            format = format.name(),
            "opened output"
        );

        Ok(Self {
            writer,
            header,
            temp,
            destination,
            records: 0,
        })
    }

    pub fn write(&mut self, record: &RecordBuf) -> Result<()> {
        self.writer
            .write_variant(&self.header, record)
            .context("failed to write variant record")?;
        self.records += 1;
        Ok(())
    }

    /// Flush, close and move the output into place.
    pub fn commit(self) -> Result<usize> {
        let Self {
            mut writer,
            temp,
            destination,
            records,
            ..
        } = self;
        writer.flush().context("failed to flush output")?;
        // closes compressed streams (gzip trailer, BGZF EOF block)
        drop(writer);
        temp.persist(&destination)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to move output into {}", destination.display()))?;
        tracing::info!(output = %destination.display(), records, "wrote output");
        Ok(records)
    }
}
