use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use noodles::{bcf, vcf};

const MAX_LAYERS: usize = 4;

/// Opens a file and peels off GZIP / BGZF layers, sniffed from magic bytes.
pub fn open_input(path: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let mut reader: Box<dyn BufRead> = Box::new(BufReader::new(file));

    for _ in 0..MAX_LAYERS {
        let buf = reader.fill_buf()?;
        // GZIP magic: 1f 8b
        if buf.len() < 2 || buf[0] != 0x1f || buf[1] != 0x8b {
            break;
        }
        tracing::debug!("Detected GZIP/BGZF layer");
        // MultiGzDecoder also handles BGZF's concatenated members
        reader = Box::new(BufReader::new(MultiGzDecoder::new(reader)));
    }
    Ok(reader)
}

fn is_bcf(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .is_some_and(|name| name.ends_with(".bcf"))
}

/// A VCF or BCF source read record by record.
pub enum VariantReader {
    Vcf {
        reader: vcf::io::Reader<Box<dyn BufRead>>,
        header: vcf::Header,
    },
    Bcf {
        reader: bcf::io::Reader<Box<dyn Read>>,
        header: vcf::Header,
    },
}

impl VariantReader {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if is_bcf(path) {
            let file = File::open(path)?;
            let mut reader =
                bcf::io::reader::Builder::default().build_from_reader(BufReader::new(file))?;
            let header = reader.read_header()?;
            Ok(Self::Bcf { reader, header })
        } else {
            let mut reader = vcf::io::Reader::new(open_input(path)?);
            let header = reader.read_header()?;
            Ok(Self::Vcf { reader, header })
        }
    }

    pub fn header(&self) -> &vcf::Header {
        match self {
            Self::Vcf { header, .. } | Self::Bcf { header, .. } => header,
        }
    }

    pub fn read_record(&mut self) -> std::io::Result<Option<vcf::variant::RecordBuf>> {
        let mut record = vcf::variant::RecordBuf::default();
        let n = match self {
            Self::Vcf { reader, header } => reader.read_record_buf(header, &mut record)?,
            Self::Bcf { reader, header } => reader.read_record_buf(header, &mut record)?,
        };
        Ok((n > 0).then_some(record))
    }
}

impl Iterator for VariantReader {
    type Item = std::io::Result<vcf::variant::RecordBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}
