//! The view of a variant record that the annotation engines work against.
//!
//! File formats stay outside this module: the noodles adapter in
//! [`crate::vcf_utils`] implements [`Variant`] and [`AnnotateSamples`] for
//! `RecordBuf`, and [`VariantRow`] is an owned record for buffering and tests.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

/// Per-sample genotype call, as used by barcodes and gene counts.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum GenotypeClass {
    HomRef,
    Het,
    HomAlt,
    Unknown,
}

impl GenotypeClass {
    pub fn code(self) -> u8 {
        match self {
            Self::HomRef => 0,
            Self::Het => 1,
            Self::HomAlt => 2,
            Self::Unknown => 3,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::HomRef,
            1 => Self::Het,
            2 => Self::HomAlt,
            _ => Self::Unknown,
        }
    }

    /// Classify a call from its allele indices (`None` for a missing allele).
    ///
    /// Any missing allele, or no alleles at all, makes the call unknown.
    pub fn from_alleles<I>(alleles: I) -> Self
    where
        I: IntoIterator<Item = Option<usize>>,
    {
        let mut first = None;
        let mut mixed = false;
        for allele in alleles {
            let Some(index) = allele else {
                return Self::Unknown;
            };
            match first {
                None => first = Some(index),
                Some(seen) if seen != index => mixed = true,
                Some(_) => {}
            }
        }
        match first {
            None => Self::Unknown,
            Some(_) if mixed => Self::Het,
            Some(0) => Self::HomRef,
            Some(_) => Self::HomAlt,
        }
    }

    /// Heterozygous or homozygous-alternate.
    pub fn is_carrier(self) -> bool {
        matches!(self, Self::Het | Self::HomAlt)
    }

    pub fn digit(self) -> char {
        char::from(b'0' + self.code())
    }
}

/// Returns a new vector in which unknown calls read as homozygous reference.
pub fn remap_unknown(genotypes: &[GenotypeClass]) -> Vec<GenotypeClass> {
    genotypes
        .iter()
        .map(|gt| match gt {
            GenotypeClass::Unknown => GenotypeClass::HomRef,
            other => *other,
        })
        .collect()
}

/// Identity of a variant across the two aggregation passes.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct VariantKey {
    pub chromosome: String,
    pub position: u64,
    pub reference: String,
    pub alternate: String,
}

impl VariantKey {
    pub fn new(
        chromosome: impl Into<String>,
        position: u64,
        reference: impl Into<String>,
        alternate: impl Into<String>,
    ) -> Self {
        Self {
            chromosome: chromosome.into(),
            position,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.chromosome, self.position, self.reference, self.alternate
        )
    }
}

/// A variant-level (INFO) annotation value.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoValue {
    Flag,
    Number(f64),
    Text(String),
    Numbers(Vec<Option<f64>>),
    Texts(Vec<Option<String>>),
}

impl InfoValue {
    /// Numeric reading of the value. Text that does not parse as a number
    /// contributes nothing.
    pub fn numbers(&self) -> Vec<f64> {
        match self {
            Self::Flag => Vec::new(),
            Self::Number(n) => vec![*n],
            Self::Text(s) => parse_numbers(s),
            Self::Numbers(values) => values.iter().flatten().copied().collect(),
            Self::Texts(values) => values.iter().flatten().flat_map(|s| parse_numbers(s)).collect(),
        }
    }

    /// Textual reading of the value; list values are comma-joined.
    pub fn to_text(&self) -> String {
        match self {
            Self::Flag => String::new(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::Numbers(values) => values
                .iter()
                .map(|v| v.map(|n| n.to_string()).unwrap_or_else(|| String::from(".")))
                .collect::<Vec<_>>()
                .join(","),
            Self::Texts(values) => values
                .iter()
                .map(|v| v.as_deref().unwrap_or("."))
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// True when any numeric reading is strictly greater than `limit`.
    pub fn exceeds(&self, limit: f64) -> bool {
        self.numbers().into_iter().any(|n| n > limit)
    }
}

fn parse_numbers(raw: &str) -> Vec<f64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// Read-only access to one record of a multi-sample variant stream.
///
/// Missing fields are `None`, never errors.
pub trait Variant {
    fn key(&self) -> VariantKey;

    /// One call per sample, in the stream's sample order.
    fn genotypes(&self) -> Vec<GenotypeClass>;

    fn info(&self, field: &str) -> Option<InfoValue>;

    /// Per-sample numeric values of a FORMAT field, `None` when the record
    /// does not carry the field. A sample without a value yields an empty list.
    fn sample_floats(&self, field: &str) -> Option<Vec<Vec<f64>>>;
}

/// A new per-sample field, one entry per sample in stream order.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleField {
    Text(Vec<String>),
    /// A list of strings per sample; an empty list is written as missing.
    TextList(Vec<Vec<String>>),
    Integer(Vec<i32>),
}

pub trait AnnotateSamples {
    fn set_sample_field(&mut self, key: &str, values: SampleField);
}

/// Owned variant record.
#[derive(Debug, Clone, Default)]
pub struct VariantRow {
    pub key: VariantKey,
    pub genotypes: Vec<GenotypeClass>,
    pub info: HashMap<String, InfoValue>,
    pub sample_floats: HashMap<String, Vec<Vec<f64>>>,
    pub annotations: BTreeMap<String, SampleField>,
}

impl VariantRow {
    pub fn new(key: VariantKey, genotypes: Vec<GenotypeClass>) -> Self {
        Self {
            key,
            genotypes,
            ..Default::default()
        }
    }

    /// Build from numeric genotype codes (0, 1, 2, 3).
    pub fn from_codes(key: VariantKey, codes: &[u8]) -> Self {
        Self::new(key, codes.iter().copied().map(GenotypeClass::from_code).collect())
    }

    pub fn with_info(mut self, field: impl Into<String>, value: InfoValue) -> Self {
        self.info.insert(field.into(), value);
        self
    }

    pub fn with_sample_floats(mut self, field: impl Into<String>, values: Vec<Vec<f64>>) -> Self {
        self.sample_floats.insert(field.into(), values);
        self
    }

    pub fn annotation(&self, key: &str) -> Option<&SampleField> {
        self.annotations.get(key)
    }
}

impl Variant for VariantRow {
    fn key(&self) -> VariantKey {
        self.key.clone()
    }

    fn genotypes(&self) -> Vec<GenotypeClass> {
        self.genotypes.clone()
    }

    fn info(&self, field: &str) -> Option<InfoValue> {
        self.info.get(field).cloned()
    }

    fn sample_floats(&self, field: &str) -> Option<Vec<Vec<f64>>> {
        self.sample_floats.get(field).cloned()
    }
}

impl AnnotateSamples for VariantRow {
    fn set_sample_field(&mut self, key: &str, values: SampleField) {
        self.annotations.insert(key.to_string(), values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_allele_indices() {
        assert_eq!(GenotypeClass::from_alleles([Some(0), Some(0)]), GenotypeClass::HomRef);
        assert_eq!(GenotypeClass::from_alleles([Some(0), Some(1)]), GenotypeClass::Het);
        assert_eq!(GenotypeClass::from_alleles([Some(1), Some(2)]), GenotypeClass::Het);
        assert_eq!(GenotypeClass::from_alleles([Some(1), Some(1)]), GenotypeClass::HomAlt);
        assert_eq!(GenotypeClass::from_alleles([Some(1)]), GenotypeClass::HomAlt);
        assert_eq!(GenotypeClass::from_alleles([None, Some(1)]), GenotypeClass::Unknown);
        assert_eq!(
            GenotypeClass::from_alleles(std::iter::empty()),
            GenotypeClass::Unknown
        );
    }

    #[test]
    fn remap_returns_new_vector() {
        let original = vec![GenotypeClass::Unknown, GenotypeClass::Het, GenotypeClass::HomAlt];
        let remapped = remap_unknown(&original);
        assert_eq!(
            remapped,
            vec![GenotypeClass::HomRef, GenotypeClass::Het, GenotypeClass::HomAlt]
        );
        assert_eq!(original[0], GenotypeClass::Unknown);
    }

    #[test]
    fn key_display_joins_fields() {
        let key = VariantKey::new("chr1", 12345, "A", "G");
        assert_eq!(key.to_string(), "chr1_12345_A_G");
    }

    #[test]
    fn info_numbers_ignore_missing_and_text() {
        let value = InfoValue::Numbers(vec![Some(0.1), None, Some(0.3)]);
        assert_eq!(value.numbers(), vec![0.1, 0.3]);
        assert!(InfoValue::Text(String::from("not a number")).numbers().is_empty());
        assert_eq!(InfoValue::Text(String::from("0.5")).numbers(), vec![0.5]);
        assert!(value.exceeds(0.2));
        assert!(!value.exceeds(0.3));
    }

    #[test]
    fn info_text_joins_lists() {
        let value = InfoValue::Texts(vec![Some(String::from("AR")), None, Some(String::from("AD"))]);
        assert_eq!(value.to_text(), "AR,.,AD");
    }
}
