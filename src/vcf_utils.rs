use noodles::vcf::{
    self,
    header::record::value::{
        Map,
        map::{
            Format,
            format::{Number, Type},
        },
    },
    variant::{
        RecordBuf,
        record::samples::keys::key as format_key,
        record_buf::{
            Samples,
            info::field::{Value as InfoField, value::Array as InfoArray},
            samples::sample::{Value, value::Array},
        },
    },
};

use crate::{
    barcode::{BARCODE_KEY, MEMBERS_KEY},
    gmc::{GMC_FILTERED_KEY, GMC_KEY},
    variant::{AnnotateSamples, GenotypeClass, InfoValue, SampleField, Variant, VariantKey},
};

/// Sample names in column order.
pub fn sample_names(header: &vcf::Header) -> Vec<String> {
    header.sample_names().iter().cloned().collect()
}

/// Declare the barcode FORMAT fields.
pub fn add_barcode_formats(header: &mut vcf::Header) {
    let formats = header.formats_mut();
    formats.insert(
        String::from(BARCODE_KEY),
        Map::<Format>::new(
            Number::Count(1),
            Type::String,
            "Family barcode: genotype classes (0 hom-ref or missing, 1 het, 2 hom-alt) of the sample's family, ordered as in BCFS",
        ),
    );
    formats.insert(
        String::from(MEMBERS_KEY),
        Map::<Format>::new(
            Number::Unknown,
            Type::String,
            "Family barcode samples: comma-separated family members in BCF order",
        ),
    );
}

/// Declare the gene mutation count FORMAT fields.
pub fn add_gmc_formats(header: &mut vcf::Header, gene_field: &str, filtered: bool) {
    let formats = header.formats_mut();
    formats.insert(
        String::from(GMC_KEY),
        Map::<Format>::new(
            Number::Count(1),
            Type::Integer,
            format!(
                "Gene Mutation Count: variants called in this sample within the gene given by INFO/{gene_field}"
            ),
        ),
    );
    if filtered {
        formats.insert(
            String::from(GMC_FILTERED_KEY),
            Map::<Format>::new(
                Number::Count(1),
                Type::Integer,
                format!(
                    "Filtered Gene Mutation Count: variants in the gene given by INFO/{gene_field} passing the recessive candidate filter; 0 when GMC < 2"
                ),
            ),
        );
    }
}

/// Parse a GT string such as `0/1` or `1|1`.
pub fn classify_gt_string(gt: &str) -> GenotypeClass {
    GenotypeClass::from_alleles(
        gt.split(['/', '|'])
            .map(|allele| allele.trim().parse::<usize>().ok()),
    )
}

fn classify_value(value: &Value) -> GenotypeClass {
    match value {
        Value::Genotype(genotype) => {
            GenotypeClass::from_alleles(genotype.as_ref().iter().map(|allele| allele.position()))
        }
        Value::String(gt) => classify_gt_string(gt),
        _ => GenotypeClass::Unknown,
    }
}

fn convert_info(value: &InfoField) -> InfoValue {
    match value {
        InfoField::Integer(n) => InfoValue::Number(f64::from(*n)),
        InfoField::Float(n) => InfoValue::Number(f64::from(*n)),
        InfoField::Flag => InfoValue::Flag,
        InfoField::Character(c) => InfoValue::Text(c.to_string()),
        InfoField::String(s) => InfoValue::Text(s.clone()),
        InfoField::Array(InfoArray::Integer(values)) => {
            InfoValue::Numbers(values.iter().map(|v| v.map(f64::from)).collect())
        }
        InfoField::Array(InfoArray::Float(values)) => {
            InfoValue::Numbers(values.iter().map(|v| v.map(f64::from)).collect())
        }
        InfoField::Array(InfoArray::Character(values)) => {
            InfoValue::Texts(values.iter().map(|v| v.map(|c| c.to_string())).collect())
        }
        InfoField::Array(InfoArray::String(values)) => InfoValue::Texts(values.clone()),
    }
}

fn sample_floats(value: Option<&Value>) -> Vec<f64> {
    match value {
        Some(Value::Float(n)) => vec![f64::from(*n)],
        Some(Value::Integer(n)) => vec![f64::from(*n)],
        Some(Value::String(s)) => s
            .split(',')
            .map(|part| part.trim().parse().unwrap_or(f64::NAN))
            .collect(),
        Some(Value::Array(Array::Float(values))) => values
            .iter()
            .map(|v| v.map(f64::from).unwrap_or(f64::NAN))
            .collect(),
        Some(Value::Array(Array::Integer(values))) => values
            .iter()
            .map(|v| v.map(f64::from).unwrap_or(f64::NAN))
            .collect(),
        _ => Vec::new(),
    }
}

impl Variant for RecordBuf {
    fn key(&self) -> VariantKey {
        VariantKey {
            chromosome: self.reference_sequence_name().to_string(),
            position: self.variant_start().map(usize::from).unwrap_or(0) as u64,
            reference: self.reference_bases().to_string(),
            alternate: self.alternate_bases().as_ref().join(","),
        }
    }

    fn genotypes(&self) -> Vec<GenotypeClass> {
        self.samples()
            .values()
            .map(|sample| match sample.get(format_key::GENOTYPE).flatten() {
                Some(value) => classify_value(value),
                None => GenotypeClass::Unknown,
            })
            .collect()
    }

    fn info(&self, field: &str) -> Option<InfoValue> {
        self.info().get(field).flatten().map(convert_info)
    }

    fn sample_floats(&self, field: &str) -> Option<Vec<Vec<f64>>> {
        let samples = self.samples();
        if !samples.keys().as_ref().contains(field) {
            return None;
        }
        Some(
            samples
                .values()
                .map(|sample| sample_floats(sample.get(field).flatten()))
                .collect(),
        )
    }
}

impl AnnotateSamples for RecordBuf {
    /// Rebuilds the sample block with `key` set, replacing an existing
    /// column of the same name.
    fn set_sample_field(&mut self, key: &str, values: SampleField) {
        let samples = self.samples();
        let mut keys: Vec<String> = samples.keys().as_ref().iter().cloned().collect();
        let mut rows: Vec<Vec<Option<Value>>> = samples
            .values()
            .map(|sample| {
                keys.iter()
                    .map(|k| sample.get(k.as_str()).flatten().cloned())
                    .collect()
            })
            .collect();

        let new_values: Vec<Option<Value>> = match values {
            SampleField::Text(values) => values.into_iter().map(|v| Some(Value::String(v))).collect(),
            SampleField::TextList(values) => values
                .into_iter()
                .map(|list| {
                    (!list.is_empty())
                        .then(|| Value::Array(Array::String(list.into_iter().map(Some).collect())))
                })
                .collect(),
            SampleField::Integer(values) => {
                values.into_iter().map(|v| Some(Value::Integer(v))).collect()
            }
        };
        while rows.len() < new_values.len() {
            rows.push(vec![None; keys.len()]);
        }

        match keys.iter().position(|k| k == key) {
            Some(column) => {
                for (row, value) in rows.iter_mut().zip(new_values) {
                    row[column] = value;
                }
            }
            None => {
                keys.push(key.to_string());
                let mut new_values = new_values.into_iter();
                for row in rows.iter_mut() {
                    row.push(new_values.next().flatten());
                }
            }
        }

        *self.samples_mut() = Samples::new(keys.into_iter().collect(), rows);
    }
}
