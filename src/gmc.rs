//! Gene mutation counts (GMC).
//!
//! Counting runs in two passes. [`GeneAggregator`] visits every variant and
//! sums per-sample contributions into one accumulator per gene; a gene's
//! count is only final once all its variants were seen, so the second pass
//! is only reachable through [`GeneAggregator::freeze`], which yields the
//! read-only [`FrozenGenes`] used to annotate variants.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, InvariantError, Result},
    filter::FilterConfig,
    variant::{AnnotateSamples, GenotypeClass, SampleField, Variant, VariantKey, remap_unknown},
};

pub const GMC_KEY: &str = "GMC";
pub const GMC_FILTERED_KEY: &str = "GMC_FILTERED";

/// Separates genes in a multi-gene annotation, which is not supported.
pub const GENE_DELIMITER: char = '/';

/// A sample's filtered count is kept only if its raw count for the gene
/// reaches this floor.
pub const FILTERED_FLOOR: u32 = 2;

/// How a genotype contributes to the raw count.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawCount {
    /// 1 for het or hom-alt, else 0.
    #[default]
    Carrier,
    /// 1 for het, 2 for hom-alt.
    Dosage,
}

impl RawCount {
    pub fn contribution(self, genotype: GenotypeClass) -> u32 {
        match (self, genotype) {
            (_, GenotypeClass::Het) => 1,
            (Self::Carrier, GenotypeClass::HomAlt) => 1,
            (Self::Dosage, GenotypeClass::HomAlt) => 2,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmcConfig {
    /// INFO field naming the variant's gene.
    pub gene_field: String,
    pub do_filtered_gmc: bool,
    pub raw_count: RawCount,
    pub filter: FilterConfig,
}

impl Default for GmcConfig {
    fn default() -> Self {
        Self {
            gene_field: String::from("gene"),
            do_filtered_gmc: true,
            raw_count: RawCount::Carrier,
            filter: FilterConfig::default(),
        }
    }
}

/// Per-gene sums, one entry per sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneAccumulator {
    pub raw: Vec<u32>,
    pub filtered: Option<Vec<u32>>,
}

impl GeneAccumulator {
    fn new(samples: usize, filtered: bool) -> Self {
        Self {
            raw: vec![0; samples],
            filtered: filtered.then(|| vec![0; samples]),
        }
    }
}

fn add_into(target: &mut [u32], contribution: &[u32]) {
    for (total, value) in target.iter_mut().zip(contribution) {
        *total += value;
    }
}

/// `where(raw < FILTERED_FLOOR, 0, filtered)`.
pub fn apply_floor(raw: &[u32], filtered: &[u32]) -> Vec<u32> {
    raw.iter()
        .zip(filtered)
        .map(|(&raw, &filtered)| if raw < FILTERED_FLOOR { 0 } else { filtered })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationStats {
    pub variants_with_gene: usize,
    pub variants_without_gene: usize,
    pub variants_passing_filter: usize,
}

/// One pass-1 record, by ordinal. `gene` is `None` outside any gene.
#[derive(Debug, Clone)]
struct Observed {
    key: VariantKey,
    gene: Option<usize>,
}

/// Pass 1: accumulates per-gene counts.
#[derive(Debug, Clone)]
pub struct GeneAggregator {
    config: GmcConfig,
    samples: usize,
    gene_ids: HashMap<String, usize>,
    genes: Vec<(String, GeneAccumulator)>,
    observed: Vec<Observed>,
    stats: AggregationStats,
}

impl GeneAggregator {
    pub fn new(config: GmcConfig, samples: usize) -> Self {
        Self {
            config,
            samples,
            gene_ids: HashMap::new(),
            genes: Vec::new(),
            observed: Vec::new(),
            stats: AggregationStats::default(),
        }
    }

    pub fn config(&self) -> &GmcConfig {
        &self.config
    }

    /// Gene named by the configured field, or `None` when the variant is
    /// outside any gene.
    pub fn gene_of<V: Variant>(&self, variant: &V) -> Result<Option<String>> {
        let Some(value) = variant.info(&self.config.gene_field) else {
            return Ok(None);
        };
        let gene = value.to_text();
        let gene = gene.trim();
        if gene.is_empty() || gene == "." {
            return Ok(None);
        }
        if gene.contains(GENE_DELIMITER) {
            return Err(ConfigurationError::MultiGeneValue {
                field: self.config.gene_field.clone(),
                value: gene.to_string(),
                variant: variant.key(),
            }
            .into());
        }
        Ok(Some(gene.to_string()))
    }

    /// Add one variant. Returns its gene, or `None` if it was left out.
    pub fn observe<V: Variant>(&mut self, variant: &V) -> Result<Option<&str>> {
        let Some(gene) = self.gene_of(variant)? else {
            self.stats.variants_without_gene += 1;
            self.observed.push(Observed {
                key: variant.key(),
                gene: None,
            });
            return Ok(None);
        };

        let mut genotypes = remap_unknown(&variant.genotypes());
        genotypes.resize(self.samples, GenotypeClass::HomRef);

        let raw: Vec<u32> = genotypes
            .iter()
            .map(|gt| self.config.raw_count.contribution(*gt))
            .collect();

        let filtered = if self.config.do_filtered_gmc {
            let outcome = self.config.filter.evaluate(variant, &genotypes)?;
            if outcome.rejection.is_none() {
                self.stats.variants_passing_filter += 1;
            }
            Some(outcome.contribution)
        } else {
            None
        };

        let id = match self.gene_ids.get(&gene) {
            Some(&id) => id,
            None => {
                let id = self.genes.len();
                self.gene_ids.insert(gene.clone(), id);
                self.genes.push((
                    gene,
                    GeneAccumulator::new(self.samples, self.config.do_filtered_gmc),
                ));
                id
            }
        };

        let accumulator = &mut self.genes[id].1;
        add_into(&mut accumulator.raw, &raw);
        if let (Some(total), Some(contribution)) = (accumulator.filtered.as_mut(), filtered) {
            add_into(total, &contribution);
        }

        self.observed.push(Observed {
            key: variant.key(),
            gene: Some(id),
        });
        self.stats.variants_with_gene += 1;

        Ok(Some(self.genes[id].0.as_str()))
    }

    pub fn accumulator(&self, gene: &str) -> Option<&GeneAccumulator> {
        self.gene_ids.get(gene).map(|&id| &self.genes[id].1)
    }

    /// End pass 1. Filtered vectors get the raw-count floor applied here.
    pub fn freeze(self) -> FrozenGenes {
        let genes = self
            .genes
            .into_iter()
            .map(|(name, acc)| {
                let filtered = acc.filtered.map(|f| apply_floor(&acc.raw, &f));
                (
                    name,
                    GeneAccumulator {
                        raw: acc.raw,
                        filtered,
                    },
                )
            })
            .collect::<Vec<_>>();

        tracing::info!(
            genes = genes.len(),
            records = self.observed.len(),
            without_gene = self.stats.variants_without_gene,
            "gene counts frozen"
        );

        FrozenGenes {
            gene_ids: self.gene_ids,
            genes,
            observed: self.observed,
            filtered: self.config.do_filtered_gmc,
            stats: self.stats,
        }
    }
}

/// Counts attached to one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GmcFields<'a> {
    pub gene: &'a str,
    pub raw: &'a [u32],
    pub filtered: Option<&'a [u32]>,
}

/// Pass 2: final per-gene counts, read-only.
#[derive(Debug, Clone)]
pub struct FrozenGenes {
    gene_ids: HashMap<String, usize>,
    genes: Vec<(String, GeneAccumulator)>,
    observed: Vec<Observed>,
    filtered: bool,
    stats: AggregationStats,
}

impl FrozenGenes {
    pub fn gene_count(&self) -> usize {
        self.genes.len()
    }

    pub fn has_filtered(&self) -> bool {
        self.filtered
    }

    pub fn stats(&self) -> AggregationStats {
        self.stats
    }

    pub fn gene(&self, gene: &str) -> Option<GmcFields<'_>> {
        self.gene_ids.get(gene).map(|&id| self.fields(id))
    }

    /// Number of records seen in pass 1.
    pub fn records(&self) -> usize {
        self.observed.len()
    }

    /// Counts for the `ordinal`-th pass-1 record; `None` if it had no gene.
    pub fn fields_at(&self, ordinal: usize) -> Option<GmcFields<'_>> {
        self.observed
            .get(ordinal)
            .and_then(|observed| observed.gene)
            .map(|id| self.fields(id))
    }

    /// Attach `GMC` (and `GMC_FILTERED`) to the `ordinal`-th record of the
    /// re-read source. Returns false, leaving the variant untouched, when it
    /// had no gene. The record must be the one counted at that ordinal.
    pub fn annotate<V>(&self, ordinal: usize, variant: &mut V) -> Result<bool>
    where
        V: Variant + AnnotateSamples,
    {
        let found = variant.key();
        let Some(observed) = self.observed.get(ordinal) else {
            return Err(InvariantError::RecordCount {
                counted: self.observed.len(),
                found: ordinal + 1,
            }
            .into());
        };
        if observed.key != found {
            return Err(InvariantError::RecordMismatch {
                ordinal,
                expected: observed.key.clone(),
                found,
            }
            .into());
        }
        let Some(fields) = self.fields_at(ordinal) else {
            return Ok(false);
        };
        variant.set_sample_field(GMC_KEY, SampleField::Integer(to_integers(fields.raw)));
        if let Some(filtered) = fields.filtered {
            variant.set_sample_field(
                GMC_FILTERED_KEY,
                SampleField::Integer(to_integers(filtered)),
            );
        }
        Ok(true)
    }

    fn fields(&self, id: usize) -> GmcFields<'_> {
        let (name, acc) = &self.genes[id];
        GmcFields {
            gene: name,
            raw: &acc.raw,
            filtered: acc.filtered.as_deref(),
        }
    }
}

fn to_integers(values: &[u32]) -> Vec<i32> {
    values
        .iter()
        .map(|&v| i32::try_from(v).unwrap_or(i32::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Error,
        variant::{InfoValue, VariantRow},
    };

    fn gene_variant(position: u64, gene: &str, codes: &[u8]) -> VariantRow {
        VariantRow::from_codes(VariantKey::new("17", position, "C", "T"), codes)
            .with_info("gene", InfoValue::Text(gene.to_string()))
            .with_info("OMIM_ID", InfoValue::Text(String::from("113705")))
    }

    fn raw_only() -> GmcConfig {
        GmcConfig {
            do_filtered_gmc: false,
            ..GmcConfig::default()
        }
    }

    #[test]
    fn same_frozen_vector_on_every_variant_of_a_gene() {
        let v1 = gene_variant(100, "BRCA1", &[1, 0, 3]);
        let v2 = gene_variant(200, "BRCA1", &[2, 1, 0]);
        let mut aggregator = GeneAggregator::new(raw_only(), 3);
        aggregator.observe(&v1).unwrap();
        aggregator.observe(&v2).unwrap();
        let frozen = aggregator.freeze();

        let first = frozen.fields_at(0).unwrap();
        let second = frozen.fields_at(1).unwrap();
        assert_eq!(first.raw, &[2, 1, 0]);
        assert_eq!(first, second);
        assert_eq!(first.filtered, None);
    }

    #[test]
    fn dosage_counts_hom_alt_twice() {
        let config = GmcConfig {
            raw_count: RawCount::Dosage,
            ..raw_only()
        };
        let mut aggregator = GeneAggregator::new(config, 1);
        aggregator.observe(&gene_variant(100, "BRCA1", &[1])).unwrap();
        aggregator.observe(&gene_variant(200, "BRCA1", &[2])).unwrap();
        let frozen = aggregator.freeze();
        assert_eq!(frozen.gene("BRCA1").unwrap().raw, &[3]);
    }

    #[test]
    fn variant_without_gene_is_excluded() {
        let mut aggregator = GeneAggregator::new(raw_only(), 1);
        let intergenic = VariantRow::from_codes(VariantKey::new("1", 5, "A", "C"), &[1]);
        assert_eq!(aggregator.observe(&intergenic).unwrap(), None);
        let dotted = VariantRow::from_codes(VariantKey::new("1", 6, "A", "C"), &[1])
            .with_info("gene", InfoValue::Text(String::from(".")));
        assert_eq!(aggregator.observe(&dotted).unwrap(), None);

        let frozen = aggregator.freeze();
        assert_eq!(frozen.gene_count(), 0);
        assert_eq!(frozen.stats().variants_without_gene, 2);

        let mut row = intergenic.clone();
        assert!(!frozen.annotate(0, &mut row).unwrap());
        assert!(row.annotation(GMC_KEY).is_none());
    }

    #[test]
    fn multi_gene_value_is_rejected() {
        let mut aggregator = GeneAggregator::new(raw_only(), 1);
        let err = aggregator
            .observe(&gene_variant(1, "GENE1/GENE2", &[1]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::MultiGeneValue { .. })
        ));
    }

    #[test]
    fn filtered_counts_apply_floor() {
        let mut aggregator = GeneAggregator::new(GmcConfig::default(), 3);
        // sample 0: two qualifying variants; sample 1: one; sample 2: none
        aggregator.observe(&gene_variant(1, "CFTR", &[1, 1, 0])).unwrap();
        aggregator.observe(&gene_variant(2, "CFTR", &[1, 0, 0])).unwrap();
        let frozen = aggregator.freeze();

        let fields = frozen.gene("CFTR").unwrap();
        assert_eq!(fields.raw, &[2, 1, 0]);
        assert_eq!(fields.filtered, Some(&[2, 0, 0][..]));
        assert_eq!(frozen.stats().variants_passing_filter, 2);
    }

    #[test]
    fn rejected_variant_adds_nothing_to_filtered() {
        let mut aggregator = GeneAggregator::new(GmcConfig::default(), 1);
        aggregator.observe(&gene_variant(1, "CFTR", &[1])).unwrap();
        aggregator.observe(&gene_variant(2, "CFTR", &[1])).unwrap();
        let common = gene_variant(3, "CFTR", &[1]).with_info("gnomAD_AF", InfoValue::Number(0.4));
        aggregator.observe(&common).unwrap();

        let accumulator = aggregator.accumulator("CFTR").unwrap();
        assert_eq!(accumulator.raw, vec![3]);
        assert_eq!(accumulator.filtered, Some(vec![2]));
    }

    #[test]
    fn annotate_attaches_both_fields() {
        let mut aggregator = GeneAggregator::new(GmcConfig::default(), 2);
        let mut v1 = gene_variant(1, "CFTR", &[1, 2]);
        let v2 = gene_variant(2, "CFTR", &[1, 0]);
        aggregator.observe(&v1).unwrap();
        aggregator.observe(&v2).unwrap();
        let frozen = aggregator.freeze();

        assert!(frozen.annotate(0, &mut v1).unwrap());
        assert_eq!(v1.annotation(GMC_KEY), Some(&SampleField::Integer(vec![2, 1])));
        assert_eq!(
            v1.annotation(GMC_FILTERED_KEY),
            Some(&SampleField::Integer(vec![2, 0]))
        );
    }

    #[test]
    fn repeated_keys_keep_their_own_gene() {
        let mut aggregator = GeneAggregator::new(raw_only(), 2);
        let key = VariantKey::new("1", 100, "A", "G");
        let mut rows = vec![
            VariantRow::from_codes(key.clone(), &[1, 0])
                .with_info("gene", InfoValue::Text(String::from("G1"))),
            VariantRow::from_codes(key.clone(), &[0, 1])
                .with_info("gene", InfoValue::Text(String::from("G2"))),
            VariantRow::from_codes(key, &[1, 1]),
        ];
        for row in &rows {
            aggregator.observe(row).unwrap();
        }
        let frozen = aggregator.freeze();
        assert_eq!(frozen.records(), 3);

        assert!(frozen.annotate(0, &mut rows[0]).unwrap());
        assert!(frozen.annotate(1, &mut rows[1]).unwrap());
        assert!(!frozen.annotate(2, &mut rows[2]).unwrap());
        assert_eq!(rows[0].annotation(GMC_KEY), Some(&SampleField::Integer(vec![1, 0])));
        assert_eq!(rows[1].annotation(GMC_KEY), Some(&SampleField::Integer(vec![0, 1])));
        assert!(rows[2].annotation(GMC_KEY).is_none());
    }

    #[test]
    fn source_changed_between_passes_is_an_invariant_error() {
        let mut aggregator = GeneAggregator::new(raw_only(), 1);
        aggregator.observe(&gene_variant(1, "A", &[1])).unwrap();
        let frozen = aggregator.freeze();

        let mut other = gene_variant(2, "A", &[1]);
        assert!(matches!(
            frozen.annotate(0, &mut other).unwrap_err(),
            Error::Invariant(InvariantError::RecordMismatch { ordinal: 0, .. })
        ));
        assert!(matches!(
            frozen.annotate(1, &mut other).unwrap_err(),
            Error::Invariant(InvariantError::RecordCount { counted: 1, found: 2 })
        ));
    }

    #[test]
    fn floor_zeroes_low_raw_counts() {
        assert_eq!(apply_floor(&[0, 1, 4, 5], &[0, 1, 2, 3]), vec![0, 0, 2, 3]);
    }
}
