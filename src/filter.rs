//! Cascading clinical filter used for the filtered gene mutation count.
//!
//! Variant-level checks run first, cheapest first, and any failure zeroes
//! the whole variant. Sample-level checks then narrow the per-sample mask.

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, Result},
    variant::{GenotypeClass, Variant},
};

/// Added to frequency thresholds so that a value equal to the threshold
/// survives a float round trip.
pub const FREQUENCY_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenotypeSelection {
    /// Heterozygous calls only.
    Het,
    #[default]
    HetOrHomAlt,
}

impl GenotypeSelection {
    pub fn keeps(self, genotype: GenotypeClass) -> bool {
        match self {
            Self::Het => genotype == GenotypeClass::Het,
            Self::HetOrHomAlt => genotype.is_carrier(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub pop_freq_fields: Vec<String>,
    pub pop_freq_threshold: f64,
    pub pop_homcount_fields: Vec<String>,
    pub pop_homcount_threshold: f64,
    /// Must be present for a variant to pass.
    pub omim_id_field: String,
    pub omim_inheritance_field: String,
    pub inheritance_marker: String,
    pub allelefreq_fields: Vec<String>,
    pub allelefreq_threshold: f64,
    pub homcount_fields: Vec<String>,
    pub homcount_threshold: f64,
    pub gt: GenotypeSelection,
    pub vaf_field: String,
    pub vaf_threshold: Option<f64>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            pop_freq_fields: vec![String::from("gnomAD_AF"), String::from("gnomAD_AF_popmax")],
            pop_freq_threshold: 0.01,
            pop_homcount_fields: vec![String::from("gnomAD_nhomalt")],
            pop_homcount_threshold: 5.0,
            omim_id_field: String::from("OMIM_ID"),
            omim_inheritance_field: String::from("OMIM_inheritance"),
            inheritance_marker: String::from("AR"),
            allelefreq_fields: vec![String::from("cohort_AF")],
            allelefreq_threshold: 0.05,
            homcount_fields: vec![String::from("cohort_nhomalt")],
            homcount_threshold: 2.0,
            gt: GenotypeSelection::HetOrHomAlt,
            vaf_field: String::from("VAF"),
            vaf_threshold: None,
        }
    }
}

/// Why a variant was zeroed at the variant level.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Rejection {
    PopulationFrequency,
    PopulationHomozygotes,
    NoDiseaseEntry,
    Inheritance,
    CohortFrequency,
    CohortHomozygotes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// 0/1 per sample.
    pub contribution: Vec<u32>,
    pub rejection: Option<Rejection>,
}

impl FilterConfig {
    /// First variant-level check that fails, if any.
    pub fn variant_rejection<V: Variant>(&self, variant: &V) -> Option<Rejection> {
        let pop_freq_limit = self.pop_freq_threshold + FREQUENCY_EPSILON;
        if any_exceeds(variant, &self.pop_freq_fields, pop_freq_limit) {
            return Some(Rejection::PopulationFrequency);
        }
        if any_exceeds(variant, &self.pop_homcount_fields, self.pop_homcount_threshold) {
            return Some(Rejection::PopulationHomozygotes);
        }
        if variant.info(&self.omim_id_field).is_none() {
            return Some(Rejection::NoDiseaseEntry);
        }
        if let Some(inheritance) = variant.info(&self.omim_inheritance_field)
            && !inheritance.to_text().contains(&self.inheritance_marker)
        {
            return Some(Rejection::Inheritance);
        }
        let cohort_freq_limit = self.allelefreq_threshold + FREQUENCY_EPSILON;
        if any_exceeds(variant, &self.allelefreq_fields, cohort_freq_limit) {
            return Some(Rejection::CohortFrequency);
        }
        if any_exceeds(variant, &self.homcount_fields, self.homcount_threshold) {
            return Some(Rejection::CohortHomozygotes);
        }
        None
    }

    /// Per-sample filtered contribution of one variant.
    ///
    /// `genotypes` must already have unknown calls remapped.
    pub fn evaluate<V: Variant>(
        &self,
        variant: &V,
        genotypes: &[GenotypeClass],
    ) -> Result<FilterOutcome> {
        if let Some(rejection) = self.variant_rejection(variant) {
            tracing::trace!(variant = %variant.key(), ?rejection, "variant rejected");
            return Ok(FilterOutcome {
                contribution: vec![0; genotypes.len()],
                rejection: Some(rejection),
            });
        }

        let mut mask: Vec<bool> = genotypes.iter().map(|gt| self.gt.keeps(*gt)).collect();

        if let Some(threshold) = self.vaf_threshold
            && let Some(fractions) = variant.sample_floats(&self.vaf_field)
        {
            for (sample, keep) in mask.iter_mut().enumerate() {
                let fraction = match fractions.get(sample).map(Vec::as_slice) {
                    None | Some([]) => f64::NAN,
                    Some([value]) => *value,
                    Some(values) => {
                        return Err(ConfigurationError::MultiValuedFraction {
                            field: self.vaf_field.clone(),
                            sample,
                            count: values.len(),
                            variant: variant.key(),
                        }
                        .into());
                    }
                };
                *keep &= fraction.is_finite() && fraction >= threshold;
            }
        }

        tracing::debug!(variant = %variant.key(), "variant passed the filter cascade");
        Ok(FilterOutcome {
            contribution: mask.into_iter().map(u32::from).collect(),
            rejection: None,
        })
    }
}

/// Missing fields never exceed.
fn any_exceeds<V: Variant>(variant: &V, fields: &[String], limit: f64) -> bool {
    fields
        .iter()
        .filter_map(|field| variant.info(field))
        .any(|value| value.exceeds(limit))
}
