//! Per-variant family genotype barcodes.

use crate::{
    family::FamilyIndex,
    variant::{AnnotateSamples, GenotypeClass, SampleField, Variant, remap_unknown},
};

pub const BARCODE_KEY: &str = "BCF";
pub const MEMBERS_KEY: &str = "BCFS";

const NO_FAMILY: &str = ".";

/// The two per-sample fields produced for one variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarcodeFields {
    pub barcodes: Vec<String>,
    pub members: Vec<String>,
}

/// Stateless projection of genotypes onto precomputed families.
#[derive(Debug, Clone)]
pub struct BarcodeEncoder {
    families: FamilyIndex,
    member_lists: Vec<String>,
    /// Per-sample member names; empty without a family.
    member_names: Vec<Vec<String>>,
}

impl BarcodeEncoder {
    pub fn new(families: FamilyIndex) -> Self {
        let names = families.sample_names();
        let member_names: Vec<Vec<String>> = families
            .iter()
            .map(|list| {
                if list.len() > 1 {
                    list.iter().map(|&i| names[i].clone()).collect()
                } else {
                    Vec::new()
                }
            })
            .collect();
        let member_lists = member_names
            .iter()
            .map(|members| {
                if members.is_empty() {
                    String::from(NO_FAMILY)
                } else {
                    members.join(",")
                }
            })
            .collect();
        Self {
            families,
            member_lists,
            member_names,
        }
    }

    pub fn families(&self) -> &FamilyIndex {
        &self.families
    }

    /// Encode one genotype vector. Unknown calls read as homozygous
    /// reference; calls missing from a short vector do too.
    pub fn encode(&self, genotypes: &[GenotypeClass]) -> BarcodeFields {
        let known = remap_unknown(genotypes);
        let barcodes = self
            .families
            .iter()
            .map(|list| {
                if list.len() > 1 {
                    list.iter()
                        .map(|&i| known.get(i).copied().unwrap_or(GenotypeClass::HomRef).digit())
                        .collect()
                } else {
                    String::from(NO_FAMILY)
                }
            })
            .collect();
        BarcodeFields {
            barcodes,
            members: self.member_lists.clone(),
        }
    }

    /// Attach `BCF` and `BCFS` to `variant`. `BCFS` goes out as a string
    /// list so the commas are list separators rather than escaped text.
    pub fn annotate<V>(&self, variant: &mut V) -> BarcodeFields
    where
        V: Variant + AnnotateSamples,
    {
        let fields = self.encode(&variant.genotypes());
        variant.set_sample_field(BARCODE_KEY, SampleField::Text(fields.barcodes.clone()));
        variant.set_sample_field(
            MEMBERS_KEY,
            SampleField::TextList(self.member_names.clone()),
        );
        fields
    }
}
