//! Pedigree loading and read-only family queries.
//!
//! Two on-disk shapes are accepted: tab-delimited PED (6 columns) / PED9
//! (9 columns) rows, and a JSON array of per-sample objects.

use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use serde::Deserialize;

use crate::error::{ConfigurationError, Error, Result};

const LIST_SEPARATOR: char = ',';

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

/// One pedigree record. Parent ids are empty when unknown.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sample {
    pub family_id: String,
    pub individual_id: String,
    pub paternal_id: String,
    pub maternal_id: String,
    pub sex: String,
    pub phenotype: String,
    pub aliases: Vec<String>,
    pub phenotype_terms: Vec<String>,
    pub tags: Vec<String>,
}

impl Sample {
    /// PED affection coding: `-9`, `0` and `1` (or nothing) are unaffected,
    /// `2` and any free-text phenotype count as affected.
    pub fn is_affected(&self) -> bool {
        !matches!(self.phenotype.trim(), "" | "-9" | "0" | "1")
    }

    pub fn sex(&self) -> Sex {
        match self.sex.trim() {
            "1" => Sex::Male,
            "2" => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    /// Mother first, then father; unknown parents are skipped.
    pub fn parents(&self) -> Vec<&str> {
        [self.maternal_id.as_str(), self.paternal_id.as_str()]
            .into_iter()
            .filter(|id| !id.is_empty())
            .collect()
    }

    fn from_row(fields: &[&str]) -> Self {
        let list = |index: usize| -> Vec<String> {
            fields
                .get(index)
                .map(|raw| split_list(raw))
                .unwrap_or_default()
        };
        Self {
            family_id: fields[0].to_string(),
            individual_id: fields[1].to_string(),
            paternal_id: normalize_parent(fields[2]),
            maternal_id: normalize_parent(fields[3]),
            sex: fields[4].to_string(),
            phenotype: fields[5].to_string(),
            aliases: list(6),
            phenotype_terms: list(7),
            tags: list(8),
        }
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            self.family_id,
            self.individual_id,
            self.paternal_id,
            self.maternal_id,
            self.sex,
            self.phenotype,
            self.aliases.join(";"),
            self.phenotype_terms.join(";"),
            self.tags.join(";"),
        )
    }
}

fn normalize_parent(raw: &str) -> String {
    match raw.trim() {
        "0" => String::new(),
        other => other.to_string(),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty() && *item != ".")
        .map(str::to_string)
        .collect()
}

/// Iterator over PED / PED9 rows.
pub struct Reader<R> {
    inner: R,
    line: u64,
    buf: String,
}

impl<R> Reader<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R> Iterator for Reader<R>
where
    R: BufRead,
{
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.inner.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    let trimmed = self.buf.trim_end_matches(&['\n', '\r'][..]);
                    if trimmed.is_empty() || trimmed.starts_with('#') {
                        continue;
                    }
                    return Some(parse_row(trimmed, self.line));
                }
                Err(e) => return Some(Err(Error::Io(e))),
            }
        }
    }
}

fn parse_row(line: &str, number: u64) -> Result<Sample> {
    let fields: Vec<&str> = line.split('\t').collect();
    if !matches!(fields.len(), 6 | 9) {
        return Err(ConfigurationError::PedigreeRowWidth {
            line: number,
            found: fields.len(),
            raw: line.to_string(),
        }
        .into());
    }
    Ok(Sample::from_row(&fields))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_string(value: Option<Self>) -> String {
        match value {
            Some(Self::Integer(n)) => n.to_string(),
            Some(Self::Float(n)) => n.to_string(),
            Some(Self::Text(s)) => s,
            None => String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct JsonSample {
    id: Scalar,
    #[serde(rename = "famID", default)]
    family_id: Option<Scalar>,
    #[serde(rename = "paternalID", default)]
    paternal_id: Option<Scalar>,
    #[serde(rename = "maternalID", default)]
    maternal_id: Option<Scalar>,
    #[serde(default)]
    sex: Option<Scalar>,
    #[serde(default)]
    phenotype: Option<Scalar>,
    #[serde(default)]
    alias: Option<Vec<String>>,
    #[serde(rename = "HPOList", default)]
    hpo_list: Option<Vec<String>>,
    #[serde(rename = "starkTags", default)]
    stark_tags: Option<Vec<String>>,
}

impl From<JsonSample> for Sample {
    fn from(raw: JsonSample) -> Self {
        Self {
            family_id: Scalar::into_string(raw.family_id),
            individual_id: Scalar::into_string(Some(raw.id)),
            paternal_id: normalize_parent(&Scalar::into_string(raw.paternal_id)),
            maternal_id: normalize_parent(&Scalar::into_string(raw.maternal_id)),
            sex: Scalar::into_string(raw.sex),
            phenotype: Scalar::into_string(raw.phenotype),
            aliases: raw.alias.unwrap_or_default(),
            phenotype_terms: raw.hpo_list.unwrap_or_default(),
            tags: raw.stark_tags.unwrap_or_default(),
        }
    }
}

/// Read-only index of pedigree records keyed by individual id.
#[derive(Debug, Clone, Default)]
pub struct Pedigree {
    samples: Vec<Sample>,
    by_id: HashMap<String, usize>,
    families: HashMap<String, Vec<usize>>,
    family_order: Vec<String>,
}

impl Pedigree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from a `.json`, `.ped` or `.ped9` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".json") {
            let file = File::open(path)?;
            Self::from_json_reader(BufReader::new(file))
        } else if name.ends_with(".ped") || name.ends_with(".ped9") {
            let file = File::open(path)?;
            Self::from_rows(BufReader::new(file))
        } else {
            Err(ConfigurationError::UnsupportedPedigreeFormat {
                path: path.to_path_buf(),
            }
            .into())
        }
    }

    pub fn from_rows<R: BufRead>(reader: R) -> Result<Self> {
        let samples = Reader::new(reader).collect::<Result<Vec<_>>>()?;
        Self::from_samples(samples)
    }

    pub fn from_json_reader<R: io::Read>(reader: R) -> Result<Self> {
        let raw: Vec<JsonSample> =
            serde_json::from_reader(reader).map_err(ConfigurationError::PedigreeJson)?;
        Self::from_samples(raw.into_iter().map(Sample::from))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json_reader(json.as_bytes())
    }

    pub fn from_samples<I>(samples: I) -> Result<Self>
    where
        I: IntoIterator<Item = Sample>,
    {
        let mut pedigree = Self::default();
        for sample in samples {
            if pedigree.by_id.contains_key(&sample.individual_id) {
                return Err(ConfigurationError::DuplicateSample {
                    id: sample.individual_id,
                }
                .into());
            }
            let index = pedigree.samples.len();
            pedigree.by_id.insert(sample.individual_id.clone(), index);
            if !sample.family_id.is_empty() {
                pedigree
                    .families
                    .entry(sample.family_id.clone())
                    .or_insert_with(|| {
                        pedigree.family_order.push(sample.family_id.clone());
                        Vec::new()
                    })
                    .push(index);
            }
            pedigree.samples.push(sample);
        }
        Ok(pedigree)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Sample> {
        self.by_id.get(id).map(|&i| &self.samples[i])
    }

    /// Records in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Family ids in order of first appearance.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.family_order.iter().map(String::as_str)
    }

    pub fn family_of(&self, id: &str) -> Option<&str> {
        self.get(id)
            .map(|s| s.family_id.as_str())
            .filter(|family| !family.is_empty())
    }

    /// Members of a family in load order; empty for an unknown family.
    pub fn members_of(&self, family_id: &str) -> Vec<&Sample> {
        self.families
            .get(family_id)
            .map(|indices| indices.iter().map(|&i| &self.samples[i]).collect())
            .unwrap_or_default()
    }

    pub fn parents_of(&self, id: &str) -> Vec<&str> {
        self.get(id).map(Sample::parents).unwrap_or_default()
    }

    /// `None` when `id` is not in the pedigree.
    pub fn children_of(&self, id: &str) -> Option<Vec<&Sample>> {
        if !self.contains(id) {
            return None;
        }
        Some(
            self.samples
                .iter()
                .filter(|s| s.maternal_id == id || s.paternal_id == id)
                .collect(),
        )
    }
}

impl fmt::Display for Pedigree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for sample in &self.samples {
            writeln!(f, "{sample}")?;
        }
        Ok(())
    }
}
