//! Resolution of pedigree families into column indices of a variant stream.

use std::collections::{HashMap, HashSet};

use crate::{
    error::{InvariantError, Result},
    pedigree::Pedigree,
};

/// Ordered family columns for every sample of one variant stream.
///
/// A list of length 1 holds only the sample itself and means "no family".
#[derive(Debug, Clone, Default)]
pub struct FamilyIndex {
    sample_names: Vec<String>,
    lists: Vec<Vec<usize>>,
}

impl FamilyIndex {
    /// Resolve every sample of `sample_names` against `pedigree`.
    ///
    /// Family order is: affected members that are not parents, then the
    /// parents of all members (mother before father, first seen first), then
    /// the remaining members. Only direct parents are followed, and ids that
    /// are not columns of the stream are dropped.
    pub fn resolve(pedigree: &Pedigree, sample_names: &[String]) -> Result<Self> {
        let mut columns: HashMap<&str, usize> = HashMap::with_capacity(sample_names.len());
        for (index, name) in sample_names.iter().enumerate() {
            columns.entry(name.as_str()).or_insert(index);
        }

        let mut by_family: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut lists = Vec::with_capacity(sample_names.len());

        for (index, name) in sample_names.iter().enumerate() {
            let Some(family) = pedigree.family_of(name) else {
                lists.push(vec![index]);
                continue;
            };

            let resolved = by_family.entry(family).or_insert_with(|| {
                let ids = family_order(pedigree, family);
                let resolved: Vec<usize> = ids
                    .iter()
                    .filter_map(|id| columns.get(id).copied())
                    .collect();
                tracing::debug!(family, members = ?ids, columns = ?resolved, "resolved family");
                resolved
            });

            check_unique(name, resolved)?;
            lists.push(resolved.clone());
        }

        Ok(Self {
            sample_names: sample_names.to_vec(),
            lists,
        })
    }

    /// Every sample on its own.
    pub fn singletons(sample_names: &[String]) -> Self {
        Self {
            sample_names: sample_names.to_vec(),
            lists: (0..sample_names.len()).map(|i| vec![i]).collect(),
        }
    }

    pub fn sample_names(&self) -> &[String] {
        &self.sample_names
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn get(&self, sample: usize) -> Option<&[usize]> {
        self.lists.get(sample).map(Vec::as_slice)
    }

    pub fn has_family(&self, sample: usize) -> bool {
        self.lists.get(sample).is_some_and(|list| list.len() > 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.lists.iter().map(Vec::as_slice)
    }

    /// Number of samples with at least one relative in the stream.
    pub fn samples_with_family(&self) -> usize {
        self.lists.iter().filter(|list| list.len() > 1).count()
    }
}

/// Ordered ids of one family before column lookup.
pub fn family_order<'a>(pedigree: &'a Pedigree, family: &str) -> Vec<&'a str> {
    let members = pedigree.members_of(family);

    let mut parents: Vec<&str> = Vec::new();
    for member in &members {
        for parent in member.parents() {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }

    let mut ordered: Vec<&str> = members
        .iter()
        .filter(|m| m.is_affected() && !parents.contains(&m.individual_id.as_str()))
        .map(|m| m.individual_id.as_str())
        .collect();
    ordered.extend(parents.iter().copied());
    for member in &members {
        let id = member.individual_id.as_str();
        if !ordered.contains(&id) {
            ordered.push(id);
        }
    }
    ordered
}

fn check_unique(sample: &str, indices: &[usize]) -> Result<()> {
    let mut seen = HashSet::with_capacity(indices.len());
    for &index in indices {
        if !seen.insert(index) {
            return Err(InvariantError::DuplicateFamilyIndex {
                sample: sample.to_string(),
                index,
            }
            .into());
        }
    }
    Ok(())
}
