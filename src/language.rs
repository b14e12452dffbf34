use std::fmt;

use serde::Serialize;

/// Per-language fluency proportions for one population.
///
/// Proportions are independent of each other: a person may speak several
/// languages, so the values are not expected to sum to one. Entries keep the
/// order they were declared in, which is also the column order of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageDistribution {
    entries: Vec<(String, f64)>,
}

impl LanguageDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a distribution from `(language, proportion)` pairs. A language
    /// listed twice keeps its last proportion at its first position.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut distribution = Self::new();
        for (language, share) in pairs {
            distribution.set(language, share);
        }
        distribution
    }

    pub fn set(&mut self, language: impl Into<String>, share: f64) {
        let language = language.into();
        match self.entries.iter_mut().find(|(name, _)| *name == language) {
            Some(entry) => entry.1 = share,
            None => self.entries.push((language, share)),
        }
    }

    pub fn get(&self, language: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(name, _)| name == language)
            .map(|(_, share)| *share)
    }

    pub fn contains(&self, language: &str) -> bool {
        self.get(language).is_some()
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, share)| (name.as_str(), *share))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First declared language missing from `other`, if any.
    pub fn first_missing_in(&self, other: &LanguageDistribution) -> Option<&str> {
        self.languages().find(|language| !other.contains(language))
    }

    /// Replaces every proportion in declaration order. `shares` must have
    /// exactly one value per language.
    pub(crate) fn overwrite(&mut self, shares: &[f64]) {
        debug_assert_eq!(shares.len(), self.entries.len());
        for ((_, share), value) in self.entries.iter_mut().zip(shares) {
            *share = *value;
        }
    }
}

impl fmt::Display for LanguageDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (language, share) in self.iter() {
            writeln!(f, "  {language}: {share}")?;
        }
        Ok(())
    }
}
