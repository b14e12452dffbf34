use std::fmt;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::language::LanguageDistribution;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("region '{source_region}' sends migrants to unknown region '{destination}'")]
    UnknownDestination {
        source_region: String,
        destination: String,
    },
    #[error("migration into region '{region}' is missing language '{language}'")]
    MissingLanguageKey { region: String, language: String },
    #[error("invalid region map: {0}")]
    InvalidSchema(String),
}

/// A slice of one region's emigrants headed for a single destination.
///
/// `languages` is a copy of the source distribution taken when the request
/// was generated, so mixing later in the same step cannot leak into it.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRequest {
    pub source: String,
    pub destination: String,
    pub population: f64,
    pub languages: LanguageDistribution,
}

/// One geographic unit: its population (in millions), vital rates, language
/// proportions and the routing table for its emigrants.
#[derive(Debug)]
pub struct Region {
    name: String,
    population: f64,
    birth_rate: f64,
    death_rate: f64,
    emigration_rate: f64,
    languages: LanguageDistribution,
    destination_rates: Vec<(String, f64)>,
    inbound: Mutex<Vec<MigrationRequest>>,
}

impl Region {
    pub fn new(name: impl Into<String>, population: f64) -> Self {
        Self {
            name: name.into(),
            population,
            birth_rate: 0.0,
            death_rate: 0.0,
            emigration_rate: 0.0,
            languages: LanguageDistribution::new(),
            destination_rates: Vec::new(),
            inbound: Mutex::new(Vec::new()),
        }
    }

    pub fn with_vital_rates(mut self, birth_rate: f64, death_rate: f64) -> Self {
        self.birth_rate = birth_rate;
        self.death_rate = death_rate;
        self
    }

    pub fn with_languages(mut self, languages: LanguageDistribution) -> Self {
        self.languages = languages;
        self
    }

    pub fn with_emigration<I, S>(mut self, emigration_rate: f64, destinations: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        self.emigration_rate = emigration_rate;
        self.destination_rates = destinations
            .into_iter()
            .map(|(name, rate)| (name.into(), rate))
            .collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn population(&self) -> f64 {
        self.population
    }

    pub fn birth_rate(&self) -> f64 {
        self.birth_rate
    }

    pub fn death_rate(&self) -> f64 {
        self.death_rate
    }

    pub fn emigration_rate(&self) -> f64 {
        self.emigration_rate
    }

    pub fn languages(&self) -> &LanguageDistribution {
        &self.languages
    }

    pub fn destination_rates(&self) -> &[(String, f64)] {
        &self.destination_rates
    }

    pub fn pending_immigration(&self) -> usize {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Applies one year of births and deaths. Not floored at zero.
    pub fn grow_population(&mut self) {
        let net_growth = (self.birth_rate - self.death_rate) * self.population;
        self.population += net_growth;
    }

    /// Splits this year's emigrants across the destination table.
    ///
    /// The emigrants are not removed from this region's own population.
    pub fn generate_emigration_requests(&self) -> Vec<MigrationRequest> {
        let emigrating = self.emigration_rate * self.population;
        self.destination_rates
            .iter()
            .map(|(destination, rate)| MigrationRequest {
                source: self.name.clone(),
                destination: destination.clone(),
                population: emigrating * rate,
                languages: self.languages.clone(),
            })
            .collect()
    }

    /// Safe to call from several routing threads at once.
    pub fn queue_immigration_request(&self, request: MigrationRequest) {
        self.inbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }

    /// Applies every queued request and leaves the queue empty, also when a
    /// request fails.
    ///
    /// Requests are applied in source-name order so the outcome does not
    /// depend on which routing thread enqueued first.
    pub fn drain_immigration_queue(&mut self) -> Result<(), SimulationError> {
        let mut queue = std::mem::take(
            self.inbound
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        queue.sort_by(|a, b| a.source.cmp(&b.source));
        for request in &queue {
            self.apply_immigration(request)?;
        }
        Ok(())
    }

    pub(crate) fn clear_immigration_queue(&mut self) {
        self.inbound
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Mixes one incoming population into this region as a population
    /// weighted average per language. Every language is weighted with the
    /// population as it was before this request.
    pub fn apply_immigration(&mut self, request: &MigrationRequest) -> Result<(), SimulationError> {
        if let Some(language) = self.languages.first_missing_in(&request.languages) {
            return Err(SimulationError::MissingLanguageKey {
                region: self.name.clone(),
                language: language.to_string(),
            });
        }

        let new_population = self.population + request.population;
        if new_population == 0.0 {
            self.population = new_population;
            return Ok(());
        }

        let mixed: Vec<f64> = self
            .languages
            .iter()
            .map(|(language, share)| {
                let incoming = request.languages.get(language).unwrap_or(share);
                (share * self.population + incoming * request.population) / new_population
            })
            .collect();
        self.languages.overwrite(&mixed);
        self.population = new_population;
        Ok(())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name.to_uppercase())?;
        writeln!(f, "Population:      {}", self.population)?;
        writeln!(f, "Births/Million:  {}", self.birth_rate)?;
        writeln!(f, "Deaths/Million:  {}", self.death_rate)?;
        writeln!(f, "Language Distribution:")?;
        write!(f, "{}", self.languages)?;
        writeln!(f, "Emigration Rate: {}", self.emigration_rate)?;
        for (region, rate) in &self.destination_rates {
            writeln!(f, "  {region}: {rate}")?;
        }
        Ok(())
    }
}
