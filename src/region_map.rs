use std::collections::HashMap;
use std::fmt;

use rayon::prelude::*;
use tracing::warn;

use crate::region::{MigrationRequest, Region, SimulationError};
use crate::snapshot::{Snapshot, SnapshotRow};

const RATE_SUM_TOLERANCE: f64 = 1e-6;

/// The simulated world: a fixed set of named regions advanced in lockstep.
///
/// Each step runs three phases with a barrier between them: growth, then
/// emigration with routing into destination queues, then immigration
/// mixing. No phase starts before the previous one has finished for every
/// region.
#[derive(Debug)]
pub struct RegionMap {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
    parallel: bool,
}

impl RegionMap {
    /// Builds a map from regions in declaration order. Region names must be
    /// unique; destination tables are checked when a step routes them.
    pub fn new(regions: Vec<Region>) -> Result<Self, SimulationError> {
        let mut index = HashMap::with_capacity(regions.len());
        for (position, region) in regions.iter().enumerate() {
            if index.insert(region.name().to_string(), position).is_some() {
                return Err(SimulationError::InvalidSchema(format!(
                    "region '{}' defined more than once",
                    region.name()
                )));
            }
        }

        for region in &regions {
            let total: f64 = region.destination_rates().iter().map(|(_, rate)| rate).sum();
            if !region.destination_rates().is_empty() && (total - 1.0).abs() > RATE_SUM_TOLERANCE {
                warn!(
                    region = region.name(),
                    total, "destination rates do not sum to 1"
                );
            }
        }

        Ok(Self {
            regions,
            index,
            parallel: false,
        })
    }

    /// Runs each phase across regions on the rayon pool. Results are the
    /// same as sequential stepping.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn region(&self, name: &str) -> Option<&Region> {
        self.index.get(name).map(|&position| &self.regions[position])
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_names(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(Region::name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Languages of the first region, which every snapshot uses as columns.
    pub fn languages(&self) -> Vec<String> {
        self.regions
            .first()
            .map(|region| region.languages().languages().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn total_population(&self) -> f64 {
        self.regions.iter().map(Region::population).sum()
    }

    pub fn run(&mut self, steps: u64) -> Result<(), SimulationError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Advances every region by one year.
    pub fn step(&mut self) -> Result<(), SimulationError> {
        self.grow_populations();
        if let Err(err) = self.distribute_emigration_requests() {
            for region in &mut self.regions {
                region.clear_immigration_queue();
            }
            return Err(err);
        }
        self.process_immigration_requests()
    }

    fn grow_populations(&mut self) {
        if self.parallel {
            self.regions.par_iter_mut().for_each(Region::grow_population);
        } else {
            self.regions.iter_mut().for_each(Region::grow_population);
        }
    }

    fn distribute_emigration_requests(&self) -> Result<(), SimulationError> {
        if self.parallel {
            self.regions
                .par_iter()
                .flat_map_iter(|region| region.generate_emigration_requests())
                .try_for_each(|request| self.route(request))
        } else {
            self.regions
                .iter()
                .flat_map(|region| region.generate_emigration_requests())
                .try_for_each(|request| self.route(request))
        }
    }

    fn route(&self, request: MigrationRequest) -> Result<(), SimulationError> {
        let Some(&position) = self.index.get(&request.destination) else {
            return Err(SimulationError::UnknownDestination {
                source_region: request.source,
                destination: request.destination,
            });
        };
        self.regions[position].queue_immigration_request(request);
        Ok(())
    }

    fn process_immigration_requests(&mut self) -> Result<(), SimulationError> {
        let results: Vec<Result<(), SimulationError>> = if self.parallel {
            self.regions
                .par_iter_mut()
                .map(Region::drain_immigration_queue)
                .collect()
        } else {
            self.regions
                .iter_mut()
                .map(Region::drain_immigration_queue)
                .collect()
        };
        results.into_iter().collect()
    }

    /// Language proportions of every region, in declaration order.
    pub fn snapshot(&self) -> Snapshot {
        let languages = self.languages();
        let rows = self
            .regions
            .iter()
            .map(|region| SnapshotRow {
                region: region.name().to_string(),
                values: languages
                    .iter()
                    .map(|language| region.languages().get(language))
                    .collect(),
            })
            .collect();
        Snapshot::new(languages, rows)
    }
}

impl fmt::Display for RegionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for region in &self.regions {
            writeln!(
                f,
                "Name: {}, Population: {}",
                region.name(),
                region.population()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageDistribution;

    fn languages(english: f64, spanish: f64) -> LanguageDistribution {
        LanguageDistribution::from_pairs([("english", english), ("spanish", spanish)])
    }

    fn two_region_map() -> RegionMap {
        let a = Region::new("A", 100.0)
            .with_languages(languages(1.0, 0.0))
            .with_emigration(0.1, [("A", 0.5), ("B", 0.5)]);
        let b = Region::new("B", 50.0)
            .with_languages(languages(0.0, 1.0))
            .with_emigration(0.0, [("B", 1.0)]);
        RegionMap::new(vec![a, b]).unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn duplicate_region_names_are_rejected() {
        let err = RegionMap::new(vec![Region::new("A", 1.0), Region::new("A", 2.0)]).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidSchema(_)));
    }

    #[test]
    fn emigration_is_not_deducted_from_source() {
        let mut map = two_region_map();
        map.step().unwrap();

        let a = map.region("A").unwrap();
        let b = map.region("B").unwrap();
        // A keeps its 100 and also absorbs its own 5 self-routed emigrants.
        assert_close(a.population(), 105.0);
        assert_close(a.languages().get("english").unwrap(), 1.0);
        assert_close(b.population(), 55.0);
        assert_close(b.languages().get("english").unwrap(), 5.0 / 55.0);
        assert_close(b.languages().get("spanish").unwrap(), 50.0 / 55.0);
    }

    #[test]
    fn unknown_destination_aborts_step_and_clears_queues() {
        let a = Region::new("A", 100.0)
            .with_languages(languages(1.0, 0.0))
            .with_emigration(0.1, [("A", 0.5), ("Z", 0.5)]);
        let mut map = RegionMap::new(vec![a]).unwrap();

        let err = map.step().unwrap_err();

        assert_eq!(
            err,
            SimulationError::UnknownDestination {
                source_region: "A".into(),
                destination: "Z".into(),
            }
        );
        assert_eq!(map.region("A").unwrap().pending_immigration(), 0);
    }

    #[test]
    fn queues_are_empty_between_steps() {
        let mut map = two_region_map();
        map.run(3).unwrap();
        assert!(map.regions().iter().all(|r| r.pending_immigration() == 0));
    }

    #[test]
    fn parallel_stepping_matches_sequential() {
        let mut sequential = two_region_map();
        let mut parallel = two_region_map().with_parallel(true);
        sequential.run(10).unwrap();
        parallel.run(10).unwrap();
        assert_eq!(sequential.snapshot(), parallel.snapshot());
        assert_eq!(sequential.total_population(), parallel.total_population());
    }

    #[test]
    fn snapshot_rows_follow_declaration_order() {
        let snapshot = two_region_map().snapshot();
        assert_eq!(snapshot.languages, vec!["english", "spanish"]);
        let regions: Vec<_> = snapshot.rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["A", "B"]);
        assert_eq!(snapshot.value("B", "spanish"), Some(1.0));
    }

    #[test]
    fn display_lists_populations() {
        let text = two_region_map().to_string();
        assert_eq!(text, "Name: A, Population: 100\nName: B, Population: 50\n");
    }
}
