use std::time::Instant;

use tracing::{debug, info};

use crate::region::SimulationError;
use crate::region_map::RegionMap;
use crate::snapshot::Snapshot;

#[derive(Clone, Debug, Default)]
pub struct EngineSettings {
    pub map_name: String,
    pub parallel: bool,
}

#[derive(Clone, Debug)]
pub struct StepReport {
    pub step: u64,
    pub total_population: f64,
    pub duration_ms: f64,
}

/// Language tables captured around one `Engine::run`.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub map_name: String,
    pub steps: u64,
    pub initial_population: f64,
    pub final_population: f64,
    pub pre: Snapshot,
    pub post: Snapshot,
}

pub struct Engine {
    map: RegionMap,
    settings: EngineSettings,
    step: u64,
}

impl Engine {
    pub fn new(map: RegionMap, settings: EngineSettings) -> Self {
        let map = map.with_parallel(settings.parallel);
        Self {
            map,
            settings,
            step: 0,
        }
    }

    pub fn run(&mut self, steps: u64) -> Result<RunReport, SimulationError> {
        self.run_with_hook(steps, |_| {})
    }

    /// Runs `steps` years, calling `hook` after each completed step.
    pub fn run_with_hook<F>(&mut self, steps: u64, mut hook: F) -> Result<RunReport, SimulationError>
    where
        F: FnMut(&StepReport),
    {
        let pre = self.map.snapshot();
        let initial_population = self.map.total_population();
        info!(
            map = %self.settings.map_name,
            regions = self.map.len(),
            steps,
            parallel = self.settings.parallel,
            "starting simulation"
        );

        for _ in 0..steps {
            let start = Instant::now();
            self.map.step()?;
            self.step += 1;
            let report = StepReport {
                step: self.step,
                total_population: self.map.total_population(),
                duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
            };
            debug!(
                step = report.step,
                total_population = report.total_population,
                duration_ms = report.duration_ms,
                "step complete"
            );
            hook(&report);
        }

        let final_population = self.map.total_population();
        info!(
            map = %self.settings.map_name,
            steps,
            initial_population,
            final_population,
            "simulation finished"
        );

        Ok(RunReport {
            map_name: self.settings.map_name.clone(),
            steps,
            initial_population,
            final_population,
            pre,
            post: self.map.snapshot(),
        })
    }

    pub fn current_step(&self) -> u64 {
        self.step
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn map(&self) -> &RegionMap {
        &self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageDistribution;
    use crate::region::Region;

    fn engine(parallel: bool) -> Engine {
        let map = RegionMap::new(vec![
            Region::new("north", 10.0)
                .with_vital_rates(0.02, 0.01)
                .with_languages(LanguageDistribution::from_pairs([("english", 0.9)]))
                .with_emigration(0.1, [("north", 0.5), ("south", 0.5)]),
            Region::new("south", 20.0)
                .with_languages(LanguageDistribution::from_pairs([("english", 0.1)]))
                .with_emigration(0.05, [("north", 1.0)]),
        ])
        .unwrap();
        Engine::new(
            map,
            EngineSettings {
                map_name: "test".into(),
                parallel,
            },
        )
    }

    #[test]
    fn hook_runs_once_per_step() {
        let mut engine = engine(false);
        let mut steps = Vec::new();
        engine
            .run_with_hook(4, |report| steps.push(report.step))
            .unwrap();
        assert_eq!(steps, vec![1, 2, 3, 4]);
        assert_eq!(engine.current_step(), 4);
    }

    #[test]
    fn zero_steps_leave_snapshot_untouched() {
        let mut engine = engine(false);
        let report = engine.run(0).unwrap();
        assert_eq!(report.pre, report.post);
        assert_eq!(report.initial_population, report.final_population);
    }

    #[test]
    fn settings_select_parallel_map() {
        let engine = engine(true);
        assert!(engine.map().is_parallel());
        assert_eq!(engine.settings().map_name, "test");
    }

    #[test]
    fn report_captures_pre_and_post_tables() {
        let mut engine = engine(false);
        let report = engine.run(2).unwrap();
        assert_eq!(report.steps, 2);
        assert_eq!(report.pre.value("south", "english"), Some(0.1));
        assert!(report.post.value("south", "english").unwrap() > 0.1);
        assert!(report.final_population > report.initial_population);
    }
}
