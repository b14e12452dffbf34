pub mod chart;
pub mod config;
pub mod engine;
pub mod language;
pub mod region;
pub mod region_map;
pub mod report;
pub mod snapshot;

pub use config::{ConfigError, MapConfig, MapLoader};
pub use engine::{Engine, EngineSettings, RunReport, StepReport};
pub use language::LanguageDistribution;
pub use region::{MigrationRequest, Region, SimulationError};
pub use region_map::RegionMap;
pub use snapshot::{Snapshot, SnapshotError};
