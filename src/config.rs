use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    language::LanguageDistribution,
    region::{Region, SimulationError},
    region_map::RegionMap,
};

const REGION_FILE_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {} does not exist", .path.display())]
    ConfigurationNotFound { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Top-level map file: where the region files live and which regions exist.
#[derive(Debug, Clone, Deserialize)]
pub struct MapDescriptor {
    pub data_dir: PathBuf,
    pub regions: Vec<String>,
    /// Language columns shared by every region. Defaults to the languages of
    /// the first listed region.
    #[serde(default)]
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionDescriptor {
    pub name: String,
    pub population: f64,
    pub births_per_mil: f64,
    pub deaths_per_mil: f64,
    pub lang_dist: BTreeMap<String, f64>,
    pub emigration_rate: f64,
    pub regional_rates: BTreeMap<String, f64>,
}

/// A fully loaded and validated map definition.
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub name: String,
    pub languages: Vec<String>,
    /// Listed region names paired with their descriptors, in map order.
    pub regions: Vec<(String, RegionDescriptor)>,
}

pub struct MapLoader {
    base_dir: PathBuf,
}

impl MapLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Loads the map file and every region file it lists. Relative
    /// `data_dir` values resolve against the map file's directory.
    pub fn load(&self, file: impl AsRef<Path>) -> Result<MapConfig, ConfigError> {
        let path = self.base_dir.join(file);
        let descriptor: MapDescriptor = read_descriptor(&path)?;
        let data_dir = if descriptor.data_dir.is_absolute() {
            descriptor.data_dir.clone()
        } else {
            path.parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&descriptor.data_dir)
        };

        let mut regions = Vec::with_capacity(descriptor.regions.len());
        for name in &descriptor.regions {
            let region_path = region_file(&data_dir, name)?;
            debug!(region = %name, path = %region_path.display(), "reading region");
            let region: RegionDescriptor = read_descriptor(&region_path)?;
            regions.push((name.clone(), region));
        }

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "map".to_string());
        let languages = match &descriptor.languages {
            Some(languages) => languages.clone(),
            None => regions
                .first()
                .map(|(_, region)| region.lang_dist.keys().cloned().collect())
                .unwrap_or_default(),
        };

        let config = MapConfig {
            name,
            languages,
            regions,
        };
        config.validate()?;
        info!(
            map = %config.name,
            regions = config.regions.len(),
            languages = config.languages.len(),
            "loaded region map"
        );
        Ok(config)
    }
}

impl MapConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regions.is_empty() {
            return Err(ConfigError::Invalid(
                "map must list at least one region".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for (name, _) in &self.regions {
            if !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!(
                    "region '{name}' listed more than once"
                )));
            }
        }

        let mut declared = HashSet::new();
        for language in &self.languages {
            if !declared.insert(language.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "language '{language}' declared more than once"
                )));
            }
        }

        for (name, region) in &self.regions {
            if !region.name.eq_ignore_ascii_case(name) {
                return Err(ConfigError::Invalid(format!(
                    "region file for '{name}' describes '{}'",
                    region.name
                )));
            }
            check_non_negative(name, "population", region.population)?;
            check_finite(name, "births_per_mil", region.births_per_mil)?;
            check_finite(name, "deaths_per_mil", region.deaths_per_mil)?;
            check_fraction(name, "emigration_rate", region.emigration_rate)?;

            for language in &self.languages {
                if !region.lang_dist.contains_key(language) {
                    return Err(SimulationError::MissingLanguageKey {
                        region: name.clone(),
                        language: language.clone(),
                    }
                    .into());
                }
            }
            for (language, share) in &region.lang_dist {
                if !declared.contains(language.as_str()) {
                    return Err(ConfigError::Invalid(format!(
                        "region '{name}' tracks undeclared language '{language}'"
                    )));
                }
                check_fraction(name, language, *share)?;
            }

            for (destination, rate) in &region.regional_rates {
                if !self.regions.iter().any(|(listed, _)| listed == destination) {
                    return Err(SimulationError::UnknownDestination {
                        source_region: name.clone(),
                        destination: destination.clone(),
                    }
                    .into());
                }
                check_fraction(name, destination, *rate)?;
            }
        }
        Ok(())
    }

    /// Builds the simulation state. Languages follow the declared order and
    /// destination tables follow map order.
    pub fn build_map(&self) -> Result<RegionMap, ConfigError> {
        let regions: Vec<Region> = self
            .regions
            .iter()
            .map(|(name, descriptor)| self.build_region(name, descriptor))
            .collect();
        Ok(RegionMap::new(regions)?)
    }

    fn build_region(&self, name: &str, descriptor: &RegionDescriptor) -> Region {
        let languages = LanguageDistribution::from_pairs(self.languages.iter().filter_map(
            |language| {
                descriptor
                    .lang_dist
                    .get(language)
                    .map(|share| (language.clone(), *share))
            },
        ));
        let destinations = self.regions.iter().filter_map(|(destination, _)| {
            descriptor
                .regional_rates
                .get(destination)
                .map(|rate| (destination.clone(), *rate))
        });
        Region::new(name, descriptor.population)
            .with_vital_rates(descriptor.births_per_mil, descriptor.deaths_per_mil)
            .with_languages(languages)
            .with_emigration(descriptor.emigration_rate, destinations)
    }
}

fn region_file(data_dir: &Path, name: &str) -> Result<PathBuf, ConfigError> {
    let stem = name.to_lowercase();
    REGION_FILE_EXTENSIONS
        .iter()
        .map(|extension| data_dir.join(format!("{stem}.{extension}")))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::ConfigurationNotFound {
            path: data_dir.join(format!("{stem}.json")),
        })
}

fn read_descriptor<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::ConfigurationNotFound {
            path: path.to_path_buf(),
        });
    }
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_finite(region: &str, field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "region '{region}' has non-finite {field}"
        )))
    }
}

fn check_non_negative(region: &str, field: &str, value: f64) -> Result<(), ConfigError> {
    check_finite(region, field, value)?;
    if value < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "region '{region}' has negative {field} {value}"
        )));
    }
    Ok(())
}

fn check_fraction(region: &str, field: &str, value: f64) -> Result<(), ConfigError> {
    check_non_negative(region, field, value)?;
    if value > 1.0 {
        return Err(ConfigError::Invalid(format!(
            "region '{region}' has {field} {value} above 1"
        )));
    }
    Ok(())
}
