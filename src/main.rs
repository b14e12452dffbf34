use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ldp::{
    chart::{self, ChartConfig, DEFAULT_HOST, DEFAULT_PORT},
    engine::{Engine, EngineSettings},
    report, MapLoader, SnapshotError,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Language distribution predictor")]
struct Cli {
    /// Path to the region map file (JSON or YAML)
    file_name: PathBuf,

    /// Number of simulated years
    sim_length: u64,

    /// Serve a chart of this language's post-run distribution
    #[arg(short = 'd', long)]
    display_language: Option<String>,

    /// Print pre- and post-run tables to stdout
    #[arg(short = 'c', long, overrides_with = "no_console_output")]
    console_output: bool,

    /// Keep tables off stdout (default)
    #[arg(long, overrides_with = "console_output")]
    no_console_output: bool,

    /// Write results to <OUTPUT_FILE>.txt and <OUTPUT_FILE>.csv
    #[arg(short = 'o', long)]
    output_file: Option<PathBuf>,

    /// Chart server host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Chart server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Run each step's phases across a thread pool
    #[arg(long)]
    parallel: bool,

    /// Log every step
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "ldp=debug" } else { "ldp=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let console_output = cli.console_output && !cli.no_console_output;
    if console_output {
        println!(
            "Running ldp simulation from {} for {} cycles.",
            cli.file_name.display(),
            cli.sim_length
        );
        if let Some(language) = &cli.display_language {
            println!(
                "Displaying {language} data in chart at {}:{}.",
                cli.host, cli.port
            );
        }
    }

    let config = MapLoader::new(".")
        .load(&cli.file_name)
        .with_context(|| format!("Failed to load map {}", cli.file_name.display()))?;
    let map = config.build_map()?;
    let settings = EngineSettings {
        map_name: config.name.clone(),
        parallel: cli.parallel,
    };
    let mut engine = Engine::new(map, settings);
    let report = engine
        .run(cli.sim_length)
        .with_context(|| format!("Simulation of '{}' aborted", config.name))?;

    // A bad chart language is reported but never blocks the numeric results.
    let chart_language = cli.display_language.clone().filter(|language| {
        let known = report.post.has_language(language);
        if !known {
            eprintln!("{}", SnapshotError::UnknownDisplayLanguage(language.clone()));
        }
        known
    });

    if console_output {
        println!("Pre Simulation Data:");
        print!("{}", report.pre.to_table());
        println!("\nPost Simulation Results:");
        print!("{}", report.post.to_table());
    }

    if let Some(base) = &cli.output_file {
        report::export_to_file(
            base,
            &[("Pre-Sim Data", &report.pre), ("Post-Sim Data", &report.post)],
        )
        .with_context(|| format!("Failed to export results to {}", base.display()))?;
    }

    if let Some(language) = chart_language {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(chart::serve(ChartConfig {
            map_name: report.map_name.clone(),
            language,
            snapshot: report.post.clone(),
            host: cli.host,
            port: cli.port,
        }))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_output_is_off_by_default() {
        let cli = Cli::try_parse_from(["ldp", "map.json", "10"]).unwrap();
        assert!(!cli.console_output);
        assert_eq!(cli.sim_length, 10);
    }

    #[test]
    fn last_console_flag_wins() {
        let cli =
            Cli::try_parse_from(["ldp", "map.json", "1", "-c", "--no-console-output"]).unwrap();
        assert!(!cli.console_output);

        let cli =
            Cli::try_parse_from(["ldp", "map.json", "1", "--no-console-output", "--console-output"])
                .unwrap();
        assert!(cli.console_output);
    }
}
