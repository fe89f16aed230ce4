mod dataset;
mod driver;
mod export;
mod settings;

use driver::Driver;
use export::{NullVisualizer, PlyVisualizer, Visualizer};
use log::*;
use settings::SandboxSettings;
use std::error::Error;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Clone)]
#[structopt(
    name = "isam-sandbox",
    about = "Incrementally smooths a synthetic structure-from-motion sequence"
)]
struct Opt {
    /// The file where settings are specified.
    ///
    /// This is in the format of `settings::SandboxSettings`. Missing fields
    /// take their defaults, and a missing file runs the canonical scenario.
    #[structopt(short, long, default_value = "isam-settings.json")]
    settings: PathBuf,
    /// Output directory to deposit per-frame PLY snapshots of the estimate.
    #[structopt(short, long)]
    output: Option<PathBuf>,
    /// Milliseconds to pause after each frame, overriding the settings.
    #[structopt(long)]
    frame_delay_ms: Option<u64>,
}

fn main() {
    pretty_env_logger::init_timed();
    let opt = Opt::from_args();

    let settings = std::fs::File::open(&opt.settings)
        .ok()
        .and_then(|file| serde_json::from_reader(file).ok());
    if settings.is_some() {
        info!("loaded existing settings");
    } else {
        info!("used default settings");
    }
    let mut settings: SandboxSettings = settings.unwrap_or_default();
    if let Some(frame_delay_ms) = opt.frame_delay_ms {
        settings.frame_delay_ms = frame_delay_ms;
    }

    let result = match &opt.output {
        Some(directory) => {
            if let Err(e) = std::fs::create_dir_all(directory) {
                error!("unable to create the output directory: {}", e);
                std::process::exit(1);
            }
            run(settings, PlyVisualizer::new(directory.clone()))
        }
        None => run(settings, NullVisualizer),
    };
    if let Err(e) = result {
        error!("run failed: {}", e);
        std::process::exit(1);
    }
}

fn run<V: Visualizer>(settings: SandboxSettings, visualizer: V) -> Result<(), Box<dyn Error>> {
    let mut driver = Driver::new(settings, visualizer);
    driver.run()?;
    driver.finalize()?;
    Ok(())
}
