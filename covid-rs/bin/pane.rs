use covid_pane::{io::*, prelude::*, utils::*};
use log::*;
use std::{env, fs::File, process};

const DEFAULT_CONFIG: &str = "conf.toml";

pub fn main() {
    use simple_logger::SimpleLogger;
    SimpleLogger::new().init().unwrap();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    if let Err(err) = run(&path) {
        error!("{}", err);
        process::exit(1);
    }
}

pub fn run(path: &str) -> Result<()> {
    let cfg = DashboardConfig::from_path(path)?;
    cfg.validate()?;
    let snapshot = Snapshot::new(load_sources(&cfg.sources)?);
    let out = recompute(&snapshot, &cfg)?;

    write_observations_csv(&out.observations, File::create("observations.csv")?)?;
    write_projection_csv(&out.projection, File::create("model.csv")?)?;
    if let Some(aggregate) = &out.aggregate {
        write_observations_csv(aggregate, File::create("aggregate.csv")?)?;
    }

    println!(
        "Model: growth factor {:.3} over {} days from {}",
        cfg.model_params().growth_factor(),
        out.projection.len(),
        cfg.start_date
    );
    println!("{}", render_log_vbars(&out.projection.values(), 20));

    let measure = cfg.selected_measure;
    let latest: Vec<(String, Real)> = out
        .observations
        .locations()
        .into_iter()
        .filter_map(|loc| {
            let series = out.observations.series(&loc, measure);
            series.last().map(|s| (format!("{} (day {})", loc, s.0), s.2))
        })
        .collect();
    println!("Latest {} since reaching {}:", measure, cfg.report_threshold);
    println!("{}", render_log_hbars(&latest, 60));

    for w in out.observations.warnings() {
        println!("{} has no day with {} >= {}", w.location, w.measure, w.threshold);
    }
    Ok(())
}
