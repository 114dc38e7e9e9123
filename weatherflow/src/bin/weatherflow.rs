//! Looks up one region and prints its forecast.

use anyhow::{bail, Context};
use clap::Parser;
use weatherflow::config::WeatherConfig;
use weatherflow::observability::init_tracing;
use weatherflow::service::WeatherService;
use weatherflow::store::{Coordinate, Region};

#[derive(Debug, Parser)]
#[command(name = "weatherflow", version, about = "Fetch and store a weather forecast")]
struct Args {
    /// Server id of the city.
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    id: Option<i64>,

    /// Latitude of the location.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of the location.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// API endpoint; overrides WEATHERFLOW_ENDPOINT.
    #[arg(long)]
    endpoint: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let mut config = WeatherConfig::from_env();
    if let Some(endpoint) = args.endpoint {
        config = config.with_endpoint(endpoint);
    }
    let service = WeatherService::new(config).context("failed to start weather service")?;

    let region = match (args.id, args.lat, args.lon) {
        (Some(id), _, _) => service.region_by_id(id).await?,
        (None, Some(lat), Some(lon)) => {
            service.region_for_location(Coordinate::new(lat, lon)).await?
        }
        _ => bail!("pass either --id or both --lat and --lon"),
    };

    match region {
        Some(region) => print_region(&region),
        None => println!("no region returned"),
    }
    Ok(())
}

fn print_region(region: &Region) {
    println!(
        "{} ({}) #{} at {:.4}, {:.4}",
        region.name.as_deref().unwrap_or("unnamed"),
        region.country.as_deref().unwrap_or("--"),
        region.sid,
        region.latitude,
        region.longitude,
    );
    for forecast in &region.forecasts {
        println!(
            "  {}  {:>6.1}°C  wind {:>4.1} m/s @ {:>3.0}°  {}",
            forecast.time.format("%Y-%m-%d %H:%M"),
            forecast.temp,
            forecast.wind_speed,
            forecast.wind_deg,
            forecast.icon.as_deref().unwrap_or(""),
        );
    }
}
