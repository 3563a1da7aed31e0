use clap::Parser;
use course_finder::config::Settings;
use course_finder::models::DataSource;
use course_finder::services::safety_loader::{self, CsvLayout, DEFAULT_BATCH_SIZE};
use course_finder::services::{BackendClient, BackendTables};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "load-safety-data")]
#[command(about = "Load street and security light CSVs into the safety point table")]
struct Args {
    /// Path to the CSV file
    #[arg(long)]
    csv: String,

    /// Data source: street_light, security_light or crime_data
    #[arg(long)]
    source: DataSource,

    /// Latitude column header
    #[arg(long, default_value = "위도")]
    lat_col: String,

    /// Longitude column header
    #[arg(long, default_value = "경도")]
    lng_col: String,

    /// Region column header; guessed from coordinates when absent
    #[arg(long)]
    region_col: Option<String>,

    /// District column header
    #[arg(long)]
    district_col: Option<String>,

    /// Rows per insert request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Parse and validate only, without inserting
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let layout = CsvLayout {
        lat_col: args.lat_col,
        lng_col: args.lng_col,
        region_col: args.region_col,
        district_col: args.district_col,
    };

    tracing::info!("Loading {} as {}", args.csv, args.source.as_str());

    let parsed = safety_loader::parse_file(&args.csv, args.source, &layout)?;

    tracing::info!(
        "Parsed {} points ({} invalid rows, {} outside Korea)",
        parsed.points.len(),
        parsed.invalid_rows,
        parsed.out_of_bounds
    );

    if args.dry_run {
        tracing::info!("Dry run, nothing inserted");
        return Ok(());
    }
    if parsed.points.is_empty() {
        tracing::warn!("No points to insert");
        return Ok(());
    }

    let settings = Settings::load()?;
    let backend = BackendClient::new(
        settings.backend.url,
        settings.backend.service_key,
        BackendTables {
            courses: settings.backend.courses_table,
            safety_points: settings.backend.safety_points_table,
        },
        settings.backend.safety_point_limit,
    );

    let report = safety_loader::insert_points(&backend, &parsed.points, args.batch_size).await;

    tracing::info!(
        "Done: {} of {} points stored in {} batches, {} failed",
        report.inserted,
        report.total,
        report.batches,
        report.failed
    );

    Ok(())
}
