use std::{
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand};
use pitwall::config::AppConfig;
use pitwall::errors::PitwallError;
use pitwall::ingest::build_session_record;
use pitwall::live::{
    BackoffPolicy, HttpTelemetrySource, LiveFrame, record_frames, stream_telemetry,
};
use pitwall::server::build_rocket;
use pitwall::session::{FileSessionStore, SessionRecord, SessionStore};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Explicit config file, defaults to the platform config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory override for sessions and device state
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API and device sync endpoints
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ingest a GPX or device CSV file into the session store
    Import { file: PathBuf },
    /// List stored sessions, newest first
    Sessions,
    /// Print one session's summary
    Show { id: String },
    /// Remove a stored session
    Delete { id: String },
    /// Subscribe to the device and print live telemetry frames
    Live {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<AppConfig, PitwallError> {
    let mut config = AppConfig::load(path)?;
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir);
    }
    Ok(config)
}

fn open_store(config: &AppConfig) -> Result<FileSessionStore, PitwallError> {
    FileSessionStore::new(config.sessions_dir()?)
}

fn serve(config: AppConfig, port: Option<u16>) -> Result<(), PitwallError> {
    let mut config = config;
    if let Some(port) = port {
        config.server.port = port;
    }

    let rocket = build_rocket(config)?;
    rocket::execute(async move {
        rocket
            .launch()
            .await
            .map(|_| ())
            .map_err(|e| PitwallError::ServerError {
                description: e.to_string(),
            })
    })
}

fn import(config: &AppConfig, file: &PathBuf) -> Result<(), PitwallError> {
    let content =
        std::fs::read_to_string(file).map_err(|e| PitwallError::FileOperationError {
            operation: "read_track_log".to_string(),
            reason: format!("Could not read {:?}: {}", file, e),
        })?;

    let original_filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.gpx");

    let record = build_session_record(original_filename, &content)?;
    let store = open_store(config)?;
    store.save(&record)?;

    println!("{}", record.id);
    Ok(())
}

fn print_summary_line(record: &SessionRecord) {
    println!(
        "{}  {}  {:>6} points  {:>7.1} km/h  {}",
        record.id,
        record.upload_date.format("%Y-%m-%d %H:%M:%S"),
        record.stats.total_points,
        record.stats.max_speed,
        record.track_name.as_deref().unwrap_or("-"),
    );
}

fn sessions(config: &AppConfig) -> Result<(), PitwallError> {
    let store = open_store(config)?;
    let records = store.list()?;

    if records.is_empty() {
        println!("No stored sessions");
        return Ok(());
    }

    for record in &records {
        print_summary_line(record);
    }
    Ok(())
}

fn show(config: &AppConfig, id: &str) -> Result<(), PitwallError> {
    let store = open_store(config)?;
    let record = store
        .load(id)?
        .ok_or_else(|| PitwallError::SessionStoreError {
            reason: format!("No session with id {}", id),
        })?;

    println!("id:        {}", record.id);
    println!("file:      {}", record.original_filename);
    println!("uploaded:  {}", record.upload_date.to_rfc3339());
    if let Some(track) = &record.track_name {
        println!("track:     {}", track);
    }
    println!("points:    {}", record.stats.total_points);
    println!("max speed: {:.1} km/h", record.stats.max_speed);
    if let Some(rpm) = record.stats.max_rpm {
        println!("max rpm:   {:.0}", rpm);
    }
    if let Some(duration) = record.duration_seconds() {
        println!("duration:  {:.0} s", duration);
    }
    println!("distance:  {:.2} km", record.total_distance_m() / 1000.0);
    Ok(())
}

fn delete(config: &AppConfig, id: &str) -> Result<(), PitwallError> {
    let store = open_store(config)?;
    if store.delete(id)? {
        println!("Deleted session {}", id);
        Ok(())
    } else {
        Err(PitwallError::SessionStoreError {
            reason: format!("No session with id {}", id),
        })
    }
}

fn live(config: &AppConfig, output: Option<PathBuf>) -> Result<(), PitwallError> {
    let source = HttpTelemetrySource::new(
        &config.live.device_url,
        Duration::from_millis(config.live.request_timeout_ms),
    );
    let poll_interval = Duration::from_millis(config.live.poll_interval_ms);
    let backoff = BackoffPolicy::from_config(&config.live);

    let (frame_tx, frame_rx) = mpsc::channel::<LiveFrame>();

    // with an output file the stream tees every frame to a second
    // channel drained by the recorder thread
    if let Some(output_file) = output {
        let (recorder_tx, recorder_rx) = mpsc::channel::<LiveFrame>();
        thread::spawn(move || {
            stream_telemetry(source, frame_tx, Some(recorder_tx), poll_interval, backoff)
                .expect("Error while streaming telemetry");
        });
        thread::spawn(move || record_frames(&output_file, recorder_rx));
    } else {
        thread::spawn(move || {
            stream_telemetry(source, frame_tx, None, poll_interval, backoff)
                .expect("Error while streaming telemetry");
        });
    }

    for frame in &frame_rx {
        println!(
            "{:>7.1} km/h  {:>6.0} rpm  trip {:>7.2} km  {} sats  ({:.5}, {:.5})",
            frame.speed, frame.rpm, frame.trip, frame.sats, frame.lat, frame.lng
        );
    }
    Ok(())
}

fn main() {
    colog::init();

    let cli = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");

    let config = load_config(cli.config.as_deref(), cli.data_dir.clone())
        .expect("Error while loading configuration");

    match &cli.command {
        Commands::Serve { port } => {
            serve(config, *port).expect("Error while running the server");
        }
        Commands::Import { file } => {
            import(&config, file).expect("Error while importing track log");
        }
        Commands::Sessions => {
            sessions(&config).expect("Error while listing sessions");
        }
        Commands::Show { id } => {
            show(&config, id).expect("Error while loading session");
        }
        Commands::Delete { id } => {
            delete(&config, id).expect("Error while deleting session");
        }
        Commands::Live { output } => {
            live(&config, output.clone()).expect("Error while streaming live telemetry");
        }
    };
}
