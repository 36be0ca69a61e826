//! Farmwatch CLI
//!
//! Command-line interface for Farmwatch operations:
//! - Fetch recent readings
//! - Ingest a reading
//! - Read and update farm settings
//! - Render the four dashboard charts as SVG files
//! - Check status

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use farmwatch::chart::{ChartMetric, Charts, SvgCanvas};
use farmwatch::history::{HistoryClient, HistoryConfig, HistorySource};
use farmwatch::model::Reading;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "farmwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Farm weather monitoring from the command line")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:5000", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the most recent readings, oldest first
    Recent {
        /// Number of readings
        #[arg(short, long, default_value = "24")]
        limit: u32,
    },

    /// Ingest a reading
    Ingest {
        /// Temperature (°C)
        temp: f64,
        /// Relative humidity (%)
        humidity: f64,
        /// Pressure (hPa)
        pressure: f64,
        /// Wind speed (m/s)
        wind_speed: f64,
        /// Weather description
        #[arg(short, long, default_value = "clear sky")]
        weather: String,
        /// Timestamp (default: now). Supports: "now", ISO 8601, Unix milliseconds
        #[arg(short, long)]
        time: Option<String>,
    },

    /// Read or update a user's farm settings
    Settings {
        /// User id
        user: String,
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Render the dashboard charts from recent history as SVG files
    Render {
        /// Number of readings
        #[arg(short, long, default_value = "24")]
        limit: u32,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Show system status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the settings document
    Get,
    /// Merge fields into the settings document
    Set {
        /// Farm latitude
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Farm longitude
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.api_url.trim_end_matches('/').to_string();

    match cli.command {
        Commands::Recent { limit } => {
            let readings = fetch_history(&base, limit).await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&readings)?);
            } else {
                print_table(&readings);
            }
        }

        Commands::Ingest {
            temp,
            humidity,
            pressure,
            wind_speed,
            weather,
            time,
        } => {
            let timestamp = match time.as_deref() {
                None | Some("now") => Utc::now().timestamp_millis(),
                Some(s) => {
                    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                        dt.timestamp_millis()
                    } else if let Ok(ts) = s.parse::<i64>() {
                        ts
                    } else {
                        eprintln!("Invalid timestamp format: {}", s);
                        std::process::exit(1);
                    }
                }
            };

            let reading = Reading::new(timestamp, temp, humidity, pressure, wind_speed, weather);
            let response = client
                .post(format!("{}/api/readings", base))
                .json(&reading)
                .send()
                .await?;

            if response.status().is_success() {
                println!("Ingested reading at {}", format_time(timestamp));
            } else {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Failed ({}): {}", status, text);
                std::process::exit(1);
            }
        }

        Commands::Settings { user, action } => {
            let url = format!("{}/api/users/{}/settings", base, user);

            match action {
                SettingsAction::Get => {
                    let response = client.get(&url).send().await?;
                    let status = response.status();
                    let body: Value = response.json().await?;

                    if !status.is_success() {
                        eprintln!(
                            "Failed ({}): {}",
                            status,
                            body["message"].as_str().unwrap_or("unknown")
                        );
                        std::process::exit(1);
                    }
                    println!("{}", serde_json::to_string_pretty(&body["data"])?);
                }
                SettingsAction::Set { lat, lng, name } => {
                    let patch = settings_patch(lat, lng, name);
                    if patch.as_object().is_some_and(Map::is_empty) {
                        eprintln!("Nothing to update. Pass --lat, --lng or --name.");
                        std::process::exit(1);
                    }

                    let response = client.put(&url).json(&patch).send().await?;
                    if response.status().is_success() {
                        println!("Settings updated for {}", user);
                    } else {
                        let status = response.status();
                        let text = response.text().await.unwrap_or_default();
                        eprintln!("Failed ({}): {}", status, text);
                        std::process::exit(1);
                    }
                }
            }
        }

        Commands::Render { limit, output } => {
            let readings = fetch_history(&base, limit).await?;
            if readings.is_empty() {
                println!("No readings to chart");
                return Ok(());
            }

            let canvas = SvgCanvas::new();
            let mut charts = Charts::new(Box::new(canvas.clone()));
            charts.show_canvases();
            let drawn = charts.draw(&readings)?;

            std::fs::create_dir_all(&output)?;
            for metric in ChartMetric::ALL {
                if let Some(svg) = canvas.svg(metric) {
                    let path = output.join(format!("{}.svg", metric.canvas_id()));
                    std::fs::write(&path, svg)?;
                    println!("{:<12} -> {}", metric, path.display());
                }
            }
            println!("Rendered {} charts from {} readings", drawn, readings.len());
        }

        Commands::Status => {
            let response = client.get(format!("{}/health", base)).send().await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;

                    println!("Farmwatch v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!(
                        "API Status: {}",
                        health["status"].as_str().unwrap_or("unknown")
                    );
                    println!("Store: {}", health["store"].as_str().unwrap_or("unknown"));
                    if let Some(readings) = health["readings"].as_u64() {
                        println!("  Readings: {}", readings);
                    }
                    if let Some(subs) = health["live_subscriptions"].as_u64() {
                        println!("  Live subscribers: {}", subs);
                    }

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to Farmwatch API at {}", base);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the Farmwatch server is running:");
                    eprintln!("  cargo run --bin farmwatch");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let config = farmwatch::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn fetch_history(base: &str, limit: u32) -> anyhow::Result<Vec<Reading>> {
    let client = HistoryClient::new(HistoryConfig {
        base_url: format!("{}/api", base),
        ..Default::default()
    })?;

    match client.fetch_recent(limit).await {
        Ok(readings) => Ok(readings),
        Err(e) => {
            eprintln!("{}", e.user_message());
            std::process::exit(1);
        }
    }
}

fn settings_patch(lat: Option<f64>, lng: Option<f64>, name: Option<String>) -> Value {
    let mut patch = Map::new();

    let mut location = Map::new();
    if let Some(lat) = lat {
        location.insert("lat".to_string(), json!(lat));
    }
    if let Some(lng) = lng {
        location.insert("lng".to_string(), json!(lng));
    }
    if !location.is_empty() {
        patch.insert("farmLocation".to_string(), Value::Object(location));
    }
    if let Some(name) = name {
        patch.insert("displayName".to_string(), json!(name));
    }

    Value::Object(patch)
}

fn format_time(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}

fn print_table(readings: &[Reading]) {
    if readings.is_empty() {
        println!("No readings yet");
        return;
    }

    println!(
        "{:<17} {:>8} {:>9} {:>10} {:>7}  {}",
        "Time (UTC)", "Temp °C", "Humid %", "Press hPa", "Wind", "Weather"
    );
    println!("{}", "-".repeat(72));

    for r in readings {
        println!(
            "{:<17} {:>8.1} {:>9.0} {:>10.0} {:>7.1}  {}",
            format_time(r.timestamp),
            r.owm_temp,
            r.owm_humidity,
            r.owm_pressure,
            r.owm_wind_speed,
            r.owm_weather
        );
    }
    println!();
    println!("{} readings", readings.len());
}
