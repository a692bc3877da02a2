//! feedgate - livestock feeder station.
//!
//! # Usage
//!
//! ```bash
//! # Serve the WL-134 reader
//! feedgate --config /etc/feedgate.toml run --port /dev/ttyUSB0
//!
//! # Operator commands
//! feedgate register 421 4.0
//! feedgate set-quota 421 6.0
//! feedgate consumed 421 2025-03-10
//! feedgate status 421
//! feedgate decode "02 35 41 31 30 ..."
//! ```

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use feedgate_cli::FeederConfig;
use feedgate_cli::reader::{LogDispenser, ReaderLoop, spawn_serial_reader};
use feedgate_core::{AnimalId, SystemClock, constants::FRAME_LEN};
use feedgate_storage::{Database, FeedingAuthorizer};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "feedgate", version, about = "RFID-gated livestock feeder")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read tags from the serial reader and feed eligible animals
    Run {
        /// Serial device (overrides the config file)
        #[arg(long)]
        port: Option<String>,

        /// Baud rate (overrides the config file)
        #[arg(long)]
        baud: Option<u32>,
    },
    /// Register an animal with its daily quota
    Register { animal_id: AnimalId, daily_quota: f64 },
    /// Change the daily quota of a registered animal
    SetQuota { animal_id: AnimalId, daily_quota: f64 },
    /// Total fed on a calendar date (YYYY-MM-DD)
    Consumed { animal_id: AnimalId, date: NaiveDate },
    /// Show quota state and recent feedings
    Status {
        animal_id: AnimalId,

        #[arg(long, default_value_t = 5)]
        limit: i64,
    },
    /// Decode a raw 30-byte frame given as hex
    Decode { hex: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    if let Command::Decode { hex } = &cli.command {
        return decode_command(hex);
    }

    let mut config = FeederConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Command::Run { port, baud } = &cli.command {
        if let Some(port) = port {
            config.serial_port = port.clone();
        }
        if let Some(baud) = baud {
            config.baud_rate = *baud;
        }
    }

    let db = Database::new(config.database_config())
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path))?;
    let authorizer = FeedingAuthorizer::new(db.clone(), config.clock()?, config.policy)?;

    let result = execute(cli.command, &config, &authorizer).await;
    db.close().await;
    result
}

async fn execute(
    command: Command,
    config: &FeederConfig,
    authorizer: &FeedingAuthorizer<SystemClock>,
) -> Result<()> {
    match command {
        Command::Run { .. } => run(config, authorizer).await,
        Command::Register {
            animal_id,
            daily_quota,
        } => {
            authorizer.register_animal(animal_id, daily_quota).await?;
            println!("Registered animal {animal_id} with daily quota {daily_quota}");
            Ok(())
        }
        Command::SetQuota {
            animal_id,
            daily_quota,
        } => {
            authorizer.set_daily_quota(animal_id, daily_quota).await?;
            println!("Animal {animal_id}: daily quota set to {daily_quota}");
            Ok(())
        }
        Command::Consumed { animal_id, date } => {
            let total = authorizer.consumed_on_date(animal_id, date).await?;
            println!("Animal {animal_id} on {date}: {total}");
            Ok(())
        }
        Command::Status { animal_id, limit } => {
            let state = authorizer.quota_state(animal_id).await?;
            println!("Animal {animal_id}");
            println!("  daily quota:    {}", state.daily_quota);
            println!("  consumed today: {}", state.consumed_today);
            println!("  remaining:      {}", state.remaining());
            match state.last_fed_at {
                Some(at) => println!("  last fed at:    {at}"),
                None => println!("  last fed at:    never"),
            }
            for event in authorizer.history(animal_id, limit).await? {
                println!("  {}  {}", event.fed_at, event.quantity);
            }
            Ok(())
        }
        Command::Decode { hex } => decode_command(&hex),
    }
}

async fn run(config: &FeederConfig, authorizer: &FeedingAuthorizer<SystemClock>) -> Result<()> {
    authorizer.database().health_check().await?;
    let (chunks, reader_thread) = spawn_serial_reader(&config.serial_port, config.baud_rate)?;

    info!(
        port = %config.serial_port,
        ration_size = authorizer.policy().ration_size,
        min_interval_secs = authorizer.policy().min_interval_secs,
        "Feeder running"
    );

    let reader = ReaderLoop::new(authorizer, LogDispenser);
    tokio::select! {
        stats = reader.run(chunks) => {
            stats?;
            warn!("Serial reader stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    // The thread notices the closed channel on its next read timeout.
    match tokio::task::spawn_blocking(move || reader_thread.join()).await {
        Ok(Ok(())) => {}
        _ => warn!("Serial reader thread panicked"),
    }
    Ok(())
}

fn decode_command(hex: &str) -> Result<()> {
    let bytes = parse_hex_bytes(hex)?;
    if bytes.len() != FRAME_LEN {
        bail!("Expected {FRAME_LEN} bytes, got {}", bytes.len());
    }
    let tag = feedgate_rfid::parse_frame(&bytes)?;
    println!("Tag {tag} ({:#012x}), animal {}", tag.as_u64(), tag.animal_id());
    Ok(())
}

/// Parse hex byte pairs, ignoring whitespace and `:` / `-` separators
fn parse_hex_bytes(input: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':' && *b != b'-')
        .collect();
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits");
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text = std::str::from_utf8(pair).context("Invalid hex input")?;
            u8::from_str_radix(text, 16).with_context(|| format!("Invalid hex byte '{text}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("02 03", vec![0x02, 0x03])]
    #[case("0203", vec![0x02, 0x03])]
    #[case("ff:0a-10", vec![0xff, 0x0a, 0x10])]
    #[case("", vec![])]
    fn test_parse_hex_bytes(#[case] input: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_hex_bytes(input).unwrap(), expected);
    }

    #[rstest]
    #[case("0")]
    #[case("zz")]
    #[case("0x02")]
    fn test_parse_hex_bytes_invalid(#[case] input: &str) {
        assert!(parse_hex_bytes(input).is_err());
    }

    #[test]
    fn test_decode_command() {
        let frame = feedgate_rfid::encode_frame(feedgate_core::TagId::new(421).unwrap());
        let hex: String = frame.iter().map(|b| format!("{b:02X} ")).collect();

        assert!(decode_command(&hex).is_ok());
        assert!(decode_command("02 03").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "feedgate",
            "--database",
            "/tmp/f.db",
            "consumed",
            "42",
            "2025-03-10",
        ])
        .unwrap();

        assert_eq!(cli.database.as_deref(), Some("/tmp/f.db"));
        match cli.command {
            Command::Consumed { animal_id, date } => {
                assert_eq!(animal_id.as_i64(), 42);
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_negative_animal() {
        assert!(Cli::try_parse_from(["feedgate", "register", "--", "-1", "2.0"]).is_err());
        assert!(Cli::try_parse_from(["feedgate", "status", "abc"]).is_err());
    }

    #[test]
    fn test_cli_run_overrides() {
        let cli =
            Cli::try_parse_from(["feedgate", "run", "--port", "/dev/ttyUSB1", "--baud", "19200"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Command::Run {
                port: Some(_),
                baud: Some(19200)
            }
        ));
    }
}
