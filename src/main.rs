use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rtttl_player::{CpalToneDriver, PlayError, Player, PlayerConfig, Rtttl};

#[derive(Parser)]
#[command(name = "rtttl", about = "Play RTTTL ringtones through the speakers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a song through the default audio output
    Play {
        #[command(flatten)]
        input: Input,

        /// Diagnostic detail, 0 (silent) to 5 (every note)
        #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=5))]
        verbosity: u8,

        /// Shift every note by this many octaves
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        octave_offset: i8,

        /// Silence the speaker once the last note has finished
        #[arg(long)]
        silence_at_end: bool,
    },

    /// Decode a song and list its events without playing it
    Parse {
        #[command(flatten)]
        input: Input,

        /// Shift every note by this many octaves
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        octave_offset: i8,
    },
}

#[derive(Args)]
struct Input {
    /// Path to a file holding one RTTTL song
    #[arg(conflicts_with = "text")]
    file: Option<PathBuf>,

    /// The song itself, e.g. "Beep:d=8,o=5,b=120:c,e,g"
    #[arg(long)]
    text: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Play {
            input,
            verbosity,
            octave_offset,
            silence_at_end,
        } => play(
            &input,
            PlayerConfig {
                verbosity,
                octave_offset,
                silence_at_end,
            },
        ),
        Command::Parse {
            input,
            octave_offset,
        } => parse(&input, octave_offset),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_song(input: &Input) -> Result<String, PlayError> {
    if let Some(text) = &input.text {
        return Ok(text.trim().to_string());
    }
    let Some(path) = &input.file else {
        return Err(PlayError::MissingInput);
    };
    let content = fs::read_to_string(path).map_err(|e| PlayError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(content.trim().to_string())
}

fn play(input: &Input, config: PlayerConfig) -> Result<(), PlayError> {
    let song = read_song(input)?;
    let driver = CpalToneDriver::new()?;

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
        tracing::warn!("cannot install Ctrl-C handler: {}", e);
    }

    let mut player = Player::new(driver, config).with_cancel(cancel);
    let report = player.play(&song)?;

    println!(
        "Played: {} ({}, {} events, {:.1} s)",
        report.name,
        report.header,
        report.events,
        report.elapsed_ms as f64 / 1000.0
    );
    for warning in &report.warnings {
        println!("  skipped: {}", warning);
    }
    if report.cancelled {
        println!("  cancelled");
    }

    // let the output buffer drain before the stream is dropped
    if !config.silence_at_end && !report.cancelled {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    Ok(())
}

fn parse(input: &Input, octave_offset: i8) -> Result<(), PlayError> {
    let song = read_song(input)?;
    let rtttl = Rtttl::parse(&song)?;

    println!("Name: {}", rtttl.name);
    println!("Header: {}", rtttl.header);
    for ignored in &rtttl.ignored {
        println!("  ignored: {}", ignored);
    }

    let events = rtttl.events(octave_offset)?;
    println!("Whole note: {} ms", events.timing().wholenote_ms);
    println!();

    let mut total_ms: u64 = 0;
    for resolved in events {
        let (event, fault) = resolved?;
        total_ms += u64::from(event.duration_ms);
        match fault {
            None => println!("  {}", event),
            Some(e) => println!("  {} (skipped: {})", event, e),
        }
    }
    println!();
    println!("Total: {:.1} s", total_ms as f64 / 1000.0);
    Ok(())
}
