//! Headless shell around the ArCanvas runtime.
//!
//! Reads one command per line from stdin, turns it into an application event
//! and publishes it on the event bus. Marker sightings are typed in as well and
//! published through the tracker's own registration, so they pass through the
//! same filtering as a real tracker's detections.
//!
//! # Usage
//!
//! ```text
//! arcanvas [config.toml]
//! ```
//!
//! # Commands
//!
//! - `capture`: Capture with the camera
//! - `load [file]`: Load a file from the image directory
//! - `fetch <name>`: Fetch an image from the server
//! - `send`: Upload the held image
//! - `gallery <path_type>`: List the server gallery
//! - `use`: Use the acquired image
//! - `marker <qr|aruco|ean13|upca> <payload> [x y z]`: Report a sighting
//! - `adjust <dx> <dy> <dz> [yaw_degrees]`: Drag the canvas while placing
//! - `fix`: Lock the placement
//! - `relocalize`: Look for the marker again
//! - `reset`: End drawing and pick another image
//! - `cancel`: Stop waiting for the camera
//! - `quit`: Exit

#![allow(clippy::multiple_crate_versions)]

use arcanvas::acquisition::HttpImageServer;
use arcanvas::app::{EventSender, EventSource};
use arcanvas::domain::{MarkerKind, MarkerPayload, Pose, RawDetection};
use arcanvas::infrastructure::{get_data_dir, image_path};
use arcanvas::sim::{ManualDetector, StaticPermissions, StillCamera};
use arcanvas::{initialize, Config, Devices, Event};
use glam::{Quat, Vec3};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Command(Event),
    Sighting(RawDetection),
    Help,
}

const HELP: &str = "commands: capture | load [file] | fetch <name> | send | gallery <type> | use | \
marker <qr|aruco|ean13|upca> <payload> [x y z] | adjust <dx> <dy> <dz> [yaw] | fix | relocalize | \
reset | cancel | quit";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => match Config::from_file(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("arcanvas: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    arcanvas::observability::init_tracing(config.trace_level.as_deref(), &get_data_dir());
    tracing::debug!(?config, "configuration loaded");

    let devices = Devices {
        camera: Arc::new(camera_for(&config)),
        transport: Arc::new(HttpImageServer::new(config.server.clone())),
        detector: Arc::new(ManualDetector::default()),
        permissions: Arc::new(StaticPermissions::granting_all()),
    };
    let mut runtime = initialize(&config, devices);

    let senders = runtime
        .register(EventSource::UserInput)
        .and_then(|user| Ok((user, runtime.register(EventSource::MarkerTracker)?)));
    let (user, tracker) = match senders {
        Ok(pair) => pair,
        Err(e) => {
            tracing::error!(error = %e, "cannot register event sources");
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn(read_commands(user, tracker));
    runtime.run().await;
    ExitCode::SUCCESS
}

/// Serves the configured default image as the camera picture, falling back to
/// a generated test card.
fn camera_for(config: &Config) -> StillCamera {
    let path = image_path(&config.image_directory, &config.image_file);
    StillCamera::from_file(&path, 3)
        .or_else(|e| {
            tracing::info!(path = %path.display(), reason = %e, "using generated test card as camera picture");
            StillCamera::test_card(640, 480, 3)
        })
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "no camera picture available");
            StillCamera::unavailable()
        })
}

async fn read_commands(user: EventSender, tracker: EventSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprintln!("{HELP}");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let sent = match parse_line(&line) {
            Ok(Input::Command(event)) => user.command(event),
            Ok(Input::Sighting(detection)) => tracker.detection(detection),
            Ok(Input::Help) => {
                eprintln!("{HELP}");
                Ok(())
            }
            Err(message) => {
                eprintln!("{message}");
                Ok(())
            }
        };
        if sent.is_err() {
            return;
        }
    }

    request_quit(&user);
}

/// Asks the runtime to stop once input ends. Returns whether it was delivered.
fn request_quit(user: &EventSender) -> bool {
    match user.command(Event::QuitRequested) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "quit not delivered, runtime already stopped");
            false
        }
    }
}

fn parse_line(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Input::Help);
    };
    let rest: Vec<&str> = words.collect();

    let event = match (verb, rest.as_slice()) {
        ("capture", []) => Event::CaptureRequested,
        ("load", []) => Event::LoadFromDiskRequested { file: None },
        ("load", [file]) => Event::LoadFromDiskRequested {
            file: Some((*file).to_string()),
        },
        ("fetch", [name]) => Event::FetchRequested {
            name: (*name).to_string(),
        },
        ("send", []) => Event::SendImageRequested,
        ("gallery", [path_type]) => Event::GalleryRequested {
            path_type: (*path_type).to_string(),
        },
        ("use", []) => Event::UseImageRequested,
        ("fix", []) => Event::FixPositionRequested,
        ("relocalize", []) => Event::RelocalizeRequested,
        ("reset", []) => Event::ResetRequested,
        ("cancel", []) => Event::CancelRequested,
        ("quit" | "exit", []) => Event::QuitRequested,
        ("adjust", [x, y, z, yaw @ ..]) if yaw.len() <= 1 => {
            let translation = Vec3::new(number(x)?, number(y)?, number(z)?);
            let degrees = yaw.first().map(|d| number(d)).transpose()?.unwrap_or(0.0);
            Event::AdjustRequested {
                translation,
                rotation: Quat::from_rotation_y(degrees.to_radians()),
            }
        }
        ("marker", [kind, payload, position @ ..]) => {
            return sighting(kind, payload, position).map(Input::Sighting);
        }
        ("help" | "?", _) => return Ok(Input::Help),
        _ => return Err(format!("unrecognized command: {line}")),
    };
    Ok(Input::Command(event))
}

fn sighting(kind: &str, payload: &str, position: &[&str]) -> Result<RawDetection, String> {
    let kind: MarkerKind = kind.parse().map_err(|e| format!("{e}"))?;
    let payload = match kind {
        MarkerKind::ArucoApril => MarkerPayload::Tag(
            payload
                .parse()
                .map_err(|_| format!("aruco tag id must be an integer: {payload}"))?,
        ),
        MarkerKind::Qr | MarkerKind::Ean13 | MarkerKind::UpcA => {
            MarkerPayload::Bytes(payload.as_bytes().to_vec())
        }
    };
    let position = match position {
        [] => Vec3::ZERO,
        [x, y, z] => Vec3::new(number(x)?, number(y)?, number(z)?),
        _ => return Err("marker position needs x y z".to_string()),
    };
    Ok(RawDetection {
        kind,
        payload,
        pose: Pose::new(position, Quat::IDENTITY),
    })
}

fn number(word: &str) -> Result<f32, String> {
    word.parse()
        .map_err(|_| format!("not a number: {word}"))
}
