//! Floorplan Tracker - dead reckoning on a floor plan with GPS/Wi-Fi drift correction
//!
//! This is the CLI entry point for the floorplan-tracker tool.
//! Run with: cargo run --bin floorplan-tracker

use floorplan_tracker::calibration::TapOutcome;
use floorplan_tracker::sensors::infer_source;
use floorplan_tracker::{
    CorrectionLoopConfig, CorrectionLoopHandle, CorrectionLoopRunner, CorrectionMode,
    ExternalEstimate, GeoSource, ImagePoint, MotionCommand, NoFixSource, PositionSource,
    ScriptedSource, TrackerCommand, TrackerEvent, TrackerSession, TrackerSettings,
};
use std::io::{self, BufRead, Write};

/// One parsed line of user input.
#[derive(Debug)]
enum CliCommand {
    Tracker(TrackerCommand),
    CaptureReference(ImagePoint),
    Correct,
    Pose,
    Path,
    Refs,
    Pause,
    Resume,
    SaveSettings,
    Help,
    Quit,
}

const HELP: &str = "\
Commands:
  floor W H                  load a floor plan of W x H pixels (clears calibration)
  tap U V                    record a calibration tap
  distance M                 finish the tapped calibration with the real distance
  calibrate U1 V1 U2 V2 M    calibrate directly from two points
  start U V                  set the start point (pose reset to origin)
  ref U V [LAT LON ACC]      add a reference point (fix read from the source if omitted)
  rm ID                      remove a reference point
  snap ID                    move onto a reference point
  f [M] | l [DEG] | r [DEG]  step forward, turn left, turn right
  fix LAT LON ACC [SOURCE]   apply an external fix now
  correct                    poll the position source now
  mode gps-wifi|wifi-only|manual-only
  pose | path | refs | reset-path | pause | resume | save | help | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let settings = TrackerSettings::load().with_env_overrides();

    let source: Box<dyn PositionSource> = if settings.sensor_replay_path.is_empty() {
        Box::new(NoFixSource)
    } else {
        let scripted =
            ScriptedSource::load(&settings.sensor_replay_path).map_err(anyhow::Error::msg)?;
        println!(
            "Replaying {} sensor polls from {}",
            scripted.remaining(),
            settings.sensor_replay_path
        );
        Box::new(scripted)
    };

    println!("🧭 Floorplan Tracker");
    println!("================================================");
    println!("Step length: {:.2} m", settings.step_length_m);
    println!("Turn angle: {:.1}°", settings.turn_angle_deg);
    println!("Correction: {} every {} ms", settings.correction_mode, settings.correction_interval_ms);
    println!("================================================\n");
    println!("{}\n", HELP);

    let session = TrackerSession::new().with_mode(settings.correction_mode);
    let loop_config = CorrectionLoopConfig::default().with_interval(settings.correction_interval_ms);

    let handle = CorrectionLoopRunner::new(session, source, loop_config)
        .with_event_callback(|event| {
            // Every correction, timed or requested, is printed here.
            if announced_by_callback(event) {
                println!("\n{}", describe(event));
            }
        })
        .run()
        .await;

    run_interactive(&handle, settings).await?;

    let _ = handle.stop().await;
    println!("Goodbye! 👋");
    Ok(())
}

async fn run_interactive(
    handle: &CorrectionLoopHandle,
    mut settings: TrackerSettings,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    loop {
        print!("🧭 > ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match parse_command(line, &settings) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("❌ {}", e);
                continue;
            }
        };

        match command {
            CliCommand::Quit => break,
            CliCommand::Help => println!("{}", HELP),
            CliCommand::Tracker(command) => {
                if let TrackerCommand::SetMode(mode) = &command {
                    settings.correction_mode = *mode;
                }
                match handle.request(command).await {
                    Ok(event) => report(&event),
                    Err(e) => eprintln!("❌ {}", e),
                }
            }
            CliCommand::CaptureReference(image) => match handle.capture_reference(image).await {
                Ok(event) => report(&event),
                Err(e) => eprintln!("❌ {}", e),
            },
            CliCommand::Correct => {
                let event = handle.correct_now().await?;
                report(&event);
            }
            CliCommand::Pose => {
                let snapshot = handle.snapshot().await?;
                let pose = snapshot.pose;
                print!(
                    "Pose: ({:.2} m, {:.2} m) heading {:.1}°",
                    pose.x,
                    pose.y,
                    pose.theta.to_degrees()
                );
                match snapshot.calibration {
                    Some(cal) => {
                        let pixel = cal.world_to_image(pose.x, pose.y);
                        println!(" → pixel ({:.1}, {:.1})", pixel.u, pixel.v);
                    }
                    None => println!(" (not calibrated)"),
                }
            }
            CliCommand::Path => {
                let snapshot = handle.snapshot().await?;
                println!(
                    "Path: {} points, {:.2} m walked",
                    snapshot.path.len(),
                    snapshot.path.length_m()
                );
                for point in snapshot.path.points() {
                    println!("  ({:.2}, {:.2})", point.x, point.y);
                }
            }
            CliCommand::Refs => {
                let snapshot = handle.snapshot().await?;
                if snapshot.references.is_empty() {
                    println!("No reference points");
                }
                for point in &snapshot.references {
                    let mut sources = Vec::new();
                    if let Some(source) = point.geo_source {
                        sources.push(source.as_str().to_uppercase());
                    }
                    if point.wifi_fingerprint_id.is_some() {
                        sources.push("Wi-Fi".to_string());
                    }
                    let accuracy = point
                        .geo_accuracy
                        .map(|a| format!("±{:.0}m", a))
                        .unwrap_or_else(|| "N/A".to_string());
                    println!(
                        "  {} [{}] world ({:.2}, {:.2}) {} {}",
                        point.label(),
                        point.id,
                        point.world_x,
                        point.world_y,
                        sources.join(", "),
                        accuracy
                    );
                }
            }
            CliCommand::Pause => {
                handle.pause().await?;
                println!("⏸️ Automatic correction paused");
            }
            CliCommand::Resume => {
                handle.resume().await?;
                println!("▶️ Automatic correction resumed");
            }
            CliCommand::SaveSettings => match settings.save() {
                Ok(()) => println!("✅ Settings saved"),
                Err(e) => eprintln!("❌ {}", e),
            },
        }
    }

    Ok(())
}

fn parse_command(line: &str, settings: &TrackerSettings) -> Result<CliCommand, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = parts.collect();

    let numbers = |count: usize| -> Result<Vec<f64>, String> {
        if args.len() < count {
            return Err(format!("'{}' needs {} numeric arguments", verb, count));
        }
        args[..count]
            .iter()
            .map(|a| a.parse::<f64>().map_err(|_| format!("Not a number: {}", a)))
            .collect()
    };
    let optional = |default: f64| -> Result<f64, String> {
        match args.first() {
            Some(a) => a.parse::<f64>().map_err(|_| format!("Not a number: {}", a)),
            None => Ok(default),
        }
    };
    let id = || -> Result<String, String> {
        args.first()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("'{}' needs a reference id", verb))
    };

    let command = match verb.as_str() {
        "quit" | "exit" => CliCommand::Quit,
        "help" | "?" => CliCommand::Help,
        "pose" => CliCommand::Pose,
        "path" => CliCommand::Path,
        "refs" => CliCommand::Refs,
        "pause" => CliCommand::Pause,
        "resume" => CliCommand::Resume,
        "save" => CliCommand::SaveSettings,
        "correct" => CliCommand::Correct,
        "reset-path" => CliCommand::Tracker(TrackerCommand::ResetPath),
        "floor" => {
            if args.len() < 2 {
                return Err("'floor' needs a width and a height in pixels".to_string());
            }
            let size = args[..2]
                .iter()
                .map(|a| {
                    a.parse::<u32>()
                        .ok()
                        .filter(|d| *d > 0)
                        .ok_or_else(|| format!("Not a positive pixel size: {}", a))
                })
                .collect::<Result<Vec<u32>, String>>()?;
            CliCommand::Tracker(TrackerCommand::LoadFloorPlan {
                width: size[0],
                height: size[1],
            })
        }
        "tap" => {
            let n = numbers(2)?;
            CliCommand::Tracker(TrackerCommand::CalibrationTap(ImagePoint::new(n[0], n[1])))
        }
        "distance" => {
            let n = numbers(1)?;
            CliCommand::Tracker(TrackerCommand::FinishCalibration { distance_m: n[0] })
        }
        "calibrate" => {
            let n = numbers(5)?;
            CliCommand::Tracker(TrackerCommand::Calibrate {
                p1: ImagePoint::new(n[0], n[1]),
                p2: ImagePoint::new(n[2], n[3]),
                distance_m: n[4],
            })
        }
        "start" => {
            let n = numbers(2)?;
            CliCommand::Tracker(TrackerCommand::SetStartPoint(ImagePoint::new(n[0], n[1])))
        }
        "ref" => {
            if args.len() >= 5 {
                let n = numbers(5)?;
                CliCommand::Tracker(TrackerCommand::AddReference {
                    image: ImagePoint::new(n[0], n[1]),
                    estimate: Some(ExternalEstimate::with_inferred_source(n[2], n[3], n[4])),
                    wifi_scan: None,
                })
            } else {
                let n = numbers(2)?;
                CliCommand::CaptureReference(ImagePoint::new(n[0], n[1]))
            }
        }
        "rm" => CliCommand::Tracker(TrackerCommand::RemoveReference(id()?)),
        "snap" => CliCommand::Tracker(TrackerCommand::SnapToReference(id()?)),
        "f" | "forward" => CliCommand::Tracker(TrackerCommand::Move(MotionCommand::Forward(
            optional(settings.step_length_m)?,
        ))),
        "l" | "left" => CliCommand::Tracker(TrackerCommand::Move(MotionCommand::Left(
            optional(settings.turn_angle_deg)?.to_radians(),
        ))),
        "r" | "right" => CliCommand::Tracker(TrackerCommand::Move(MotionCommand::Right(
            optional(settings.turn_angle_deg)?.to_radians(),
        ))),
        "fix" => {
            let n = numbers(3)?;
            let source = match args.get(3) {
                Some(s) => s.parse::<GeoSource>()?,
                None => infer_source(n[2]),
            };
            CliCommand::Tracker(TrackerCommand::ApplyEstimate(Some(ExternalEstimate::new(
                n[0], n[1], n[2], source,
            ))))
        }
        "mode" => {
            let mode = args
                .first()
                .ok_or("'mode' needs gps-wifi, wifi-only or manual-only")?
                .parse::<CorrectionMode>()?;
            CliCommand::Tracker(TrackerCommand::SetMode(mode))
        }
        other => return Err(format!("Unknown command: {} (try 'help')", other)),
    };

    Ok(command)
}

/// Events the loop callback prints as they happen.
fn announced_by_callback(event: &TrackerEvent) -> bool {
    matches!(event, TrackerEvent::Corrected { .. })
}

/// Print a command's result unless the callback already did.
fn report(event: &TrackerEvent) {
    if !announced_by_callback(event) {
        println!("{}", describe(event));
    }
}

fn describe(event: &TrackerEvent) -> String {
    match event {
        TrackerEvent::FloorPlanLoaded(plan) => {
            format!("🗺️ Floor plan {}x{} loaded, calibrate again", plan.width, plan.height)
        }
        TrackerEvent::CalibrationTap(TapOutcome::AwaitingSecondPoint) => {
            "📍 Tap the second point".to_string()
        }
        TrackerEvent::CalibrationTap(TapOutcome::AwaitingDistance) => {
            "📏 Enter the real-world distance with 'distance M'".to_string()
        }
        TrackerEvent::Calibrated(cal) => format!(
            "🎯 Calibrated: {:.3} px/m, rotation {:.1}°",
            cal.scale,
            cal.rotation.to_degrees()
        ),
        TrackerEvent::StartPointSet { calibration, .. } => format!(
            "🚩 Start point set at pixel ({:.1}, {:.1})",
            calibration.origin_image_u, calibration.origin_image_v
        ),
        TrackerEvent::ReferenceAdded(point) => format!(
            "📌 {} added [{}] at ({:.2}, {:.2})",
            point.label(),
            point.id,
            point.world_x,
            point.world_y
        ),
        TrackerEvent::ReferenceRemoved(point) => format!("🗑️ {} removed", point.label()),
        TrackerEvent::PoseUpdated(pose) => format!(
            "Pose: ({:.2}, {:.2}) heading {:.1}°",
            pose.x,
            pose.y,
            pose.theta.to_degrees()
        ),
        TrackerEvent::Corrected { pose, correction } => format!(
            "📡 Corrected (alpha {:.2}) → ({:.2}, {:.2})",
            correction.alpha, pose.x, pose.y
        ),
        TrackerEvent::NoCorrection => "No correction applied".to_string(),
        TrackerEvent::ModeChanged(mode) => format!("Correction mode: {}", mode),
        TrackerEvent::PathReset => "Path cleared".to_string(),
    }
}
