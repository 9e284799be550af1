//! Scripted walkthrough: calibrate, place references, walk, and let drift
//! correction pull the pose back.
//!
//! Run with: cargo run --example walkthrough

use floorplan_tracker::{
    CorrectionLoopConfig, CorrectionLoopRunner, ExternalEstimate, GeoSource, ImagePoint,
    MotionCommand, ScriptedSource, TrackerCommand, TrackerEvent, TrackerSession,
};
use std::f64::consts::FRAC_PI_2;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // One fix for the reference capture, then one per correction.
    let source = ScriptedSource::new(vec![
        Some(ExternalEstimate::new(52.52010, 13.40490, 6.0, GeoSource::Gps)),
        Some(ExternalEstimate::new(52.52011, 13.40491, 25.0, GeoSource::Wifi)),
        None,
        Some(ExternalEstimate::new(52.52011, 13.40491, 120.0, GeoSource::Cell)),
    ]);

    let handle = CorrectionLoopRunner::new(
        TrackerSession::new(),
        source,
        CorrectionLoopConfig::default().with_interval(60_000),
    )
    .with_event_callback(|event| {
        if let TrackerEvent::Corrected { pose, correction } = event {
            println!(
                "  correction alpha {:.2} → ({:.2}, {:.2})",
                correction.alpha, pose.x, pose.y
            );
        }
    })
    .run()
    .await;

    handle
        .request(TrackerCommand::LoadFloorPlan {
            width: 1200,
            height: 800,
        })
        .await?;
    // 200 px between the taps measure 10 m: 20 px/m.
    handle
        .request(TrackerCommand::Calibrate {
            p1: ImagePoint::new(100.0, 400.0),
            p2: ImagePoint::new(300.0, 400.0),
            distance_m: 10.0,
        })
        .await?;
    handle
        .request(TrackerCommand::SetStartPoint(ImagePoint::new(100.0, 400.0)))
        .await?;

    // Doorway 12 m east of the start, tagged with the current fix.
    if let TrackerEvent::ReferenceAdded(point) = handle
        .capture_reference(ImagePoint::new(340.0, 400.0))
        .await?
    {
        println!(
            "Placed {} at world ({:.1}, {:.1})",
            point.label(),
            point.world_x,
            point.world_y
        );
    }

    // Walk 10 m east, turn, walk 2 m; dead reckoning alone lands off the door.
    for _ in 0..10 {
        handle
            .request(TrackerCommand::Move(MotionCommand::Forward(1.0)))
            .await?;
    }
    handle
        .request(TrackerCommand::Move(MotionCommand::Right(FRAC_PI_2)))
        .await?;
    handle
        .request(TrackerCommand::Move(MotionCommand::Forward(2.0)))
        .await?;

    let before = handle.snapshot().await?.pose;
    println!("Dead-reckoned pose: ({:.2}, {:.2})", before.x, before.y);

    println!("Correcting from the position source:");
    for _ in 0..3 {
        if handle.correct_now().await? == TrackerEvent::NoCorrection {
            println!("  no fix");
        }
    }

    let snapshot = handle.snapshot().await?;
    let calibration = snapshot
        .calibration
        .ok_or_else(|| anyhow::anyhow!("calibration lost"))?;
    let pixel = calibration.world_to_image(snapshot.pose.x, snapshot.pose.y);
    println!(
        "Final pose ({:.2}, {:.2}) heading {:.0}° → pixel ({:.0}, {:.0}), {:.1} m walked",
        snapshot.pose.x,
        snapshot.pose.y,
        snapshot.pose.theta.to_degrees(),
        pixel.u,
        pixel.v,
        snapshot.path.length_m()
    );

    handle.stop().await?;
    Ok(())
}
