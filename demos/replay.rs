//! Replay of a synthetic rotating device through the estimator worker
//!
//! A device turns slowly about the vertical while swaying in pitch. Its
//! camera pose, accelerometer and magnetometer are simulated with noise and
//! fed through the sensor front end exactly as live callbacks would be. The
//! fused trajectory is written to CSV next to the ground truth.
//!
//! Run with: `RUST_LOG=debug cargo run --example replay`

use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nalgebra::{Rotation3, Vector3};
use rand::prelude::*;
use rand_pcg::Pcg64;
use se3_fusion::{
    FrontendSettings, PoseEstimatorWorker, RAD_TO_DEG, SensorFrontend, WorkerSettings,
    calculate_heading,
};
use serde::Serialize;

const SAMPLE_RATE: f64 = 60.0; // frames per second
const DURATION: f64 = 10.0; // seconds
const GRAVITY: f64 = 9.81; // m/s²
const FIELD_STRENGTH: f64 = 48.0; // µT

#[derive(Debug, Serialize)]
struct Record {
    #[serde(rename = "Time (s)")]
    time: f64,
    #[serde(rename = "True heading (deg)")]
    true_heading: f64,
    #[serde(rename = "Camera heading (deg)")]
    camera_heading: f64,
    #[serde(rename = "Fused heading (deg)")]
    fused_heading: f64,
    #[serde(rename = "Fused X")]
    x: f64,
    #[serde(rename = "Fused Y")]
    y: f64,
    #[serde(rename = "Fused Z")]
    z: f64,
    #[serde(rename = "Solves")]
    solves: u64,
}

fn noise(rng: &mut Pcg64, scale: f64) -> Vector3<f64> {
    Vector3::new(
        rng.random_range(-scale..scale),
        rng.random_range(-scale..scale),
        rng.random_range(-scale..scale),
    )
}

/// Ground-truth device pose at time `t`
fn truth(t: f64) -> (Rotation3<f64>, Vector3<f64>) {
    let yaw = 0.4 * t;
    let pitch = 0.15 * (0.8 * t).sin();
    let rotation = Rotation3::from_euler_angles(0.0, pitch, yaw);
    let translation = Vector3::new((0.3 * t).cos(), (0.3 * t).sin(), 1.5);
    (rotation, translation)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let settings = FrontendSettings::default();
    let north = settings.convention.north();
    let up = settings.convention.up();

    let worker = Arc::new(PoseEstimatorWorker::with_settings(WorkerSettings {
        convention: settings.convention,
        ..Default::default()
    }));
    worker.start()?;

    let mut frontend = SensorFrontend::with_settings(Arc::clone(&worker), settings);
    let mut rng = Pcg64::seed_from_u64(2024);
    let mut writer = csv::Writer::from_path("replay.csv")?;

    let samples = (DURATION * SAMPLE_RATE) as usize;
    println!("Replaying {samples} frames at {SAMPLE_RATE} Hz...");

    for i in 0..samples {
        let time = i as f64 / SAMPLE_RATE;
        let (rotation, translation) = truth(time);
        let to_body = rotation.inverse();

        // Sensors run faster than the camera
        for _ in 0..4 {
            frontend.on_accelerometer(to_body * up * GRAVITY + noise(&mut rng, 0.05));
            frontend.on_magnetometer(to_body * north * FIELD_STRENGTH + noise(&mut rng, 0.5));
        }

        // Tracker jitter on the camera pose
        let camera_rotation = rotation * Rotation3::new(noise(&mut rng, 0.01));
        let camera_translation = translation + noise(&mut rng, 0.005);
        let fused = frontend.on_camera_pose(camera_rotation, camera_translation);

        writer.serialize(Record {
            time,
            true_heading: calculate_heading(&rotation, &north, &up) * RAD_TO_DEG,
            camera_heading: calculate_heading(&camera_rotation, &north, &up) * RAD_TO_DEG,
            fused_heading: worker.snapshot_heading() * RAD_TO_DEG,
            x: fused.translation.x,
            y: fused.translation.y,
            z: fused.translation.z,
            solves: worker.stats().solves,
        })?;

        if i % 120 == 0 {
            println!(
                "t={:.1}s heading: true={:.1}° fused={:.1}°",
                time,
                calculate_heading(&rotation, &north, &up) * RAD_TO_DEG,
                worker.snapshot_heading() * RAD_TO_DEG
            );
        }

        thread::sleep(Duration::from_secs_f64(1.0 / SAMPLE_RATE));
    }

    writer.flush()?;
    worker.stop()?;

    let stats = worker.stats();
    println!("✓ {} ticks processed, {} solves published", stats.ticks, stats.solves);
    println!("✓ Trajectory saved to replay.csv");
    Ok(())
}
