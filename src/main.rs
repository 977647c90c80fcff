//! Walk-through demo: a simulated scanner streams noisy RSSI batches to the
//! position tracker, which reports fixes and point-of-interest changes.

use beacon_locator::core::{Point2D, ScanBatch, ScanReading};
use beacon_locator::navigation::{FacilityMap, PoiState, Zone};
use beacon_locator::processing::{PathLossModel, PositionTracker, TrackerUpdate};
use beacon_locator::registry::BeaconStore;
use beacon_locator::utils::ConfigurationManager;
use clap::Parser;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

/// Nominal time between scan cycles, used for batch timestamps
const SCAN_PERIOD_MS: u64 = 1000;

/// Receivers closer than this to a beacon read it as if at this range
const MIN_SIMULATED_RANGE_M: f64 = 0.05;

// Example:
// RUST_LOG=info cargo run -- --steps 30 --noise-db 3 --seed 7

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
struct DemoArgs {
    /// System configuration file (JSON); built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Beacon registry file (JSON); the bundled installation when omitted
    #[arg(short, long)]
    beacons: Option<PathBuf>,

    /// Facility map file (JSON); a small demo floor when omitted
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Number of scan cycles along the walk
    #[arg(long, default_value_t = 40)]
    steps: usize,

    /// Peak RSSI noise added to every reading, in dB
    #[arg(long, default_value_t = 2.0)]
    noise_db: f64,

    /// Seed for the noise generator
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Wall-clock delay between scan cycles
    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = DemoArgs::parse();

    let config = match &args.config {
        Some(path) => ConfigurationManager::from_file(path)?,
        None => ConfigurationManager::new(),
    }
    .get_system_config()
    .clone();

    let store = match &args.beacons {
        Some(path) => BeaconStore::load_from_file(path)?,
        None => BeaconStore::with_defaults(),
    };

    let map = match &args.map {
        Some(path) => FacilityMap::load_from_file(path)?,
        None => demo_map(),
    };

    let route = map
        .paths
        .first()
        .filter(|path| !path.is_empty())
        .cloned()
        .unwrap_or_else(|| vec![Point2D::new(0.0, 0.0), Point2D::new(map.max_x, map.max_y)]);

    let model = PathLossModel::new(config.ranging.path_loss_exponent)?;
    let mut tracker = PositionTracker::new(&config)?;
    let tolerance = config.navigation.path_tolerance_m;

    let (tx, rx) = mpsc::channel();
    let scanner = Scanner {
        store: store.clone(),
        model,
        route,
        steps: args.steps.max(1),
        noise_db: args.noise_db.abs(),
        interval: Duration::from_millis(args.interval_ms),
        rng: StdRng::seed_from_u64(args.seed),
    };
    let producer = thread::spawn(move || scanner.walk(tx));

    let mut poi = PoiState::None;
    let mut fixes: Vec<(u64, Point2D)> = Vec::new();
    let stats = tracker.run(&store, rx, |update| match update {
        TrackerUpdate::Fix(fix) => {
            let position = map.clamp(&fix.position);
            let state = map.classify(Some(position), tolerance);
            let hdop = fix.solution.dop.map(|d| d.hdop).unwrap_or(f64::NAN);
            println!(
                "{:>6} ms  {}  hdop {:>6.2}  rms {:.3} m  [{}]",
                fix.timestamp_ms,
                position,
                hdop,
                fix.solution.rms_residual,
                fix.beacons_used.join(", ")
            );
            if state != poi {
                info!("Point of interest changed: {} -> {}", poi, state);
                poi = state;
            }
            fixes.push((fix.timestamp_ms, position));
        }
        TrackerUpdate::Skipped {
            timestamp_ms,
            reason,
            last_known,
        } => match last_known {
            Some(p) => println!("{:>6} ms  skipped ({}), holding {}", timestamp_ms, reason.kind_name(), p),
            None => println!("{:>6} ms  skipped ({}), no fix yet", timestamp_ms, reason.kind_name()),
        },
    });

    let truth = producer.join().map_err(|_| "scan simulator panicked")?;

    let errors: Vec<f64> = fixes
        .iter()
        .filter_map(|(timestamp, position)| {
            let step = (timestamp / SCAN_PERIOD_MS) as usize;
            truth.get(step).map(|t| t.distance_to(position))
        })
        .collect();

    println!();
    println!(
        "{} scans, {} fixes, {} skipped",
        stats.batches, stats.fixes, stats.skipped
    );
    for (kind, count) in &stats.skip_reasons {
        println!("  {:<26} {}", kind, count);
    }
    if !errors.is_empty() {
        let mean = errors.iter().sum::<f64>() / errors.len() as f64;
        let worst = errors.iter().cloned().fold(0.0, f64::max);
        println!("position error: mean {:.3} m, worst {:.3} m", mean, worst);
    }
    println!("final point of interest: {}", poi);

    Ok(())
}

/// Small floor with one start zone, one end zone and a guide path between them
fn demo_map() -> FacilityMap {
    FacilityMap {
        max_x: 2.0,
        max_y: 2.0,
        start_zones: vec![Zone::rectangle(0.0, 0.0, 0.5, 0.5)],
        end_zones: vec![Zone::rectangle(1.5, 1.5, 0.5, 0.5)],
        paths: vec![vec![
            Point2D::new(0.25, 0.25),
            Point2D::new(0.25, 1.75),
            Point2D::new(1.75, 1.75),
        ]],
    }
}

/// Point at `fraction` of the way along a polyline
fn point_along(route: &[Point2D], fraction: f64) -> Point2D {
    let total: f64 = route.windows(2).map(|w| w[0].distance_to(&w[1])).sum();
    let mut remaining = fraction.clamp(0.0, 1.0) * total;

    for w in route.windows(2) {
        let length = w[0].distance_to(&w[1]);
        if remaining <= length && length > 0.0 {
            let t = remaining / length;
            return Point2D::new(
                w[0].x + t * (w[1].x - w[0].x),
                w[0].y + t * (w[1].y - w[0].y),
            );
        }
        remaining -= length;
    }
    route.last().copied().unwrap_or_default()
}

/// Stand-in for the BLE scanner: emits one batch per step along the route
struct Scanner {
    store: BeaconStore,
    model: PathLossModel,
    route: Vec<Point2D>,
    steps: usize,
    noise_db: f64,
    interval: Duration,
    rng: StdRng,
}

impl Scanner {
    /// Returns the true position of every step
    fn walk(mut self, tx: Sender<ScanBatch>) -> Vec<Point2D> {
        let mut truth = Vec::with_capacity(self.steps + 1);

        for step in 0..=self.steps {
            let user = point_along(&self.route, step as f64 / self.steps as f64);
            truth.push(user);
            debug!("step {}: walking at {}", step, user);

            let batch = ScanBatch::new(step as u64 * SCAN_PERIOD_MS, self.scan(&user));
            for alert in self.store.proximity_alerts(&batch) {
                info!("Near {} ({} dBm > {} dBm)", alert.name, alert.rssi, alert.sensitivity);
            }

            if tx.send(batch).is_err() {
                warn!("Tracker hung up, stopping the walk at step {}", step);
                break;
            }
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
        truth
    }

    fn scan(&mut self, user: &Point2D) -> Vec<ScanReading> {
        let mut readings = Vec::with_capacity(self.store.len());
        for (address, beacon) in self.store.iter() {
            let range = beacon.position.distance_to(user).max(MIN_SIMULATED_RANGE_M);
            let rssi = match self.model.expected_rssi(beacon, range) {
                Ok(rssi) => rssi,
                Err(e) => {
                    warn!("Cannot simulate {}: {}", beacon, e);
                    continue;
                }
            };
            let noise = if self.noise_db > 0.0 {
                self.rng.gen_range(-self.noise_db..=self.noise_db)
            } else {
                0.0
            };
            readings.push(ScanReading::new(address, (rssi + noise).round() as i32));
        }
        readings
    }
}
