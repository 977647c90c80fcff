//! Scan-cycle position tracking
//!
//! Turns each batch of BLE advertisements into at most one position fix.
//! Failed cycles are reported but never clear the last known good fix.

use crate::algorithms::multilateration::{Multilateration, Solution};
use crate::core::{Observation, Point2D, ScanBatch};
use crate::processing::ranging::PathLossModel;
use crate::processing::smoothing::RssiSmoother;
use crate::registry::BeaconStore;
use crate::utils::config::{SystemConfig, TrackerConfig};
use crate::validation::{PositioningError, PositioningResult};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::Receiver;

/// A solved position for one scan cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFix {
    pub position: Point2D,
    pub timestamp_ms: u64,
    /// Addresses of the beacons that went into the solve, strongest first
    pub beacons_used: Vec<String>,
    pub solution: Solution,
}

/// Outcome of processing one scan batch
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerUpdate {
    Fix(PositionFix),
    Skipped {
        timestamp_ms: u64,
        reason: PositioningError,
        /// Last good position, unchanged by this cycle
        last_known: Option<Point2D>,
    },
}

impl TrackerUpdate {
    /// Position to present to the user after this cycle
    pub fn position(&self) -> Option<Point2D> {
        match self {
            TrackerUpdate::Fix(fix) => Some(fix.position),
            TrackerUpdate::Skipped { last_known, .. } => *last_known,
        }
    }
}

/// Counters accumulated over the tracker's lifetime
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerStats {
    pub batches: usize,
    pub fixes: usize,
    pub skipped: usize,
    /// Skipped cycles by error kind
    pub skip_reasons: BTreeMap<&'static str, usize>,
}

/// Reading chosen for a solve
#[derive(Debug, Clone)]
struct Selected {
    address: String,
    rssi: f64,
}

pub struct PositionTracker {
    solver: Multilateration,
    model: PathLossModel,
    config: TrackerConfig,
    smoother: RssiSmoother,
    last_fix: Option<PositionFix>,
    stats: TrackerStats,
}

impl PositionTracker {
    pub fn new(config: &SystemConfig) -> PositioningResult<Self> {
        Ok(Self {
            solver: Multilateration::new(config.solver.clone()),
            model: PathLossModel::new(config.ranging.path_loss_exponent)?,
            config: config.tracker.clone(),
            smoother: RssiSmoother::new(config.tracker.smoothing_window),
            last_fix: None,
            stats: TrackerStats::default(),
        })
    }

    pub fn last_fix(&self) -> Option<&PositionFix> {
        self.last_fix.as_ref()
    }

    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// Drop the last fix and any smoothing history
    pub fn reset(&mut self) {
        self.last_fix = None;
        self.smoother.clear();
    }

    /// Process one scan cycle against the beacons in `store`
    pub fn process_batch(&mut self, store: &BeaconStore, batch: &ScanBatch) -> TrackerUpdate {
        self.stats.batches += 1;

        match self.solve_batch(store, batch) {
            Ok(fix) => {
                self.stats.fixes += 1;
                self.last_fix = Some(fix.clone());
                TrackerUpdate::Fix(fix)
            }
            Err(reason) => {
                warn!("Skipping scan at {} ms: {}", batch.timestamp_ms, reason);
                self.stats.skipped += 1;
                *self.stats.skip_reasons.entry(reason.kind_name()).or_insert(0) += 1;
                TrackerUpdate::Skipped {
                    timestamp_ms: batch.timestamp_ms,
                    reason,
                    last_known: self.last_fix.as_ref().map(|f| f.position),
                }
            }
        }
    }

    /// Consume batches until every sender hangs up
    pub fn run<F>(&mut self, store: &BeaconStore, batches: Receiver<ScanBatch>, mut on_update: F) -> TrackerStats
    where
        F: FnMut(&TrackerUpdate),
    {
        info!("Position tracker started with {} known beacons", store.len());
        for batch in batches.iter() {
            let update = self.process_batch(store, &batch);
            on_update(&update);
        }
        info!(
            "Position tracker stopped: {} batches, {} fixes, {} skipped",
            self.stats.batches, self.stats.fixes, self.stats.skipped
        );
        self.stats.clone()
    }

    fn solve_batch(&mut self, store: &BeaconStore, batch: &ScanBatch) -> PositioningResult<PositionFix> {
        let selected = self.select_beacons(store, batch);

        let mut observations = Vec::with_capacity(selected.len());
        let mut beacons_used = Vec::with_capacity(selected.len());
        for reading in selected {
            let Some(beacon) = store.get(&reading.address) else {
                continue;
            };
            match self.model.distance(beacon, reading.rssi) {
                Ok(distance) => {
                    observations.push(Observation::new(beacon.position, distance));
                    beacons_used.push(reading.address);
                }
                Err(e) => warn!("Dropping reading from {}: {}", beacon, e),
            }
        }

        if observations.len() < self.config.min_beacons {
            return Err(PositioningError::insufficient(
                observations.len(),
                self.config.min_beacons,
            ));
        }

        let initial_guess = if self.config.warm_start {
            self.last_fix.as_ref().map(|f| f.position)
        } else {
            None
        };

        let solution = self.solver.solve(&observations, initial_guess)?;
        let solution = if self.config.accept_unconverged {
            solution
        } else {
            solution.into_converged()?
        };

        Ok(PositionFix {
            position: solution.position,
            timestamp_ms: batch.timestamp_ms,
            beacons_used,
            solution,
        })
    }

    /// Strongest reading per known beacon, smoothed, strongest `max_beacons` first
    fn select_beacons(&mut self, store: &BeaconStore, batch: &ScanBatch) -> Vec<Selected> {
        let mut strongest: HashMap<String, i32> = HashMap::new();
        for reading in &batch.readings {
            if !store.contains(&reading.address) {
                continue;
            }
            let address = reading.address.trim().to_ascii_uppercase();
            strongest
                .entry(address)
                .and_modify(|rssi| *rssi = (*rssi).max(reading.rssi))
                .or_insert(reading.rssi);
        }

        let mut selected: Vec<Selected> = strongest
            .into_iter()
            .map(|(address, rssi)| {
                let rssi = self.smoother.push(&address, rssi);
                Selected { address, rssi }
            })
            .collect();

        selected.sort_by(|a, b| {
            b.rssi
                .total_cmp(&a.rssi)
                .then_with(|| a.address.cmp(&b.address))
        });
        selected.truncate(self.config.max_beacons);

        debug!(
            "Selected {:?} from {} readings",
            selected.iter().map(|s| s.address.as_str()).collect::<Vec<_>>(),
            batch.readings.len()
        );
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Beacon, ScanReading};
    use std::sync::mpsc;
    use std::thread;

    const CORNER_A: &str = "02:00:00:00:00:01";
    const CORNER_B: &str = "02:00:00:00:00:02";
    const CORNER_C: &str = "02:00:00:00:00:03";
    const CORNER_D: &str = "02:00:00:00:00:04";

    fn square_store() -> BeaconStore {
        let mut store = BeaconStore::new();
        store.insert(CORNER_A, Beacon::new("A", -60, 0.0, 0.0)).unwrap();
        store.insert(CORNER_B, Beacon::new("B", -60, 4.0, 0.0)).unwrap();
        store.insert(CORNER_C, Beacon::new("C", -60, 0.0, 4.0)).unwrap();
        store.insert(CORNER_D, Beacon::new("D", -60, 4.0, 4.0)).unwrap();
        store
    }

    /// Integer RSSI each corner would report for a receiver at `user`
    fn scan_at(store: &BeaconStore, user: Point2D, timestamp_ms: u64) -> ScanBatch {
        let model = PathLossModel::default();
        let readings = store
            .iter()
            .map(|(address, beacon)| {
                let rssi = model
                    .expected_rssi(beacon, beacon.position.distance_to(&user))
                    .unwrap();
                ScanReading::new(address, rssi.round() as i32)
            })
            .collect();
        ScanBatch::new(timestamp_ms, readings)
    }

    #[test]
    fn test_fix_uses_three_strongest() {
        let store = square_store();
        let mut tracker = PositionTracker::new(&SystemConfig::default()).unwrap();
        let user = Point2D::new(1.0, 1.5);

        let mut batch = scan_at(&store, user, 100);
        // Unknown advertisers and weaker duplicates are ignored
        batch.readings.push(ScanReading::new("02:FF:FF:FF:FF:FF", -20));
        batch.readings.push(ScanReading::new(CORNER_D, -90));

        let fix = match tracker.process_batch(&store, &batch) {
            TrackerUpdate::Fix(fix) => fix,
            other => panic!("expected a fix, got {:?}", other),
        };
        assert_eq!(fix.beacons_used, vec![CORNER_A, CORNER_C, CORNER_B]);
        assert!(fix.position.distance_to(&user) < 0.3, "fix at {}", fix.position);
        assert_eq!(fix.timestamp_ms, 100);
        assert_eq!(tracker.last_fix(), Some(&fix));
    }

    #[test]
    fn test_skip_keeps_last_known_position() {
        let store = square_store();
        let mut tracker = PositionTracker::new(&SystemConfig::default()).unwrap();

        let first = tracker.process_batch(&store, &scan_at(&store, Point2D::new(2.0, 1.0), 0));
        let known = first.position().unwrap();

        let sparse = ScanBatch::new(
            1,
            vec![ScanReading::new(CORNER_A, -65), ScanReading::new(CORNER_B, -66)],
        );
        match tracker.process_batch(&store, &sparse) {
            TrackerUpdate::Skipped {
                reason, last_known, ..
            } => {
                assert_eq!(reason, PositioningError::insufficient(2, 3));
                assert_eq!(last_known, Some(known));
            }
            other => panic!("expected a skip, got {:?}", other),
        }

        assert_eq!(tracker.stats().fixes, 1);
        assert_eq!(tracker.stats().skipped, 1);
        assert_eq!(tracker.stats().skip_reasons.get("InsufficientObservations"), Some(&1));
    }

    #[test]
    fn test_collinear_selection_is_skipped() {
        let mut store = BeaconStore::new();
        store.insert(CORNER_A, Beacon::new("A", -60, 0.0, 0.0)).unwrap();
        store.insert(CORNER_B, Beacon::new("B", -60, 1.0, 0.0)).unwrap();
        store.insert(CORNER_C, Beacon::new("C", -60, 2.0, 0.0)).unwrap();

        let mut tracker = PositionTracker::new(&SystemConfig::default()).unwrap();
        let update = tracker.process_batch(&store, &scan_at(&store, Point2D::new(1.0, 1.0), 0));
        assert!(matches!(
            update,
            TrackerUpdate::Skipped {
                reason: PositioningError::DegenerateGeometry { .. },
                last_known: None,
                ..
            }
        ));
        assert!(tracker.last_fix().is_none());
    }

    #[test]
    fn test_warm_start_tracks_movement() {
        let store = square_store();
        let mut config = SystemConfig::default();
        config.tracker.warm_start = true;
        let mut tracker = PositionTracker::new(&config).unwrap();

        for (step, user) in [Point2D::new(1.0, 1.5), Point2D::new(1.2, 1.7), Point2D::new(1.5, 2.0)]
            .into_iter()
            .enumerate()
        {
            let update = tracker.process_batch(&store, &scan_at(&store, user, step as u64 * 500));
            let position = update.position().unwrap();
            assert!(position.distance_to(&user) < 0.5, "step {}: {} vs {}", step, position, user);
        }
        assert_eq!(tracker.stats().fixes, 3);
    }

    #[test]
    fn test_run_consumes_channel() {
        let store = square_store();
        let mut tracker = PositionTracker::new(&SystemConfig::default()).unwrap();

        let (tx, rx) = mpsc::channel();
        let batches: Vec<ScanBatch> = (0..5)
            .map(|i| scan_at(&store, Point2D::new(1.0 + 0.2 * i as f64, 1.5), i * 1000))
            .collect();
        let producer = thread::spawn(move || {
            for batch in batches {
                tx.send(batch).unwrap();
            }
            tx.send(ScanBatch::new(9999, Vec::new())).unwrap();
        });

        let mut seen = Vec::new();
        let stats = tracker.run(&store, rx, |update| seen.push(update.clone()));
        producer.join().unwrap();

        assert_eq!(stats.batches, 6);
        assert_eq!(stats.fixes, 5);
        assert_eq!(stats.skipped, 1);
        assert_eq!(seen.len(), 6);
        // The empty batch reports the previous fix
        assert_eq!(seen[5].position(), seen[4].position());
    }

    #[test]
    fn test_invalid_exponent_rejected() {
        let mut config = SystemConfig::default();
        config.ranging.path_loss_exponent = 0.0;
        assert!(PositionTracker::new(&config).is_err());
    }
}
