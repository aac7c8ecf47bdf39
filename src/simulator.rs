use std::io;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::Rng;

use crate::model::{Bus, Coordinate, MAX_SPEED, MIN_SPEED};
use crate::timer::{Ticker, TickerHandle};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(5000);

/// Bounds of the random walk applied on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    /// Maximum change in degrees of latitude and of longitude per tick.
    pub position: f64,
    /// Maximum change in speed per tick, before clamping.
    pub speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
}

impl Default for Jitter {
    fn default() -> Self {
        Jitter {
            position: 0.0005,
            speed: 5.0,
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
        }
    }
}

/// All bus states at one tick. Snapshots are never mutated; a tick builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    generation: u64,
    buses: Box<[Bus]>,
}

impl Snapshot {
    pub fn initial(buses: Vec<Bus>) -> Self {
        Snapshot {
            generation: 0,
            buses: buses.into_boxed_slice(),
        }
    }

    /// Number of ticks that led to this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }
}

/// Moves a single bus. Heading, route and next stop are kept as they are.
pub fn perturb<R: Rng>(
    bus: &Bus,
    jitter: &Jitter,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Bus {
    let d_lat = rng.random_range(-jitter.position..=jitter.position);
    let d_lng = rng.random_range(-jitter.position..=jitter.position);
    let d_speed = rng.random_range(-jitter.speed..=jitter.speed);
    Bus {
        position: Coordinate::new(bus.position.lat + d_lat, bus.position.lng + d_lng),
        speed: (bus.speed + d_speed).clamp(jitter.min_speed, jitter.max_speed),
        last_update: now,
        ..bus.clone()
    }
}

pub fn advance<R: Rng>(
    snapshot: &Snapshot,
    jitter: &Jitter,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Snapshot {
    Snapshot {
        generation: snapshot.generation + 1,
        buses: snapshot
            .buses
            .iter()
            .map(|bus| perturb(bus, jitter, rng, now))
            .collect(),
    }
}

/// Shared read access to the latest snapshot.
///
/// Readers get an `Arc` to a complete snapshot, which the simulator swaps out
/// wholesale, so a reader never sees a half-applied tick.
#[derive(Debug, Clone)]
pub struct SnapshotCell(Arc<RwLock<Arc<Snapshot>>>);

impl SnapshotCell {
    fn new(snapshot: Snapshot) -> Self {
        SnapshotCell(Arc::new(RwLock::new(Arc::new(snapshot))))
    }

    pub fn load(&self) -> Arc<Snapshot> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, snapshot: Arc<Snapshot>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

/// The only writer of bus state. Each view owns its own simulator.
pub struct PositionSimulator<R> {
    cell: SnapshotCell,
    jitter: Jitter,
    rng: R,
}

impl<R: Rng> PositionSimulator<R> {
    pub fn new(buses: Vec<Bus>, jitter: Jitter, rng: R) -> Self {
        PositionSimulator {
            cell: SnapshotCell::new(Snapshot::initial(buses)),
            jitter,
            rng,
        }
    }

    pub fn cell(&self) -> SnapshotCell {
        self.cell.clone()
    }

    /// Runs one tick at `now` and publishes the result.
    pub fn step(&mut self, now: DateTime<Utc>) -> Arc<Snapshot> {
        let next = Arc::new(advance(&self.cell.load(), &self.jitter, &mut self.rng, now));
        self.cell.replace(Arc::clone(&next));
        next
    }
}

impl<R: Rng + Send + 'static> PositionSimulator<R> {
    /// Starts ticking every `period` until the returned handle is stopped or dropped.
    pub fn start(mut self, period: Duration) -> io::Result<RunningSimulator> {
        let cell = self.cell();
        // One pending notification is enough; readers always load the latest snapshot.
        let (updates_tx, updates_rx) = mpsc::sync_channel(1);
        let ticker = Ticker::new(period).start(move |now, _| {
            let snapshot = self.step(now);
            debug!(
                "Published snapshot {} with {} buses",
                snapshot.generation(),
                snapshot.buses().len()
            );
            // A full or abandoned channel is fine; the cell still holds the snapshot.
            let _ = updates_tx.try_send(snapshot.generation());
        })?;
        info!("Position simulator started, ticking every {:?}", period);

        Ok(RunningSimulator {
            cell,
            updates: updates_rx,
            ticker,
        })
    }
}

/// A ticking simulator. Dropping it stops the ticks just like [`RunningSimulator::stop`].
pub struct RunningSimulator {
    cell: SnapshotCell,
    updates: Receiver<u64>,
    ticker: TickerHandle,
}

impl RunningSimulator {
    pub fn cell(&self) -> SnapshotCell {
        self.cell.clone()
    }

    /// Blocks until the next tick is published, or `timeout` elapses.
    pub fn wait_for_update(&self, timeout: Duration) -> Option<Arc<Snapshot>> {
        self.updates
            .recv_timeout(timeout)
            .ok()
            .map(|_| self.cell.load())
    }

    /// Stops ticking and returns the last published snapshot, which no tick
    /// will replace anymore.
    pub fn stop(self) -> Arc<Snapshot> {
        self.ticker.stop();
        let last = self.cell.load();
        info!("Position simulator stopped at snapshot {}", last.generation());
        last
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::fixture::Fixtures;
    use crate::model::BusId;
    use crate::test::sample::{create_sample, sample_time};

    use super::{advance, Jitter, PositionSimulator, Snapshot};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_speed_stays_in_bounds() {
        let fixtures = create_sample();
        let jitter = Jitter::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut snapshot = Snapshot::initial(fixtures.buses().to_vec());
        for _ in 0..2000 {
            snapshot = advance(&snapshot, &jitter, &mut rng, sample_time());
            for bus in snapshot.buses() {
                assert!(bus.speed >= 5.0 && bus.speed <= 35.0, "{:?}", bus);
            }
        }
        assert_eq!(snapshot.generation(), 2000);
    }

    #[test]
    fn test_position_moves_at_most_jitter() {
        let fixtures = create_sample();
        let jitter = Jitter::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut snapshot = Snapshot::initial(fixtures.buses().to_vec());
        for _ in 0..500 {
            let next = advance(&snapshot, &jitter, &mut rng, sample_time());
            for (before, after) in snapshot.buses().iter().zip(next.buses()) {
                assert!((after.position.lat - before.position.lat).abs() <= 0.0005 + EPS);
                assert!((after.position.lng - before.position.lng).abs() <= 0.0005 + EPS);
            }
            snapshot = next;
        }
    }

    #[test]
    fn test_tick_on_city_hall_bus() {
        let fixtures = Fixtures::builtin(sample_time());
        let jitter = Jitter::default();
        let later = sample_time() + chrono::Duration::seconds(5);
        for seed in 0..50 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let snapshot = advance(
                &Snapshot::initial(fixtures.buses().to_vec()),
                &jitter,
                &mut rng,
                later,
            );
            let bus = &snapshot.buses()[0];
            assert_eq!(bus.id, BusId::new("bus-1"));
            assert!(bus.position.lat >= 40.7584 - EPS && bus.position.lat <= 40.7594 + EPS);
            assert!(bus.position.lng >= -73.9856 - EPS && bus.position.lng <= -73.9846 + EPS);
            assert!(bus.speed >= 20.0 && bus.speed <= 30.0);
            assert_abs_diff_eq!(bus.heading, 45.0);
            assert_eq!(bus.next_stop, fixtures.buses()[0].next_stop);
            assert_eq!(bus.route, fixtures.buses()[0].route);
            assert_eq!(bus.last_update, later);
        }
    }

    #[test]
    fn test_speed_is_clamped() {
        let fixtures = create_sample();
        let jitter = Jitter {
            speed: 100.0,
            ..Jitter::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut snapshot = Snapshot::initial(fixtures.buses().to_vec());
        let mut clamped = 0;
        for _ in 0..100 {
            snapshot = advance(&snapshot, &jitter, &mut rng, sample_time());
            for bus in snapshot.buses() {
                assert!((5.0..=35.0).contains(&bus.speed));
                if bus.speed == 5.0 || bus.speed == 35.0 {
                    clamped += 1;
                }
            }
        }
        assert!(clamped > 0);
    }

    #[test]
    fn test_zero_jitter_keeps_positions() {
        let fixtures = create_sample();
        let jitter = Jitter {
            position: 0.0,
            speed: 0.0,
            ..Jitter::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let initial = Snapshot::initial(fixtures.buses().to_vec());
        let next = advance(&initial, &jitter, &mut rng, sample_time());
        assert_eq!(next.buses(), initial.buses());
        assert_eq!(next.generation(), 1);
    }

    #[test]
    fn test_same_seed_same_walk() {
        let fixtures = create_sample();
        let run = |seed| {
            let mut simulator = PositionSimulator::new(
                fixtures.buses().to_vec(),
                Jitter::default(),
                ChaCha8Rng::seed_from_u64(seed),
            );
            for _ in 0..10 {
                simulator.step(sample_time());
            }
            simulator.cell().load()
        };
        assert_eq!(run(5), run(5));
        assert_ne!(run(5), run(6));
    }

    #[test]
    fn test_step_replaces_snapshot_for_observers() {
        let fixtures = create_sample();
        let mut simulator = PositionSimulator::new(
            fixtures.buses().to_vec(),
            Jitter::default(),
            ChaCha8Rng::seed_from_u64(1),
        );
        let observer = simulator.cell();
        let before = observer.load();
        let published = simulator.step(sample_time());
        let after = observer.load();

        assert_eq!(before.generation(), 0);
        assert_eq!(after.generation(), 1);
        assert_eq!(after, published);
        // The old snapshot is left untouched.
        assert_eq!(before.buses(), fixtures.buses());
    }

    #[test]
    fn test_stop_freezes_snapshot() {
        let fixtures = create_sample();
        let simulator = PositionSimulator::new(
            fixtures.buses().to_vec(),
            Jitter::default(),
            ChaCha8Rng::seed_from_u64(2),
        );
        let running = simulator.start(Duration::from_millis(5)).unwrap();
        let observer = running.cell();

        let update = running.wait_for_update(Duration::from_secs(5)).unwrap();
        assert!(update.generation() >= 1);

        let last = running.stop();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(observer.load().generation(), last.generation());
        assert_eq!(observer.load(), last);
    }

    #[test]
    fn test_unread_updates_do_not_pile_up() {
        let fixtures = create_sample();
        let running = PositionSimulator::new(
            fixtures.buses().to_vec(),
            Jitter::default(),
            ChaCha8Rng::seed_from_u64(4),
        )
        .start(Duration::from_millis(20))
        .unwrap();

        thread::sleep(Duration::from_millis(150));
        assert!(running.cell().load().generation() >= 3);
        assert!(running.updates.try_iter().count() <= 1);

        let update = running.wait_for_update(Duration::from_secs(5)).unwrap();
        assert!(update.generation() >= 3);
        running.stop();
    }
}
