use std::fmt::Display;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{info, warn};
use rustc_hash::FxHashMap;

use crate::model::{Bus, BusId, Route, RouteId, Stop, StopId, MAX_SPEED, MIN_SPEED};

pub mod builtin;
pub mod parse;

pub const STOPS_FILE: &str = "stops.csv";
pub const ROUTES_FILE: &str = "routes.csv";
pub const BUSES_FILE: &str = "buses.csv";

/// The read-only catalog of stops, routes and the initial bus positions.
///
/// Routes and stops never change once built. The buses are only the seed for a
/// [`crate::simulator::PositionSimulator`], which owns the working set.
#[derive(Debug, Clone)]
pub struct Fixtures {
    stops: Box<[Stop]>,
    routes: Box<[Route]>,
    buses: Box<[Bus]>,
    stop_idx: FxHashMap<StopId, usize>,
    route_idx: FxHashMap<RouteId, usize>,
}

#[derive(Debug)]
pub enum FixtureError {
    Io(PathBuf, io::Error),
    Csv(PathBuf, csv::Error),
    DuplicateStop(StopId),
    DuplicateRoute(RouteId),
    DuplicateBus(BusId),
    NonFiniteStop(StopId),
    NonFiniteBus(BusId),
    SpeedOutOfRange(BusId, f64),
    Dangling(Box<[DanglingReference]>),
}

impl Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FixtureError::Io(path, err) => write!(f, "could not open {}: {}", path.display(), err),
            FixtureError::Csv(path, err) => {
                write!(f, "could not parse {}: {}", path.display(), err)
            }
            FixtureError::DuplicateStop(id) => write!(f, "duplicate stop id {}", id),
            FixtureError::DuplicateRoute(id) => write!(f, "duplicate route id {}", id),
            FixtureError::DuplicateBus(id) => write!(f, "duplicate bus id {}", id),
            FixtureError::NonFiniteStop(id) => {
                write!(f, "stop {} has a non-finite coordinate", id)
            }
            FixtureError::NonFiniteBus(id) => write!(
                f,
                "bus {} has a non-finite coordinate, heading or speed",
                id
            ),
            FixtureError::SpeedOutOfRange(id, speed) => write!(
                f,
                "bus {} runs at {} km/h, outside of {}..={}",
                id, speed, MIN_SPEED, MAX_SPEED
            ),
            FixtureError::Dangling(references) => write!(
                f,
                "{} dangling reference(s): {}",
                references.len(),
                references.iter().join(", ")
            ),
        }
    }
}

impl std::error::Error for FixtureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FixtureError::Io(_, err) => Some(err),
            FixtureError::Csv(_, err) => Some(err),
            _ => None,
        }
    }
}

/// An identifier that does not resolve against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DanglingReference {
    BusRoute { bus: BusId, route: RouteId },
    BusNextStop { bus: BusId, stop: StopId },
    RouteStop { route: RouteId, stop: StopId },
    StopRoute { stop: StopId, route: RouteId },
}

impl Display for DanglingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DanglingReference::BusRoute { bus, route } => {
                write!(f, "bus {} runs on unknown route {}", bus, route)
            }
            DanglingReference::BusNextStop { bus, stop } => {
                write!(f, "bus {} heads to unknown stop {}", bus, stop)
            }
            DanglingReference::RouteStop { route, stop } => {
                write!(f, "route {} visits unknown stop {}", route, stop)
            }
            DanglingReference::StopRoute { stop, route } => {
                write!(f, "stop {} lists unknown route {}", stop, route)
            }
        }
    }
}

/// What to do with dangling references after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferencePolicy {
    /// Log each dangling reference and carry on; lookups resolve them to nothing.
    #[default]
    Tolerate,
    /// Refuse the fixtures.
    Strict,
}

fn build_index<Id: Clone + Eq + std::hash::Hash, T>(
    items: &[T],
    id: impl Fn(&T) -> &Id,
) -> Result<FxHashMap<Id, usize>, Id> {
    let mut idx = FxHashMap::default();
    idx.reserve(items.len());
    for (i, item) in items.iter().enumerate() {
        if idx.insert(id(item).clone(), i).is_some() {
            return Err(id(item).clone());
        }
    }
    Ok(idx)
}

fn check_values(stops: &[Stop], buses: &[Bus]) -> Result<(), FixtureError> {
    if let Some(stop) = stops.iter().find(|it| !it.position.is_finite()) {
        return Err(FixtureError::NonFiniteStop(stop.id.clone()));
    }
    for bus in buses {
        if !(bus.position.is_finite() && bus.heading.is_finite() && bus.speed.is_finite()) {
            return Err(FixtureError::NonFiniteBus(bus.id.clone()));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&bus.speed) {
            return Err(FixtureError::SpeedOutOfRange(bus.id.clone(), bus.speed));
        }
    }
    Ok(())
}

impl Fixtures {
    pub fn new(
        stops: Vec<Stop>,
        routes: Vec<Route>,
        buses: Vec<Bus>,
    ) -> Result<Fixtures, FixtureError> {
        let stop_idx = build_index(&stops, |it| &it.id).map_err(FixtureError::DuplicateStop)?;
        let route_idx = build_index(&routes, |it| &it.id).map_err(FixtureError::DuplicateRoute)?;
        build_index(&buses, |it| &it.id).map_err(FixtureError::DuplicateBus)?;
        check_values(&stops, &buses)?;

        Ok(Fixtures {
            stops: stops.into_boxed_slice(),
            routes: routes.into_boxed_slice(),
            buses: buses.into_boxed_slice(),
            stop_idx,
            route_idx,
        })
    }

    /// The stock catalog: eight Manhattan stops, three routes, one bus per route.
    pub fn builtin(now: DateTime<Utc>) -> Fixtures {
        let stops = builtin::stops();
        let routes = builtin::routes();
        let buses = builtin::buses(now);
        let stop_idx = stops
            .iter()
            .enumerate()
            .map(|(i, it)| (it.id.clone(), i))
            .collect();
        let route_idx = routes
            .iter()
            .enumerate()
            .map(|(i, it)| (it.id.clone(), i))
            .collect();
        Fixtures {
            stops: stops.into_boxed_slice(),
            routes: routes.into_boxed_slice(),
            buses: buses.into_boxed_slice(),
            stop_idx,
            route_idx,
        }
    }

    /// Loads `stops.csv`, `routes.csv` and (optionally) `buses.csv` from `dir`.
    pub fn load_dir(dir: &Path, now: DateTime<Utc>) -> Result<Fixtures, FixtureError> {
        let open = |name: &str| {
            let path = dir.join(name);
            File::open(&path).map_err(|err| FixtureError::Io(path, err))
        };

        let stops = parse::parse_stops(open(STOPS_FILE)?)
            .map_err(|err| FixtureError::Csv(dir.join(STOPS_FILE), err))?;
        let routes = parse::parse_routes(open(ROUTES_FILE)?)
            .map_err(|err| FixtureError::Csv(dir.join(ROUTES_FILE), err))?;
        let buses = match open(BUSES_FILE) {
            Ok(file) => parse::parse_buses(file, now)
                .map_err(|err| FixtureError::Csv(dir.join(BUSES_FILE), err))?,
            Err(FixtureError::Io(path, err)) if err.kind() == io::ErrorKind::NotFound => {
                info!("No bus file found at {}, starting without buses", path.display());
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        info!(
            "Loaded {} stops, {} routes and {} buses from {}",
            stops.len(),
            routes.len(),
            buses.len(),
            dir.display()
        );
        Fixtures::new(stops, routes, buses)
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn stop(&self, id: &StopId) -> Option<&Stop> {
        self.stop_idx.get(id).map(|&i| &self.stops[i])
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.route_idx.get(id).map(|&i| &self.routes[i])
    }

    /// Every reference in the catalog that does not resolve, in catalog order.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for bus in self.buses.iter() {
            if self.route(&bus.route).is_none() {
                dangling.push(DanglingReference::BusRoute {
                    bus: bus.id.clone(),
                    route: bus.route.clone(),
                });
            }
            if self.stop(&bus.next_stop).is_none() {
                dangling.push(DanglingReference::BusNextStop {
                    bus: bus.id.clone(),
                    stop: bus.next_stop.clone(),
                });
            }
        }
        for route in self.routes.iter() {
            for stop in route.stops.iter().filter(|it| self.stop(it).is_none()) {
                dangling.push(DanglingReference::RouteStop {
                    route: route.id.clone(),
                    stop: stop.clone(),
                });
            }
        }
        for stop in self.stops.iter() {
            for route in stop.routes.iter().filter(|it| self.route(it).is_none()) {
                dangling.push(DanglingReference::StopRoute {
                    stop: stop.id.clone(),
                    route: route.clone(),
                });
            }
        }
        dangling
    }

    /// Applies `policy` to the catalog's dangling references.
    pub fn check_references(&self, policy: ReferencePolicy) -> Result<(), FixtureError> {
        let dangling = self.dangling_references();
        if dangling.is_empty() {
            return Ok(());
        }
        match policy {
            ReferencePolicy::Tolerate => {
                for reference in &dangling {
                    warn!("Dangling reference: {}", reference);
                }
                Ok(())
            }
            ReferencePolicy::Strict => Err(FixtureError::Dangling(dangling.into_boxed_slice())),
        }
    }
}
