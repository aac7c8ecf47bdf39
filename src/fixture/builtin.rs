use chrono::{DateTime, Utc};

use crate::model::{Bus, Coordinate, Route, Stop};

fn stop(id: &str, name: &str, lat: f64, lng: f64, routes: &[&str]) -> Stop {
    Stop {
        id: id.into(),
        name: name.into(),
        position: Coordinate::new(lat, lng),
        routes: routes.iter().map(|&it| it.into()).collect(),
    }
}

fn route(
    id: &str,
    name: &str,
    color: &str,
    stops: &[&str],
    frequency: &str,
    operating_hours: &str,
) -> Route {
    Route {
        id: id.into(),
        name: name.into(),
        color: color.into(),
        stops: stops.iter().map(|&it| it.into()).collect(),
        frequency: frequency.into(),
        operating_hours: operating_hours.into(),
    }
}

#[allow(clippy::too_many_arguments)]
fn bus(
    id: &str,
    route: &str,
    lat: f64,
    lng: f64,
    heading: f64,
    speed: f64,
    next_stop: &str,
    now: DateTime<Utc>,
) -> Bus {
    Bus {
        id: id.into(),
        route: route.into(),
        position: Coordinate::new(lat, lng),
        heading,
        speed,
        last_update: now,
        next_stop: next_stop.into(),
    }
}

pub fn stops() -> Vec<Stop> {
    vec![
        stop("stop-1", "City Hall", 40.7589, -73.9851, &["route-1", "route-2"]),
        stop("stop-2", "Central Park", 40.7829, -73.9654, &["route-1"]),
        stop("stop-3", "Times Square", 40.7580, -73.9855, &["route-2", "route-3"]),
        stop("stop-4", "Grand Central", 40.7527, -73.9772, &["route-1", "route-3"]),
        stop("stop-5", "Brooklyn Bridge", 40.7061, -73.9969, &["route-2"]),
        stop("stop-6", "Union Square", 40.7359, -73.9911, &["route-1", "route-3"]),
        stop("stop-7", "Washington Square", 40.7308, -74.0014, &["route-2"]),
        stop("stop-8", "Financial District", 40.7074, -74.0113, &["route-3"]),
    ]
}

pub fn routes() -> Vec<Route> {
    vec![
        route(
            "route-1",
            "Blue Line Express",
            "#3b82f6",
            &["stop-1", "stop-2", "stop-4", "stop-6"],
            "Every 8 minutes",
            "5:30 AM - 11:30 PM",
        ),
        route(
            "route-2",
            "Green Circle",
            "#22c55e",
            &["stop-1", "stop-3", "stop-5", "stop-7"],
            "Every 12 minutes",
            "6:00 AM - 10:00 PM",
        ),
        route(
            "route-3",
            "Downtown Shuttle",
            "#f59e0b",
            &["stop-3", "stop-4", "stop-6", "stop-8"],
            "Every 15 minutes",
            "7:00 AM - 9:00 PM",
        ),
    ]
}

pub fn buses(now: DateTime<Utc>) -> Vec<Bus> {
    vec![
        bus("bus-1", "route-1", 40.7589, -73.9851, 45.0, 25.0, "stop-2", now),
        bus("bus-2", "route-2", 40.7580, -73.9855, 180.0, 15.0, "stop-5", now),
        bus("bus-3", "route-3", 40.7527, -73.9772, 270.0, 30.0, "stop-6", now),
    ]
}
