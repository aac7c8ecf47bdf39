use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::{Bus, BusId, Coordinate, Route, RouteId, Stop, StopId};

/// Separator for list-valued columns, e.g. the routes serving a stop.
const LIST_SEPARATOR: char = '|';

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StopRow {
    #[serde(rename = "# stop_id")]
    stop_id: StopId,
    name: String,
    lat: f64,
    lng: f64,
    routes: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RouteRow {
    #[serde(rename = "# route_id")]
    route_id: RouteId,
    name: String,
    color: String,
    stops: String,
    frequency: String,
    operating_hours: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BusRow {
    #[serde(rename = "# bus_id")]
    bus_id: BusId,
    route_id: RouteId,
    lat: f64,
    lng: f64,
    heading: f64,
    speed: f64,
    next_stop: StopId,
}

fn reader() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::All).delimiter(b';');

    builder
}

fn split_list<T: for<'a> From<&'a str>>(value: &str) -> Vec<T> {
    value
        .split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|it| !it.is_empty())
        .map(T::from)
        .collect()
}

pub fn parse_stops(stream: impl std::io::Read) -> Result<Vec<Stop>, csv::Error> {
    reader()
        .from_reader(stream)
        .deserialize()
        .map(|row| {
            let row: StopRow = row?;
            Ok(Stop {
                id: row.stop_id,
                name: row.name.into(),
                position: Coordinate::new(row.lat, row.lng),
                routes: split_list(&row.routes),
            })
        })
        .collect()
}

pub fn parse_routes(stream: impl std::io::Read) -> Result<Vec<Route>, csv::Error> {
    reader()
        .from_reader(stream)
        .deserialize()
        .map(|row| {
            let row: RouteRow = row?;
            Ok(Route {
                id: row.route_id,
                name: row.name.into(),
                color: row.color.into(),
                stops: split_list(&row.stops),
                frequency: row.frequency.into(),
                operating_hours: row.operating_hours.into(),
            })
        })
        .collect()
}

/// Buses carry no timestamp on disk; every bus starts out as updated at `now`.
pub fn parse_buses(
    stream: impl std::io::Read,
    now: DateTime<Utc>,
) -> Result<Vec<Bus>, csv::Error> {
    reader()
        .from_reader(stream)
        .deserialize()
        .map(|row| {
            let row: BusRow = row?;
            Ok(Bus {
                id: row.bus_id,
                route: row.route_id,
                position: Coordinate::new(row.lat, row.lng),
                heading: row.heading,
                speed: row.speed,
                last_update: now,
                next_stop: row.next_stop,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::model::{Coordinate, RouteId, StopId};

    use super::{parse_buses, parse_routes, parse_stops};

    #[test]
    fn test_parse_stops() {
        let content = r#"# stop_id; name; lat; lng; routes
stop-a; Harbour; 54.32; 10.13; line-1 | line-2
stop-b; Old Town; 54.31; 10.14;"#;

        let stops = parse_stops(content.as_bytes()).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].id, StopId::new("stop-a"));
        assert_eq!(&*stops[0].name, "Harbour");
        assert_eq!(stops[0].position, Coordinate::new(54.32, 10.13));
        assert_eq!(
            stops[0].routes,
            vec![RouteId::new("line-1"), RouteId::new("line-2")]
        );
        assert!(stops[1].routes.is_empty());
    }

    #[test]
    fn test_parse_routes() {
        let content = r#"# route_id; name; color; stops; frequency; operating_hours
line-1; Harbour Line; #0ea5e9; stop-a|stop-b; Every 10 minutes; 6:00 AM - 8:00 PM"#;

        let routes = parse_routes(content.as_bytes()).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(&*routes[0].color, "#0ea5e9");
        assert_eq!(
            routes[0].stops,
            vec![StopId::new("stop-a"), StopId::new("stop-b")]
        );
        assert_eq!(&*routes[0].operating_hours, "6:00 AM - 8:00 PM");
    }

    #[test]
    fn test_parse_buses() {
        let content = r#"# bus_id; route_id; lat; lng; heading; speed; next_stop
bus-a; line-1; 54.32; 10.13; 90; 20; stop-b"#;
        let now = Utc::now();

        let buses = parse_buses(content.as_bytes(), now).unwrap();
        assert_eq!(buses.len(), 1);
        assert_eq!(buses[0].route, RouteId::new("line-1"));
        assert_eq!(buses[0].next_stop, StopId::new("stop-b"));
        assert_eq!(buses[0].speed, 20.0);
        assert_eq!(buses[0].last_update, now);
    }

    #[test]
    fn test_parse_rejects_malformed_number() {
        let content = r#"# bus_id; route_id; lat; lng; heading; speed; next_stop
bus-a; line-1; north; 10.13; 90; 20; stop-b"#;

        assert!(parse_buses(content.as_bytes(), Utc::now()).is_err());
    }
}
