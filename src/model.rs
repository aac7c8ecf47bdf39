use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};
use serde::Deserialize;

macro_rules! string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Box<str>);

        impl $name {
            pub fn new(id: impl AsRef<str>) -> Self {
                Self(id.as_ref().into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_fmt(format_args!("{}#{}", $prefix, self.0))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(StopId, "s");
string_id!(RouteId, "r");
string_id!(BusId, "b");

/// Speeds a bus may report, in km/h.
pub const MIN_SPEED: f64 = 5.0;
pub const MAX_SPEED: f64 = 35.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// A named point served by one or more routes.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: StopId,
    pub name: Box<str>,
    pub position: Coordinate,
    pub routes: Vec<RouteId>,
}

impl Stop {
    pub fn served_by(&self, route: &RouteId) -> bool {
        self.routes.contains(route)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub name: Box<str>,
    /// Hex color used for badges and markers, e.g. `#3b82f6`.
    pub color: Box<str>,
    /// Stops in visiting order.
    pub stops: Vec<StopId>,
    pub frequency: Box<str>,
    pub operating_hours: Box<str>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub route: RouteId,
    pub position: Coordinate,
    /// Degrees clockwise from north.
    pub heading: f64,
    /// km/h
    pub speed: f64,
    pub last_update: DateTime<Utc>,
    pub next_stop: StopId,
}
