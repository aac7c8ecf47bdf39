use crate::model::{Bus, RouteId, Stop};
use crate::simulator::Snapshot;

/// The optional route a view is narrowed to. An absent selector shows everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSelector(Option<RouteId>);

impl RouteSelector {
    pub fn all() -> Self {
        RouteSelector(None)
    }

    pub fn route(id: impl Into<RouteId>) -> Self {
        RouteSelector(Some(id.into()))
    }

    /// Narrows to `value` unless it is missing or blank.
    pub fn from_value(value: Option<&str>) -> Self {
        RouteSelector(
            value
                .map(str::trim)
                .filter(|it| !it.is_empty())
                .map(RouteId::new),
        )
    }

    /// Reads the `route` parameter of a query string such as `route=route-1&x=y`.
    /// The value is form-decoded, and an empty value counts as absent.
    pub fn from_query(query: &str) -> Self {
        let route = form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "route")
            .map(|(_, value)| value);
        RouteSelector::from_value(route.as_deref())
    }

    pub fn id(&self) -> Option<&RouteId> {
        self.0.as_ref()
    }

    pub fn matches_bus(&self, bus: &Bus) -> bool {
        self.0.as_ref().map_or(true, |route| bus.route == *route)
    }

    pub fn matches_stop(&self, stop: &Stop) -> bool {
        self.0.as_ref().map_or(true, |route| stop.served_by(route))
    }
}

impl From<Option<RouteId>> for RouteSelector {
    fn from(route: Option<RouteId>) -> Self {
        RouteSelector(route)
    }
}

pub fn filter_buses<'a>(buses: &'a [Bus], selector: &RouteSelector) -> Vec<&'a Bus> {
    buses.iter().filter(|bus| selector.matches_bus(bus)).collect()
}

pub fn filter_stops<'a>(stops: &'a [Stop], selector: &RouteSelector) -> Vec<&'a Stop> {
    stops
        .iter()
        .filter(|stop| selector.matches_stop(stop))
        .collect()
}

/// The buses and stops a view shows for one snapshot and selector.
#[derive(Debug, Clone, PartialEq)]
pub struct Visible<'a> {
    pub buses: Vec<&'a Bus>,
    pub stops: Vec<&'a Stop>,
}

impl<'a> Visible<'a> {
    pub fn compute(snapshot: &'a Snapshot, stops: &'a [Stop], selector: &RouteSelector) -> Self {
        Visible {
            buses: filter_buses(snapshot.buses(), selector),
            stops: filter_stops(stops, selector),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty() && self.stops.is_empty()
    }
}
