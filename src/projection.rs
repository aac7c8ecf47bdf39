use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};

use crate::filter::{RouteSelector, Visible};
use crate::fixture::Fixtures;
use crate::model::{Bus, BusId, Coordinate, Route, RouteId, Stop, StopId};
use crate::surface::Bounds;

pub const DEFAULT_MAP_TITLE: &str = "ConnectVI Live Tracking";

/// Number of stop names listed on a route card before collapsing the rest.
pub const ROUTE_CARD_PREVIEW_STOPS: usize = 3;

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteBadge<'a> {
    pub name: &'a str,
    pub color: &'a str,
}

impl<'a> From<&'a Route> for RouteBadge<'a> {
    fn from(route: &'a Route) -> Self {
        RouteBadge {
            name: &route.name,
            color: &route.color,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusSummary<'a> {
    pub id: &'a BusId,
    /// `None` if the bus runs on a route missing from the catalog.
    pub route: Option<RouteBadge<'a>>,
    /// `None` if the next stop is missing from the catalog.
    pub next_stop: Option<&'a str>,
    pub position: Coordinate,
    pub speed: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Membership<'a> {
    pub route: &'a RouteId,
    pub badge: Option<RouteBadge<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopSummary<'a> {
    pub id: &'a StopId,
    pub name: &'a str,
    pub position: Coordinate,
    pub routes: Vec<Membership<'a>>,
}

/// Everything the live map shows for one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMapProjection<'a> {
    pub title: String,
    pub buses: Vec<BusSummary<'a>>,
    pub stops: Vec<StopSummary<'a>>,
    /// Box around all visible buses and stops; `None` when nothing is visible.
    pub bounds: Option<Bounds>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteCard<'a> {
    pub id: &'a RouteId,
    pub badge: RouteBadge<'a>,
    pub frequency: &'a str,
    pub operating_hours: &'a str,
    pub stop_count: usize,
    /// Names of the first stops; unknown stops show their raw id.
    pub preview_stops: Vec<&'a str>,
    pub more_stops: usize,
    pub map_link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutePreview<'a> {
    pub badge: RouteBadge<'a>,
    pub frequency: &'a str,
    pub stop_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LandingStats<'a> {
    pub active_buses: usize,
    pub total_routes: usize,
    pub routes: Vec<RoutePreview<'a>>,
}

pub fn format_local_time<Tz>(timestamp: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    timestamp.with_timezone(tz).format(TIME_FORMAT).to_string()
}

pub fn route_badge<'a>(fixtures: &'a Fixtures, id: &RouteId) -> Option<RouteBadge<'a>> {
    fixtures.route(id).map(RouteBadge::from)
}

pub fn summarize_bus<'a, Tz>(fixtures: &'a Fixtures, bus: &'a Bus, tz: &Tz) -> BusSummary<'a>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    BusSummary {
        id: &bus.id,
        route: route_badge(fixtures, &bus.route),
        next_stop: fixtures.stop(&bus.next_stop).map(|stop| &*stop.name),
        position: bus.position,
        speed: bus.speed,
        updated_at: format_local_time(bus.last_update, tz),
    }
}

pub fn summarize_stop<'a>(fixtures: &'a Fixtures, stop: &'a Stop) -> StopSummary<'a> {
    StopSummary {
        id: &stop.id,
        name: &stop.name,
        position: stop.position,
        routes: stop
            .routes
            .iter()
            .map(|route| Membership {
                route,
                badge: route_badge(fixtures, route),
            })
            .collect(),
    }
}

/// Title of the live map: the selected route's name, or the generic title when
/// nothing (or an unknown route) is selected.
pub fn map_title(fixtures: &Fixtures, selector: &RouteSelector) -> String {
    match selector.id().and_then(|id| fixtures.route(id)) {
        Some(route) => format!("{} - Live Map", route.name),
        None => DEFAULT_MAP_TITLE.to_string(),
    }
}

pub fn project_live_map<'a, Tz>(
    fixtures: &'a Fixtures,
    visible: &Visible<'a>,
    selector: &RouteSelector,
    tz: &Tz,
) -> LiveMapProjection<'a>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let bounds = Bounds::enclosing(
        visible
            .buses
            .iter()
            .map(|bus| bus.position)
            .chain(visible.stops.iter().map(|stop| stop.position)),
    );
    LiveMapProjection {
        title: map_title(fixtures, selector),
        buses: visible
            .buses
            .iter()
            .map(|&bus| summarize_bus(fixtures, bus, tz))
            .collect(),
        stops: visible
            .stops
            .iter()
            .map(|&stop| summarize_stop(fixtures, stop))
            .collect(),
        bounds,
    }
}

pub fn map_link(route: &RouteId) -> String {
    format!("/map?route={}", route)
}

pub fn route_cards(fixtures: &Fixtures) -> Vec<RouteCard<'_>> {
    fixtures
        .routes()
        .iter()
        .map(|route| RouteCard {
            id: &route.id,
            badge: RouteBadge::from(route),
            frequency: &route.frequency,
            operating_hours: &route.operating_hours,
            stop_count: route.stops.len(),
            preview_stops: route
                .stops
                .iter()
                .take(ROUTE_CARD_PREVIEW_STOPS)
                .map(|id| fixtures.stop(id).map_or(id.as_str(), |stop| &*stop.name))
                .collect(),
            more_stops: route.stops.len().saturating_sub(ROUTE_CARD_PREVIEW_STOPS),
            map_link: map_link(&route.id),
        })
        .collect()
}

pub fn landing_stats(fixtures: &Fixtures, active_buses: usize) -> LandingStats<'_> {
    LandingStats {
        active_buses,
        total_routes: fixtures.routes().len(),
        routes: fixtures
            .routes()
            .iter()
            .map(|route| RoutePreview {
                badge: RouteBadge::from(route),
                frequency: &route.frequency,
                stop_count: route.stops.len(),
            })
            .collect(),
    }
}
