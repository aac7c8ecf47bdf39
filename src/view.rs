use std::fmt::Display;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use itertools::Itertools;
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::filter::{RouteSelector, Visible};
use crate::fixture::Fixtures;
use crate::projection::{
    landing_stats, project_live_map, route_cards, BusSummary, LiveMapProjection, StopSummary,
};
use crate::simulator::{Jitter, PositionSimulator, RunningSimulator, Snapshot, DEFAULT_TICK_PERIOD};
use crate::surface::{Glyph, MapSurface, Marker};

pub const SITE_NAME: &str = "ConnectVI";

const ABSENT: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Landing,
    Routes,
    LiveMap(RouteSelector),
    NotFound(String),
}

impl Page {
    /// Resolves a site path such as `/map?route=route-1`.
    pub fn parse(path: &str) -> Page {
        let (location, query) = path.split_once('?').unwrap_or((path, ""));
        let location = match location.trim_end_matches('/') {
            "" => "/",
            it => it,
        };
        match location {
            "/" => Page::Landing,
            "/routes" => Page::Routes,
            "/map" => Page::LiveMap(RouteSelector::from_query(query)),
            _ => Page::NotFound(path.to_string()),
        }
    }

    fn nav_path(&self) -> Option<&'static str> {
        match self {
            Page::Landing => Some("/"),
            Page::Routes => Some("/routes"),
            Page::LiveMap(_) => Some("/map"),
            Page::NotFound(_) => None,
        }
    }
}

const NAV_ITEMS: [(&str, &str); 3] = [("/", "Home"), ("/routes", "Routes"), ("/map", "Live Map")];

pub fn render_navigation(page: &Page, out: &mut impl Write) -> io::Result<()> {
    let active = page.nav_path();
    let items = NAV_ITEMS
        .iter()
        .map(|(path, label)| {
            if Some(*path) == active {
                format!("[{}]", label)
            } else {
                label.to_string()
            }
        })
        .join("  ");
    writeln!(out, "{}  |  {}", SITE_NAME, items)
}

pub fn render_landing(fixtures: &Fixtures, out: &mut impl Write) -> io::Result<()> {
    let stats = landing_stats(fixtures, fixtures.buses().len());
    writeln!(out, "{}", SITE_NAME)?;
    writeln!(
        out,
        "Track your bus in real-time with position updates every {} seconds.",
        DEFAULT_TICK_PERIOD.as_secs()
    )?;
    writeln!(out)?;
    writeln!(out, "Active buses: {}", stats.active_buses)?;
    writeln!(out, "Routes:       {}", stats.total_routes)?;
    writeln!(out)?;
    writeln!(out, "Available routes")?;
    for route in &stats.routes {
        writeln!(
            out,
            "  {:<24} {:<8} {:<18} {} stops",
            route.badge.name, route.badge.color, route.frequency, route.stop_count
        )?;
    }
    writeln!(out)?;
    writeln!(out, "Track my bus: /map    View routes: /routes")
}

pub fn render_routes(fixtures: &Fixtures, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "Bus Routes")?;
    for card in route_cards(fixtures) {
        writeln!(out)?;
        writeln!(out, "{} ({})", card.badge.name, card.badge.color)?;
        writeln!(out, "  {}", card.frequency)?;
        writeln!(out, "  Stops ({})", card.stop_count)?;
        for name in &card.preview_stops {
            writeln!(out, "    • {}", name)?;
        }
        if card.more_stops > 0 {
            writeln!(out, "    + {} more stops", card.more_stops)?;
        }
        writeln!(out, "  Operating: {}", card.operating_hours)?;
        writeln!(out, "  Track live buses: {}", card.map_link)?;
    }
    writeln!(out)?;
    writeln!(out, "View all routes on map: /map")
}

pub fn render_not_found(path: &str, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "404: no page at {}", path)
}

fn bus_marker(bus: &BusSummary) -> Marker {
    Marker {
        position: bus.position,
        label: bus
            .route
            .map_or_else(|| bus.id.to_string(), |route| route.name.to_string()),
        glyph: Glyph::Bus,
        color: bus.route.map(|route| route.color.to_string()),
        popup: vec![
            format!("Bus {}", bus.id),
            format!("Next: {}", bus.next_stop.unwrap_or(ABSENT)),
            format!("Speed: {:.0} km/h", bus.speed),
            format!("Updated: {}", bus.updated_at),
        ],
    }
}

fn stop_marker(stop: &StopSummary) -> Marker {
    Marker {
        position: stop.position,
        label: stop.name.to_string(),
        glyph: Glyph::Stop,
        color: stop
            .routes
            .iter()
            .find_map(|it| it.badge)
            .map(|badge| badge.color.to_string()),
        popup: stop
            .routes
            .iter()
            .map(|it| it.badge.map_or(ABSENT, |badge| badge.name).to_string())
            .collect(),
    }
}

/// Plots a projection: stops first so buses are drawn on top.
pub fn plot(projection: &LiveMapProjection, surface: &mut impl MapSurface) -> io::Result<()> {
    surface.clear()?;
    for stop in &projection.stops {
        surface.plot(&stop_marker(stop))?;
    }
    for bus in &projection.buses {
        surface.plot(&bus_marker(bus))?;
    }
    if let Some(bounds) = &projection.bounds {
        surface.fit_bounds(bounds)?;
    }
    Ok(())
}

pub fn render_bus_panel(projection: &LiveMapProjection, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "{}", projection.title)?;
    writeln!(out, "Live Buses ({})", projection.buses.len())?;
    for bus in &projection.buses {
        writeln!(
            out,
            "  {:<24} {:>3.0} km/h  Next: {:<20} {}",
            bus.route.map_or(ABSENT, |route| route.name),
            bus.speed,
            bus.next_stop.unwrap_or(ABSENT),
            bus.updated_at
        )?;
    }
    writeln!(
        out,
        "Showing {} live buses and {} stops",
        projection.buses.len(),
        projection.stops.len()
    )
}

/// Filters, projects and draws one snapshot.
pub fn render_live_map<Tz>(
    fixtures: &Fixtures,
    snapshot: &Snapshot,
    selector: &RouteSelector,
    tz: &Tz,
    surface: &mut impl MapSurface,
    out: &mut impl Write,
) -> io::Result<()>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let visible = Visible::compute(snapshot, fixtures.stops(), selector);
    let projection = project_live_map(fixtures, &visible, selector, tz);
    render_bus_panel(&projection, out)?;
    plot(&projection, surface)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    pub period: Duration,
    pub jitter: Jitter,
    /// Seed for the position jitter; a random seed is drawn when absent.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            period: DEFAULT_TICK_PERIOD,
            jitter: Jitter::default(),
            seed: None,
        }
    }
}

/// A mounted live map. It owns its own simulator, so two views never share
/// bus positions. Unmounting (or dropping) the view stops its simulator.
pub struct LiveMapView<'f> {
    fixtures: &'f Fixtures,
    selector: RouteSelector,
    simulator: RunningSimulator,
}

impl<'f> LiveMapView<'f> {
    pub fn mount(
        fixtures: &'f Fixtures,
        selector: RouteSelector,
        config: SimulatorConfig,
    ) -> io::Result<Self> {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!("Mounting live map for {:?} with seed {}", selector.id(), seed);
        let simulator = PositionSimulator::new(
            fixtures.buses().to_vec(),
            config.jitter,
            ChaCha8Rng::seed_from_u64(seed),
        )
        .start(config.period)?;
        Ok(LiveMapView {
            fixtures,
            selector,
            simulator,
        })
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.simulator.cell().load()
    }

    pub fn wait_for_update(&self, timeout: Duration) -> Option<Arc<Snapshot>> {
        self.simulator.wait_for_update(timeout)
    }

    pub fn render(
        &self,
        snapshot: &Snapshot,
        surface: &mut impl MapSurface,
        out: &mut impl Write,
    ) -> io::Result<()> {
        render_live_map(self.fixtures, snapshot, &self.selector, &Local, surface, out)
    }

    pub fn unmount(self) -> Arc<Snapshot> {
        self.simulator.stop()
    }
}
