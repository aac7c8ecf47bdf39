#![allow(dead_code)]

use std::io;
use std::path::Path;
use std::process::exit;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};

use filter::RouteSelector;
use fixture::{Fixtures, ReferencePolicy};
use surface::TextSurface;
use view::{LiveMapView, Page, SimulatorConfig};

mod filter;
mod fixture;
mod model;
mod projection;
mod simulator;
mod surface;
mod timer;
mod view;

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about = "Live bus tracking over fixture data with simulated bus movement"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    #[command(about = "Show the landing page with live stats and route previews")]
    Landing(SiteArgs),

    #[command(about = "Show the route catalog")]
    Routes(SiteArgs),

    #[command(about = "Run the live map, optionally narrowed to one route")]
    Map(MapArgs),

    #[command(about = "Open a site path such as /routes or /map?route=route-1")]
    Open(OpenArgs),
}

#[derive(Args, Clone, Debug)]
struct SiteArgs {
    #[arg(
        short = 'f',
        long,
        help = "A directory with stops.csv, routes.csv and buses.csv. If not given, the built-in fixtures are used."
    )]
    fixtures: Option<String>,

    #[arg(
        long,
        help = "Refuse fixtures whose buses, routes or stops reference unknown ids."
    )]
    strict: bool,
}

#[derive(Args, Clone, Debug)]
struct LiveArgs {
    #[arg(
        short = 'n',
        long,
        default_value_t = 3,
        help = "The number of simulator ticks to render before unmounting the map."
    )]
    ticks: usize,

    #[arg(
        short = 'i',
        long,
        default_value_t = 5000,
        help = "The interval (in milliseconds) between simulator ticks."
    )]
    interval_ms: u64,

    #[arg(
        short = 's',
        long,
        help = "Seed for the position jitter. If not given, a random seed is used."
    )]
    seed: Option<u64>,
}

#[derive(Args, Clone, Debug)]
struct MapArgs {
    #[arg(short = 'r', long, help = "Only show buses and stops of this route.")]
    route: Option<String>,

    #[clap(flatten)]
    live_args: LiveArgs,

    #[clap(flatten)]
    site_args: SiteArgs,
}

#[derive(Args, Clone, Debug)]
struct OpenArgs {
    #[arg(help = "The site path to open.", default_value = "/")]
    path: String,

    #[clap(flatten)]
    live_args: LiveArgs,

    #[clap(flatten)]
    site_args: SiteArgs,
}

fn load_fixtures(args: &SiteArgs) -> Fixtures {
    let now = Utc::now();
    let fixtures = match &args.fixtures {
        Some(dir) => Fixtures::load_dir(Path::new(dir), now).unwrap_or_else(|it| {
            error!("Could not load fixtures: {}", it);
            exit(1);
        }),
        None => Fixtures::builtin(now),
    };

    let policy = if args.strict {
        ReferencePolicy::Strict
    } else {
        ReferencePolicy::Tolerate
    };
    fixtures.check_references(policy).unwrap_or_else(|it| {
        error!("Fixtures rejected: {}", it);
        exit(1);
    });
    fixtures
}

fn exit_on_write_error(result: io::Result<()>) {
    if let Err(err) = result {
        error!("Could not write output: {}", err);
        exit(1);
    }
}

fn main_live_map(fixtures: &Fixtures, selector: RouteSelector, args: &LiveArgs) {
    if args.interval_ms == 0 {
        error!("The tick interval must be positive");
        exit(1);
    }
    if let Some(route) = selector.id() {
        if fixtures.route(route).is_none() {
            warn!("Unknown route {}, the map will be empty", route);
        }
    }

    let period = Duration::from_millis(args.interval_ms);
    let config = SimulatorConfig {
        period,
        seed: args.seed,
        ..SimulatorConfig::default()
    };
    let view = LiveMapView::mount(fixtures, selector, config).unwrap_or_else(|it| {
        error!("Could not start the position simulator: {}", it);
        exit(1);
    });

    let mut out = io::stdout();
    let mut surface = TextSurface::new(io::stdout());
    exit_on_write_error(view.render(&view.snapshot(), &mut surface, &mut out));
    for _ in 0..args.ticks {
        let Some(snapshot) = view.wait_for_update(period * 2) else {
            warn!("No snapshot within {:?}, stopping early", period * 2);
            break;
        };
        exit_on_write_error(view.render(&snapshot, &mut surface, &mut out));
    }

    let last = view.unmount();
    info!("Live map closed after {} ticks", last.generation());
}

fn main_open(args: &OpenArgs) {
    let fixtures = load_fixtures(&args.site_args);
    let page = Page::parse(&args.path);
    let mut out = io::stdout();
    exit_on_write_error(view::render_navigation(&page, &mut out));
    match page {
        Page::Landing => exit_on_write_error(view::render_landing(&fixtures, &mut out)),
        Page::Routes => exit_on_write_error(view::render_routes(&fixtures, &mut out)),
        Page::LiveMap(selector) => main_live_map(&fixtures, selector, &args.live_args),
        Page::NotFound(path) => {
            exit_on_write_error(view::render_not_found(&path, &mut out));
            exit(1);
        }
    }
}

fn main() {
    env_logger::builder().parse_env("LOG").init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Landing(args) => {
            let fixtures = load_fixtures(&args);
            exit_on_write_error(view::render_landing(&fixtures, &mut io::stdout()));
        }
        Commands::Routes(args) => {
            let fixtures = load_fixtures(&args);
            exit_on_write_error(view::render_routes(&fixtures, &mut io::stdout()));
        }
        Commands::Map(args) => {
            let fixtures = load_fixtures(&args.site_args);
            let selector = RouteSelector::from_value(args.route.as_deref());
            main_live_map(&fixtures, selector, &args.live_args);
        }
        Commands::Open(args) => main_open(&args),
    }
}
