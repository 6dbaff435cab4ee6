#![forbid(unsafe_code)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level as TraceLevel, error, info};
use tracing_subscriber::FmtSubscriber;

use resolution_change::config::Settings;
use resolution_change::constants::bridge::POLL_INTERVAL;
use resolution_change::randr::RandrPlatform;
use resolution_change::{
    Display, DisplayConfigurator, DisplayId, DisplayQuery, FavoritesStore, KeyValueStore, Mode,
    ModeCatalog, ReconfigurationBridge, RefreshReason, Resolution, ResolutionApplier, Toggled,
};

use cli::{Cli, Commands};

#[derive(Serialize)]
struct ListedDisplay<'a> {
    id: DisplayId,
    current: Option<Mode>,
    favorites: Vec<String>,
    modes: &'a [Mode],
}

fn render_display(display: &Display, current: Option<&Mode>, favorites: &[String]) -> String {
    let mut out = String::new();
    match current {
        Some(mode) => out.push_str(&format!("Display {} (current {})\n", display.id, mode.resolution())),
        None => out.push_str(&format!("Display {} (inactive)\n", display.id)),
    }
    for mode in &display.modes {
        let active = current.is_some_and(|c| c.native_mode_id == mode.native_mode_id);
        let resolution = mode.resolution().to_string();
        let favorite = favorites.contains(&resolution);
        out.push_str(&format!(
            "  {} {:<11} {:>5}x{:<5}{}\n",
            if active { '*' } else { ' ' },
            resolution,
            mode.physical_width,
            mode.physical_height,
            if favorite { "  [favorite]" } else { "" }
        ));
    }
    out
}

/// Every display with its current mode and favorites marked
fn render_displays<Q: DisplayQuery, S: KeyValueStore>(
    catalog: &ModeCatalog<Q>,
    favorites: &FavoritesStore<S>,
    displays: &[Display],
) -> String {
    if displays.is_empty() {
        return "No displays with selectable HiDPI modes\n".to_string();
    }
    displays
        .iter()
        .map(|display| {
            let current = catalog.current_mode(display.id);
            render_display(display, current.as_ref(), &favorites.get(display.id))
        })
        .collect()
}

fn list<Q: DisplayQuery, S: KeyValueStore>(
    catalog: &ModeCatalog<Q>,
    favorites: &FavoritesStore<S>,
    json: bool,
) -> Result<()> {
    let displays = catalog.discover();
    if json {
        let listed: Vec<ListedDisplay> = displays
            .iter()
            .map(|display| ListedDisplay {
                id: display.id,
                current: catalog.current_mode(display.id),
                favorites: favorites.get(display.id),
                modes: &display.modes,
            })
            .collect();
        let out = serde_json::to_string_pretty(&listed).context("Failed to serialize display list")?;
        println!("{out}");
        return Ok(());
    }

    print!("{}", render_displays(catalog, favorites, &displays));
    Ok(())
}

fn find_display<Q: DisplayQuery>(catalog: &ModeCatalog<Q>, id: DisplayId) -> Result<Display> {
    catalog
        .discover()
        .into_iter()
        .find(|display| display.id == id)
        .context(format!("Display {id} is not connected or has no selectable modes"))
}

/// Switch display `id` to `resolution`; the transaction runs even if it is already active
fn apply<Q: DisplayQuery, C: DisplayConfigurator>(
    catalog: &ModeCatalog<Q>,
    configurator: C,
    id: DisplayId,
    resolution: Resolution,
) -> Result<()> {
    let display = find_display(catalog, id)?;
    let mode = *display
        .mode_for(resolution)
        .context(format!("Display {id} has no selectable {resolution} mode"))?;
    if !catalog.can_apply(id, &mode) {
        anyhow::bail!("{resolution} is below the smallest supported size");
    }

    ResolutionApplier::new(configurator)
        .apply(id, &mode)
        .context(format!("Failed to switch display {id} to {resolution}"))?;
    println!("Display {id} switched to {resolution}");
    Ok(())
}

fn show_favorites<Q: DisplayQuery, S: KeyValueStore>(
    catalog: &ModeCatalog<Q>,
    favorites: &FavoritesStore<S>,
    id: DisplayId,
) -> Result<()> {
    let display = find_display(catalog, id)?;
    let current = catalog.current_mode(id).map(|mode| mode.resolution().to_string());
    let ranked = favorites.ranked_for(id, &display.modes);
    if ranked.is_empty() {
        println!("No favorites for display {id}");
    }
    for (resolution, mode) in ranked {
        let active = current.as_deref() == Some(resolution.as_str());
        println!(
            "  {} {:<11} {:>5}x{}",
            if active { '*' } else { ' ' },
            resolution,
            mode.physical_width,
            mode.physical_height
        );
    }
    Ok(())
}

#[cfg(unix)]
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    use signal_hook::consts::{SIGINT, SIGTERM};

    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&flag))
            .context(format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(flag)
}

#[cfg(not(unix))]
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    Ok(Arc::new(AtomicBool::new(false)))
}

fn watch<S: KeyValueStore>(
    platform: &RandrPlatform,
    catalog: &ModeCatalog<&RandrPlatform>,
    favorites: &FavoritesStore<S>,
) -> Result<()> {
    let shutdown = shutdown_flag()?;
    let mut bridge = ReconfigurationBridge::subscribe(platform.notifier())
        .context("Failed to subscribe to display reconfiguration")?;

    // Initial listing goes through the same path as later refreshes
    bridge.requester().request();
    info!("Watching for display changes, press Ctrl+C to stop");
    while !shutdown.load(Ordering::Relaxed) {
        let Some(request) = bridge.next_timeout(POLL_INTERVAL) else {
            continue;
        };
        let displays = bridge.refresh(&request, catalog);
        match request.reason {
            RefreshReason::Reconfiguration { display, flags } => {
                println!("-- display {display} changed ({flags:?})");
            }
            RefreshReason::UserRequested => println!("-- refreshed"),
        }
        print!("{}", render_displays(catalog, favorites, &displays));
    }

    info!("Shutting down");
    bridge.unsubscribe();
    Ok(())
}

fn main() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    let mut settings = Settings::load();
    if cli.scale.is_some() {
        settings.ui_scale = cli.scale;
    }
    if cli.display.is_some() {
        settings.x11_display = cli.display.clone();
    }
    if cli.favorites.is_some() {
        settings.favorites_path = cli.favorites.clone();
    }
    settings.validate_and_clamp();

    let platform = RandrPlatform::connect(settings.x11_display.as_deref(), settings.ui_scale)?;
    let catalog = ModeCatalog::new(&platform);
    let mut favorites = FavoritesStore::new(settings.favorites_store());
    info!(favorites = %favorites.storage().path().display(), "Using favorites file");

    match cli.command {
        Commands::List { json } => list(&catalog, &favorites, json),
        Commands::Apply { display: id, resolution } => apply(&catalog, &platform, id, resolution),
        Commands::Favorite { display: id, resolution } => {
            let resolution = resolution.to_string();
            match favorites.toggle(id, &resolution) {
                Ok(Toggled::Added) => println!("Added {resolution} to favorites for display {id}"),
                Ok(Toggled::Removed) => {
                    println!("Removed {resolution} from favorites for display {id}")
                }
                Err(e) => {
                    error!(display = %id, error = %e, "Failed to save favorites");
                    return Err(e).context("Failed to update favorites");
                }
            }
            Ok(())
        }
        Commands::Favorites { display: id } => show_favorites(&catalog, &favorites, id),
        Commands::Watch => watch(&platform, &catalog, &favorites),
    }
}
