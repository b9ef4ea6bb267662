use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{io::IsTerminal, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

use wxdash_core::{
    Config, Coordinates, LocationError, SelectedPlace, Suggestion, search::DEFAULT_SUGGESTION_LIMIT,
};

use crate::{app::App, render};

const CURRENT_POSITION: &str = "Current position";
const PLACE_NAME_WAIT: Duration = Duration::from_secs(3);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wxdash", version, about = "Today's weather for where you are and where you care about")]
pub struct Cli {
    /// IANA time zone used for "today", overriding the config file.
    #[arg(long, global = true)]
    pub tz: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the time zone and pinned location.
    Configure,

    /// Show weather for the current position.
    Here,

    /// Search the place directory and show weather for a match.
    Search {
        /// Place name, at least two characters.
        query: String,

        /// Pick the N-th suggestion (1-based) instead of prompting.
        #[arg(long)]
        pick: Option<usize>,

        /// Only list suggestions.
        #[arg(long)]
        list: bool,

        /// Save the resolved place as a favorite.
        #[arg(long)]
        save: bool,
    },

    /// Manage saved places.
    #[command(subcommand, alias = "fav")]
    Favorites(FavoritesCommand),
}

#[derive(Debug, Subcommand)]
pub enum FavoritesCommand {
    /// List favorites with today's temperatures.
    List {
        /// Skip the weather lookups.
        #[arg(long)]
        offline: bool,
    },

    /// Save a place by coordinates.
    #[command(allow_negative_numbers = true)]
    Add { name: String, lat: f64, lon: f64 },

    /// Remove a favorite by id.
    Remove { id: String },

    /// Rename a favorite.
    Rename { id: String, name: String },

    /// Show full weather for a favorite.
    Show { id: String },

    /// Print the list whenever it changes, including changes from other processes.
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Here => here(&App::load(self.tz.as_deref())?).await,
            Command::Search {
                query,
                pick,
                list,
                save,
            } => search(&App::load(self.tz.as_deref())?, &query, pick, list, save).await,
            Command::Favorites(cmd) => favorites(&App::load(self.tz.as_deref())?, cmd).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let tz = inquire::Text::new("Time zone:")
        .with_default(&config.time_zone)
        .with_help_message("IANA name, e.g. Asia/Seoul")
        .prompt()?;
    config.time_zone = tz.trim().to_string();
    config.time_zone()?;

    let pin = inquire::Confirm::new("Pin a location for `wxdash here`?")
        .with_default(config.location.coordinates().is_some())
        .prompt()?;

    if pin {
        let lat = inquire::CustomType::<f64>::new("Latitude:")
            .with_error_message("Enter a decimal number")
            .prompt()?;
        let lon = inquire::CustomType::<f64>::new("Longitude:")
            .with_error_message("Enter a decimal number")
            .prompt()?;
        config.set_location(Some(Coordinates::new(lat, lon)));
    } else {
        config.set_location(None);
    }

    config.save()?;
    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn here(app: &App) -> Result<()> {
    let current = app.current_position();

    match current.request().await {
        Ok(_) => {}
        Err(LocationError::Unsupported) => {
            println!("{}", LocationError::Unsupported.user_message());
            println!("Hint: run `wxdash configure` to pin a location, or use `wxdash search`.");
            return Ok(());
        }
        Err(err) => {
            println!("{}", err.user_message());
            return Ok(());
        }
    }

    current.place_name_within(PLACE_NAME_WAIT).await;
    let place = current
        .selected_place(CURRENT_POSITION)
        .context("position vanished after a successful request")?;
    current.detach();

    show_weather(app, &place).await;
    Ok(())
}

async fn search(app: &App, query: &str, pick: Option<usize>, list: bool, save: bool) -> Result<()> {
    if query.trim().chars().count() < 2 {
        println!("Type at least two characters.");
        return Ok(());
    }

    let suggestions = app.search.suggest(query, DEFAULT_SUGGESTION_LIMIT);
    if list || suggestions.is_empty() {
        render::suggestions(&suggestions);
        return Ok(());
    }

    let Some(choice) = choose(&suggestions, pick)? else {
        return Ok(());
    };

    let Some(place) = app.search.select(&choice.label).await else {
        println!("Could not find coordinates for '{}'. Try another keyword.", choice.label);
        return Ok(());
    };

    show_weather(app, &place).await;

    if save {
        match app.favorites.add(&place) {
            Ok(fav) => println!("\nSaved as favorite {}.", fav.id),
            Err(err) => render::favorite_rejected(err),
        }
    } else if app.favorites.is_favorite(place.lat, place.lon) {
        println!("\n★ In favorites");
    }

    Ok(())
}

fn choose(suggestions: &[Suggestion], pick: Option<usize>) -> Result<Option<Suggestion>> {
    if let Some(n) = pick {
        return match n.checked_sub(1).and_then(|i| suggestions.get(i)) {
            Some(s) => Ok(Some(s.clone())),
            None => bail!("--pick must be between 1 and {}", suggestions.len()),
        };
    }

    if suggestions.len() == 1 || !std::io::stdin().is_terminal() {
        return Ok(suggestions.first().cloned());
    }

    let labels: Vec<String> = suggestions.iter().map(|s| s.label.clone()).collect();
    let chosen = match inquire::Select::new("Which place?", labels).prompt() {
        Ok(label) => label,
        Err(inquire::InquireError::OperationCanceled | inquire::InquireError::OperationInterrupted) => {
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(suggestions.iter().find(|s| s.label == chosen).cloned())
}

async fn favorites(app: &App, cmd: FavoritesCommand) -> Result<()> {
    match cmd {
        FavoritesCommand::List { offline } => {
            let items = app.favorites.list();
            let rows = if offline {
                items.into_iter().map(|f| (f, None)).collect::<Vec<_>>()
            } else {
                let mut summaries = app.queries.fetch_favorites(&items, app.time_zone).await;
                items
                    .into_iter()
                    .map(|f| {
                        let summary = summaries
                            .iter()
                            .position(|(id, _)| *id == f.id)
                            .map(|i| summaries.swap_remove(i).1);
                        (f, summary)
                    })
                    .collect()
            };
            render::favorites(&rows, app.favorites.limit());
        }
        FavoritesCommand::Add { name, lat, lon } => {
            if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
                bail!("Coordinates out of range: {}", render::coordinates(lat, lon));
            }
            let place = SelectedPlace {
                place_name: name,
                lat,
                lon,
            };
            match app.favorites.add(&place) {
                Ok(fav) => println!("Saved {} as {}.", fav.place_name, fav.id),
                Err(err) => render::favorite_rejected(err),
            }
        }
        FavoritesCommand::Remove { id } => match app.favorites.remove(&id) {
            Ok(()) => println!("Removed {id}."),
            Err(err) => render::favorite_rejected(err),
        },
        FavoritesCommand::Rename { id, name } => match app.favorites.rename(&id, &name) {
            Ok(fav) => println!("Renamed {} to {}.", fav.id, fav.place_name),
            Err(err) => render::favorite_rejected(err),
        },
        FavoritesCommand::Show { id } => match app.favorites.get(&id) {
            Some(fav) => show_weather(app, &fav.as_selected()).await,
            None => println!("No favorite with id {id}."),
        },
        FavoritesCommand::Watch { interval_ms } => watch(app, interval_ms).await?,
    }

    Ok(())
}

async fn watch(app: &App, interval_ms: u64) -> Result<()> {
    let cancel = CancellationToken::new();
    let task = app
        .favorites
        .watch_durable(Duration::from_millis(interval_ms.max(50)), cancel.clone());
    let mut rx = app.favorites.subscribe();

    let print = |items: &[wxdash_core::FavoritePlace]| {
        let rows: Vec<_> = items.iter().cloned().map(|f| (f, None)).collect();
        render::favorites(&rows, app.favorites.limit());
        println!();
    };

    print(&rx.borrow_and_update());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&rx.borrow_and_update());
                print(&snapshot);
            }
        }
    }

    cancel.cancel();
    task.await.context("favorites watcher panicked")?;
    Ok(())
}

async fn show_weather(app: &App, place: &SelectedPlace) {
    let request = app.request_for(place);
    match app.queries.fetch(&request).await {
        Ok(view) => render::weather(&view),
        Err(err) => render::weather_unavailable(&place.place_name, &err),
    }
}
