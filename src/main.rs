mod api;
mod catalog;
mod config;
mod draft;
mod error;
mod logging;
mod models;
mod search;
mod session;
mod tui;
mod worker;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use api::HttpApi;
use catalog::Catalog;
use config::Config;
use draft::{DraftError, ItemDraft};
use models::{ListParams, ListingFilter, ListingKind, NavParams, RecencyWindow};
use session::Session;
use tui::truncate;

#[derive(Parser)]
#[command(name = "finder")]
#[command(about = "Lost and found board - post, search and follow lost or found items")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        /// Account email
        email: String,

        /// Path to a file holding the password
        #[arg(short, long, default_value = "~/.finder_password")]
        password_file: String,
    },

    /// Forget the stored session
    Logout,

    /// Show who is signed in
    Whoami,

    /// Print one page of listings
    List {
        #[command(flatten)]
        filter: FilterArgs,

        /// Page number
        #[arg(long, default_value = "1")]
        page: u32,
    },

    /// Browse listings interactively
    Browse {
        #[command(flatten)]
        filter: FilterArgs,

        /// Open a saved favorite filter by ID
        #[arg(long)]
        favorite: Option<i64>,
    },

    /// Post a found or lost item
    Post {
        /// Whether you found the item or are looking for it
        #[arg(short, long, value_enum)]
        kind: ListingKind,

        /// What was found or lost
        name: String,

        /// Where it was found, what it looks like
        #[arg(short, long, default_value = "")]
        description: String,

        /// Date it was found or lost (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Contact phone
        #[arg(long)]
        phone: String,

        /// Category name
        #[arg(short, long)]
        category: String,

        /// Location name
        #[arg(short, long)]
        location: String,

        /// Photo to attach (repeatable); the first one is the cover
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,

        /// Use this attached photo as the cover instead
        #[arg(long)]
        cover: Option<PathBuf>,

        /// Offer a reward
        #[arg(long)]
        reward: bool,

        /// Leave out photos that are missing or not jpg/png/heic instead of failing
        #[arg(long)]
        skip_bad_photos: bool,

        /// Validate and show what would be posted without posting
        #[arg(long)]
        dry_run: bool,
    },

    /// List categories
    Categories,

    /// List locations
    Locations,

    /// List saved favorite filters
    Favorites,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Listing kind (seeking, found)
    #[arg(short, long, value_enum)]
    kind: Option<ListingKind>,

    /// Category name
    #[arg(short, long)]
    category: Option<String>,

    /// Location name
    #[arg(short, long)]
    location: Option<String>,

    /// Only items dated on or after (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Only items dated on or before (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Only items from the last week or month
    #[arg(long, value_enum)]
    last: Option<RecencyWindow>,

    /// Search text
    #[arg(short, long)]
    query: Option<String>,

    /// Only items with photos
    #[arg(long)]
    with_photo: bool,

    /// Only items with a description
    #[arg(long)]
    with_body: bool,
}

impl FilterArgs {
    fn needs_catalog(&self) -> bool {
        self.category.is_some() || self.location.is_some()
    }

    /// Everything except category and location, which travel separately.
    fn base_filter(&self) -> ListingFilter {
        ListingFilter {
            date_from: self.from,
            date_to: self.to,
            recency: self.last,
            q: self.query.clone().unwrap_or_default(),
            with_photo: self.with_photo,
            with_body: self.with_body,
            ..ListingFilter::for_kind(self.kind.unwrap_or_default())
        }
    }

    fn nav_params(&self, api: &HttpApi) -> Result<NavParams> {
        let mut nav = NavParams::default();
        let base = self.base_filter();
        if base != ListingFilter::default() {
            nav.filters = Some(base);
        }
        if self.needs_catalog() {
            let catalog = Catalog::fetch(api).context("Failed to load categories and locations")?;
            if let Some(name) = &self.category {
                nav.category = Some(catalog.category(name)?.clone());
            }
            if let Some(name) = &self.location {
                nav.location = Some(catalog.location(name)?.clone());
            }
        }
        Ok(nav)
    }

    fn to_filter(&self, api: &HttpApi) -> Result<ListingFilter> {
        let nav = self.nav_params(api)?;
        let mut filter = nav.filters.unwrap_or_default();
        filter.category = nav.category;
        filter.location = nav.location;
        Ok(filter)
    }
}

fn ensure_signed_in(session: &Session) -> Result<()> {
    if !session.is_signed_in() {
        return Err(anyhow!("Not signed in. Run 'finder login <email>' first."));
    }
    Ok(())
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_default();
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _log_guard = logging::init(&config)?;
    let session = Session::load(&config.session_path())?;
    let api = HttpApi::connect(&config, session.clone())?;

    tracing::debug!("Using API at {}", config.api_url);

    match cli.command {
        Commands::Login { email, password_file } => {
            let path = expand_home(&password_file);
            let password = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read password file: {}", path.display()))?;
            let (token, user) = api.login(&email, password.trim())?;
            session.sign_in(token, user.clone())?;
            tracing::info!("Signed in as {}", user.email);
            println!("Signed in as {} <{}>", user.name, user.email);
        }

        Commands::Logout => {
            session.logout();
            println!("Signed out.");
        }

        Commands::Whoami => match session.user() {
            Some(user) => {
                println!("{} <{}>", user.name, user.email);
                if let Some(phone) = &user.phone {
                    println!("Phone: {}", phone);
                }
                if let Some(location) = &user.location {
                    println!("Location: {}", location.name);
                }
                if let Some(photo) = &user.photo {
                    println!("Photo: {}", photo);
                }
            }
            None => println!("Not signed in."),
        },

        Commands::List { filter, page } => {
            ensure_signed_in(&session)?;
            let filter = filter.to_filter(&api)?;
            let listing = api.list_items(&ListParams::from_filter(&filter, page))?;
            if listing.items.is_empty() {
                println!("No {} items found.", filter.kind.label().to_lowercase());
            } else {
                println!("{:<6} {:<30} {:<16} {:<16} {:>6}", "ID", "NAME", "CATEGORY", "LOCATION", "REWARD");
                println!("{}", "-".repeat(78));
                for item in &listing.items {
                    println!(
                        "{:<6} {:<30} {:<16} {:<16} {:>6}",
                        item.id,
                        truncate(&item.name, 28),
                        truncate(item.category.as_ref().map(|c| c.name.as_str()).unwrap_or("-"), 14),
                        truncate(item.location.as_ref().map(|l| l.name.as_str()).unwrap_or("-"), 14),
                        if item.for_remuneration { "yes" } else { "" }
                    );
                }
                if listing.has_more_pages {
                    println!("\nPage {}. More with --page {}", listing.page, listing.page + 1);
                } else {
                    println!("\nPage {} (last).", listing.page);
                }
            }
        }

        Commands::Browse { filter, favorite } => {
            ensure_signed_in(&session)?;
            let nav = match favorite {
                Some(id) => {
                    let saved = api
                        .favorite_filters()?
                        .into_iter()
                        .find(|f| f.id == id)
                        .ok_or_else(|| anyhow!("Favorite filter #{} not found", id))?;
                    NavParams::from_favorite(saved)
                }
                None => filter.nav_params(&api)?,
            };
            tui::run_browse(api, session, nav)?;
        }

        Commands::Post {
            kind,
            name,
            description,
            date,
            phone,
            category,
            location,
            photos,
            cover,
            reward,
            skip_bad_photos,
            dry_run,
        } => {
            ensure_signed_in(&session)?;
            let catalog = Catalog::fetch(&api).context("Failed to load categories and locations")?;

            let mut draft = ItemDraft::new(kind);
            draft.name = name;
            draft.description = description;
            draft.date = Some(date.unwrap_or_else(|| chrono::Local::now().date_naive()));
            draft.phone = phone;
            draft.for_remuneration = reward;
            draft.category = Some(catalog.category(&category)?.clone());
            draft.location = Some(catalog.location(&location)?.clone());
            for photo in photos {
                draft.add_photo(photo);
            }
            if let Some(cover) = &cover {
                if !draft.set_cover(cover) {
                    return Err(anyhow!("Cover {} is not one of the attached photos", cover.display()));
                }
            }

            let today = chrono::Local::now().date_naive();
            if skip_bad_photos {
                if let Err(errors) = draft.validate(today) {
                    for error in errors {
                        if let DraftError::MissingPhoto(path) | DraftError::UnsupportedPhoto(path) = &error {
                            println!("Skipping {}", error);
                            draft.remove_photo(path);
                        }
                    }
                }
            }

            let item = draft
                .validate(today)
                .map_err(|errors| {
                    let lines: Vec<String> = errors.iter().map(|e| format!("  - {}", e)).collect();
                    anyhow!("Cannot post item:\n{}", lines.join("\n"))
                })?;

            if dry_run {
                println!("Would post {} item '{}'", item.kind.label().to_lowercase(), item.name);
                println!("  Date: {}", item.date);
                println!("  Phone: {}", item.phone);
                for photo in draft.photos() {
                    let cover = if photo.cover { " (cover)" } else { "" };
                    println!("  Photo: {}{}", photo.path.display(), cover);
                }
                println!("\n(Dry run - nothing was posted)");
            } else {
                let created = api.create_item(&item)?;
                tracing::info!("Posted item #{}", created.id);
                println!("Posted item #{}: {}", created.id, created.name);
            }
        }

        Commands::Categories => {
            let categories = api.categories()?;
            if categories.is_empty() {
                println!("No categories found.");
            } else {
                println!("{:<6} {:<30}", "ID", "NAME");
                println!("{}", "-".repeat(36));
                for category in categories {
                    println!("{:<6} {:<30}", category.id, truncate(&category.name, 28));
                }
            }
        }

        Commands::Locations => {
            let locations = api.locations()?;
            if locations.is_empty() {
                println!("No locations found.");
            } else {
                println!("{:<6} {:<30}", "ID", "NAME");
                println!("{}", "-".repeat(36));
                for location in locations {
                    println!("{:<6} {:<30}", location.id, truncate(&location.name, 28));
                }
            }
        }

        Commands::Favorites => {
            ensure_signed_in(&session)?;
            let favorites = api.favorite_filters()?;
            if favorites.is_empty() {
                println!("No favorite filters saved.");
            } else {
                println!("{:<6} {:<8} {:<24} {:<40}", "ID", "KIND", "SEARCH", "FILTERS");
                println!("{}", "-".repeat(80));
                for favorite in favorites {
                    let f = &favorite.filters;
                    println!(
                        "{:<6} {:<8} {:<24} {:<40}",
                        favorite.id,
                        f.kind.label(),
                        truncate(&f.q, 22),
                        truncate(&f.chips().join(", "), 38)
                    );
                }
                println!("\nOpen one with: finder browse --favorite <ID>");
            }
        }
    }

    Ok(())
}
