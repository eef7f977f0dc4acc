mod format;
mod tui;


use std::collections::HashMap;

use anyhow::Result;
use log::warn;

use crate::catalog::{CatalogClient, DramaCard, EpisodeSource, Listing};
use crate::cli::{Cli, Command, QualityArgs};
use crate::config::Config;
use crate::db::Database;
use crate::paths::{config_file_path, database_file_path};
use crate::player::list_qualities;

use self::format::{format_clock, format_updated_at, truncate};

pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.api_base.clone())?;

    match cli.command {
        Command::Watch {
            content_id,
            episode,
        } => {
            let store = match open_db() {
                Ok(db) => Some(db),
                Err(err) => {
                    warn!("progress storage unavailable: {err:#}");
                    None
                }
            };
            tui::run_watch(&config, store, &content_id, episode.as_deref())?;
        }
        Command::Episodes { content_id } => run_episodes(&config, &open_db()?, &content_id)?,
        Command::Progress { content_id, clear } => run_progress(&open_db()?, &content_id, clear)?,
        Command::Quality(args) => run_quality(&open_db()?, &args)?,
        Command::Search { query } => run_search(&config, &query.join(" "))?,
        Command::Latest => run_listing(&config, Listing::Latest)?,
        Command::Trending => run_listing(&config, Listing::Trending)?,
        Command::ForYou => run_listing(&config, Listing::ForYou)?,
    }

    Ok(())
}

fn run_episodes(config: &Config, db: &Database, content_id: &str) -> Result<()> {
    let client = CatalogClient::new(config);
    let episodes = client.fetch_episodes(content_id);
    if episodes.is_empty() {
        println!("No episodes available for {content_id}.");
        if config.api_base_url.trim().is_empty() {
            println!("Set api_base_url in the config file or pass --api-base.");
        }
        return Ok(());
    }

    let saved: HashMap<String, Option<f64>> = db
        .list_progress(content_id)?
        .into_iter()
        .map(|entry| (entry.episode_id, entry.seconds))
        .collect();

    println!(
        "{:<5} {:<14} {:<36} {:<20} {:<8}",
        "#", "CHAPTER ID", "NAME", "QUALITIES", "SAVED"
    );
    for (idx, episode) in episodes.iter().enumerate() {
        let qualities = list_qualities(episode)
            .iter()
            .map(|q| q.quality.to_string())
            .collect::<Vec<_>>()
            .join("/");
        let saved_at = match saved.get(&episode.chapter_id) {
            Some(Some(secs)) => format_clock(*secs),
            Some(None) => "?".to_string(),
            None => "-".to_string(),
        };
        println!(
            "{:<5} {:<14} {:<36} {:<20} {:<8}",
            idx + 1,
            truncate(&episode.chapter_id, 14),
            truncate(&episode.display_name(), 36),
            if qualities.is_empty() {
                "none".to_string()
            } else {
                qualities
            },
            saved_at
        );
    }
    Ok(())
}

fn run_search(config: &Config, query: &str) -> Result<()> {
    let client = CatalogClient::new(config);
    if query.trim().is_empty() {
        let terms = client.popular_searches()?;
        if terms.is_empty() {
            println!("No popular searches right now.");
        } else {
            println!("Popular searches:");
            for term in terms {
                println!("  {term}");
            }
        }
        return Ok(());
    }

    let cards = client.search(query)?;
    if cards.is_empty() {
        println!("No dramas match \"{}\".", query.trim());
        return Ok(());
    }
    print_cards(&cards);
    Ok(())
}

fn run_listing(config: &Config, listing: Listing) -> Result<()> {
    let cards = CatalogClient::new(config).browse(listing)?;
    if cards.is_empty() {
        println!("The {} listing is empty right now.", listing.label());
        return Ok(());
    }
    print_cards(&cards);
    Ok(())
}

fn print_cards(cards: &[DramaCard]) {
    println!(
        "{:<14} {:<40} {:<5} {:<32} {:<3}",
        "ID", "TITLE", "EPS", "TAGS", "NEW"
    );
    for card in cards {
        println!(
            "{:<14} {:<40} {:<5} {:<32} {:<3}",
            truncate(&card.id, 14),
            truncate(&card.title, 40),
            card.episodes
                .map(|count| count.to_string())
                .unwrap_or_else(|| "?".to_string()),
            truncate(&card.tags.join(", "), 32),
            if card.is_new { "yes" } else { "" }
        );
    }
}

fn run_progress(db: &Database, content_id: &str, clear: bool) -> Result<()> {
    if clear {
        let removed = db.clear_progress(content_id)?;
        println!("Cleared {removed} saved position(s) for {content_id}.");
        return Ok(());
    }

    let entries = db.list_progress(content_id)?;
    if entries.is_empty() {
        println!("No saved positions for {content_id}.");
        return Ok(());
    }

    println!("{:<20} {:<10} {:<28}", "EPISODE", "POSITION", "UPDATED");
    for entry in entries {
        println!(
            "{:<20} {:<10} {:<28}",
            truncate(&entry.episode_id, 20),
            entry
                .seconds
                .map(format_clock)
                .unwrap_or_else(|| "?".to_string()),
            format_updated_at(&entry.updated_at)
        );
    }
    Ok(())
}

fn run_quality(db: &Database, args: &QualityArgs) -> Result<()> {
    if let Some(tier) = args.set {
        db.set_preferred_quality(tier)?;
        println!("Preferred quality set to {tier}p.");
    } else if args.clear {
        if db.clear_preferred_quality()? {
            println!("Preferred quality cleared.");
        } else {
            println!("No preferred quality was set.");
        }
    } else {
        match db.preferred_quality()? {
            Some(tier) => println!("Preferred quality: {tier}p"),
            None => println!("No preferred quality set (defaults to 720p when offered)."),
        }
    }
    Ok(())
}

fn load_config(api_base: Option<String>) -> Result<Config> {
    let mut config = Config::load(&config_file_path()?)?;
    config.apply_env();
    config.apply_api_base(api_base);
    Ok(config)
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
