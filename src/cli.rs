use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "dramawatch",
    version,
    about = "Browse and watch short drama episodes with resume and quality memory"
)]
pub struct Cli {
    /// Content API base URL. Overrides the config file and DRAMAWATCH_API_BASE.
    #[arg(long, global = true, value_name = "URL")]
    pub api_base: Option<String>,

    /// Write logs to this file instead of discarding them.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Open the terminal watch view for a content item.
    Watch {
        content_id: String,
        /// Chapter id to start from instead of the first episode.
        #[arg(long)]
        episode: Option<String>,
    },
    /// Print the episode list with saved progress.
    Episodes { content_id: String },
    /// Show or clear saved positions for a content item.
    Progress {
        content_id: String,
        #[arg(long)]
        clear: bool,
    },
    /// Show, set or clear the preferred quality tier.
    Quality(QualityArgs),
    /// Search dramas by title. Without a query, lists popular searches.
    Search {
        #[arg(value_name = "QUERY")]
        query: Vec<String>,
    },
    /// List newly released dramas.
    Latest,
    /// List trending dramas.
    Trending,
    /// List recommended dramas.
    ForYou,
}

#[derive(Debug, Args)]
#[group(multiple = false)]
pub struct QualityArgs {
    #[arg(long, value_name = "TIER")]
    pub set: Option<u32>,
    #[arg(long)]
    pub clear: bool,
}
