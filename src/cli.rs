//! Command-line interface definitions for Content Booster.
//!
//! Most settings live in the YAML config file; the flags here override the
//! handful that are commonly changed per run. API keys can come from the
//! environment so they never need to be written to disk.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Content Booster importer.
///
/// # Examples
///
/// ```sh
/// # Import from every configured provider
/// content_booster --config booster.yaml import
///
/// # Local rewriting only, eight providers at a time
/// content_booster --ai-provider local --concurrency 8 import
///
/// # See which stored records would get an image
/// content_booster fix-images --batch-size 100 --dry-run
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "BOOSTER_CONFIG", default_value = "booster.yaml")]
    pub config: String,

    /// Override the record store path from the config file
    #[arg(short, long)]
    pub store: Option<String>,

    /// Override the AI provider (openai, huggingface, local, none)
    #[arg(long)]
    pub ai_provider: Option<String>,

    /// Override how many providers are imported at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Hugging Face API key
    #[arg(long, env = "HUGGINGFACE_API_KEY", hide_env_values = true)]
    pub huggingface_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Fetch, normalize, rewrite and store content from every provider
    Import,

    /// Look up images for stored records that have none
    FixImages {
        /// Records examined per store query
        #[arg(short, long, default_value_t = 50)]
        batch_size: usize,

        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
}
