//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vitrine",
    version,
    author = "neur0map",
    about = "Hybrid product search over text, image and keyword signals",
    long_about = "Vitrine builds text-embedding, image-embedding and BM25 indices over a product \
                  catalog and ranks products for free-text queries by fusing the three signals, \
                  with optional cross-encoder reranking and short match explanations."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/vitrine/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Profile to apply on top of the config (e.g., "visual", "lexical")
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the artifact bundle from a catalog CSV
    Build {
        /// Catalog CSV (defaults to artifacts.catalog_file)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Output directory (defaults to artifacts.dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search the catalog
    Search {
        /// Search query text
        query: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        k: Option<usize>,

        /// Weight of text embedding similarity
        #[arg(long)]
        text_weight: Option<f32>,

        /// Weight of image embedding similarity
        #[arg(long)]
        image_weight: Option<f32>,

        /// Weight of BM25 keyword relevance
        #[arg(long)]
        keyword_weight: Option<f32>,

        /// Skip cross-encoder reranking
        #[arg(long)]
        no_rerank: bool,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run the evaluation harness over a query file
    Evaluate {
        /// Queries file, one per line (defaults to evaluation.queries_file)
        #[arg(short, long)]
        queries: Option<PathBuf>,

        /// Relevance labels JSON (defaults to evaluation.labels_file)
        #[arg(short, long)]
        labels: Option<PathBuf>,

        /// Show the report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show metadata of the built bundle
    Info {
        /// Bundle directory (defaults to artifacts.dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Show only a specific section
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::try_parse_from([
            "vitrine",
            "search",
            "red dress",
            "-k",
            "5",
            "--keyword-weight",
            "0.4",
            "--no-rerank",
        ])
        .unwrap();

        match cli.command {
            Commands::Search {
                query,
                k,
                keyword_weight,
                no_rerank,
                text_weight,
                ..
            } => {
                assert_eq!(query, "red dress");
                assert_eq!(k, Some(5));
                assert_eq!(keyword_weight, Some(0.4));
                assert_eq!(text_weight, None);
                assert!(no_rerank);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_profile() {
        let cli = Cli::try_parse_from(["vitrine", "info", "--profile", "visual"]).unwrap();
        assert_eq!(cli.profile.as_deref(), Some("visual"));
    }
}
