//! # Command-Line Interface Module
//!
//! Clap derive definitions for the `muziki` binary.
//!
//! ## Commands
//!
//! - `import`: Load the CSV datasets into the catalog database
//! - `summary`: Row counts, columns and a preview of every table
//! - `cluster`: Group genres or songs by audio features
//! - `recommend`: Songs with a similar feature profile to a seed song
//! - `explore`: Decade, trend, genre, word and artist aggregates
//! - `completion`: Shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! muziki import --dir ./datasets
//! muziki cluster genres -k 5 --members
//! muziki recommend "Mas Que Nada" -n 10 --playlist=Sunday
//! muziki explore words --source artists
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "muziki")]
#[command(about = "muziki: cluster and recommend music by audio features")]
#[command(version)]
pub struct Args {
    /// Catalog database (defaults to the platform data directory)
    #[arg(long, global = true, env = "MUZIKI_DB")]
    pub db: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true, env = "MUZIKI_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Which table to cluster.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ClusterTarget {
    /// Genre aggregate profiles
    Genres,
    /// Individual tracks
    Songs,
}

/// Which exploratory view to compute.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum ExploreView {
    /// Number of tracks per decade
    Decades,
    /// Mean sound features per decade
    Trends,
    /// Most popular genres with their profiles
    Genres,
    /// Word frequencies over genre or artist names
    Words,
    /// Artists by track count and by popularity
    Artists,
}

/// Which names feed the word cloud.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum WordSource {
    /// Genre names from the genre table
    #[default]
    Genres,
    /// Artist names from the artist table
    Artists,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import the CSV datasets into the catalog database
    ///
    /// With `--dir`, the conventional file names are used (data.csv,
    /// data_by_genres.csv, data_by_year.csv, data_by_artist.csv). Individual
    /// flags override single files.
    Import {
        /// Directory holding the four CSV files
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Track table
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        tracks: Option<PathBuf>,

        /// Genre aggregate table
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        genres: Option<PathBuf>,

        /// Year aggregate table
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        years: Option<PathBuf>,

        /// Artist aggregate table
        #[arg(long, value_hint = clap::ValueHint::FilePath)]
        artists: Option<PathBuf>,

        /// Replace an existing catalog
        #[arg(long)]
        force: bool,
    },

    /// Show row counts, columns and the first rows of every table
    Summary,

    /// Cluster genres or songs by valence, energy, danceability and acousticness
    Cluster {
        /// What to cluster
        target: ClusterTarget,

        /// Number of clusters (defaults: 5 for genres, 25 for songs)
        #[arg(short, long)]
        k: Option<usize>,

        /// List the members of every cluster
        #[arg(long)]
        members: bool,

        /// Include 2-D projected coordinates
        #[arg(long)]
        project: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Recommend songs similar to a seed song
    Recommend {
        /// Seed song name (case-insensitive substring)
        #[arg(value_hint = clap::ValueHint::Other)]
        song: String,

        /// Number of recommendations
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Leave the seed song out of the results
        #[arg(long)]
        exclude_seed: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Export the results as a playlist, named with `--playlist=NAME`
        #[arg(
            long,
            num_args = 0..=1,
            require_equals = true,
            default_missing_value = crate::playlist::DEFAULT_PLAYLIST_NAME
        )]
        playlist: Option<String>,

        /// Directory for exported playlists
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        export_dir: Option<PathBuf>,
    },

    /// Exploratory aggregates over the catalog
    Explore {
        view: ExploreView,

        /// Number of rows for ranked views
        #[arg(long, default_value = "10")]
        top: usize,

        /// Names to count for the `words` view
        #[arg(long, value_enum, default_value_t)]
        source: WordSource,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    ///
    /// Usage: muziki completion bash > ~/.local/share/bash-completion/completions/muziki
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List track names for completion (hidden command)
    #[command(hide = true)]
    CompleteSongs,
}
