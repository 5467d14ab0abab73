//! # muziki
//!
//! Command-line front end: imports the CSV datasets once, then clusters,
//! recommends and explores from the stored catalog.
//!
//! ## Usage
//!
//! ```bash
//! muziki import --dir ./datasets
//! muziki summary
//! muziki cluster genres -k 5 --members
//! muziki cluster songs --json
//! muziki recommend "Mas Que Nada" -n 10
//! muziki explore trends
//! muziki explore words --source artists
//! ```

use anyhow::{anyhow, bail, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info, warn};
use muziki::cli::{self, ClusterTarget, ExploreView, WordSource};
use muziki::cluster::{cluster_members, ClusterMembers, Clustered, Point};
use muziki::config::RuntimeConfig;
use muziki::error::RecommendError;
use muziki::loading::{self, CatalogPaths};
use muziki::model::{Dataset, FeatureRow, Track};
use muziki::playlist::{JsonFileExporter, PlaylistExporter, PlaylistRequest};
use muziki::projection::ProjectedPoint;
use muziki::session::Session;
use muziki::{completion, db, explore};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct Assignment<'a> {
    label: std::borrow::Cow<'a, str>,
    cluster: usize,
}

#[derive(Serialize)]
struct ClusterReport<'a> {
    target: &'static str,
    k: usize,
    inertia: f64,
    sizes: Vec<usize>,
    centroids: &'a [Point],
    assignments: Vec<Assignment<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    members: Option<Vec<ClusterMembers>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projection: Option<Vec<ProjectedPoint>>,
}

impl<'a> ClusterReport<'a> {
    fn new<R: FeatureRow>(target: &'static str, clustered: &'a Clustered<R>, members: bool) -> Self {
        Self {
            target,
            k: clustered.k(),
            inertia: clustered.inertia(),
            sizes: clustered.cluster_sizes(),
            centroids: clustered.centroids(),
            assignments: clustered
                .iter()
                .map(|(row, cluster)| Assignment { label: row.label(), cluster })
                .collect(),
            members: members.then(|| cluster_members(clustered)),
            projection: None,
        }
    }

    fn emit(&self, json: bool) -> Result<()> {
        if json {
            return print_json(self);
        }
        self.print_text();
        Ok(())
    }

    fn print_text(&self) {
        println!("{} clustered into {} groups (inertia {:.4})", self.target, self.k, self.inertia);
        for (cluster, size) in self.sizes.iter().enumerate() {
            println!("  cluster {cluster}: {size} rows");
        }
        if let Some(members) = &self.members {
            println!();
            for group in members {
                println!("Cluster {}: {}", group.cluster, group.joined());
            }
        }
        if let Some(points) = &self.projection {
            println!();
            for (point, assignment) in points.iter().zip(&self.assignments) {
                println!("{:>8.4} {:>8.4}  [{}] {}", point.x, point.y, assignment.cluster, point.label);
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_table_summary<R: Serialize>(name: &str, table: &Dataset<R>) -> Result<()> {
    println!("{name}: {} rows", table.len());
    println!("  columns: {}", table.columns().collect::<Vec<_>>().join(", "));
    for row in table.rows().iter().take(2) {
        println!("  {}", serde_json::to_string(row)?);
    }
    Ok(())
}

fn print_tracks(tracks: &[Track]) {
    for (rank, track) in tracks.iter().enumerate() {
        let year = track.year.map_or_else(|| "----".to_string(), |y| y.to_string());
        println!(
            "{:>3}. {} - {} ({year}, popularity {:.0})",
            rank + 1,
            track.name,
            track.artists,
            track.popularity
        );
    }
}

fn import(
    db_path: &Path,
    dir: Option<PathBuf>,
    overrides: [Option<PathBuf>; 4],
    force: bool,
) -> Result<()> {
    let [tracks, genres, years, artists] = overrides;

    let mut paths = match (&dir, tracks) {
        (Some(dir), tracks) => {
            let mut paths = CatalogPaths::from_dir(dir);
            // Aggregate tables are optional when importing a directory.
            for table in [&mut paths.genres, &mut paths.years, &mut paths.artists] {
                if table.as_ref().is_some_and(|path| !path.exists()) {
                    if let Some(path) = table.take() {
                        warn!("{} not found, skipping it.", path.display());
                    }
                }
            }
            if let Some(tracks) = tracks {
                paths.tracks = tracks;
            }
            paths
        }
        (None, Some(tracks)) => CatalogPaths {
            tracks,
            ..CatalogPaths::default()
        },
        (None, None) => bail!("Nothing to import. Pass --dir or --tracks."),
    };
    if genres.is_some() {
        paths.genres = genres;
    }
    if years.is_some() {
        paths.years = years;
    }
    if artists.is_some() {
        paths.artists = artists;
    }

    let catalog = loading::load_catalog(&paths)?;
    let mut conn = db::init_database(db_path, force)?;
    db::store_catalog(&mut conn, &catalog)?;

    println!(
        "Imported {} tracks, {} genres, {} years, {} artists into {}",
        catalog.tracks.len(),
        catalog.genres.len(),
        catalog.years.len(),
        catalog.artists.len(),
        db_path.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let mut config = RuntimeConfig::load(args.config.as_deref())?;
    if let Some(db_path) = args.db {
        config = config.with_db_path(db_path);
    }
    debug!("Using catalog database {}", config.db_path.display());

    match args.command {
        cli::Command::Import { dir, tracks, genres, years, artists, force } => {
            info!("Importing datasets into {}", config.db_path.display());
            import(&config.db_path, dir, [tracks, genres, years, artists], force)?;
        }
        cli::Command::Summary => {
            let session = Session::open(config)?;
            let catalog = session.catalog();
            print_table_summary("tracks", &catalog.tracks)?;
            print_table_summary("genres", &catalog.genres)?;
            print_table_summary("years", &catalog.years)?;
            print_table_summary("artists", &catalog.artists)?;
        }
        cli::Command::Cluster { target, k, members, project, json } => {
            let mut session = Session::open(config)?;
            match target {
                ClusterTarget::Genres => {
                    let k = k.unwrap_or(session.config().genre_clusters);
                    let projection = if project { Some(session.project_genres()?) } else { None };
                    let clustered = session.cluster_genres(k)?;
                    let mut report = ClusterReport::new("genres", clustered, members);
                    report.projection = projection;
                    report.emit(json)?;
                }
                ClusterTarget::Songs => {
                    let k = k.unwrap_or(session.config().song_clusters);
                    let projection = if project { Some(session.project_songs()?) } else { None };
                    let clustered = session.cluster_songs(k)?;
                    let mut report = ClusterReport::new("songs", clustered, members);
                    report.projection = projection;
                    report.emit(json)?;
                }
            }
        }
        cli::Command::Recommend { song, count, exclude_seed, json, playlist, export_dir } => {
            let export_dir = export_dir.unwrap_or_else(|| config.playlist_dir.clone());
            let mut session = Session::open(config)?;
            if exclude_seed {
                session.set_exclude_seed(true);
            }
            let count = count.unwrap_or(session.config().recommendations);

            let picks = match session.recommend(&song, count).map(<[Track]>::to_vec) {
                Ok(picks) => picks,
                Err(err) if err.is_empty_result() => {
                    warn!("{err}");
                    eprintln!("No songs found with a similar feature profile to '{song}'.");
                    return Ok(());
                }
                Err(err @ RecommendError::SongNotFound { .. }) => {
                    let suggestions = session.suggestions(&song);
                    if !suggestions.is_empty() {
                        eprintln!("Did you mean:");
                        for suggestion in &suggestions {
                            eprintln!("  {suggestion}");
                        }
                    }
                    return Err(anyhow!(err));
                }
                Err(err) => return Err(anyhow!(err)),
            };

            if json {
                print_json(&picks)?;
            } else {
                println!("Recommendations for '{song}':");
                print_tracks(&picks);
            }

            if let Some(name) = playlist {
                let request = PlaylistRequest::from_tracks(name, &picks);
                let created = JsonFileExporter::new(export_dir).export(&request)?;
                println!("Playlist '{}' created: {}", request.name, created.url);
            }
        }
        cli::Command::Explore { view, top, source, json } => {
            let session = Session::open(config)?;
            let catalog = session.catalog();
            match view {
                ExploreView::Decades => {
                    let decades = explore::decade_distribution(&catalog.tracks);
                    if json {
                        print_json(&decades)?;
                    } else {
                        for row in &decades {
                            println!("{}s: {}", row.decade, row.track_count);
                        }
                    }
                }
                ExploreView::Trends => {
                    let trends = explore::feature_trends(&catalog.tracks);
                    if json {
                        print_json(&trends)?;
                    } else {
                        for trend in &trends {
                            let means: Vec<String> =
                                trend.means.iter().map(|(name, mean)| format!("{name}={mean:.3}")).collect();
                            println!("{}s: {}", trend.decade, means.join(" "));
                        }
                    }
                }
                ExploreView::Genres => {
                    let genres = explore::top_genres(&catalog.genres, top);
                    if json {
                        print_json(&genres)?;
                    } else {
                        for genre in &genres {
                            let popularity = genre.popularity.map_or_else(|| "-".to_string(), |p| format!("{p:.1}"));
                            println!("{} (popularity {popularity})", genre.genre);
                        }
                    }
                }
                ExploreView::Words => {
                    let words = match source {
                        WordSource::Genres => explore::genre_words(&catalog.genres, top),
                        WordSource::Artists => explore::artist_words(&catalog.artists, top),
                    };
                    if json {
                        print_json(&words)?;
                    } else {
                        for word in &words {
                            println!("{:>6}  {}", word.count, word.word);
                        }
                    }
                }
                ExploreView::Artists => {
                    let by_count = explore::top_artists_by_count(&catalog.artists, top);
                    let by_popularity = explore::top_artists_by_popularity(&catalog.artists, top);
                    if json {
                        print_json(&serde_json::json!({
                            "by_count": by_count,
                            "by_popularity": by_popularity,
                        }))?;
                    } else {
                        println!("Most tracks:");
                        for artist in &by_count {
                            println!("  {} ({})", artist.artists, artist.count.unwrap_or_default());
                        }
                        println!("Most popular:");
                        for artist in &by_popularity {
                            println!("  {} ({:.1})", artist.artists, artist.popularity.unwrap_or_default());
                        }
                    }
                }
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
        cli::Command::CompleteSongs => {
            completion::print_song_completions(&config.db_path)?;
        }
    }

    Ok(())
}
