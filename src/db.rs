//! # Catalog Database
//!
//! SQLite storage for an imported [`Catalog`], so the CSVs only have to be
//! parsed once. One table per dataset plus two bookkeeping tables:
//!
//! - `dataset_columns`: the header set each source CSV had
//! - `metadata`: import timestamp and import id
//!
//! Rows keep their CSV order through an explicit `row_id`. Every import
//! replaces the previous catalog in a single transaction.

use crate::model::{ArtistProfile, Catalog, Dataset, GenreProfile, Track, YearProfile};
use anyhow::{bail, Context, Result};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracks (
    row_id           INTEGER PRIMARY KEY,
    id               TEXT    NOT NULL,
    name             TEXT    NOT NULL,
    artists          TEXT    NOT NULL,
    popularity       REAL    NOT NULL,
    valence          REAL,
    energy           REAL,
    danceability     REAL,
    acousticness     REAL,
    year             INTEGER,
    genre            TEXT,
    instrumentalness REAL,
    liveness         REAL,
    loudness         REAL
);
CREATE INDEX IF NOT EXISTS idx_tracks_name ON tracks(name);

CREATE TABLE IF NOT EXISTS genres (
    row_id       INTEGER PRIMARY KEY,
    genre        TEXT NOT NULL,
    popularity   REAL,
    valence      REAL,
    energy       REAL,
    danceability REAL,
    acousticness REAL
);

CREATE TABLE IF NOT EXISTS years (
    row_id       INTEGER PRIMARY KEY,
    year         INTEGER NOT NULL,
    popularity   REAL,
    valence      REAL,
    energy       REAL,
    danceability REAL,
    acousticness REAL
);

CREATE TABLE IF NOT EXISTS artists (
    row_id       INTEGER PRIMARY KEY,
    artists      TEXT NOT NULL,
    count        INTEGER,
    popularity   REAL,
    valence      REAL,
    energy       REAL,
    danceability REAL,
    acousticness REAL
);

CREATE TABLE IF NOT EXISTS dataset_columns (
    dataset     TEXT NOT NULL,
    column_name TEXT NOT NULL,
    PRIMARY KEY (dataset, column_name)
);

CREATE TABLE IF NOT EXISTS metadata (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const DROP_SCHEMA: &str = "
DROP TABLE IF EXISTS tracks;
DROP TABLE IF EXISTS genres;
DROP TABLE IF EXISTS years;
DROP TABLE IF EXISTS artists;
DROP TABLE IF EXISTS dataset_columns;
DROP TABLE IF EXISTS metadata;
";

/// Open a catalog database, creating the schema if it is missing.
///
/// Opening never touches stored rows, so it is safe on a database that
/// already holds an import.
///
/// # Errors
///
/// Fails if the file cannot be opened as SQLite or the schema cannot be created.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open catalog database at {}", path.display()))?;
    conn.execute_batch(SCHEMA)
        .with_context(|| format!("Failed to create schema in {}", path.display()))?;
    Ok(conn)
}

/// Prepare a catalog database at `path` for a new import.
///
/// Parent directories are created as needed. An existing catalog is left in
/// place; [`store_catalog`] replaces it once the new rows are ready.
///
/// # Errors
///
/// Fails if the database cannot be opened, or if it already holds a catalog
/// and `force` is not set.
pub fn init_database(path: &Path, force: bool) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let conn = open(path)?;
    if has_catalog(&conn)? {
        if !force {
            bail!(
                "A catalog already exists at {}. Use --force to replace it.",
                path.display()
            );
        }
        info!("Existing catalog at {} will be replaced", path.display());
    }
    Ok(conn)
}

/// Whether any import has been stored.
///
/// # Errors
///
/// Fails if the metadata table cannot be queried.
pub fn has_catalog(conn: &Connection) -> Result<bool> {
    let imported: Option<String> = conn
        .query_row("SELECT value FROM metadata WHERE key = 'import_id'", [], |row| row.get(0))
        .optional()
        .context("Failed to query catalog metadata")?;
    Ok(imported.is_some())
}

/// Identity of the stored import, `None` if nothing was imported yet.
///
/// The id changes with every [`store_catalog`] call, so callers can tell
/// whether results computed earlier still belong to the stored data.
///
/// # Errors
///
/// Fails if the metadata table cannot be queried.
pub fn catalog_fingerprint(conn: &Connection) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM metadata WHERE key = 'import_id'", [], |row| row.get(0))
        .optional()
        .context("Failed to read the catalog fingerprint")
}

/// Replace the stored catalog with `catalog`.
///
/// Tables are dropped, recreated and filled in one transaction: either the
/// whole new catalog is visible afterwards, or the previous one is untouched.
///
/// # Errors
///
/// Fails if any statement fails; the transaction is rolled back.
pub fn store_catalog(conn: &mut Connection, catalog: &Catalog) -> Result<()> {
    let tx = conn.transaction()?;

    // Rolled back together with the inserts if anything below fails.
    tx.execute_batch(DROP_SCHEMA)
        .context("Failed to drop the existing catalog")?;
    tx.execute_batch(SCHEMA)
        .context("Failed to recreate the catalog schema")?;

    insert_tracks(&tx, &catalog.tracks)?;
    insert_genres(&tx, &catalog.genres)?;
    insert_years(&tx, &catalog.years)?;
    insert_artists(&tx, &catalog.artists)?;

    {
        let mut stmt = tx.prepare("INSERT INTO dataset_columns (dataset, column_name) VALUES (?1, ?2)")?;
        let tables: [(&str, Vec<&str>); 4] = [
            ("tracks", catalog.tracks.columns().collect()),
            ("genres", catalog.genres.columns().collect()),
            ("years", catalog.years.columns().collect()),
            ("artists", catalog.artists.columns().collect()),
        ];
        for (dataset, columns) in tables {
            for column in columns {
                stmt.execute(params![dataset, column])
                    .with_context(|| format!("Failed to record column {column} of {dataset}"))?;
            }
        }
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?;
    tx.execute(
        "INSERT INTO metadata (key, value) VALUES ('imported_at', ?1), ('import_id', ?2)",
        params![now.as_secs().to_string(), format!("{}-{}", now.as_nanos(), catalog.tracks.len())],
    )
    .context("Failed to write catalog metadata")?;

    tx.commit().context("Committing the catalog import failed")?;
    info!(
        "Stored {} tracks, {} genres, {} years, {} artists.",
        catalog.tracks.len(),
        catalog.genres.len(),
        catalog.years.len(),
        catalog.artists.len()
    );
    Ok(())
}

fn insert_tracks(tx: &Transaction<'_>, tracks: &Dataset<Track>) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO tracks (row_id, id, name, artists, popularity, valence, energy, danceability,
            acousticness, year, genre, instrumentalness, liveness, loudness)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    )?;
    for (row_id, t) in tracks.rows().iter().enumerate() {
        stmt.execute(params![
            row_id, t.id, t.name, t.artists, t.popularity, t.valence, t.energy, t.danceability,
            t.acousticness, t.year, t.genre, t.instrumentalness, t.liveness, t.loudness
        ])
        .with_context(|| format!("Failed to insert track '{}'", t.name))?;
    }
    debug!("Inserted {} tracks", tracks.len());
    Ok(())
}

fn insert_genres(tx: &Transaction<'_>, genres: &Dataset<GenreProfile>) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO genres (row_id, genre, popularity, valence, energy, danceability, acousticness)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (row_id, g) in genres.rows().iter().enumerate() {
        stmt.execute(params![row_id, g.genre, g.popularity, g.valence, g.energy, g.danceability, g.acousticness])
            .with_context(|| format!("Failed to insert genre '{}'", g.genre))?;
    }
    Ok(())
}

fn insert_years(tx: &Transaction<'_>, years: &Dataset<YearProfile>) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO years (row_id, year, popularity, valence, energy, danceability, acousticness)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (row_id, y) in years.rows().iter().enumerate() {
        stmt.execute(params![row_id, y.year, y.popularity, y.valence, y.energy, y.danceability, y.acousticness])
            .with_context(|| format!("Failed to insert year {}", y.year))?;
    }
    Ok(())
}

fn insert_artists(tx: &Transaction<'_>, artists: &Dataset<ArtistProfile>) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO artists (row_id, artists, count, popularity, valence, energy, danceability, acousticness)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (row_id, a) in artists.rows().iter().enumerate() {
        stmt.execute(params![
            row_id, a.artists, a.count, a.popularity, a.valence, a.energy, a.danceability, a.acousticness
        ])
        .with_context(|| format!("Failed to insert artist '{}'", a.artists))?;
    }
    Ok(())
}

fn load_columns(conn: &Connection, dataset: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT column_name FROM dataset_columns WHERE dataset = ?1")?;
    let columns = stmt
        .query_map([dataset], |row| row.get(0))
        .with_context(|| format!("Cannot query columns of {dataset}"))?
        .collect::<rusqlite::Result<BTreeSet<String>>>()?;
    Ok(columns)
}

fn load_table<R>(
    conn: &Connection,
    dataset: &str,
    sql: &str,
    map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<R>,
) -> Result<Dataset<R>> {
    let columns = load_columns(conn, dataset)?;
    let mut stmt = conn
        .prepare(sql)
        .with_context(|| format!("Invalid SQL statement when SELECTing from {dataset}"))?;
    let rows = stmt
        .query_map([], map)
        .with_context(|| format!("Cannot query {dataset}"))?
        .collect::<rusqlite::Result<Vec<R>>>()
        .with_context(|| format!("Failed to read a row of {dataset}"))?;
    Ok(Dataset::new(columns, rows))
}

/// Read the stored catalog back, in import order.
///
/// Column sets come from `dataset_columns`, so a table reports the same
/// columns its source CSV had.
///
/// # Errors
///
/// Fails if a table cannot be read or a row has an unexpected type.
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let tracks = load_table(
        conn,
        "tracks",
        "SELECT id, name, artists, popularity, valence, energy, danceability, acousticness,
                year, genre, instrumentalness, liveness, loudness
         FROM tracks ORDER BY row_id",
        |row| {
            Ok(Track {
                id: row.get(0)?,
                name: row.get(1)?,
                artists: row.get(2)?,
                popularity: row.get(3)?,
                valence: row.get(4)?,
                energy: row.get(5)?,
                danceability: row.get(6)?,
                acousticness: row.get(7)?,
                year: row.get(8)?,
                genre: row.get(9)?,
                instrumentalness: row.get(10)?,
                liveness: row.get(11)?,
                loudness: row.get(12)?,
            })
        },
    )?;

    let genres = load_table(
        conn,
        "genres",
        "SELECT genre, popularity, valence, energy, danceability, acousticness FROM genres ORDER BY row_id",
        |row| {
            Ok(GenreProfile {
                genre: row.get(0)?,
                popularity: row.get(1)?,
                valence: row.get(2)?,
                energy: row.get(3)?,
                danceability: row.get(4)?,
                acousticness: row.get(5)?,
            })
        },
    )?;

    let years = load_table(
        conn,
        "years",
        "SELECT year, popularity, valence, energy, danceability, acousticness FROM years ORDER BY row_id",
        |row| {
            Ok(YearProfile {
                year: row.get(0)?,
                popularity: row.get(1)?,
                valence: row.get(2)?,
                energy: row.get(3)?,
                danceability: row.get(4)?,
                acousticness: row.get(5)?,
            })
        },
    )?;

    let artists = load_table(
        conn,
        "artists",
        "SELECT artists, count, popularity, valence, energy, danceability, acousticness
         FROM artists ORDER BY row_id",
        |row| {
            Ok(ArtistProfile {
                artists: row.get(0)?,
                count: row.get(1)?,
                popularity: row.get(2)?,
                valence: row.get(3)?,
                energy: row.get(4)?,
                danceability: row.get(5)?,
                acousticness: row.get(6)?,
            })
        },
    )?;

    debug!("Loaded catalog with {} tracks", tracks.len());
    Ok(Catalog { tracks, genres, years, artists })
}

/// Distinct track names, for shell completion.
pub fn track_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT DISTINCT name FROM tracks WHERE name != '' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .context("Cannot query track names")?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_catalog() -> Catalog {
        let tracks = Dataset::new(
            ["name", "popularity", "valence", "energy", "danceability", "acousticness", "year"],
            vec![
                Track {
                    name: "Zeta".to_string(),
                    popularity: 50.0,
                    valence: Some(0.5),
                    energy: None,
                    danceability: Some(0.2),
                    acousticness: Some(0.9),
                    year: Some(1987),
                    ..Track::default()
                },
                Track {
                    name: "Alpha".to_string(),
                    popularity: 10.0,
                    valence: Some(0.1),
                    energy: Some(0.2),
                    danceability: Some(0.3),
                    acousticness: Some(0.4),
                    ..Track::default()
                },
            ],
        );
        let genres = Dataset::from_rows(vec![GenreProfile {
            genre: "jazz".to_string(),
            popularity: Some(40.0),
            valence: Some(0.6),
            energy: Some(0.3),
            danceability: Some(0.5),
            acousticness: None,
        }]);
        let years = Dataset::from_rows(vec![YearProfile::new(1999)]);
        let artists = Dataset::from_rows(vec![ArtistProfile {
            artists: "A, B".to_string(),
            count: Some(3),
            ..ArtistProfile::default()
        }]);
        Catalog { tracks, genres, years, artists }
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut conn = init_database(&dir.path().join("catalog.db"), false).unwrap();
        let catalog = sample_catalog();

        store_catalog(&mut conn, &catalog).unwrap();
        let loaded = load_catalog(&conn).unwrap();

        assert_eq!(loaded, catalog, "Round trip must keep rows, order, columns and missing values");
        assert!(!loaded.tracks.has_column("loudness"));
        assert_eq!(loaded.tracks.rows()[0].energy, None);
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let mut conn = init_database(&path, false).unwrap();
        store_catalog(&mut conn, &sample_catalog()).unwrap();
        drop(conn);

        assert!(init_database(&path, false).is_err());

        let conn = init_database(&path, true).unwrap();
        assert!(has_catalog(&conn).unwrap(), "Nothing is dropped before the new catalog is stored");
    }

    #[test]
    fn test_forced_reimport_keeps_old_catalog_until_stored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let mut conn = init_database(&path, false).unwrap();
        store_catalog(&mut conn, &sample_catalog()).unwrap();
        drop(conn);

        // A forced import that never gets to store its rows.
        drop(init_database(&path, true).unwrap());
        let conn = open(&path).unwrap();
        assert_eq!(load_catalog(&conn).unwrap(), sample_catalog());
        drop(conn);

        let mut conn = init_database(&path, true).unwrap();
        let replacement = Catalog {
            tracks: Dataset::from_rows(vec![Track {
                name: "Only".to_string(),
                popularity: 1.0,
                ..Track::default()
            }]),
            ..Catalog::default()
        };
        store_catalog(&mut conn, &replacement).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.tracks.len(), 1);
        assert!(loaded.genres.is_empty());
        assert!(loaded.artists.is_empty());
    }

    #[test]
    fn test_fingerprint_changes_with_import() {
        let dir = TempDir::new().unwrap();
        let mut conn = init_database(&dir.path().join("catalog.db"), false).unwrap();
        assert_eq!(catalog_fingerprint(&conn).unwrap(), None);

        store_catalog(&mut conn, &sample_catalog()).unwrap();
        let first = catalog_fingerprint(&conn).unwrap();
        assert!(first.is_some());

        std::thread::sleep(std::time::Duration::from_millis(2));
        store_catalog(&mut conn, &sample_catalog()).unwrap();
        assert_ne!(catalog_fingerprint(&conn).unwrap(), first);
    }

    #[test]
    fn test_track_names_sorted_and_distinct() {
        let dir = TempDir::new().unwrap();
        let mut conn = init_database(&dir.path().join("catalog.db"), false).unwrap();
        store_catalog(&mut conn, &sample_catalog()).unwrap();
        assert_eq!(track_names(&conn).unwrap(), ["Alpha", "Zeta"]);
    }
}
