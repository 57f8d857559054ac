//! # Place Store
//!
//! SQLite-backed storage for the place list. The tracking core never touches
//! it; the host loads places from here and hands one to a session.

use std::sync::Mutex;

use log::info;
use once_cell::sync::Lazy;
use rusqlite::{params, Connection, OptionalExtension};

use crate::{Place, Result};

/// SQLite store for [`Place`] records.
pub struct PlaceStore {
    db: Connection,
}

impl PlaceStore {
    // ========================================================================
    // Initialization
    // ========================================================================

    /// Open (or create) a store at `db_path`.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        Ok(Self { db })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS places (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                address TEXT,
                category TEXT,
                thumbnail BLOB,
                created_at INTEGER DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )?;
        Ok(())
    }

    // ========================================================================
    // Places
    // ========================================================================

    /// Store a place and return its row id.
    pub fn save(&self, place: &Place) -> Result<i64> {
        self.db.execute(
            "INSERT INTO places (name, address, category, thumbnail) VALUES (?1, ?2, ?3, ?4)",
            params![place.name, place.address, place.category, place.thumbnail],
        )?;
        Ok(self.db.last_insert_rowid())
    }

    /// All places in the order they were saved.
    pub fn load_all(&self) -> Result<Vec<Place>> {
        let mut stmt = self
            .db
            .prepare("SELECT name, address, category, thumbnail FROM places ORDER BY id")?;
        let places = stmt
            .query_map([], |row| {
                Ok(Place {
                    name: row.get(0)?,
                    address: row.get(1)?,
                    category: row.get(2)?,
                    thumbnail: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(places)
    }

    /// Look up a place by its row id.
    pub fn get(&self, id: i64) -> Result<Option<Place>> {
        let place = self
            .db
            .query_row(
                "SELECT name, address, category, thumbnail FROM places WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Place {
                        name: row.get(0)?,
                        address: row.get(1)?,
                        category: row.get(2)?,
                        thumbnail: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(place)
    }

    pub fn count(&self) -> Result<u32> {
        let count: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
        Ok(count as u32)
    }

    /// Insert the default place list if the store is empty.
    ///
    /// Returns the number of places inserted.
    pub fn seed_defaults(&mut self) -> Result<u32> {
        if self.count()? > 0 {
            return Ok(0);
        }
        let places = Place::default_places();
        let tx = self.db.transaction()?;
        for place in &places {
            tx.execute(
                "INSERT INTO places (name, address, category, thumbnail) VALUES (?1, ?2, ?3, ?4)",
                params![place.name, place.address, place.category, place.thumbnail],
            )?;
        }
        tx.commit()?;
        info!("[PlaceStore] Seeded {} default places", places.len());
        Ok(places.len() as u32)
    }
}

impl std::fmt::Debug for PlaceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceStore")
            .field("path", &self.db.path())
            .finish()
    }
}

// ============================================================================
// Global Singleton for FFI
// ============================================================================

/// Global place store instance.
///
/// Lets FFI calls reach the store without passing a handle across the
/// boundary.
pub static PLACE_STORE: Lazy<Mutex<Option<PlaceStore>>> = Lazy::new(|| Mutex::new(None));

/// Run `f` against the global place store, if it is initialized.
pub fn with_place_store<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut PlaceStore) -> R,
{
    let mut guard = PLACE_STORE.lock().ok()?;
    guard.as_mut().map(f)
}

// ============================================================================
// FFI Exports for the Place Store
// ============================================================================

#[cfg(feature = "ffi")]
pub mod place_store_ffi {
    use super::*;
    use log::{error, info};

    /// Open the place store and seed it on first launch.
    /// Call this once at app startup before any other place store functions.
    #[uniffi::export]
    pub fn place_store_init(db_path: String) -> bool {
        crate::init_logging();
        info!("[PlaceStore] Initializing with db: {}", db_path);

        match PlaceStore::new(&db_path) {
            Ok(mut store) => {
                if let Err(e) = store.seed_defaults() {
                    error!("[PlaceStore] Failed to seed default places: {}", e);
                }
                match PLACE_STORE.lock() {
                    Ok(mut guard) => {
                        *guard = Some(store);
                        true
                    }
                    Err(_) => {
                        error!("[PlaceStore] Store lock poisoned");
                        false
                    }
                }
            }
            Err(e) => {
                error!("[PlaceStore] Failed to initialize: {}", e);
                false
            }
        }
    }

    /// Save a place. Returns its row id, or -1 on failure.
    #[uniffi::export]
    pub fn place_store_save(place: crate::Place) -> i64 {
        with_place_store(|s| match s.save(&place) {
            Ok(id) => id,
            Err(e) => {
                error!("[PlaceStore] Save failed: {}", e);
                -1
            }
        })
        .unwrap_or(-1)
    }

    /// Load every saved place.
    #[uniffi::export]
    pub fn place_store_load_all() -> Vec<crate::Place> {
        with_place_store(|s| s.load_all().unwrap_or_else(|e| {
            error!("[PlaceStore] Load failed: {}", e);
            Vec::new()
        }))
        .unwrap_or_default()
    }

    /// Insert the default places if the store is empty.
    /// Returns the number inserted (0 if already populated or uninitialized).
    #[uniffi::export]
    pub fn place_store_seed_defaults() -> u32 {
        with_place_store(|s| s.seed_defaults().unwrap_or_else(|e| {
            error!("[PlaceStore] Seeding failed: {}", e);
            0
        }))
        .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================
