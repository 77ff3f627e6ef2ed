//! SQL schema for the shelter SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision for future migrations.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Rewritten wholesale by every refresh. `id` has no AUTOINCREMENT so ids
-- restart at 1 after each full replace.
CREATE TABLE IF NOT EXISTS shelters (
    id                  INTEGER PRIMARY KEY,
    category            TEXT,
    name                TEXT    NOT NULL CHECK (length(trim(name)) > 0),
    capacity            INTEGER NOT NULL DEFAULT 0 CHECK (capacity >= 0),
    supported_disasters INTEGER NOT NULL DEFAULT 0,  -- DisasterKinds bits
    accessible          INTEGER NOT NULL DEFAULT 0,
    address             TEXT    NOT NULL CHECK (length(trim(address)) > 0),
    latitude            REAL,                        -- NULL when ungeocoded
    longitude           REAL,
    phone               TEXT,
    floor_area_sqm      INTEGER NOT NULL DEFAULT 0 CHECK (floor_area_sqm >= 0),
    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

-- One row per named cache; upserted, never deleted.
CREATE TABLE IF NOT EXISTS cache_metadata (
    cache_key    TEXT    PRIMARY KEY,
    last_updated TEXT    NOT NULL,   -- RFC 3339 UTC
    record_count INTEGER NOT NULL,
    notes        TEXT
);

CREATE INDEX IF NOT EXISTS shelters_name_idx      ON shelters(name);
CREATE INDEX IF NOT EXISTS shelters_address_idx   ON shelters(address);
CREATE INDEX IF NOT EXISTS shelters_disasters_idx ON shelters(supported_disasters);
CREATE INDEX IF NOT EXISTS shelters_location_idx  ON shelters(latitude, longitude);

PRAGMA user_version = 1;
";
