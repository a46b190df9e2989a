//! Durable allocation store backed by `SQLite`.
//!
//! # Schema
//!
//! - `roles`: `name`, `priority_rank`
//! - `users`: `id`, `display_name`
//! - `user_roles`: `user_id`, `role_name`
//! - `lots`: `id`, `name`, `address`, `priority_rank`, `country_code`, `city`
//! - `lot_roles`: `lot_id`, `role_name`
//! - `spaces`: `id`, `lot_id`, `label`, `is_priority`, `notes`
//! - `requests`: unique on `(user_id, requested_date)`
//! - `allocations`: unique on `(user_id, allocated_date)` and on
//!   `(space_id, allocated_date)`
//!
//! The allocation uniqueness constraints are the last-resort safety net
//! behind the engine's own invariants: two racing runs for one date cannot
//! both commit overlapping assignments. `save_allocations` writes the whole
//! batch inside one transaction, so a constraint hit rolls back everything.
//!
//! Dates are stored as ISO `YYYY-MM-DD` text, timestamps as RFC 3339 text.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use parkd_core::eligibility::RoleDirectory;
use parkd_core::model::{
    Allocation, AllocationDetails, AllocationId, DraftAllocation, Lot, LotId, NewRequest,
    RegionKey, Request, RequestId, Role, Space, SpaceId, UserId,
};
use parkd_core::store::{AllocationStore, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS roles (
    name          TEXT PRIMARY KEY,
    priority_rank INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    id           INTEGER PRIMARY KEY,
    display_name TEXT
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id   INTEGER NOT NULL REFERENCES users(id),
    role_name TEXT NOT NULL REFERENCES roles(name),
    PRIMARY KEY (user_id, role_name)
);

CREATE TABLE IF NOT EXISTS lots (
    id            INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    address       TEXT,
    priority_rank INTEGER NOT NULL,
    country_code  TEXT NOT NULL,
    city          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lot_roles (
    lot_id    INTEGER NOT NULL REFERENCES lots(id),
    role_name TEXT NOT NULL REFERENCES roles(name),
    PRIMARY KEY (lot_id, role_name)
);

CREATE TABLE IF NOT EXISTS spaces (
    id          INTEGER PRIMARY KEY,
    lot_id      INTEGER NOT NULL REFERENCES lots(id),
    label       TEXT NOT NULL,
    is_priority INTEGER NOT NULL DEFAULT 0,
    notes       TEXT
);

CREATE TABLE IF NOT EXISTS requests (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES users(id),
    requested_date TEXT NOT NULL,
    requested_at   TEXT NOT NULL,
    country_code   TEXT NOT NULL,
    city           TEXT NOT NULL,
    UNIQUE (user_id, requested_date)
);

CREATE TABLE IF NOT EXISTS allocations (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id        INTEGER NOT NULL REFERENCES users(id),
    space_id       INTEGER NOT NULL REFERENCES spaces(id),
    allocated_date TEXT NOT NULL,
    allocated_at   TEXT NOT NULL,
    UNIQUE (user_id, allocated_date),
    UNIQUE (space_id, allocated_date)
);
";

/// [`AllocationStore`] implementation over a `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and applies the
    /// schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path).map_err(map_sqlite_err)?)
    }

    /// Opens a private in-memory database; used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory().map_err(map_sqlite_err)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA).map_err(map_sqlite_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(map_sqlite_err)?;
        Ok(Self { conn })
    }

    /// Registers a role.
    pub fn insert_role(&mut self, role: &Role) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO roles (name, priority_rank) VALUES (?1, ?2)",
                params![role.name, role.priority_rank],
            )
            .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Registers a user.
    pub fn insert_user(&mut self, user: UserId, display_name: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO users (id, display_name) VALUES (?1, ?2)",
                params![user.0, display_name],
            )
            .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Grants a role to a user.
    pub fn assign_role(&mut self, user: UserId, role_name: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO user_roles (user_id, role_name) VALUES (?1, ?2)",
                params![user.0, role_name],
            )
            .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Registers a lot together with its spaces and eligible roles.
    pub fn insert_lot(&mut self, lot: &Lot) -> Result<(), StoreError> {
        let tx = self.conn.transaction().map_err(map_sqlite_err)?;
        tx.execute(
            "INSERT INTO lots (id, name, address, priority_rank, country_code, city)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                lot.id.0,
                lot.name,
                lot.address,
                lot.priority_rank,
                lot.region.country_code,
                lot.region.city
            ],
        )
        .map_err(map_sqlite_err)?;
        for role_name in &lot.eligible_roles {
            tx.execute(
                "INSERT INTO lot_roles (lot_id, role_name) VALUES (?1, ?2)",
                params![lot.id.0, role_name],
            )
            .map_err(map_sqlite_err)?;
        }
        for space in &lot.spaces {
            tx.execute(
                "INSERT INTO spaces (id, lot_id, label, is_priority, notes)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    space.id.0,
                    lot.id.0,
                    space.label,
                    space.is_priority,
                    space.notes
                ],
            )
            .map_err(map_sqlite_err)?;
        }
        tx.commit().map_err(map_sqlite_err)?;
        Ok(())
    }
}

impl AllocationStore for SqliteStore {
    fn pending_requests(&self, date: NaiveDate) -> Result<Vec<Request>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, requested_date, requested_at, country_code, city
                 FROM requests WHERE requested_date = ?1 ORDER BY id",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![date.to_string()], request_from_row)
            .map_err(map_sqlite_err)?;
        collect_rows(rows)
    }

    fn allocations_for_date(&self, date: NaiveDate) -> Result<Vec<Allocation>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, space_id, allocated_date, allocated_at
                 FROM allocations WHERE allocated_date = ?1 ORDER BY id",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![date.to_string()], allocation_from_row)
            .map_err(map_sqlite_err)?;
        collect_rows(rows)
    }

    fn lots(&self) -> Result<Vec<Lot>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, address, priority_rank, country_code, city
                 FROM lots ORDER BY id",
            )
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Lot {
                    id: LotId(row.get(0)?),
                    name: row.get(1)?,
                    address: row.get(2)?,
                    priority_rank: row.get(3)?,
                    region: RegionKey::new(row.get::<_, String>(4)?, row.get::<_, String>(5)?),
                    eligible_roles: BTreeSet::new(),
                    spaces: Vec::new(),
                })
            })
            .map_err(map_sqlite_err)?;
        let mut lots: Vec<Lot> = collect_rows(rows)?;

        let mut role_stmt = self
            .conn
            .prepare("SELECT role_name FROM lot_roles WHERE lot_id = ?1")
            .map_err(map_sqlite_err)?;
        let mut space_stmt = self
            .conn
            .prepare(
                "SELECT id, label, is_priority, notes FROM spaces
                 WHERE lot_id = ?1 ORDER BY id",
            )
            .map_err(map_sqlite_err)?;

        for lot in &mut lots {
            let roles = role_stmt
                .query_map(params![lot.id.0], |row| row.get::<_, String>(0))
                .map_err(map_sqlite_err)?;
            lot.eligible_roles = collect_rows(roles)?.into_iter().collect();

            let lot_id = lot.id;
            let spaces = space_stmt
                .query_map(params![lot.id.0], move |row| {
                    Ok(Space {
                        id: SpaceId(row.get(0)?),
                        lot_id,
                        label: row.get(1)?,
                        is_priority: row.get(2)?,
                        notes: row.get(3)?,
                    })
                })
                .map_err(map_sqlite_err)?;
            lot.spaces = collect_rows(spaces)?;
        }
        Ok(lots)
    }

    fn role_directory(&self, users: &[UserId]) -> Result<RoleDirectory, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT r.name, r.priority_rank
                 FROM user_roles ur JOIN roles r ON r.name = ur.role_name
                 WHERE ur.user_id = ?1 ORDER BY r.name",
            )
            .map_err(map_sqlite_err)?;

        let mut directory = RoleDirectory::new();
        for user in users {
            let rows = stmt
                .query_map(params![user.0], |row| {
                    Ok(Role {
                        name: row.get(0)?,
                        priority_rank: row.get(1)?,
                    })
                })
                .map_err(map_sqlite_err)?;
            let roles: Vec<Role> = collect_rows(rows)?;
            if !roles.is_empty() {
                directory.insert_user(*user, roles);
            }
        }
        Ok(directory)
    }

    fn save_allocations(
        &mut self,
        drafts: &[DraftAllocation],
    ) -> Result<Vec<Allocation>, StoreError> {
        let tx = self.conn.transaction().map_err(map_sqlite_err)?;
        let mut saved = Vec::with_capacity(drafts.len());
        for draft in drafts {
            tx.execute(
                "INSERT INTO allocations (user_id, space_id, allocated_date, allocated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    draft.requester.0,
                    draft.space_id.0,
                    draft.allocated_date.to_string(),
                    draft.allocated_at.to_rfc3339()
                ],
            )
            .map_err(map_sqlite_err)?;
            saved.push(
                draft
                    .clone()
                    .into_allocation(AllocationId(tx.last_insert_rowid())),
            );
        }
        tx.commit().map_err(map_sqlite_err)?;
        debug!(count = saved.len(), "allocations committed");
        Ok(saved)
    }

    fn create_request(&mut self, request: NewRequest) -> Result<Request, StoreError> {
        self.conn
            .execute(
                "INSERT INTO requests (user_id, requested_date, requested_at, country_code, city)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    request.requester.0,
                    request.requested_date.to_string(),
                    request.requested_at.to_rfc3339(),
                    request.region.country_code,
                    request.region.city
                ],
            )
            .map_err(map_sqlite_err)?;
        Ok(Request {
            id: RequestId(self.conn.last_insert_rowid()),
            requester: request.requester,
            requested_date: request.requested_date,
            requested_at: request.requested_at,
            region: request.region,
        })
    }

    fn withdraw_request(
        &mut self,
        request_id: RequestId,
        requester: UserId,
    ) -> Result<bool, StoreError> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT user_id, requested_date FROM requests WHERE id = ?1",
                params![request_id.0],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(map_sqlite_err)?;
        let Some((owner, requested_date)) = row else {
            return Ok(false);
        };
        if owner != requester.0 {
            debug!(%request_id, %requester, "withdraw refused: not the owner");
            return Ok(false);
        }

        let allocated: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM allocations WHERE user_id = ?1 AND allocated_date = ?2",
                params![requester.0, requested_date],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqlite_err)?;
        if allocated.is_some() {
            debug!(%request_id, "withdraw refused: already allocated");
            return Ok(false);
        }

        let deleted = self
            .conn
            .execute("DELETE FROM requests WHERE id = ?1", params![request_id.0])
            .map_err(map_sqlite_err)?;
        Ok(deleted > 0)
    }

    fn user_allocation(
        &self,
        user: UserId,
        date: NaiveDate,
    ) -> Result<Option<AllocationDetails>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT a.id, a.user_id, a.space_id, a.allocated_date, a.allocated_at,
                        s.label, l.name, l.address
                 FROM allocations a
                 JOIN spaces s ON s.id = a.space_id
                 JOIN lots l ON l.id = s.lot_id
                 WHERE a.user_id = ?1 AND a.allocated_date = ?2",
                params![user.0, date.to_string()],
                |row| {
                    Ok((
                        allocation_from_row(row)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()
            .map_err(map_sqlite_err)?;
        Ok(
            row.map(|(allocation, space_label, lot_name, lot_address)| AllocationDetails {
                allocation,
                space_label,
                lot_name,
                lot_address,
            }),
        )
    }
}

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Request> {
    Ok(Request {
        id: RequestId(row.get(0)?),
        requester: UserId(row.get(1)?),
        requested_date: parse_date(row, 2)?,
        requested_at: parse_timestamp(row, 3)?,
        region: RegionKey::new(row.get::<_, String>(4)?, row.get::<_, String>(5)?),
    })
}

fn allocation_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Allocation> {
    Ok(Allocation {
        id: AllocationId(row.get(0)?),
        requester: UserId(row.get(1)?),
        space_id: SpaceId(row.get(2)?),
        allocated_date: parse_date(row, 3)?,
        allocated_at: parse_timestamp(row, 4)?,
    })
}

fn parse_date(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(index)?;
    text.parse().map_err(|err: chrono::ParseError| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, err.into())
    })
}

fn parse_timestamp(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                err.into(),
            )
        })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, StoreError> {
    rows.map(|row| row.map_err(map_sqlite_err)).collect()
}

fn map_sqlite_err(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(code, ref message)
            if code.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::conflict(
                message
                    .clone()
                    .unwrap_or_else(|| "uniqueness constraint violated".to_string()),
            )
        }
        rusqlite::Error::FromSqlConversionFailure(_, _, source) => {
            StoreError::invalid_row(source.to_string())
        }
        other => StoreError::query(other.to_string()),
    }
}
