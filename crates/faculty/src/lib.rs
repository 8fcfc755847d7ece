//! # Faculty
//!
//! Local store of the faculty's people, organizational structure and
//! capability groups.
//!
//! This crate provides functionality to:
//! - Keep one login account per username, shared by every kind of person
//! - Store students, employees and organization representatives with their
//!   directory freshness flag
//! - Store study cycles, organizational units and faculty authorities
//! - Store permissions, groups and group membership
//!
//! Every write is a single autocommitted statement; there is no transaction
//! spanning several operations.
//!
//! ## Example
//!
//! ```no_run
//! use faculty::{Store, SyncedEntity};
//! use std::path::Path;
//!
//! let store = Store::open(Path::new("/var/lib/facsync/faculty.db"))?;
//!
//! let account = match store.find_account("u1")? {
//!     Some(account) => account,
//!     None => store.create_account("u1")?,
//! };
//! let student = store.create_student(account.id)?;
//! store.set_synced(SyncedEntity::Student, student.id, true)?;
//!
//! for summary in store.sync_summary()? {
//!     println!("{}: {} synced, {} not", summary.entity.label(), summary.synced, summary.unsynced);
//! }
//! # Ok::<(), faculty::Error>(())
//! ```

mod access;
mod error;
mod people;
mod structure;
mod types;

pub use error::{Error, Result};
pub use types::{
    Account, AccountId, Authority, AuthorityId, DOCTORAL_MARKER, Employee, EmployeeId, Group,
    GroupId, Organization, OrganizationId, OrganizationalUnit, OrganizationalUnitId, Permission,
    PermissionId, PersonKind, Student, StudentId, StudyCycle, StudyCycleId, SyncFlag, SyncFlagSummary,
    SyncedEntity, is_doctoral_title,
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        first_name TEXT NOT NULL DEFAULT '',
        last_name TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        last_login TEXT NOT NULL,
        date_joined TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS students (
        id INTEGER PRIMARY KEY,
        account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
        is_directory_synced INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS employees (
        id INTEGER PRIMARY KEY,
        account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
        title TEXT NOT NULL DEFAULT '',
        position TEXT NOT NULL DEFAULT '',
        organizational_unit_id INTEGER REFERENCES organizational_units(id) ON DELETE SET NULL,
        is_directory_synced INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS organizations (
        id INTEGER PRIMARY KEY,
        account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
        name TEXT NOT NULL DEFAULT '',
        is_directory_synced INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS study_cycles (
        id INTEGER PRIMARY KEY,
        directory_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        submissions_open_at TEXT,
        submissions_close_at TEXT,
        is_directory_synced INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS student_study_cycles (
        student_id INTEGER NOT NULL REFERENCES students(id) ON DELETE CASCADE,
        study_cycle_id INTEGER NOT NULL REFERENCES study_cycles(id) ON DELETE CASCADE,
        PRIMARY KEY (student_id, study_cycle_id)
    );

    CREATE TABLE IF NOT EXISTS organizational_units (
        id INTEGER PRIMARY KEY,
        directory_key TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        head_id INTEGER REFERENCES employees(id) ON DELETE SET NULL,
        is_directory_synced INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS authorities (
        id INTEGER PRIMARY KEY,
        role TEXT NOT NULL,
        occupant_id INTEGER REFERENCES employees(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS permissions (
        id INTEGER PRIMARY KEY,
        scope TEXT NOT NULL,
        codename TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        UNIQUE (scope, codename)
    );

    CREATE TABLE IF NOT EXISTS capability_groups (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS group_permissions (
        group_id INTEGER NOT NULL REFERENCES capability_groups(id) ON DELETE CASCADE,
        permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (group_id, permission_id)
    );

    CREATE TABLE IF NOT EXISTS account_groups (
        account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
        group_id INTEGER NOT NULL REFERENCES capability_groups(id) ON DELETE CASCADE,
        PRIMARY KEY (account_id, group_id)
    );

    CREATE INDEX IF NOT EXISTS idx_authorities_role ON authorities(role);
    CREATE INDEX IF NOT EXISTS idx_account_groups_group ON account_groups(group_id);
";

/// The local faculty database
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a store at the given path
    ///
    /// Creates the database file and necessary tables if they don't exist.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        log::debug!("opened faculty store at {}", db_path.display());
        Self::with_connection(conn)
    }

    /// Open a throwaway store held in memory
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Find an account by username
    pub fn find_account(&self, username: &str) -> Result<Option<Account>> {
        let account = self
            .conn
            .query_row(
                "SELECT id, username, first_name, last_name, email, last_login, date_joined
                 FROM accounts WHERE username = ?1",
                [username],
                account_from_row,
            )
            .optional()?;
        Ok(account)
    }

    /// Get an account by id
    pub fn account(&self, id: AccountId) -> Result<Account> {
        self.conn
            .query_row(
                "SELECT id, username, first_name, last_name, email, last_login, date_joined
                 FROM accounts WHERE id = ?1",
                [id],
                account_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("account", id))
    }

    /// Create an account that has never logged in
    ///
    /// `date_joined` is now and `last_login` is the Unix epoch.
    pub fn create_account(&self, username: &str) -> Result<Account> {
        let now = Utc::now();
        let never = DateTime::<Utc>::UNIX_EPOCH;
        self.conn.execute(
            "INSERT INTO accounts (username, last_login, date_joined) VALUES (?1, ?2, ?3)",
            params![username, never, now],
        )?;
        log::debug!("created account {username}");
        self.account(self.conn.last_insert_rowid())
    }

    /// Overwrite the profile fields of an account
    pub fn update_account_profile(
        &self,
        id: AccountId,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE accounts SET first_name = ?2, last_name = ?3, email = ?4 WHERE id = ?1",
            params![id, first_name, last_name, email],
        )?;
        expect_row(changed, "account", id)
    }

    /// Get total account count
    pub fn count_accounts(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ========================================================================
    // Directory freshness flags
    // ========================================================================

    /// Set the freshness flag of one row
    pub fn set_synced(&self, entity: SyncedEntity, id: i64, synced: bool) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET is_directory_synced = ?2 WHERE id = ?1",
            entity.table()
        );
        let changed = self.conn.execute(&sql, params![id, synced])?;
        expect_row(changed, entity.label(), id)
    }

    /// Rows of `entity` whose freshness flag is false
    pub fn count_unsynced(&self, entity: SyncedEntity) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE is_directory_synced = 0",
            entity.table()
        );
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Synced/unsynced counts for every flagged table
    pub fn sync_summary(&self) -> Result<Vec<SyncFlagSummary>> {
        SyncedEntity::ALL
            .into_iter()
            .map(|entity| {
                let sql = format!(
                    "SELECT COALESCE(SUM(is_directory_synced != 0), 0),
                            COALESCE(SUM(is_directory_synced = 0), 0)
                     FROM {}",
                    entity.table()
                );
                let (synced, unsynced): (i64, i64) = self
                    .conn
                    .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(SyncFlagSummary {
                    entity,
                    synced: synced as u64,
                    unsynced: unsynced as u64,
                })
            })
            .collect()
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        last_login: row.get(5)?,
        date_joined: row.get(6)?,
    })
}

/// Map a zero-row UPDATE to `NotFound`
pub(crate) fn expect_row(changed: usize, entity: &'static str, id: i64) -> Result<()> {
    if changed == 0 {
        Err(Error::not_found(entity, id))
    } else {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("faculty.db");

        let store = Store::open(&db_path).unwrap();
        assert_eq!(store.count_accounts().unwrap(), 0);
        assert!(db_path.exists());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("faculty.db");

        Store::open(&db_path).unwrap().create_account("u1").unwrap();
        let store = Store::open(&db_path).unwrap();
        assert!(store.find_account("u1").unwrap().is_some());
    }

    #[test]
    fn test_create_account_stamps() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("u1").unwrap();

        assert_eq!(account.username, "u1");
        assert_eq!(account.last_login, DateTime::<Utc>::UNIX_EPOCH);
        assert!(account.date_joined > DateTime::<Utc>::UNIX_EPOCH);
        assert!(account.first_name.is_empty());
    }

    #[test]
    fn test_usernames_are_unique() {
        let store = Store::open_in_memory().unwrap();
        store.create_account("u1").unwrap();
        assert!(matches!(
            store.create_account("u1"),
            Err(Error::Database(_))
        ));
    }

    #[test]
    fn test_update_profile() {
        let store = Store::open_in_memory().unwrap();
        let account = store.create_account("u1").unwrap();
        store
            .update_account_profile(account.id, "Anna", "Nowak", "anna@example.edu")
            .unwrap();

        let account = store.find_account("u1").unwrap().unwrap();
        assert_eq!(account.full_name(), "Anna Nowak");
        assert_eq!(account.email, "anna@example.edu");
    }

    #[test]
    fn test_update_missing_account() {
        let store = Store::open_in_memory().unwrap();
        let err = store.update_account_profile(42, "a", "b", "c").unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "account", .. }));
    }

    #[test]
    fn test_sync_summary() {
        let store = Store::open_in_memory().unwrap();
        let a = store.create_account("u1").unwrap();
        let b = store.create_account("u2").unwrap();
        let s1 = store.create_student(a.id).unwrap();
        store.create_student(b.id).unwrap();
        store.set_synced(SyncedEntity::Student, s1.id, true).unwrap();

        assert_eq!(store.count_unsynced(SyncedEntity::Student).unwrap(), 1);

        let summary = store.sync_summary().unwrap();
        let students = summary
            .iter()
            .find(|s| s.entity == SyncedEntity::Student)
            .unwrap();
        assert_eq!(students.synced, 1);
        assert_eq!(students.unsynced, 1);
        assert_eq!(students.total(), 2);
        assert!(
            summary
                .iter()
                .filter(|s| s.entity != SyncedEntity::Student)
                .all(|s| s.total() == 0)
        );
    }
}
