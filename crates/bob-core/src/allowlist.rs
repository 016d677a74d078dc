//! Approved-sender allow-list
//!
//! Only mail from approved addresses is answered. Addresses are stored
//! trimmed and lowercased.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use crate::error::Result;

/// One approved sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedSender {
    pub email: String,
    pub added_at: String,
}

/// Storage of approved senders
pub trait AllowList: Send + Sync {
    fn is_approved(&self, address: &str) -> Result<bool>;

    /// Approve an address. Returns true if it was not approved before.
    fn approve(&self, address: &str) -> Result<bool>;

    /// All approved senders, newest first
    fn list(&self) -> Result<Vec<ApprovedSender>>;
}

pub(crate) fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

/// SQLite-backed allow-list
///
/// `rusqlite::Connection` is not `Sync`, so it sits behind a mutex. Calls
/// are short single-row queries.
pub struct SqliteAllowList {
    conn: Mutex<Connection>,
}

impl SqliteAllowList {
    /// Open (or create) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::migrate(&conn)?;
        info!(path = %path.display(), "Allow-list opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS approve_list (
                 email TEXT PRIMARY KEY,
                 added_at TEXT NOT NULL
             );",
        )?;
        Ok(())
    }
}

impl AllowList for SqliteAllowList {
    fn is_approved(&self, address: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM approve_list WHERE email = ?1",
                params![normalize(address)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn approve(&self, address: &str) -> Result<bool> {
        let email = normalize(address);
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO approve_list (email, added_at) VALUES (?1, ?2)",
            params![email, Utc::now().to_rfc3339()],
        )?;
        if inserted > 0 {
            info!(email = %email, "Approved sender");
        }
        Ok(inserted > 0)
    }

    fn list(&self) -> Result<Vec<ApprovedSender>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT email, added_at FROM approve_list ORDER BY added_at DESC, email")?;
        let rows = stmt.query_map([], |row| {
            Ok(ApprovedSender {
                email: row.get(0)?,
                added_at: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

/// In-memory allow-list for dry runs and tests
#[derive(Default)]
pub struct MemoryAllowList {
    entries: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl MemoryAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = Self::new();
        {
            let mut entries = list.entries.lock();
            for address in addresses {
                entries.insert(normalize(address.as_ref()), Utc::now());
            }
        }
        list
    }
}

impl AllowList for MemoryAllowList {
    fn is_approved(&self, address: &str) -> Result<bool> {
        Ok(self.entries.lock().contains_key(&normalize(address)))
    }

    fn approve(&self, address: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        let email = normalize(address);
        if entries.contains_key(&email) {
            return Ok(false);
        }
        entries.insert(email, Utc::now());
        Ok(true)
    }

    fn list(&self) -> Result<Vec<ApprovedSender>> {
        let mut senders: Vec<ApprovedSender> = self
            .entries
            .lock()
            .iter()
            .map(|(email, added)| ApprovedSender {
                email: email.clone(),
                added_at: added.to_rfc3339(),
            })
            .collect();
        senders.sort_by(|a, b| b.added_at.cmp(&a.added_at).then_with(|| a.email.cmp(&b.email)));
        Ok(senders)
    }
}
