//! In-memory unit of work used by the integration tests.
//!
//! It behaves like a change-tracking ORM: entities are snapshotted when they
//! become managed, a flush diffs every managed entity against its snapshot,
//! and only the columns in that diff are written. Listener callbacks run in
//! the same places a real engine would call them.

#![allow(dead_code)]

use fieldcipher::lifecycle::{ChangeSet, EntityListener};
use fieldcipher::prelude::*;
use std::collections::BTreeMap;

/// Hex encoded 32-byte root key shared by the tests.
pub const ROOT_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

pub type Row = BTreeMap<&'static str, Option<String>>;

pub type Engine = CipherEngine<StaticKeyProvider>;

/// Maps an entity to the columns it is stored in.
pub trait Record: EncryptedEntity + Clone {
    fn id(&self) -> u64;
    fn columns(&self) -> Row;
    fn from_row(id: u64, row: &Row) -> Self;
}

/// Storage table keyed by id.
#[derive(Debug, Default, Clone)]
pub struct Database {
    rows: BTreeMap<u64, Row>,
}

impl Database {
    pub fn row(&self, id: u64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub fn column(&self, id: u64, column: &str) -> Option<String> {
        self.rows.get(&id).and_then(|row| row.get(column).cloned().flatten())
    }

    /// Ids of rows whose `column` equals `value`, like a `WHERE` clause.
    pub fn find_by(&self, column: &str, value: &str) -> Vec<u64> {
        self.rows
            .iter()
            .filter(|(_, row)| row.get(column).and_then(Option::as_deref) == Some(value))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Overwrites a stored column behind the unit of work's back.
    pub fn tamper(&mut self, id: u64, column: &'static str, value: Option<String>) {
        if let Some(row) = self.rows.get_mut(&id) {
            row.insert(column, value);
        }
    }
}

/// Pending update of one entity.
#[derive(Debug)]
pub struct PendingChanges {
    snapshot: Row,
    values: Row,
    pub recomputed: usize,
}

impl PendingChanges {
    pub fn compute(snapshot: &Row, current: &Row) -> Self {
        Self { snapshot: snapshot.clone(), values: diff(snapshot, current), recomputed: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Row {
        &self.values
    }
}

impl<E: Record> ChangeSet<E> for PendingChanges {
    fn has_changed_field(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    fn recompute(&mut self, entity: &E) {
        self.values = diff(&self.snapshot, &entity.columns());
        self.recomputed += 1;
    }
}

fn diff(snapshot: &Row, current: &Row) -> Row {
    current
        .iter()
        .filter(|(column, value)| snapshot.get(*column) != Some(*value))
        .map(|(column, value)| (*column, value.clone()))
        .collect()
}

/// Identity map plus pending inserts over a [`Database`].
pub struct UnitOfWork<'l, E, L> {
    listener: &'l L,
    db: Database,
    managed: BTreeMap<u64, (E, Row)>,
    inserts: Vec<E>,
    /// Number of `recompute` calls seen across all flushes.
    pub recomputes: usize,
    /// Columns written by the last flush, per id.
    pub last_writes: BTreeMap<u64, Row>,
}

impl<'l, E, L> UnitOfWork<'l, E, L>
where
    E: Record,
    L: EntityListener<E>,
{
    pub fn new(listener: &'l L) -> Self {
        Self::with_database(listener, Database::default())
    }

    pub fn with_database(listener: &'l L, db: Database) -> Self {
        Self {
            listener,
            db,
            managed: BTreeMap::new(),
            inserts: Vec::new(),
            recomputes: 0,
            last_writes: BTreeMap::new(),
        }
    }

    pub fn persist(&mut self, entity: E) {
        self.inserts.push(entity);
    }

    /// Writes pending inserts and the changes of managed entities.
    ///
    /// The first listener error aborts the flush; entities not yet written
    /// stay pending.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.last_writes.clear();

        while let Some(mut entity) = self.inserts.pop() {
            if let Err(err) = self.listener.on_before_create(&mut entity) {
                self.inserts.push(entity);
                return Err(err);
            }
            let row = entity.columns();
            self.db.rows.insert(entity.id(), row.clone());
            self.last_writes.insert(entity.id(), row.clone());
            self.managed.insert(entity.id(), (entity, row));
        }

        for (id, (entity, snapshot)) in &mut self.managed {
            let mut changes = PendingChanges::compute(snapshot, &entity.columns());
            if changes.is_empty() {
                continue;
            }

            self.listener.on_before_update(entity, &mut changes)?;
            self.recomputes += changes.recomputed;

            let stored = self.db.rows.entry(*id).or_default();
            for (column, value) in changes.values() {
                stored.insert(*column, value.clone());
                snapshot.insert(*column, value.clone());
            }
            self.last_writes.insert(*id, changes.values);
        }

        Ok(())
    }

    /// Returns the managed entity, hydrating it from storage on first access.
    pub fn find(&mut self, id: u64) -> Result<Option<&mut E>, Error> {
        if !self.managed.contains_key(&id) {
            let Some(row) = self.db.rows.get(&id) else {
                return Ok(None);
            };
            let mut entity = E::from_row(id, row);
            self.listener.on_load(&mut entity)?;
            let snapshot = entity.columns();
            self.managed.insert(id, (entity, snapshot));
        }
        Ok(self.managed.get_mut(&id).map(|(entity, _)| entity))
    }

    /// Looks up the first row matching `column = value` and hydrates it.
    pub fn find_one_by(&mut self, column: &str, value: &str) -> Result<Option<&mut E>, Error> {
        match self.db.find_by(column, value).first() {
            Some(id) => self.find(*id),
            None => Ok(None),
        }
    }

    /// Detaches every managed entity; the next `find` reloads from storage.
    pub fn clear(&mut self) {
        self.managed.clear();
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn into_database(self) -> Database {
        self.db
    }
}

fn column(row: &Row, name: &str) -> Option<String> {
    row.get(name).cloned().flatten()
}

/// Message with a case-insensitive blind index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encrypted)]
#[encrypted(table = "messages")]
pub struct Message {
    pub id: u64,
    #[encrypted(blind_index(name = "insensitive", transformer = "case-insensitive"))]
    pub text: Option<String>,
    #[blind_index]
    pub text_blind_index_insensitive: Option<String>,
}

impl Record for Message {
    fn id(&self) -> u64 {
        self.id
    }

    fn columns(&self) -> Row {
        Row::from([
            ("text", self.text.clone()),
            ("text_blind_index_insensitive", self.text_blind_index_insensitive.clone()),
        ])
    }

    fn from_row(id: u64, row: &Row) -> Self {
        Self {
            id,
            text: column(row, "text"),
            text_blind_index_insensitive: column(row, "text_blind_index_insensitive"),
        }
    }
}

/// User with two indexed encrypted fields and one plain column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encrypted)]
#[encrypted(table = "users")]
pub struct User {
    pub id: u64,
    #[encrypted(
        blind_index(name = "last_four", transformer = "lastFourChars"),
        blind_index(name = "full", transformer = "full")
    )]
    pub ssn: Option<String>,
    #[blind_index]
    pub ssn_blind_index_last_four: Option<String>,
    #[blind_index]
    pub ssn_blind_index_full: Option<String>,
    #[encrypted(blind_index(name = "exact", fast))]
    pub email: Option<String>,
    #[blind_index]
    pub email_blind_index_exact: Option<String>,
    pub nickname: Option<String>,
}

impl User {
    pub fn new(id: u64, ssn: &str, email: &str) -> Self {
        Self {
            id,
            ssn: Some(ssn.to_string()),
            email: Some(email.to_string()),
            nickname: Some("anon".to_string()),
            ..Self::default()
        }
    }
}

impl Record for User {
    fn id(&self) -> u64 {
        self.id
    }

    fn columns(&self) -> Row {
        Row::from([
            ("ssn", self.ssn.clone()),
            ("ssn_blind_index_last_four", self.ssn_blind_index_last_four.clone()),
            ("ssn_blind_index_full", self.ssn_blind_index_full.clone()),
            ("email", self.email.clone()),
            ("email_blind_index_exact", self.email_blind_index_exact.clone()),
            ("nickname", self.nickname.clone()),
        ])
    }

    fn from_row(id: u64, row: &Row) -> Self {
        Self {
            id,
            ssn: column(row, "ssn"),
            ssn_blind_index_last_four: column(row, "ssn_blind_index_last_four"),
            ssn_blind_index_full: column(row, "ssn_blind_index_full"),
            email: column(row, "email"),
            email_blind_index_exact: column(row, "email_blind_index_exact"),
            nickname: column(row, "nickname"),
        }
    }
}

/// Document declaring an index it has no column for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encrypted)]
#[encrypted(table = "documents")]
pub struct Document {
    pub id: u64,
    #[encrypted(
        blind_index(name = "exact", fast),
        blind_index(name = "initial", transformer = "first-character")
    )]
    pub title: Option<String>,
    #[blind_index]
    pub title_blind_index_exact: Option<String>,
}

impl Record for Document {
    fn id(&self) -> u64 {
        self.id
    }

    fn columns(&self) -> Row {
        Row::from([
            ("title", self.title.clone()),
            ("title_blind_index_exact", self.title_blind_index_exact.clone()),
        ])
    }

    fn from_row(id: u64, row: &Row) -> Self {
        Self {
            id,
            title: column(row, "title"),
            title_blind_index_exact: column(row, "title_blind_index_exact"),
        }
    }
}

/// Entity referencing a transformer nobody registers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encrypted)]
#[encrypted(table = "broken")]
pub struct Misconfigured {
    pub id: u64,
    #[encrypted]
    pub fine: Option<String>,
    #[encrypted(blind_index(name = "broken", transformer = "nonexistent"))]
    pub secret: Option<String>,
    #[blind_index]
    pub secret_blind_index_broken: Option<String>,
}

impl Record for Misconfigured {
    fn id(&self) -> u64 {
        self.id
    }

    fn columns(&self) -> Row {
        Row::from([
            ("fine", self.fine.clone()),
            ("secret", self.secret.clone()),
            ("secret_blind_index_broken", self.secret_blind_index_broken.clone()),
        ])
    }

    fn from_row(id: u64, row: &Row) -> Self {
        Self {
            id,
            fine: column(row, "fine"),
            secret: column(row, "secret"),
            secret_blind_index_broken: column(row, "secret_blind_index_broken"),
        }
    }
}

/// Keeps the last four characters, left-padded with zeros.
pub fn last_four_chars(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{tail:0>4}")
}

pub fn engine() -> Engine {
    CipherEngine::new(StaticKeyProvider::from_hex(ROOT_KEY_HEX).expect("valid test key"))
}

/// Interceptor with every transformer the test entities reference,
/// except `nonexistent`.
pub fn interceptor() -> Interceptor<Engine> {
    Interceptor::with_registry(engine(), TransformerRegistry::with_builtins())
        .with_transformer("case-insensitive", Lowercase)
        .and_then(|i| i.with_transformer("lastFourChars", last_four_chars))
        .and_then(|i| i.with_transformer("full", |input: &str| input.replace('-', "")))
        .expect("transformer names are unique")
}

/// Installs a `tracing` subscriber once, honouring `FIELDCIPHER_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("FIELDCIPHER_LOG"))
        .with_test_writer()
        .try_init();
}
