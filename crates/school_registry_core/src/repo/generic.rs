//! Generic repository contract and its SQLite implementation.
//!
//! # Responsibility
//! - Provide one CRUD + predicate-query contract reusable for every entity.
//! - Keep row mapping at the repository boundary via the `Table` trait.
//! - Translate SQLite failures into semantic repository errors.
//!
//! # Invariants
//! - Write paths validate the entity before issuing SQL.
//! - A missing row on read is `Ok(None)`, never an error.
//! - `delete` is idempotent and reports whether a row was removed.
//! - Constraint failures surface as `RepoError::Constraint` with the SQLite
//!   error kept as `source()`.

use crate::db::DbError;
use crate::model::validation::ValidationError;
use crate::model::{local_today, Clock, EntityId};
use chrono::NaiveDate;
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, ErrorCode, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all registry repositories.
#[derive(Debug)]
pub enum RepoError {
    /// Entity failed field validation; no SQL was issued.
    Validation(ValidationError),
    /// Underlying SQLite/bootstrap failure.
    Db(DbError),
    /// Uniqueness, foreign-key or check constraint breach.
    Constraint(rusqlite::Error),
    /// Write targeted a row that does not exist.
    NotFound { entity: &'static str, id: EntityId },
    /// Write requires a persisted entity but `id` is `None`.
    MissingId(&'static str),
    /// Persisted data cannot be mapped to a valid entity.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Constraint(err) => write!(f, "constraint violation: {err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::MissingId(entity) => write!(f, "{entity} has not been persisted yet"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Constraint(err) => Some(err),
            Self::NotFound { .. } | Self::MissingId(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            Self::Constraint(value)
        } else {
            Self::Db(DbError::Sqlite(value))
        }
    }
}

/// Mapping between an entity type and its table.
///
/// `COLUMNS` lists every data column except `id`, in the order used by
/// `bind_values`.
pub trait Table: Sized {
    const TABLE: &'static str;
    /// Human-readable entity label used in errors and logs.
    const ENTITY: &'static str;
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<EntityId>;
    /// Field rules; date-dependent rules are checked against `today`.
    fn validate(&self, today: NaiveDate) -> Result<(), ValidationError>;
    fn bind_values(&self) -> Vec<Value>;
    /// Maps one row selected with `id` plus `COLUMNS` (by column name).
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// Comparison operator for one `Filter` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Conjunctive query predicate over one table's columns.
///
/// Column names are `&'static str` so only code-defined identifiers reach
/// the SQL text; all values are bound parameters.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<String>,
    binds: Vec<Value>,
    order_by: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cmp(mut self, column: &'static str, op: Cmp, value: impl Into<Value>) -> Self {
        self.clauses.push(format!("{column} {} ?", op.as_sql()));
        self.binds.push(value.into());
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cmp(column, Cmp::Eq, value)
    }

    pub fn lt(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cmp(column, Cmp::Lt, value)
    }

    pub fn le(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cmp(column, Cmp::Le, value)
    }

    pub fn gt(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cmp(column, Cmp::Gt, value)
    }

    pub fn ge(self, column: &'static str, value: impl Into<Value>) -> Self {
        self.cmp(column, Cmp::Ge, value)
    }

    /// Matches rows whose `column` equals any of `values`.
    ///
    /// An empty value list matches nothing.
    pub fn any_of<V: Into<Value>>(
        mut self,
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            self.clauses.push("0 = 1".to_string());
            return self;
        }
        let placeholders = vec!["?"; values.len()].join(", ");
        self.clauses.push(format!("{column} IN ({placeholders})"));
        self.binds.extend(values);
        self
    }

    /// Adds a sort key; rows are always finally ordered by `id ASC`.
    pub fn order_by(mut self, column: &'static str, descending: bool) -> Self {
        let direction = if descending { "DESC" } else { "ASC" };
        self.order_by.push(format!("{column} {direction}"));
        self
    }

    fn to_sql_suffix(&self) -> String {
        let mut sql = String::new();
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        let mut order = self.order_by.clone();
        order.push("id ASC".to_string());
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
        sql
    }
}

/// Uniform CRUD contract over one entity type.
pub trait Repository<E> {
    /// Persists a new row and returns it with its generated id.
    fn add(&self, entity: &E) -> RepoResult<E>;
    /// Persists every entity in one unit of work; any failure stores none.
    fn add_all(&self, entities: &[E]) -> RepoResult<Vec<E>>;
    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<E>>;
    /// Returns every row ordered by id.
    fn get_all(&self) -> RepoResult<Vec<E>>;
    /// Rewrites all data columns of an existing row.
    fn update(&self, entity: &E) -> RepoResult<()>;
    /// Removes one row; `Ok(false)` when it was already absent.
    fn delete(&self, id: EntityId) -> RepoResult<bool>;
    fn find(&self, filter: &Filter) -> RepoResult<Vec<E>>;
    fn count(&self) -> RepoResult<u64>;
    /// Replaces the date source used by write-time validation.
    fn with_clock(self, clock: Clock) -> Self
    where
        Self: Sized;
    /// Runs `work` as one unit of work.
    ///
    /// Commits when `work` returns `Ok`, rolls back on `Err` or unwind.
    /// Joins an already open transaction on the same connection instead
    /// of nesting.
    fn with_transaction<T, WorkErr>(
        &self,
        work: impl FnOnce() -> Result<T, WorkErr>,
    ) -> Result<T, WorkErr>
    where
        WorkErr: From<RepoError>;
}

/// SQLite-backed repository for any `Table` entity.
///
/// All repositories handed to one service must borrow the same connection so
/// that `with_transaction` covers every statement of a use case.
pub struct SqliteRepository<'conn, E> {
    conn: &'conn Connection,
    clock: Clock,
    _entity: PhantomData<fn() -> E>,
}

impl<'conn, E: Table> SqliteRepository<'conn, E> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            clock: local_today,
            _entity: PhantomData,
        }
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Reference date for validation and age queries.
    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Runs a query whose rows carry `id` plus `E::COLUMNS` and a count
    /// column named `count_column`.
    pub(crate) fn query_entities_with_count(
        &self,
        sql: &str,
        count_column: &str,
    ) -> RepoResult<Vec<(E, u64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let count = count_from_db(row.get(count_column)?)?;
            entries.push((E::from_row(row)?, count));
        }
        Ok(entries)
    }

    /// Runs a query whose rows carry `id` plus `E::COLUMNS`.
    pub(crate) fn query_entities(&self, sql: &str, binds: Vec<Value>) -> RepoResult<Vec<E>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(E::from_row(row)?);
        }
        Ok(entities)
    }
}

impl<E: Table> Repository<E> for SqliteRepository<'_, E> {
    fn add(&self, entity: &E) -> RepoResult<E> {
        entity.validate(self.today())?;

        let placeholders = (1..=E::COLUMNS.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        self.conn.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({placeholders});",
                E::TABLE,
                E::COLUMNS.join(", ")
            ),
            params_from_iter(entity.bind_values()),
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("event=entity_add module=repo status=ok table={} id={id}", E::TABLE);
        self.get_by_id(id)?.ok_or(RepoError::NotFound {
            entity: E::ENTITY,
            id,
        })
    }

    fn add_all(&self, entities: &[E]) -> RepoResult<Vec<E>> {
        let stored = self.with_transaction(|| -> RepoResult<Vec<E>> {
            entities.iter().map(|entity| self.add(entity)).collect()
        })?;
        debug!(
            "event=entity_add_all module=repo status=ok table={} count={}",
            E::TABLE,
            stored.len()
        );
        Ok(stored)
    }

    fn get_by_id(&self, id: EntityId) -> RepoResult<Option<E>> {
        let sql = format!("{} WHERE id = ?1;", select_sql::<E>());
        Ok(self
            .query_entities(&sql, vec![Value::Integer(id)])?
            .into_iter()
            .next())
    }

    fn get_all(&self) -> RepoResult<Vec<E>> {
        self.find(&Filter::new())
    }

    fn update(&self, entity: &E) -> RepoResult<()> {
        let id = entity.id().ok_or(RepoError::MissingId(E::ENTITY))?;
        entity.validate(self.today())?;

        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let mut binds = entity.bind_values();
        binds.push(Value::Integer(id));

        let changed = self.conn.execute(
            &format!(
                "UPDATE {} SET {assignments} WHERE id = ?{};",
                E::TABLE,
                E::COLUMNS.len() + 1
            ),
            params_from_iter(binds),
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: E::ENTITY,
                id,
            });
        }
        Ok(())
    }

    fn delete(&self, id: EntityId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute(&format!("DELETE FROM {} WHERE id = ?1;", E::TABLE), [id])?;
        debug!(
            "event=entity_delete module=repo status=ok table={} id={id} removed={}",
            E::TABLE,
            changed > 0
        );
        Ok(changed > 0)
    }

    fn find(&self, filter: &Filter) -> RepoResult<Vec<E>> {
        let sql = format!("{}{};", select_sql::<E>(), filter.to_sql_suffix());
        self.query_entities(&sql, filter.binds.clone())
    }

    fn count(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", E::TABLE),
            [],
            |row| row.get(0),
        )?;
        count_from_db(count)
    }

    fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn with_transaction<T, WorkErr>(
        &self,
        work: impl FnOnce() -> Result<T, WorkErr>,
    ) -> Result<T, WorkErr>
    where
        WorkErr: From<RepoError>,
    {
        if !self.conn.is_autocommit() {
            return work();
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(RepoError::from)?;
        match work() {
            Ok(value) => {
                tx.commit().map_err(RepoError::from)?;
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event=tx_rollback module=repo status=error table={}",
                    E::TABLE
                );
                drop(tx);
                Err(err)
            }
        }
    }
}

/// `SELECT id, <columns> FROM <table>`.
pub(crate) fn select_sql<E: Table>() -> String {
    format!("SELECT id, {} FROM {}", E::COLUMNS.join(", "), E::TABLE)
}

/// `alias.id AS id, alias.<column> AS <column>, ...` for joined queries.
///
/// Keeps plain column names so `Table::from_row` works on joined rows.
pub(crate) fn aliased_columns<E: Table>(alias: &str) -> String {
    std::iter::once("id")
        .chain(E::COLUMNS.iter().copied())
        .map(|column| format!("{alias}.{column} AS {column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn count_from_db(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative count `{value}`")))
}
