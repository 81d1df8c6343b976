//! Append-only reading store.
//!
//! Writes go through one dedicated thread owning the only read-write
//! connection, so ids are handed out strictly in commit order. Reads use a pool
//! of `query_only` connections; with WAL every read statement sees a
//! consistent snapshot and never a half-written row.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use chrono::{DateTime, Utc};
use diesel::{
    connection::SimpleConnection,
    prelude::*,
    r2d2::{ConnectionManager, CustomizeConnection, Pool},
    sqlite::SqliteConnection,
};
use log::{error, info};
use tokio::{sync::oneshot, task};

use crate::{error::StorageError, schema::readings, utils::Clock};

const CREATE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sensor_id BIGINT,
        timestamp BIGINT NOT NULL,
        humidity DOUBLE,
        temperature DOUBLE,
        pressure DOUBLE,
        gas DOUBLE,
        color BIGINT,
        alpha BIGINT
    );
";

const CREATE_TIMESTAMP_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS readings_timestamp_idx ON readings (timestamp);";

const BUSY_TIMEOUT_MS: u32 = 5000;

/// Measurement fields of a reading before the store stamps it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReadingFields {
    pub sensor_id: Option<i64>,
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub gas: Option<f64>,
    pub color: Option<i64>,
    pub alpha: Option<i64>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = readings)]
struct NewReading {
    sensor_id: Option<i64>,
    timestamp: i64, // ms since epoch
    humidity: Option<f64>,
    temperature: Option<f64>,
    pressure: Option<f64>,
    gas: Option<f64>,
    color: Option<i64>,
    alpha: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Queryable, QueryableByName)]
#[diesel(table_name = readings)]
pub struct Reading {
    pub id: i64,
    pub sensor_id: Option<i64>,
    pub timestamp: i64, // ms since epoch
    pub humidity: Option<f64>,
    pub temperature: Option<f64>,
    pub pressure: Option<f64>,
    pub gas: Option<f64>,
    pub color: Option<i64>,
    pub alpha: Option<i64>,
}

impl Reading {
    pub fn received_at(&self) -> DateTime<Utc> {
        crate::utils::from_ms(self.timestamp)
    }
}

type WriteTask = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

enum WriterCommand {
    Execute(WriteTask),
    Shutdown,
}

#[derive(Debug)]
struct ReaderOptions;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ReaderOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {BUSY_TIMEOUT_MS}; PRAGMA query_only = ON;"
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

struct StoreInner {
    sender: mpsc::Sender<WriterCommand>,
    writer: Mutex<Option<JoinHandle<()>>>,
    readers: Pool<ConnectionManager<SqliteConnection>>,
    clock: Arc<dyn Clock>,
    timestamp_index: AtomicBool,
    path: PathBuf,
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let mut guard = match self.writer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(WriterCommand::Shutdown) {
                error!("Failed to send shutdown to DB writer: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB writer: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct ReadingStore {
    inner: Arc<StoreInner>,
}

impl ReadingStore {
    /// Opens (creating if needed) the database at `path` and starts the writer.
    pub fn open(
        path: impl Into<PathBuf>,
        read_pool_size: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let path = path.into();
        let (command_tx, command_rx) = mpsc::channel::<WriterCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), StorageError>>();
        let url = path.to_string_lossy().into_owned();
        let writer_url = url.clone();

        let writer = thread::Builder::new()
            .name("readings-writer".into())
            .spawn(move || {
                let mut conn = match open_writer(&writer_url) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    error!("DB open receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        WriterCommand::Execute(task) => task(&mut conn),
                        WriterCommand::Shutdown => break,
                    }
                }

                info!("Database writer shutting down");
            })
            .map_err(|_| StorageError::WorkerGone)?;

        ready_rx.recv().map_err(|_| StorageError::WorkerGone)??;

        let readers = Pool::builder()
            .max_size(read_pool_size.max(1))
            .connection_customizer(Box::new(ReaderOptions))
            .build(ConnectionManager::<SqliteConnection>::new(url))?;

        info!("Reading store opened at {}", path.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                sender: command_tx,
                writer: Mutex::new(Some(writer)),
                readers,
                clock,
                timestamp_index: AtomicBool::new(false),
                path,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        self.inner.path.as_path()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Runs `task` on the writer thread, queued behind every earlier write.
    async fn write<F, T>(&self, task: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = WriterCommand::Execute(Box::new(move |conn| {
            if reply_tx.send(task(conn)).is_err() {
                error!("DB caller dropped before receiving write result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|_| StorageError::WorkerGone)?;

        reply_rx.await.map_err(|_| StorageError::WorkerGone)?
    }

    /// Runs `query` on a pooled read-only connection.
    pub async fn read<F, T>(&self, query: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.inner.readers.clone();
        task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            query(&mut conn)
        })
        .await?
    }

    /// Stamps and durably stores one reading, returning its id.
    pub async fn append(&self, fields: ReadingFields) -> Result<i64, StorageError> {
        let row = NewReading {
            sensor_id: fields.sensor_id,
            timestamp: self.inner.clock.now().timestamp_millis(),
            humidity: fields.humidity,
            temperature: fields.temperature,
            pressure: fields.pressure,
            gas: fields.gas,
            color: fields.color,
            alpha: fields.alpha,
        };

        self.write(move |conn| {
            let id = diesel::insert_into(readings::table)
                .values(&row)
                .returning(readings::id)
                .get_result::<i64>(conn)?;
            Ok(id)
        })
        .await
    }

    /// All readings received at or after `since`, in id order.
    pub async fn scan(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Reading>, StorageError> {
        let since = since.map(|t| t.timestamp_millis());
        self.read(move |conn| {
            let mut query = readings::table.order(readings::id.asc()).into_boxed();
            if let Some(since) = since {
                query = query.filter(readings::timestamp.ge(since));
            }
            Ok(query.load::<Reading>(conn)?)
        })
        .await
    }

    pub async fn count(&self) -> Result<i64, StorageError> {
        self.read(|conn| Ok(readings::table.count().get_result::<i64>(conn)?))
            .await
    }

    /// Creates the timestamp index the first time it is asked for.
    pub async fn ensure_timestamp_index(&self) -> Result<(), StorageError> {
        if self.inner.timestamp_index.load(Ordering::Acquire) {
            return Ok(());
        }
        self.write(|conn| Ok(conn.batch_execute(CREATE_TIMESTAMP_INDEX)?))
            .await?;
        self.inner.timestamp_index.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn rebuild_timestamp_index(&self) -> Result<(), StorageError> {
        self.write(|conn| {
            conn.batch_execute(CREATE_TIMESTAMP_INDEX)?;
            conn.batch_execute("REINDEX readings_timestamp_idx;")?;
            Ok(())
        })
        .await?;
        self.inner.timestamp_index.store(true, Ordering::Release);
        Ok(())
    }
}

fn open_writer(url: &str) -> Result<SqliteConnection, StorageError> {
    let mut conn = SqliteConnection::establish(url)?;
    conn.batch_execute(&format!(
        "PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL; PRAGMA busy_timeout = {BUSY_TIMEOUT_MS};"
    ))?;
    conn.batch_execute(CREATE_SCHEMA)?;
    Ok(conn)
}
