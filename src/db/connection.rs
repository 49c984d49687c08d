use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tokio::sync::oneshot;

use super::migrations::run_migrations;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum Request {
    Run(Job),
    Close,
}

/// Owns the zone database thread. The last [`Database`] clone to go away
/// asks the thread to close and waits for it.
struct Worker {
    requests: mpsc::Sender<Request>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Worker {
    fn drop(&mut self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(handle) = handle else {
            return;
        };
        // A send error means the thread already exited; joining still reaps it.
        let _ = self.requests.send(Request::Close);
        if handle.join().is_err() {
            log_error!("zone database thread panicked");
        }
    }
}

/// Zones and detection state live in one SQLite file. Every statement runs
/// on a single thread, so repositories never share a `Connection`.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens (or creates) the file, migrates it, and only returns once the
    /// schema is current.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create {}", dir.display()))?;
        }

        let (requests, inbox) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_path = path.clone();
        let thread = thread::Builder::new()
            .name("parkzone-db".into())
            .spawn(move || serve(&thread_path, inbox, ready_tx))
            .context("cannot start the zone database thread")?;

        ready_rx
            .recv()
            .map_err(|_| anyhow!("zone database thread exited during startup"))??;
        log_info!("zone database ready at {}", path.display());

        Ok(Self {
            worker: Arc::new(Worker {
                requests,
                thread: Mutex::new(Some(thread)),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `job` on the database thread and hands its result back.
    pub async fn execute<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have been cancelled while waiting.
            let _ = reply.send(job(conn));
        });

        self.worker
            .requests
            .send(Request::Run(job))
            .map_err(|_| anyhow!("zone database thread is gone"))?;
        result
            .await
            .map_err(|_| anyhow!("zone database thread dropped the request"))?
    }
}

fn open(path: &Path) -> Result<Connection> {
    let mut conn = Connection::open(path)
        .with_context(|| format!("cannot open zone database {}", path.display()))?;
    if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
        log_warn!("zone database stays in rollback journal mode: {err}");
    }
    // Detection rows rely on cascading deletes.
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("cannot enable foreign keys")?;
    run_migrations(&mut conn).context("zone database migration failed")?;
    Ok(conn)
}

fn serve(path: &Path, inbox: mpsc::Receiver<Request>, ready: mpsc::Sender<Result<()>>) {
    let mut conn = match open(path) {
        Ok(conn) => conn,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    for request in inbox {
        match request {
            Request::Run(job) => job(&mut conn),
            Request::Close => break,
        }
    }
    log_info!("zone database closed");
}

#[cfg(test)]
pub(crate) fn temp_database() -> Database {
    let path = std::env::temp_dir()
        .join("parkzone-tests")
        .join(format!("{}.sqlite3", uuid::Uuid::new_v4()));
    Database::new(path).expect("temp database")
}
