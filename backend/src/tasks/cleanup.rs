use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Deletes ephemeral artifacts (uploads, enhanced images) a fixed delay
/// after they are produced. Requests never wait on a scheduled deletion;
/// outstanding tasks are aborted when the server shuts down.
#[derive(Clone)]
pub struct CleanupScheduler {
    delay: Duration,
    tasks: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
}

impl CleanupScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fire-and-forget: after the delay the path is removed if it still
    /// exists. Removal failures are swallowed.
    pub fn schedule_delete(&self, path: PathBuf) -> Uuid {
        let id = Uuid::new_v4();
        let delay = self.delay;
        let tasks = Arc::clone(&self.tasks);

        // Register under the lock so the task cannot deregister itself
        // before it has been inserted.
        let mut registry = self.tasks.lock().unwrap();
        let handle = actix_web::rt::spawn(async move {
            tokio::time::sleep(delay).await;
            match std::fs::remove_file(&path) {
                Ok(()) => log::info!("removed expired artifact {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::debug!("could not remove {}: {}", path.display(), e),
            }
            tasks.lock().unwrap().remove(&id);
        });
        registry.insert(id, handle);
        id
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Aborts every outstanding deletion. Called once on shutdown.
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
    }
}
