//! Handle table for callers that cannot hold a session directly.

use crate::backend::{Engine, TargetDevice};
use crate::error::SessionError;
use crate::model_config::ModelConfig;
use crate::session::InferenceSession;
use preprocess::ImageInfo;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque session handle. Issued in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type SharedSession<E> = Arc<Mutex<InferenceSession<E>>>;

pub struct SessionRegistry<E: Engine + Clone> {
    engine: E,
    image_info: ImageInfo,
    device: TargetDevice,
    sessions: Mutex<HashMap<SessionId, SharedSession<E>>>,
    next_id: AtomicU64,
}

// A panic inside one call must not make every later call fail.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Engine + Clone> SessionRegistry<E> {
    /// `image_info` is the default for every session; a model's `.config`
    /// file overrides it.
    pub fn new(engine: E, image_info: ImageInfo) -> Self {
        Self {
            engine,
            image_info,
            device: TargetDevice::Cpu,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_device(mut self, device: TargetDevice) -> Self {
        self.device = device;
        self
    }

    /// Create and build a session. Nothing is registered when this fails.
    pub fn create(
        &self,
        model_dir: impl Into<PathBuf>,
        model_name: impl Into<String>,
    ) -> Result<SessionId, SessionError> {
        let config = ModelConfig::new(model_dir, model_name)
            .with_device(self.device)
            .with_image_info(self.image_info.clone());

        let mut session = InferenceSession::create(self.engine.clone(), config)?;
        session.build()?;

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.sessions).insert(id, Arc::new(Mutex::new(session)));

        tracing::info!(session_id = %id, "Session registered");
        Ok(id)
    }

    /// Run one image on session `id` and return the flat output values.
    pub fn infer(
        &self,
        id: SessionId,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<f32>, SessionError> {
        let session = self.get(id)?;
        // Table lock is released here; only this session is held during infer.
        let mut session = lock(&session);
        let output = session.infer(pixels, width, height)?;
        Ok(output.data)
    }

    pub fn release(&self, id: SessionId) -> Result<(), SessionError> {
        lock(&self.sessions)
            .remove(&id)
            .map(|_| tracing::info!(session_id = %id, "Session released"))
            .ok_or(SessionError::UnknownSession(id))
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: SessionId) -> Result<SharedSession<E>, SessionError> {
        lock(&self.sessions)
            .get(&id)
            .cloned()
            .ok_or(SessionError::UnknownSession(id))
    }
}
