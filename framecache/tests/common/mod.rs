//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use framecache::retrieval::{Header, Transport, TransportError};

/// Bytes delivered for every frame.
pub const FRAME_SIZE: usize = 1024;

/// In-memory archive of instances with scripted failures.
///
/// Frame `n` of every instance is `FRAME_SIZE` bytes of `n as u8`.
pub struct FakeArchive {
    frame_counts: HashMap<String, u32>,
    /// Remaining failures before a frame request succeeds.
    frame_failures: Mutex<HashMap<(String, u32), u32>>,
    /// Remaining failures before a header request succeeds.
    header_failures: Mutex<HashMap<String, u32>>,
    header_calls: AtomicUsize,
    frame_calls: AtomicUsize,
}

impl FakeArchive {
    pub fn new(instances: &[(&str, u32)]) -> Self {
        Self {
            frame_counts: instances
                .iter()
                .map(|(key, frames)| (key.to_string(), *frames))
                .collect(),
            frame_failures: Mutex::new(HashMap::new()),
            header_failures: Mutex::new(HashMap::new()),
            header_calls: AtomicUsize::new(0),
            frame_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_frame(&self, key: &str, frame_number: u32, times: u32) {
        self.frame_failures
            .lock()
            .insert((key.to_string(), frame_number), times);
    }

    pub fn fail_header(&self, key: &str, times: u32) {
        self.header_failures.lock().insert(key.to_string(), times);
    }

    pub fn header_calls(&self) -> usize {
        self.header_calls.load(Ordering::SeqCst)
    }

    pub fn frame_calls(&self) -> usize {
        self.frame_calls.load(Ordering::SeqCst)
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

fn consume(remaining: Option<&mut u32>) -> bool {
    match remaining {
        Some(n) if *n > 0 => {
            *n -= 1;
            true
        }
        _ => false,
    }
}

impl Transport for FakeArchive {
    fn load_header(&self, instance_key: &str, force_complete: bool) -> Result<Header, TransportError> {
        self.header_calls.fetch_add(1, Ordering::SeqCst);
        if consume(self.header_failures.lock().get_mut(instance_key)) {
            return Err(TransportError::Timeout);
        }
        let frame_count = *self
            .frame_counts
            .get(instance_key)
            .ok_or(TransportError::Status(404))?;
        Ok(Header {
            instance_key: instance_key.to_string(),
            frame_count,
            complete: force_complete,
            attributes: Bytes::from_static(b"attributes"),
        })
    }

    fn load_frame_pixels(&self, instance_key: &str, frame_number: u32) -> Result<Bytes, TransportError> {
        self.frame_calls.fetch_add(1, Ordering::SeqCst);
        let key = (instance_key.to_string(), frame_number);
        if consume(self.frame_failures.lock().get_mut(&key)) {
            return Err(TransportError::Connection("reset by peer".to_string()));
        }
        match self.frame_counts.get(instance_key) {
            Some(&frames) if frame_number < frames => {
                Ok(Bytes::from(vec![frame_number as u8; FRAME_SIZE]))
            }
            _ => Err(TransportError::Status(404)),
        }
    }
}
