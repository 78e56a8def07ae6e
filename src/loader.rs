use image::GenericImageView;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Decoded image data (CPU side, before it hits the framebuffer)
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct DecodedImage {
    pub rgba_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub format_name: String,
}

pub fn decode_image(path: &Path) -> Result<DecodedImage> {
    let file_size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let img = image::ImageReader::open(path)?.with_guessed_format()?.decode()?;
    let format_name = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("unknown")
        .to_uppercase();
    let (width, height) = img.dimensions();

    Ok(DecodedImage {
        rgba_bytes: img.to_rgba8().into_raw(),
        width,
        height,
        file_size,
        format_name,
    })
}

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPurpose {
    /// The image the user is waiting for.
    Display,
    /// The neighbour, loaded ahead of time.
    Prefetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub path: PathBuf,
    pub purpose: LoadPurpose,
}

#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub purpose: LoadPurpose,
    pub result: std::result::Result<Arc<DecodedImage>, String>,
}

/// Where the viewer sends decode work. Completion comes back separately,
/// through the event loop.
pub trait ImageLoader {
    fn request(&self, request: LoadRequest);
}

// ---------------------------------------------------------------------------
// User event for waking the UI from worker threads
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum UserEvent {
    Loaded(LoadResult),
}

// ---------------------------------------------------------------------------
// Background decode workers
// ---------------------------------------------------------------------------

/// Queued requests plus the paths workers are decoding right now.
#[derive(Default)]
struct Pending {
    queue: VecDeque<LoadRequest>,
    decoding: Vec<PathBuf>,
}

impl Pending {
    /// Only the newest request of each purpose is worth decoding. A display
    /// request takes over a queued prefetch of the same path, and a path
    /// already being decoded is not queued again.
    fn enqueue(&mut self, request: LoadRequest) {
        if self.decoding.contains(&request.path) {
            log::debug!("Already decoding {}", request.path.display());
            return;
        }
        match request.purpose {
            LoadPurpose::Display => {
                self.queue
                    .retain(|r| r.purpose != LoadPurpose::Display && r.path != request.path);
                self.queue.push_front(request);
            }
            LoadPurpose::Prefetch => {
                self.queue.retain(|r| r.purpose != LoadPurpose::Prefetch);
                if !self.queue.iter().any(|r| r.path == request.path) {
                    self.queue.push_back(request);
                }
            }
        }
    }

    fn take_next(&mut self) -> Option<LoadRequest> {
        let request = self.queue.pop_front()?;
        self.decoding.push(request.path.clone());
        Some(request)
    }

    fn finish(&mut self, path: &Path) {
        if let Some(i) = self.decoding.iter().position(|p| p == path) {
            self.decoding.swap_remove(i);
        }
    }
}

type Queue = Arc<(Mutex<Pending>, Condvar)>;

/// Fixed set of decode threads fed from one queue. Display requests jump
/// ahead of queued prefetches; superseded requests are dropped unread.
pub struct DecodePool {
    queue: Queue,
}

impl DecodePool {
    pub fn spawn<N>(num_threads: usize, notify: N) -> Self
    where
        N: Fn(LoadResult) + Send + Clone + 'static,
    {
        let queue: Queue = Arc::new((Mutex::new(Pending::default()), Condvar::new()));

        for _ in 0..num_threads.max(1) {
            let queue = Arc::clone(&queue);
            let notify = notify.clone();
            thread::spawn(move || {
                loop {
                    let request = {
                        let (lock, cvar) = &*queue;
                        let Ok(mut pending) = lock.lock() else { return };
                        loop {
                            if let Some(request) = pending.take_next() {
                                break request;
                            }
                            pending = match cvar.wait(pending) {
                                Ok(guard) => guard,
                                Err(_) => return,
                            };
                        }
                    };

                    log::debug!("[decode] {:?} {}", request.purpose, request.path.display());
                    let result = decode_image(&request.path)
                        .map(Arc::new)
                        .map_err(|e| format!("{}: {}", request.path.display(), e));
                    if let Ok(mut pending) = queue.0.lock() {
                        pending.finish(&request.path);
                    }
                    notify(LoadResult {
                        path: request.path,
                        purpose: request.purpose,
                        result,
                    });
                }
            });
        }

        Self { queue }
    }
}

impl ImageLoader for DecodePool {
    fn request(&self, request: LoadRequest) {
        let (lock, cvar) = &*self.queue;
        let Ok(mut pending) = lock.lock() else {
            log::error!("Decode queue poisoned, dropping {}", request.path.display());
            return;
        };
        pending.enqueue(request);
        cvar.notify_one();
    }
}
