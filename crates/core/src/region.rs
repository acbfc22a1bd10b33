//! Region requests, region sources and the shared region store
//!
//! A `RegionSource` reads a packed RGB raster for a rectangle of the
//! full-resolution image at some downsample. Units of work share one
//! `RegionStore`, which caches tiles and guarantees that identical
//! requests issued concurrently trigger a single read. Listeners may
//! subscribe to tile notifications; the returned `Subscription` guard
//! unregisters the listener when dropped.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::image::ImageMetadata;
use crate::raster::RgbImage;

/// A rectangle of an image plane in full-resolution pixels, read at `downsample`
#[derive(Debug, Clone)]
pub struct RegionRequest {
    pub image_id: String,
    pub downsample: f64,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    pub z: u32,
    pub t: u32,
}

impl RegionRequest {
    pub fn new(
        image_id: impl Into<String>,
        downsample: f64,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        if !(downsample.is_finite() && downsample > 0.0) {
            return Err(Error::InvalidParameter {
                name: "downsample",
                value: downsample.to_string(),
                reason: "downsample must be finite and positive".to_string(),
            });
        }
        Ok(Self {
            image_id: image_id.into(),
            downsample,
            x,
            y,
            width,
            height,
            z: 0,
            t: 0,
        })
    }

    pub fn with_plane(mut self, z: u32, t: u32) -> Self {
        self.z = z;
        self.t = t;
        self
    }

    /// Intersect with the image bounds; `None` when nothing remains
    pub fn clip(&self, image_width: usize, image_height: usize) -> Option<Self> {
        let x0 = self.x.max(0);
        let y0 = self.y.max(0);
        let x1 = (self.x + self.width as i64).min(image_width as i64);
        let y1 = (self.y + self.height as i64).min(image_height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            x: x0,
            y: y0,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
            ..self.clone()
        })
    }

    /// Size of the raster returned for this request, at least 1x1
    pub fn output_size(&self) -> (usize, usize) {
        let w = (self.width as f64 / self.downsample).round().max(1.0) as usize;
        let h = (self.height as f64 / self.downsample).round().max(1.0) as usize;
        (w, h)
    }

    fn key(&self) -> (&str, u64, i64, i64, u32, u32, u32, u32) {
        (
            self.image_id.as_str(),
            self.downsample.to_bits(),
            self.x,
            self.y,
            self.width,
            self.height,
            self.z,
            self.t,
        )
    }
}

impl PartialEq for RegionRequest {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for RegionRequest {}

impl Hash for RegionRequest {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for RegionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[x={}, y={}, w={}, h={}, z={}, t={}, downsample={}]",
            self.image_id, self.x, self.y, self.width, self.height, self.z, self.t, self.downsample
        )
    }
}

/// Something that can read regions of one image
pub trait RegionSource: Send + Sync {
    /// Identity used to key cached tiles
    fn image_id(&self) -> &str;

    fn metadata(&self) -> &ImageMetadata;

    /// Read a region, possibly through a faster pyramid or tiled path
    fn read_region(&self, request: &RegionRequest) -> Result<RgbImage>;

    /// Read a region directly from full-resolution pixels
    fn read_region_direct(&self, request: &RegionRequest) -> Result<RgbImage> {
        self.read_region(request)
    }
}

/// Receives tiles as the store fetches them
pub trait TileListener: Send + Sync {
    fn tile_available(&self, request: &RegionRequest, tile: &RgbImage);

    /// Whether this listener cares about `request`
    fn requires_tile(&self, _request: &RegionRequest) -> bool {
        true
    }
}

type ListenerList = Mutex<Vec<(u64, Arc<dyn TileListener>)>>;
type TileSlot = Arc<Mutex<Option<Arc<RgbImage>>>>;

/// Shared, thread-safe tile cache with at most one fetch per identical request
pub struct RegionStore {
    cache: Mutex<LruCache<RegionRequest, TileSlot>>,
    listeners: Arc<ListenerList>,
    next_listener: AtomicU64,
    fetches: AtomicUsize,
}

impl RegionStore {
    /// Store keeping at most `capacity` tiles
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Register a listener until the returned guard is dropped
    pub fn subscribe(&self, listener: Arc<dyn TileListener>) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, listener));
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Number of reads issued to region sources so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Get a tile from the cache or read it from `source`.
    ///
    /// Concurrent callers with an identical request wait for the first
    /// caller's read instead of issuing their own. A failed read leaves the
    /// slot empty so that a later call retries.
    pub fn get_region(
        &self,
        source: &dyn RegionSource,
        request: &RegionRequest,
    ) -> Result<Arc<RgbImage>> {
        let slot = {
            let mut cache = self.cache.lock();
            cache
                .get_or_insert(request.clone(), || Arc::new(Mutex::new(None)))
                .clone()
        };

        let mut guard = slot.lock();
        if let Some(tile) = guard.as_ref() {
            return Ok(Arc::clone(tile));
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let tile = Arc::new(source.read_region(request)?);
        *guard = Some(Arc::clone(&tile));
        drop(guard);

        self.notify(request, &tile);
        Ok(tile)
    }

    fn notify(&self, request: &RegionRequest, tile: &RgbImage) {
        let listeners: Vec<Arc<dyn TileListener>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            if listener.requires_tile(request) {
                listener.tile_available(request, tile);
            }
        }
    }
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(256).unwrap_or(NonZeroUsize::MIN))
    }
}

/// Keeps a tile listener registered; unregisters on drop
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    listeners: Weak<ListenerList>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Cooperative cancellation flag shared between a caller and its units of work
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Error::Cancelled)` once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Fetch a region for a unit of work.
///
/// Checks for cancellation before and after the read. The store is tried
/// first; if it fails (or no store is given) the source's direct path is
/// used, and only a failure of that path is reported.
pub fn fetch_region(
    store: Option<&RegionStore>,
    source: &dyn RegionSource,
    request: &RegionRequest,
    cancel: &CancellationToken,
) -> Result<Arc<RgbImage>> {
    cancel.check()?;

    let cached = match store {
        Some(store) => match store.get_region(source, request) {
            Ok(tile) => Some(tile),
            Err(e) => {
                warn!("Region store read failed for {}, trying direct read: {}", request, e);
                None
            }
        },
        None => None,
    };

    let tile = match cached {
        Some(tile) => tile,
        None => {
            cancel.check()?;
            debug!("Direct read of {}", request);
            let tile = source
                .read_region_direct(request)
                .map_err(|e| Error::RegionRead {
                    request: request.to_string(),
                    reason: e.to_string(),
                })?;
            Arc::new(tile)
        }
    };

    cancel.check()?;
    Ok(tile)
}

/// What a unit of work needs to read regions: the source, an optional
/// shared store, a cancellation token and an optional tile listener.
#[derive(Clone, Copy)]
pub struct RegionContext<'a> {
    pub source: &'a dyn RegionSource,
    pub store: Option<&'a RegionStore>,
    pub cancel: &'a CancellationToken,
    pub listener: Option<&'a Arc<dyn TileListener>>,
}

impl<'a> RegionContext<'a> {
    pub fn new(source: &'a dyn RegionSource, cancel: &'a CancellationToken) -> Self {
        Self {
            source,
            store: None,
            cancel,
            listener: None,
        }
    }

    pub fn with_store(mut self, store: &'a RegionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_listener(mut self, listener: &'a Arc<dyn TileListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Register the listener with the store for the lifetime of the guard.
    ///
    /// Units call this on entry and hold the guard until they return, so the
    /// listener is removed on every exit path.
    pub fn subscribe(&self) -> Option<Subscription> {
        match (self.store, self.listener) {
            (Some(store), Some(listener)) => Some(store.subscribe(Arc::clone(listener))),
            _ => None,
        }
    }

    pub fn metadata(&self) -> &'a ImageMetadata {
        self.source.metadata()
    }

    pub fn fetch(&self, request: &RegionRequest) -> Result<Arc<RgbImage>> {
        fetch_region(self.store, self.source, request, self.cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_identity_includes_plane_and_downsample() {
        let a = RegionRequest::new("img", 2.0, 0, 0, 10, 10).unwrap();
        let b = RegionRequest::new("img", 2.0, 0, 0, 10, 10).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, b.clone().with_plane(1, 0));
        assert_ne!(a, RegionRequest::new("img", 4.0, 0, 0, 10, 10).unwrap());
        assert!(RegionRequest::new("img", 0.0, 0, 0, 1, 1).is_err());
    }

    #[test]
    fn test_clip() {
        let r = RegionRequest::new("img", 1.0, -5, 90, 20, 20).unwrap();
        let c = r.clip(100, 100).unwrap();
        assert_eq!((c.x, c.y, c.width, c.height), (0, 90, 15, 10));
        assert!(r.clip(100, 80).is_none());
    }

    #[test]
    fn test_output_size() {
        let r = RegionRequest::new("img", 8.0, 0, 0, 200, 3).unwrap();
        assert_eq!(r.output_size(), (25, 1));
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        assert!(token.check().is_ok());
        let shared = token.clone();
        shared.cancel();
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }
}
