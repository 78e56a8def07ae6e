//! Single-slot look-ahead cache.
//!
//! After each navigation step the image next to the cursor (in the direction
//! of travel) is requested in the background. A finished load is only kept
//! if that image is still the neighbour; on the next step the slot is checked
//! against the new current image and either handed over or thrown away.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::image_set::{Direction, ImageRef};
use crate::loader::{DecodedImage, LoadPurpose, LoadRequest};

/// What the slot holds for the image the cursor just landed on.
#[derive(Debug)]
pub enum Claim {
    /// Already decoded, show it now.
    Ready(Arc<DecodedImage>),
    /// Requested but not finished; its completion can be shown directly.
    InFlight,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    Committed,
    /// The user moved on before the load finished.
    Discarded,
}

struct Slot {
    path: PathBuf,
    direction: Direction,
    image: Option<Arc<DecodedImage>>,
}

#[derive(Default)]
pub struct PrefetchCache {
    slot: Option<Slot>,
}

impl PrefetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty the slot and report whether it held `current`.
    pub fn claim(&mut self, current: &Path) -> Claim {
        match self.slot.take() {
            Some(slot) if slot.path == current => match slot.image {
                Some(image) => {
                    log::debug!("Prefetch HIT: {}", current.display());
                    Claim::Ready(image)
                }
                None => Claim::InFlight,
            },
            _ => Claim::Miss,
        }
    }

    /// Point the slot at `neighbor` and return the load to issue. Whatever
    /// the slot held before is dropped.
    pub fn request(&mut self, neighbor: &ImageRef, direction: Direction) -> LoadRequest {
        let path = neighbor.path().to_path_buf();
        self.slot = Some(Slot {
            path: path.clone(),
            direction,
            image: None,
        });
        LoadRequest {
            path,
            purpose: LoadPurpose::Prefetch,
        }
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// Direction of the outstanding request, if any.
    pub fn direction(&self) -> Option<Direction> {
        self.slot.as_ref().map(|s| s.direction)
    }

    pub fn ready_path(&self) -> Option<&Path> {
        self.slot
            .as_ref()
            .filter(|s| s.image.is_some())
            .map(|s| s.path.as_path())
    }

    /// A prefetch load finished. It is kept only if it is the one the slot
    /// waits for and `live_neighbor` (the image now next to the cursor) is
    /// still that path.
    pub fn complete(
        &mut self,
        path: &Path,
        image: Arc<DecodedImage>,
        live_neighbor: Option<&Path>,
    ) -> PrefetchOutcome {
        let Some(slot) = self.slot.as_mut() else {
            log::debug!("Prefetch of {} discarded, nothing pending", path.display());
            return PrefetchOutcome::Discarded;
        };
        if slot.path != path || live_neighbor != Some(path) {
            log::debug!("Prefetch of {} discarded as stale", path.display());
            return PrefetchOutcome::Discarded;
        }
        slot.image = Some(image);
        PrefetchOutcome::Committed
    }

    /// A prefetch load failed. Free the slot so landing on `path` issues a
    /// fresh on-demand load instead of waiting for this one.
    pub fn fail(&mut self, path: &Path) {
        if self.slot.as_ref().is_some_and(|s| s.path == path) {
            self.slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_set::{ImageSet, TraversalMode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn image() -> Arc<DecodedImage> {
        Arc::new(DecodedImage {
            rgba_bytes: vec![0; 4],
            width: 1,
            height: 1,
            file_size: 4,
            format_name: "PNG".into(),
        })
    }

    fn set_of(n: usize) -> ImageSet {
        let images = (0..n).map(|i| ImageRef::new(format!("{}.png", i))).collect();
        ImageSet::with_rng(images, StdRng::seed_from_u64(0))
    }

    fn neighbor_path(set: &ImageSet, dir: Direction) -> Option<PathBuf> {
        set.neighbor(dir).map(|r| r.path().to_path_buf())
    }

    #[test]
    fn completed_neighbor_is_handed_over() {
        let mut set = set_of(10);
        let mut cache = PrefetchCache::new();
        set.jump_to(4).unwrap();

        let req = cache.request(set.neighbor(Direction::Forward).unwrap(), Direction::Forward);
        assert_eq!(req.path, PathBuf::from("5.png"));
        assert_eq!(req.purpose, LoadPurpose::Prefetch);

        let live = neighbor_path(&set, Direction::Forward);
        assert_eq!(cache.complete(&req.path, image(), live.as_deref()), PrefetchOutcome::Committed);
        assert_eq!(cache.ready_path(), Some(Path::new("5.png")));

        set.advance(TraversalMode::Ordered, 1);
        assert!(matches!(cache.claim(set.current().unwrap().path()), Claim::Ready(_)));
        assert!(cache.ready_path().is_none());
    }

    #[test]
    fn stale_load_is_discarded_after_user_moves_on() {
        let mut set = set_of(10);
        let mut cache = PrefetchCache::new();
        set.jump_to(4).unwrap();
        let stale = cache.request(set.neighbor(Direction::Forward).unwrap(), Direction::Forward);

        // User jumps to 6 before the load for 5 completes.
        set.advance(TraversalMode::Ordered, 2);
        assert!(matches!(cache.claim(set.current().unwrap().path()), Claim::Miss));
        let fresh = cache.request(set.neighbor(Direction::Forward).unwrap(), Direction::Forward);
        assert_eq!(fresh.path, PathBuf::from("7.png"));

        let live = neighbor_path(&set, Direction::Forward);
        assert_eq!(
            cache.complete(&stale.path, image(), live.as_deref()),
            PrefetchOutcome::Discarded
        );
        assert!(cache.ready_path().is_none());

        assert_eq!(cache.complete(&fresh.path, image(), live.as_deref()), PrefetchOutcome::Committed);
        assert_eq!(cache.ready_path(), Some(Path::new("7.png")));
    }

    #[test]
    fn landing_on_pending_neighbor_reports_in_flight() {
        let mut set = set_of(10);
        let mut cache = PrefetchCache::new();
        cache.request(set.neighbor(Direction::Forward).unwrap(), Direction::Forward);
        set.advance(TraversalMode::Ordered, 1);
        assert!(matches!(cache.claim(set.current().unwrap().path()), Claim::InFlight));
    }

    #[test]
    fn reorder_makes_pending_load_stale() {
        let mut set = set_of(50);
        let mut cache = PrefetchCache::new();
        set.jump_to(10).unwrap();
        let req = cache.request(set.neighbor(Direction::Forward).unwrap(), Direction::Forward);

        set.set_mode(TraversalMode::Random);
        let live = neighbor_path(&set, Direction::Forward);
        let expected = if live.as_deref() == Some(req.path.as_path()) {
            PrefetchOutcome::Committed
        } else {
            PrefetchOutcome::Discarded
        };
        assert_eq!(cache.complete(&req.path, image(), live.as_deref()), expected);
    }

    #[test]
    fn claim_for_other_image_misses_and_empties_slot() {
        let mut set = set_of(5);
        let mut cache = PrefetchCache::new();
        let req = cache.request(set.neighbor(Direction::Backward).unwrap(), Direction::Backward);
        assert_eq!(req.path, PathBuf::from("4.png"));
        assert_eq!(cache.direction(), Some(Direction::Backward));
        let live = neighbor_path(&set, Direction::Backward);
        cache.complete(&req.path, image(), live.as_deref());

        set.advance(TraversalMode::Ordered, 1);
        assert!(matches!(cache.claim(set.current().unwrap().path()), Claim::Miss));
        assert!(cache.direction().is_none());
    }

    #[test]
    fn failed_load_turns_landing_into_miss() {
        let mut set = set_of(5);
        let mut cache = PrefetchCache::new();
        let req = cache.request(set.neighbor(Direction::Forward).unwrap(), Direction::Forward);

        cache.fail(Path::new("3.png"));
        assert_eq!(cache.direction(), Some(Direction::Forward));

        cache.fail(&req.path);
        assert!(cache.direction().is_none());
        set.advance(TraversalMode::Ordered, 1);
        assert!(matches!(cache.claim(set.current().unwrap().path()), Claim::Miss));
    }

    #[test]
    fn completion_without_request_is_dropped() {
        let mut cache = PrefetchCache::new();
        assert_eq!(
            cache.complete(Path::new("x.png"), image(), Some(Path::new("x.png"))),
            PrefetchOutcome::Discarded
        );
    }
}
