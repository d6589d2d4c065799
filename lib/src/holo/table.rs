use std::collections::HashMap;
use std::sync::Mutex;

use crate::gpu::GraphicsDevice;
use crate::holo::{CameraId, CameraResource, HoloCamera};

pub type CameraMap<D, C> = HashMap<CameraId, CameraResource<D, C>>;

/// Camera resources keyed by platform camera id.
///
/// Attach/detach notifications arrive on a different thread than the frame
/// loop, so every access goes through [`with_lock`](Self::with_lock). The lock
/// is held for the duration of the closure only: don't present or call back
/// into the table from inside it.
pub struct CameraResourceTable<D: GraphicsDevice, C: HoloCamera> {
    inner_mutex: Mutex<CameraMap<D, C>>,
}

impl<D: GraphicsDevice, C: HoloCamera> CameraResourceTable<D, C> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner_mutex: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_lock<R, F: FnOnce(&mut CameraMap<D, C>) -> R>(&self, f: F) -> R {
        let mut cameras = self.inner_mutex.lock().unwrap();
        f(&mut cameras)
    }

    /// Inserts a fresh, unresourced entry. An existing entry with the same id
    /// is released and replaced without dropping the lock, returns true if
    /// that happened.
    pub fn insert(&self, camera: C, context: &D::Context) -> bool {
        let id = camera.get_id();

        self.with_lock(|cameras| {
            match cameras.insert(id, CameraResource::new(camera)) {
                Some(mut old_camera_res) => {
                    old_camera_res.release_resources(context);
                    true
                },
                None => false,
            }
        })
    }

    /// Releases the entry's GPU resources and erases it, both under the lock.
    pub fn remove(&self, id: CameraId, context: &D::Context) -> bool {
        self.with_lock(|cameras| {
            match cameras.remove(&id) {
                Some(mut camera_res) => {
                    camera_res.release_resources(context);
                    true
                },
                None => false,
            }
        })
    }

    pub fn contains(&self, id: CameraId) -> bool {
        self.with_lock(|cameras| cameras.contains_key(&id))
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.with_lock(|cameras| cameras.len())
    }

    pub fn get_ids(&self) -> Vec<CameraId> {
        self.with_lock(|cameras| {
            let mut ids: Vec<_> = cameras.keys().copied().collect();
            ids.sort_unstable();
            ids
        })
    }
}
