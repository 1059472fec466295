//! Fixed-size, open-addressed dentry cache with least-frequently-used
//! eviction. Mount points are pinned and never evicted.

use alloc::sync::Arc;

use spin::Mutex;

use super::DevId;
use crate::{
    errno::{Errno, set_errno},
    limits::DENTRY_CACHE_SIZE,
    util::irq_guard::IrqGuard,
};

#[derive(Clone)]
struct Slot {
    /// `None` means the slot is empty.
    name: Option<Arc<str>>,
    parent: Option<usize>,
    sb: Option<DevId>,
    /// Non-`None` iff this dentry is a mount point; holds the devid of the
    /// super-block mounted here.
    mnt_sb: Option<DevId>,
    /// 0 iff not yet resolved.
    vno: u64,
    count: u64,
}

impl Slot {
    const fn empty() -> Self {
        Self {
            name: None,
            parent: None,
            sb: None,
            mnt_sb: None,
            vno: 0,
            count: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none()
    }

    fn is_mount_point(&self) -> bool {
        self.mnt_sb.is_some()
    }
}

pub struct DentryCache {
    slots: Mutex<[Slot; DENTRY_CACHE_SIZE]>,
}

/// A reference to a live dentry: the cache slot's index. Stable for the
/// lifetime of the dentry (until evicted or explicitly reset).
pub type DentryId = usize;

impl DentryCache {
    pub const fn new() -> Self {
        const EMPTY: Slot = Slot::empty();
        Self {
            slots: Mutex::new([EMPTY; DENTRY_CACHE_SIZE]),
        }
    }

    /// Installs the root dentry at slot 0 with the sentinel vno of 1, so
    /// lookups succeed before the real root super-block is attached.
    pub fn init_root(&self) -> DentryId {
        let mut slots = self.slots.lock();
        slots[0] = Slot {
            name: Some("/".into()),
            parent: None,
            sb: None,
            mnt_sb: None,
            vno: 1,
            count: 1,
        };
        0
    }

    /// Looks up (or allocates) the dentry named `name` under `parent`.
    pub fn get(&self, parent: DentryId, name: &str) -> Result<DentryId, Errno> {
        let _guard = IrqGuard::acquire();
        let mut slots = self.slots.lock();

        if let Some(idx) = slots.iter().position(|slot| {
            !slot.is_empty() && slot.parent == Some(parent) && slot.name.as_deref() == Some(name)
        }) {
            slots[idx].count += 1;
            return Ok(idx);
        }

        // cache miss: find the least-frequently-used non-mount-point slot,
        // preferring an empty one (count effectively 0)
        let mut victim: Option<usize> = None;
        for (idx, slot) in slots.iter().enumerate() {
            if slot.is_mount_point() {
                continue;
            }

            if slot.is_empty() {
                victim = Some(idx);
                break;
            }

            match victim {
                Some(v) if slots[v].count <= slot.count => {}
                _ => victim = Some(idx),
            }
        }

        let Some(idx) = victim else {
            return Err(set_errno(Errno::ELimit));
        };

        let (parent_sb, parent_mnt_sb) = {
            let p = &slots[parent];
            (p.sb, p.mnt_sb)
        };

        slots[idx] = Slot {
            name: Some(name.into()),
            parent: Some(parent),
            sb: Some(parent_mnt_sb.or(parent_sb).unwrap_or(DevId::ZERO)),
            mnt_sb: None,
            vno: 0,
            count: 1,
        };

        Ok(idx)
    }

    pub fn name(&self, id: DentryId) -> Arc<str> {
        self.slots.lock()[id]
            .name
            .clone()
            .expect("dentry id refers to an empty slot")
    }

    pub fn parent(&self, id: DentryId) -> Option<DentryId> {
        self.slots.lock()[id].parent
    }

    pub fn sb(&self, id: DentryId) -> Option<DevId> {
        self.slots.lock()[id].sb
    }

    pub fn mnt_sb(&self, id: DentryId) -> Option<DevId> {
        self.slots.lock()[id].mnt_sb
    }

    pub fn is_mount_point(&self, id: DentryId) -> bool {
        self.slots.lock()[id].is_mount_point()
    }

    pub fn vno(&self, id: DentryId) -> u64 {
        self.slots.lock()[id].vno
    }

    pub fn set_vno(&self, id: DentryId, vno: u64) {
        self.slots.lock()[id].vno = vno;
    }

    /// Marks `id` as the mount point for `sb`. The root dentry is also set
    /// this way when `mount(devid, "/", ...)` runs.
    pub fn set_mounted(&self, id: DentryId, sb: DevId) {
        self.slots.lock()[id].mnt_sb = Some(sb);
    }

    pub fn clear_mounted(&self, id: DentryId) {
        self.slots.lock()[id].mnt_sb = None;
    }

    fn reset(slot: &mut Slot) {
        *slot = Slot::empty();
    }

    /// Clears a single dentry back to an empty slot (used to unwind a
    /// just-allocated dentry when creation fails downstream).
    pub fn reset_one(&self, id: DentryId) {
        Self::reset(&mut self.slots.lock()[id]);
    }

    /// Finds the dentry that is the mount point for `sb`, if any.
    pub fn find_mount_point(&self, sb: DevId) -> Option<DentryId> {
        self.slots
            .lock()
            .iter()
            .position(|s| !s.is_empty() && s.mnt_sb == Some(sb))
    }

    /// Verifies no dentry belonging to `sb` is itself a mount point for a
    /// deeper filesystem, then resets every dentry belonging to `sb`.
    pub fn unmount_sb(&self, sb: DevId) -> Result<(), Errno> {
        let _guard = IrqGuard::acquire();
        let mut slots = self.slots.lock();

        if slots
            .iter()
            .any(|s| !s.is_empty() && s.sb == Some(sb) && s.is_mount_point())
        {
            return Err(set_errno(Errno::EBusy));
        }

        for slot in slots.iter_mut() {
            if !slot.is_empty() && slot.sb == Some(sb) {
                Self::reset(slot);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_dentry_has_sentinel_vno() {
        let cache = DentryCache::new();
        let root = cache.init_root();
        assert_eq!(cache.vno(root), 1);
    }

    #[test]
    fn repeated_get_bumps_count_instead_of_reallocating() {
        let cache = DentryCache::new();
        let root = cache.init_root();

        let a1 = cache.get(root, "a").unwrap();
        let a2 = cache.get(root, "a").unwrap();
        assert_eq!(a1, a2);
    }

    #[test]
    fn mount_points_are_never_evicted() {
        let cache = DentryCache::new();
        let root = cache.init_root();

        // pin every non-root slot as a mount point, each under a distinct
        // name so every `get` allocates a fresh slot instead of bumping an
        // existing one
        for i in 1..DENTRY_CACHE_SIZE {
            let name = alloc::format!("mnt{i}");
            let id = cache.get(root, &name).unwrap();
            cache.set_mounted(id, DevId::new(0, i as u8));
        }

        // cache should now refuse further allocation since nothing is
        // evictable (every slot besides root, which is also protected by
        // being the match target, is pinned)
        let result = cache.get(root, "one-too-many");
        assert!(result.is_err());
    }
}
