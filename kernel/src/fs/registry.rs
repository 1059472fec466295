//! Filesystem-type registry.
//!
//! Registration is a two-step protocol: `register` allocates a named type
//! record, then invokes a configure callback so the driver can fill in its
//! operation pointers. If the callback fails, nothing is inserted.

use alloc::{collections::BTreeMap, sync::Arc};

use lazy_static::lazy_static;
use spin::Mutex;

use super::superblock::SuperBlock;
use crate::{errno::Errno, util::irq_guard::IrqGuard};

pub type GetSb = Arc<dyn Fn(&mut SuperBlock) -> Result<(), Errno> + Send + Sync>;
pub type KillSb = Arc<dyn Fn(&SuperBlock) -> Result<(), Errno> + Send + Sync>;

#[derive(Default)]
pub struct FsTypeBuilder {
    get_sb: Option<GetSb>,
    kill_sb: Option<KillSb>,
}

impl FsTypeBuilder {
    pub fn get_sb(
        &mut self,
        f: impl Fn(&mut SuperBlock) -> Result<(), Errno> + Send + Sync + 'static,
    ) -> &mut Self {
        self.get_sb = Some(Arc::new(f));
        self
    }

    pub fn kill_sb(
        &mut self,
        f: impl Fn(&SuperBlock) -> Result<(), Errno> + Send + Sync + 'static,
    ) -> &mut Self {
        self.kill_sb = Some(Arc::new(f));
        self
    }
}

#[derive(Clone)]
pub struct FsType {
    pub name: &'static str,
    pub get_sb: GetSb,
    pub kill_sb: KillSb,
}

lazy_static! {
    static ref FS_TYPE_REGISTRY: Mutex<BTreeMap<&'static str, FsType>> = Mutex::new(BTreeMap::new());
}

/// Registers a filesystem type. `configure` must set both `get_sb` and
/// `kill_sb` on the builder it's handed; if it returns an error (or leaves
/// either operation unset) the registry is left untouched.
pub fn register(
    name: &'static str,
    configure: impl FnOnce(&mut FsTypeBuilder) -> Result<(), Errno>,
) -> Result<(), Errno> {
    let _guard = IrqGuard::acquire();
    let mut registry = FS_TYPE_REGISTRY.lock();

    if registry.contains_key(name) {
        return Err(crate::errno::set_errno(Errno::EExist));
    }

    let mut builder = FsTypeBuilder::default();
    configure(&mut builder)?;

    let (Some(get_sb), Some(kill_sb)) = (builder.get_sb, builder.kill_sb) else {
        return Err(crate::errno::set_errno(Errno::ECorrupt));
    };

    registry.insert(
        name,
        FsType {
            name,
            get_sb,
            kill_sb,
        },
    );

    Ok(())
}

pub fn find(name: &str) -> Option<FsType> {
    let _guard = IrqGuard::acquire();
    FS_TYPE_REGISTRY.lock().get(name).cloned()
}
