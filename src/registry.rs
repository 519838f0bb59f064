//! Process-wide datapath index. Readers on the data plane take the read
//! guard for the duration of their access; a writer acquiring the write
//! guard has therefore waited out every in-flight reader before it mutates
//! or reclaims anything.

use crate::datapath::Datapath;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub const DP_MAX: usize = 256;

struct Slots {
    by_id: Vec<Option<Arc<Datapath>>>,
    by_name: FxHashMap<String, u16>,
}

pub struct Registry {
    slots: RwLock<Slots>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Slots {
                by_id: (0..DP_MAX).map(|_| None).collect(),
                by_name: FxHashMap::default(),
            }),
        }
    }

    /// Reserve an id for a datapath under construction. With no preference,
    /// the smallest free id wins. Callers hold the admin lock, so the id
    /// stays free until `publish`.
    pub fn allocate(&self, preferred: Option<u16>, name: Option<&str>) -> Result<u16> {
        if preferred.is_none() && name.is_none() {
            return Err(Error::InvalidArgument("neither id nor name supplied"));
        }
        let slots = self.slots.read();
        if let Some(name) = name {
            if slots.by_name.contains_key(name) {
                return Err(Error::AlreadyExists);
            }
        }
        match preferred {
            Some(id) => {
                if usize::from(id) >= DP_MAX {
                    return Err(Error::InvalidArgument("datapath id out of range"));
                }
                if slots.by_id[usize::from(id)].is_some() {
                    return Err(Error::AlreadyExists);
                }
                Ok(id)
            }
            None => slots
                .by_id
                .iter()
                .position(Option::is_none)
                .map(|id| id as u16)
                .ok_or(Error::InvalidArgument("no free datapath id")),
        }
    }

    pub fn publish(&self, dp: Arc<Datapath>) {
        let mut slots = self.slots.write();
        let id = dp.id();
        slots.by_name.insert(dp.name().to_string(), id);
        slots.by_id[usize::from(id)] = Some(dp);
    }

    pub fn remove(&self, id: u16) -> Option<Arc<Datapath>> {
        let mut slots = self.slots.write();
        let dp = slots.by_id[usize::from(id)].take()?;
        slots.by_name.remove(dp.name());
        Some(dp)
    }

    pub fn get_by_id(&self, id: u16) -> Option<Arc<Datapath>> {
        if usize::from(id) >= DP_MAX {
            return None;
        }
        self.slots.read().by_id[usize::from(id)].clone()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Datapath>> {
        let slots = self.slots.read();
        let id = *slots.by_name.get(name)?;
        slots.by_id[usize::from(id)].clone()
    }

    /// Live datapaths in id order.
    pub fn iter(&self) -> Vec<Arc<Datapath>> {
        self.slots.read().by_id.iter().flatten().cloned().collect()
    }

    /// True when `name` is the local interface of any live datapath.
    pub fn is_local_iface(&self, name: &str) -> bool {
        self.slots.read().by_name.contains_key(name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
