use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// In-memory accounting of active provide tasks. Never persisted; rebuilt
/// from the task store on restart by the reconciler's normal operation.
#[derive(Debug, Default)]
pub struct ProvideStats {
    fids: DashMap<String, ()>,
    ongoing: AtomicI64,
    retried: AtomicU64,
    done: AtomicU64,
}

impl ProvideStats {
    /// Reserve `fid`, returning whether it was already present.
    pub fn fids_load_or_store(&self, fid: &str) -> bool {
        match self.fids.entry(fid.to_string()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(entry) => {
                entry.insert(());
                false
            }
        }
    }

    pub fn fids_contains(&self, fid: &str) -> bool {
        self.fids.contains_key(fid)
    }

    pub fn fids_delete(&self, fid: &str) {
        self.fids.remove(fid);
    }

    pub fn ongoing_inc(&self) {
        self.ongoing.fetch_add(1, Ordering::SeqCst);
    }

    /// Account a finished workflow; the fid entry goes with it.
    pub fn task_done(&self, fid: &str) {
        self.fids.remove(fid);
        self.ongoing.fetch_add(-1, Ordering::SeqCst);
        self.done.fetch_add(1, Ordering::SeqCst);
    }

    /// Account a re-announcement of a task that lost workers.
    pub fn task_flash(&self, _fid: &str) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    pub fn ongoing(&self) -> i64 {
        self.ongoing.load(Ordering::SeqCst)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::SeqCst)
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::SeqCst)
    }
}
