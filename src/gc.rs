use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet},
    rc::Rc,
};

use crate::variable::{VarHandle, Variable};

/// GC age bucket. Younger generations are collected more often; survivors
/// are promoted to the next older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GcGeneration {
    Newest = 0,
    Middle = 1,
    Oldest = 2,
}

const GEN_COUNT: usize = 3;
const DEFAULT_THRESHOLDS: [usize; GEN_COUNT] = [10, 70, 500];

fn key_of(handle: &VarHandle) -> usize {
    Rc::as_ptr(handle) as usize
}

/// The mark-and-sweep layer over reference counting. Tracks every Variable
/// it creates in one of three generations; collection of a generation
/// counts the references internal to the traced set and reclaims cells
/// whose every live reference is internal. The algorithm follows the
/// classic staged-count design used by CPython's cycle detector.
pub struct GarbageCollector {
    recur: Cell<usize>,
    pool: RefCell<Vec<VarHandle>>,
    counts: [Cell<usize>; GEN_COUNT],
    thresholds: [Cell<usize>; GEN_COUNT],
    tracked: [RefCell<HashMap<usize, VarHandle>>; GEN_COUNT],
}

/// Reentrancy guard; the counter stays incremented for the guard's
/// lifetime so nested collection requests turn into no-ops.
struct Sentry<'a> {
    counter: &'a Cell<usize>,
    fresh: bool,
}

impl<'a> Sentry<'a> {
    fn enter(counter: &'a Cell<usize>) -> Self {
        let fresh = counter.get() == 0;
        counter.set(counter.get() + 1);
        Self { counter, fresh }
    }
}

impl Drop for Sentry<'_> {
    fn drop(&mut self) {
        self.counter.set(self.counter.get() - 1);
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl GarbageCollector {
    pub fn new() -> Self {
        Self {
            recur: Cell::new(0),
            pool: RefCell::new(Vec::new()),
            counts: Default::default(),
            thresholds: [
                Cell::new(DEFAULT_THRESHOLDS[0]),
                Cell::new(DEFAULT_THRESHOLDS[1]),
                Cell::new(DEFAULT_THRESHOLDS[2]),
            ],
            tracked: Default::default(),
        }
    }

    pub fn threshold(&self, gen: GcGeneration) -> usize {
        self.thresholds[gen as usize].get()
    }

    pub fn set_threshold(&self, gen: GcGeneration, threshold: usize) {
        self.thresholds[gen as usize].set(threshold);
    }

    pub fn count_tracked(&self, gen: GcGeneration) -> usize {
        self.tracked[gen as usize].borrow().len()
    }

    pub fn count_pooled(&self) -> usize {
        self.pool.borrow().len()
    }

    /// Creates a fresh Variable tracked in `gen_hint`, running automatic
    /// collection first on any generation whose allocation count has
    /// reached its threshold, youngest first.
    pub fn create_variable(&self, gen_hint: GcGeneration) -> VarHandle {
        for gen in 0..GEN_COUNT {
            if self.counts[gen].get() >= self.thresholds[gen].get() {
                self.collect_generation(gen);
            }
        }

        let handle = self
            .pool
            .borrow_mut()
            .pop()
            .unwrap_or_else(Variable::new_handle);

        self.tracked[gen_hint as usize]
            .borrow_mut()
            .insert(key_of(&handle), handle.clone());
        self.counts[gen_hint as usize].set(self.counts[gen_hint as usize].get() + 1);
        handle
    }

    /// Collects every generation up to `gen_limit`, then discards the free
    /// pool. Returns the number of variables reclaimed.
    pub fn collect(&self, gen_limit: GcGeneration) -> usize {
        let mut reclaimed = 0;
        for gen in 0..=gen_limit as usize {
            reclaimed += self.collect_generation(gen);
        }
        self.pool.borrow_mut().clear();
        reclaimed
    }

    /// Uninitializes every tracked variable in every generation and clears
    /// the pool. Aborts the process when invoked during a collection: the
    /// tracked sets are in an inconsistent state and no recovery exists.
    pub fn finalize(&self) -> usize {
        if self.recur.get() != 0 {
            eprintln!("fatal: garbage collector finalized while collecting");
            std::process::abort();
        }
        let _sentry = Sentry::enter(&self.recur);

        let mut count = 0;
        for gen in 0..GEN_COUNT {
            let drained: Vec<VarHandle> = {
                let mut tracked = self.tracked[gen].borrow_mut();
                count += tracked.len();
                tracked.drain().map(|(_, handle)| handle).collect()
            };
            // Only directly tracked cells are wiped; variables reached
            // indirectly may be foreign and must stay intact.
            for handle in drained {
                handle.uninitialize();
            }
            self.counts[gen].set(0);
        }
        count += self.pool.borrow().len();
        self.pool.borrow_mut().clear();
        count
    }

    fn collect_generation(&self, gen: usize) -> usize {
        let sentry = Sentry::enter(&self.recur);
        if !sentry.fresh {
            return 0;
        }

        // Snapshot the traced set. Every root now carries exactly two
        // bookkeeping references: the tracked-map entry and this snapshot.
        let roots: Vec<VarHandle> = self.tracked[gen].borrow().values().cloned().collect();

        // Stage the references internal to the traced set. Each root's
        // counter starts at one; every storage slot inside a traced value
        // that holds a variable handle contributes one more. Capture
        // tables are shared between closure clones, so they are visited
        // once across the whole pass.
        let mut seen_closures: HashSet<usize> = HashSet::new();
        let mut staged: Vec<VarHandle> = Vec::new();
        for root in &roots {
            root.set_gc_ref(1);
            debug_assert!(root.gc_ref() <= Rc::strong_count(root) - 1);
            root.value().enumerate_variables(&mut seen_closures, &mut staged);
        }
        {
            let tracked = self.tracked[gen].borrow();
            for handle in staged.drain(..) {
                if tracked.contains_key(&key_of(&handle)) {
                    handle.set_gc_ref(handle.gc_ref() + 1);
                    debug_assert!(handle.gc_ref() <= Rc::strong_count(&handle) - 1);
                }
            }
        }

        // A root whose counter equals its use count minus one has no live
        // reference from outside the traced set: tentatively unreachable.
        // Everything else is reachable, and so is everything a reachable
        // variable reaches.
        let mut unreachable: HashMap<usize, VarHandle> = HashMap::new();
        for root in &roots {
            if root.gc_ref() == Rc::strong_count(root) - 1 {
                unreachable.insert(key_of(root), root.clone());
            }
        }
        let mut visited: HashSet<usize> = HashSet::new();
        let mut worklist: Vec<VarHandle> = Vec::new();
        for root in &roots {
            if unreachable.contains_key(&key_of(root)) {
                continue;
            }
            worklist.push(root.clone());
            let mut mark_seen: HashSet<usize> = HashSet::new();
            while let Some(current) = worklist.pop() {
                if !visited.insert(key_of(&current)) {
                    continue;
                }
                current.set_gc_ref(0);
                unreachable.remove(&key_of(&current));
                current
                    .value()
                    .enumerate_variables(&mut mark_seen, &mut worklist);
            }
        }

        // Reclaim: drop the value (breaking cycles), stop tracking, and
        // recycle the cell.
        let mut reclaimed = 0;
        {
            let mut tracked = self.tracked[gen].borrow_mut();
            let mut pool = self.pool.borrow_mut();
            for (key, handle) in unreachable.drain() {
                debug_assert!(handle.gc_ref() != 0);
                handle.uninitialize();
                if tracked.remove(&key).is_some() {
                    pool.push(handle);
                }
                reclaimed += 1;
            }
        }

        // Promote survivors to the next generation, if one exists.
        if gen + 1 < GEN_COUNT {
            let survivors: Vec<(usize, VarHandle)> = {
                let mut tracked = self.tracked[gen].borrow_mut();
                tracked.drain().collect()
            };
            let mut next = self.tracked[gen + 1].borrow_mut();
            for (key, handle) in survivors {
                next.insert(key, handle);
                self.counts[gen + 1].set(self.counts[gen + 1].get() + 1);
            }
        }

        // The counter resets only on normal completion, so an interrupted
        // run is retried by the next allocation.
        self.counts[gen].set(0);
        reclaimed
    }
}
