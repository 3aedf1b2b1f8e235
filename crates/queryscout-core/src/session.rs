//! Session coordination - single-flight setup with generations
//!
//! The whole-project scan is expensive and must run exactly once per
//! configuration generation no matter how many callers ask for it
//! concurrently. One caller builds while the rest block on a condvar.
//! `reset` bumps the generation counter; a build that started under an
//! older generation commits as stale and is redone instead of being
//! served to anyone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::CoreError;

enum Slot<T> {
    Idle,
    Building { generation: u64 },
    Ready { generation: u64, state: Arc<T> },
}

pub struct Session<T> {
    slot: Mutex<Slot<T>>,
    released: Condvar,
    generation: AtomicU64,
}

impl<T> Default for Session<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Session<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Idle),
            released: Condvar::new(),
            generation: AtomicU64::new(0),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Return the ready state, building it if necessary. Exactly one
    /// caller runs `build` per generation; concurrent callers block
    /// until it finishes. A failed build releases waiters so the next
    /// caller can retry.
    pub fn ensure_ready<F>(&self, build: F) -> Result<Arc<T>, CoreError>
    where
        F: Fn() -> Result<T, CoreError>,
    {
        loop {
            let build_generation;
            {
                let mut slot = self.lock_slot();
                loop {
                    match &*slot {
                        Slot::Ready { generation, state }
                            if *generation == self.generation() =>
                        {
                            return Ok(Arc::clone(state));
                        }
                        Slot::Ready { .. } => {
                            // stale state left over from a reset race
                            *slot = Slot::Idle;
                        }
                        Slot::Building { .. } => {
                            slot = self
                                .released
                                .wait(slot)
                                .unwrap_or_else(PoisonError::into_inner);
                        }
                        Slot::Idle => break,
                    }
                }
                build_generation = self.generation();
                *slot = Slot::Building {
                    generation: build_generation,
                };
            }

            // build runs outside the lock so reset and waiters make
            // progress
            let result = build();

            let mut slot = self.lock_slot();
            match result {
                Ok(state) => {
                    if self.generation() == build_generation {
                        let state = Arc::new(state);
                        *slot = Slot::Ready {
                            generation: build_generation,
                            state: Arc::clone(&state),
                        };
                        self.released.notify_all();
                        return Ok(state);
                    }
                    // configuration changed mid-build; discard and redo
                    log::debug!("session build committed stale, redoing");
                    if matches!(&*slot, Slot::Building { generation } if *generation == build_generation)
                    {
                        *slot = Slot::Idle;
                    }
                    self.released.notify_all();
                }
                Err(err) => {
                    if matches!(&*slot, Slot::Building { generation } if *generation == build_generation)
                    {
                        *slot = Slot::Idle;
                    }
                    self.released.notify_all();
                    return Err(err);
                }
            }
        }
    }

    /// Invalidate the session state. In-flight `ensure_ready` builds
    /// observe the bumped generation and restart instead of returning
    /// stale state. Not intended to be called concurrently with itself.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut slot = self.lock_slot();
        if matches!(&*slot, Slot::Ready { .. }) {
            *slot = Slot::Idle;
        }
        self.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_concurrent_cold_start_builds_once() {
        let session = Arc::new(Session::<u32>::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let builds = Arc::clone(&builds);
                thread::spawn(move || {
                    session.ensure_ready(|| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok(7)
                    })
                })
            })
            .collect();

        for handle in handles {
            let state = handle.join().unwrap().unwrap();
            assert_eq!(*state, 7);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_forces_rebuild() {
        let session = Session::<u32>::new();
        let builds = AtomicUsize::new(0);
        let build = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        };

        session.ensure_ready(build).unwrap();
        session.ensure_ready(build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        session.reset();
        session.ensure_ready(build).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reset_during_build_discards_stale_state() {
        let session = Arc::new(Session::<u32>::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let builder = {
            let session = Arc::clone(&session);
            let builds = Arc::clone(&builds);
            thread::spawn(move || {
                session.ensure_ready(|| {
                    let n = builds.fetch_add(1, Ordering::SeqCst);
                    if n == 0 {
                        // let the main thread reset while we are building
                        thread::sleep(Duration::from_millis(60));
                    }
                    Ok(n as u32)
                })
            })
        };

        thread::sleep(Duration::from_millis(20));
        session.reset();

        let state = builder.join().unwrap().unwrap();
        // the first build was stale; the served state comes from the redo
        assert_eq!(*state, 1);
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_build_releases_waiters() {
        let session = Session::<u32>::new();
        let err = session
            .ensure_ready(|| Err(CoreError::InvalidConfig("bad".to_string())))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));

        let state = session.ensure_ready(|| Ok(3)).unwrap();
        assert_eq!(*state, 3);
    }
}
