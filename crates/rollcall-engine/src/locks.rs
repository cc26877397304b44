//! Per-voter advisory locks.
//!
//! Serialises in-process merges touching the same voter. Locks are acquired
//! in stable id order so two concurrent merges over the same pair (in either
//! direction) cannot deadlock. This guards only this process; the store's
//! unique identity-link constraint remains the cross-process backstop.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex as StdMutex},
};

use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub(crate) struct VoterLocks {
  inner: StdMutex<HashMap<Uuid, Arc<TokioMutex<()>>>>,
}

impl VoterLocks {
  fn handle(&self, voter_id: Uuid) -> Arc<TokioMutex<()>> {
    let mut map = self.inner.lock().expect("voter lock map");
    map.entry(voter_id).or_default().clone()
  }

  /// Hold both voters' locks for the duration of a merge. With `a == b`
  /// a single guard is taken.
  pub async fn lock_pair(
    &self,
    a: Uuid,
    b: Uuid,
  ) -> (OwnedMutexGuard<()>, Option<OwnedMutexGuard<()>>) {
    if a == b {
      return (self.handle(a).lock_owned().await, None);
    }
    let (first, second) = if a < b { (a, b) } else { (b, a) };
    let first_guard = self.handle(first).lock_owned().await;
    let second_guard = self.handle(second).lock_owned().await;
    (first_guard, Some(second_guard))
  }
}
