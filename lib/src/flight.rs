// Copyright (c) 2022-2023 The MobileCoin Foundation

use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};

/// Shares one in-flight operation between concurrent callers.
///
/// A caller arriving while an operation is running awaits that
/// operation's result instead of starting another.
pub struct SingleFlight<T: Clone + Send + Sync + 'static> {
    current: Mutex<Option<(u64, Shared<BoxFuture<'static, T>>)>>,
    next: AtomicU64,
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            current: Mutex::new(None),
            next: AtomicU64::new(0),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the operation built by `f`, or join the one already in flight
    pub async fn run<F, Fut>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (id, fut) = {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

            match &*current {
                Some((id, fut)) if fut.peek().is_none() => (*id, fut.clone()),
                _ => {
                    let id = self.next.fetch_add(1, Ordering::Relaxed);
                    let fut = f().boxed().shared();

                    *current = Some((id, fut.clone()));
                    (id, fut)
                }
            }
        };

        let r = fut.await;

        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(&*current, Some((i, _)) if *i == id) {
            *current = None;
        }

        r
    }

    /// Check whether an operation is in flight
    pub fn in_flight(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        matches!(&*current, Some((_, f)) if f.peek().is_none())
    }
}
