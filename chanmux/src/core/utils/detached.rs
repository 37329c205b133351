use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

/// Runs `job` on a separate thread so the caller is never blocked by it.
///
/// If the thread can't be spawned, the job runs on the current thread.
pub(crate) fn spawn_detached<F>(name: &str, job: F)
where
    F: FnOnce() + Send + 'static,
{
    let job = Arc::new(Mutex::new(Some(job)));

    let spawned = thread::Builder::new().name(name.to_string()).spawn({
        let job = job.clone();
        move || {
            if let Some(job) = lock(&job).take() {
                job()
            }
        }
    });

    if let Err(err) = spawned {
        log::warn!("can't spawn `{name}` thread, running inline: {err}");
        let job = lock(&job).take();
        if let Some(job) = job {
            job()
        }
    }
}

/// Locks a mutex, recovering the guard if another thread panicked while holding it.
///
/// Guarded state in this crate is always left consistent before any user code runs.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn detached_job_runs_on_another_thread() {
        let (tx, rx) = mpsc::channel();
        let caller = thread::current().id();

        spawn_detached("test-job", move || {
            tx.send(thread::current().id()).unwrap();
        });

        let worker = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_ne!(worker, caller);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let mutex = Arc::new(Mutex::new(1));

        let poisoner = mutex.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(mutex.is_poisoned());
        *lock(&mutex) += 1;
        assert_eq!(*lock(&mutex), 2);
    }
}
