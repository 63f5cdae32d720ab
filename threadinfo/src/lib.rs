/// threadinfo is a library to retrieve OS threads and related information. Currently it provides:
/// - The threads of an arbitrary process, by id.
/// - The current thread.
/// threadinfo explicitly deals with OS threads, even if such threads may be programmed against
/// using an abstraction like pthreads. This is because the functionality it provides/intends to
/// provide, uses OS APIs that rely on those details. On Linux these are tasks.

#[macro_use]
extern crate log;

#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::*;

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::{current_thread, threads_in, threads_of, Thread};
    use std::collections::HashSet;
    use std::fs;
    use std::sync::{Arc, Barrier, Mutex};

    #[test]
    fn current_thread_test() {
        current_thread().expect("thread");
    }

    #[test]
    fn own_process_lists_current_thread() {
        let curr = current_thread().expect("current thread");
        let threads = threads_of(std::process::id() as i32).expect("threads");
        assert!(threads.contains(&curr));
    }

    #[test]
    fn own_process_lists_multiple_threads() {
        let mut threads = Vec::with_capacity(10);
        let ids = Arc::new(Mutex::new(HashSet::new()));
        let ids_barrier = Arc::new(Barrier::new(threads.capacity() + 1));
        let terminate_barrier = Arc::new(Barrier::new(threads.capacity() + 1));
        for _i in 0..threads.capacity() {
            let ids2 = ids.clone();
            let ids_barrier2 = ids_barrier.clone();
            let terminate_barrier2 = terminate_barrier.clone();
            threads.push(std::thread::spawn(move || {
                ids2.lock().unwrap().insert(current_thread().unwrap());
                ids_barrier2.wait();
                terminate_barrier2.wait();
            }));
        }

        ids_barrier.wait();

        let its: HashSet<_> = threads_of(std::process::id() as i32)
            .unwrap()
            .into_iter()
            .collect();
        assert!(its.len() >= threads.capacity() + 1);
        assert!(its.is_superset(&ids.lock().unwrap()));

        terminate_barrier.wait();
        for thread in threads {
            thread.join().unwrap();
        }
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("101")).unwrap();
        fs::create_dir(dir.path().join("102")).unwrap();
        fs::create_dir(dir.path().join("garbage")).unwrap();
        fs::create_dir(dir.path().join("0")).unwrap();
        fs::create_dir(dir.path().join("-7")).unwrap();

        let mut threads = threads_in(dir.path()).unwrap();
        threads.sort_by_key(|t| t.as_raw());
        assert_eq!(threads, vec![Thread::from_raw(101), Thread::from_raw(102)]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(threads_in(&dir.path().join("task")).is_err());
    }

    #[test]
    fn exited_process_is_an_error() {
        // pid_max on Linux never exceeds 2^22.
        assert!(threads_of(1 << 23).is_err());
    }
}
