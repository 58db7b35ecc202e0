use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("payload serialization failed for {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Bookkeeping state stays usable after a poisoned lock; the fault is logged
/// once per recovery instead of propagating to the caller.
pub fn lock_or_recover<'a, T>(
    mutex: &'a std::sync::Mutex<T>,
    name: &'static str,
) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::error!(error = %CacheError::LockPoisoned(name), "recovering poisoned lock");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn recovers_poisoned_mutex() {
        let shared = Arc::new(Mutex::new(5u32));
        let clone = Arc::clone(&shared);
        let _ = std::thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("poison it");
        })
        .join();

        assert!(shared.is_poisoned());
        let mut guard = lock_or_recover(&shared, "test");
        *guard += 1;
        assert_eq!(*guard, 6);
    }

    #[test]
    fn error_messages() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CacheError::Serialization {
            key: "quote:2330".into(),
            source,
        };
        assert!(err
            .to_string()
            .starts_with("payload serialization failed for quote:2330:"));
        assert_eq!(
            CacheError::LockPoisoned("cache store").to_string(),
            "lock poisoned: cache store"
        );
    }
}
