use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, OnceLock,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

/// Process-wide slot for the detection model. The load outcome is published
/// exactly once; readers see either nothing or the fully built model.
#[derive(Debug)]
pub struct ModelHandle<M> {
    loading: AtomicBool,
    outcome: OnceLock<Result<Arc<M>, String>>,
}

impl<M> Default for ModelHandle<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelHandle<M> {
    pub fn new() -> Self {
        Self {
            loading: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    pub fn ready(model: M) -> Self {
        let handle = Self::new();
        handle.publish(Ok(model));
        handle
    }

    pub fn begin_loading(&self) {
        self.loading.store(true, Ordering::Release);
    }

    /// Returns false if an outcome was already published.
    pub fn publish(&self, outcome: Result<M, String>) -> bool {
        let published = self.outcome.set(outcome.map(Arc::new)).is_ok();
        self.loading.store(false, Ordering::Release);
        published
    }

    pub fn get(&self) -> Option<Arc<M>> {
        match self.outcome.get() {
            Some(Ok(model)) => Some(model.clone()),
            _ => None,
        }
    }

    pub fn readiness(&self) -> Readiness {
        match self.outcome.get() {
            Some(Ok(_)) => Readiness::Ready,
            Some(Err(reason)) => Readiness::Failed(reason.clone()),
            None if self.loading.load(Ordering::Acquire) => Readiness::Loading,
            None => Readiness::NotLoaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successful_load() {
        let handle = ModelHandle::<u32>::new();
        assert_eq!(handle.readiness(), Readiness::NotLoaded);
        assert!(handle.get().is_none());

        handle.begin_loading();
        assert_eq!(handle.readiness(), Readiness::Loading);
        assert!(handle.get().is_none());

        assert!(handle.publish(Ok(7)));
        assert_eq!(handle.readiness(), Readiness::Ready);
        assert_eq!(*handle.get().unwrap(), 7);
    }

    #[test]
    fn test_failed_load() {
        let handle = ModelHandle::<u32>::new();
        handle.begin_loading();
        handle.publish(Err("weights missing".to_string()));

        assert_eq!(
            handle.readiness(),
            Readiness::Failed("weights missing".to_string())
        );
        assert!(handle.get().is_none());
    }

    #[test]
    fn test_publish_once() {
        let handle = ModelHandle::ready(1u32);

        assert!(!handle.publish(Ok(2)));
        assert!(!handle.publish(Err("late failure".to_string())));
        assert_eq!(*handle.get().unwrap(), 1);
        assert_eq!(handle.readiness(), Readiness::Ready);
    }

    #[test]
    fn test_concurrent_readers_see_published_model() {
        let handle = Arc::new(ModelHandle::<String>::new());
        handle.begin_loading();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || loop {
                    if let Some(model) = handle.get() {
                        return model.len();
                    }
                    std::thread::yield_now();
                })
            })
            .collect();

        handle.publish(Ok("yolov8n".to_string()));

        for reader in readers {
            assert_eq!(reader.join().unwrap(), 7);
        }
    }
}
