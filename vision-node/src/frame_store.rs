use std::sync::{Arc, RwLock};

/// One encoded frame as published by the capture loop.
#[derive(Debug)]
pub struct StoredFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub captured_at_ms: u64,
}

/// Single-slot holder for the most recently captured frame.
///
/// One writer (the capture loop) replaces the whole `Arc` under the lock;
/// readers clone it out. A reader therefore always sees a complete frame,
/// either the previous one or the new one.
#[derive(Clone)]
pub struct FrameStore {
    identity: Arc<str>,
    slot: Arc<RwLock<Option<Arc<StoredFrame>>>>,
}

impl FrameStore {
    /// `identity` is the stable public name of the slot (the artifact
    /// path), recorded as the image source for detections served from it.
    pub fn new(identity: impl Into<Arc<str>>) -> Self {
        Self {
            identity: identity.into(),
            slot: Arc::new(RwLock::new(None)),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Replace the slot contents. Returns the shared handle so the caller
    /// can keep using the frame without re-reading the slot.
    pub fn publish(&self, frame: StoredFrame) -> Arc<StoredFrame> {
        let frame = Arc::new(frame);
        let mut slot = match self.slot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(frame.clone());
        frame
    }

    pub fn latest(&self) -> Option<Arc<StoredFrame>> {
        let slot = match self.slot.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    fn frame_of(byte: u8) -> StoredFrame {
        StoredFrame {
            jpeg: vec![byte; 4096],
            width: byte as u32,
            height: byte as u32,
            sequence: byte as u64,
            captured_at_ms: 0,
        }
    }

    #[test]
    fn starts_empty_and_returns_latest() {
        let store = FrameStore::new("images/latest.jpg");
        assert!(store.latest().is_none());

        store.publish(frame_of(1));
        store.publish(frame_of(2));
        let latest = store.latest().expect("frame");
        assert_eq!(latest.sequence, 2);
        assert_eq!(store.identity(), "images/latest.jpg");
    }

    #[test]
    fn concurrent_readers_never_observe_a_torn_frame() {
        let store = FrameStore::new("images/latest.jpg");
        store.publish(frame_of(0));
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let store = store.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut k: u8 = 0;
                while !stop.load(Ordering::Relaxed) {
                    store.publish(frame_of(k));
                    k = k.wrapping_add(1);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let frame = store.latest().expect("published");
                        let first = frame.jpeg[0];
                        assert!(frame.jpeg.iter().all(|b| *b == first));
                        assert_eq!(frame.width, first as u32);
                        assert_eq!(frame.sequence, first as u64);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(100));
        stop.store(true, Ordering::Relaxed);
        writer.join().expect("writer");
        for reader in readers {
            reader.join().expect("reader");
        }
    }
}
