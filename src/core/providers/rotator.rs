use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered credentials for one provider with a cursor that survives between
/// calls, so a dead key costs one attempt per call instead of always going
/// first.
#[derive(Debug, Default)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }

    /// The key at the cursor, with its index.
    pub fn current(&self) -> Option<(usize, &str)> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.cursor() % self.keys.len();
        Some((index, self.keys[index].as_str()))
    }

    /// Moves the cursor to the next key, wrapping around.
    pub fn advance(&self) {
        let len = self.keys.len();
        if len == 0 {
            return;
        }
        // fetch_update only fails when the closure returns None.
        let _ = self
            .cursor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cursor| {
                Some((cursor + 1) % len)
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_wraps_to_start() {
        let rotator = KeyRotator::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(rotator.current(), Some((0, "a")));
        rotator.advance();
        assert_eq!(rotator.current(), Some((1, "b")));
        rotator.advance();
        rotator.advance();
        assert_eq!(rotator.current(), Some((0, "a")));
    }

    #[test]
    fn empty_rotator_has_no_current_key() {
        let rotator = KeyRotator::new(Vec::new());
        rotator.advance();
        assert!(rotator.is_empty());
        assert_eq!(rotator.current(), None);
        assert_eq!(rotator.cursor(), 0);
    }
}
