//! Payment References
//!
//! Every checkout attempt gets a fresh reference of the form
//! `CAUSEHIVE_<unix-millis>_<6 uppercase alphanumerics>`. The millisecond
//! part never goes backwards, so only suffixes issued in the current
//! millisecond need remembering to never hand out the same value twice.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

const DEFAULT_PREFIX: &str = "CAUSEHIVE";
const SUFFIX_LEN: usize = 6;

/// Session-scoped reference generator
pub struct ReferenceGenerator {
    prefix: String,
    current: Mutex<Millisecond>,
}

/// Suffixes handed out within one millisecond
#[derive(Default)]
struct Millisecond {
    millis: i64,
    suffixes: HashSet<String>,
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            current: Mutex::new(Millisecond::default()),
        }
    }

    /// Issue a reference that has not been issued before
    pub fn next_reference(&self) -> String {
        let mut current = self.current.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        // A wall clock stepping back keeps the last millisecond
        let now = Utc::now().timestamp_millis();
        if now > current.millis {
            current.millis = now;
            current.suffixes.clear();
        }

        loop {
            let suffix = random_suffix();
            if current.suffixes.insert(suffix.clone()) {
                return format!("{}_{}_{}", self.prefix, current.millis, suffix);
            }
            tracing::debug!(millis = current.millis, suffix = %suffix, "Reference collision, regenerating");
        }
    }

    /// Suffixes remembered for the current millisecond
    pub fn remembered(&self) -> usize {
        self.current.lock().map(|current| current.suffixes.len()).unwrap_or(0)
    }
}

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let generator = ReferenceGenerator::new();
        let reference = generator.next_reference();

        let parts: Vec<&str> = reference.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CAUSEHIVE");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_references_never_repeat() {
        let generator = ReferenceGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..500 {
            assert!(seen.insert(generator.next_reference()));
        }
    }

    #[test]
    fn test_memory_bounded_to_current_millisecond() {
        let generator = ReferenceGenerator::new();
        for _ in 0..50 {
            generator.next_reference();
        }
        assert!(generator.remembered() <= 50);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let reference = generator.next_reference();
        assert_eq!(generator.remembered(), 1);
        assert!(reference.starts_with("CAUSEHIVE_"));
    }
}
