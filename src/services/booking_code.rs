use rand::Rng;
use std::future::Future;
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::error::BookingError;

pub const CODE_PREFIX: &str = "BK";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

type CodeSource = Box<dyn FnMut() -> u32 + Send>;

/// Produces `BK` + 6 digit booking references, unique against existing
/// bookings.
pub struct BookingCodeGenerator {
    source: Mutex<CodeSource>,
    max_attempts: u32,
}

impl BookingCodeGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self::with_source(max_attempts, || rand::thread_rng().gen_range(0..1_000_000))
    }

    /// Custom suffix source; values are reduced modulo 1 000 000.
    pub fn with_source(max_attempts: u32, source: impl FnMut() -> u32 + Send + 'static) -> Self {
        Self {
            source: Mutex::new(Box::new(source)),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn candidate(&self) -> String {
        let mut source = self.source.lock().unwrap_or_else(|e| e.into_inner());
        format_code((*source)())
    }

    /// Draws candidates until `is_taken` reports a free one.
    pub async fn generate<F, Fut>(&self, mut is_taken: F) -> Result<String, BookingError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, BookingError>>,
    {
        for attempt in 1..=self.max_attempts {
            let code = self.candidate();
            if !is_taken(code.clone()).await? {
                debug!("Generated booking code {} on attempt {}", code, attempt);
                return Ok(code);
            }
            warn!("Booking code {} already taken (attempt {})", code, attempt);
        }
        Err(BookingError::CodeGenerationExhausted { attempts: self.max_attempts })
    }
}

impl Default for BookingCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

fn format_code(value: u32) -> String {
    format!("{}{:06}", CODE_PREFIX, value % 1_000_000)
}

/// `BK` followed by exactly six ASCII digits.
pub fn is_valid_code(code: &str) -> bool {
    code.strip_prefix(CODE_PREFIX)
        .is_some_and(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_format() {
        assert_eq!(format_code(42), "BK000042");
        assert_eq!(format_code(1_234_567), "BK234567");
        assert!(is_valid_code("BK000042"));
        assert!(!is_valid_code("BK42"));
        assert!(!is_valid_code("XX000042"));
    }

    #[test]
    fn test_random_candidates_are_well_formed() {
        let gen = BookingCodeGenerator::default();
        for _ in 0..100 {
            assert!(is_valid_code(&gen.candidate()));
        }
    }

    #[tokio::test]
    async fn test_retries_on_collision() {
        let mut values = vec![1, 1, 2].into_iter();
        let gen = BookingCodeGenerator::with_source(5, move || values.next().unwrap_or(9));
        let existing: HashSet<String> = ["BK000001".to_string()].into_iter().collect();

        let code = gen
            .generate(|c| {
                let taken = existing.contains(&c);
                async move { Ok(taken) }
            })
            .await
            .unwrap();
        assert_eq!(code, "BK000002");
    }

    #[tokio::test]
    async fn test_exhausted_after_max_attempts() {
        let gen = BookingCodeGenerator::with_source(5, || 7);
        let mut calls = 0;
        let err = gen
            .generate(|_| {
                calls += 1;
                async { Ok(true) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::CodeGenerationExhausted { attempts: 5 }));
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn test_probe_errors_propagate() {
        let gen = BookingCodeGenerator::default();
        let err = gen
            .generate(|_| async { Err(BookingError::Internal("probe failed".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Internal(_)));
    }
}
