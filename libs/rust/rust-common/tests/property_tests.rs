//! Property-based tests for rust-common crate.
//!
//! These tests verify universal properties across all inputs using proptest.

use proptest::prelude::*;
use rust_common::{HttpConfig, PlatformError};
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_internal_error_keeps_message(msg in "[a-zA-Z0-9 ]{1,50}") {
        let err = PlatformError::internal(msg.clone());
        prop_assert_eq!(err.to_string(), format!("Internal error: {msg}"));
    }

    #[test]
    fn prop_connect_timeout_never_exceeds_request_timeout(secs in 1u64..120) {
        let config = HttpConfig::default().with_timeout(Duration::from_secs(secs));
        prop_assert!(config.connect_timeout <= config.timeout);
        prop_assert_eq!(config.timeout, Duration::from_secs(secs));
    }

    #[test]
    fn prop_without_redirects_is_independent_of_timeout(secs in 1u64..120) {
        let config = HttpConfig::default()
            .with_timeout(Duration::from_secs(secs))
            .without_redirects();
        prop_assert_eq!(config.max_redirects, 0);
        prop_assert_eq!(config.timeout, Duration::from_secs(secs));
    }
}
