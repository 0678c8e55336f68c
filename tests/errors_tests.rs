use std::error::Error;
use visitor_counter::errors::{CounterError, Result};

#[cfg(test)]
mod error_creation_tests {
    use super::*;

    #[test]
    fn test_storage_unavailable_error() {
        let error = CounterError::storage_unavailable("connection refused");

        assert!(matches!(error, CounterError::StorageUnavailable(_)));
        assert_eq!(error.code(), "E001");
        assert!(error.to_string().contains("Storage Unavailable"));
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_malformed_state_error() {
        let error = CounterError::malformed_state("stored count is negative: -1");

        assert!(matches!(error, CounterError::MalformedState(_)));
        assert_eq!(error.code(), "E002");
        assert!(error.to_string().contains("Malformed State"));
    }

    #[test]
    fn test_not_initialized_error() {
        let error = CounterError::not_initialized("counter row is missing");

        assert!(matches!(error, CounterError::NotInitialized(_)));
        assert_eq!(error.code(), "E003");
        assert_eq!(error.message(), "counter row is missing");
    }

    #[test]
    fn test_external_lookup_error() {
        let error = CounterError::external_lookup("timed out");

        assert!(matches!(error, CounterError::ExternalLookup(_)));
        assert_eq!(error.code(), "E004");
    }

    #[test]
    fn test_configuration_and_serialization_errors() {
        assert_eq!(CounterError::configuration("x").code(), "E005");
        assert_eq!(CounterError::serialization("x").code(), "E006");
    }
}

#[cfg(test)]
mod error_format_tests {
    use super::*;

    #[test]
    fn test_format_simple() {
        let error = CounterError::not_initialized("run init first");
        assert_eq!(
            error.format_simple(),
            "Counter Not Initialized: run init first"
        );
        assert_eq!(error.to_string(), error.format_simple());
    }

    #[test]
    fn test_format_colored_contains_code() {
        let error = CounterError::storage_unavailable("disk full");
        let colored = error.format_colored();

        assert!(colored.contains("E001"));
        assert!(colored.contains("disk full"));
    }

    #[test]
    fn test_error_trait() {
        let error = CounterError::storage_unavailable("x");
        assert!(error.source().is_none());
    }
}

#[cfg(test)]
mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let error: CounterError = io.into();

        assert!(matches!(error, CounterError::StorageUnavailable(_)));
        assert!(error.message().contains("read-only fs"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let error: CounterError = json_err.into();

        assert!(matches!(error, CounterError::Serialization(_)));
    }

    #[test]
    fn test_from_db_error() {
        let db_err = sea_orm::DbErr::Custom("database is locked".to_string());
        let error: CounterError = db_err.into();

        assert!(matches!(error, CounterError::StorageUnavailable(_)));
        assert!(error.message().contains("database is locked"));
    }

    #[test]
    fn test_question_mark_propagation() {
        fn read() -> Result<u64> {
            let value: serde_json::Value = serde_json::from_str("[]")?;
            value
                .as_u64()
                .ok_or_else(|| CounterError::malformed_state("not a number"))
        }

        assert!(matches!(read(), Err(CounterError::MalformedState(_))));
    }
}
