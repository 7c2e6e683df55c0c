//! Post-merge configuration validation.
//!
//! Checks that deserialized [`Config`](crate::Config) values are within
//! acceptable ranges and that cross-field invariants hold.

use std::net::SocketAddr;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{Config, StorageBackend};

/// Longest table name accepted. Keys embed it, and the storage layer caps
/// namespaces.
const MAX_TABLE_NAME_LEN: usize = 64;

/// Validate a fully merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_storage(config)?;
    validate_approval(config)?;
    validate_sessions(config)?;
    validate_engine(config)?;
    validate_gateway(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_storage(config: &Config) -> ConfigResult<()> {
    let s = &config.storage;

    if s.table_name.is_empty() || s.table_name.len() > MAX_TABLE_NAME_LEN {
        return Err(invalid(
            "storage.table_name",
            format!("table name must be 1 to {MAX_TABLE_NAME_LEN} characters"),
        ));
    }
    if let Some(bad) = s
        .table_name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(invalid(
            "storage.table_name",
            format!("invalid character '{bad}'; use letters, digits, '-', '_' or '.'"),
        ));
    }

    if s.backend == StorageBackend::Surrealkv && s.path.as_deref().is_none_or(str::is_empty) {
        return Err(invalid(
            "storage.path",
            "the surrealkv backend requires a storage path",
        ));
    }

    Ok(())
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    if config
        .approval
        .sensitive_actions
        .iter()
        .any(|a| a.trim().is_empty())
    {
        return Err(invalid(
            "approval.sensitive_actions",
            "action names must not be blank",
        ));
    }
    Ok(())
}

fn validate_sessions(config: &Config) -> ConfigResult<()> {
    let s = &config.sessions;
    if s.abandon_after_secs == Some(0) {
        return Err(invalid(
            "sessions.abandon_after_secs",
            "must be positive; leave unset to wait indefinitely",
        ));
    }
    if s.reap_interval_secs == 0 {
        return Err(invalid("sessions.reap_interval_secs", "must be positive"));
    }
    Ok(())
}

fn validate_engine(config: &Config) -> ConfigResult<()> {
    let policy = config.engine.rejection_policy.to_ascii_lowercase();
    if !matches!(policy.as_str(), "skip" | "abort") {
        return Err(invalid(
            "engine.rejection_policy",
            format!(
                "unknown policy '{}'; expected one of: skip, abort",
                config.engine.rejection_policy
            ),
        ));
    }
    Ok(())
}

fn validate_gateway(config: &Config) -> ConfigResult<()> {
    config
        .gateway
        .bind
        .parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|e| invalid("gateway.bind", format!("'{}': {e}", config.gateway.bind)))
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;
    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unknown level '{}'; expected one of: trace, debug, info, warn, error",
                l.level
            ),
        ));
    }
    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(invalid(
            "logging.format",
            format!(
                "unknown format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(result: ConfigResult<()>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_table_name_rules() {
        let mut config = Config::default();
        config.storage.table_name = String::new();
        assert_eq!(field_of(validate(&config)), "storage.table_name");

        config.storage.table_name = "a/b".to_owned();
        assert_eq!(field_of(validate(&config)), "storage.table_name");

        config.storage.table_name = "prod_hitl-2".to_owned();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_surrealkv_needs_path() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Surrealkv;
        assert_eq!(field_of(validate(&config)), "storage.path");

        config.storage.path = Some("/tmp/ledger".to_owned());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let mut config = Config::default();
        config.sessions.abandon_after_secs = Some(0);
        assert_eq!(field_of(validate(&config)), "sessions.abandon_after_secs");

        config.sessions.abandon_after_secs = Some(60);
        config.sessions.reap_interval_secs = 0;
        assert_eq!(field_of(validate(&config)), "sessions.reap_interval_secs");
    }

    #[test]
    fn test_enum_like_fields() {
        let mut config = Config::default();
        config.engine.rejection_policy = "Abort".to_owned();
        assert!(validate(&config).is_ok());

        config.logging.format = "xml".to_owned();
        assert_eq!(field_of(validate(&config)), "logging.format");

        config.logging.format = "json".to_owned();
        config.gateway.bind = "localhost".to_owned();
        assert_eq!(field_of(validate(&config)), "gateway.bind");
    }
}
