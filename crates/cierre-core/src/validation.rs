//! # Validation Module
//!
//! Checks on caller input, run before any store is touched.
//!
//! ## Where It Runs
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: CLI argument parsing (clap)                                  │
//! │  └── Types only: strings, integers                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: ClosingEngine entry points                                   │
//! │  └── THIS MODULE: date keys, courier ids, admin ids, amounts           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── PRIMARY KEY (date_key), (courier_id, date_key)                    │
//! │  ├── CHECK (stock_quantity >= 0)                                       │
//! │  └── Append-only triggers on audit_log                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use cierre_core::validation::{validate_date_key, validate_admin};
//!
//! let key = validate_date_key("2024-06-01").unwrap();
//! assert_eq!(key.to_string(), "2024-06-01");
//! assert!(validate_admin("  ").is_err());
//! ```

use crate::error::ValidationError;
use crate::types::DateKey;
use crate::UNASSIGNED_COURIER;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted identifier (email addresses top out at 254).
pub const MAX_IDENTIFIER_LEN: usize = 254;

// =============================================================================
// Identifier Validators
// =============================================================================

/// Parses and validates a `yyyy-mm-dd` date key.
pub fn validate_date_key(value: &str) -> ValidationResult<DateKey> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "date_key".to_string(),
        });
    }

    DateKey::parse(value).map_err(|_| ValidationError::InvalidFormat {
        field: "date_key".to_string(),
        reason: format!("'{}' is not a yyyy-mm-dd date", value.trim()),
    })
}

/// Validates a courier id and returns it trimmed.
///
/// ## Rules
/// - Must not be empty
/// - At most 254 characters
/// - Must not be the `"unassigned"` grouping key
pub fn validate_courier(courier: &str) -> ValidationResult<String> {
    let courier = required_identifier("courier", courier)?;

    if courier == UNASSIGNED_COURIER {
        return Err(ValidationError::InvalidFormat {
            field: "courier".to_string(),
            reason: format!("'{}' is reserved for orders without a courier", UNASSIGNED_COURIER),
        });
    }

    Ok(courier)
}

/// Validates the acting admin of a reversal and returns it trimmed.
pub fn validate_admin(admin: &str) -> ValidationResult<String> {
    required_identifier("acting_admin", admin)
}

fn required_identifier(field: &str, value: &str) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_IDENTIFIER_LEN,
        });
    }

    Ok(value.to_string())
}

/// Validates a catalog product name.
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Stock levels and thresholds are never negative.
pub fn validate_stock(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// A courier's extra expense (fuel, tolls). Zero is fine.
pub fn validate_expense(units: i64) -> ValidationResult<()> {
    validate_stock("extra_expense", units)
}

/// Surcharge rate in basis points: 0% to 100%.
pub fn validate_surcharge_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "surcharge_bps".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Business-day offset from UTC, strictly within a day.
pub fn validate_utc_offset(minutes: i32) -> ValidationResult<()> {
    if minutes.unsigned_abs() >= 24 * 60 {
        return Err(ValidationError::OutOfRange {
            field: "utc_offset_minutes".to_string(),
            min: -1439,
            max: 1439,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_date_key() {
        assert!(validate_date_key("2024-06-01").is_ok());
        assert!(validate_date_key(" 2024-06-01 ").is_ok());

        assert!(matches!(
            validate_date_key(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_date_key("2024-6-1x"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_validate_courier() {
        assert_eq!(validate_courier(" r1@mail.com ").unwrap(), "r1@mail.com");
        assert!(validate_courier("").is_err());
        assert!(validate_courier(UNASSIGNED_COURIER).is_err());
        assert!(validate_courier(&"a".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_admin() {
        assert_eq!(validate_admin("admin@mail.com").unwrap(), "admin@mail.com");
        assert!(validate_admin("   ").is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("LATEX BLANCO 20L").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_numeric_validators() {
        assert!(validate_stock("stock_quantity", 0).is_ok());
        assert!(validate_stock("stock_quantity", -1).is_err());
        assert!(validate_expense(500).is_ok());
        assert!(validate_expense(-500).is_err());

        assert!(validate_surcharge_bps(1000).is_ok());
        assert!(validate_surcharge_bps(10001).is_err());

        assert!(validate_utc_offset(-180).is_ok());
        assert!(validate_utc_offset(1439).is_ok());
        assert!(validate_utc_offset(-1440).is_err());
    }
}
