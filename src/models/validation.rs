use super::{ValidationError, ValidationResult};

/// Upper bound on identifier length, well under the DynamoDB key limit
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier (user, event or booking id)
pub fn validate_identifier(field: &str, value: &str) -> ValidationResult<()> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::RequiredField {
            field: field.to_string(),
        });
    }

    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max_length: MAX_IDENTIFIER_LENGTH,
            actual_length: trimmed.len(),
        });
    }

    Ok(())
}

/// Validate a requested ticket quantity (must be positive)
pub fn validate_ticket_quantity(quantity: u32) -> ValidationResult<()> {
    if quantity == 0 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: "1".to_string(),
            max: u32::MAX.to_string(),
            value: quantity.to_string(),
        });
    }
    Ok(())
}
