//! Validation utilities for configuration and CLI values

/// Validate that a string value is non-empty after trimming
pub fn validate_non_empty(value: &str, what: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", what))
    } else {
        Ok(())
    }
}

/// Validate that an endpoint template carries both substitution placeholders
pub fn validate_endpoint_template(endpoint: &str) -> Result<(), String> {
    validate_non_empty(endpoint, "endpoint template")?;

    for placeholder in ["{organization}", "{repository}"] {
        if !endpoint.contains(placeholder) {
            return Err(format!(
                "endpoint template '{}' is missing the {} placeholder",
                endpoint, placeholder
            ));
        }
    }
    Ok(())
}

/// Validate positive integer value
pub fn validate_positive_int(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("Value must be greater than 0".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid positive integer", value)),
    }
}
