// Input trimming and validation helpers

/// Trim a field and reject empty values when required
pub fn trim_and_validate_field(value: &str, required: bool) -> Result<String, String> {
    let trimmed = value.trim();

    if required && trimmed.is_empty() {
        return Err("Field cannot be empty".to_string());
    }

    Ok(trimmed.to_string())
}

/// Trim an optional field, collapsing empty values to None
pub fn trim_optional_field(value: Option<&String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_validate_field() {
        assert_eq!(trim_and_validate_field("  hello  ", true).unwrap(), "hello");
        assert!(trim_and_validate_field("   ", true).is_err());
        assert_eq!(trim_and_validate_field("   ", false).unwrap(), "");
    }

    #[test]
    fn test_trim_optional_field() {
        assert_eq!(
            trim_optional_field(Some(&"  hi  ".to_string())),
            Some("hi".to_string())
        );
        assert_eq!(trim_optional_field(Some(&"   ".to_string())), None);
        assert_eq!(trim_optional_field(None), None);
    }
}
