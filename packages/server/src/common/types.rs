// Common types used across multiple domains and layers

use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{ServiceError, ServiceResult};

lazy_static! {
    /// Company-issued numbers: 11 ASCII digits, leading 1. `\d` would also
    /// take fullwidth and other Unicode digits.
    static ref PHONE_PATTERN: Regex = Regex::new(r"^1[0-9]{10}$").expect("phone pattern is valid");
}

/// Trims and validates a phone number, returning the canonical form.
pub fn normalize_phone(raw: &str) -> ServiceResult<String> {
    let phone = raw.trim();
    if PHONE_PATTERN.is_match(phone) {
        Ok(phone.to_string())
    } else {
        Err(ServiceError::validation(format!(
            "phone number '{}' must be 11 digits starting with 1",
            phone
        )))
    }
}

/// Current UTC calendar date.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Trims an optional free-text field, mapping blank input to `None`.
pub fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Limit/offset paging request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of results plus the total row count for the filter.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_accepts_canonical_numbers() {
        assert_eq!(normalize_phone("13800138000").unwrap(), "13800138000");
        assert_eq!(normalize_phone("  13800138000 ").unwrap(), "13800138000");
    }

    #[test]
    fn test_phone_rejects_bad_shapes() {
        for bad in [
            "",
            "23800138000",
            "1380013800",
            "138001380001",
            "1380013800a",
            "+8613800138000",
            "1３８００１３８０００",
            "1٣٨٠٠١٣٨٠٠٠",
        ] {
            assert!(
                matches!(normalize_phone(bad), Err(ServiceError::Validation(_))),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text(Some("  sales line ".into())), Some("sales line".into()));
        assert_eq!(clean_text(Some("   ".into())), None);
        assert_eq!(clean_text(None), None);
    }

    #[test]
    fn test_page_request_clamps() {
        let page = PageRequest { limit: Some(10_000), offset: Some(-5) };
        assert_eq!(page.limit(), PageRequest::MAX_LIMIT);
        assert_eq!(page.offset(), 0);

        let default = PageRequest { limit: None, offset: None };
        assert_eq!(default.limit(), PageRequest::DEFAULT_LIMIT);
    }
}
