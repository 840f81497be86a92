//! API request models for the book routes
//!
//! Create and update both carry the same field set, either as a JSON body
//! or as a `book` JSON field inside a multipart form. The frontend sends
//! `year` as a number or a numeric string, so it is coerced here.

use crate::core::error::{ApiError, Result};
use serde::Deserialize;

/// Incoming book fields, before validation
#[derive(Debug, Default, Deserialize)]
pub struct BookPayload {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<serde_json::Value>,
    pub genre: Option<String>,
}

/// Book fields after validation and trimming
#[derive(Debug)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub year: i64,
    pub genre: String,
}

impl BookPayload {
    /// Parse a JSON request body, unwrapping the `{"book": "<json>"}` shape
    /// some clients send
    pub fn from_json_body(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|_| ApiError::Validation("Invalid request body".to_string()))?;

        let source = match value.get("book") {
            Some(serde_json::Value::String(inner)) => serde_json::from_str(inner)
                .map_err(|_| ApiError::Validation("Invalid book payload".to_string()))?,
            _ => value,
        };

        serde_json::from_value(source)
            .map_err(|_| ApiError::Validation("Invalid book payload".to_string()))
    }

    /// Parse the `book` JSON field of a multipart form
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|_| ApiError::Validation("Invalid book payload".to_string()))
    }

    /// Validate required fields; missing or non-numeric input is rejected
    pub fn validated(&self) -> Result<BookFields> {
        let missing = || {
            ApiError::Validation("title, author, year and genre are required".to_string())
        };

        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(missing)?;
        let author = self
            .author
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(missing)?;
        let genre = self
            .genre
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(missing)?;
        let year = self
            .year
            .as_ref()
            .and_then(parse_year)
            .ok_or_else(missing)?;

        Ok(BookFields {
            title: title.to_string(),
            author: author.to_string(),
            year,
            genre: genre.to_string(),
        })
    }
}

/// Coerce a JSON number or numeric string into a year
fn parse_year(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(y) = n.as_i64() {
                Some(y)
            } else {
                // Whole-valued floats are accepted
                n.as_f64()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            }
        }
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Rating request body; `rating` is accepted as a legacy alias
#[derive(Debug, Deserialize)]
pub struct RateRequest {
    #[serde(alias = "rating")]
    pub grade: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_accepts_numeric_string_year() {
        let payload: BookPayload = serde_json::from_str(
            r#"{"title": "Dune", "author": "Frank Herbert", "year": "1965", "genre": "sci-fi"}"#,
        )
        .unwrap();
        let fields = payload.validated().unwrap();
        assert_eq!(fields.year, 1965);
        assert_eq!(fields.title, "Dune");
    }

    #[test]
    fn test_validated_trims_fields() {
        let payload: BookPayload = serde_json::from_str(
            r#"{"title": "  Dune ", "author": " Frank Herbert", "year": 1965, "genre": "sci-fi "}"#,
        )
        .unwrap();
        let fields = payload.validated().unwrap();
        assert_eq!(fields.title, "Dune");
        assert_eq!(fields.genre, "sci-fi");
    }

    #[test]
    fn test_validated_rejects_missing_genre() {
        let payload: BookPayload = serde_json::from_str(
            r#"{"title": "Dune", "author": "Frank Herbert", "year": 1965}"#,
        )
        .unwrap();
        assert!(payload.validated().is_err());
    }

    #[test]
    fn test_validated_rejects_non_numeric_year() {
        let payload: BookPayload = serde_json::from_str(
            r#"{"title": "Dune", "author": "F.H.", "year": "nineteen", "genre": "sci-fi"}"#,
        )
        .unwrap();
        assert!(payload.validated().is_err());
    }

    #[test]
    fn test_from_json_body_unwraps_book_field() {
        let body = r#"{"book": "{\"title\": \"Dune\", \"author\": \"F.H.\", \"year\": 1965, \"genre\": \"sci-fi\"}"}"#;
        let payload = BookPayload::from_json_body(body.as_bytes()).unwrap();
        assert_eq!(payload.title.as_deref(), Some("Dune"));
    }

    #[test]
    fn test_from_json_body_plain() {
        let body = r#"{"title": "Dune", "author": "F.H.", "year": 1965, "genre": "sci-fi"}"#;
        let payload = BookPayload::from_json_body(body.as_bytes()).unwrap();
        assert_eq!(payload.author.as_deref(), Some("F.H."));
    }

    #[test]
    fn test_rate_request_accepts_rating_alias() {
        let req: RateRequest = serde_json::from_str(r#"{"rating": 4.5}"#).unwrap();
        assert_eq!(req.grade, Some(4.5));

        let req: RateRequest = serde_json::from_str(r#"{"grade": 3}"#).unwrap();
        assert_eq!(req.grade, Some(3.0));
    }
}
