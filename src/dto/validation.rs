//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::dao::models::is_iso_date;

/// Highest stroke count a single hole may record: four clubs capped at 20 each.
pub const MAX_HOLE_STROKES: u32 = 80;

/// Validates that a round date is a real calendar day written as `YYYY-MM-DD`.
///
/// # Examples
///
/// ```ignore
/// validate_round_date("2024-01-15") // Ok
/// validate_round_date("2024-02-30") // Err - no such day
/// validate_round_date("15/01/2024") // Err - wrong format
/// ```
pub fn validate_round_date(date: &str) -> Result<(), ValidationError> {
    if is_iso_date(date) {
        return Ok(());
    }

    let mut err = ValidationError::new("round_date_format");
    err.message = Some(format!("date must be written as YYYY-MM-DD (got `{date}`)").into());
    Err(err)
}

/// Validates that every hole total stays within [`MAX_HOLE_STROKES`].
pub fn validate_hole_strokes(holes: &[u32]) -> Result<(), ValidationError> {
    match holes.iter().position(|strokes| *strokes > MAX_HOLE_STROKES) {
        None => Ok(()),
        Some(index) => {
            let mut err = ValidationError::new("hole_strokes_range");
            err.message = Some(
                format!(
                    "hole {} has {} strokes, at most {MAX_HOLE_STROKES} are allowed",
                    index + 1,
                    holes[index]
                )
                .into(),
            );
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_round_date_valid() {
        assert!(validate_round_date("2024-01-15").is_ok());
        assert!(validate_round_date("2024-02-29").is_ok());
    }

    #[test]
    fn test_validate_round_date_invalid() {
        assert!(validate_round_date("2023-02-29").is_err()); // not a leap year
        assert!(validate_round_date("15/01/2024").is_err()); // wrong order
        assert!(validate_round_date("").is_err()); // empty
    }

    #[test]
    fn test_validate_hole_strokes() {
        assert!(validate_hole_strokes(&[4; 18]).is_ok());
        assert!(validate_hole_strokes(&[MAX_HOLE_STROKES; 18]).is_ok());

        let mut holes = [4; 18];
        holes[7] = u32::MAX;
        let err = validate_hole_strokes(&holes).unwrap_err();
        assert_eq!(err.code, "hole_strokes_range");
    }
}
