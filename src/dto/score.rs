//! DTO definitions for recording rounds and reading statistics.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{HOLES, HoleBreakdown, ScoreRoundEntity, Stats},
    dto::validation::{validate_hole_strokes, validate_round_date},
};

/// Club breakdown for one hole.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, Validate, PartialEq, Eq)]
pub struct HoleBreakdownDto {
    #[validate(range(min = 3, max = 6))]
    pub par: u32,
    #[validate(range(max = 20))]
    pub driver: u32,
    #[validate(range(max = 20))]
    pub wood_util: u32,
    #[validate(range(max = 20))]
    pub iron: u32,
    #[validate(range(max = 20))]
    pub putter: u32,
}

impl From<HoleBreakdownDto> for HoleBreakdown {
    fn from(dto: HoleBreakdownDto) -> Self {
        Self {
            par: dto.par,
            driver: dto.driver,
            wood_util: dto.wood_util,
            iron: dto.iron,
            putter: dto.putter,
        }
    }
}

impl From<HoleBreakdown> for HoleBreakdownDto {
    fn from(hole: HoleBreakdown) -> Self {
        Self {
            par: hole.par,
            driver: hole.driver,
            wood_util: hole.wood_util,
            iron: hole.iron,
            putter: hole.putter,
        }
    }
}

/// A round to record for the logged-in user.
///
/// Either `holes` or `breakdown` must be present; with a breakdown, hole totals are derived
/// from it and `holes` must agree when both are sent.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SaveScoreRequest {
    #[validate(length(min = 1, max = 120, message = "course name is required"))]
    pub course_name: String,
    /// `YYYY-MM-DD`; defaults to today.
    #[validate(custom(function = "validate_round_date"))]
    pub date: Option<String>,
    #[validate(
        length(equal = 18, message = "a round has exactly 18 holes"),
        custom(function = "validate_hole_strokes")
    )]
    pub holes: Option<Vec<u32>>,
    #[validate(length(equal = 18, message = "a round has exactly 18 holes"), nested)]
    pub breakdown: Option<Vec<HoleBreakdownDto>>,
}

/// Stored round as returned to clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundResponse {
    pub id: String,
    pub date: String,
    pub username: String,
    pub email: String,
    pub course_name: String,
    pub total_score: u32,
    pub holes: Option<Vec<u32>>,
    pub breakdown: Option<Vec<HoleBreakdownDto>>,
    /// Strokes over par, when a breakdown was recorded.
    pub handicap: Option<u32>,
}

impl From<ScoreRoundEntity> for RoundResponse {
    fn from(round: ScoreRoundEntity) -> Self {
        let handicap = round.handicap();
        Self {
            id: round.id,
            date: round.date,
            username: round.username,
            email: round.email,
            course_name: round.course_name,
            total_score: round.total_score,
            holes: round.holes.map(|holes| holes.to_vec()),
            breakdown: round
                .breakdown
                .map(|breakdown| breakdown.into_iter().map(Into::into).collect()),
            handicap,
        }
    }
}

/// Every round known to the installed backend.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundsResponse {
    pub rounds: Vec<RoundResponse>,
}

/// Acknowledgement of a stored round.
#[derive(Debug, Serialize, ToSchema)]
pub struct SaveScoreResponse {
    pub message: String,
    pub round: RoundResponse,
}

/// Optional statistics filter.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatisticsQuery {
    /// Restrict the statistics to this player's rounds.
    pub player: Option<String>,
}

/// Aggregate numbers over the selected rounds.
#[derive(Debug, Serialize, ToSchema, PartialEq, Eq)]
pub struct StatisticsResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
    pub total_rounds: usize,
    pub average_score: u32,
    pub best_score: u32,
    pub worst_score: u32,
    /// Average of the player's last five rounds. Only present for a player with rounds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_average: Option<u32>,
}

impl StatisticsResponse {
    pub fn new(player: Option<String>, stats: Stats) -> Self {
        Self {
            player,
            total_rounds: stats.total_rounds,
            average_score: stats.average_score,
            best_score: stats.best_score,
            worst_score: stats.worst_score,
            recent_average: None,
        }
    }

    pub fn with_recent_average(mut self, recent_average: Option<u32>) -> Self {
        self.recent_average = recent_average;
        self
    }
}

/// Copy a validated per-hole list into a fixed-size round.
pub(crate) fn to_holes<T: Copy>(values: &[T]) -> Option<[T; HOLES]> {
    values.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hole(par: u32, strokes: u32) -> HoleBreakdownDto {
        HoleBreakdownDto {
            par,
            driver: 1,
            wood_util: 0,
            iron: strokes.saturating_sub(3),
            putter: 2,
        }
    }

    #[test]
    fn hole_counts_must_be_eighteen() {
        let request = SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: None,
            holes: Some(vec![4; 17]),
            breakdown: None,
        };
        assert!(request.validate().is_err());

        let request = SaveScoreRequest {
            holes: Some(vec![4; 18]),
            ..request
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn oversized_hole_totals_are_rejected() {
        let request = SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: None,
            holes: Some(vec![u32::MAX; 18]),
            breakdown: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("holes"));
    }

    #[test]
    fn breakdown_entries_are_validated() {
        let mut breakdown = vec![hole(4, 5); 18];
        breakdown[3].par = 9;
        let request = SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: None,
            holes: None,
            breakdown: Some(breakdown),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn date_must_be_iso() {
        let request = SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: Some("01/15/2024".into()),
            holes: Some(vec![4; 18]),
            breakdown: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("date"));
    }

    #[test]
    fn round_response_carries_handicap() {
        let breakdown = [HoleBreakdown::from(hole(4, 5)); HOLES];
        let round = ScoreRoundEntity {
            id: "score_1".into(),
            date: "2024-01-15".into(),
            username: "alice".into(),
            email: "a@x.com".into(),
            course_name: "Lakeside".into(),
            total_score: 90,
            holes: Some([5; HOLES]),
            breakdown: Some(breakdown),
        };
        let response = RoundResponse::from(round);
        assert_eq!(response.handicap, Some(18));
        assert_eq!(response.holes.map(|holes| holes.len()), Some(HOLES));
    }

    #[test]
    fn to_holes_needs_exact_length() {
        assert!(to_holes(&[1u32; 18]).is_some());
        assert!(to_holes(&[1u32; 19]).is_none());
    }
}
