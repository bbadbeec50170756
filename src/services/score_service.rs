use tracing::{debug, info};

use crate::{
    dao::models::{HoleBreakdown, ScoreRoundEntity, Stats, UserEntity, is_iso_date, today},
    dto::{
        score::{
            RoundResponse, RoundsResponse, SaveScoreRequest, SaveScoreResponse, StatisticsQuery,
            StatisticsResponse, to_holes,
        },
        validation::validate_hole_strokes,
    },
    error::ServiceError,
    state::SharedState,
};

/// Number of most recent rounds, in storage order, averaged per player.
const RECENT_ROUNDS: usize = 5;

/// Record a round for the logged-in user.
pub async fn save_score(
    state: &SharedState,
    request: SaveScoreRequest,
) -> Result<SaveScoreResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let user = state
        .session()
        .await
        .current_user
        .clone()
        .ok_or_else(|| ServiceError::Unauthorized("log in to record a round".into()))?;

    let mut round = build_round(&user, request)?;
    let ack = backend.save_score(round.clone()).await?;
    round.id = ack.id.unwrap_or_default();

    info!(
        id = %round.id,
        username = %round.username,
        total = round.total_score,
        "round recorded"
    );
    Ok(SaveScoreResponse {
        message: "round saved".into(),
        round: round.into(),
    })
}

/// Every stored round, or nothing while logged out.
pub async fn list_scores(state: &SharedState) -> Result<RoundsResponse, ServiceError> {
    let backend = state.require_backend().await?;
    if !state.session().await.is_authenticated() {
        return Ok(RoundsResponse { rounds: Vec::new() });
    }

    let rounds = backend.get_scores().await?;
    debug!(count = rounds.len(), "rounds loaded");
    Ok(RoundsResponse {
        rounds: rounds.into_iter().map(RoundResponse::from).collect(),
    })
}

/// Statistics over every round, or over one player's rounds.
pub async fn statistics(
    state: &SharedState,
    query: StatisticsQuery,
) -> Result<StatisticsResponse, ServiceError> {
    let backend = state.require_backend().await?;
    let player = query
        .player
        .map(|player| player.trim().to_owned())
        .filter(|player| !player.is_empty());

    let (stats, recent_average) = match &player {
        Some(player) => {
            let rounds = backend.get_scores().await?;
            let played: Vec<&ScoreRoundEntity> = rounds
                .iter()
                .filter(|round| round.username.eq_ignore_ascii_case(player))
                .collect();
            let recent = &played[played.len().saturating_sub(RECENT_ROUNDS)..];
            let recent_average =
                (!recent.is_empty()).then(|| Stats::from_rounds(recent.iter().copied()).average_score);
            (Stats::from_rounds(played.iter().copied()), recent_average)
        }
        None => (backend.get_statistics().await?, None),
    };

    Ok(StatisticsResponse::new(player, stats).with_recent_average(recent_average))
}

fn build_round(
    user: &UserEntity,
    request: SaveScoreRequest,
) -> Result<ScoreRoundEntity, ServiceError> {
    let course_name = request.course_name.trim().to_owned();
    if course_name.is_empty() {
        return Err(ServiceError::InvalidInput("course name is required".into()));
    }

    let date = match request.date {
        Some(date) if is_iso_date(date.trim()) => date.trim().to_owned(),
        Some(date) => {
            return Err(ServiceError::InvalidInput(format!(
                "date must be written as YYYY-MM-DD (got `{date}`)"
            )));
        }
        None => today(),
    };

    let breakdown = match request.breakdown {
        Some(entries) => {
            let entries: Vec<HoleBreakdown> = entries.into_iter().map(Into::into).collect();
            Some(to_holes(&entries).ok_or_else(hole_count_error)?)
        }
        None => None,
    };

    let holes = match (request.holes, &breakdown) {
        (Some(holes), breakdown) => {
            let holes = to_holes(&holes).ok_or_else(hole_count_error)?;
            if let Some(breakdown) = breakdown {
                if breakdown
                    .iter()
                    .zip(holes)
                    .any(|(detail, strokes)| detail.total() != strokes)
                {
                    return Err(ServiceError::InvalidInput(
                        "hole totals do not match the club breakdown".into(),
                    ));
                }
            }
            holes
        }
        (None, Some(breakdown)) => breakdown.map(|hole| hole.total()),
        (None, None) => {
            return Err(ServiceError::InvalidInput(
                "either holes or breakdown is required".into(),
            ));
        }
    };

    validate_hole_strokes(&holes).map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    let total_score = holes
        .iter()
        .try_fold(0u32, |total, strokes| total.checked_add(*strokes))
        .ok_or_else(|| ServiceError::InvalidInput("round total is out of range".into()))?;

    Ok(ScoreRoundEntity {
        id: String::new(),
        date,
        username: user.username.clone(),
        email: user.email.clone(),
        course_name,
        total_score,
        holes: Some(holes),
        breakdown,
    })
}

fn hole_count_error() -> ServiceError {
    ServiceError::InvalidInput("a round has exactly 18 holes".into())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{backend::local::LocalBackend, models::HOLES},
        dto::{
            auth::RegisterRequest,
            score::HoleBreakdownDto,
        },
        services::auth_service,
        state::{AppState, InitEvent},
    };

    async fn logged_in_state(dir: &tempfile::TempDir, username: &str) -> SharedState {
        let local = Arc::new(LocalBackend::new(dir.path(), "test"));
        let state = AppState::new(AppConfig::default(), None, local);
        state.transition(InitEvent::Start).await.unwrap();
        state.transition(InitEvent::SwitchToOffline).await.unwrap();
        auth_service::register(
            &state,
            RegisterRequest {
                username: username.into(),
                email: format!("{username}@x.com"),
                password: "pw1234".into(),
                confirm_password: "pw1234".into(),
            },
        )
        .await
        .unwrap();
        state
    }

    fn holes_request(holes: Vec<u32>) -> SaveScoreRequest {
        SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: Some("2024-01-15".into()),
            holes: Some(holes),
            breakdown: None,
        }
    }

    fn user() -> UserEntity {
        UserEntity {
            username: "alice".into(),
            email: "a@x.com".into(),
            password: "pw1234".into(),
            google_id: String::new(),
            google_name: String::new(),
            created_at: "2024-01-15T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn saved_round_reads_back_with_same_holes() {
        let dir = tempfile::tempdir().unwrap();
        let state = logged_in_state(&dir, "alice").await;

        let mut holes = vec![4; HOLES];
        holes[0] = 7;
        let saved = save_score(&state, holes_request(holes.clone())).await.unwrap();
        assert!(saved.round.id.starts_with("score_"));
        assert_eq!(saved.round.total_score, 75);

        let listed = list_scores(&state).await.unwrap();
        assert_eq!(listed.rounds.len(), 1);
        assert_eq!(listed.rounds[0].total_score, 75);
        assert_eq!(listed.rounds[0].holes.as_deref(), Some(holes.as_slice()));
    }

    #[tokio::test]
    async fn statistics_over_all_rounds_and_per_player() {
        let dir = tempfile::tempdir().unwrap();
        let state = logged_in_state(&dir, "alice").await;

        let empty = statistics(&state, StatisticsQuery::default()).await.unwrap();
        assert_eq!(
            (empty.total_rounds, empty.average_score, empty.best_score, empty.worst_score),
            (0, 0, 0, 0)
        );

        for total in [72u32, 80, 68] {
            let mut holes = vec![4; HOLES];
            holes[0] = total - 68;
            save_score(&state, holes_request(holes)).await.unwrap();
        }

        let all = statistics(&state, StatisticsQuery::default()).await.unwrap();
        assert_eq!(
            (all.total_rounds, all.average_score, all.best_score, all.worst_score),
            (3, 73, 68, 80)
        );

        let alice = statistics(
            &state,
            StatisticsQuery {
                player: Some("ALICE".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(alice.total_rounds, 3);
        assert_eq!(alice.player.as_deref(), Some("ALICE"));

        let bob = statistics(
            &state,
            StatisticsQuery {
                player: Some("bob".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(bob.total_rounds, 0);
        assert_eq!(bob.recent_average, None);
        assert_eq!(all.recent_average, None);
    }

    #[tokio::test]
    async fn player_statistics_average_the_last_five_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let state = logged_in_state(&dir, "alice").await;

        for total in [100u32, 98, 80, 82, 78, 84, 76] {
            let mut holes = vec![4; HOLES];
            holes[0] = total - 68;
            save_score(&state, holes_request(holes)).await.unwrap();
        }

        let alice = statistics(
            &state,
            StatisticsQuery {
                player: Some("alice".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(alice.total_rounds, 7);
        assert_eq!(alice.average_score, 85);
        assert_eq!(alice.recent_average, Some(80));
    }

    #[test]
    fn oversized_holes_are_invalid_input() {
        let mut holes = vec![4; HOLES];
        holes[0] = u32::MAX;
        assert!(matches!(
            build_round(&user(), holes_request(holes)),
            Err(ServiceError::InvalidInput(_))
        ));

        assert!(matches!(
            build_round(&user(), holes_request(vec![u32::MAX; HOLES])),
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn saving_requires_login_and_listing_is_empty_logged_out() {
        let dir = tempfile::tempdir().unwrap();
        let state = logged_in_state(&dir, "alice").await;
        save_score(&state, holes_request(vec![4; HOLES])).await.unwrap();
        auth_service::logout(&state).await;

        assert!(matches!(
            save_score(&state, holes_request(vec![4; HOLES])).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(list_scores(&state).await.unwrap().rounds.is_empty());
    }

    #[test]
    fn breakdown_drives_hole_totals() {
        let detail = HoleBreakdownDto {
            par: 4,
            driver: 1,
            wood_util: 1,
            iron: 1,
            putter: 2,
        };
        let round = build_round(
            &user(),
            SaveScoreRequest {
                course_name: " Lakeside ".into(),
                date: None,
                holes: None,
                breakdown: Some(vec![detail; HOLES]),
            },
        )
        .unwrap();

        assert_eq!(round.course_name, "Lakeside");
        assert_eq!(round.holes, Some([5; HOLES]));
        assert_eq!(round.total_score, 90);
        assert_eq!(round.handicap(), Some(18));
        assert!(is_iso_date(&round.date));
    }

    #[test]
    fn inconsistent_rounds_are_rejected() {
        let detail = HoleBreakdownDto {
            par: 4,
            driver: 1,
            wood_util: 0,
            iron: 1,
            putter: 2,
        };
        let mismatch = SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: None,
            holes: Some(vec![5; HOLES]),
            breakdown: Some(vec![detail; HOLES]),
        };
        assert!(matches!(
            build_round(&user(), mismatch),
            Err(ServiceError::InvalidInput(_))
        ));

        let empty = SaveScoreRequest {
            course_name: "Lakeside".into(),
            date: None,
            holes: None,
            breakdown: None,
        };
        assert!(build_round(&user(), empty).is_err());

        let bad_date = SaveScoreRequest {
            date: Some("2024-13-01".into()),
            ..holes_request(vec![4; HOLES])
        };
        assert!(build_round(&user(), bad_date).is_err());
    }
}
