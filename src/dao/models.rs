use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

/// Number of holes in a round; every per-hole sequence carries exactly this many entries.
pub const HOLES: usize = 18;

/// Application account stored in the users table.
///
/// The password is kept as the plain string the user typed, exactly like the sheet the
/// application shares with its browser front-end. It is compared verbatim at login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Unique account name (uniqueness is case-insensitive).
    pub username: String,
    /// Unique email address (uniqueness is case-insensitive).
    pub email: String,
    /// Opaque secret, stored and compared as plaintext.
    pub password: String,
    /// Identifier of the Google account that registered this user, empty offline.
    #[serde(default)]
    pub google_id: String,
    /// Display name of the Google account that registered this user, empty offline.
    #[serde(default)]
    pub google_name: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl UserEntity {
    /// Whether `candidate` names this user, either by username or by email, ignoring case.
    pub fn matches_login(&self, candidate: &str) -> bool {
        let candidate = candidate.trim();
        (!self.username.is_empty() && self.username.eq_ignore_ascii_case(candidate))
            || (!self.email.is_empty() && self.email.eq_ignore_ascii_case(candidate))
    }
}

/// Registration request handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Basic profile returned by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Identity {
    /// Synthetic identity used while the local store is active.
    pub fn offline() -> Self {
        Self {
            id: "offline".into(),
            name: "Offline User".into(),
            email: "offline@localhost".into(),
        }
    }
}

/// How the auth provider's consent flow hands credentials back to the application.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignInMode {
    /// The client opens the consent screen in a popup and posts the resulting access token.
    #[default]
    Popup,
    /// The provider redirects back with an authorization code exchanged server-side.
    Redirect,
}

impl std::fmt::Display for SignInMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignInMode::Popup => f.write_str("popup"),
            SignInMode::Redirect => f.write_str("redirect"),
        }
    }
}

/// Credential produced by the consent flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthGrant {
    /// Access token obtained by the popup token flow.
    AccessToken(String),
    /// Authorization code delivered to the redirect URI.
    AuthorizationCode(String),
}

impl AuthGrant {
    /// Mode that produces this kind of grant.
    pub fn mode(&self) -> SignInMode {
        match self {
            AuthGrant::AccessToken(_) => SignInMode::Popup,
            AuthGrant::AuthorizationCode(_) => SignInMode::Redirect,
        }
    }
}

/// Strokes played on a single hole, split by club family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoleBreakdown {
    pub par: u32,
    pub driver: u32,
    pub wood_util: u32,
    pub iron: u32,
    pub putter: u32,
}

impl HoleBreakdown {
    /// Strokes taken on the hole.
    pub fn total(&self) -> u32 {
        [self.driver, self.wood_util, self.iron, self.putter]
            .into_iter()
            .fold(0, u32::saturating_add)
    }
}

/// A stored round. Immutable once saved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRoundEntity {
    /// Backend-specific identifier (`score_<millis>` locally, `row_<n>` remotely).
    pub id: String,
    /// Day the round was played, `YYYY-MM-DD`.
    pub date: String,
    pub username: String,
    pub email: String,
    pub course_name: String,
    pub total_score: u32,
    /// Strokes per hole, present for every round recorded by this application.
    pub holes: Option<[u32; HOLES]>,
    /// Optional per-hole club breakdown.
    pub breakdown: Option<[HoleBreakdown; HOLES]>,
}

impl ScoreRoundEntity {
    /// Strokes over par for the round, floored at zero. Needs the per-hole breakdown.
    pub fn handicap(&self) -> Option<u32> {
        let breakdown = self.breakdown.as_ref()?;
        let par = breakdown
            .iter()
            .map(|hole| hole.par)
            .fold(0, u32::saturating_add);
        Some(self.total_score.saturating_sub(par))
    }
}

/// Acknowledgement returned once a round has been stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveAck {
    /// Identifier assigned to the stored round, when the backend knows it.
    pub id: Option<String>,
}

/// Aggregate numbers derived from a list of rounds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total_rounds: usize,
    /// Mean total score, rounded half up.
    pub average_score: u32,
    /// Lowest total score.
    pub best_score: u32,
    /// Highest total score.
    pub worst_score: u32,
}

impl Stats {
    /// Compute statistics over `rounds`. An empty slice yields all zeroes.
    pub fn from_rounds<'a, I>(rounds: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoreRoundEntity>,
    {
        let mut stats = Self::default();
        let mut sum: u64 = 0;

        for round in rounds {
            if stats.total_rounds == 0 {
                stats.best_score = round.total_score;
                stats.worst_score = round.total_score;
            } else {
                stats.best_score = stats.best_score.min(round.total_score);
                stats.worst_score = stats.worst_score.max(round.total_score);
            }
            stats.total_rounds += 1;
            sum += u64::from(round.total_score);
        }

        if stats.total_rounds > 0 {
            let count = stats.total_rounds as u64;
            stats.average_score = ((2 * sum + count) / (2 * count)) as u32;
        }

        stats
    }
}

/// Current time formatted as RFC 3339.
pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Today's date as `YYYY-MM-DD`.
pub fn today() -> String {
    OffsetDateTime::now_utc()
        .date()
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".into())
}

/// Whether `value` is a calendar date written as `YYYY-MM-DD`.
pub fn is_iso_date(value: &str) -> bool {
    time::Date::parse(value, format_description!("[year]-[month]-[day]")).is_ok()
}

#[cfg(test)]
pub(crate) fn sample_round(id: &str, username: &str, total: u32) -> ScoreRoundEntity {
    let mut holes = [total / HOLES as u32; HOLES];
    holes[0] += total % HOLES as u32;
    ScoreRoundEntity {
        id: id.into(),
        date: "2024-01-15".into(),
        username: username.into(),
        email: format!("{username}@example.com"),
        course_name: "Lakeside".into(),
        total_score: total,
        holes: Some(holes),
        breakdown: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn totals(values: &[u32]) -> Vec<ScoreRoundEntity> {
        values
            .iter()
            .enumerate()
            .map(|(i, total)| sample_round(&format!("r{i}"), "alice", *total))
            .collect()
    }

    #[test]
    fn stats_for_no_rounds_are_zero() {
        assert_eq!(Stats::from_rounds(&Vec::new()), Stats::default());
    }

    #[test]
    fn stats_for_single_round() {
        let stats = Stats::from_rounds(&totals(&[72]));
        assert_eq!(
            stats,
            Stats {
                total_rounds: 1,
                average_score: 72,
                best_score: 72,
                worst_score: 72,
            }
        );
    }

    #[test]
    fn stats_for_several_rounds() {
        let stats = Stats::from_rounds(&totals(&[72, 80, 68]));
        assert_eq!(
            stats,
            Stats {
                total_rounds: 3,
                average_score: 73,
                best_score: 68,
                worst_score: 80,
            }
        );
    }

    #[test]
    fn average_rounds_half_up() {
        assert_eq!(Stats::from_rounds(&totals(&[71, 72])).average_score, 72);
        assert_eq!(Stats::from_rounds(&totals(&[70, 71, 71])).average_score, 71);
    }

    #[test]
    fn sample_round_holes_sum_to_total() {
        let round = sample_round("r", "bob", 85);
        assert_eq!(round.holes.unwrap().iter().sum::<u32>(), 85);
    }

    #[test]
    fn handicap_is_strokes_over_par() {
        let mut round = sample_round("r", "bob", 80);
        assert_eq!(round.handicap(), None);

        let hole = HoleBreakdown {
            par: 4,
            driver: 1,
            wood_util: 0,
            iron: 1,
            putter: 2,
        };
        round.breakdown = Some([hole; HOLES]);
        assert_eq!(round.handicap(), Some(8));

        round.total_score = 60;
        assert_eq!(round.handicap(), Some(0));
    }

    #[test]
    fn login_matching_ignores_case() {
        let user = UserEntity {
            username: "Alice".into(),
            email: "A@x.com".into(),
            password: "pw".into(),
            google_id: String::new(),
            google_name: String::new(),
            created_at: now_rfc3339(),
        };
        assert!(user.matches_login("alice"));
        assert!(user.matches_login("a@X.COM"));
        assert!(!user.matches_login("bob"));
    }

    #[test]
    fn iso_dates_are_checked() {
        assert!(is_iso_date("2024-02-29"));
        assert!(!is_iso_date("2023-02-29"));
        assert!(!is_iso_date("15/01/2024"));
        assert!(is_iso_date(&today()));
    }
}
