use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dao::models::{HOLES, HoleBreakdown, Identity, ScoreRoundEntity, UserEntity};

/// Columns of the `Users` table, in order.
pub const USERS_HEADER: [&str; 6] = [
    "username",
    "email",
    "password",
    "google_id",
    "google_name",
    "created_at",
];

const SCORES_LEADING: [&str; 5] = ["date", "username", "email", "course", "total_score"];
const BREAKDOWN_COLUMN: usize = SCORES_LEADING.len() + HOLES;

/// Header row of the `Scores` table: leading columns, one column per hole, then the breakdown.
pub fn scores_header() -> Vec<String> {
    SCORES_LEADING
        .iter()
        .map(|name| (*name).to_owned())
        .chain((1..=HOLES).map(|hole| format!("hole{hole}")))
        .chain(std::iter::once("breakdown".to_owned()))
        .collect()
}

pub fn users_header() -> Vec<String> {
    USERS_HEADER.iter().map(|name| (*name).to_owned()).collect()
}

/// `values.get` response.
#[derive(Debug, Default, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

/// Request body of `values.append` and `values.update`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRangeBody<'a> {
    pub range: &'a str,
    pub major_dimension: &'static str,
    pub values: Vec<Vec<String>>,
}

impl<'a> ValueRangeBody<'a> {
    pub fn rows(range: &'a str, values: Vec<Vec<String>>) -> Self {
        Self {
            range,
            major_dimension: "ROWS",
            values,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    #[serde(default)]
    pub updates: Option<AppendUpdates>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendUpdates {
    #[serde(default)]
    pub updated_range: Option<String>,
}

impl AppendResponse {
    /// Row identifier derived from the updated range, e.g. `Scores!A5:X5` gives `row_5`.
    pub fn row_id(&self) -> Option<String> {
        let range = self.updates.as_ref()?.updated_range.as_deref()?;
        let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
        let first = cells.split(':').next()?;
        let row: usize = first
            .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '$')
            .parse()
            .ok()?;
        Some(row_id(row))
    }
}

pub fn row_id(sheet_row: usize) -> String {
    format!("row_{sheet_row}")
}

/// Google API error envelope, `{"error": {...}}`.
#[derive(Debug, Deserialize)]
pub struct GoogleErrorEnvelope {
    pub error: GoogleErrorBody,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub details: Vec<GoogleErrorReason>,
    #[serde(default)]
    pub errors: Vec<GoogleErrorReason>,
}

#[derive(Debug, Default, Deserialize)]
pub struct GoogleErrorReason {
    #[serde(default)]
    pub reason: Option<String>,
}

impl GoogleErrorBody {
    /// First machine-readable reason, preferring the structured `details`.
    pub fn reason(&self) -> Option<&str> {
        self.details
            .iter()
            .chain(self.errors.iter())
            .find_map(|entry| entry.reason.as_deref())
    }
}

/// OAuth error response, `{"error": "...", "error_description": "..."}`.
#[derive(Debug, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

/// Subset of the provider's OpenID configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenIdConfiguration {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    #[serde(default)]
    pub revocation_endpoint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// OpenID userinfo profile.
#[derive(Debug, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl From<UserInfo> for Identity {
    fn from(info: UserInfo) -> Self {
        Self {
            id: info.sub,
            name: info.name,
            email: info.email,
        }
    }
}

/// Cell rendered as trimmed text, whatever JSON type Sheets chose for it.
fn cell(row: &[Value], index: usize) -> String {
    raw_cell(row, index).trim().to_owned()
}

/// Cell text exactly as stored. Used for passwords.
fn raw_cell(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn is_header(row: &[Value], first_column: &str) -> bool {
    cell(row, 0).eq_ignore_ascii_case(first_column)
}

pub fn user_to_row(user: &UserEntity) -> Vec<String> {
    vec![
        user.username.clone(),
        user.email.clone(),
        user.password.clone(),
        user.google_id.clone(),
        user.google_name.clone(),
        user.created_at.clone(),
    ]
}

/// Decode the `Users` table, skipping the header and rows without a username.
pub fn users_from_rows(rows: &[Vec<Value>]) -> Vec<UserEntity> {
    rows.iter()
        .filter(|row| !is_header(row, USERS_HEADER[0]))
        .filter_map(|row| {
            let username = cell(row, 0);
            if username.is_empty() {
                return None;
            }
            Some(UserEntity {
                username,
                email: cell(row, 1),
                password: raw_cell(row, 2),
                google_id: cell(row, 3),
                google_name: cell(row, 4),
                created_at: cell(row, 5),
            })
        })
        .collect()
}

pub fn round_to_row(round: &ScoreRoundEntity) -> Result<Vec<String>, serde_json::Error> {
    let mut row = vec![
        round.date.clone(),
        round.username.clone(),
        round.email.clone(),
        round.course_name.clone(),
        round.total_score.to_string(),
    ];
    match &round.holes {
        Some(holes) => row.extend(holes.iter().map(u32::to_string)),
        None => row.extend(std::iter::repeat_n(String::new(), HOLES)),
    }
    row.push(match &round.breakdown {
        Some(breakdown) => serde_json::to_string(breakdown)?,
        None => String::new(),
    });
    Ok(row)
}

/// Decode the `Scores` table. Row identifiers are the 1-based sheet row numbers.
pub fn rounds_from_rows(rows: &[Vec<Value>]) -> Vec<ScoreRoundEntity> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| !is_header(row, SCORES_LEADING[0]))
        .filter_map(|(index, row)| {
            let round = round_from_row(index + 1, row);
            if round.is_none() {
                debug!(sheet_row = index + 1, "dropping malformed score row");
            }
            round
        })
        .collect()
}

fn round_from_row(sheet_row: usize, row: &[Value]) -> Option<ScoreRoundEntity> {
    let username = cell(row, 1);
    if username.is_empty() {
        return None;
    }
    let total_score = cell(row, 4).parse::<u32>().ok()?;

    let cells: Vec<String> = (0..HOLES)
        .map(|hole| cell(row, SCORES_LEADING.len() + hole))
        .collect();
    let holes = if cells.iter().all(String::is_empty) {
        None
    } else {
        let mut holes = [0u32; HOLES];
        for (slot, text) in holes.iter_mut().zip(&cells) {
            *slot = text.parse().ok()?;
        }
        Some(holes)
    };

    let breakdown_text = cell(row, BREAKDOWN_COLUMN);
    let breakdown = if breakdown_text.is_empty() {
        None
    } else {
        match serde_json::from_str::<Vec<HoleBreakdown>>(&breakdown_text)
            .ok()
            .and_then(|entries| <[HoleBreakdown; HOLES]>::try_from(entries).ok())
        {
            Some(breakdown) => Some(breakdown),
            None => {
                debug!(sheet_row, "ignoring unreadable hole breakdown");
                None
            }
        }
    };

    Some(ScoreRoundEntity {
        id: row_id(sheet_row),
        date: cell(row, 0),
        username,
        email: cell(row, 2),
        course_name: cell(row, 3),
        total_score,
        holes,
        breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::sample_round;
    use serde_json::json;

    fn wire(row: Vec<String>) -> Vec<Value> {
        row.into_iter().map(Value::String).collect()
    }

    #[test]
    fn scores_header_spans_twenty_four_columns() {
        let header = scores_header();
        assert_eq!(header.len(), 24);
        assert_eq!(header[5], "hole1");
        assert_eq!(header[22], "hole18");
        assert_eq!(header[23], "breakdown");
    }

    #[test]
    fn header_and_malformed_rows_are_skipped() {
        let mut short = wire(round_to_row(&sample_round("", "bob", 90)).unwrap());
        short.truncate(10);
        let rows = vec![
            wire(scores_header()),
            wire(round_to_row(&sample_round("", "alice", 85)).unwrap()),
            vec![json!("2024-01-15"), json!("carol"), json!("c@x"), json!("Lakeside"), json!("n/a")],
            short,
        ];

        let rounds = rounds_from_rows(&rows);
        assert_eq!(rounds.len(), 1);
        assert_eq!(rounds[0].id, "row_2");
        assert_eq!(rounds[0].username, "alice");
        assert_eq!(rounds[0].holes.unwrap().iter().sum::<u32>(), 85);
    }

    #[test]
    fn numeric_cells_are_accepted() {
        let mut row = vec![json!("2024-01-15"), json!("dan"), json!("d@x"), json!("Hills"), json!(72)];
        row.extend(std::iter::repeat_n(json!(4), HOLES));
        let rounds = rounds_from_rows(&[row]);
        assert_eq!(rounds[0].total_score, 72);
        assert_eq!(rounds[0].holes, Some([4; HOLES]));
    }

    #[test]
    fn breakdown_survives_the_wire() {
        let hole = HoleBreakdown {
            par: 4,
            driver: 1,
            wood_util: 1,
            iron: 1,
            putter: 2,
        };
        let mut round = sample_round("", "erin", 90);
        round.holes = Some([5; HOLES]);
        round.breakdown = Some([hole; HOLES]);

        let rounds = rounds_from_rows(&[wire(round_to_row(&round).unwrap())]);
        assert_eq!(rounds[0].breakdown, Some([hole; HOLES]));
        assert_eq!(rounds[0].handicap(), Some(18));
    }

    #[test]
    fn users_skip_header_and_blank_rows() {
        let rows = vec![
            wire(users_header()),
            vec![json!("alice"), json!("a@x.com"), json!("pw123")],
            vec![json!(""), json!("ghost@x.com")],
        ];
        let users = users_from_rows(&rows);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@x.com");
        assert_eq!(users[0].google_id, "");
    }

    #[test]
    fn user_password_is_read_verbatim() {
        let rows = vec![vec![json!(" bob "), json!("b@x.com "), json!(" secret ")]];
        let users = users_from_rows(&rows);
        assert_eq!(users[0].username, "bob");
        assert_eq!(users[0].email, "b@x.com");
        assert_eq!(users[0].password, " secret ");
    }

    #[test]
    fn append_range_yields_row_id() {
        let response: AppendResponse = serde_json::from_value(json!({
            "updates": { "updatedRange": "Scores!A7:X7" }
        }))
        .unwrap();
        assert_eq!(response.row_id().as_deref(), Some("row_7"));
        assert_eq!(AppendResponse::default().row_id(), None);
    }

    #[test]
    fn google_error_reason_prefers_details() {
        let envelope: GoogleErrorEnvelope = serde_json::from_value(json!({
            "error": {
                "code": 403,
                "message": "Requests from referer are blocked.",
                "status": "PERMISSION_DENIED",
                "details": [{ "reason": "API_KEY_HTTP_REFERRER_BLOCKED" }],
                "errors": [{ "reason": "forbidden" }]
            }
        }))
        .unwrap();
        assert_eq!(envelope.error.reason(), Some("API_KEY_HTTP_REFERRER_BLOCKED"));
    }
}
