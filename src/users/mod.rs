//! Members as the rest of the service sees them, projected from identity
//! provider records.

mod gateway;
mod gotrue;

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};

use crate::GetField;

pub use gateway::{AuthOutcome, AuthSession, GatewayUser, IdentityGateway};
pub use gotrue::GoTrueGateway;

/// Metadata keys only an administrator may set.
pub const PROTECTED_KEYS: [&str; 4] = ["role", "isActive", "rating", "reviewCount"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Availability {
    Weekends,
    Weekdays,
    Evenings,
    Mornings,
}

impl Availability {
    pub const ALL: [Availability; 4] = [
        Availability::Weekends,
        Availability::Weekdays,
        Availability::Evenings,
        Availability::Mornings,
    ];

    pub fn label(&self) -> &'static str {
        use Availability::*;
        match self {
            Weekends => "Weekends",
            Weekdays => "Weekdays",
            Evenings => "Evenings",
            Mornings => "Mornings",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Availability::ALL
            .into_iter()
            .find(|a| a.label() == s)
            .ok_or_else(|| format!("unknown availability {s:?}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
    pub skills_offered: BTreeSet<String>,
    pub skills_wanted: BTreeSet<String>,
    pub availability: BTreeSet<Availability>,
    pub is_public: bool,
    pub role: Role,
    pub rating: f64,
    pub review_count: u32,
    pub joined_at: Date,
    pub is_active: bool,
}

impl User {
    /// Maps a raw identity record. Every missing or malformed attribute
    /// falls back to a fixed default instead of failing.
    pub fn from_gateway(record: &GatewayUser) -> User {
        let meta = &record.user_metadata;
        let admin = &record.app_metadata;

        let name = meta
            .get_str_field("name")
            .ok()
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty())
            .or_else(|| {
                record
                    .email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_owned)
            })
            .unwrap_or_else(|| "User".to_owned());

        let joined_at = meta
            .get_str_field("joinedAt")
            .ok()
            .and_then(|d| parse_date(&d))
            .or_else(|| record.created_at.as_deref().and_then(parse_date))
            .unwrap_or_else(|| OffsetDateTime::now_utc().date());

        User {
            id: record.id.clone(),
            name,
            email: record.email.clone(),
            location: optional_text(meta, "location"),
            profile_photo: optional_text(meta, "profilePhoto"),
            skills_offered: skill_set(meta, "skillsOffered"),
            skills_wanted: skill_set(meta, "skillsWanted"),
            availability: meta
                .get_str_list("availability")
                .iter()
                .filter_map(|label| label.parse().ok())
                .collect(),
            is_public: meta.get("isPublic").and_then(Value::as_bool).unwrap_or(true),
            role: admin
                .get("role")
                .and_then(|r| serde_json::from_value(r.clone()).ok())
                .unwrap_or_default(),
            rating: admin
                .get("rating")
                .and_then(Value::as_f64)
                .map(|r| r.clamp(0.0, 5.0))
                .unwrap_or(0.0),
            review_count: admin
                .get("reviewCount")
                .and_then(Value::as_u64)
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(0),
            joined_at,
            is_active: admin.get("isActive").and_then(Value::as_bool).unwrap_or(true),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether others may find this member and send them requests.
    pub fn is_browseable(&self) -> bool {
        self.is_public && self.is_active && !self.is_admin()
    }

    /// Replaces the stored rating with one derived from reviews.
    pub fn with_rating(mut self, summary: Option<RatingSummary>) -> User {
        if let Some(summary) = summary {
            self.rating = summary.average;
            self.review_count = summary.count;
        }
        self
    }
}

/// Average and number of reviews a member received.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

impl RatingSummary {
    pub fn from_totals(sum: i64, count: i64) -> Option<RatingSummary> {
        let count_u32 = u32::try_from(count).ok().filter(|c| *c > 0)?;
        let average = (sum as f64 / count as f64 * 100.0).round() / 100.0;
        Some(RatingSummary { average, count: count_u32 })
    }

    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Option<RatingSummary> {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r), count + 1));
        Self::from_totals(sum, count)
    }
}

/// Overlays review-derived ratings, keyed by member id as (sum, count).
pub fn apply_ratings(users: Vec<User>, totals: &HashMap<String, (i64, i64)>) -> Vec<User> {
    users
        .into_iter()
        .map(|user| {
            let summary = totals
                .get(&user.id)
                .and_then(|&(sum, count)| RatingSummary::from_totals(sum, count));
            user.with_rating(summary)
        })
        .collect()
}

/// Metadata a member may change about themselves. Protected keys are
/// dropped and the known fields are checked.
pub fn sanitize_metadata(mut partial: Map<String, Value>) -> crate::AppResult<Map<String, Value>> {
    for key in PROTECTED_KEYS {
        partial.remove(key);
    }

    for key in ["skillsOffered", "skillsWanted", "availability"] {
        if let Some(value) = partial.get(key) {
            let Some(items) = value.as_array() else {
                return Err(crate::AppError::validation(format!("{key} must be a list of strings")));
            };
            let mut cleaned: BTreeSet<String> = BTreeSet::new();
            for item in items {
                let Some(item) = item.as_str() else {
                    return Err(crate::AppError::validation(format!("{key} must be a list of strings")));
                };
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                if key == "availability" {
                    item.parse::<Availability>().map_err(crate::AppError::Validation)?;
                }
                cleaned.insert(item.to_owned());
            }
            partial.insert(key.to_owned(), Value::Array(cleaned.into_iter().map(Value::String).collect()));
        }
    }

    for key in ["name", "location", "profilePhoto"] {
        if let Some(value) = partial.get(key) {
            if !value.is_string() && !value.is_null() {
                return Err(crate::AppError::validation(format!("{key} must be a string")));
            }
        }
    }

    if let Some(value) = partial.get("isPublic") {
        if !value.is_boolean() {
            return Err(crate::AppError::validation("isPublic must be true or false"));
        }
    }

    Ok(partial)
}

fn optional_text(meta: &Value, key: &str) -> Option<String> {
    meta.get_str_field(key)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn skill_set(meta: &Value, key: &str) -> BTreeSet<String> {
    meta.get_str_list(key)
        .into_iter()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_date(raw: &str) -> Option<Date> {
    let date_only = time::macros::format_description!("[year]-[month]-[day]");
    Date::parse(raw, &date_only)
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|at| at.date()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::date;

    use super::*;

    fn record(user_metadata: Value, app_metadata: Value) -> GatewayUser {
        GatewayUser {
            id: "u-1".to_owned(),
            email: "sam.lee@example.com".to_owned(),
            user_metadata,
            app_metadata,
            created_at: Some("2024-11-02T08:15:00Z".to_owned()),
        }
    }

    #[test]
    fn empty_metadata_maps_to_defaults() {
        let user = User::from_gateway(&record(json!({}), json!({})));

        assert_eq!(user.name, "sam.lee");
        assert_eq!(user.location, None);
        assert!(user.skills_offered.is_empty());
        assert!(user.availability.is_empty());
        assert!(user.is_public);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.rating, 0.0);
        assert_eq!(user.review_count, 0);
        assert_eq!(user.joined_at, date!(2024 - 11 - 02));
        assert!(user.is_active);
        assert!(user.is_browseable());
    }

    #[test]
    fn full_metadata_is_mapped() {
        let user = User::from_gateway(&record(
            json!({
                "name": "Sam Lee",
                "location": "Lisbon",
                "profilePhoto": "",
                "skillsOffered": ["React", " React ", "SQL", ""],
                "skillsWanted": ["Photography"],
                "availability": ["Weekends", "Sometimes", "Evenings"],
                "isPublic": false,
                "joinedAt": "2024-01-15",
                "role": "admin"
            }),
            json!({ "rating": 4.5, "reviewCount": 3, "isActive": false }),
        ));

        assert_eq!(user.name, "Sam Lee");
        assert_eq!(user.location.as_deref(), Some("Lisbon"));
        assert_eq!(user.profile_photo, None);
        assert_eq!(user.skills_offered.len(), 2);
        assert_eq!(
            user.availability.into_iter().collect::<Vec<_>>(),
            vec![Availability::Weekends, Availability::Evenings]
        );
        assert!(!user.is_public);
        // role comes from administrative metadata only
        assert_eq!(user.role, Role::User);
        assert_eq!(user.rating, 4.5);
        assert_eq!(user.review_count, 3);
        assert_eq!(user.joined_at, date!(2024 - 01 - 15));
        assert!(!user.is_active);
    }

    #[test]
    fn admin_role_is_read_from_app_metadata() {
        let user = User::from_gateway(&record(json!({}), json!({ "role": "admin" })));
        assert!(user.is_admin());
        assert!(!user.is_browseable());
    }

    #[test]
    fn protected_keys_are_stripped() {
        let partial = json!({
            "name": "Sam",
            "role": "admin",
            "isActive": true,
            "rating": 5.0,
            "skillsOffered": ["Go", " Go", ""]
        });
        let Value::Object(partial) = partial else { unreachable!() };

        let cleaned = sanitize_metadata(partial).unwrap();

        assert!(cleaned.get("role").is_none());
        assert!(cleaned.get("isActive").is_none());
        assert!(cleaned.get("rating").is_none());
        assert_eq!(cleaned["skillsOffered"], json!(["Go"]));
    }

    #[test]
    fn unknown_availability_is_rejected_on_update() {
        let Value::Object(partial) = json!({ "availability": ["Weekends", "Never"] }) else {
            unreachable!()
        };
        assert!(matches!(sanitize_metadata(partial), Err(crate::AppError::Validation(_))));
    }

    #[test]
    fn ratings_overlay_only_reviewed_members() {
        let reviewed = User::from_gateway(&record(json!({}), json!({ "rating": 1.0, "reviewCount": 9 })));
        let mut unreviewed = reviewed.clone();
        unreviewed.id = "u-2".to_owned();

        let totals = HashMap::from([("u-1".to_owned(), (9, 2))]);
        let users = apply_ratings(vec![reviewed, unreviewed], &totals);

        assert_eq!((users[0].rating, users[0].review_count), (4.5, 2));
        assert_eq!((users[1].rating, users[1].review_count), (1.0, 9));
    }

    #[test]
    fn rating_summary_rounds_to_two_places() {
        let summary = RatingSummary::from_ratings([5, 4, 4]).unwrap();
        assert_eq!(summary.average, 4.33);
        assert_eq!(summary.count, 3);
        assert!(RatingSummary::from_ratings([]).is_none());
    }
}
