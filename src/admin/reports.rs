//! Downloadable admin reports. Each kind has its own field set; all are
//! computed from already-loaded users, swaps and reviews.

use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};

use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::{Deserialize, Serialize, Serializer};
use time::{Duration, OffsetDateTime};

use crate::{
    session::Actor,
    swaps::{Review, Swap, SwapStatus, SwapStore},
    users::{IdentityGateway, RatingSummary, User},
    AppError, AppResult, AppState,
};

use super::all_members;

const SKILL_CATEGORIES: [(&str, &[&str]); 3] = [
    ("Technology", &["JavaScript", "React", "Python", "Node.js"]),
    ("Design", &["Photoshop", "UI/UX Design", "Figma"]),
    ("Data", &["Data Analysis", "Excel", "SQL"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    UserActivity,
    SwapStats,
    FeedbackLogs,
    PlatformAnalytics,
}

impl FromStr for ReportKind {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "user-activity" => Ok(Self::UserActivity),
            "swap-stats" => Ok(Self::SwapStats),
            "feedback-logs" => Ok(Self::FeedbackLogs),
            "platform-analytics" => Ok(Self::PlatformAnalytics),
            _ => Err(AppError::NotFound("report")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportRange {
    Last7Days,
    #[default]
    Last30Days,
    Last90Days,
    LastYear,
    AllTime,
}

impl ReportRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last7Days => "last-7-days",
            Self::Last30Days => "last-30-days",
            Self::Last90Days => "last-90-days",
            Self::LastYear => "last-year",
            Self::AllTime => "all-time",
        }
    }

    /// Start of the range ending at `now`; `None` for all time.
    pub fn since(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let days = match self {
            Self::Last7Days => 7,
            Self::Last30Days => 30,
            Self::Last90Days => 90,
            Self::LastYear => 365,
            Self::AllTime => return None,
        };
        Some(now - Duration::days(days))
    }
}

impl fmt::Display for ReportRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportRange {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        [Self::Last7Days, Self::Last30Days, Self::Last90Days, Self::LastYear, Self::AllTime]
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("unknown date range {s:?}")))
    }
}

impl Serialize for ReportRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "report_type", rename_all = "kebab-case")]
pub enum ReportData {
    UserActivity {
        total_users: usize,
        active_users: usize,
        new_registrations: usize,
        users_by_skill: BTreeMap<String, usize>,
    },
    SwapStats {
        total_swaps: usize,
        pending_swaps: usize,
        completed_swaps: usize,
        /// Percentage of swaps completed, two decimals.
        success_rate: f64,
        popular_skills: BTreeMap<String, usize>,
    },
    FeedbackLogs {
        total_reviews: usize,
        average_rating: f64,
        rating_distribution: BTreeMap<u8, usize>,
        reviews: Vec<Review>,
    },
    PlatformAnalytics {
        total_users: usize,
        new_users: usize,
        swaps_in_range: usize,
        skill_categories: BTreeMap<&'static str, usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub date_range: ReportRange,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub data: ReportData,
}

fn in_range(at: OffsetDateTime, since: Option<OffsetDateTime>) -> bool {
    since.is_none_or(|since| at >= since)
}

fn joined_in_range(user: &User, since: Option<OffsetDateTime>) -> bool {
    since.is_none_or(|since| user.joined_at >= since.date())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn generate(
    kind: ReportKind,
    range: ReportRange,
    now: OffsetDateTime,
    users: &[User],
    swaps: &[Swap],
    reviews: &[Review],
) -> Report {
    let since = range.since(now);

    let data = match kind {
        ReportKind::UserActivity => {
            let mut users_by_skill: BTreeMap<String, usize> = BTreeMap::new();
            for skill in users.iter().flat_map(|u| &u.skills_offered) {
                *users_by_skill.entry(skill.clone()).or_default() += 1;
            }
            ReportData::UserActivity {
                total_users: users.len(),
                active_users: users.iter().filter(|u| u.is_active).count(),
                new_registrations: users.iter().filter(|u| joined_in_range(u, since)).count(),
                users_by_skill,
            }
        }
        ReportKind::SwapStats => {
            let swaps: Vec<&Swap> = swaps.iter().filter(|s| in_range(s.created_at, since)).collect();
            let completed = swaps.iter().filter(|s| s.status == SwapStatus::Completed).count();
            let mut popular_skills: BTreeMap<String, usize> = BTreeMap::new();
            for swap in &swaps {
                *popular_skills.entry(swap.skill_offered.clone()).or_default() += 1;
                *popular_skills.entry(swap.skill_requested.clone()).or_default() += 1;
            }
            ReportData::SwapStats {
                total_swaps: swaps.len(),
                pending_swaps: swaps.iter().filter(|s| s.status == SwapStatus::Pending).count(),
                completed_swaps: completed,
                success_rate: if swaps.is_empty() {
                    0.0
                } else {
                    round2(completed as f64 / swaps.len() as f64 * 100.0)
                },
                popular_skills,
            }
        }
        ReportKind::FeedbackLogs => {
            let reviews: Vec<Review> = reviews
                .iter()
                .filter(|r| in_range(r.created_at, since))
                .cloned()
                .collect();
            let mut rating_distribution: BTreeMap<u8, usize> = BTreeMap::new();
            for review in &reviews {
                *rating_distribution.entry(review.rating).or_default() += 1;
            }
            ReportData::FeedbackLogs {
                total_reviews: reviews.len(),
                average_rating: RatingSummary::from_ratings(reviews.iter().map(|r| r.rating))
                    .map_or(0.0, |summary| summary.average),
                rating_distribution,
                reviews,
            }
        }
        ReportKind::PlatformAnalytics => ReportData::PlatformAnalytics {
            total_users: users.len(),
            new_users: users.iter().filter(|u| joined_in_range(u, since)).count(),
            swaps_in_range: swaps.iter().filter(|s| in_range(s.created_at, since)).count(),
            skill_categories: SKILL_CATEGORIES
                .iter()
                .map(|(category, skills)| {
                    let members = users
                        .iter()
                        .filter(|u| skills.iter().any(|s| u.skills_offered.contains(*s)))
                        .count();
                    (*category, members)
                })
                .collect(),
        },
    };

    Report { date_range: range, generated_at: now, data }
}

#[derive(Deserialize)]
pub(crate) struct ReportQuery {
    range: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn report(
    State(gateway): State<Arc<dyn IdentityGateway>>,
    State(store): State<SwapStore>,
    actor: Actor,
    Path(kind): Path<String>,
    Query(ReportQuery { range }): Query<ReportQuery>,
) -> AppResult<Json<Report>> {
    actor.require_admin()?;

    let kind: ReportKind = kind.parse()?;
    let range = range.as_deref().map(str::parse::<ReportRange>).transpose()?.unwrap_or_default();

    let users = all_members(&gateway, &store).await?;
    let swaps = store.all_swaps().await?;
    let reviews = store.all_reviews().await?;

    tracing::info!(?kind, %range, by = actor.id(), "report generated");
    Ok(Json(generate(kind, range, OffsetDateTime::now_utc(), &users, &swaps, &reviews)))
}
