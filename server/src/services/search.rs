//! Event listing filters, sort keys and the title-relevance ordering.
//!
//! The same ordering exists twice: as SQL composed with [`QueryBuilder`] for
//! Postgres, and as [`EventSearch::compare`] for the in-memory store. Both
//! must agree.

use std::cmp::Ordering;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::models::{eq_ignore_case, EventSummary};

pub const DEFAULT_LIMIT: i64 = 100;
pub const SUGGESTION_LIMIT: i64 = 8;
pub const MIN_SUGGESTION_QUERY: usize = 2;

const ACTIVE_REGISTRATIONS_SQL: &str = "(SELECT COUNT(*) FROM registrations r \
     WHERE r.event_id = e.id AND r.status <> 'cancelled') AS active_registrations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Date,
    DateDesc,
    Title,
    Popular,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::Date,
        SortKey::DateDesc,
        SortKey::Title,
        SortKey::Popular,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "date" => Some(SortKey::Date),
            "date_desc" => Some(SortKey::DateDesc),
            "title" => Some(SortKey::Title),
            "popular" => Some(SortKey::Popular),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Date => "date",
            SortKey::DateDesc => "date_desc",
            SortKey::Title => "title",
            SortKey::Popular => "popular",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Date => "Soonest first",
            SortKey::DateDesc => "Latest first",
            SortKey::Title => "Title (A-Z)",
            SortKey::Popular => "Most popular",
        }
    }
}

/// Raw listing query string.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchParams {
    pub title: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

/// Parsed listing filters. Blank values, unparsable dates and unknown sort keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventSearch {
    pub title: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub sort: Option<SortKey>,
    pub limit: Option<i64>,
}

impl From<&SearchParams> for EventSearch {
    fn from(params: &SearchParams) -> Self {
        EventSearch {
            title: non_blank(params.title.as_deref()),
            location: non_blank(params.location.as_deref()),
            date: non_blank(params.date.as_deref())
                .and_then(|raw| NaiveDate::parse_from_str(&raw, "%Y-%m-%d").ok()),
            category: non_blank(params.category.as_deref()),
            sort: params.sort.as_deref().and_then(SortKey::parse),
            limit: None,
        }
    }
}

/// Relevance of a title to a search query: 0 exact, 1 prefix, 2 substring, 3 no match.
pub fn title_rank(title: &str, query: &str) -> u8 {
    let title = title.to_lowercase();
    let query = query.to_lowercase();
    if title == query {
        0
    } else if title.starts_with(&query) {
        1
    } else if title.contains(&query) {
        2
    } else {
        3
    }
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(query: &str) -> String {
    format!("%{}%", escape_like(&query.to_lowercase()))
}

fn prefix_pattern(query: &str) -> String {
    format!("{}%", escape_like(&query.to_lowercase()))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn push_title_rank(builder: &mut QueryBuilder<'static, Postgres>, column: &str, query: &str) {
    builder.push("CASE WHEN LOWER(");
    builder.push(column);
    builder.push(") = ");
    builder.push_bind(query.to_lowercase());
    builder.push(" THEN 0 WHEN LOWER(");
    builder.push(column);
    builder.push(") LIKE ");
    builder.push_bind(prefix_pattern(query));
    builder.push(" THEN 1 WHEN LOWER(");
    builder.push(column);
    builder.push(") LIKE ");
    builder.push_bind(contains_pattern(query));
    builder.push(" THEN 2 ELSE 3 END");
}

impl EventSearch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.location.is_none()
            && self.date.is_none()
            && self.category.is_none()
    }

    /// Applies the filters to one event. Listing visibility is checked separately.
    pub fn matches(&self, summary: &EventSummary) -> bool {
        let event = &summary.event;
        if let Some(title) = &self.title {
            if !event.title.to_lowercase().contains(&title.to_lowercase()) {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !event
                .location
                .to_lowercase()
                .contains(&location.to_lowercase())
            {
                return false;
            }
        }
        if let Some(date) = self.date {
            if event.starts_at.date_naive() != date {
                return false;
            }
        }
        if let Some(category) = &self.category {
            match &event.category {
                Some(c) if eq_ignore_case(c, category) => {}
                _ => return false,
            }
        }
        true
    }

    /// Total order used by the in-memory store; mirrors the ORDER BY of [`Self::build_query`].
    pub fn compare(&self, a: &EventSummary, b: &EventSummary) -> Ordering {
        let by_title = || {
            a.event
                .title
                .to_lowercase()
                .cmp(&b.event.title.to_lowercase())
        };
        let by_rank = || match &self.title {
            Some(query) => title_rank(&a.event.title, query).cmp(&title_rank(&b.event.title, query)),
            None => Ordering::Equal,
        };
        let by_id = || a.event.id.cmp(&b.event.id);

        match self.sort {
            Some(sort) => {
                let primary = match sort {
                    SortKey::Date => a.event.starts_at.cmp(&b.event.starts_at),
                    SortKey::DateDesc => b.event.starts_at.cmp(&a.event.starts_at),
                    SortKey::Title => by_title(),
                    SortKey::Popular => b.active_registrations.cmp(&a.active_registrations),
                };
                primary
                    .then_with(by_rank)
                    .then_with(by_title)
                    .then_with(by_id)
            }
            None if self.title.is_some() => by_rank().then_with(by_title).then_with(by_id),
            None => a
                .event
                .starts_at
                .cmp(&b.event.starts_at)
                .then_with(by_id),
        }
    }

    /// Composes the listing query over published, non-private events.
    pub fn build_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new("SELECT e.*, ");
        builder.push(ACTIVE_REGISTRATIONS_SQL);
        builder.push(" FROM events e WHERE e.status = 'published' AND e.private = FALSE");

        if let Some(title) = &self.title {
            builder.push(" AND LOWER(e.title) LIKE ");
            builder.push_bind(contains_pattern(title));
        }
        if let Some(location) = &self.location {
            builder.push(" AND LOWER(e.location) LIKE ");
            builder.push_bind(contains_pattern(location));
        }
        if let Some(date) = self.date {
            let day_start = date.and_time(NaiveTime::MIN).and_utc();
            builder.push(" AND e.starts_at >= ");
            builder.push_bind(day_start);
            builder.push(" AND e.starts_at < ");
            builder.push_bind(day_start + Duration::days(1));
        }
        if let Some(category) = &self.category {
            builder.push(" AND LOWER(e.category) = ");
            builder.push_bind(category.to_lowercase());
        }

        builder.push(" ORDER BY ");
        match self.sort {
            Some(sort) => {
                builder.push(match sort {
                    SortKey::Date => "e.starts_at ASC",
                    SortKey::DateDesc => "e.starts_at DESC",
                    SortKey::Title => "LOWER(e.title) ASC",
                    SortKey::Popular => "active_registrations DESC",
                });
                if let Some(title) = &self.title {
                    builder.push(", ");
                    push_title_rank(&mut builder, "e.title", title);
                }
                builder.push(", LOWER(e.title) ASC, e.id ASC");
            }
            None => match &self.title {
                Some(title) => {
                    push_title_rank(&mut builder, "e.title", title);
                    builder.push(", LOWER(e.title) ASC, e.id ASC");
                }
                None => {
                    builder.push("e.starts_at ASC, e.id ASC");
                }
            },
        }

        builder.push(" LIMIT ");
        builder.push_bind(self.limit.unwrap_or(DEFAULT_LIMIT));
        builder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionField {
    Title,
    Location,
}

impl SuggestionField {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "title" => Some(SuggestionField::Title),
            "location" => Some(SuggestionField::Location),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SuggestionField::Title => "title",
            SuggestionField::Location => "location",
        }
    }
}

/// Distinct titles or locations of listed events containing `query`.
pub fn build_suggestions_query(
    field: SuggestionField,
    query: &str,
    limit: i64,
) -> QueryBuilder<'static, Postgres> {
    let column = field.column();
    let mut builder = QueryBuilder::new("SELECT value FROM (SELECT DISTINCT ");
    builder.push(column);
    builder.push(" AS value FROM events WHERE status = 'published' AND private = FALSE AND LOWER(");
    builder.push(column);
    builder.push(") LIKE ");
    builder.push_bind(contains_pattern(query));
    builder.push(") s ORDER BY ");
    if field == SuggestionField::Title {
        push_title_rank(&mut builder, "value", query);
        builder.push(", ");
    }
    builder.push("LOWER(value) ASC LIMIT ");
    builder.push_bind(limit);
    builder
}

/// In-memory counterpart of [`build_suggestions_query`].
pub fn rank_suggestions(
    field: SuggestionField,
    query: &str,
    candidates: impl IntoIterator<Item = String>,
    limit: usize,
) -> Vec<String> {
    let needle = query.to_lowercase();
    let mut values: Vec<String> = candidates
        .into_iter()
        .filter(|value| value.to_lowercase().contains(&needle))
        .collect();
    values.sort();
    values.dedup();
    values.sort_by(|a, b| {
        let rank = match field {
            SuggestionField::Title => title_rank(a, query).cmp(&title_rank(b, query)),
            SuggestionField::Location => Ordering::Equal,
        };
        rank.then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
    });
    values.truncate(limit);
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, EventStatus};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;
    use uuid::Uuid;

    fn summary(title: &str, day: u32, registrations: i64) -> EventSummary {
        let starts_at = Utc.with_ymd_and_hms(2026, 5, day, 18, 0, 0).unwrap();
        EventSummary {
            event: Event {
                id: Uuid::new_v4(),
                organizer_id: Uuid::nil(),
                title: title.to_string(),
                description: "d".into(),
                location: "Berlin, Germany".into(),
                starts_at,
                ends_at: None,
                capacity: None,
                status: EventStatus::Published,
                category: Some("Tech".into()),
                private: false,
                registration_open_from: None,
                registration_open_until: None,
                created_at: starts_at,
                updated_at: starts_at,
            },
            active_registrations: registrations,
        }
    }

    fn sorted_titles(search: &EventSearch, mut events: Vec<EventSummary>) -> Vec<String> {
        events.retain(|e| search.matches(e));
        events.sort_by(|a, b| search.compare(a, b));
        events.into_iter().map(|e| e.event.title).collect()
    }

    #[rstest]
    #[case("Rust", "rust", 0)]
    #[case("Rust Meetup", "rust", 1)]
    #[case("Berlin Rust Meetup", "rust", 2)]
    #[case("Python Talk", "rust", 3)]
    fn test_title_rank(#[case] title: &str, #[case] query: &str, #[case] rank: u8) {
        assert_eq!(title_rank(title, query), rank);
    }

    #[test]
    fn test_exact_above_prefix_above_substring() {
        let search = EventSearch {
            title: Some("rust".into()),
            ..EventSearch::default()
        };
        let titles = sorted_titles(
            &search,
            vec![
                summary("Learning Rust", 1, 0),
                summary("Rust Workshop", 2, 0),
                summary("Python Data Science Talk", 3, 0),
                summary("RUST", 4, 0),
                summary("Advanced Rust", 5, 0),
            ],
        );
        assert_eq!(
            titles,
            vec!["RUST", "Rust Workshop", "Advanced Rust", "Learning Rust"]
        );
    }

    #[test]
    fn test_explicit_sort_wins_and_rank_breaks_ties() {
        let search = EventSearch {
            title: Some("jam".into()),
            sort: Some(SortKey::Popular),
            ..EventSearch::default()
        };
        let titles = sorted_titles(
            &search,
            vec![
                summary("Music Jam Session", 1, 5),
                summary("Jam", 2, 5),
                summary("Jam Night", 3, 9),
            ],
        );
        assert_eq!(titles, vec!["Jam Night", "Jam", "Music Jam Session"]);
    }

    #[test]
    fn test_default_order_is_by_start_date() {
        let search = EventSearch::default();
        let titles = sorted_titles(
            &search,
            vec![summary("B", 9, 0), summary("A", 3, 0), summary("C", 5, 0)],
        );
        assert_eq!(titles, vec!["A", "C", "B"]);

        let search = EventSearch {
            sort: Some(SortKey::DateDesc),
            ..EventSearch::default()
        };
        let titles = sorted_titles(
            &search,
            vec![summary("B", 9, 0), summary("A", 3, 0), summary("C", 5, 0)],
        );
        assert_eq!(titles, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_date_location_and_category_filters() {
        let search = EventSearch {
            location: Some("berlin".into()),
            date: NaiveDate::from_ymd_opt(2026, 5, 3),
            category: Some("tech".into()),
            ..EventSearch::default()
        };
        assert!(search.matches(&summary("A", 3, 0)));
        assert!(!search.matches(&summary("A", 4, 0)));

        let mut other = summary("A", 3, 0);
        other.event.category = None;
        assert!(!search.matches(&other));
    }

    #[test]
    fn test_category_filter_folds_non_ascii_case() {
        let search = EventSearch {
            category: Some("über".into()),
            ..EventSearch::default()
        };
        let mut event = summary("A", 3, 0);
        event.event.category = Some("Über".into());
        assert!(search.matches(&event));
    }

    #[test]
    fn test_params_ignore_blank_and_unknown_values() {
        let params = SearchParams {
            title: Some("  ".into()),
            location: Some(" Köln ".into()),
            date: Some("yesterday".into()),
            category: None,
            sort: Some("random".into()),
        };
        let search = EventSearch::from(&params);
        assert_eq!(search.title, None);
        assert_eq!(search.location.as_deref(), Some("Köln"));
        assert_eq!(search.date, None);
        assert_eq!(search.sort, None);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }

    #[test]
    fn test_build_query_without_filters() {
        let builder = EventSearch::default().build_query();
        let sql = builder.sql();
        assert!(sql.starts_with("SELECT e.*, (SELECT COUNT(*) FROM registrations r"));
        assert!(sql.contains("WHERE e.status = 'published' AND e.private = FALSE"));
        assert!(sql.ends_with("ORDER BY e.starts_at ASC, e.id ASC LIMIT $1"));
    }

    #[test]
    fn test_build_query_with_title_uses_relevance_case() {
        let search = EventSearch {
            title: Some("Rust".into()),
            location: Some("Berlin".into()),
            ..EventSearch::default()
        };
        let builder = search.build_query();
        let sql = builder.sql();
        assert!(sql.contains("AND LOWER(e.title) LIKE $1 AND LOWER(e.location) LIKE $2"));
        assert!(sql.contains(
            "ORDER BY CASE WHEN LOWER(e.title) = $3 THEN 0 WHEN LOWER(e.title) LIKE $4 THEN 1 \
             WHEN LOWER(e.title) LIKE $5 THEN 2 ELSE 3 END, LOWER(e.title) ASC, e.id ASC LIMIT $6"
        ));
    }

    #[test]
    fn test_build_query_with_sort_and_date() {
        let search = EventSearch {
            date: NaiveDate::from_ymd_opt(2026, 1, 2),
            category: Some("Music".into()),
            sort: Some(SortKey::Popular),
            ..EventSearch::default()
        };
        let builder = search.build_query();
        let sql = builder.sql();
        assert!(sql.contains("AND e.starts_at >= $1 AND e.starts_at < $2"));
        assert!(sql.contains("AND LOWER(e.category) = $3"));
        assert!(sql.contains("ORDER BY active_registrations DESC, LOWER(e.title) ASC, e.id ASC"));
    }

    #[test]
    fn test_suggestions_query_and_ranking() {
        let builder = build_suggestions_query(SuggestionField::Title, "ja", SUGGESTION_LIMIT);
        let sql = builder.sql();
        assert!(sql.starts_with("SELECT value FROM (SELECT DISTINCT title AS value FROM events"));
        assert!(sql.contains("ORDER BY CASE WHEN LOWER(value) = $2"));

        let ranked = rank_suggestions(
            SuggestionField::Title,
            "ja",
            vec![
                "Music Jam Session".to_string(),
                "Jazz Night".to_string(),
                "Jazz Night".to_string(),
                "Yoga".to_string(),
            ],
            8,
        );
        assert_eq!(ranked, vec!["Jazz Night", "Music Jam Session"]);
    }
}
