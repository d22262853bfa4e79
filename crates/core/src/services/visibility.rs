//! Visibility projection.
//!
//! Turns a stored report into the view a given audience is allowed to see.
//! Public viewers never receive moderation details or reporter emails.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono_tz::Tz;
use civic_db::entities::{
    report::{self, ModerationStatus, ReportStatus},
    user,
};
use regex::Regex;
use serde::Serialize;

use super::gate::Audience;

/// Prefix every stored upload path must start with.
pub const UPLOADS_PREFIX: &str = "uploads/";

/// Display name used when a reporter has no name to show.
pub const ANONYMOUS_REPORTER: &str = "Resident";

const LOCATION_PARTS: usize = 2;
const LOCATION_MAX_CHARS: usize = 40;

#[allow(clippy::unwrap_used)]
static REMOTE_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:https?:)?//").unwrap());

#[allow(clippy::unwrap_used)]
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-_]+").unwrap());

/// A report as seen by one audience.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub id: String,
    pub title: String,
    pub category: String,
    pub category_label: String,
    pub status: ReportStatus,
    pub status_label: &'static str,
    pub reporter: String,
    pub reporter_initials: String,
    pub location: String,
    pub location_summary: String,
    pub summary: String,
    pub image: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub submitted_at: String,
    pub submitted_label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_status: Option<ModerationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_label: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderation_notes: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Builds [`ReportView`]s.
#[derive(Debug, Clone)]
pub struct Projector {
    web_root: PathBuf,
    timezone: Tz,
    moderation_enabled: bool,
}

impl Projector {
    /// Create a projector that resolves images below `web_root` and renders
    /// timestamps in `timezone`.
    #[must_use]
    pub const fn new(web_root: PathBuf, timezone: Tz, moderation_enabled: bool) -> Self {
        Self {
            web_root,
            timezone,
            moderation_enabled,
        }
    }

    /// Project `report` for `audience`. `reporter` is the submitting user, if
    /// known.
    #[must_use]
    pub fn project(
        &self,
        report: &report::Model,
        reporter: Option<&user::Model>,
        audience: Audience,
    ) -> ReportView {
        let privileged = matches!(audience, Audience::Owner | Audience::Admin);
        let show_moderation = privileged && self.moderation_enabled;
        let is_admin = audience == Audience::Admin;

        let reporter_name = reporter_display_name(reporter, privileged);
        let initials = user_initials(
            reporter.and_then(|u| u.first_name.as_deref()),
            reporter.and_then(|u| u.last_name.as_deref()),
            &reporter_name,
        );

        let submitted = report.created_at.with_timezone(&self.timezone);

        ReportView {
            id: report.id.clone(),
            title: report.title.clone(),
            category: report.category.clone(),
            category_label: category_label(Some(&report.category)),
            status: report.status,
            status_label: status_label(report.status),
            reporter: reporter_name,
            reporter_initials: initials,
            location: report.location.clone(),
            location_summary: summarize_location(&report.location),
            summary: report.description.clone(),
            image: self.safe_image_src(report.image_path.as_deref()),
            latitude: report.latitude,
            longitude: report.longitude,
            submitted_at: submitted.to_rfc3339(),
            submitted_label: submitted.format("%b %-d, %Y · %-I:%M %p").to_string(),

            moderation_status: show_moderation.then_some(report.moderation_status),
            moderation_label: show_moderation.then(|| moderation_label(report.moderation_status)),
            moderation_notes: report
                .moderation_notes
                .clone()
                .filter(|_| show_moderation),

            moderated_by: report
                .moderated_by
                .clone()
                .filter(|_| is_admin && self.moderation_enabled),
            moderated_at: report
                .moderated_at
                .filter(|_| is_admin && self.moderation_enabled)
                .map(|t| t.with_timezone(&self.timezone).to_rfc3339()),
            user_id: report.user_id.clone().filter(|_| is_admin),
        }
    }

    /// Return a source that is safe to put in an `img` tag, or `None`.
    ///
    /// Remote and `data:` sources pass through. Local paths must live under
    /// `uploads/` and exist on disk.
    #[must_use]
    pub fn safe_image_src(&self, raw: Option<&str>) -> Option<String> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        if REMOTE_SRC_RE.is_match(raw) || raw.to_ascii_lowercase().starts_with("data:") {
            return Some(raw.to_string());
        }

        let normalized = raw.replace('\\', "/");
        let mut relative = normalized.trim_start_matches('/');
        while let Some(rest) = relative.strip_prefix("./") {
            relative = rest.trim_start_matches('/');
        }

        if !relative.starts_with(UPLOADS_PREFIX)
            || relative.split('/').any(|seg| seg == ".." || seg.is_empty())
        {
            return None;
        }

        self.web_root
            .join(relative)
            .is_file()
            .then(|| format!("/{relative}"))
    }
}

fn reporter_display_name(reporter: Option<&user::Model>, privileged: bool) -> String {
    let Some(user) = reporter else {
        return ANONYMOUS_REPORTER.to_string();
    };
    user.full_name()
        .or_else(|| privileged.then(|| user.email.clone()))
        .unwrap_or_else(|| ANONYMOUS_REPORTER.to_string())
}

/// Human label for an operational status.
#[must_use]
pub const fn status_label(status: ReportStatus) -> &'static str {
    match status {
        ReportStatus::InProgress => "In progress",
        ReportStatus::Solved => "Solved",
        ReportStatus::Unresolved => "Unresolved",
    }
}

/// Human label for a moderation status.
#[must_use]
pub const fn moderation_label(status: ModerationStatus) -> &'static str {
    match status {
        ModerationStatus::Approved => "Approved",
        ModerationStatus::Denied => "Denied",
        ModerationStatus::Pending => "Awaiting review",
    }
}

/// Display name for a category slug.
#[must_use]
pub fn category_label(category: Option<&str>) -> String {
    let raw = category.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return "Report".to_string();
    }

    let key = SEPARATOR_RE
        .replace_all(&raw.to_lowercase(), "_")
        .trim_matches('_')
        .to_string();
    let known = match key.as_str() {
        "public_safety" => Some("Public Safety & Infrastructure"),
        "cleanliness" => Some("Cleanliness & Environment"),
        "public_facilities" => Some("Public Facilities"),
        "community" => Some("Community"),
        "other" => Some("Other Concerns"),
        _ => None,
    };
    if let Some(label) = known {
        return label.to_string();
    }

    SEPARATOR_RE
        .split(raw)
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Short form of a free-text address: the first two comma-separated parts,
/// capped at 40 characters.
#[must_use]
pub fn summarize_location(location: &str) -> String {
    let parts: Vec<&str> = location
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return String::new();
    }

    let summary = parts
        .iter()
        .take(LOCATION_PARTS)
        .copied()
        .collect::<Vec<_>>()
        .join(", ");

    if summary.chars().count() > LOCATION_MAX_CHARS {
        let cut: String = summary.chars().take(LOCATION_MAX_CHARS - 1).collect();
        format!("{}…", cut.trim_end())
    } else if parts.len() > LOCATION_PARTS {
        format!("{summary}…")
    } else {
        summary
    }
}

/// Up to two uppercase initials for an avatar bubble.
#[must_use]
pub fn user_initials(first_name: Option<&str>, last_name: Option<&str>, display: &str) -> String {
    let initial = |s: &str| s.trim().chars().next().map(|c| c.to_uppercase().to_string());

    let from_names: String = [first_name, last_name]
        .into_iter()
        .flatten()
        .filter_map(initial)
        .collect();
    if !from_names.is_empty() {
        return from_names;
    }

    let words: Vec<&str> = display.split_whitespace().collect();
    match words.as_slice() {
        [] => "R".to_string(),
        [only] => initial(*only).unwrap_or_default(),
        [first, .., last] => [initial(*first), initial(*last)]
            .into_iter()
            .flatten()
            .collect(),
    }
}
