use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    #[serde(alias = "email")]
    Password,
    Google,
    Github,
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthProvider::Password => "password",
            AuthProvider::Google => "google",
            AuthProvider::Github => "github",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    #[serde(alias = "name")]
    pub display_name: String,
    pub email: String,
    pub auth_provider: AuthProvider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub university: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under-review",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "submitted" => Ok(ApplicationStatus::Submitted),
            "under-review" => Ok(ApplicationStatus::UnderReview),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!(
                "Unknown status '{}'. Expected submitted, under-review, accepted or rejected",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub id: i64, // creation time in millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_id: Option<String>, // absent on records written before this field existed
    pub candidate_name: String,
    pub subject: String,
    pub candidate_email: String,
    pub candidate_phone: String,
    pub address: String,
    pub date_of_birth: NaiveDate,
    pub college_id: u32,
    pub college_name: String,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, alias = "profileImageUrl")]
    pub profile_image_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub id: i64,
    #[serde(alias = "name")]
    pub author_name: String,
    #[serde(alias = "college")]
    pub college_name: String,
    pub rating: u8,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
}

/// Millisecond timestamp id, moved past the largest taken id if `now_millis`
/// is already in use.
pub fn timestamp_id(now_millis: i64, taken: impl IntoIterator<Item = i64>) -> i64 {
    let (max, collides) = taken
        .into_iter()
        .fold((None::<i64>, false), |(max, collides), id| {
            (Some(max.map_or(id, |m| m.max(id))), collides || id == now_millis)
        });
    match max {
        Some(max) if collides => max + 1,
        _ => now_millis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_id_avoids_collisions() {
        assert_eq!(timestamp_id(100, []), 100);
        assert_eq!(timestamp_id(100, [50, 99]), 100);
        assert_eq!(timestamp_id(100, [100]), 101);
        assert_eq!(timestamp_id(100, [100, 101, 102]), 103);
    }

    #[test]
    fn status_parses_loosely() {
        assert_eq!(
            "Under Review".parse::<ApplicationStatus>(),
            Ok(ApplicationStatus::UnderReview)
        );
        assert_eq!(
            "accepted".parse::<ApplicationStatus>(),
            Ok(ApplicationStatus::Accepted)
        );
        assert!("pending".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn status_serializes_kebab_case() {
        let json = serde_json::to_string(&ApplicationStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under-review\"");
    }

    #[test]
    fn legacy_review_shape_is_accepted() {
        let raw = r#"{
            "id": 1,
            "name": "Alex Johnson",
            "college": "Harvard University",
            "rating": 5,
            "comment": "Great campus",
            "avatar": "/student-profile.png",
            "submittedAt": "2024-01-15T10:30:00Z"
        }"#;
        let review: ReviewRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(review.author_name, "Alex Johnson");
        assert_eq!(review.college_name, "Harvard University");
        assert_eq!(review.rating, 5);
    }

    #[test]
    fn legacy_identity_shape_is_accepted() {
        let raw = r#"{
            "id": "google_1700000000000",
            "name": "Google User",
            "email": "user@gmail.com",
            "university": "",
            "authProvider": "google"
        }"#;
        let identity: Identity = serde_json::from_str(raw).unwrap();
        assert_eq!(identity.display_name, "Google User");
        assert_eq!(identity.auth_provider, AuthProvider::Google);
        assert_eq!(identity.address, None);

        let email_login = r#"{"id":"1","name":"John Doe","email":"j@x.io","authProvider":"email"}"#;
        let identity: Identity = serde_json::from_str(email_login).unwrap();
        assert_eq!(identity.auth_provider, AuthProvider::Password);
    }

    #[test]
    fn legacy_application_shape_is_accepted() {
        let raw = r#"{
            "candidateName": "Jane Roe",
            "subject": "Physics",
            "candidateEmail": "jane@example.com",
            "candidatePhone": "555-0100",
            "address": "1 Main St",
            "dateOfBirth": "2006-04-12",
            "profileImage": null,
            "collegeId": 3,
            "collegeName": "MIT",
            "id": 1718000000000,
            "status": "submitted",
            "submittedAt": "2024-06-10T06:13:20.000Z",
            "profileImageUrl": null
        }"#;
        let record: ApplicationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.applicant_id, None);
        assert_eq!(record.status, ApplicationStatus::Submitted);
        assert_eq!(record.college_id, 3);
    }
}
