use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{info, warn};

use crate::catalog::{self, College};
use crate::error::{AdmitError, AdmitResult};
use crate::models::{timestamp_id, ApplicationRecord, ApplicationStatus, Identity};
use crate::store::{LocalStore, KEY_APPLICATIONS};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Which applications a signed-in user gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingMode {
    /// Every stored application, whoever submitted it.
    #[default]
    Legacy,
    /// Only applications submitted by the current identity.
    Strict,
}

impl FromStr for ListingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(ListingMode::Legacy),
            "strict" => Ok(ListingMode::Strict),
            other => Err(format!(
                "Unknown listing mode '{}'. Expected legacy or strict",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub candidate_name: String,
    pub subject: String,
    pub candidate_email: String,
    pub candidate_phone: String,
    pub address: String,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_image: Option<String>,
}

impl ApplicationForm {
    /// Blank form with the applicant's name and email filled in from their
    /// identity.
    pub fn prefilled(identity: &Identity) -> Self {
        Self {
            candidate_name: identity.display_name.clone(),
            candidate_email: identity.email.clone(),
            ..Default::default()
        }
    }
}

pub struct ApplicationManager {
    store: LocalStore,
    mode: ListingMode,
}

impl ApplicationManager {
    pub fn new(store: LocalStore, mode: ListingMode) -> Self {
        Self { store, mode }
    }

    pub async fn submit_application(
        &self,
        identity: &Identity,
        form: ApplicationForm,
        college_id: u32,
    ) -> AdmitResult<ApplicationRecord> {
        let (college, date_of_birth) = validate(&form, college_id)?;

        let mut applications = self
            .store
            .load_list::<ApplicationRecord>(KEY_APPLICATIONS)
            .await
            .map_err(AdmitError::Submission)?;
        let now = Utc::now();
        let taken: Vec<i64> = applications
            .items
            .iter()
            .map(|a| a.id)
            .chain(applications.rejected_ids())
            .collect();
        let record = ApplicationRecord {
            id: timestamp_id(now.timestamp_millis(), taken),
            applicant_id: Some(identity.id.clone()),
            candidate_name: form.candidate_name.trim().to_string(),
            subject: form.subject,
            candidate_email: form.candidate_email.trim().to_string(),
            candidate_phone: form.candidate_phone.trim().to_string(),
            address: form.address.trim().to_string(),
            date_of_birth,
            college_id: college.id,
            college_name: college.name.to_string(),
            status: ApplicationStatus::Submitted,
            submitted_at: now,
            profile_image_ref: form.profile_image.filter(|r| !r.trim().is_empty()),
        };

        applications.items.push(record.clone());
        self.store
            .save_list(KEY_APPLICATIONS, &applications)
            .await
            .map_err(|e| {
                warn!(college = college.name, error = %e, "application write failed");
                AdmitError::Submission(e)
            })?;

        info!(id = record.id, college = college.name, subject = %record.subject, "application submitted");
        Ok(record)
    }

    pub async fn list_applications(&self, identity: &Identity) -> Vec<ApplicationRecord> {
        let applications: Vec<ApplicationRecord> = self.store.read_list(KEY_APPLICATIONS).await;
        match self.mode {
            ListingMode::Legacy => applications,
            ListingMode::Strict => applications
                .into_iter()
                .filter(|a| belongs_to(a, identity))
                .collect(),
        }
    }

    pub async fn find_application(&self, id: i64) -> Option<ApplicationRecord> {
        self.store
            .read_list::<ApplicationRecord>(KEY_APPLICATIONS)
            .await
            .into_iter()
            .find(|a| a.id == id)
    }

    /// Entry point for whatever decides admissions. Any status may follow any
    /// other.
    pub async fn set_status(&self, id: i64, status: ApplicationStatus) -> AdmitResult<ApplicationRecord> {
        let mut applications = self
            .store
            .load_list::<ApplicationRecord>(KEY_APPLICATIONS)
            .await
            .map_err(AdmitError::Submission)?;
        let record = applications
            .items
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AdmitError::UnknownApplication(id))?;
        record.status = status;
        let updated = record.clone();

        self.store
            .save_list(KEY_APPLICATIONS, &applications)
            .await
            .map_err(AdmitError::Submission)?;
        info!(id, status = %status, "application status changed");
        Ok(updated)
    }

    pub async fn count(&self) -> usize {
        self.store
            .read_list::<ApplicationRecord>(KEY_APPLICATIONS)
            .await
            .len()
    }
}

fn belongs_to(application: &ApplicationRecord, identity: &Identity) -> bool {
    match &application.applicant_id {
        Some(id) => *id == identity.id,
        None => application
            .candidate_email
            .eq_ignore_ascii_case(identity.email.trim()),
    }
}

fn validate(form: &ApplicationForm, college_id: u32) -> AdmitResult<(&'static College, NaiveDate)> {
    require(&form.candidate_name, "candidateName")?;
    require(&form.candidate_email, "candidateEmail")?;
    require(&form.candidate_phone, "candidatePhone")?;
    require(&form.address, "address")?;
    require(&form.subject, "subject")?;
    let date_of_birth = form
        .date_of_birth
        .ok_or(AdmitError::MissingField("dateOfBirth"))?;

    if !looks_like_email(form.candidate_email.trim()) {
        return Err(AdmitError::InvalidEmail(form.candidate_email.clone()));
    }

    let college = catalog::find(college_id).ok_or(AdmitError::UnknownCollege(college_id))?;
    if !college.accepts_applications() {
        return Err(AdmitError::AdmissionClosed {
            college: college.name.to_string(),
        });
    }
    if !college.offers(&form.subject) {
        return Err(AdmitError::UnknownProgram {
            subject: form.subject.clone(),
            college: college.name.to_string(),
        });
    }

    Ok((college, date_of_birth))
}

fn require(value: &str, field: &'static str) -> AdmitResult<()> {
    if value.trim().is_empty() {
        return Err(AdmitError::MissingField(field));
    }
    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}
