use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default avatar shown when a user has not uploaded a picture
pub const DEFAULT_AVATAR_URL: &str = "/static/images/default-avatar.svg";

/// Processing status of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Denied,
    Paid,
    UnderReview,
}

impl ClaimStatus {
    /// All statuses in the order they are offered in filters
    pub const ALL: [ClaimStatus; 3] = [
        ClaimStatus::Denied,
        ClaimStatus::Paid,
        ClaimStatus::UnderReview,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Denied => "denied",
            ClaimStatus::Paid => "paid",
            ClaimStatus::UnderReview => "under_review",
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            ClaimStatus::Denied => "Denied",
            ClaimStatus::Paid => "Paid",
            ClaimStatus::UnderReview => "Under Review",
        }
    }

    /// Normalize loose input ("Under Review", "PAID") into a status
    pub fn normalize(raw: &str) -> Option<Self> {
        raw.trim().to_lowercase().replace(' ', "_").parse().ok()
    }
}

impl std::str::FromStr for ClaimStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "denied" => Ok(ClaimStatus::Denied),
            "paid" => Ok(ClaimStatus::Paid),
            "under_review" => Ok(ClaimStatus::UnderReview),
            _ => Err(format!("Invalid ClaimStatus variant: {}", s)),
        }
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Origin of a claim note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteType {
    Admin,
    System,
    User,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Admin => "admin",
            NoteType::System => "system",
            NoteType::User => "user",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NoteType::Admin => "Admin Note",
            NoteType::System => "System Flag",
            NoteType::User => "User Note",
        }
    }
}

impl std::str::FromStr for NoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(NoteType::Admin),
            "system" => Ok(NoteType::System),
            "user" => Ok(NoteType::User),
            _ => Err(format!("Invalid NoteType variant: {}", s)),
        }
    }
}

impl std::fmt::Display for NoteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An insurance claim under review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claim {
    pub id: i64,
    pub claim_id: String,
    pub patient_name: String,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub insurer: String,
    pub discharge_date: NaiveDate,
    pub cpt_codes: String,
    pub denial_reason: Option<String>,
    pub is_flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// Billed minus paid; negative when the insurer overpaid
    pub fn underpayment(&self) -> Decimal {
        self.billed_amount - self.paid_amount
    }

    /// CPT codes split on commas with blanks dropped
    pub fn cpt_code_list(&self) -> Vec<String> {
        self.cpt_codes
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Values needed to create or fully overwrite a claim
#[derive(Debug, Clone, PartialEq)]
pub struct NewClaim {
    pub claim_id: String,
    pub patient_name: String,
    pub billed_amount: Decimal,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
    pub insurer: String,
    pub discharge_date: NaiveDate,
    pub cpt_codes: String,
    pub denial_reason: Option<String>,
}

/// A note attached to a claim, joined with its author's username
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimNote {
    pub id: i64,
    pub claim_pk: i64,
    pub note_type: NoteType,
    pub content: String,
    pub created_by: Option<i64>,
    pub author_username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClaimNote {
    /// Name shown next to the note
    pub fn display_name(&self) -> String {
        match (self.note_type, &self.author_username) {
            (NoteType::Admin, _) | (NoteType::System, _) => self.note_type.label().to_string(),
            (NoteType::User, Some(username)) => username.clone(),
            (NoteType::User, None) => NoteType::User.label().to_string(),
        }
    }
}

/// Account used to sign in
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// "First Last" when either is set
    pub fn full_name(&self) -> Option<String> {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            None
        } else {
            Some(full.to_string())
        }
    }

    /// Full name, falling back to the username
    pub fn display_name(&self) -> String {
        self.full_name().unwrap_or_else(|| self.username.clone())
    }
}

/// Per-user profile details
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub profile_picture: Option<String>,
    pub bio: String,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Public URL of the picture, or the default avatar
    pub fn picture_url(&self, media_url: &str) -> String {
        match &self.profile_picture {
            Some(path) => format!("{}{}", media_url, path),
            None => DEFAULT_AVATAR_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_claim() -> Claim {
        Claim {
            id: 1,
            claim_id: "30001".to_string(),
            patient_name: "Virginia Rhodes".to_string(),
            billed_amount: Decimal::from_str("1200.50").unwrap(),
            paid_amount: Decimal::from_str("200.25").unwrap(),
            status: ClaimStatus::Denied,
            insurer: "United Healthcare".to_string(),
            discharge_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            cpt_codes: "99213, 82947,,99214 ".to_string(),
            denial_reason: None,
            is_flagged: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_round_trip_and_normalize() {
        for status in ClaimStatus::ALL {
            assert_eq!(ClaimStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(ClaimStatus::normalize("Under Review"), Some(ClaimStatus::UnderReview));
        assert_eq!(ClaimStatus::normalize(" PAID "), Some(ClaimStatus::Paid));
        assert_eq!(ClaimStatus::normalize("pending"), None);
    }

    #[test]
    fn test_claim_derived_values() {
        let claim = sample_claim();
        assert_eq!(claim.underpayment(), Decimal::from_str("1000.25").unwrap());
        assert_eq!(claim.cpt_code_list(), vec!["99213", "82947", "99214"]);
    }

    #[test]
    fn test_note_display_name() {
        let mut note = ClaimNote {
            id: 1,
            claim_pk: 1,
            note_type: NoteType::User,
            content: "called insurer".to_string(),
            created_by: Some(4),
            author_username: Some("dana".to_string()),
            created_at: Utc::now(),
        };
        assert_eq!(note.display_name(), "dana");
        note.author_username = None;
        assert_eq!(note.display_name(), "User Note");
        note.note_type = NoteType::Admin;
        note.author_username = Some("dana".to_string());
        assert_eq!(note.display_name(), "Admin Note");
    }

    #[test]
    fn test_profile_picture_fallback() {
        let mut profile = UserProfile {
            id: 1,
            user_id: 1,
            profile_picture: None,
            bio: String::new(),
            phone_number: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(profile.picture_url("/media/"), DEFAULT_AVATAR_URL);
        profile.profile_picture = Some("profile_pictures/user_1.png".to_string());
        assert_eq!(
            profile.picture_url("/media/"),
            "/media/profile_pictures/user_1.png"
        );
    }
}
