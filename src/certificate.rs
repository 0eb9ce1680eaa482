//! Certificates are computed from progress on request and never stored.

use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};
use utoipa::ToSchema;

use crate::models::User;
use crate::utils::percentage;

/// Below this completion percentage no certificate is issued.
pub const MIN_PERCENTAGE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CertificateLevel {
    Beginner,
    Intermediate,
    Advanced,
    Fluent,
}

impl CertificateLevel {
    /// `None` when the percentage is below [`MIN_PERCENTAGE`].
    pub fn for_percentage(percentage: i64) -> Option<Self> {
        match percentage {
            p if p < MIN_PERCENTAGE => None,
            p if p < 40 => Some(CertificateLevel::Beginner),
            p if p < 70 => Some(CertificateLevel::Intermediate),
            p if p < 100 => Some(CertificateLevel::Advanced),
            _ => Some(CertificateLevel::Fluent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub user_id: i64,
    pub user_name: String,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub progress_percentage: i64,
    pub certificate_level: CertificateLevel,
    /// `YYYY-MM-DD`
    pub certificate_date: String,
    pub serial_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("You haven't completed enough lessons to earn a certificate yet.")]
pub struct NotEligible {
    pub completed_lessons: usize,
    pub progress_percentage: i64,
}

pub fn issue_certificate(
    user: &User,
    completed_lessons: usize,
    total_lessons: usize,
    date: Date,
) -> Result<Certificate, NotEligible> {
    let progress_percentage = percentage(completed_lessons, total_lessons);
    let level = match CertificateLevel::for_percentage(progress_percentage) {
        Some(level) if completed_lessons > 0 => level,
        _ => {
            return Err(NotEligible {
                completed_lessons,
                progress_percentage,
            });
        }
    };
    let certificate_date = date
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default();
    let compact_date = certificate_date.replace('-', "");
    Ok(Certificate {
        user_id: user.id,
        user_name: user.display_name.clone(),
        completed_lessons,
        total_lessons,
        progress_percentage,
        certificate_level: level,
        serial_number: format!("PT-{:05}-{:03}-{}", user.id, completed_lessons, compact_date),
        certificate_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn maria() -> User {
        User {
            id: 1,
            username: "demo".into(),
            password: String::new(),
            display_name: "Maria".into(),
            level: 3,
            xp: 250,
        }
    }

    #[test]
    fn tiers() {
        assert_eq!(CertificateLevel::for_percentage(0), None);
        assert_eq!(CertificateLevel::for_percentage(9), None);
        assert_eq!(CertificateLevel::for_percentage(10), Some(CertificateLevel::Beginner));
        assert_eq!(CertificateLevel::for_percentage(40), Some(CertificateLevel::Intermediate));
        assert_eq!(CertificateLevel::for_percentage(99), Some(CertificateLevel::Advanced));
        assert_eq!(CertificateLevel::for_percentage(100), Some(CertificateLevel::Fluent));
    }

    #[test]
    fn below_threshold_is_not_eligible() {
        let err = issue_certificate(&maria(), 0, 4, date!(2026 - 10 - 19)).unwrap_err();
        assert_eq!(err.completed_lessons, 0);
        assert!(issue_certificate(&maria(), 0, 0, date!(2026 - 10 - 19)).is_err());
        assert!(issue_certificate(&maria(), 1, 20, date!(2026 - 10 - 19)).is_err());
    }

    #[test]
    fn issued_certificate() {
        let cert = issue_certificate(&maria(), 2, 4, date!(2026 - 3 - 7)).unwrap();
        assert_eq!(cert.progress_percentage, 50);
        assert_eq!(cert.certificate_level, CertificateLevel::Intermediate);
        assert_eq!(cert.certificate_date, "2026-03-07");
        assert_eq!(cert.serial_number, "PT-00001-002-20260307");
        assert_eq!(cert.user_name, "Maria");
        let json = serde_json::to_value(&cert).unwrap();
        assert_eq!(json["certificateLevel"], "intermediate");
    }
}
