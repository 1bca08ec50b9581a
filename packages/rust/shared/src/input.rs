//! Validated user input for a proposal run.

use serde::{Deserialize, Serialize};

use crate::error::{ProposalError, Result};

/// Industries the prompts are written for. `Other` accepts anything else.
pub const SUPPORTED_INDUSTRIES: &[&str] = &[
    "Manufacturing",
    "Automotive",
    "Finance",
    "Retail",
    "Healthcare",
    "Technology",
    "Energy",
    "Agriculture",
    "Transportation",
    "Education",
    "Real Estate",
    "Entertainment",
    "Telecommunications",
    "Aerospace",
    "Pharmaceuticals",
    "Food & Beverage",
    "Construction",
    "Other",
];

const COMPANY_MIN_LEN: usize = 2;
const COMPANY_MAX_LEN: usize = 100;
const FORBIDDEN_CHARS: &[char] = &['<', '>', '"', '\'', '&', ';', '(', ')', '|', '`', '$'];

/// Company and industry a proposal is generated for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalInput {
    pub company: String,
    pub industry: String,
}

impl ProposalInput {
    /// Validate and normalize user input.
    ///
    /// The company name is trimmed; the industry is matched case-insensitively
    /// and stored in its canonical spelling.
    pub fn new(company: &str, industry: &str) -> Result<Self> {
        let company = company.trim();
        let len = company.chars().count();
        if !(COMPANY_MIN_LEN..=COMPANY_MAX_LEN).contains(&len) {
            return Err(ProposalError::validation(format!(
                "company name must be {COMPANY_MIN_LEN}-{COMPANY_MAX_LEN} characters, got {len}"
            )));
        }
        if let Some(c) = company.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
            return Err(ProposalError::validation(format!(
                "company name contains forbidden character '{c}'"
            )));
        }

        let wanted = industry.trim();
        let industry = SUPPORTED_INDUSTRIES
            .iter()
            .find(|known| known.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ProposalError::validation(format!(
                    "industry '{wanted}' not supported (choose one of: {})",
                    SUPPORTED_INDUSTRIES.join(", ")
                ))
            })?;

        Ok(Self {
            company: company.to_string(),
            industry: (*industry).to_string(),
        })
    }

    /// File-name-safe slug of the company name.
    pub fn company_slug(&self) -> String {
        let slug: String = self
            .company
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        slug.split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_and_normalizes() {
        let input = ProposalInput::new("  Acme Robotics ", "manufacturing").expect("valid");
        assert_eq!(input.company, "Acme Robotics");
        assert_eq!(input.industry, "Manufacturing");
        assert_eq!(input.company_slug(), "acme-robotics");
    }

    #[test]
    fn rejects_bad_company_names() {
        assert!(ProposalInput::new("A", "Retail").is_err());
        assert!(ProposalInput::new(&"x".repeat(101), "Retail").is_err());
        let err = ProposalInput::new("Acme; DROP TABLE", "Retail").unwrap_err();
        assert!(err.to_string().contains("forbidden character"));
    }

    #[test]
    fn rejects_unknown_industry() {
        let err = ProposalInput::new("Acme", "Mining").unwrap_err();
        assert!(err.to_string().contains("Mining"));
        assert!(ProposalInput::new("Acme", "food & beverage").is_ok());
    }
}
