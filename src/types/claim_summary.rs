use serde::{Deserialize, Serialize};

/// One adjudication entry, at claim header or line level.
///
/// Category and reason fields are present only when the source resource coded them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Adjustment {
    /// Human-readable category, e.g. "Contractual Obligations".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_label: Option<String>,

    /// Category code, e.g. `CO`, `PR`, `submitted`, `benefit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_code: Option<String>,

    /// Party responsible for the amount ("Patient" or "Provider").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial_responsibility: Option<String>,

    /// CARC or RARC reason code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,

    /// `"CARC"` or `"RARC"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_type: Option<String>,

    /// Description of the reason code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Suggested follow-up for the reason code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_needed: Option<String>,

    /// Adjusted amount.
    #[serde(default)]
    pub amount: f64,

    /// ISO currency code.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// A coded diagnosis on the claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnosis {
    /// ICD code.
    #[serde(default)]
    pub code: Option<String>,

    /// Display text of the code.
    pub description: String,

    /// Diagnosis type, e.g. "principal" or "Admitting Diagnosis".
    #[serde(rename = "type")]
    pub diagnosis_type: String,
}

/// A service line and its adjudications.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Service display, or "Revenue Code NNNN" when only a revenue code is present.
    pub service: String,

    #[serde(default)]
    pub adjudications: Vec<Adjustment>,
}

/// Billable period of the claim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServicePeriod {
    #[serde(default)]
    pub start: Option<String>,

    #[serde(default)]
    pub end: Option<String>,
}

/// Normalized view of an ExplanationOfBenefit, as served by `GET /claims/{id}/summary`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClaimSummary {
    /// The unique claim identifier used to look the claim up.
    pub claim_id: String,

    /// The FHIR resource id.  Absent from sanitized summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fhir_id: Option<String>,

    /// Patient display name, or `"REDACTED"` in sanitized summaries.
    pub patient_name: String,

    /// Disposition, e.g. "Clean" or "Denied - Service not covered under plan".
    pub claim_status: String,

    /// FHIR outcome, e.g. "complete", "partial", "queued", "error".
    pub processing_status: String,

    /// Payment date, or "Pending".
    pub payment_date: String,

    #[serde(default)]
    pub service_period: ServicePeriod,

    #[serde(default)]
    pub billed_amount: f64,

    #[serde(default)]
    pub paid_amount: f64,

    /// Sum of `PR` adjustments.
    #[serde(default)]
    pub patient_responsibility: f64,

    /// Sum of `CO` adjustments.
    #[serde(default)]
    pub contractual_writeoff: f64,

    /// "CODE – description" of the principal diagnosis, or "Unknown".
    pub primary_diagnosis: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drg_code: Option<String>,

    #[serde(default)]
    pub diagnoses: Vec<Diagnosis>,

    /// Header-level adjustments.
    #[serde(default)]
    pub adjustments: Vec<Adjustment>,

    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl ClaimSummary {
    /// Returns true if the disposition reports a denial.
    pub fn is_denied(&self) -> bool {
        self.claim_status.to_ascii_lowercase().starts_with("denied")
    }

    /// Every adjustment carrying a reason code, header first, then line by line.
    pub fn coded_adjustments(&self) -> impl Iterator<Item = &Adjustment> {
        self.adjustments
            .iter()
            .chain(self.line_items.iter().flat_map(|item| item.adjudications.iter()))
            .filter(|adjustment| adjustment.reason_code.is_some())
    }

    /// A one-line description of the claim for status displays.
    pub fn context_line(&self) -> String {
        format!(
            "Claim {} ({}): billed ${:.2}, paid ${:.2}, patient responsibility ${:.2}",
            self.claim_id,
            self.claim_status,
            self.billed_amount,
            self.paid_amount,
            self.patient_responsibility
        )
    }
}
