// ✅ Acknowledgment Quality Checks
// Optional post-parse pass over classified output.
//
// Produces human-readable warnings, never errors: parsing already committed
// to tolerating partial records, this pass just tells the operator which
// ones are too thin to reconcile.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifiedResult, CATEGORY_REJECTED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Record cannot be used for reconciliation at all
    Critical,
    /// Record is usable but incomplete
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityWarning {
    pub severity: Severity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.severity, self.field, self.message)
    }
}

/// Check classified acknowledgments for gaps that undermine revenue
/// tracking:
/// - records missing both patient id and trace number (nothing to
///   cross-reference against the 835)
/// - rejected claims with no rejection reason (nothing for staff to fix)
pub fn validate_acknowledgments(result: &ClassifiedResult) -> Vec<QualityWarning> {
    let mut warnings = Vec::new();

    for ack in &result.acknowledgments {
        if ack.patient_id.is_none() && ack.trace_number.is_none() {
            warnings.push(QualityWarning {
                severity: Severity::Critical,
                field: "patient_id".to_string(),
                message: "missing patient identifier and trace number - cannot cross-reference with 835"
                    .to_string(),
            });
        }

        if ack.status_category.as_deref() == Some(CATEGORY_REJECTED) && ack.rejection_reason.is_none() {
            warnings.push(QualityWarning {
                severity: Severity::Warning,
                field: "rejection_reason".to_string(),
                message: format!(
                    "rejection for patient {} missing rejection reason",
                    ack.patient_id.as_deref().unwrap_or("<unknown>")
                ),
            });
        }
    }

    warnings
}

// ============================================================================
// TESTS
// ============================================================================
