// 🏷️ Status Classifier
// Buckets assembled acknowledgments by status category for revenue tracking.
//
// Only two categories are actionable here: A7 (rejected at the gateway,
// feeds the reconciliation engine) and A1 (accepted for processing). Other
// categories stay in the total but in neither subset - not every status
// demands action.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::parser::AcknowledgmentRecord;

/// Claim rejected before adjudication. The critical category for revenue
/// tracking: these claims will never appear in an 835.
pub const CATEGORY_REJECTED: &str = "A7";

/// Claim accepted for processing.
pub const CATEGORY_ACCEPTED: &str = "A1";

// ============================================================================
// CLASSIFIED RESULT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedResult {
    /// Every committed acknowledgment, in document order.
    pub acknowledgments: Vec<AcknowledgmentRecord>,

    /// Subset with status category A7.
    pub rejections: Vec<AcknowledgmentRecord>,

    /// Subset with status category A1.
    pub acceptances: Vec<AcknowledgmentRecord>,

    pub summary: ClassificationSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub total_claims: usize,
    pub rejected_count: usize,
    pub accepted_count: usize,

    /// Rejected share of all claims, as a percentage. 0 when empty.
    pub rejection_rate: f64,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

pub struct StatusClassifier;

impl StatusClassifier {
    /// Partition records into rejection/acceptance subsets and compute
    /// summary counts.
    pub fn classify(records: Vec<AcknowledgmentRecord>) -> ClassifiedResult {
        let mut rejections = Vec::new();
        let mut acceptances = Vec::new();

        for record in &records {
            match record.status_category.as_deref() {
                Some(CATEGORY_REJECTED) => rejections.push(record.clone()),
                Some(CATEGORY_ACCEPTED) => acceptances.push(record.clone()),
                _ => {}
            }
        }

        let total = records.len();
        let summary = ClassificationSummary {
            total_claims: total,
            rejected_count: rejections.len(),
            accepted_count: acceptances.len(),
            rejection_rate: if total > 0 {
                rejections.len() as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        };

        info!(
            total = summary.total_claims,
            rejected = summary.rejected_count,
            accepted = summary.accepted_count,
            "classified claim acknowledgments"
        );

        ClassifiedResult {
            acknowledgments: records,
            rejections,
            acceptances,
            summary,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
