// ⚖️ Claim Reconciliation Engine - Black hole detection
// Cross-references 277CA gateway rejections with 835 remittance payments.
//
// The failure mode this catches:
//   1. Claim submitted, rejected at the gate (277CA, category A7)
//   2. Staff misses the rejection alert
//   3. Staff waits for the 835 payment
//   4. The 835 never comes - the claim was never adjudicated
//   5. Revenue lost forever unless flagged
//
// There is no authoritative claim control number at rejection time, so
// matching uses a deliberately lossy composite key (patient + service date
// + truncated amount). False and missed matches are a known, accepted
// tradeoff of that key - do not tighten it without new requirements.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::parser::AcknowledgmentRecord;

/// Days-since-rejection above which an alert escalates from MEDIUM to HIGH.
const HIGH_SEVERITY_AGE_DAYS: i64 = 45;

// ============================================================================
// CACHE ENTRIES
// ============================================================================

/// Tracked rejection, keyed by composite match key. Created by
/// `add_rejections`; only `add_payments` mutates it (flips the found flag).
/// Entries are never deleted for the life of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub rejection_date: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub date_of_service: Option<String>,
    pub billed_amount: Option<f64>,
    pub rejection_reason: Option<String>,
    pub status_code: Option<String>,
    pub trace_number: Option<String>,
    pub found_in_835: bool,
    pub resubmission_date: Option<String>,
}

/// Mapping-shaped payment record produced by the external 835 structural
/// decoder. Everything is optional; missing fields just weaken the match key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRecord {
    pub patient_id: Option<String>,
    pub date_of_service: Option<String>,
    #[serde(alias = "charged_amount")]
    pub billed_amount: Option<f64>,
    pub payment_date: Option<String>,
    pub paid_amount: Option<f64>,
    pub claim_status: Option<String>,
}

/// Stored payment, immutable after `add_payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    pub payment_date: Option<String>,
    pub patient_id: Option<String>,
    pub paid_amount: Option<f64>,
    pub claim_status: Option<String>,
}

// ============================================================================
// ALERTS & SUMMARY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertSeverity {
    High,
    Medium,
}

/// Read-only snapshot of one unmatched rejection past the age threshold.
/// Computed on demand, never stored in the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubmittedAlert {
    pub severity: AlertSeverity,
    pub match_key: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub date_of_service: Option<String>,
    pub billed_amount: Option<f64>,
    pub rejection_date: String,
    pub rejection_reason: Option<String>,
    pub days_since_rejection: i64,
    pub estimated_revenue_loss: f64,
    pub action_required: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_rejections_tracked: usize,
    pub successfully_resubmitted: usize,
    pub still_unsubmitted: usize,

    /// Resubmitted share of tracked rejections, as a percentage.
    pub resubmission_rate: f64,

    /// Sum of billed amounts over entries never seen in an 835.
    pub potential_revenue_at_risk: f64,

    pub tracking_period_days: i64,
}

/// Full on-demand report: alerts plus summary, ready to serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub generated_at: DateTime<Utc>,
    pub unsubmitted_claims: Vec<UnsubmittedAlert>,
    pub summary: ReconciliationSummary,
    pub alert_count: usize,
    pub high_severity_count: usize,
}

// ============================================================================
// MATCH KEY
// ============================================================================

/// Build the composite match key shared by rejections and payments.
///
/// Requires a patient id plus at least one more component. Service-date
/// ranges ("YYYYMMDD-YYYYMMDD") normalize to the range start; amounts
/// truncate toward zero to whole units, tolerating cent-level drift between
/// documents. Components join with `|`.
pub fn create_match_key(
    patient_id: Option<&str>,
    date_of_service: Option<&str>,
    amount: Option<f64>,
) -> Option<String> {
    let patient_id = patient_id?.trim();
    if patient_id.is_empty() {
        return None;
    }

    let mut parts = vec![patient_id.to_string()];

    if let Some(dos) = date_of_service {
        let dos = normalize_service_date(dos);
        if !dos.is_empty() {
            parts.push(dos);
        }
    }

    if let Some(amount) = amount {
        parts.push(format!("{}", amount.trunc() as i64));
    }

    // Patient id alone is not enough to match on
    if parts.len() >= 2 {
        Some(parts.join("|"))
    } else {
        None
    }
}

fn normalize_service_date(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains('-') {
        let parts: Vec<&str> = raw.split('-').collect();
        if parts.len() == 2 && parts[0].len() == 8 {
            return parts[0].to_string();
        }
    }
    raw.to_string()
}

/// Rejection dates arrive as compact "YYYYMMDD" or dashed "YYYY-MM-DD".
fn parse_rejection_date(raw: &str) -> Option<NaiveDate> {
    let format = if raw.contains('-') { "%Y-%m-%d" } else { "%Y%m%d" };
    NaiveDate::parse_from_str(raw, format).ok()
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// One engine instance = one reconciliation session. The engine exclusively
/// owns both caches; hosts ingesting documents concurrently must serialize
/// access to a given instance. Nothing is persisted - cache lifetime is the
/// owner's process lifetime.
pub struct ReconciliationEngine {
    /// How far back this session is meant to look for missing resubmissions.
    lookback_days: i64,

    rejections: HashMap<String, CacheEntry>,
    payments: HashMap<String, PaymentEntry>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::with_lookback(60)
    }

    pub fn with_lookback(lookback_days: i64) -> Self {
        ReconciliationEngine {
            lookback_days,
            rejections: HashMap::new(),
            payments: HashMap::new(),
        }
    }

    /// Drop all tracked state, keeping the configuration.
    pub fn reset(&mut self) {
        self.rejections.clear();
        self.payments.clear();
    }

    /// Track 277CA rejections. Relevant fields are copied out of the
    /// caller-owned records; re-adding the same key overwrites the entry
    /// rather than accumulating.
    pub fn add_rejections(&mut self, records: &[AcknowledgmentRecord]) {
        for record in records {
            let Some(key) = create_match_key(
                record.patient_id.as_deref(),
                record.date_of_service.as_deref(),
                record.billed_amount,
            ) else {
                // Not an engine failure - the record just can't participate
                continue;
            };

            info!(
                match_key = %key,
                patient_id = record.patient_id.as_deref().unwrap_or("<unknown>"),
                "tracked 277CA rejection"
            );

            self.rejections.insert(
                key,
                CacheEntry {
                    rejection_date: record.transaction_date.clone(),
                    patient_id: record.patient_id.clone(),
                    patient_name: record.patient_name.clone(),
                    date_of_service: record.date_of_service.clone(),
                    billed_amount: record.billed_amount,
                    rejection_reason: record.rejection_reason.clone(),
                    status_code: record.status_code.clone(),
                    trace_number: record.trace_number.clone(),
                    found_in_835: false,
                    resubmission_date: None,
                },
            );
        }
    }

    /// Ingest 835 payments and mark matching rejections as resubmitted.
    pub fn add_payments(&mut self, payments: &[PaymentRecord]) {
        for payment in payments {
            let Some(key) = create_match_key(
                payment.patient_id.as_deref(),
                payment.date_of_service.as_deref(),
                payment.billed_amount,
            ) else {
                continue;
            };

            self.payments.insert(
                key.clone(),
                PaymentEntry {
                    payment_date: payment.payment_date.clone(),
                    patient_id: payment.patient_id.clone(),
                    paid_amount: payment.paid_amount,
                    claim_status: payment.claim_status.clone(),
                },
            );

            if let Some(entry) = self.rejections.get_mut(&key) {
                entry.found_in_835 = true;
                entry.resubmission_date = payment.payment_date.clone();
                info!(match_key = %key, "matched 835 payment to 277CA rejection - claim was resubmitted");
            }
        }
    }

    /// Find rejections older than `threshold_days` with no 835 match, as of
    /// the current date. Result is sorted oldest first (highest risk).
    pub fn find_unsubmitted(&self, threshold_days: i64) -> Vec<UnsubmittedAlert> {
        self.find_unsubmitted_as_of(threshold_days, Utc::now().date_naive())
    }

    /// Deterministic variant of `find_unsubmitted` for tests and batch runs
    /// pinned to a reference date.
    pub fn find_unsubmitted_as_of(&self, threshold_days: i64, as_of: NaiveDate) -> Vec<UnsubmittedAlert> {
        let mut alerts = Vec::new();

        for (match_key, entry) in &self.rejections {
            if entry.found_in_835 {
                continue;
            }

            let Some(raw_date) = entry.rejection_date.as_deref() else {
                continue;
            };

            let Some(rejection_date) = parse_rejection_date(raw_date) else {
                warn!(rejection_date = raw_date, match_key = %match_key, "skipping entry with unparseable rejection date");
                continue;
            };

            let age = (as_of - rejection_date).num_days();
            if age <= threshold_days {
                continue;
            }

            let severity = if age > HIGH_SEVERITY_AGE_DAYS {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };

            warn!(
                patient_id = entry.patient_id.as_deref().unwrap_or("<unknown>"),
                billed = entry.billed_amount.unwrap_or(0.0),
                days = age,
                "unsubmitted claim detected"
            );

            alerts.push(UnsubmittedAlert {
                severity,
                match_key: match_key.clone(),
                patient_id: entry.patient_id.clone(),
                patient_name: entry.patient_name.clone(),
                date_of_service: entry.date_of_service.clone(),
                billed_amount: entry.billed_amount,
                rejection_date: raw_date.to_string(),
                rejection_reason: entry.rejection_reason.clone(),
                days_since_rejection: age,
                estimated_revenue_loss: entry.billed_amount.unwrap_or(0.0),
                action_required: "Review rejection reason and resubmit corrected claim. \
                                  This claim will never appear in an 835 until resubmitted."
                    .to_string(),
            });
        }

        // Oldest first - highest priority at the top
        alerts.sort_by(|a, b| b.days_since_rejection.cmp(&a.days_since_rejection));

        alerts
    }

    /// Summary statistics over the whole session.
    pub fn summary(&self) -> ReconciliationSummary {
        let total = self.rejections.len();
        let resubmitted = self.rejections.values().filter(|r| r.found_in_835).count();

        let potential_loss: f64 = self
            .rejections
            .values()
            .filter(|r| !r.found_in_835)
            .filter_map(|r| r.billed_amount)
            .sum();

        ReconciliationSummary {
            total_rejections_tracked: total,
            successfully_resubmitted: resubmitted,
            still_unsubmitted: total - resubmitted,
            resubmission_rate: if total > 0 {
                resubmitted as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            potential_revenue_at_risk: potential_loss,
            tracking_period_days: self.lookback_days,
        }
    }

    /// Full report: alerts plus summary, stamped with the generation time.
    pub fn report(&self, threshold_days: i64) -> ReconciliationReport {
        let unsubmitted_claims = self.find_unsubmitted(threshold_days);
        let summary = self.summary();
        let high_severity_count = unsubmitted_claims
            .iter()
            .filter(|a| a.severity == AlertSeverity::High)
            .count();

        info!(
            alerts = unsubmitted_claims.len(),
            at_risk = summary.potential_revenue_at_risk,
            "generated reconciliation report"
        );

        ReconciliationReport {
            generated_at: Utc::now(),
            alert_count: unsubmitted_claims.len(),
            high_severity_count,
            unsubmitted_claims,
            summary,
        }
    }

    /// Number of payments stored this session.
    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }

    /// Look up a tracked rejection by its match key.
    pub fn rejection(&self, match_key: &str) -> Option<&CacheEntry> {
        self.rejections.get(match_key)
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rejection(patient_id: &str, dos: &str, amount: f64, rejection_date: &str) -> AcknowledgmentRecord {
        AcknowledgmentRecord {
            patient_id: Some(patient_id.to_string()),
            patient_name: Some("JANE DOE".to_string()),
            date_of_service: Some(dos.to_string()),
            billed_amount: Some(amount),
            status_category: Some("A7".to_string()),
            rejection_reason: Some("MISSING SUBSCRIBER DOB".to_string()),
            trace_number: Some("TRACE-001".to_string()),
            transaction_date: Some(rejection_date.to_string()),
            ..AcknowledgmentRecord::default()
        }
    }

    fn payment(patient_id: &str, dos: &str, amount: f64) -> PaymentRecord {
        PaymentRecord {
            patient_id: Some(patient_id.to_string()),
            date_of_service: Some(dos.to_string()),
            billed_amount: Some(amount),
            payment_date: Some("20240301".to_string()),
            paid_amount: Some(amount),
            claim_status: Some("1".to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Match key
    // ------------------------------------------------------------------

    #[test]
    fn test_match_key_deterministic_across_record_types() {
        let from_rejection = create_match_key(Some("123"), Some("20240101"), Some(150.00));
        let from_payment = create_match_key(Some("123"), Some("20240101"), Some(150.00));

        assert_eq!(from_rejection, from_payment);
        assert_eq!(from_rejection.unwrap(), "123|20240101|150");
    }

    #[test]
    fn test_match_key_requires_patient_id() {
        assert_eq!(create_match_key(None, Some("20240101"), Some(150.0)), None);
        assert_eq!(create_match_key(Some(""), Some("20240101"), Some(150.0)), None);
    }

    #[test]
    fn test_match_key_patient_id_alone_insufficient() {
        assert_eq!(create_match_key(Some("123"), None, None), None);
    }

    #[test]
    fn test_match_key_two_components_suffice() {
        assert_eq!(
            create_match_key(Some("123"), Some("20240101"), None).unwrap(),
            "123|20240101"
        );
        assert_eq!(create_match_key(Some("123"), None, Some(99.99)).unwrap(), "123|99");
    }

    #[test]
    fn test_match_key_normalizes_date_range_to_start() {
        let key = create_match_key(Some("123"), Some("20050831-20050906"), Some(150.0));
        assert_eq!(key.unwrap(), "123|20050831|150");
    }

    #[test]
    fn test_match_key_truncates_fractional_cents() {
        // 150.00 vs 150.75 must land on the same key
        let a = create_match_key(Some("123"), Some("20240101"), Some(150.00));
        let b = create_match_key(Some("123"), Some("20240101"), Some(150.75));
        assert_eq!(a, b);
    }

    // ------------------------------------------------------------------
    // Ingestion & matching
    // ------------------------------------------------------------------

    #[test]
    fn test_payment_flips_found_flag() {
        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, "20240105")]);
        engine.add_payments(&[payment("123", "20240101", 150.00)]);

        let entry = engine.rejection("123|20240101|150").unwrap();
        assert!(entry.found_in_835);
        assert_eq!(entry.resubmission_date.as_deref(), Some("20240301"));

        // Matched claims never alert, whatever the threshold
        assert!(engine.find_unsubmitted(0).is_empty());
        assert_eq!(engine.payment_count(), 1);
    }

    #[test]
    fn test_unmatched_payment_is_stored_without_effect() {
        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, "20240105")]);
        engine.add_payments(&[payment("999", "20240101", 150.00)]);

        assert!(!engine.rejection("123|20240101|150").unwrap().found_in_835);
        assert_eq!(engine.payment_count(), 1);
    }

    #[test]
    fn test_record_without_key_excluded_from_cache() {
        let mut engine = ReconciliationEngine::new();
        let mut record = rejection("123", "20240101", 150.00, "20240105");
        record.patient_id = None;

        engine.add_rejections(&[record]);
        assert_eq!(engine.summary().total_rejections_tracked, 0);
    }

    #[test]
    fn test_repeated_add_overwrites_not_accumulates() {
        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, "20240105")]);
        engine.add_rejections(&[rejection("123", "20240101", 150.25, "20240106")]);

        let summary = engine.summary();
        assert_eq!(summary.total_rejections_tracked, 1);
        assert_eq!(summary.potential_revenue_at_risk, 150.25);
    }

    // ------------------------------------------------------------------
    // Aging & severity
    // ------------------------------------------------------------------

    #[test]
    fn test_severity_medium_at_45_days_high_at_46() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let at_45 = (as_of - Duration::days(45)).format("%Y%m%d").to_string();
        let at_46 = (as_of - Duration::days(46)).format("%Y%m%d").to_string();

        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, &at_45)]);

        let alerts = engine.find_unsubmitted_as_of(30, as_of);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Medium);
        assert_eq!(alerts[0].days_since_rejection, 45);

        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, &at_46)]);

        let alerts = engine.find_unsubmitted_as_of(30, as_of);
        assert_eq!(alerts[0].severity, AlertSeverity::High);
    }

    #[test]
    fn test_age_must_exceed_threshold() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let at_30 = (as_of - Duration::days(30)).format("%Y%m%d").to_string();

        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, &at_30)]);

        // Exactly at the threshold: not yet alertable
        assert!(engine.find_unsubmitted_as_of(30, as_of).is_empty());
        assert_eq!(engine.find_unsubmitted_as_of(29, as_of).len(), 1);
    }

    #[test]
    fn test_dashed_rejection_dates_accepted() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("123", "20240101", 150.00, "2024-01-05")]);

        let alerts = engine.find_unsubmitted_as_of(30, as_of);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rejection_date, "2024-01-05");
    }

    #[test]
    fn test_unparseable_dates_skipped_not_fatal() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[
            rejection("123", "20240101", 150.00, "JUNK"),
            rejection("456", "20240102", 200.00, "20240101"),
        ]);

        let alerts = engine.find_unsubmitted_as_of(30, as_of);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].patient_id.as_deref(), Some("456"));
    }

    #[test]
    fn test_missing_rejection_date_skipped() {
        let as_of = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let mut engine = ReconciliationEngine::new();
        let mut record = rejection("123", "20240101", 150.00, "20240105");
        record.transaction_date = None;
        engine.add_rejections(&[record]);

        assert!(engine.find_unsubmitted_as_of(0, as_of).is_empty());
        // Still tracked and still counted as revenue at risk
        assert_eq!(engine.summary().potential_revenue_at_risk, 150.00);
    }

    #[test]
    fn test_alerts_sorted_by_descending_age() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[
            rejection("1", "20240101", 100.00, "20240401"),
            rejection("2", "20240102", 200.00, "20240101"),
            rejection("3", "20240103", 300.00, "20240301"),
        ]);

        let alerts = engine.find_unsubmitted_as_of(10, as_of);
        assert_eq!(alerts.len(), 3);
        assert!(alerts[0].days_since_rejection >= alerts[1].days_since_rejection);
        assert!(alerts[1].days_since_rejection >= alerts[2].days_since_rejection);
        assert_eq!(alerts[0].patient_id.as_deref(), Some("2"));
    }

    // ------------------------------------------------------------------
    // Summary & report
    // ------------------------------------------------------------------

    #[test]
    fn test_summary_revenue_at_risk() {
        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[
            rejection("1", "20240101", 100.50, "20240105"),
            rejection("2", "20240102", 200.00, "20240105"),
            rejection("3", "20240103", 300.00, "20240105"),
        ]);
        engine.add_payments(&[payment("2", "20240102", 200.00)]);

        let summary = engine.summary();
        assert_eq!(summary.total_rejections_tracked, 3);
        assert_eq!(summary.successfully_resubmitted, 1);
        assert_eq!(summary.still_unsubmitted, 2);
        assert!((summary.resubmission_rate - 100.0 / 3.0).abs() < 1e-9);
        assert!((summary.potential_revenue_at_risk - 400.50).abs() < 1e-9);
    }

    #[test]
    fn test_empty_engine_summary() {
        let summary = ReconciliationEngine::new().summary();
        assert_eq!(summary.total_rejections_tracked, 0);
        assert_eq!(summary.resubmission_rate, 0.0);
        assert_eq!(summary.potential_revenue_at_risk, 0.0);
        assert_eq!(summary.tracking_period_days, 60);
    }

    #[test]
    fn test_report_counts() {
        let mut engine = ReconciliationEngine::with_lookback(90);
        engine.add_rejections(&[
            rejection("1", "20230101", 100.00, "20230105"),
            rejection("2", "20230102", 200.00, "20230105"),
        ]);

        let report = engine.report(30);
        assert_eq!(report.alert_count, report.unsubmitted_claims.len());
        assert_eq!(report.alert_count, 2);
        // Both rejections are years old by now
        assert_eq!(report.high_severity_count, 2);
        assert_eq!(report.summary.tracking_period_days, 90);
    }

    #[test]
    fn test_reset_clears_caches() {
        let mut engine = ReconciliationEngine::new();
        engine.add_rejections(&[rejection("1", "20240101", 100.00, "20240105")]);
        engine.add_payments(&[payment("1", "20240101", 100.00)]);

        engine.reset();
        assert_eq!(engine.summary().total_rejections_tracked, 0);
        assert_eq!(engine.payment_count(), 0);
    }

    #[test]
    fn test_payment_record_accepts_charged_amount_alias() {
        let json = r#"{"patient_id":"123","date_of_service":"20240101","charged_amount":150.0}"#;
        let record: PaymentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.billed_amount, Some(150.0));
    }

    #[test]
    fn test_alert_severity_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&AlertSeverity::High).unwrap(), "\"HIGH\"");
        assert_eq!(serde_json::to_string(&AlertSeverity::Medium).unwrap(), "\"MEDIUM\"");
    }
}
