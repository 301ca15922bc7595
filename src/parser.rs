// 🏥 Claim Acknowledgment Assembler
// Rebuilds per-claim records from a flat 277CA segment stream.
//
// The 277CA is the "front door" rejection report: it identifies claims
// rejected BEFORE adjudication. Rejected claims never appear in the 835
// remittance, which is exactly why the reconciliation engine exists.
//
// Parsing is tolerant by contract: a bad field value leaves that field unset
// and records a FieldDiagnostic; it never aborts the enclosing record.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ParseError;
use crate::tokenizer::{tokenize, Delimiters, Segment};

// ============================================================================
// ACKNOWLEDGMENT RECORD
// ============================================================================

/// One claim-level acknowledgment, assembled between hierarchy boundaries.
/// Every field is optional until the corresponding segment populates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcknowledgmentRecord {
    pub claim_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub date_of_service: Option<String>,
    pub billed_amount: Option<f64>,
    pub status_category: Option<String>,
    pub status_code: Option<String>,
    pub rejection_reason: Option<String>,
    pub provider_npi: Option<String>,
    pub payer_claim_control_number: Option<String>,

    /// TRN02 trace. A record is only committed when this is non-empty.
    pub trace_number: Option<String>,

    /// Document-level BHT date, stamped at commit time. Used as the
    /// rejection date when aging unmatched claims.
    pub transaction_date: Option<String>,
}

impl AcknowledgmentRecord {
    fn has_trace(&self) -> bool {
        self.trace_number.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Field-level degradation noted while parsing. Part of the tolerant-mode
/// contract: callers get the partial record plus these, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiagnostic {
    pub segment_id: String,
    pub field: String,
    pub value: String,
    pub reason: String,
}

/// Parser output: committed records plus field-level diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub records: Vec<AcknowledgmentRecord>,
    pub diagnostics: Vec<FieldDiagnostic>,
}

// ============================================================================
// PARSER CONFIG
// ============================================================================

/// How to treat HL levels other than the claim boundary.
///
/// Real-world acknowledgment files sometimes use a four-deep hierarchy
/// (payer → receiver → provider → patient) that a single-level assembler
/// cannot group correctly. `RejectNested` refuses such documents outright
/// instead of silently mis-assembling them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HierarchyMode {
    /// Ignore non-claim HL levels (default).
    ClaimLevelOnly,
    /// Error on HL level codes that mark the nested provider/patient form.
    RejectNested,
}

/// HL level codes that only appear in the nested hierarchy form.
const NESTED_LEVEL_CODES: [&str; 3] = ["19", "PT", "23"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    pub delimiters: Delimiters,

    /// HL03 value that starts a new claim record. "22" in 005010X214.
    pub claim_level_code: String,

    pub hierarchy: HierarchyMode,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            delimiters: Delimiters::default(),
            claim_level_code: "22".to_string(),
            hierarchy: HierarchyMode::ClaimLevelOnly,
        }
    }
}

// ============================================================================
// ASSEMBLER
// ============================================================================

pub struct AckParser {
    config: ParserConfig,
}

impl AckParser {
    pub fn new() -> Self {
        AckParser {
            config: ParserConfig::default(),
        }
    }

    pub fn with_config(config: ParserConfig) -> Self {
        AckParser { config }
    }

    /// Parse raw 277CA text into committed claim records.
    ///
    /// A small state machine over the token stream: HL segments whose third
    /// element equals the claim-level code delimit records; every other
    /// segment is routed to its extractor while a record is in progress.
    /// Records without a trace number are silently dropped at commit time.
    ///
    /// Returns `ParseError::NoClaimsFound` when the stream commits nothing -
    /// there is nothing for downstream logic to act on.
    pub fn parse(&self, content: &str) -> Result<ParsedDocument, ParseError> {
        let segments = tokenize(content, &self.config.delimiters);
        debug!(segment_count = segments.len(), "tokenized acknowledgment document");

        let mut records: Vec<AcknowledgmentRecord> = Vec::new();
        let mut diagnostics: Vec<FieldDiagnostic> = Vec::new();
        let mut current: Option<AcknowledgmentRecord> = None;
        let mut transaction_date: Option<String> = None;

        for segment in &segments {
            match segment.id.as_str() {
                // BHT carries the transaction date for the whole document
                "BHT" => {
                    if let Some(date) = segment.element(3) {
                        transaction_date = Some(date.to_string());
                    }
                }
                "HL" if segment.elements.len() >= 3 => {
                    let level_code = &segment.elements[2];

                    if *level_code == self.config.claim_level_code {
                        commit(&mut records, current.take(), &transaction_date);
                        current = Some(AcknowledgmentRecord::default());
                    } else if self.config.hierarchy == HierarchyMode::RejectNested
                        && NESTED_LEVEL_CODES.contains(&level_code.as_str())
                    {
                        return Err(ParseError::UnsupportedHierarchy {
                            level: level_code.clone(),
                        });
                    }
                    // Other levels (information source "20", receiver "21")
                    // are envelope structure, not claim data
                }
                _ => {
                    if let Some(record) = current.as_mut() {
                        dispatch(segment, record, &mut diagnostics);
                    }
                }
            }
        }

        commit(&mut records, current.take(), &transaction_date);

        if records.is_empty() {
            return Err(ParseError::NoClaimsFound);
        }

        info!(
            claims = records.len(),
            diagnostics = diagnostics.len(),
            "assembled claim acknowledgments"
        );

        Ok(ParsedDocument {
            records,
            diagnostics,
        })
    }
}

impl Default for AckParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Push a finished record iff its trace number is set.
fn commit(
    records: &mut Vec<AcknowledgmentRecord>,
    record: Option<AcknowledgmentRecord>,
    transaction_date: &Option<String>,
) {
    if let Some(mut record) = record {
        if record.has_trace() {
            if record.transaction_date.is_none() {
                record.transaction_date = transaction_date.clone();
            }
            records.push(record);
        }
    }
}

/// Route a segment to its extractor by id. Unrecognized ids are ignored.
fn dispatch(segment: &Segment, record: &mut AcknowledgmentRecord, diagnostics: &mut Vec<FieldDiagnostic>) {
    match segment.id.as_str() {
        "NM1" => apply_nm1(segment, record),
        "TRN" => apply_trn(segment, record),
        "STC" => apply_stc(segment, record, diagnostics),
        "REF" => apply_ref(segment, record),
        "DTP" => apply_dtp(segment, record),
        "MSG" => apply_msg(segment, record),
        _ => {}
    }
}

// ============================================================================
// FIELD EXTRACTORS
// ============================================================================
// One pure function per segment type. Positional offsets are 0-based into
// the element list (segment id excluded) and must stay aligned with the
// 005010X214 field layout.

/// NM1 - Name. IL = insured/patient, 1P = provider.
fn apply_nm1(segment: &Segment, record: &mut AcknowledgmentRecord) {
    let Some(entity_code) = segment.element(0) else {
        return;
    };

    match entity_code {
        "IL" => {
            // First name then last name, as displayed
            if let Some(last) = segment.element(1) {
                record.patient_name = match segment.element(2) {
                    Some(first) => Some(format!("{} {}", first, last)),
                    None => Some(last.to_string()),
                };
            }
            if let Some(id) = segment.element(7) {
                record.patient_id = Some(id.to_string());
            }
        }
        "1P" => {
            if let Some(npi) = segment.element(7) {
                record.provider_npi = Some(npi.to_string());
            }
        }
        _ => {}
    }
}

/// TRN - Trace number, the commit gate for the whole record.
fn apply_trn(segment: &Segment, record: &mut AcknowledgmentRecord) {
    if let Some(trace) = segment.element(1) {
        record.trace_number = Some(trace.to_string());
    }
}

/// STC - Status Information, the segment that decides rejected vs accepted.
///
/// Element 0 is a composite "CATEGORY:CODE" (e.g. "A7:42"). The billed
/// amount lives at element 3, not element 2 - STC is
/// `STC*Status*Date*ActionCode*TotalClaimChargeAmount`.
fn apply_stc(segment: &Segment, record: &mut AcknowledgmentRecord, diagnostics: &mut Vec<FieldDiagnostic>) {
    if let Some(status_info) = segment.element(0) {
        if status_info.contains(':') {
            let mut parts = status_info.split(':');
            record.status_category = parts.next().map(|s| s.to_string());
            record.status_code = parts.next().filter(|s| !s.is_empty()).map(|s| s.to_string());
        }
    }

    if let Some(raw_amount) = segment.element(3) {
        match raw_amount.parse::<f64>() {
            Ok(amount) => record.billed_amount = Some(amount),
            Err(_) => diagnostics.push(FieldDiagnostic {
                segment_id: "STC".to_string(),
                field: "billed_amount".to_string(),
                value: raw_amount.to_string(),
                reason: "not a decimal amount".to_string(),
            }),
        }
    }
}

/// REF - Reference identification. D9 = patient account number (claim id),
/// EA = member id (a lower-priority patient identifier than NM1),
/// 1K = payer claim control number when one has been assigned.
fn apply_ref(segment: &Segment, record: &mut AcknowledgmentRecord) {
    let (Some(qualifier), Some(value)) = (segment.element(0), segment.element(1)) else {
        return;
    };

    match qualifier {
        "D9" => record.claim_id = Some(value.to_string()),
        "EA" => {
            if record.patient_id.is_none() {
                record.patient_id = Some(value.to_string());
            }
        }
        "1K" => record.payer_claim_control_number = Some(value.to_string()),
        _ => {}
    }
}

/// DTP - Date/time period. Qualifier 472 = service period.
fn apply_dtp(segment: &Segment, record: &mut AcknowledgmentRecord) {
    if segment.element(0) == Some("472") {
        if let Some(date) = segment.element(2) {
            record.date_of_service = Some(date.to_string());
        }
    }
}

/// MSG - Free-text rejection reason. Last message wins.
fn apply_msg(segment: &Segment, record: &mut AcknowledgmentRecord) {
    if let Some(text) = segment.element(0) {
        record.rejection_reason = Some(text.to_string());
    }
}

// ============================================================================
// TESTS
// ============================================================================
