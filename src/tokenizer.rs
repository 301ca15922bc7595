// 🧩 Segment Tokenizer
// Splits raw X12 text into an ordered stream of {id, elements} segments.
//
// No envelope validation happens here: unrecognized segment ids pass through
// untouched, short segments simply have fewer elements. The assembler and
// extractors are responsible for handling whatever comes out.

use serde::{Deserialize, Serialize};

// ============================================================================
// DELIMITERS
// ============================================================================

/// Wire-format delimiters. X12 interchanges default to `~` (segment
/// terminator) and `*` (element separator), but both are configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub segment_terminator: char,
    pub element_separator: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Delimiters {
            segment_terminator: '~',
            element_separator: '*',
        }
    }
}

// ============================================================================
// SEGMENT
// ============================================================================

/// One delimited record in the token stream. Transient: created per line,
/// discarded after extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Leading type code (e.g. "HL", "STC", "NM1")
    pub id: String,

    /// Ordered element list, excluding the id itself. 0-based positions
    /// throughout the codebase refer to this list.
    pub elements: Vec<String>,
}

impl Segment {
    /// Element at `index`, or None when the segment is too short or the
    /// element is empty. Extractors lean on this for defensive access.
    pub fn element(&self, index: usize) -> Option<&str> {
        self.elements
            .get(index)
            .map(|e| e.as_str())
            .filter(|e| !e.is_empty())
    }
}

// ============================================================================
// TOKENIZER
// ============================================================================

/// Tokenize raw document text into segments.
///
/// Line breaks are stripped first (X12 content is often wrapped for human
/// inspection), then the text is split on the segment terminator. Empty
/// pieces are dropped; everything else becomes a `Segment`.
///
/// This function never fails - malformed input just yields segments with
/// fewer elements than the extractors expect.
pub fn tokenize(content: &str, delimiters: &Delimiters) -> Vec<Segment> {
    let cleaned: String = content.chars().filter(|c| *c != '\n' && *c != '\r').collect();

    let mut segments = Vec::new();
    for piece in cleaned.split(delimiters.segment_terminator) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }

        let mut parts = piece.split(delimiters.element_separator);
        let id = parts.next().unwrap_or("").to_string();
        let elements: Vec<String> = parts.map(|p| p.to_string()).collect();

        segments.push(Segment { id, elements });
    }

    segments
}

// ============================================================================
// TESTS
// ============================================================================
