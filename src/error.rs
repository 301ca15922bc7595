// Typed failures for acknowledgment document processing.
//
// Field-level problems (bad amounts, short segments) never surface here -
// they degrade to unset fields plus a FieldDiagnostic. ParseError is reserved
// for conditions where downstream logic has nothing to act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    /// The stream produced zero committed claim records. A well-formed
    /// acknowledgment document always carries at least one claim, so this
    /// signals the wrong document type or a garbled stream.
    #[error("no claim acknowledgments found in document")]
    NoClaimsFound,

    /// The document uses the nested provider/patient hierarchy form that the
    /// single-level assembler does not group correctly. Only raised in
    /// `HierarchyMode::RejectNested`.
    #[error("unsupported hierarchy level '{level}': nested provider/patient hierarchies are not assembled")]
    UnsupportedHierarchy { level: String },
}
