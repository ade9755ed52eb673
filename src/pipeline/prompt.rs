//! Per-document-type instruction templates for the remote vision service.
//!
//! Structured templates request a specific field layout so downstream note
//! composition gets predictable text. The generic template asks for verbatim
//! transcription. The template is part of the cache identity: the same image
//! extracted as a lab report and as a form are different cache entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of document categories the remote extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Form,
    LabReport,
    ImagingReport,
    Generic,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Form => "form",
            Self::LabReport => "lab_report",
            Self::ImagingReport => "imaging_report",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const FORM_INSTRUCTION: &str = "\
Extract every field from this medical form. Output one line per field as \
'Label: value'. Preserve the form's field order. Include checkboxes as \
'Label: checked' or 'Label: unchecked'. Do not invent fields that are not \
visible.";

const LAB_REPORT_INSTRUCTION: &str = "\
Extract all test results from this laboratory report. Output one line per \
analyte as 'Test name: value unit (reference range)'. Include the collection \
date and ordering clinician if visible. Flag out-of-range values with an \
asterisk.";

const IMAGING_REPORT_INSTRUCTION: &str = "\
Extract the text of this imaging report. Preserve the section headings \
(Indication, Technique, Findings, Impression) as written. Transcribe the \
findings and impression sections completely and verbatim.";

const GENERIC_INSTRUCTION: &str = "\
Transcribe all visible text from this document exactly as written, top to \
bottom, left to right. Preserve line breaks between distinct lines. Do not \
summarize, interpret, or omit anything.";

/// Select the instruction template for a document type.
pub fn instruction_for(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Form => FORM_INSTRUCTION,
        DocumentType::LabReport => LAB_REPORT_INSTRUCTION,
        DocumentType::ImagingReport => IMAGING_REPORT_INSTRUCTION,
        DocumentType::Generic => GENERIC_INSTRUCTION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [DocumentType; 4] = [
        DocumentType::Form,
        DocumentType::LabReport,
        DocumentType::ImagingReport,
        DocumentType::Generic,
    ];

    #[test]
    fn every_type_has_an_instruction() {
        for doc_type in ALL {
            assert!(!instruction_for(doc_type).is_empty());
        }
    }

    #[test]
    fn instructions_are_distinct() {
        for a in ALL {
            for b in ALL {
                if a != b {
                    assert_ne!(instruction_for(a), instruction_for(b), "{a} vs {b}");
                }
            }
        }
    }

    #[test]
    fn generic_requests_verbatim_transcription() {
        let text = instruction_for(DocumentType::Generic);
        assert!(text.contains("Transcribe"));
        assert!(text.contains("exactly as written"));
    }

    #[test]
    fn structured_templates_request_field_layout() {
        assert!(instruction_for(DocumentType::Form).contains("Label: value"));
        assert!(instruction_for(DocumentType::LabReport).contains("reference range"));
        assert!(instruction_for(DocumentType::ImagingReport).contains("Impression"));
    }

    #[test]
    fn wire_names_are_snake_case() {
        assert_eq!(DocumentType::LabReport.as_str(), "lab_report");
        assert_eq!(DocumentType::ImagingReport.as_str(), "imaging_report");
        let json = serde_json::to_string(&DocumentType::LabReport).unwrap();
        assert_eq!(json, "\"lab_report\"");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(format!("{}", DocumentType::Form), "form");
    }
}
