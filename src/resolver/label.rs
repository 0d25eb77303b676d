//! Label indirection: reach a form control through the label that names it.

use super::chain::{self, ChainQuery};
use crate::document::Document;
use tracing::debug;

/// Element types whose target is usually owned by a visible label.
pub const LABEL_ELEMENT_TYPES: &[&str] = &["input", "select", "textarea"];

/// Element type under which a page object keeps its label strategies.
pub const LABEL_TYPE: &str = "label";

/// Whether label indirection applies to `element_type`.
pub fn is_label_eligible(element_type: &str) -> bool {
    LABEL_ELEMENT_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(element_type.trim()))
}

/// Outcome of one pass over the label strategies.
#[derive(Debug, Default)]
pub struct LabelCapture {
    /// Indirection value from the first label that carried one.
    pub for_id: Option<String>,
    /// Label strategies evaluated, in order.
    pub attempted: Vec<String>,
    pub closed: bool,
}

/// Try each label strategy until one yields a non-empty indirection value.
/// Finding nothing is not a failure.
pub async fn capture<D: Document + ?Sized>(
    document: &D,
    labels: &[String],
    location: &str,
    section: &str,
    attribute: &str,
) -> LabelCapture {
    let mut capture = LabelCapture::default();

    for label in labels.iter().filter(|l| !l.trim().is_empty()) {
        let query = ChainQuery::new(label)
            .location(location)
            .section(section)
            .label(attribute);
        capture.attempted.push(query.serialized());

        let outcome = chain::evaluate(document, &query).await;
        if outcome.closed {
            capture.closed = true;
            return capture;
        }
        if let Some(value) = outcome.attribute {
            debug!("label '{}' -> {}='{}'", label, attribute, value);
            capture.for_id = Some(value);
            return capture;
        }
    }

    debug!("no label yielded '{}'", attribute);
    capture
}
