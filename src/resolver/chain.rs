//! Location → section → field chain evaluation, in a single page evaluation.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Separator between chained steps, in selectors and in resolved locators.
pub const CHAIN_SEPARATOR: &str = " >> ";

/// Result of resolving one element.
///
/// An element is only reported as existing once it is visible, and enablement
/// is not checked separately: `exists`, `visible` and `enabled` move together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocatorResult {
    /// Canonical chained locator (`location >> section >> field`). Empty when not found.
    pub locator: String,
    pub exists: bool,
    pub visible: bool,
    pub enabled: bool,
}

impl LocatorResult {
    pub fn found(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            exists: true,
            visible: true,
            enabled: true,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}

/// Up to three selectors evaluated as one chain.
#[derive(Debug, Clone, Copy)]
pub struct ChainQuery<'q> {
    pub location: &'q str,
    pub section: &'q str,
    pub field: &'q str,
    /// Also read `attribute` from the matched element.
    pub label_check: bool,
    pub attribute: &'q str,
}

impl<'q> ChainQuery<'q> {
    pub fn new(field: &'q str) -> Self {
        Self {
            location: "",
            section: "",
            field,
            label_check: false,
            attribute: "for",
        }
    }

    pub fn location(mut self, location: &'q str) -> Self {
        self.location = location;
        self
    }

    pub fn section(mut self, section: &'q str) -> Self {
        self.section = section;
        self
    }

    /// Treat the target as a label and capture `attribute` from it.
    pub fn label(mut self, attribute: &'q str) -> Self {
        self.label_check = true;
        self.attribute = attribute;
        self
    }

    /// The applied selectors joined in chain order.
    pub fn serialized(&self) -> String {
        [self.location, self.section, self.field]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(CHAIN_SEPARATOR)
    }

    fn args(&self) -> serde_json::Value {
        json!({
            "location": self.location.trim(),
            "section": self.section.trim(),
            "field": self.field.trim(),
            "labelCheck": self.label_check,
            "attribute": self.attribute,
        })
    }
}

/// What one chain evaluation reported.
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    pub result: LocatorResult,
    /// Indirection attribute value, only for label checks with a non-empty value.
    pub attribute: Option<String>,
    /// The session was gone when the evaluation was attempted.
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
struct RawChain {
    found: bool,
    visible: bool,
    #[serde(default)]
    attribute: Option<String>,
}

/// Chain evaluator. Called with `{ location, section, field, labelCheck, attribute }`.
///
/// Selectors starting with `//`, `(`, `./`, `..` or `xpath=` are XPath, anything
/// else is CSS. A selector may itself be a `>>` chain; each step runs inside
/// every match of the previous one, including open shadow roots. `nth=<k>`
/// keeps a single match of the previous step.
pub const CHAIN_JS: &str = r#"
(args) => {
    const PATH = /^(\/\/|\(|\.\/|\.\.|xpath=)/;
    const steps = s => s.split('>>').map(p => p.trim()).filter(p => p.length > 0);

    function byPath(root, expr) {
        expr = expr.replace(/^xpath=/, '');
        if (root !== document) {
            if (expr.startsWith('/')) expr = '.' + expr;
            else if (expr.startsWith('(/')) expr = '(.' + expr.slice(1);
        }
        const out = [];
        const snap = document.evaluate(expr, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        for (let i = 0; i < snap.snapshotLength; i++) {
            const n = snap.snapshotItem(i);
            if (n && n.nodeType === 1) out.push(n);
        }
        return out;
    }

    function query(root, step) {
        try {
            if (PATH.test(step)) return byPath(root, step);
            return Array.from(root.querySelectorAll(step.replace(/^css=/, '')));
        } catch (e) {
            return [];
        }
    }

    function descend(roots, selector) {
        let current = roots;
        for (const step of steps(selector)) {
            const nth = step.match(/^nth=(-?\d+)$/);
            if (nth) {
                const i = parseInt(nth[1], 10);
                const pick = i < 0 ? current[current.length + i] : current[i];
                current = pick ? [pick] : [];
            } else {
                const next = [];
                for (const root of current) {
                    const scopes = root.shadowRoot ? [root, root.shadowRoot] : [root];
                    for (const scope of scopes) {
                        for (const el of query(scope, step)) {
                            if (!next.includes(el)) next.push(el);
                        }
                    }
                }
                current = next;
            }
            if (current.length === 0) break;
        }
        return current;
    }

    function visible(el) {
        if (!el.isConnected) return false;
        const style = getComputedStyle(el);
        if (style.display === 'none' || style.visibility === 'hidden' || style.visibility === 'collapse') return false;
        const rect = el.getBoundingClientRect();
        return el.getClientRects().length > 0 && rect.width > 0 && rect.height > 0;
    }

    const missing = { found: false, visible: false, attribute: null };
    let contexts = [document];
    for (const selector of [args.location, args.section]) {
        if (!selector) continue;
        contexts = descend(contexts, selector);
        if (contexts.length === 0) return missing;
    }
    if (!args.field) return missing;
    const matches = descend(contexts, args.field);
    if (matches.length === 0) return missing;

    const target = matches.find(visible) || matches[0];
    const shown = visible(target);
    let attribute = null;
    if (args.labelCheck && shown) {
        attribute = target.getAttribute(args.attribute) || '';
        if (!attribute && args.attribute === 'for' && target.control && target.control.id) {
            attribute = target.control.id;
        }
    }
    return { found: true, visible: shown, attribute };
}
"#;

/// Evaluate a chain against the document. Never fails: errors and torn-down
/// sessions come back as "not found".
pub async fn evaluate<D: Document + ?Sized>(document: &D, query: &ChainQuery<'_>) -> ChainOutcome {
    let serialized = query.serialized();
    if query.field.trim().is_empty() {
        debug!("skipping empty field selector");
        return ChainOutcome::default();
    }

    let value = match document.evaluate(CHAIN_JS, query.args()).await {
        Ok(v) => v,
        Err(e) => {
            if document.is_closed().await {
                warn!("session closed while evaluating '{}'", serialized);
                return ChainOutcome {
                    closed: true,
                    ..Default::default()
                };
            }
            warn!("evaluating '{}' failed: {}", serialized, e);
            return ChainOutcome::default();
        }
    };

    let raw: RawChain = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("unexpected chain result for '{}': {}", serialized, e);
            return ChainOutcome::default();
        }
    };

    if !(raw.found && raw.visible) {
        debug!(
            "'{}': {}",
            serialized,
            if raw.found { "present but hidden" } else { "no match" }
        );
        return ChainOutcome::default();
    }

    ChainOutcome {
        result: LocatorResult::found(serialized),
        attribute: raw
            .attribute
            .filter(|a| query.label_check && !a.is_empty()),
        closed: false,
    }
}
