//! Reveal lazily rendered content between failed passes.

use crate::document::Document;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Scroll steps allowed per target in one retry cycle.
pub const MAX_SCROLL_STEPS: u32 = 10;

/// Viewport scroll distance when the page object has no scroll targets.
const VIEWPORT_STEP_PX: i64 = 400;

/// Name used in [`ScrollReport`] for the generic viewport scroll.
pub const VIEWPORT_TARGET: &str = "window";

/// Counts visible matches of `{ selector }`.
pub const REVEAL_JS: &str = r#"
(args) => {
    const PATH = /^(\/\/|\(|\.\/|\.\.|xpath=)/;
    let matches = [];
    try {
        if (PATH.test(args.selector)) {
            const snap = document.evaluate(args.selector.replace(/^xpath=/, ''), document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            for (let i = 0; i < snap.snapshotLength; i++) matches.push(snap.snapshotItem(i));
        } else {
            matches = Array.from(document.querySelectorAll(args.selector.replace(/^css=/, '')));
        }
    } catch (e) {
        return 0;
    }
    return matches.filter(el => {
        if (!el || el.nodeType !== 1) return false;
        const r = el.getBoundingClientRect();
        const s = getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    }).length;
}
"#;

/// Scrolls visible match `{ index }` of `{ selector }` one step; `{ first }`
/// brings it into view beforehand. Returns whether the container moved.
pub const SCROLL_STEP_JS: &str = r#"
(args) => {
    const PATH = /^(\/\/|\(|\.\/|\.\.|xpath=)/;
    let matches = [];
    try {
        if (PATH.test(args.selector)) {
            const snap = document.evaluate(args.selector.replace(/^xpath=/, ''), document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            for (let i = 0; i < snap.snapshotLength; i++) matches.push(snap.snapshotItem(i));
        } else {
            matches = Array.from(document.querySelectorAll(args.selector.replace(/^css=/, '')));
        }
    } catch (e) {
        return false;
    }
    const shown = matches.filter(el => {
        if (!el || el.nodeType !== 1) return false;
        const r = el.getBoundingClientRect();
        const s = getComputedStyle(el);
        return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';
    });
    const el = shown[args.index];
    if (!el) return false;
    if (args.first) el.scrollIntoView({ block: 'center' });
    const before = el.scrollTop;
    el.scrollBy(0, Math.max(el.clientHeight * 0.8, 100));
    return el.scrollTop !== before;
}
"#;

/// Steps taken per target during one scroll pass.
#[derive(Debug, Clone, Default)]
pub struct ScrollReport {
    pub steps: Vec<(String, u32)>,
    pub closed: bool,
}

impl ScrollReport {
    pub fn total(&self) -> u32 {
        self.steps.iter().map(|(_, n)| n).sum()
    }

    /// Steps taken for `target`, 0 if it was not scrolled.
    pub fn steps_for(&self, target: &str) -> u32 {
        self.steps
            .iter()
            .find(|(t, _)| t == target)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Scrolls configured containers, or the viewport when there are none.
pub struct ScrollController<'a, D: Document + ?Sized> {
    document: &'a D,
    settle_ms: u64,
}

impl<'a, D: Document + ?Sized> ScrollController<'a, D> {
    pub fn new(document: &'a D, settle_ms: u64) -> Self {
        Self {
            document,
            settle_ms,
        }
    }

    /// One scroll pass. Never exceeds [`MAX_SCROLL_STEPS`] per target.
    pub async fn reveal(&self, targets: &[String]) -> ScrollReport {
        let mut report = ScrollReport::default();

        if targets.is_empty() {
            let steps = self.scroll_viewport(&mut report).await;
            report.steps.push((VIEWPORT_TARGET.to_string(), steps));
            return report;
        }

        for target in targets {
            let steps = self.scroll_target(target, &mut report).await;
            report.steps.push((target.clone(), steps));
            if report.closed {
                break;
            }
        }
        report
    }

    async fn scroll_viewport(&self, report: &mut ScrollReport) -> u32 {
        let mut steps = 0;
        while steps < MAX_SCROLL_STEPS {
            if let Err(e) = self.document.scroll_step(0, VIEWPORT_STEP_PX).await {
                report.closed = self.document.is_closed().await;
                if !report.closed {
                    warn!("viewport scroll failed: {}", e);
                }
                break;
            }
            steps += 1;
            self.document.settle(self.settle_ms).await;
        }
        debug!("scrolled viewport {} steps", steps);
        steps
    }

    async fn scroll_target(&self, target: &str, report: &mut ScrollReport) -> u32 {
        let visible = match self.call(REVEAL_JS, json!({ "selector": target }), report).await {
            Some(v) => v.as_u64().unwrap_or(0),
            None => return 0,
        };
        if visible == 0 {
            debug!("scroll target '{}' has no visible match", target);
            return 0;
        }

        let mut steps = 0;
        'matches: for index in 0..visible {
            let mut first = true;
            while steps < MAX_SCROLL_STEPS {
                let args = json!({ "selector": target, "index": index, "first": first });
                let Some(moved) = self.call(SCROLL_STEP_JS, args, report).await else {
                    break 'matches;
                };
                first = false;
                steps += 1;
                self.document.settle(self.settle_ms).await;
                if !moved.as_bool().unwrap_or(false) {
                    break;
                }
            }
            if steps >= MAX_SCROLL_STEPS {
                break;
            }
        }
        debug!("scrolled '{}' {} steps", target, steps);
        steps
    }

    async fn call(&self, script: &str, args: Value, report: &mut ScrollReport) -> Option<Value> {
        match self.document.evaluate(script, args).await {
            Ok(v) => Some(v),
            Err(e) => {
                report.closed = self.document.is_closed().await;
                if !report.closed {
                    warn!("scroll script failed: {}", e);
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_totals() {
        let report = ScrollReport {
            steps: vec![("div.a".into(), 3), ("div.b".into(), 10)],
            closed: false,
        };
        assert_eq!(report.total(), 13);
        assert_eq!(report.steps_for("div.b"), 10);
        assert_eq!(report.steps_for("div.c"), 0);
    }
}
