pub mod chain;
pub mod label;
pub mod scroll;
pub mod strategy;

pub use label::{is_label_eligible, LABEL_ELEMENT_TYPES};

use crate::config::ResolverConfig;
use crate::document::Document;
use crate::field::{keys, Bindings, FieldReference};
use crate::store::{Scope, VariableStore};
use crate::Result;
use chain::{ChainQuery, LocatorResult};
use scroll::ScrollController;
use std::time::{Duration, Instant};
use strategy::{PatternCode, StrategyResolver};
use tracing::{debug, info, warn};

/// How a resolution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A visible element matched.
    Found,
    /// The timeout elapsed without a visible match.
    NotFound,
    /// The page object has no strategies for the element type.
    NoStrategies,
    /// The document session was torn down.
    SessionClosed,
}

/// Result of one [`Resolver::resolve`] call.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub result: LocatorResult,
    pub outcome: Outcome,
    pub element_type: String,
    pub field: FieldReference,
    /// Page object the strategies came from.
    pub pattern: PatternCode,
    /// Field strategies evaluated, as applied chains, in order (repeats across cycles).
    pub attempted: Vec<String>,
    /// Label strategies evaluated, as applied chains, in order.
    pub labels_attempted: Vec<String>,
    /// Indirection value captured through a label.
    pub for_id: Option<String>,
    /// Passes through the fallback list.
    pub cycles: u32,
    /// Scroll steps taken between passes.
    pub scroll_steps: u32,
    pub elapsed: Duration,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        self.outcome == Outcome::Found
    }

    /// The resolved locator, or `None` when nothing was found.
    pub fn handle(&self) -> Option<&str> {
        self.is_found().then_some(self.result.locator.as_str())
    }
}

/// Per-call state. Dropped on every exit path, so nothing survives into the
/// next call.
struct ResolutionContext {
    element_type: String,
    field: FieldReference,
    bindings: Bindings,
    location: String,
    section: String,
    for_id: Option<String>,
    attempted: Vec<String>,
    labels_attempted: Vec<String>,
    cycles: u32,
    scroll_steps: u32,
    started: Instant,
}

impl ResolutionContext {
    fn new(element_type: &str, raw_field: &str, started: Instant) -> Self {
        let field = FieldReference::parse(raw_field);
        let bindings = field.bindings();
        Self {
            element_type: element_type.trim().to_string(),
            field,
            bindings,
            location: String::new(),
            section: String::new(),
            for_id: None,
            attempted: Vec::new(),
            labels_attempted: Vec::new(),
            cycles: 0,
            scroll_steps: 0,
            started,
        }
    }

    fn finish(self, pattern: PatternCode, outcome: Outcome, result: LocatorResult) -> Resolution {
        Resolution {
            result,
            outcome,
            element_type: self.element_type,
            field: self.field,
            pattern,
            attempted: self.attempted,
            labels_attempted: self.labels_attempted,
            for_id: self.for_id,
            cycles: self.cycles,
            scroll_steps: self.scroll_steps,
            elapsed: self.started.elapsed(),
        }
    }

    fn closed(self, pattern: PatternCode) -> Resolution {
        warn!(
            "session closed while resolving {} '{}'",
            self.element_type, self.field
        );
        self.finish(pattern, Outcome::SessionClosed, LocatorResult::not_found())
    }
}

/// Resolves field references to locators against one document.
///
/// One call runs: select page object → wait for load (once) → label pass
/// (input-like types) → field strategies → scroll and retry until found or the
/// timeout elapses.
pub struct Resolver<'a, D: Document + ?Sized, S: VariableStore + ?Sized> {
    document: &'a D,
    store: &'a S,
    config: &'a ResolverConfig,
}

impl<'a, D: Document + ?Sized, S: VariableStore + ?Sized> Resolver<'a, D, S> {
    pub fn new(document: &'a D, store: &'a S, config: &'a ResolverConfig) -> Self {
        Self {
            document,
            store,
            config,
        }
    }

    /// Resolve `raw_field` as an element of `element_type`.
    ///
    /// Fails only when no page object can be selected. Not finding the element
    /// is reported through [`Resolution::outcome`].
    pub async fn resolve(
        &self,
        element_type: &str,
        raw_field: &str,
        pattern: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Resolution> {
        let started = Instant::now();
        let timeout = timeout.unwrap_or(Duration::from_millis(self.config.timeout_ms));

        let code = self.select_pattern(pattern).await?;
        let mut ctx = ResolutionContext::new(element_type, raw_field, started);
        debug!(
            "resolving {} '{}' with page object '{}'",
            ctx.element_type, ctx.field, code
        );

        if self.document.is_closed().await {
            return Ok(ctx.closed(code));
        }

        let mut strategies = StrategyResolver::new(self.store, &code);
        if !strategies.has_usable(&ctx.element_type) {
            return Ok(ctx.finish(code.clone(), Outcome::NoStrategies, LocatorResult::not_found()));
        }

        let scroll_targets = {
            let scope = Scope::new(&ctx.bindings, self.store);
            ctx.location = strategies.location(&ctx.field.location_name, &scope);
            ctx.section = strategies.section(&ctx.field.section_name, &scope);
            strategies.scroll_targets(&scope)
        };

        if let Err(e) = self.document.wait_for_load().await {
            warn!("load wait failed, resolving anyway: {}", e);
        }

        let label_eligible = is_label_eligible(&ctx.element_type);
        let scroller = ScrollController::new(self.document, self.config.scroll_settle_ms);

        loop {
            ctx.cycles += 1;

            if label_eligible && ctx.for_id.is_none() {
                let labels = {
                    let scope = Scope::new(&ctx.bindings, self.store);
                    strategies.optional(label::LABEL_TYPE, &scope)
                };
                if !labels.is_empty() {
                    let capture = label::capture(
                        self.document,
                        &labels,
                        &ctx.location,
                        &ctx.section,
                        &self.config.indirection_attribute,
                    )
                    .await;
                    ctx.labels_attempted.extend(capture.attempted);
                    if capture.closed {
                        return Ok(ctx.closed(code));
                    }
                    if let Some(id) = capture.for_id {
                        ctx.bindings.insert(keys::FOR_ID, &id);
                        ctx.for_id = Some(id);
                    }
                }
            }

            let candidates = {
                let scope = Scope::new(&ctx.bindings, self.store);
                strategies.strategies(&ctx.element_type, &scope)
            };

            for candidate in candidates.iter().filter(|c| !c.trim().is_empty()) {
                let applied = apply_instance(candidate, ctx.field.instance, ctx.field.is_scoped());
                let query = ChainQuery::new(&applied)
                    .location(&ctx.location)
                    .section(&ctx.section);
                ctx.attempted.push(query.serialized());

                let outcome = chain::evaluate(self.document, &query).await;
                if outcome.closed {
                    return Ok(ctx.closed(code));
                }
                if outcome.result.visible {
                    info!(
                        "resolved {} '{}' -> {} (cycle {}, {} tried)",
                        ctx.element_type,
                        ctx.field,
                        outcome.result.locator,
                        ctx.cycles,
                        ctx.attempted.len()
                    );
                    return Ok(ctx.finish(code, Outcome::Found, outcome.result));
                }
            }

            if started.elapsed() >= timeout {
                warn!(
                    "{} '{}' not found in page object '{}' within {}ms; tried: {}",
                    ctx.element_type,
                    ctx.field,
                    code,
                    timeout.as_millis(),
                    distinct(&ctx.labels_attempted, &ctx.attempted).join(" | ")
                );
                return Ok(ctx.finish(code, Outcome::NotFound, LocatorResult::not_found()));
            }

            let report = scroller.reveal(&scroll_targets).await;
            ctx.scroll_steps += report.total();
            if report.closed {
                return Ok(ctx.closed(code));
            }
            self.document.settle(self.config.retry_interval_ms).await;
        }
    }

    async fn select_pattern(&self, pattern: Option<&str>) -> Result<PatternCode> {
        let has_override = pattern.is_some_and(|p| !p.trim().is_empty());
        let url = if has_override || self.config.url_patterns.is_empty() {
            String::new()
        } else {
            self.document.current_url().await.unwrap_or_else(|e| {
                debug!("could not read document url: {}", e);
                String::new()
            })
        };
        strategy::select_pattern_code(
            pattern,
            &url,
            &self.config.url_patterns,
            self.config.default_pattern.as_deref(),
        )
    }
}

/// Index an unscoped strategy by the reference's instance.
///
/// Ungrouped XPath becomes `(xpath)[n]`; CSS gets a trailing `nth=` step when
/// `n > 1`. Chained or grouped strategies, and any strategy under a location
/// or section, are left alone.
pub(crate) fn apply_instance(strategy: &str, instance: u32, scoped: bool) -> String {
    let s = strategy.trim();
    if scoped || s.contains(">>") || s.starts_with('(') {
        return s.to_string();
    }
    let path = s.strip_prefix("xpath=").unwrap_or(s);
    if path.starts_with("//") || path.starts_with("./") || path.starts_with("..") {
        return format!("({})[{}]", path, instance);
    }
    if instance > 1 {
        return format!("{} >> nth={}", s, instance - 1);
    }
    s.to_string()
}

fn distinct(labels: &[String], fields: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for s in labels.iter().chain(fields) {
        if !seen.contains(s) {
            seen.push(s.clone());
        }
    }
    seen
}
