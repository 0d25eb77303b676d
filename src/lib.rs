//! # eoka-locator
//!
//! Page-object element resolution. Turn a logical reference like
//! `{{Login Form}} Submit` into a concrete locator inside a live page, trying
//! the page object's fallback strategies, retrying while content loads and
//! scrolling to reveal lazily rendered elements.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use eoka_locator::{EokaDocument, LocatorConfig, MemoryStore, Resolver};
//!
//! # #[tokio::main]
//! # async fn main() -> eoka_locator::Result<()> {
//! let config = LocatorConfig::load("patterns.yaml")?;
//! let store = MemoryStore::new();
//! config.install(&store);
//!
//! let browser = eoka::Browser::launch().await?;
//! let page = browser.new_page("https://example.com/login").await?;
//! let document = EokaDocument::new(&page, config.resolver.load_timeout_ms);
//!
//! let resolver = Resolver::new(&document, &store, &config.resolver);
//! let resolution = resolver.resolve("button", "{{Login Form}} Submit", None, None).await?;
//! if let Some(locator) = resolution.handle() {
//!     println!("resolved: {}", locator);
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod document;
mod field;
mod resolver;
mod store;

pub use config::{
    LocatorConfig, PageObject, ParamDef, Params, ResolverConfig, Strategies, UrlPattern,
};
pub use document::{Document, EokaDocument};
pub use field::{keys, Bindings, FieldReference};
pub use resolver::chain::{ChainQuery, LocatorResult, CHAIN_JS};
pub use resolver::scroll::{ScrollReport, MAX_SCROLL_STEPS, REVEAL_JS, SCROLL_STEP_JS};
pub use resolver::strategy::{select_pattern_code, split_strategies, PatternCode};
pub use resolver::{is_label_eligible, Outcome, Resolution, Resolver, LABEL_ELEMENT_TYPES};
pub use store::{MemoryStore, Scope, VariableStore};

/// Result type for eoka-locator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or resolution.
///
/// Only [`Error::NoPattern`] escapes [`Resolver::resolve`]; every other
/// resolution condition is reported through [`Resolution::outcome`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no page object pattern: {0}")]
    NoPattern(String),

    #[error("document error: {0}")]
    Document(String),
}
