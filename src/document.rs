//! The live document the resolver queries.

use crate::{Error, Result};
use async_trait::async_trait;
use eoka::Page;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// A live document session.
///
/// `evaluate` runs `script` (a JS function expression) with `args` as its
/// single argument, atomically inside the page, and returns its JSON result.
#[async_trait]
pub trait Document: Send + Sync {
    /// Wait until the document reports it has finished loading.
    async fn wait_for_load(&self) -> Result<()>;

    /// Call `script` with `args` inside the page.
    async fn evaluate(&self, script: &str, args: Value) -> Result<Value>;

    /// Whether the session has been torn down.
    async fn is_closed(&self) -> bool;

    /// Current document URL.
    async fn current_url(&self) -> Result<String>;

    /// Scroll the viewport by (`dx`, `dy`) pixels.
    async fn scroll_step(&self, dx: i64, dy: i64) -> Result<()>;

    /// Let the page settle for `ms` milliseconds.
    async fn settle(&self, ms: u64);
}

/// [`Document`] over an eoka [`Page`].
pub struct EokaDocument<'a> {
    page: &'a Page,
    load_timeout_ms: u64,
}

impl<'a> EokaDocument<'a> {
    pub fn new(page: &'a Page, load_timeout_ms: u64) -> Self {
        Self {
            page,
            load_timeout_ms,
        }
    }
}

/// Build `(<script>)(<args>)` so the call happens in one evaluation.
fn invocation(script: &str, args: &Value) -> Result<String> {
    Ok(format!("({})({})", script.trim(), serde_json::to_string(args)?))
}

#[async_trait]
impl Document for EokaDocument<'_> {
    async fn wait_for_load(&self) -> Result<()> {
        let start = Instant::now();
        let timeout = Duration::from_millis(self.load_timeout_ms);
        loop {
            let state: String = self.page.evaluate("document.readyState").await?;
            if state == "complete" {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(Error::Document(format!(
                    "document still '{}' after {}ms",
                    state, self.load_timeout_ms
                )));
            }
            self.page.wait(100).await;
        }
    }

    async fn evaluate(&self, script: &str, args: Value) -> Result<Value> {
        let js = invocation(script, &args)?;
        // eoka reports a bare `undefined` as an error; wrap to always get a value
        let js = format!("(() => {{ const r = {}; return r === undefined ? null : r; }})()", js);
        Ok(self.page.evaluate::<Value>(&js).await?)
    }

    async fn is_closed(&self) -> bool {
        match self.page.evaluate::<bool>("true").await {
            Ok(_) => false,
            Err(e) => {
                debug!("page liveness check failed: {}", e);
                true
            }
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page.url().await?)
    }

    async fn scroll_step(&self, dx: i64, dy: i64) -> Result<()> {
        self.page
            .execute(&format!("window.scrollBy({}, {})", dx, dy))
            .await?;
        Ok(())
    }

    async fn settle(&self, ms: u64) {
        self.page.wait(ms).await;
    }
}
