//! Search-set page walker
//!
//! Follows the `next` links of a bundle chain, one authenticated GET per
//! page. The first page is supplied by the caller and never re-fetched.

use bluebutton_auth::Token;
use common::ClientConfig;
use tracing::{debug, info, instrument, warn};

use crate::bundle::Bundle;
use crate::error::{Error, Result};
use crate::metrics;
use crate::request::{RequestConfig, execute};

/// Every page of a chain in traversal order, plus the token to keep using.
#[derive(Debug, Clone)]
pub struct PageSet {
    pub token: Token,
    /// True when at least one page fetch refreshed the token.
    pub refreshed: bool,
    pub pages: Vec<Bundle>,
}

/// Walk the chain starting at `first`.
///
/// Continuation URLs already carry the provider's query, so `request`'s
/// params are dropped for every follow-up call. A refreshed token is used
/// for the remaining pages and returned in the result. A non-2xx page
/// aborts the walk with `Error::Page`; if the token was refreshed earlier in
/// the walk, the error comes wrapped in `Error::Refreshed`.
#[instrument(skip_all)]
pub async fn collect_pages(
    client: &reqwest::Client,
    config: &ClientConfig,
    first: Bundle,
    request: &RequestConfig,
) -> Result<PageSet> {
    let mut walk = Walk {
        request: request.clone(),
        refreshed: false,
        pages: vec![first],
    };
    walk.request.clear_params();
    metrics::record_page();

    match walk.follow(client, config).await {
        Ok(()) => {
            info!(pages = walk.pages.len(), refreshed = walk.refreshed, "page chain complete");
            Ok(PageSet {
                token: walk.request.token().clone(),
                refreshed: walk.refreshed,
                pages: walk.pages,
            })
        }
        Err(e) if walk.refreshed => Err(e.after_refresh(walk.request.token().clone())),
        Err(e) => Err(e),
    }
}

struct Walk {
    request: RequestConfig,
    refreshed: bool,
    pages: Vec<Bundle>,
}

impl Walk {
    async fn follow(&mut self, client: &reqwest::Client, config: &ClientConfig) -> Result<()> {
        while let Some(next) = self.pages.last().and_then(Bundle::next_link).map(str::to_owned) {
            if let Some(limit) = config.max_pages()
                && self.pages.len() >= limit
            {
                warn!(limit, "page chain exceeds configured maximum");
                return Err(Error::PageLimit { limit });
            }

            debug!(page = self.pages.len(), url = %next, "fetching next page");
            self.request.set_url(next);
            let outcome = execute(client, config, &self.request).await?;
            if outcome.refreshed {
                self.refreshed = true;
                self.request.set_token(outcome.token);
            }

            let response = outcome.response;
            if !response.is_success() {
                warn!(status = response.status(), "page request failed");
                return Err(Error::Page {
                    url: response.url().to_string(),
                    status: response.status(),
                    body: response.body().to_string(),
                });
            }
            self.pages.push(response.json()?);
            metrics::record_page();
        }
        Ok(())
    }
}
