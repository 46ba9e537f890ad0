//! One-shot remediation actions against remote collections.
//!
//! The recurring shape is "delete until the query comes back empty". An
//! unbounded loop stalls forever if the remote side never reaches empty, so
//! the purge is a bounded convergence loop: it stops on an empty listing,
//! on the iteration cap, or — distinctly — when an iteration deletes
//! nothing at all.

use crate::api::ApiClient;
use crate::error::{Rep365Error, Result};

/// Terminal state of a purge run
#[derive(Debug)]
pub struct PurgeOutcome {
    pub iterations: u32,
    pub deleted: usize,
    /// Count the collection still reported after the last listing
    pub remaining: usize,
    /// True only when the collection listed empty
    pub converged: bool,
}

/// Repeatedly list `resource` and delete every item returned, until the
/// collection reports empty or `max_iterations` is reached.
///
/// Per-item delete failures are reported through `on_item_error` and
/// skipped. An iteration that deletes nothing ends the run with
/// `NoProgress` — the remote side is not converging and more loops won't
/// change that.
pub async fn purge_collection(
    client: &ApiClient,
    resource: &str,
    page_size: usize,
    max_iterations: u32,
    mut on_item_error: impl FnMut(&str, &Rep365Error),
) -> Result<PurgeOutcome> {
    let mut total_deleted = 0;
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;

        // Always list from offset 0: the collection shrinks underneath us
        let page = client.get_page(resource, 0, page_size).await?;

        if page.is_empty() {
            return Ok(PurgeOutcome {
                iterations,
                deleted: total_deleted,
                remaining: 0,
                converged: true,
            });
        }

        let mut deleted_this_round = 0;
        for item in &page.items {
            let Some(id) = item.get("id").and_then(|v| v.as_str()) else {
                on_item_error(
                    "<unknown>",
                    &Rep365Error::Schema("item without an 'id' field".into()),
                );
                continue;
            };

            match client.delete(&format!("{}/{}", resource, id)).await {
                Ok(()) => deleted_this_round += 1,
                Err(e) => on_item_error(id, &e),
            }
        }

        if deleted_this_round == 0 {
            return Err(Rep365Error::NoProgress(format!(
                "iteration {} deleted none of {} listed items",
                iterations,
                page.len()
            )));
        }

        total_deleted += deleted_this_round;
    }

    // Cap reached with items still listed; report where we stopped
    let remaining = client
        .get_page(resource, 0, page_size)
        .await
        .map(|p| p.total_count)
        .unwrap_or(0);

    Ok(PurgeOutcome {
        iterations,
        deleted: total_deleted,
        remaining,
        converged: false,
    })
}
