// src/ingest/mod.rs
pub mod snapshot;
pub mod types;

use metrics::{counter, describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;

use crate::config::Window;
use crate::error::Diagnostic;
use crate::ingest::types::SourceProvider;
use crate::item::{Origin, RawItem, SourceItem};

pub use snapshot::JsonSnapshotProvider;

/// One-time metrics registration (so series show up on the recorder's export).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("trend_items_total", "Raw items handed to the engine.");
        describe_counter!(
            "trend_items_malformed_total",
            "Items skipped because a required field was missing."
        );
        describe_counter!(
            "trend_items_out_of_window_total",
            "Items dropped for falling outside the look-back window."
        );
        describe_counter!(
            "trend_dedup_merged_total",
            "Items folded into another item's dedup group."
        );
        describe_counter!(
            "trend_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_gauge!("trend_topics_ranked", "Topics in the last ranking.");
    });
}

/// Items pulled from all providers plus what went wrong along the way.
#[derive(Debug, Default)]
pub struct Gathered {
    pub items: Vec<RawItem>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Pull from every provider in turn. A failing or empty provider is recorded
/// and skipped; the rest of the batch proceeds.
pub async fn gather(providers: &[Box<dyn SourceProvider>]) -> Gathered {
    ensure_metrics_described();

    let mut out = Gathered::default();
    for p in providers {
        match p.fetch_items().await {
            Ok(items) if items.is_empty() => {
                tracing::warn!(target: "trend", provider = p.name(), "provider returned no items");
                out.diagnostics.push(Diagnostic::partial_input(
                    Some(p.origin()),
                    Some(p.name()),
                    "provider returned no items",
                ));
            }
            Ok(items) => {
                tracing::debug!(target: "trend", provider = p.name(), count = items.len(), "provider ok");
                out.items.extend(items.into_iter().map(|mut it| {
                    it.origin = p.origin();
                    if it.sub_origin.trim().is_empty() {
                        it.sub_origin = p.name().to_string();
                    }
                    it
                }));
            }
            Err(e) => {
                tracing::warn!(target: "trend", error = ?e, provider = p.name(), "provider error");
                counter!("trend_provider_errors_total").increment(1);
                out.diagnostics
                    .push(Diagnostic::provider_error(p.origin(), p.name(), format!("{e:#}")));
            }
        }
    }
    out
}

/// Output of `prepare_items`.
#[derive(Debug, Default)]
pub struct Prepared {
    pub items: Vec<SourceItem>,
    pub diagnostics: Vec<Diagnostic>,
    pub malformed: usize,
    pub out_of_window: usize,
}

/// Validate + clean raw items and apply the optional window.
///
/// - items without a title are skipped with a `malformed_item` diagnostic,
/// - items dated outside `window` are dropped silently (metrics only),
/// - every origin with no raw items at all gets a `partial_input` diagnostic.
pub fn prepare_items(raw: Vec<RawItem>, window: Option<&Window>) -> Prepared {
    ensure_metrics_described();
    counter!("trend_items_total").increment(raw.len() as u64);

    let mut per_origin: BTreeMap<Origin, usize> = Origin::ALL.iter().map(|o| (*o, 0)).collect();
    let mut out = Prepared {
        items: Vec::with_capacity(raw.len()),
        ..Prepared::default()
    };

    for r in raw {
        *per_origin.entry(r.origin).or_default() += 1;

        if let Some(w) = window {
            if !w.contains(r.published_at) {
                out.out_of_window += 1;
                continue;
            }
        }

        let (origin, source) = (r.origin, r.sub_origin.clone());
        match SourceItem::from_raw(r) {
            Ok(item) => out.items.push(item),
            Err(e) => {
                tracing::warn!(target: "trend", %origin, source = %source, error = %e, "skipping malformed item");
                out.malformed += 1;
                out.diagnostics.push(Diagnostic::malformed(origin, &source, &e));
            }
        }
    }

    for (origin, n) in per_origin {
        if n == 0 {
            out.diagnostics.push(Diagnostic::partial_input(
                Some(origin),
                None,
                format!("no {origin} items in this batch"),
            ));
        }
    }

    counter!("trend_items_malformed_total").increment(out.malformed as u64);
    counter!("trend_items_out_of_window_total").increment(out.out_of_window as u64);
    out
}
