//! # Deduplicator
//! Collapses near-duplicate items (the same story reported by several outlets
//! or cross-posted to a board) into `DedupGroup`s.
//!
//! Two items are duplicates when any of these hold:
//! - their title fingerprints are identical,
//! - their normalized URLs are identical,
//! - the Jaccard overlap of their fingerprint tokens is >= `threshold`.
//!
//! The relation is closed transitively with a disjoint-set forest, so chains
//! A~B, B~C end up in one group even when A and C alone would not match.
//! Roots are always the member with the smallest id, which makes the grouping
//! independent of the order items arrive in.
//!
//! Items with a blank title never merge with anything. Group ids are unique:
//! when unmerged items share an id, later groups in content order get a
//! `#n` suffix.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::item::{Origin, SourceItem};

pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.6;

/// One story, possibly reported by several sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupGroup {
    /// Earliest member; ties go to higher engagement, then smaller id.
    pub representative: SourceItem,
    /// Every folded item, in discovery order. Never empty.
    pub members: Vec<SourceItem>,
}

impl DedupGroup {
    /// Groups are referenced by their representative's id.
    pub fn id(&self) -> &str {
        &self.representative.id
    }

    /// Distinct origins across all members.
    pub fn origins(&self) -> BTreeSet<Origin> {
        self.members.iter().map(|m| m.origin).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    threshold: f64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_THRESHOLD)
    }
}

/// Per-item matching keys, computed once.
struct Keys {
    blank: bool,
    fingerprint: String,
    tokens: HashSet<String>,
    url: Option<String>,
}

impl Keys {
    fn of(item: &SourceItem) -> Self {
        let fingerprint = item.fingerprint();
        let tokens = fingerprint.split_whitespace().map(str::to_string).collect();
        Self {
            blank: item.title.trim().is_empty(),
            fingerprint,
            tokens,
            url: item.normalized_url(),
        }
    }
}

impl Deduplicator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Duplicate test for one pair.
    pub fn is_duplicate(&self, a: &SourceItem, b: &SourceItem) -> bool {
        self.keys_match(&Keys::of(a), &Keys::of(b))
    }

    fn keys_match(&self, a: &Keys, b: &Keys) -> bool {
        if a.blank || b.blank {
            return false;
        }
        if let (Some(ua), Some(ub)) = (&a.url, &b.url) {
            if ua == ub {
                return true;
            }
        }
        if a.fingerprint.is_empty() || b.fingerprint.is_empty() {
            return false;
        }
        a.fingerprint == b.fingerprint || jaccard(&a.tokens, &b.tokens) >= self.threshold
    }

    /// Group `items` (ingestion order). Groups come out ordered by their
    /// earliest-discovered member.
    pub fn group(&self, items: Vec<SourceItem>) -> Vec<DedupGroup> {
        if items.is_empty() {
            return Vec::new();
        }

        let keys: Vec<Keys> = items.iter().map(Keys::of).collect();
        let mut sets = DisjointSet::new(items.iter().map(|i| i.id.clone()).collect());

        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                if self.keys_match(&keys[i], &keys[j]) {
                    sets.union(i, j);
                }
            }
        }

        // root -> member indices; indices are pushed in ascending (discovery) order.
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for idx in 0..items.len() {
            let root = sets.find(idx);
            by_root.entry(root).or_default().push(idx);
        }

        let mut components: Vec<Vec<usize>> = by_root.into_values().collect();
        components.sort_by_key(|members| members[0]);

        let mut slots: Vec<Option<SourceItem>> = items.into_iter().map(Some).collect();
        let mut groups: Vec<DedupGroup> = components
            .into_iter()
            .filter_map(|idxs| {
                let members: Vec<SourceItem> =
                    idxs.iter().filter_map(|&i| slots[i].take()).collect();
                let representative = members
                    .iter()
                    .min_by(|a, b| representative_order(a, b))
                    .cloned()?;
                Some(DedupGroup {
                    representative,
                    members,
                })
            })
            .collect();
        disambiguate_ids(&mut groups);

        debug!(
            target: "trend",
            items = slots.len(),
            groups = groups.len(),
            threshold = self.threshold,
            "dedup finished"
        );
        groups
    }
}

/// Earliest timestamp first (missing sorts last), then higher engagement,
/// then `content_order`.
fn representative_order(a: &SourceItem, b: &SourceItem) -> Ordering {
    let by_time = match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time
        .then_with(|| b.engagement_or_zero().total_cmp(&a.engagement_or_zero()))
        .then_with(|| content_order(a, b))
}

/// Total order over every field. Equal only for items that are identical.
fn content_order(a: &SourceItem, b: &SourceItem) -> Ordering {
    let engagement = |x: &SourceItem| x.engagement.map(f64::to_bits);
    a.id.cmp(&b.id)
        .then_with(|| a.origin.cmp(&b.origin))
        .then_with(|| a.sub_origin.cmp(&b.sub_origin))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.body_excerpt.cmp(&b.body_excerpt))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.published_at.cmp(&b.published_at))
        .then_with(|| engagement(a).cmp(&engagement(b)))
        .then_with(|| a.sentiment.cmp(&b.sentiment))
}

/// Members sorted by `content_order`; compared element-wise this orders groups
/// by content alone.
fn sorted_members(g: &DedupGroup) -> Vec<&SourceItem> {
    let mut v: Vec<&SourceItem> = g.members.iter().collect();
    v.sort_by(|a, b| content_order(a, b));
    v
}

fn group_content_order(a: &DedupGroup, b: &DedupGroup) -> Ordering {
    let (xs, ys) = (sorted_members(a), sorted_members(b));
    xs.iter()
        .zip(ys.iter())
        .map(|(x, y)| content_order(x, y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| xs.len().cmp(&ys.len()))
}

/// Items that never merge can still hash to one id (blank or all-stopword
/// titles without a URL). The id is kept by the first group in content order;
/// the others get `#2`, `#3`, ... so group ids stay unique.
fn disambiguate_ids(groups: &mut [DedupGroup]) {
    let mut owners: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (gi, g) in groups.iter().enumerate() {
        let ids: BTreeSet<&str> = g.members.iter().map(|m| m.id.as_str()).collect();
        for id in ids {
            owners.entry(id.to_string()).or_default().push(gi);
        }
    }

    let mut renames: Vec<(usize, String, String)> = Vec::new();
    for (id, mut gis) in owners {
        if gis.len() < 2 {
            continue;
        }
        gis.sort_by(|&x, &y| group_content_order(&groups[x], &groups[y]));
        for (n, &gi) in gis.iter().enumerate().skip(1) {
            renames.push((gi, id.clone(), format!("{id}#{}", n + 1)));
        }
    }

    for (gi, old, fresh) in renames {
        let g = &mut groups[gi];
        for m in g.members.iter_mut().filter(|m| m.id == old) {
            m.id = fresh.clone();
        }
        if g.representative.id == old {
            g.representative.id = fresh;
        }
    }
}
