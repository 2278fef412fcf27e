//! Planning of DOM region swaps for navigation and partial reloads.
//!
//! # Design
//! - The wasm layer answers questions about the live and parsed documents through
//!   [`RegionLookup`]; the decisions (what to fetch, what to swap, which attributes to
//!   copy) are made here.
//! - Attribute merging is additive: attributes missing from the new markup are left on
//!   the live element.

/// Attribute marking a region as safe to swap from live updates.
pub const RELOAD_ATTRIBUTE: &str = "data-ajaxify-reload";

/// Read-only view of the live document.
pub trait RegionLookup {
    /// Whether `selector` matches at least one element.
    fn matches(&self, selector: &str) -> bool;
    /// Whether the first match of `selector` carries [`RELOAD_ATTRIBUTE`].
    fn reload_eligible(&self, selector: &str) -> bool;
}

/// Result of sorting reload selectors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReloadPlan {
    /// Selectors to swap from one shared fetch.
    pub eligible: Vec<String>,
    /// Matched but not marked reload-eligible.
    pub ineligible: Vec<String>,
    /// Matched nothing in the live document.
    pub missing: Vec<String>,
}

impl ReloadPlan {
    /// Whether a network request is needed at all.
    #[must_use]
    pub const fn needs_fetch(&self) -> bool {
        !self.eligible.is_empty()
    }
}

/// Sort `selectors` into eligible, ineligible and missing; duplicates are dropped.
#[must_use]
pub fn plan_reload<P, S>(page: &P, selectors: &[S]) -> ReloadPlan
where
    P: RegionLookup + ?Sized,
    S: AsRef<str>,
{
    let mut plan = ReloadPlan::default();
    for selector in selectors {
        let selector = selector.as_ref();
        let mut seen = plan.eligible.iter().chain(&plan.ineligible).chain(&plan.missing);
        if seen.any(|known| known == selector) {
            continue;
        }
        if !page.matches(selector) {
            plan.missing.push(selector.to_string());
        } else if page.reload_eligible(selector) {
            plan.eligible.push(selector.to_string());
        } else {
            plan.ineligible.push(selector.to_string());
        }
    }
    plan
}

/// How a navigation response is installed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SwapPlan {
    /// Replace the listed tracked regions (in tracked order).
    Regions(Vec<String>),
    /// None of the tracked regions exist in the response; replace the whole document.
    WholeDocument,
}

/// Decide which tracked regions can be swapped from a parsed response.
#[must_use]
pub fn plan_swap(tracked: &[String], present_in_response: impl Fn(&str) -> bool) -> SwapPlan {
    let found: Vec<String> = tracked
        .iter()
        .filter(|selector| present_in_response(selector))
        .cloned()
        .collect();
    if found.is_empty() {
        SwapPlan::WholeDocument
    } else {
        SwapPlan::Regions(found)
    }
}

/// Attributes to set on a live region so it reflects the incoming one.
///
/// Only new or changed attributes are returned; stale live attributes are kept.
#[must_use]
pub fn attribute_patch(
    live: &[(String, String)],
    incoming: &[(String, String)],
) -> Vec<(String, String)> {
    incoming
        .iter()
        .filter(|(name, value)| {
            !live
                .iter()
                .any(|(live_name, live_value)| live_name == name && live_value == value)
        })
        .cloned()
        .collect()
}
