//! Policy-rule intersection.
//!
//! # Purpose
//! Bounds a set of requested rules by an administrator-defined ceiling. Every
//! (ceiling, requested) pair is intersected field by field and every valid
//! result is kept; the output is not deduplicated or minimized.
//!
//! # Key invariants
//! - `*` on either side of a field yields the other side unchanged.
//! - Without a wildcard the result is the sorted set intersection.
//! - A result with no verbs, or that is neither a resource rule nor a
//!   non-resource rule, is discarded.
//! - Two non-empty `resource_names` lists with nothing in common drop the
//!   resource part, since an empty list would read as "every name".
use crate::rule::{PolicyRule, WILDCARD};
use std::collections::BTreeSet;

/// Clamp `requested` to `ceiling`.
pub fn clamp(ceiling: &[PolicyRule], requested: &[PolicyRule]) -> Vec<PolicyRule> {
    let mut accepted = Vec::new();
    for bound in ceiling {
        for wanted in requested {
            if let Some(rule) = intersect_rule(bound, wanted) {
                accepted.push(rule);
            }
        }
    }
    accepted
}

/// Intersect two rules, or `None` when nothing valid remains.
pub fn intersect_rule(left: &PolicyRule, right: &PolicyRule) -> Option<PolicyRule> {
    let verbs = intersect_absorbing(&left.verbs, &right.verbs);
    if verbs.is_empty() {
        return None;
    }

    let mut rule = PolicyRule {
        verbs,
        ..PolicyRule::default()
    };
    let mut valid = false;

    let api_groups = intersect_absorbing(&left.api_groups, &right.api_groups);
    let resources = intersect_absorbing(&left.resources, &right.resources);
    if !api_groups.is_empty() && !resources.is_empty() {
        if let Some(names) = intersect_resource_names(&left.resource_names, &right.resource_names)
        {
            rule.api_groups = api_groups;
            rule.resources = resources;
            rule.resource_names = names;
            valid = true;
        }
    }

    let urls = intersect_absorbing(&left.non_resource_urls, &right.non_resource_urls);
    if !urls.is_empty() {
        rule.non_resource_urls = urls;
        valid = true;
    }

    valid.then_some(rule)
}

fn intersect_absorbing(left: &[String], right: &[String]) -> Vec<String> {
    if left.iter().any(|value| value == WILDCARD) {
        return right.to_vec();
    }
    if right.iter().any(|value| value == WILDCARD) {
        return left.to_vec();
    }
    sorted_intersection(left, right)
}

// Empty means unrestricted; `None` means the lists are disjoint.
fn intersect_resource_names(left: &[String], right: &[String]) -> Option<Vec<String>> {
    if left.is_empty() {
        return Some(right.to_vec());
    }
    if right.is_empty() {
        return Some(left.to_vec());
    }
    let both = sorted_intersection(left, right);
    (!both.is_empty()).then_some(both)
}

fn sorted_intersection(left: &[String], right: &[String]) -> Vec<String> {
    let right: BTreeSet<&str> = right.iter().map(String::as_str).collect();
    left.iter()
        .map(String::as_str)
        .filter(|value| right.contains(value))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
