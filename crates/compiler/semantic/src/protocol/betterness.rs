//! Overload betterness among the applicable candidates of one lookup level.

use std::cmp::Ordering;
use std::rc::Rc;

use super::{ProtocolCandidate, Resolution};
use crate::catalog::TypeCatalog;
use crate::conversions::{Conversion, ConversionInserter};

/// Picks the unique best candidate, or reports the tie
pub(super) fn select_best(
    catalog: &TypeCatalog,
    mut candidates: Vec<ProtocolCandidate>,
) -> Resolution {
    if candidates.is_empty() {
        return Resolution::NotFound;
    }
    let best = (0..candidates.len()).find(|&i| {
        (0..candidates.len()).all(|j| i == j || is_better(catalog, &candidates[i], &candidates[j]))
    });
    match best {
        Some(index) => Resolution::Found(Rc::new(candidates.swap_remove(index))),
        None => Resolution::Ambiguous(candidates.iter().map(|c| c.method).collect()),
    }
}

/// `a` is better than `b` when it wins at least one criterion and loses none
fn is_better(catalog: &TypeCatalog, a: &ProtocolCandidate, b: &ProtocolCandidate) -> bool {
    let criteria = [
        compare_receiver(catalog, a, b),
        compare_form(a, b),
        compare_defaults(a, b),
        compare_genericity(a, b),
    ];
    criteria.contains(&Ordering::Greater) && !criteria.contains(&Ordering::Less)
}

fn compare_receiver(catalog: &TypeCatalog, a: &ProtocolCandidate, b: &ProtocolCandidate) -> Ordering {
    let a_identity = a.receiver_conversion == Conversion::Identity;
    let b_identity = b.receiver_conversion == Conversion::Identity;
    match (a_identity, b_identity) {
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
        (false, false) => {
            if a.receiver_type == b.receiver_type {
                return Ordering::Equal;
            }
            // The more derived `this` type converts to the other one
            let inserter = ConversionInserter::new(catalog);
            let a_to_b = inserter
                .classify_implicit(a.receiver_type, b.receiver_type)
                .is_some();
            let b_to_a = inserter
                .classify_implicit(b.receiver_type, a.receiver_type)
                .is_some();
            match (a_to_b, b_to_a) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            }
        }
    }
}

fn compare_form(a: &ProtocolCandidate, b: &ProtocolCandidate) -> Ordering {
    // Normal form beats `params` expansion
    b.expanded.cmp(&a.expanded)
}

fn compare_defaults(a: &ProtocolCandidate, b: &ProtocolCandidate) -> Ordering {
    b.defaulted.cmp(&a.defaulted)
}

fn compare_genericity(a: &ProtocolCandidate, b: &ProtocolCandidate) -> Ordering {
    b.is_generic().cmp(&a.is_generic())
}
