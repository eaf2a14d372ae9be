//! Explicit merge functions for capability data discovered by separate
//! probes of the same entity.
//!
//! A codec is probed twice (encoder help and decoder help) and both results
//! land in the same parameter map: a parameter seen by only one probe is
//! inserted as-is, a parameter seen by both gets its context OR-merged and
//! its choice map unioned, with the later probe winning on key collisions.

use std::collections::BTreeMap;

use crate::types::Parameter;

/// Merges `incoming` into `existing` in place.
///
/// Context bits are ORed; choices are unioned with `incoming` winning on
/// name collisions. Type, description, range and default of `existing` are
/// kept — the first probe to describe a parameter names it.
pub fn merge_parameter(existing: &mut Parameter, incoming: &Parameter) {
    existing.context.merge_from(&incoming.context);
    for (name, choice) in &incoming.options {
        existing.options.insert(name.clone(), choice.clone());
    }
}

/// Merges a freshly probed parameter map into an accumulated one.
pub fn merge_parameters(
    accumulated: &mut BTreeMap<String, Parameter>,
    incoming: BTreeMap<String, Parameter>,
) {
    for (name, parameter) in incoming {
        match accumulated.get_mut(&name) {
            Some(existing) => merge_parameter(existing, &parameter),
            None => {
                accumulated.insert(name, parameter);
            }
        }
    }
}
