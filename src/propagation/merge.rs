//! Reconciling multiple `ExtractedContext`s from concurrently-enabled
//! formats into one authoritative context.

use super::context::ExtractedContext;
use super::PropagationStyle;

/// Picks the first enabled style with a non-empty extraction as primary,
/// then lets a matching W3C context contribute its tracestate and parent_id
/// on top of it. `contexts` holds one entry per enabled style that was
/// actually extracted; `enabled_order` determines primacy.
pub fn merge_contexts(
    mut contexts: std::collections::HashMap<PropagationStyle, ExtractedContext>,
    enabled_order: &[PropagationStyle],
) -> ExtractedContext {
    let primary_style = enabled_order
        .iter()
        .find(|style| contexts.get(style).map(|c| !c.is_empty()).unwrap_or(false))
        .copied();

    let Some(primary_style) = primary_style else {
        return ExtractedContext::default();
    };

    let mut primary = contexts.remove(&primary_style).expect("checked above");

    if primary_style != PropagationStyle::W3C {
        if let Some(w3c) = contexts.get(&PropagationStyle::W3C) {
            if !w3c.is_empty() && w3c.trace_id == primary.trace_id {
                primary.additional_w3c_tracestate = w3c.additional_w3c_tracestate.clone();
                primary.additional_datadog_w3c_tracestate = w3c.additional_datadog_w3c_tracestate.clone();
                primary.headers_examined.extend(w3c.headers_examined.iter().cloned());
                primary.extraction_errors.extend(w3c.extraction_errors.iter().cloned());

                if w3c.parent_id != primary.parent_id {
                    let datadog_w3c_parent_id = match &w3c.datadog_w3c_parent_id {
                        Some(id) if id != "0000000000000000" => Some(id.clone()),
                        // the Datadog context may itself be the primary (already
                        // removed from `contexts` above) rather than a separate
                        // entry still sitting in the map.
                        _ if primary_style == PropagationStyle::Datadog => {
                            primary.parent_id.map(|id| id.hex16())
                        }
                        _ => contexts
                            .get(&PropagationStyle::Datadog)
                            .filter(|dd| dd.trace_id == primary.trace_id)
                            .and_then(|dd| dd.parent_id)
                            .map(|id| id.hex16()),
                    };
                    primary.datadog_w3c_parent_id = datadog_w3c_parent_id;
                    primary.parent_id = w3c.parent_id;
                }
            }
        }
    }

    primary
}
