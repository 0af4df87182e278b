//! Report of the changes that could not be hotswapped.

use super::HotswapMode;
use crate::classify::NonHotswappableChange;

/// Header and one line per reported change; `None` when there is nothing to report.
///
/// In hotswap-only mode changes hidden from that mode are left out.
pub(crate) fn non_hotswappable_report(
    stack_name: &str,
    mode: HotswapMode,
    changes: &[NonHotswappableChange],
) -> Option<(String, Vec<String>)> {
    let lines: Vec<String> = changes
        .iter()
        .filter(|c| mode == HotswapMode::FallBack || c.hotswap_only_visible)
        .map(report_line)
        .collect();
    if lines.is_empty() {
        return None;
    }

    let header = match mode {
        HotswapMode::HotswapOnly => "The following non-hotswappable changes were found. \
             To reconcile these using CloudFormation, run the deployment with fall-back enabled"
            .to_string(),
        HotswapMode::FallBack => format!(
            "Could not perform a hotswap deployment, as stack '{stack_name}' contains \
             non-hotswappable changes. Falling back to a full deployment"
        ),
    };
    Some((header, lines))
}

/// Log the report with `warn!` in hotswap-only mode and `info!` otherwise.
pub(crate) fn log_non_hotswappable(
    stack_name: &str,
    mode: HotswapMode,
    changes: &[NonHotswappableChange],
) {
    let Some((header, lines)) = non_hotswappable_report(stack_name, mode, changes) else {
        return;
    };
    match mode {
        HotswapMode::HotswapOnly => {
            tracing::warn!(stack = stack_name, "{header}");
            for line in &lines {
                tracing::warn!(stack = stack_name, "{line}");
            }
        }
        HotswapMode::FallBack => {
            tracing::info!(stack = stack_name, "{header}");
            for line in &lines {
                tracing::info!(stack = stack_name, "{line}");
            }
        }
    }
}

fn report_line(change: &NonHotswappableChange) -> String {
    if change.resource_type.is_empty() {
        return format!("logicalID: '{}', reason: {change}", change.logical_id);
    }
    if change.rejected_properties.is_empty() {
        return format!(
            "logicalID: '{}', Type: '{}', reason: {change}",
            change.logical_id, change.resource_type
        );
    }
    format!(
        "logicalID: '{}', Type: '{}', rejected changes: '{}', reason: {change}",
        change.logical_id,
        change.resource_type,
        change.rejected_properties.join("','")
    )
}
