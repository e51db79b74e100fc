use crate::config::SpyConfig;
use crate::event::ExecutionEvent;

/// Whether `event` passes every filter of `config`.
///
/// Checked in order: master switch and categories, execution threshold,
/// exclude patterns, include patterns. Patterns match the template.
pub(crate) fn accepts(config: &SpyConfig, event: &ExecutionEvent) -> bool {
    if !config.is_category_enabled(event.category) {
        return false;
    }

    if let Some(threshold) = config.execution_threshold {
        if event.duration() < threshold {
            return false;
        }
    }

    if config
        .exclude_patterns
        .iter()
        .any(|p| p.is_match(&event.template))
    {
        return false;
    }

    config.include_patterns.is_empty()
        || config
            .include_patterns
            .iter()
            .any(|p| p.is_match(&event.template))
}
