/// Creates a root span subject to head based sampling.
///
/// Sampling is a pre-filter on span creation rather than a
/// subscriber decision, so unsampled auctions skip the context
/// collection cost entirely instead of building a span that gets
/// thrown away later.
///
/// # Behavior
/// - If a parent span is active: always creates a child span so
///   traces stay complete
/// - Otherwise: creates a root span at the configured rate,
///   `Span::none()` the rest of the time
#[macro_export]
macro_rules! sample_or_attach_root_span {
    ($sample_percent:expr, $span_name:literal) => {{
        let current = tracing::Span::current();

        if !current.is_disabled() || rand::random::<f32>() < $sample_percent {
            tracing::info_span!($span_name)
        } else {
            tracing::Span::none()
        }
    }};
}

/// Creates an INFO child span only when the parent is active, so
/// unsampled requests pay nothing.
///
/// Returns an **un-entered** span; call `.entered()` or use
/// `.instrument()`.
#[macro_export]
macro_rules! child_span_info {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::info_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}

/// DEBUG level sibling of [`child_span_info!`]
#[macro_export]
macro_rules! child_span_debug {
    ($span_name:literal) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name)
        } else {
            ::tracing::Span::none()
        }
    }};
    ($span_name:literal, $($fields:tt)*) => {{
        if !::tracing::Span::current().is_disabled() {
            ::tracing::debug_span!($span_name, $($fields)*)
        } else {
            ::tracing::Span::none()
        }
    }};
}
