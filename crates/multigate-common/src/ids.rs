/// Generate a per-request trace id (uuid v4), used throughout logging
/// and traffic events.
pub fn new_trace_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current wall-clock time as RFC3339, used for `lastUsedAt`-style
/// fields that are persisted to the pool document.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
