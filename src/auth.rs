/// Returns true only when a non-empty secret was supplied and it
/// exactly matches the configured one.
#[must_use]
pub fn is_authorized(supplied: Option<&str>, configured: Option<&str>) -> bool {
    match (supplied, configured) {
        (Some(supplied), Some(configured)) => !supplied.is_empty() && supplied == configured,
        _ => false,
    }
}
