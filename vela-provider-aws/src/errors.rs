//! Error classification shared by the adapters

/// Throttling-style error codes the services return under load. Safe
/// to retry from a wait loop; everything else aborts it.
pub(crate) fn is_throttling_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some(
            "Throttling"
                | "ThrottlingException"
                | "TooManyRequestsException"
                | "PriorRequestNotComplete"
        )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_codes_are_recognized() {
        assert!(is_throttling_code(Some("Throttling")));
        assert!(is_throttling_code(Some("PriorRequestNotComplete")));
        assert!(is_throttling_code(Some("TooManyRequestsException")));
        assert!(!is_throttling_code(Some("AccessDenied")));
        assert!(!is_throttling_code(None));
    }
}
