//! Validation helpers shared by the resource schemas

use std::sync::OnceLock;

use regex::Regex;

fn arn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^arn:[a-z0-9-]+:[a-z0-9-]+:[a-z0-9-]*:\d{0,12}:.+$").unwrap()
    })
}

/// Validate an AWS ARN (partition and service must be present)
pub fn validate_arn(s: &str) -> Result<(), String> {
    if arn_regex().is_match(s) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid ARN", s))
    }
}

/// Validate a DNS zone or domain name: dot-separated labels of at most
/// 63 characters, 253 characters total, optional trailing dot.
pub fn validate_domain_name(s: &str) -> Result<(), String> {
    let name = s.strip_suffix('.').unwrap_or(s);
    if name.is_empty() {
        return Err("domain name must not be empty".to_string());
    }
    if name.len() > 253 {
        return Err(format!(
            "domain name must be at most 253 characters, got {}",
            name.len()
        ));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(format!("'{}' contains an empty label", s));
        }
        if label.len() > 63 {
            return Err(format!("label '{}' exceeds 63 characters", label));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '*')
        {
            return Err(format!("label '{}' contains invalid characters", label));
        }
    }
    Ok(())
}

fn report_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z!\-_.*'()]+$").unwrap())
}

/// Validate a cost-and-usage report name (S3-key safe characters, max 256)
pub fn validate_report_name(s: &str) -> Result<(), String> {
    if s.is_empty() || s.len() > 256 {
        return Err("report name must be between 1 and 256 characters".to_string());
    }
    if report_name_regex().is_match(s) {
        Ok(())
    } else {
        Err(format!(
            "report name '{}' may only contain alphanumerics and !-_.*'()",
            s
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_arns() {
        assert!(validate_arn("arn:aws:acm:us-east-1:123456789012:certificate/abc").is_ok());
        assert!(validate_arn("arn:aws-us-gov:s3:::my-bucket").is_ok());
        assert!(
            validate_arn(
                "arn:aws:route53-recovery-control::123456789012:cluster/5d3e"
            )
            .is_ok()
        );
    }

    #[test]
    fn invalid_arns() {
        assert!(validate_arn("not-an-arn").is_err());
        assert!(validate_arn("arn:aws:s3").is_err());
        assert!(validate_arn("").is_err());
    }

    #[test]
    fn valid_domain_names() {
        assert!(validate_domain_name("example.com").is_ok());
        assert!(validate_domain_name("example.com.").is_ok());
        assert!(validate_domain_name("sub.example.co.uk").is_ok());
        assert!(validate_domain_name("*.example.com").is_ok());
    }

    #[test]
    fn invalid_domain_names() {
        assert!(validate_domain_name("").is_err());
        assert!(validate_domain_name("exa mple.com").is_err());
        assert!(validate_domain_name("example..com").is_err());
        let long_label = format!("{}.com", "a".repeat(64));
        assert!(validate_domain_name(&long_label).is_err());
    }

    #[test]
    fn report_names() {
        assert!(validate_report_name("my-report_2024.v1").is_ok());
        assert!(validate_report_name("bad/name").is_err());
        assert!(validate_report_name("").is_err());
        assert!(validate_report_name(&"a".repeat(257)).is_err());
    }
}
