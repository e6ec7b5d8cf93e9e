use sha2::{Digest, Sha256};

/// Creates a truncated, salted hash of an identifier for safe logging.
///
/// # Arguments
/// * `id` - The identifier to hash (e.g., email, user_id).
/// * `salt` - A salt value from the application's configuration.
///
/// # Returns
/// A short, hexadecimal string representing the salted hash.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();

    // Take first 4 bytes and format each as hex
    hash[..4]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

/// Validates the structural shape of an email address.
///
/// This is intentionally loose (one `@`, non-empty local part, a dot in the
/// domain); real verification would require sending mail.
///
/// # Returns
/// - `Ok(())` if the email looks like an email
/// - `Err(String)` with a user-friendly message otherwise
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must not exceed 254 characters".to_string());
    }

    let mut parts = email.split('@');
    let local = parts.next().unwrap_or("");
    let domain = parts.next().unwrap_or("");

    if local.is_empty() || domain.is_empty() || parts.next().is_some() {
        return Err("Email address is not valid".to_string());
    }

    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Email address is not valid".to_string());
    }

    if email.chars().any(char::is_whitespace) {
        return Err("Email address is not valid".to_string());
    }

    Ok(())
}

/// Validates password requirements.
///
/// # Password Requirements
/// - Minimum length: 8 characters
/// - Maximum length: 128 characters (bcrypt truncates at 72 bytes anyway)
///
/// # Returns
/// - `Ok(())` if password meets the requirements
/// - `Err(String)` with user-friendly error message if validation fails
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must not exceed 128 characters".to_string());
    }

    Ok(())
}

/// Validates a display name: non-blank, bounded length.
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 100 {
        return Err("Name must not exceed 100 characters".to_string());
    }

    Ok(())
}

/// Validates secret key strength by checking entropy and patterns.
///
/// Checks for:
/// - Minimum length (must be at least min_length)
/// - Not all the same character (e.g., "aaaaa...")
/// - Not a simple pattern (e.g., "abcdabcd...")
/// - At least some character diversity
///
/// # Returns
/// - `Ok(())` if secret meets strength requirements
/// - `Err(String)` with explanation if validation fails
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), String> {
    if secret.len() < min_length {
        return Err(format!(
            "Secret must be at least {} characters long",
            min_length
        ));
    }

    if let Some(first) = secret.chars().next() {
        if secret.chars().all(|c| c == first) {
            return Err("Secret must not consist of a single repeated character".to_string());
        }
    }

    // Reject simple repeating patterns (e.g., "ababab" or "123123")
    if secret.len() >= 4 {
        for pattern_len in 2..=(secret.len() / 2).min(8) {
            let pattern = &secret[..pattern_len];
            let repetitions = secret.len() / pattern_len;
            let repeated = pattern.repeat(repetitions);
            if secret.starts_with(&repeated) {
                return Err("Secret must not contain simple repeating patterns".to_string());
            }
        }
    }

    if secret.len() >= 32 {
        let unique_chars: std::collections::HashSet<char> = secret.chars().collect();
        if unique_chars.len() < 8 {
            return Err("Secret must contain at least 8 different characters".to_string());
        }
    }

    Ok(())
}

/// Extracts the client IP from proxy headers for logging.
///
/// X-Forwarded-For can be spoofed by clients, so it should only be trusted
/// when the request comes through a trusted reverse proxy that sets it.
pub fn extract_client_ip(headers: &axum::http::HeaderMap) -> String {
    // X-Forwarded-For can contain multiple IPs: "client, proxy1, proxy2";
    // the first is the original client
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded_for.to_str() {
            let first_ip = forwarded_str.split(',').next().unwrap_or("").trim();
            if !first_ip.is_empty() {
                return first_ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            let trimmed = real_ip_str.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_safe_id_is_stable_and_short() {
        let a = log_safe_id("user@example.com", "salt");
        let b = log_safe_id("user@example.com", "salt");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_log_safe_id_differs_by_salt() {
        let a = log_safe_id("user@example.com", "salt-one");
        let b = log_safe_id("user@example.com", "salt-two");
        assert_ne!(a, b);
    }

    #[test]
    fn test_email_empty() {
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_email_missing_parts() {
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user").is_err());
        assert!(validate_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_bad_domain() {
        assert!(validate_email("user@localhost").is_err());
        assert!(validate_email("user@.com").is_err());
        assert!(validate_email("user@example.").is_err());
    }

    #[test]
    fn test_email_with_whitespace() {
        assert!(validate_email("us er@example.com").is_err());
    }

    #[test]
    fn test_email_valid() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("maria.silva@gov.br").is_ok());
        assert!(validate_email("a+b@sub.example.org").is_ok());
    }

    #[test]
    fn test_password_too_short() {
        assert!(validate_password("short1").is_err());
    }

    #[test]
    fn test_password_too_long() {
        assert!(validate_password(&"a".repeat(129)).is_err());
    }

    #[test]
    fn test_password_valid() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("12345678").is_ok());
    }

    #[test]
    fn test_name_blank() {
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn test_name_valid() {
        assert!(validate_name("Maria Silva").is_ok());
    }

    #[test]
    fn test_secret_repeated_char() {
        assert!(validate_secret_strength(&"a".repeat(40), 32).is_err());
    }

    #[test]
    fn test_secret_repeating_pattern() {
        assert!(validate_secret_strength(&"ab".repeat(20), 32).is_err());
    }

    #[test]
    fn test_secret_valid() {
        assert!(validate_secret_strength("kYx93mQ2pLw84nRt71vZcB50sdFgHjua", 32).is_ok());
    }

    #[test]
    fn test_extract_client_ip_forwarded_for() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(extract_client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_extract_client_ip_unknown() {
        let headers = axum::http::HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), "unknown");
    }
}
