//! Bluetooth device address handling

use std::fmt;

/// Reason an address string was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressError {
    pub address: String,
    pub reason: &'static str,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid address '{}': {}", self.address, self.reason)
    }
}

impl std::error::Error for AddressError {}

/// Validate a colon-separated MAC address and return its upper-case form.
///
/// Scanners report addresses in either case; the registry keys on the
/// upper-case form so lookups are case-insensitive.
pub fn normalize_address(address: &str) -> Result<String, AddressError> {
    let reject = |reason| AddressError {
        address: address.to_string(),
        reason,
    };

    let trimmed = address.trim();
    let octets: Vec<&str> = trimmed.split(':').collect();
    if octets.len() != 6 {
        return Err(reject("expected six colon-separated octets"));
    }
    for octet in &octets {
        if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(reject("octets must be two hex digits"));
        }
    }

    Ok(trimmed.to_ascii_uppercase())
}

pub fn is_valid_address(address: &str) -> bool {
    normalize_address(address).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case() {
        assert_eq!(
            normalize_address("80:ec:cc:cd:33:7e").unwrap(),
            "80:EC:CC:CD:33:7E"
        );
        assert_eq!(
            normalize_address(" D8:F2:C8:9B:33:34 ").unwrap(),
            "D8:F2:C8:9B:33:34"
        );
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in [
            "",
            "80:EC:CC:CD:33",
            "80:EC:CC:CD:33:7E:00",
            "80-EC-CC-CD-33-7E",
            "80:EC:CC:CD:33:7G",
            "80:EC:CC:CD:33:7",
            "80:EC:CC:CD:33:7EE",
        ] {
            assert!(!is_valid_address(bad), "{:?} should be rejected", bad);
        }
    }
}
