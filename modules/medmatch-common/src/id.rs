use uuid::Uuid;

/// Length of generated ids: 12 bytes rendered as 24 hex chars, matching the
/// ObjectId-shaped CHAR(24) columns the store uses for internal ids.
const ID_LENGTH: usize = 24;

/// Generate a 24-character lowercase hex id.
pub fn generate_id() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(ID_LENGTH);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_24_lowercase_hex_chars() {
        let id = generate_id();
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
    }
}
