// URL-safe username generation
//
// Usernames are derived deterministically from the display name plus a
// short suffix of the account id, so they are stable for a given account
// and collision-proof across accounts that share a name.

use uuid::Uuid;

/// Length of the id suffix appended to the slug
const ID_SUFFIX_LEN: usize = 8;

/// Turn a display name into a lowercase, hyphen-separated slug.
/// Anything outside [a-z0-9] becomes a separator; runs collapse.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_separator = true;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('-');
            last_was_separator = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Build the username for a user from their name and account id
pub fn generate_username(first_name: &str, last_name: &str, id: &Uuid) -> String {
    let full = format!("{} {}", first_name, last_name);
    let slug = slugify(&full);
    let suffix = &id.simple().to_string()[..ID_SUFFIX_LEN];

    if slug.is_empty() {
        format!("member-{}", suffix)
    } else {
        format!("{}-{}", slug, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Jane Doe"), "jane-doe");
        assert_eq!(slugify("  Jane   Doe  "), "jane-doe");
        assert_eq!(slugify("O'Brien, Conor"), "o-brien-conor");
        assert_eq!(slugify("ALLCAPS"), "allcaps");
    }

    #[test]
    fn test_generate_username_is_deterministic() {
        let id = Uuid::parse_str("5d2f1a34-9c1b-4f68-8f50-8b8f53f1a111").unwrap();

        let first = generate_username("Jane", "Doe", &id);
        let second = generate_username("Jane", "Doe", &id);

        assert_eq!(first, second);
        assert_eq!(first, "jane-doe-5d2f1a34");
    }

    #[test]
    fn test_generate_username_distinct_ids_never_collide() {
        let id_a = Uuid::parse_str("5d2f1a34-9c1b-4f68-8f50-8b8f53f1a111").unwrap();
        let id_b = Uuid::parse_str("6e3f2b45-0d2c-4f68-8f50-8b8f53f1a222").unwrap();

        assert_ne!(
            generate_username("Jane", "Doe", &id_a),
            generate_username("Jane", "Doe", &id_b)
        );
    }

    #[test]
    fn test_generate_username_url_safe() {
        let id = Uuid::new_v4();
        let username = generate_username("Łukasz", "Nowak-Kowalski", &id);

        assert!(username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn test_generate_username_empty_name_falls_back() {
        let id = Uuid::parse_str("5d2f1a34-9c1b-4f68-8f50-8b8f53f1a111").unwrap();
        assert_eq!(generate_username("", "", &id), "member-5d2f1a34");
    }
}
