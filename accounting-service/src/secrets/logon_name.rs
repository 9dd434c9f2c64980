//! Short POSIX-friendly logon names derived from directory names.
//!
//! `jane.doe@example.org` becomes `jadoe.example`: two characters of the part
//! before the first dot, up to six of the part after it, and the first label
//! of the domain. Collisions get a `.0` .. `.9` suffix.

use std::collections::HashSet;

use super::SecretError;

pub const MAX_LOGON_NAME_ATTEMPTS: usize = 10;
const PREFIX_CHARS: usize = 2;
const SUFFIX_CHARS: usize = 6;

fn sanitize(part: &str, limit: usize) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(limit)
        .collect()
}

/// The unsuffixed name for `dom_name`.
pub fn candidate_logon_name(dom_name: &str) -> Result<String, SecretError> {
    let (local, domain) = match dom_name.split_once('@') {
        Some((local, domain)) => (local, Some(domain)),
        None => (dom_name, None),
    };

    let (prefix, suffix) = match local.split_once('.') {
        Some((prefix, suffix)) => (prefix, suffix),
        None => ("", local),
    };

    let mut name = sanitize(prefix, PREFIX_CHARS);
    name.push_str(&sanitize(suffix, SUFFIX_CHARS));
    if name.is_empty() {
        return Err(SecretError::InvalidDirectoryName(dom_name.to_string()));
    }

    if let Some(label) = domain
        .and_then(|d| d.split('.').next())
        .map(|l| sanitize(l, usize::MAX))
        .filter(|l| !l.is_empty())
    {
        name.push('.');
        name.push_str(&label);
    }

    Ok(name)
}

/// First free name for `dom_name` given the names already taken.
/// Deterministic over `existing`; callers still rely on the store's unique
/// constraint to settle concurrent provisioning.
pub fn generate_logon_name(
    dom_name: &str,
    existing: &HashSet<String>,
) -> Result<String, SecretError> {
    let candidate = candidate_logon_name(dom_name)?;
    if !existing.contains(&candidate) {
        return Ok(candidate);
    }

    let free = (0..MAX_LOGON_NAME_ATTEMPTS)
        .map(|n| format!("{}.{}", candidate, n))
        .find(|name| !existing.contains(name));

    free.ok_or(SecretError::GenerationExhausted {
        candidate,
        attempts: MAX_LOGON_NAME_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_from_dotted_local_part() {
        assert_eq!(
            candidate_logon_name("jane.doe@example.org").unwrap(),
            "jadoe.example"
        );
        assert_eq!(
            candidate_logon_name("Maximilian.Schwarzenegger@Physics.uni.edu").unwrap(),
            "maschwar.physics"
        );
    }

    #[test]
    fn derives_without_dot_or_domain() {
        assert_eq!(candidate_logon_name("jdoe@example.org").unwrap(), "jdoe.example");
        assert_eq!(candidate_logon_name("administrator").unwrap(), "admini");
        assert_eq!(candidate_logon_name("o'neil.k-9@lab").unwrap(), "onk9.lab");
    }

    #[test]
    fn rejects_names_without_usable_characters() {
        assert!(matches!(
            candidate_logon_name("@example.org"),
            Err(SecretError::InvalidDirectoryName(_))
        ));
        assert!(candidate_logon_name("..@x").is_err());
    }

    #[test]
    fn is_deterministic() {
        let taken = HashSet::from(["jadoe.example".to_string()]);
        let first = generate_logon_name("jane.doe@example.org", &taken).unwrap();
        let second = generate_logon_name("jane.doe@example.org", &taken).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "jadoe.example.0");
    }

    #[test]
    fn collisions_walk_the_suffixes_then_give_up() {
        let mut taken = HashSet::new();
        let mut issued = Vec::new();
        for _ in 0..=MAX_LOGON_NAME_ATTEMPTS {
            let name = generate_logon_name("jane.doe@example.org", &taken).unwrap();
            assert!(!taken.contains(&name));
            taken.insert(name.clone());
            issued.push(name);
        }

        assert_eq!(issued[0], "jadoe.example");
        assert_eq!(issued[1], "jadoe.example.0");
        assert_eq!(issued[MAX_LOGON_NAME_ATTEMPTS], "jadoe.example.9");

        assert_eq!(
            generate_logon_name("jane.doe@example.org", &taken),
            Err(SecretError::GenerationExhausted {
                candidate: "jadoe.example".to_string(),
                attempts: MAX_LOGON_NAME_ATTEMPTS,
            })
        );
    }

    #[test]
    fn similar_names_share_a_candidate() {
        let taken = HashSet::from(["jadoe.example".to_string()]);
        assert_eq!(
            generate_logon_name("jack.doe@example.com", &taken).unwrap(),
            "jadoe.example.0"
        );
    }
}
