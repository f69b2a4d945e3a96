//! Naming helpers for backup objects stored in a backend.

use std::sync::OnceLock;

use regex::Regex;
use tracing::error;

/// `prefix-` plus 16 random hex characters.
pub fn generate_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", &suffix[..16])
}

/// Names start with an alphanumeric character and continue with at least one
/// alphanumeric, `_`, `.` or `-`.
pub fn validate_name(name: &str) -> bool {
    static VALID_NAME: OnceLock<Regex> = OnceLock::new();
    VALID_NAME
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]+$").expect("valid name pattern"))
        .is_match(name)
}

/// Pull object names out of backend listing entries shaped
/// `[/]<prefix><name><suffix>`. Entries without the prefix and suffix are
/// skipped; invalid names are logged and skipped.
pub fn extract_names<S: AsRef<str>>(entries: &[S], prefix: &str, suffix: &str) -> Vec<String> {
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.as_ref().trim_start_matches('/');
        let Some(name) = entry
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
        else {
            continue;
        };
        if !validate_name(name) {
            error!(name, prefix, suffix, "invalid name found while extracting names");
            continue;
        }
        names.push(name.to_string());
    }
    names
}

/// Undo the `&` escaping shells apply to URLs passed on the command line.
pub fn unescape_url(url: &str) -> String {
    url.replacen("\\u0026", "&", 1).replacen("u0026", "&", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_names_are_valid_and_distinct() {
        let a = generate_name("backup");
        let b = generate_name("backup");
        assert!(a.starts_with("backup-"));
        assert_eq!(a.len(), "backup-".len() + 16);
        assert!(validate_name(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn validates_names() {
        assert!(validate_name("volume-1"));
        assert!(validate_name("a.b_c"));
        assert!(!validate_name("a"));
        assert!(!validate_name("-leading"));
        assert!(!validate_name("has space"));
        assert!(!validate_name("slash/inside"));
        assert!(!validate_name(""));
    }

    #[test]
    fn extracts_names_between_prefix_and_suffix() {
        let entries = [
            "/backup_backup-1234.cfg",
            "backup_backup-5678.cfg",
            "volume.cfg",
            "backup_bad name.cfg",
            "backup_x.cfg",
        ];
        assert_eq!(
            extract_names(&entries, "backup_", ".cfg"),
            vec!["backup-1234", "backup-5678"]
        );
    }

    #[test]
    fn unescapes_first_ampersand_escapes() {
        assert_eq!(
            unescape_url(r"s3://bucket@region/?a=1\u0026b=2u0026c=3u0026d=4"),
            "s3://bucket@region/?a=1&b=2&c=3u0026d=4"
        );
        assert_eq!(unescape_url("nfs://server:/opt/backupstore"), "nfs://server:/opt/backupstore");
    }
}
