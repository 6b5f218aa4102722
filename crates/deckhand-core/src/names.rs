//! Name, filename and schedule validation helpers

use once_cell::sync::Lazy;
use regex::Regex;

static DNS_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

static DNS_SUBDOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid regex")
});

static CRON_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z*/,?\-LW#]+$").expect("valid regex"));

/// Maximum length of a fully-qualified resource name
pub const MAX_NAME_LEN: usize = 253;

/// Maximum length of a namespaced name or DNS label
pub const MAX_LABEL_LEN: usize = 63;

/// A resource name valid for both Kubernetes and the filesystem
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && DNS_NAME.is_match(name)
}

/// A DNS-1123 label: what a namespace, Service or container name must be
pub fn is_valid_label_name(name: &str) -> bool {
    name.len() <= MAX_LABEL_LEN && DNS_NAME.is_match(name)
}

/// A dotted DNS subdomain, e.g. `widgets.example.com`
pub fn is_valid_qualified_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && DNS_SUBDOMAIN.is_match(name)
}

/// Problems with a name, phrased for `validate()` output
pub fn name_problems(what: &str, name: &str, max: usize) -> Vec<String> {
    let mut problems = Vec::new();
    if name.is_empty() {
        problems.push(format!("{what} name must not be empty"));
        return problems;
    }
    if name.len() > max {
        problems.push(format!(
            "{what} name '{name}' is {} characters long (max {max})",
            name.len()
        ));
    }
    if !DNS_NAME.is_match(name) {
        problems.push(format!(
            "{what} name '{name}' must consist of lowercase alphanumerics and '-', \
             and start and end with an alphanumeric"
        ));
    }
    problems
}

/// Replace characters that are unsafe in file names
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect()
}

/// Turn a resource name into an identifier (`my-app` -> `my_app`)
pub fn to_identifier(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Turn a resource name into an environment variable prefix (`db-creds` -> `DB_CREDS`)
pub fn to_env_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Normalize a cron schedule
///
/// Collapses whitespace and expands the standard `@` macros to five fields.
/// Returns `None` if the schedule is not a valid five-field expression.
pub fn normalize_cron(schedule: &str) -> Option<String> {
    let trimmed = schedule.trim();
    let expanded = match trimmed {
        "@yearly" | "@annually" => "0 0 1 1 *",
        "@monthly" => "0 0 1 * *",
        "@weekly" => "0 0 * * 0",
        "@daily" | "@midnight" => "0 0 * * *",
        "@hourly" => "0 * * * *",
        other => other,
    };

    let fields: Vec<&str> = expanded.split_whitespace().collect();
    if fields.len() != 5 || !fields.iter().all(|f| CRON_FIELD.is_match(f)) {
        return None;
    }
    Some(fields.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("web"));
        assert!(is_valid_name("web-1"));
        assert!(is_valid_name("1web"));
        assert!(!is_valid_name("Web"));
        assert!(!is_valid_name("-web"));
        assert!(!is_valid_name("web-"));
        assert!(!is_valid_name("web_1"));
        assert!(!is_valid_name(""));
        assert!(is_valid_name(&"a".repeat(253)));
        assert!(!is_valid_name(&"a".repeat(254)));
    }

    #[test]
    fn test_is_valid_label_name() {
        assert!(is_valid_label_name(&"a".repeat(63)));
        assert!(!is_valid_label_name(&"a".repeat(64)));
    }

    #[test]
    fn test_qualified_name() {
        assert!(is_valid_qualified_name("widgets.example.com"));
        assert!(!is_valid_qualified_name("Widgets.example.com"));
        assert!(!is_valid_qualified_name("widgets..example.com"));
    }

    #[test]
    fn test_name_problems() {
        assert!(name_problems("App", "web", 63).is_empty());
        assert_eq!(name_problems("App", "", 63).len(), 1);
        let problems = name_problems("App", "My_App", 63);
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("lowercase"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("a/b:c"), "a-b-c");
        assert_eq!(sanitize_filename("widgets.example.com"), "widgets.example.com");
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(to_identifier("my-app"), "my_app");
        assert_eq!(to_identifier("1st"), "_1st");
        assert_eq!(to_env_name("db-creds"), "DB_CREDS");
        assert_eq!(to_env_name("api.key"), "API_KEY");
    }

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("  0   2 * *  * ").as_deref(), Some("0 2 * * *"));
        assert_eq!(normalize_cron("@daily").as_deref(), Some("0 0 * * *"));
        assert_eq!(normalize_cron("@hourly").as_deref(), Some("0 * * * *"));
        assert_eq!(normalize_cron("*/5 * * * 1-5").as_deref(), Some("*/5 * * * 1-5"));
        assert!(normalize_cron("* * *").is_none());
        assert!(normalize_cron("every day").is_none());
        assert!(normalize_cron("@sometimes").is_none());
    }
}
