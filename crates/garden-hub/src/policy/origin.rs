//! Origin allowlist compilation and matching.
//!
//! Entries come from a comma-separated config string. A lone `*` allows
//! everything; entries may embed `*` wildcards (`https://*.example.com`).
//! Matching is case-insensitive. Requests without an Origin header are
//! allowed: native clients do not send one.

#[derive(Debug, Clone)]
enum OriginRule {
    Any,
    Exact(String),
    Glob(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct OriginPolicy {
    rules: Vec<OriginRule>,
}

impl OriginPolicy {
    pub fn compile(raw: &str) -> Self {
        let rules = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|entry| {
                if entry == "*" {
                    OriginRule::Any
                } else if entry.contains('*') {
                    OriginRule::Glob(
                        entry.split('*').map(|s| s.to_ascii_lowercase()).collect(),
                    )
                } else {
                    OriginRule::Exact(entry.to_ascii_lowercase())
                }
            })
            .collect();
        Self { rules }
    }

    pub fn allows(&self, origin: Option<&str>) -> bool {
        let Some(origin) = origin else { return true };
        let origin = origin.to_ascii_lowercase();
        self.rules.iter().any(|rule| match rule {
            OriginRule::Any => true,
            OriginRule::Exact(expected) => *expected == origin,
            OriginRule::Glob(parts) => glob_match(parts, &origin),
        })
    }
}

/// `parts` are the literal segments around `*` wildcards, in order.
fn glob_match(parts: &[String], value: &str) -> bool {
    let mut rest = value;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            let Some(after) = rest.strip_prefix(part.as_str()) else {
                return false;
            };
            rest = after;
        } else if i == parts.len() - 1 {
            return rest.ends_with(part.as_str());
        } else {
            let Some(pos) = rest.find(part.as_str()) else {
                return false;
            };
            rest = &rest[pos + part.len()..];
        }
    }
    true
}
