//! Security gate for untrusted inputs.
//!
//! Every externally supplied value that can influence process execution,
//! filesystem access, or browser navigation passes through this module
//! before it is used: action identifiers, content-source URLs, and local
//! symlink targets.
//!
//! ## Security Model
//!
//! - **Whitelist, not blacklist**: unknown-but-plausible identifiers and
//!   hosts are rejected by default.
//! - **Total functions**: malformed attacker-controlled input resolves to
//!   a deny outcome, never a panic or an error. Only programmer
//!   misconfiguration (an empty allowlist) fails, and it fails at
//!   construction time.
//! - **No side effects**: validation reads policy state only; the one
//!   exception is `validate_local_link`, which must consult the filesystem
//!   to resolve link targets.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use url::Url;

use crate::error::{Error, Result};

/// Outcome of a gate check. Immutable once produced.
///
/// Callers must not proceed with the gated action when `allowed` is false;
/// the gate is a total barrier, not advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    /// Whether the input may be used.
    pub allowed: bool,
    /// Specific, human-readable rejection cause when denied.
    pub reason: Option<String>,
}

impl ValidationOutcome {
    /// Create an allow outcome.
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Create a deny outcome with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// Convert into a `Result`, surfacing the rejection reason.
    pub fn into_result(self) -> Result<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(Error::Validation {
                reason: self
                    .reason
                    .unwrap_or_else(|| "rejected by security gate".into()),
            })
        }
    }
}

/// Immutable whitelist policy for action identifiers.
///
/// Configured once at construction and never mutated at runtime.
#[derive(Debug, Clone)]
pub struct ActionPolicy {
    allowed: HashSet<String>,
    base_dir: PathBuf,
    strip_prefix: String,
    suffix: String,
}

impl ActionPolicy {
    /// Create a policy over an allowed action set rooted at `base_dir`.
    ///
    /// Identifiers are normalized before matching: a leading
    /// `strip_prefix` (e.g. `scripts/`) is removed and `suffix` (e.g.
    /// `.py`) is appended when absent. An empty allowlist is a
    /// misconfiguration and fails here rather than denying every call at
    /// runtime.
    pub fn new(
        allowed: HashSet<String>,
        base_dir: impl Into<PathBuf>,
        strip_prefix: impl Into<String>,
        suffix: impl Into<String>,
    ) -> Result<Self> {
        if allowed.is_empty() {
            return Err(Error::Config(
                "action allowlist is empty; refusing to construct a gate that denies everything"
                    .into(),
            ));
        }
        Ok(Self {
            allowed,
            base_dir: base_dir.into(),
            strip_prefix: strip_prefix.into(),
            suffix: suffix.into(),
        })
    }

    /// Base directory actions resolve under.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Normalize a raw identifier the way the dispatch boundary does.
    pub fn normalize(&self, raw: &str) -> String {
        let stripped = raw.strip_prefix(self.strip_prefix.as_str()).unwrap_or(raw);
        if stripped.ends_with(self.suffix.as_str()) {
            stripped.to_string()
        } else {
            format!("{}{}", stripped, self.suffix)
        }
    }

    /// Resolve a normalized identifier to its path under the base dir.
    pub fn resolve(&self, normalized: &str) -> PathBuf {
        self.base_dir.join(normalized)
    }

    /// Validate an untrusted action identifier.
    ///
    /// Two independent checks, both required:
    /// 1. exact, case-sensitive membership of the normalized identifier in
    ///    the allowlist;
    /// 2. lexical containment of the resolved path within the base
    ///    directory, which catches `../` traversal that a literal
    ///    allowlist match would not.
    pub fn validate_action(&self, raw: &str) -> ValidationOutcome {
        if raw.trim().is_empty() {
            return ValidationOutcome::deny("action identifier is empty");
        }

        let normalized = self.normalize(raw);

        if !self.allowed.contains(&normalized) {
            let mut known: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
            known.sort_unstable();
            return ValidationOutcome::deny(format!(
                "action '{}' is not in the allowlist (allowed: {})",
                normalized,
                known.join(", ")
            ));
        }

        // Containment check runs even when the whitelist passes.
        let base = lexical_normalize(&self.base_dir);
        match lexical_normalize_under(&base, Path::new(&normalized)) {
            Some(resolved) if resolved.starts_with(&base) => ValidationOutcome::allow(),
            _ => ValidationOutcome::deny(format!(
                "action '{}' resolves outside the scripts directory",
                normalized
            )),
        }
    }
}

/// How the domain-specific identifier is located within a matched URL.
#[derive(Debug, Clone)]
enum TokenRule {
    /// Identifier is the sole path segment (`https://youtu.be/<id>`).
    PathSegment(Regex),
    /// Identifier is a named query parameter (`watch?v=<id>`).
    QueryParam { name: String, pattern: Regex },
    /// The entire path must match (`/notebook/<uuid>` URLs).
    FullPath(Regex),
}

/// Per-host validation rule.
#[derive(Debug, Clone)]
struct DomainRule {
    host: String,
    token: TokenRule,
}

/// Immutable URL policy: fixed scheme, exact-match host allowlist, and a
/// per-host identifier extraction rule.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    scheme: String,
    rules: Vec<DomainRule>,
}

const VIDEO_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{11}$";
const VIDEO_ID_PATH_PATTERN: &str = r"^/([A-Za-z0-9_-]{11})/?$";
const NOTEBOOK_PATH_PATTERN: &str = r"^/notebook/[a-f0-9-]+(/.*)?$";

impl UrlPolicy {
    /// Policy for YouTube content-source URLs.
    ///
    /// Accepts `https://youtu.be/<id>` and
    /// `https://{www.,m.,}youtube.com/watch?v=<id>` where the id is an
    /// exact 11-character `[A-Za-z0-9_-]` token.
    pub fn youtube() -> Self {
        let query = |host: &str| DomainRule {
            host: host.into(),
            token: TokenRule::QueryParam {
                name: "v".into(),
                pattern: Regex::new(VIDEO_ID_PATTERN).expect("static pattern"),
            },
        };
        Self {
            scheme: "https".into(),
            rules: vec![
                DomainRule {
                    host: "youtu.be".into(),
                    token: TokenRule::PathSegment(
                        Regex::new(VIDEO_ID_PATH_PATTERN).expect("static pattern"),
                    ),
                },
                query("youtube.com"),
                query("www.youtube.com"),
                query("m.youtube.com"),
            ],
        }
    }

    /// Policy for NotebookLM notebook URLs (`/notebook/<uuid>` paths).
    pub fn notebooklm() -> Self {
        Self {
            scheme: "https".into(),
            rules: vec![DomainRule {
                host: "notebooklm.google.com".into(),
                token: TokenRule::FullPath(
                    Regex::new(NOTEBOOK_PATH_PATTERN).expect("static pattern"),
                ),
            }],
        }
    }

    /// Hosts this policy accepts, for diagnostics.
    pub fn hosts(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.host.as_str()).collect()
    }
}

/// Validate an untrusted URL against a policy.
///
/// The identifier is extracted and pattern-matched as a standalone token;
/// substring presence is deliberately not accepted. Parse failures, scheme
/// or host mismatches, missing or malformed identifiers, and fragments all
/// deny. Never panics on attacker-controlled input.
pub fn validate_url(raw: &str, policy: &UrlPolicy) -> ValidationOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ValidationOutcome::deny("URL is empty");
    }

    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(e) => return ValidationOutcome::deny(format!("URL failed to parse: {e}")),
    };

    if parsed.scheme() != policy.scheme {
        return ValidationOutcome::deny(format!(
            "only {}:// URLs are allowed, got {}://",
            policy.scheme,
            parsed.scheme()
        ));
    }

    // Exact host match. Suffix matching would let youtube.com.evil.com
    // through.
    let host = match parsed.host_str() {
        Some(h) => h,
        None => return ValidationOutcome::deny("URL has no host"),
    };
    let rule = match policy.rules.iter().find(|r| r.host == host) {
        Some(r) => r,
        None => {
            return ValidationOutcome::deny(format!(
                "host '{}' is not in the allowlist ({})",
                host,
                policy.hosts().join(", ")
            ))
        }
    };

    if parsed.fragment().is_some() {
        return ValidationOutcome::deny("URL fragments are not allowed");
    }

    match &rule.token {
        TokenRule::PathSegment(pattern) => {
            if !pattern.is_match(parsed.path()) {
                return ValidationOutcome::deny(format!(
                    "could not extract a valid identifier from path '{}'",
                    parsed.path()
                ));
            }
        }
        TokenRule::QueryParam { name, pattern } => {
            let value = parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned());
            match value {
                Some(v) if pattern.is_match(&v) => {}
                Some(v) => {
                    return ValidationOutcome::deny(format!(
                        "query parameter '{}' is not a valid identifier: '{}'",
                        name, v
                    ))
                }
                None => {
                    return ValidationOutcome::deny(format!(
                        "URL is missing the '{}' query parameter",
                        name
                    ))
                }
            }
        }
        TokenRule::FullPath(pattern) => {
            if !pattern.is_match(parsed.path()) {
                return ValidationOutcome::deny(format!(
                    "path '{}' does not match the expected notebook format",
                    parsed.path()
                ));
            }
            // Query parameters are unusual for notebook URLs but some
            // features legitimately use them.
            if parsed.query().is_some() {
                tracing::warn!(url = %trimmed, "notebook URL carries query parameters");
            }
        }
    }

    ValidationOutcome::allow()
}

/// Validate a local indirection (symlink) before loading what it points to.
///
/// Plain files and directories pass untouched; a symlink must resolve to a
/// canonical path inside the canonical `expected_base`.
pub fn validate_local_link(path: &Path, expected_base: &Path) -> ValidationOutcome {
    let meta = match path.symlink_metadata() {
        Ok(m) => m,
        Err(e) => return ValidationOutcome::deny(format!("cannot stat {}: {e}", path.display())),
    };
    if !meta.file_type().is_symlink() {
        return ValidationOutcome::allow();
    }

    let target = match path.canonicalize() {
        Ok(t) => t,
        Err(e) => {
            return ValidationOutcome::deny(format!(
                "symlink {} does not resolve: {e}",
                path.display()
            ))
        }
    };
    let base = match expected_base.canonicalize() {
        Ok(b) => b,
        Err(e) => {
            return ValidationOutcome::deny(format!(
                "base directory {} does not resolve: {e}",
                expected_base.display()
            ))
        }
    };

    if target.starts_with(&base) {
        ValidationOutcome::allow()
    } else {
        ValidationOutcome::deny(format!(
            "symlink {} points outside {} (resolves to {})",
            path.display(),
            base.display(),
            target.display()
        ))
    }
}

/// Lexically normalize a path: fold `.` and `..` without touching the
/// filesystem, so the gate stays total for nonexistent candidates.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Join `candidate` under `base` and normalize; returns `None` when the
/// candidate escapes above the base via `..` components.
fn lexical_normalize_under(base: &Path, candidate: &Path) -> Option<PathBuf> {
    if candidate.is_absolute() {
        return None;
    }
    let mut out = base.to_path_buf();
    for component in candidate.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out == base || !out.pop() {
                    return None;
                }
                // Popping past the base is an escape even if the pop
                // itself succeeded.
                if !out.starts_with(base) {
                    return None;
                }
            }
            Component::Normal(seg) => out.push(seg),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}
