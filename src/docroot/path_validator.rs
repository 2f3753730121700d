//! Stateless path checks for docroot scoping.
//!
//! Everything here works on plain `/`-separated repository paths. Nothing touches the
//! network or holds state, so these are safe to call from any task without locking.

use serde::Serialize;
use std::fmt;

/// Placeholder folder name for files at the top of a boundary.
pub const ROOT_FOLDER: &str = "(root)";

/// Machine-readable reason attached to a rejected path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    OutsideDocroot,
    DotfileBlocked,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::OutsideDocroot => "outside_docroot",
            RejectReason::DotfileBlocked => "dotfile_blocked",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller was trying to do; only used to phrase error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationKind {
    #[default]
    Access,
    Read,
    Write,
    Delete,
    List,
    History,
    Search,
    Catalog,
}

impl OperationKind {
    pub fn verb(&self) -> &'static str {
        match self {
            OperationKind::Access => "access",
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Delete => "delete",
            OperationKind::List => "list",
            OperationKind::History => "view history of",
            OperationKind::Search => "search",
            OperationKind::Catalog => "catalog",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    pub ignore_docroot: bool,
    pub allow_dotfiles: bool,
    pub operation: OperationKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
    pub reason: Option<RejectReason>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { valid: true, error: None, reason: None }
    }

    pub fn rejected(reason: RejectReason, error: String) -> Self {
        Self { valid: false, error: Some(error), reason: Some(reason) }
    }
}

/// Canonical form of a configured docroot.
///
/// `None` means "not set, fall through to the next source". Root indicators (`.`, `/`, `./`)
/// collapse to the empty string. Leading `./` and `/` and trailing slashes are dropped, so the
/// result is a plain relative prefix and stable under repeated application.
pub fn normalize_docroot(value: Option<&str>) -> Option<String> {
    let mut rest = value?.trim_end_matches('/');
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('/') {
            rest = r;
        } else {
            break;
        }
    }
    if rest.is_empty() || rest == "." {
        return Some(String::new());
    }
    Some(rest.to_string())
}

/// Strips one leading `./` then one leading `/`, then one trailing `/`.
pub fn normalize_path(path: &str) -> &str {
    let path = path.strip_prefix("./").unwrap_or(path);
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// True when any segment starts with a literal dot (`.gitignore`, `.github/ci.yml`, `docs/.vscode/x`).
///
/// Interior dots (`version-2.0.md`) are fine. A bare `.` counts; `""` and `/` do not.
pub fn has_dot_components(path: &str) -> bool {
    if path == "." {
        return true;
    }
    normalize_path(path)
        .split('/')
        .any(|segment| segment.starts_with('.'))
}

pub fn is_path_in_docroot(path: &str, docroot: Option<&str>) -> bool {
    let docroot = match docroot {
        None | Some("") => return true,
        Some(d) => normalize_path(d),
    };
    let path = normalize_path(path);

    if path.is_empty() {
        return docroot.is_empty();
    }
    if docroot.is_empty() || path == docroot {
        return true;
    }
    path.strip_prefix(docroot)
        .is_some_and(|rest| rest.starts_with('/'))
}

pub fn should_enforce_docroot(docroot: Option<&str>, ignore_docroot: bool) -> bool {
    if ignore_docroot {
        return false;
    }
    !matches!(docroot, None | Some(""))
}

/// Checks `path` against the dot-file policy and then the docroot.
///
/// The dot-file check runs first and does not look at `ignore_docroot`: a caller has to pass both
/// overrides to reach a hidden file outside the docroot.
pub fn validate_path(path: &str, docroot: Option<&str>, opts: ValidateOptions) -> ValidationResult {
    if !opts.allow_dotfiles && has_dot_components(path) {
        return ValidationResult::rejected(
            RejectReason::DotfileBlocked,
            generate_dotfile_error(path, opts.operation),
        );
    }

    if !should_enforce_docroot(docroot, opts.ignore_docroot) {
        return ValidationResult::ok();
    }

    let docroot = docroot.unwrap_or_default();
    let escapes = normalize_path(path).split('/').any(|segment| segment == "..");
    if escapes || !is_path_in_docroot(path, Some(docroot)) {
        return ValidationResult::rejected(
            RejectReason::OutsideDocroot,
            generate_docroot_error(path, docroot, opts.operation),
        );
    }
    ValidationResult::ok()
}

pub fn generate_docroot_error(path: &str, docroot: &str, operation: OperationKind) -> String {
    let op = operation.verb();
    format!(
        "Cannot {op} '{path}': Path is outside configured docroot '{docroot}'.

To {op} this file, you have two options:

1. Quick override (one-time): Add \"ignore_docroot\": true to your tool call
2. Permanent change: Update .mcp-config.json to change your workspace:
   {{
     \"mcp\": {{
       \"docroot\": \".\"
     }}
   }}

Current workspace: '{docroot}'"
    )
}

fn generate_dotfile_error(path: &str, operation: OperationKind) -> String {
    format!(
        "Cannot {} '{path}': Path contains a hidden (dot-prefixed) file or directory.

Add \"allow_dotfiles\": true to your tool call to access hidden files. If the path is also outside the docroot, \"ignore_docroot\": true is needed as well.",
        operation.verb()
    )
}

/// Maps a caller-supplied, docroot-relative path onto the repository.
///
/// A leading `/` marks a repository-root path, which is left unprefixed so the docroot check can
/// reject it. Paths already carrying the docroot are not prefixed twice.
pub fn construct_full_path(path: &str, docroot: &str, ignore_docroot: bool) -> String {
    let normalized = normalize_path(path);
    let docroot = normalize_path(docroot);
    if ignore_docroot || docroot.is_empty() || path.starts_with('/') {
        return normalized.to_string();
    }
    if normalized == docroot || normalized.starts_with(&format!("{docroot}/")) {
        return normalized.to_string();
    }
    if normalized.is_empty() {
        return docroot.to_string();
    }
    format!("{docroot}/{normalized}")
}

/// Parent folder of a `/`-separated path, or [`ROOT_FOLDER`] for top-level entries.
pub fn parent_folder(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((folder, _)) => folder,
        None => ROOT_FOLDER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(ignore_docroot: bool, allow_dotfiles: bool) -> ValidateOptions {
        ValidateOptions { ignore_docroot, allow_dotfiles, operation: OperationKind::Read }
    }

    #[test]
    fn normalize_docroot_maps_root_indicators() {
        assert_eq!(normalize_docroot(Some(".")).as_deref(), Some(""));
        assert_eq!(normalize_docroot(Some("/")).as_deref(), Some(""));
        assert_eq!(normalize_docroot(Some("./")).as_deref(), Some(""));
        assert_eq!(normalize_docroot(Some("")).as_deref(), Some(""));
        assert_eq!(normalize_docroot(Some("docs/")).as_deref(), Some("docs"));
        assert_eq!(normalize_docroot(Some("docs")).as_deref(), Some("docs"));
        assert_eq!(normalize_docroot(None), None);
    }

    #[test]
    fn normalize_docroot_strips_leading_markers() {
        assert_eq!(normalize_docroot(Some("./docs")).as_deref(), Some("docs"));
        assert_eq!(normalize_docroot(Some("/docs/")).as_deref(), Some("docs"));
        assert_eq!(normalize_docroot(Some(".//docs/api")).as_deref(), Some("docs/api"));
        assert_eq!(normalize_docroot(Some("//docs")).as_deref(), Some("docs"));
        assert_eq!(construct_full_path("docs/guide.md", &normalize_docroot(Some("./docs")).unwrap(), false), "docs/guide.md");
    }

    #[test]
    fn normalize_docroot_is_idempotent() {
        for input in ["", ".", "/", "./", "//", "docs", "docs/", "docs//", "a/b/", ".//", "./docs", "/docs", "/./docs/"] {
            let once = normalize_docroot(Some(input));
            let twice = normalize_docroot(once.as_deref());
            assert_eq!(once, twice, "input {input:?}");
        }
        assert_eq!(normalize_docroot(normalize_docroot(None).as_deref()), None);
    }

    #[test]
    fn normalize_path_strips_leading_and_trailing() {
        assert_eq!(normalize_path("./file.md"), "file.md");
        assert_eq!(normalize_path("/file.md"), "file.md");
        assert_eq!(normalize_path("dir/"), "dir");
        assert_eq!(normalize_path("dir/file.md"), "dir/file.md");
        assert_eq!(normalize_path(""), "");
    }

    #[test]
    fn dot_components_detected() {
        assert!(has_dot_components(".gitignore"));
        assert!(has_dot_components(".github/workflows/ci.yml"));
        assert!(has_dot_components("docs/.vscode/settings.json"));
        assert!(has_dot_components("."));
        assert!(has_dot_components("docs/../secrets.md"));
    }

    #[test]
    fn interior_dots_and_roots_allowed() {
        assert!(!has_dot_components("version-2.0-guide.md"));
        assert!(!has_dot_components("file.name.with.dots.md"));
        assert!(!has_dot_components("policies/vacation.md"));
        assert!(!has_dot_components("./docs/a.md"));
        assert!(!has_dot_components(""));
        assert!(!has_dot_components("/"));
        assert!(!has_dot_components("//"));
    }

    #[test]
    fn containment() {
        assert!(is_path_in_docroot("docs/file.md", Some("docs")));
        assert!(is_path_in_docroot("docs/sub/file.md", Some("docs")));
        assert!(is_path_in_docroot("docs", Some("docs")));
        assert!(is_path_in_docroot("/docs/file.md", Some("docs/")));
        assert!(!is_path_in_docroot("README.md", Some("docs")));
        assert!(!is_path_in_docroot("docs2/file.md", Some("docs")));
        assert!(is_path_in_docroot("any/path.md", Some("")));
        assert!(is_path_in_docroot("any/path.md", None));
    }

    #[test]
    fn empty_path_only_in_root_docroot() {
        assert!(!is_path_in_docroot("", Some("docs")));
        assert!(!is_path_in_docroot("/", Some("docs")));
        assert!(is_path_in_docroot("", Some("")));
        assert!(is_path_in_docroot("", Some("./")));
    }

    #[test]
    fn enforcement_rules() {
        assert!(should_enforce_docroot(Some("docs"), false));
        assert!(!should_enforce_docroot(Some("docs"), true));
        assert!(!should_enforce_docroot(Some(""), false));
        assert!(!should_enforce_docroot(None, false));
    }

    #[test]
    fn validate_inside_and_outside() {
        assert!(validate_path("docs/file.md", Some("docs"), opts(false, false)).valid);

        let outside = validate_path("README.md", Some("docs"), opts(false, false));
        assert!(!outside.valid);
        assert_eq!(outside.reason, Some(RejectReason::OutsideDocroot));
        assert!(outside.error.unwrap().contains("ignore_docroot"));

        assert!(validate_path("README.md", Some("docs"), opts(true, false)).valid);
        assert!(validate_path("any/file.md", Some(""), opts(false, false)).valid);
    }

    #[test]
    fn dotfiles_checked_before_docroot() {
        let r = validate_path(".github/ci.yml", Some("docs"), opts(true, false));
        assert!(!r.valid);
        assert_eq!(r.reason, Some(RejectReason::DotfileBlocked));

        assert!(validate_path(".github/ci.yml", Some("docs"), opts(true, true)).valid);
        assert!(validate_path(".gitignore", Some(""), opts(false, true)).valid);

        let nested = validate_path("docs/.vscode/settings.json", Some(""), opts(false, false));
        assert_eq!(nested.reason, Some(RejectReason::DotfileBlocked));
    }

    #[test]
    fn parent_segments_cannot_escape_enforced_docroot() {
        let r = validate_path("docs/../README.md", Some("docs"), opts(false, true));
        assert_eq!(r.reason, Some(RejectReason::OutsideDocroot));
        assert!(validate_path("docs/../README.md", Some("docs"), opts(true, true)).valid);
    }

    #[test]
    fn docroot_error_names_path_docroot_and_remedies() {
        let msg = generate_docroot_error("README.md", "docs", OperationKind::Read);
        assert!(msg.starts_with("Cannot read 'README.md'"));
        assert!(msg.contains("'docs'"));
        assert!(msg.contains("ignore_docroot"));
        assert!(msg.contains(".mcp-config.json"));
    }

    #[test]
    fn full_path_prepends_docroot() {
        assert_eq!(construct_full_path("policies/vacation.md", "newdocs", false), "newdocs/policies/vacation.md");
        assert_eq!(construct_full_path("newdocs/policies/vacation.md", "newdocs", false), "newdocs/policies/vacation.md");
        assert_eq!(construct_full_path("src/code.js", "newdocs", true), "src/code.js");
        assert_eq!(construct_full_path("README.md", "", false), "README.md");
        assert_eq!(construct_full_path("docs", "docs", false), "docs");
        assert_eq!(construct_full_path("documentation/guide.md", "docs", false), "docs/documentation/guide.md");
        assert_eq!(construct_full_path("", "docs", false), "docs");
    }

    #[test]
    fn leading_slash_is_repository_absolute() {
        assert_eq!(construct_full_path("/README.md", "docs", false), "README.md");
        let r = validate_path(&construct_full_path("/README.md", "docs", false), Some("docs"), opts(false, false));
        assert_eq!(r.reason, Some(RejectReason::OutsideDocroot));
    }

    #[test]
    fn parent_folder_of_paths() {
        assert_eq!(parent_folder("README.md"), ROOT_FOLDER);
        assert_eq!(parent_folder("a/b/c.md"), "a/b");
    }
}
