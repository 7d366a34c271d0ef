//! Pure functions over `/`-separated backend paths.

/// Separator between path components.
pub const SEPARATOR: char = '/';

/// The component standing for the root of an absolute path.
pub const ROOT: &str = "/";

/// Split a path into its components.
///
/// An absolute path starts with the [ROOT] component; empty segments are dropped.
/// The empty path is the single empty component, which is distinct from root.
pub fn components(path: &str) -> Vec<String> {
    if path.is_empty() {
        return vec![String::new()];
    }
    let mut out = Vec::new();
    if path.starts_with(SEPARATOR) {
        out.push(ROOT.to_owned());
    }
    out.extend(
        path.split(SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    );
    out
}

/// Whether the path starts at the root.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Collapse separators and resolve `.` and `..` segments.
///
/// `..` cannot climb above the root of an absolute path;
/// in a relative path, unresolvable `..` segments are kept at the front.
pub fn normalize(path: &str) -> String {
    let absolute = is_absolute(path);
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match out.last() {
                Some(&last) if last != ".." => {
                    out.pop();
                }
                _ if absolute => {}
                _ => out.push(".."),
            },
            s => out.push(s),
        }
    }
    let joined = out.join("/");
    if absolute {
        format!("{ROOT}{joined}")
    } else {
        joined
    }
}

/// Join components into a normalized path; the inverse of [components].
pub fn compose<S: AsRef<str>>(components: &[S]) -> String {
    let mut out = String::new();
    for c in components {
        let c = c.as_ref();
        if c.is_empty() {
            continue;
        }
        if !out.is_empty() && !out.ends_with(SEPARATOR) {
            out.push(SEPARATOR);
        }
        out.push_str(c);
    }
    normalize(&out)
}

/// Join a relative path onto a base; an absolute `relative` replaces the base.
pub fn join(base: &str, relative: &str) -> String {
    if is_absolute(relative) || base.is_empty() {
        normalize(relative)
    } else {
        normalize(&format!("{base}{SEPARATOR}{relative}"))
    }
}
