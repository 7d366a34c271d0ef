//! N5URL: a combined group-path and attribute-path address.
//!
//! The string form is `[container][?group-path][#attribute-path]`.
//! Group paths are `/`-separated with `.` and `..` navigation.
//! Attribute paths are `/`-separated keys, each optionally followed by
//! bracketed array indices (`list[3]`, `list/[3]`, `nested[0][1]`),
//! with the same `.` and `..` navigation applied token by token.
use std::fmt;
use std::str::FromStr;

use crate::path;

/// One step into an attribute document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeToken {
    Key(String),
    Index(usize),
}

impl fmt::Display for AttributeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeToken::Key(k) => write!(f, "key {k:?}"),
            AttributeToken::Index(i) => write!(f, "index [{i}]"),
        }
    }
}

impl From<&str> for AttributeToken {
    fn from(value: &str) -> Self {
        Self::Key(value.to_owned())
    }
}

impl From<String> for AttributeToken {
    fn from(value: String) -> Self {
        Self::Key(value)
    }
}

impl From<usize> for AttributeToken {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Token(AttributeToken),
    /// Unresolved `..` at the front of a relative path.
    Parent,
}

/// A normalized attribute path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributePath {
    absolute: bool,
    steps: Vec<Step>,
}

impl AttributePath {
    /// The path addressing the whole document.
    pub fn root() -> Self {
        Self {
            absolute: true,
            steps: Vec::new(),
        }
    }

    pub fn parse(s: &str) -> crate::Result<Self> {
        let mut out = Self {
            absolute: s.starts_with(path::SEPARATOR),
            steps: Vec::new(),
        };
        for piece in s.split(path::SEPARATOR) {
            out.push_piece(piece)
                .map_err(|reason| crate::Error::address(s, reason))?;
        }
        Ok(out)
    }

    fn push_piece(&mut self, piece: &str) -> Result<(), String> {
        let (key, mut rest) = piece.split_at(piece.find('[').unwrap_or(piece.len()));
        if key.contains(']') {
            return Err(format!("unbalanced ']' in {piece:?}"));
        }
        match key {
            "" | "." => {}
            ".." => self.push_parent(),
            k => self.steps.push(Step::Token(AttributeToken::Key(k.to_owned()))),
        }
        while !rest.is_empty() {
            let close = rest
                .find(']')
                .ok_or_else(|| format!("unbalanced '[' in {piece:?}"))?;
            let digits = &rest[1..close];
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(format!("invalid array index {digits:?}"));
            }
            let index: usize = digits
                .parse()
                .map_err(|e| format!("invalid array index {digits:?}: {e}"))?;
            self.steps.push(Step::Token(AttributeToken::Index(index)));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return Err(format!("unexpected {rest:?} after array index"));
            }
        }
        Ok(())
    }

    fn push_parent(&mut self) {
        match self.steps.last() {
            Some(Step::Token(_)) => {
                self.steps.pop();
            }
            _ if self.absolute => {}
            _ => self.steps.push(Step::Parent),
        }
    }

    fn push_step(&mut self, step: &Step) {
        match step {
            Step::Parent => self.push_parent(),
            Step::Token(t) => self.steps.push(Step::Token(t.clone())),
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Whether the path addresses the whole document.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Resolve `other` against this path.
    pub fn resolve(&self, other: &AttributePath) -> AttributePath {
        if other.absolute {
            return other.clone();
        }
        let mut out = self.clone();
        for step in &other.steps {
            out.push_step(step);
        }
        out
    }

    /// Tokens to walk from the document root.
    ///
    /// Leading `..` of a relative path have nothing to climb out of and are dropped.
    pub fn tokens(&self) -> Vec<AttributeToken> {
        self.steps
            .iter()
            .filter_map(|s| match s {
                Step::Token(t) => Some(t.clone()),
                Step::Parent => None,
            })
            .collect()
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Token(AttributeToken::Index(idx)) => write!(f, "[{idx}]")?,
                Step::Token(AttributeToken::Key(k)) => {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    f.write_str(k)?;
                }
                Step::Parent => {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    f.write_str("..")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for AttributePath {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An address of a node in an N5 container, or of an attribute within that node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct N5Url {
    container: Option<String>,
    group: Option<String>,
    attribute: Option<AttributePath>,
}

impl N5Url {
    pub fn parse(s: &str) -> crate::Result<Self> {
        let (before_fragment, fragment) = match s.split_once('#') {
            Some((b, f)) => (b, Some(f)),
            None => (s, None),
        };
        let (container, query) = match before_fragment.split_once('?') {
            Some((c, q)) => (c, Some(q)),
            None => (before_fragment, None),
        };
        Ok(Self {
            container: (!container.is_empty()).then(|| container.to_owned()),
            group: query.map(path::normalize),
            attribute: fragment.map(AttributePath::parse).transpose()?,
        })
    }

    /// Address of a group, without an attribute path.
    pub fn from_group(group: &str) -> Self {
        Self {
            group: Some(path::normalize(group)),
            ..Default::default()
        }
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    /// The normalized group path; empty for the container root.
    pub fn group_path(&self) -> &str {
        self.group.as_deref().unwrap_or("")
    }

    pub fn attribute_path(&self) -> Option<&AttributePath> {
        self.attribute.as_ref()
    }

    /// Tokens of the attribute path; empty when the whole document is addressed.
    pub fn attribute_tokens(&self) -> Vec<AttributeToken> {
        self.attribute
            .as_ref()
            .map(AttributePath::tokens)
            .unwrap_or_default()
    }

    /// Treat `other` as relative to this address.
    ///
    /// A container location in `other` replaces everything.
    /// A group path in `other` is joined onto this one and brings its own attribute path (or none).
    /// Otherwise only the attribute path is resolved.
    pub fn resolve(&self, other: &N5Url) -> N5Url {
        if other.container.is_some() {
            return other.clone();
        }
        if let Some(other_group) = &other.group {
            let group = match &self.group {
                Some(g) => path::join(g, other_group),
                None => other_group.clone(),
            };
            return N5Url {
                container: self.container.clone(),
                group: Some(group),
                attribute: other.attribute.clone(),
            };
        }
        let attribute = match (&self.attribute, &other.attribute) {
            (Some(base), Some(rel)) => Some(base.resolve(rel)),
            (None, Some(rel)) => Some(rel.clone()),
            (base, None) => base.clone(),
        };
        N5Url {
            container: self.container.clone(),
            group: self.group.clone(),
            attribute,
        }
    }

    /// Parse `other` and resolve it against this address.
    pub fn resolve_str(&self, other: &str) -> crate::Result<N5Url> {
        Ok(self.resolve(&N5Url::parse(other)?))
    }
}

impl fmt::Display for N5Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(c) = &self.container {
            f.write_str(c)?;
        }
        if let Some(g) = &self.group {
            write!(f, "?{g}")?;
        }
        if let Some(a) = &self.attribute {
            write!(f, "#{a}")?;
        }
        Ok(())
    }
}

impl FromStr for N5Url {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> N5Url {
        N5Url::parse(s).unwrap()
    }

    fn key(s: &str) -> AttributeToken {
        AttributeToken::Key(s.to_owned())
    }

    #[test]
    fn collapses_separators_around_indices() {
        let expected = vec![key("list"), AttributeToken::Index(3)];
        for s in ["#list[3]", "#list/[3]", "#list//[3]", "#//list//[3]", "#//list////[3]//"] {
            assert_eq!(url(s).attribute_tokens(), expected, "{s}");
        }
    }

    #[test]
    fn chains_nested_indices() {
        let expected = vec![
            key("nestedList"),
            AttributeToken::Index(0),
            AttributeToken::Index(0),
            AttributeToken::Index(0),
        ];
        for s in [
            "#nestedList[0][0][0]",
            "#/nestedList/[0][0][0]",
            "#nestedList//[0]/[0]///[0]",
            "#/nestedList[0]//[0][0]",
        ] {
            assert_eq!(url(s).attribute_tokens(), expected, "{s}");
        }
    }

    #[test]
    fn keeps_whitespace_verbatim() {
        assert_eq!(url("#f o o").attribute_tokens(), vec![key("f o o")]);
    }

    #[test]
    fn navigates_attribute_paths() {
        assert_eq!(url("#a/b/../c").attribute_tokens(), vec![key("a"), key("c")]);
        assert_eq!(url("#a[2]/..").attribute_tokens(), vec![key("a")]);
        assert_eq!(url("#./a/.").attribute_tokens(), vec![key("a")]);
        assert_eq!(url("#/..").attribute_tokens(), vec![]);
    }

    #[test]
    fn normalizes_group_paths() {
        for s in ["?/#/foo", "?/.#/foo", "?/a/..#foo", "?/a/../.#foo"] {
            assert_eq!(url(s).group_path(), "/", "{s}");
        }
        for s in ["#foo", "?#foo", "?.#foo", "?./#/foo"] {
            assert_eq!(url(s).group_path(), "", "{s}");
        }
        assert_eq!(url("?a/./b/").group_path(), "a/b");
    }

    #[test]
    fn parses_container_location() {
        let u = url("/data/c.n5?/a/b#x");
        assert_eq!(u.container(), Some("/data/c.n5"));
        assert_eq!(u.group_path(), "/a/b");
        assert_eq!(u.attribute_tokens(), vec![key("x")]);
        let whole = url("");
        assert_eq!(whole.group_path(), "");
        assert!(whole.attribute_tokens().is_empty());
    }

    #[test]
    fn rejects_malformed_indices() {
        for s in ["#list[3", "#list3]", "#list[a]", "#list[-1]", "#list[]", "#list[1]x", "#[+1]"] {
            assert!(
                matches!(N5Url::parse(s), Err(crate::Error::AddressSyntax { .. })),
                "{s} should not parse"
            );
        }
    }

    #[test]
    fn rendering_is_stable() {
        for s in [
            "",
            "#/",
            "?/a/aa#name",
            "?../x#../../k[1][2]/j",
            "c.n5?a#//list////[3]//",
            "#[0]/a/[1]",
            "?.#f o o",
        ] {
            let once = url(s);
            let rendered = once.to_string();
            let twice = url(&rendered);
            assert_eq!(once, twice, "{s} -> {rendered}");
            assert_eq!(twice.to_string(), rendered);
        }
    }

    #[test]
    fn resolves_group_paths() {
        let a = url("?/a");
        let aa = url("?/a/aa");
        let aaa = url("?/a/aa/aaa");

        assert_eq!(a.resolve_str("?aa#name").unwrap(), url("?/a/aa#name"));
        assert_eq!(aa.resolve_str("?./#name").unwrap(), url("?/a/aa#name"));
        assert_eq!(aa.resolve_str("#name").unwrap(), url("?/a/aa#name"));
        assert_eq!(aa.resolve_str("?../aa#name").unwrap(), url("?/a/aa#name"));
        assert_eq!(aa.resolve_str("?..#name").unwrap(), url("?/a#name"));
        assert_eq!(aaa.resolve_str("?../..#name").unwrap(), url("?/a#name"));
        assert_eq!(a.resolve_str("?/a#name").unwrap(), url("?/a#name"));
    }

    #[test]
    fn group_resolution_resets_attribute_path() {
        let base = url("?/a#x/y");
        assert_eq!(base.resolve_str("?b").unwrap(), url("?/a/b"));
        assert_eq!(base.resolve_str("?b#z").unwrap(), url("?/a/b#z"));
        assert_eq!(base.resolve_str("#z").unwrap(), url("?/a#x/y/z"));
        assert_eq!(base.resolve_str("#../z").unwrap(), url("?/a#x/z"));
        assert_eq!(base.resolve_str("#/z").unwrap(), url("?/a#/z"));
        assert_eq!(base.resolve_str("other.n5").unwrap(), url("other.n5"));
    }

    #[test]
    fn resolution_is_associative() {
        let addresses = [
            "?/a", "?b/c", "?..", "#x", "#../y[1]", "#/z", "?./#w", "?../../q#..", "", "c.n5?d",
        ];
        for a in addresses {
            for b in addresses {
                for c in addresses {
                    let (a, b, c) = (url(a), url(b), url(c));
                    let left = a.resolve(&b).resolve(&c);
                    let right = a.resolve(&b.resolve(&c));
                    assert_eq!(left, right, "({a} . {b}) . {c} vs {a} . ({b} . {c})");
                }
            }
        }
    }
}
