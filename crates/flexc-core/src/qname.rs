use std::fmt;

/// Qualified name for class and definition identity during a build.
///
/// Rendered in colon form: the namespace URI, a colon, then the local name.
/// Definitions in the unnamed package render as the bare local name.
///
/// # Examples
///
/// ```
/// use flexc_core::QName;
///
/// let button = QName::new("mx.controls", "Button");
/// assert_eq!(button.to_string(), "mx.controls:Button");
///
/// let object = QName::unnamed("Object");
/// assert_eq!(object.to_string(), "Object");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (package name for package-level definitions).
    pub namespace: String,
    /// Local name (e.g., "Button").
    pub local: String,
}

impl QName {
    /// Create a new qualified name.
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
        }
    }

    /// Create a qualified name in the unnamed package.
    pub fn unnamed(local: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            local: local.into(),
        }
    }

    /// Parse a class name in colon or dotted form.
    ///
    /// `"mx.core:UIComponent"` and `"mx.core.UIComponent"` both yield namespace
    /// `mx.core` and local name `UIComponent`. A name without separators lands
    /// in the unnamed package.
    pub fn from_qualified_string(s: &str) -> Self {
        if let Some((ns, local)) = s.rsplit_once(':') {
            return Self::new(ns, local);
        }
        match s.rsplit_once('.') {
            Some((ns, local)) => Self::new(ns, local),
            None => Self::unnamed(s),
        }
    }

    /// Check if this name lives in the unnamed package.
    pub fn is_unnamed(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Dotted rendering (`mx.controls.Button`), used for loader class names.
    pub fn to_dotted(&self) -> String {
        if self.namespace.is_empty() {
            self.local.clone()
        } else {
            format!("{}.{}", self.namespace, self.local)
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.local)
        } else {
            write!(f, "{}:{}", self.namespace, self.local)
        }
    }
}

impl From<&str> for QName {
    fn from(s: &str) -> Self {
        Self::from_qualified_string(s)
    }
}

impl From<String> for QName {
    fn from(s: String) -> Self {
        Self::from_qualified_string(&s)
    }
}

/// A local name with a set of candidate namespaces.
///
/// Produced when a reference could not be bound to a single namespace at
/// compile time. The registry resolves it to a [`QName`] once one of the
/// candidates is known to define the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiName {
    pub namespaces: Vec<String>,
    pub local: String,
}

impl MultiName {
    pub fn new(namespaces: Vec<String>, local: impl Into<String>) -> Self {
        Self {
            namespaces,
            local: local.into(),
        }
    }

    /// Candidate qualified names, in namespace order.
    pub fn candidates(&self) -> impl Iterator<Item = QName> + '_ {
        self.namespaces
            .iter()
            .map(|ns| QName::new(ns.clone(), self.local.clone()))
    }
}

impl fmt::Display for MultiName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}::{}", self.namespaces.join(","), self.local)
    }
}

/// A dependency name as recorded on a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Name {
    QName(QName),
    MultiName(MultiName),
}

impl Name {
    pub fn local(&self) -> &str {
        match self {
            Name::QName(q) => &q.local,
            Name::MultiName(m) => &m.local,
        }
    }

    pub fn as_qname(&self) -> Option<&QName> {
        match self {
            Name::QName(q) => Some(q),
            Name::MultiName(_) => None,
        }
    }
}

impl From<QName> for Name {
    fn from(q: QName) -> Self {
        Name::QName(q)
    }
}

impl From<MultiName> for Name {
    fn from(m: MultiName) -> Self {
        Name::MultiName(m)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Name::QName(q) => q.fmt(f),
            Name::MultiName(m) => m.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_package() {
        let name = QName::unnamed("Object");
        assert!(name.is_unnamed());
        assert_eq!(name.to_string(), "Object");
        assert_eq!(name.to_dotted(), "Object");
    }

    #[test]
    fn colon_form() {
        let name = QName::from_qualified_string("mx.core:UIComponent");
        assert_eq!(name.namespace, "mx.core");
        assert_eq!(name.local, "UIComponent");
        assert_eq!(name.to_string(), "mx.core:UIComponent");
    }

    #[test]
    fn dotted_form_normalizes() {
        let dotted = QName::from("mx.core.UIComponent");
        let colon = QName::from("mx.core:UIComponent");
        assert_eq!(dotted, colon);
        assert_eq!(dotted.to_dotted(), "mx.core.UIComponent");
    }

    #[test]
    fn vector_name_keeps_dots_in_namespace() {
        let name = QName::from("__AS3__.vec:Vector");
        assert_eq!(name.namespace, "__AS3__.vec");
        assert_eq!(name.local, "Vector");
    }

    #[test]
    fn multiname_candidates() {
        let m = MultiName::new(vec!["a".into(), "b".into()], "X");
        let c: Vec<_> = m.candidates().map(|q| q.to_string()).collect();
        assert_eq!(c, vec!["a:X", "b:X"]);
    }

    #[test]
    fn name_accessors() {
        let n: Name = QName::new("pkg", "A").into();
        assert_eq!(n.local(), "A");
        assert!(n.as_qname().is_some());

        let m: Name = MultiName::new(vec![], "B").into();
        assert!(m.as_qname().is_none());
    }
}
