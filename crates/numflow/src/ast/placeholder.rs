//! Placeholder identifiers used in patterns
//!
//! A placeholder is not a node type; it is a reading of an [`Identifier`]'s
//! name:
//! - `_`, `_name`, `_1` capture exactly one subtree
//! - `__name` and `_name...` capture zero or more trailing elements
//!
//! [`Identifier`]: super::Identifier

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Single,
    Ellipsis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    pub name: &'a str,
    pub kind: PlaceholderKind,
}

impl<'a> Placeholder<'a> {
    pub fn classify(name: &'a str) -> Option<Self> {
        if !name.starts_with('_') {
            return None;
        }
        let kind = if name.starts_with("__") || (name.len() > 4 && name.ends_with("...")) {
            PlaceholderKind::Ellipsis
        } else {
            PlaceholderKind::Single
        };
        Some(Self { name, kind })
    }

    pub fn is_ellipsis(&self) -> bool {
        self.kind == PlaceholderKind::Ellipsis
    }
}
