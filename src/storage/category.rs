use std::fmt::Display;

/// Bucket tracked time is attributed to. Time without a preset goes into
/// [Category::Uncategorized], which can never collide with a user chosen name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Category {
    #[default]
    Uncategorized,
    Named(String),
}

impl Category {
    pub fn named(name: impl Into<String>) -> Self {
        Category::Named(name.into())
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Uncategorized => write!(f, "(uncategorized)"),
            Category::Named(name) => write!(f, "{name}"),
        }
    }
}
