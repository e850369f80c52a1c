use crate::parse::ParseError;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error(
        "unknown class `{name}`{}",
        .referenced_by.as_deref().map(|class| format!(" (parent of `{class}`)")).unwrap_or_default()
    )]
    UnknownClass {
        name: String,
        referenced_by: Option<String>,
    },

    /// Class paths around the loop, starting and ending with the same class.
    #[error("cyclic inheritance: {}", .0.join(" -> "))]
    CyclicInheritance(Vec<String>),
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("class `{class}` is defined twice in {unit} (lines {first} and {second})")]
    DuplicateClass {
        class: String,
        unit: String,
        first: usize,
        second: usize,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
