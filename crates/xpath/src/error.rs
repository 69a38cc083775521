use thiserror::Error;

/// Hard errors. Any of these aborts evaluation without a partial result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Unsupported construct '{construct}' at offset {offset}")]
    Unsupported { offset: usize, construct: String },

    #[error("Unknown function '{name}' at offset {offset}")]
    UnknownFunction { name: String, offset: usize },

    #[error("Function '{function}' expects {expected} argument(s), found {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("Unknown module prefix '{name}' at offset {offset}")]
    UnknownModule { name: String, offset: usize },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Invalid regular expression '{pattern}': {message}")]
    Regex { pattern: String, message: String },
}

/// Soft statuses: the expression is fine but could not be fully resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// A schema name test matched nothing (the target may be defined later).
    ForwardReference { name: String, offset: usize },
    /// Evaluation reached a data node whose own `when` is not resolved yet.
    WhenDependency { node: String },
}

impl std::fmt::Display for Unresolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unresolved::ForwardReference { name, offset } => {
                write!(f, "schema node '{name}' (offset {offset}) not found")
            }
            Unresolved::WhenDependency { node } => {
                write!(f, "'when' of node '{node}' is not resolved")
            }
        }
    }
}

/// Result of an evaluation that may stop at a soft status.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    Unresolved(Unresolved),
}

impl<T> Outcome<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn complete(self) -> Option<T> {
        match self {
            Outcome::Complete(value) => Some(value),
            Outcome::Unresolved(_) => None,
        }
    }

    pub fn unresolved(&self) -> Option<&Unresolved> {
        match self {
            Outcome::Complete(_) => None,
            Outcome::Unresolved(status) => Some(status),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Complete(value) => Outcome::Complete(f(value)),
            Outcome::Unresolved(status) => Outcome::Unresolved(status),
        }
    }
}

/// Internal early exit of the evaluator.
#[derive(Debug)]
pub(crate) enum Halt {
    Fail(XPathError),
    WhenDependency(String),
}

impl From<XPathError> for Halt {
    fn from(err: XPathError) -> Self {
        Halt::Fail(err)
    }
}
