/// Which kind of expression is being evaluated, which decides what the
/// expression may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Restriction {
    /// Plain query over the whole tree.
    #[default]
    None,
    /// A `must` condition: a configuration node only sees configuration data.
    Must,
    /// A `when` condition: as `Must`, and nodes with unresolved `when`
    /// conditions stop evaluation.
    When,
}

impl Restriction {
    pub fn is_constraint(self) -> bool {
        self != Restriction::None
    }
}

/// What the caller's context node is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContextKind {
    /// The document root; becomes a config or state root per restriction.
    Root,
    #[default]
    Element,
    /// The text child of the given leaf.
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvalOptions {
    pub restriction: Restriction,
}

impl EvalOptions {
    pub fn must() -> Self {
        Self {
            restriction: Restriction::Must,
        }
    }

    pub fn when() -> Self {
        Self {
            restriction: Restriction::When,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtomizeOptions {
    pub restriction: Restriction,
    /// Atomize inside an RPC/action `output` instead of its `input`.
    pub output: bool,
}

impl AtomizeOptions {
    pub fn must() -> Self {
        Self {
            restriction: Restriction::Must,
            output: false,
        }
    }

    pub fn when() -> Self {
        Self {
            restriction: Restriction::When,
            output: false,
        }
    }

    pub fn output(mut self) -> Self {
        self.output = true;
        self
    }
}
