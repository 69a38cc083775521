//! Argument parsing and command execution for the `yangkit` binary.
//!
//! Commands return their report as a string so they can be driven from tests
//! without spawning the binary.

use crate::CliError;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use yangkit_tree::{DataNodeRef, DataTree, SchemaTree};
use yangkit_xpath::set::format_number;
use yangkit_xpath::{
    AtomizeOptions, ContextKind, EvalOptions, InContext, NodeItem, NodeKind, Outcome, Restriction, Set,
    atomize, check_syntax, evaluate, find_path, find_schema_path, node_atomize, validate,
};

#[derive(Parser, Debug)]
#[command(version, about = "Evaluate and atomize YANG XPath expressions")]
pub struct Cli {
    /// Schema description: a JSON module object or a list of them
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Print reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate an expression over instance data
    Eval {
        /// RFC 7951 JSON instance data
        #[arg(short, long)]
        data: PathBuf,

        /// Data path of the context node (default: the document root)
        #[arg(short, long)]
        context: Option<String>,

        /// Module unprefixed names belong to
        #[arg(short, long)]
        module: Option<String>,

        #[arg(short, long, value_enum, default_value_t)]
        restriction: RestrictionArg,

        expr: String,
    },
    /// List the schema nodes an expression touches
    Atomize {
        /// Schema path of the context node (default: the document root)
        #[arg(short, long)]
        context: Option<String>,

        #[arg(short, long, value_enum, default_value_t)]
        restriction: RestrictionArg,

        /// Resolve names inside RPC output instead of input
        #[arg(long)]
        output: bool,

        expr: String,
    },
    /// Compile and atomize every schema expression, then validate data if given
    Check {
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestrictionArg {
    #[default]
    None,
    Must,
    When,
}

impl From<RestrictionArg> for Restriction {
    fn from(arg: RestrictionArg) -> Self {
        match arg {
            RestrictionArg::None => Restriction::None,
            RestrictionArg::Must => Restriction::Must,
            RestrictionArg::When => Restriction::When,
        }
    }
}

/// Runs one parsed command line.
pub fn run(cli: &Cli) -> Result<String, CliError> {
    let schema = Arc::new(SchemaTree::from_file(&cli.schema)?);
    log::info!("Loaded {} schema node(s) from {}", schema.len(), cli.schema.display());
    match &cli.command {
        Command::Eval {
            data,
            context,
            module,
            restriction,
            expr,
        } => {
            let data = DataTree::from_file(Arc::clone(&schema), data)?;
            let report = eval_report(&data, context.as_deref(), module.as_deref(), (*restriction).into(), expr)?;
            render(&report, cli.json)
        }
        Command::Atomize {
            context,
            restriction,
            output,
            expr,
        } => {
            let report = atomize_report(&schema, context.as_deref(), (*restriction).into(), *output, expr)?;
            render(&report, cli.json)
        }
        Command::Check { data } => {
            let data = data
                .as_ref()
                .map(|path| DataTree::from_file(Arc::clone(&schema), path))
                .transpose()?;
            let report = check_report(&schema, data.as_ref())?;
            render(&report, cli.json)
        }
    }
}

fn render<T: Serialize + fmt::Display>(report: &T, json: bool) -> Result<String, CliError> {
    if json {
        Ok(serde_json::to_string_pretty(report)?)
    } else {
        Ok(report.to_string())
    }
}

// --- eval ---

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EvalReport {
    NodeSet { nodes: Vec<NodeReport> },
    Boolean { value: bool },
    Number { value: f64 },
    String { value: String },
    Unresolved { reason: String },
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl NodeReport {
    fn new(item: &NodeItem<DataNodeRef<'_>>) -> Self {
        let node = item.node;
        let (path, value) = match item.kind {
            NodeKind::Root(_) | NodeKind::Element => (node.path(), node.value().map(str::to_string)),
            NodeKind::Text => (format!("{}/text()", node.path()), Some(item.string_value())),
            NodeKind::Attribute(index) => {
                let name = node
                    .attributes()
                    .get(index)
                    .map(|a| format!("{}:{}", a.module, a.name))
                    .unwrap_or_default();
                (format!("{}/@{}", node.path(), name), Some(item.string_value()))
            }
        };
        Self { path, value }
    }
}

impl EvalReport {
    pub fn from_set(set: &Set<DataNodeRef<'_>>) -> Self {
        match set {
            Set::Empty | Set::Schema(_) => EvalReport::NodeSet { nodes: Vec::new() },
            Set::Nodes(items) => EvalReport::NodeSet {
                nodes: items.iter().map(NodeReport::new).collect(),
            },
            Set::Boolean(value) => EvalReport::Boolean { value: *value },
            Set::Number(value) => EvalReport::Number { value: *value },
            Set::String(value) => EvalReport::String { value: value.clone() },
        }
    }
}

impl fmt::Display for EvalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalReport::NodeSet { nodes } if nodes.is_empty() => f.write_str("(empty node-set)"),
            EvalReport::NodeSet { nodes } => {
                for (i, node) in nodes.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    match &node.value {
                        Some(value) => write!(f, "{} = {}", node.path, value)?,
                        None => f.write_str(&node.path)?,
                    }
                }
                Ok(())
            }
            EvalReport::Boolean { value } => write!(f, "{value}"),
            EvalReport::Number { value } => f.write_str(&format_number(*value)),
            EvalReport::String { value } => write!(f, "\"{value}\""),
            EvalReport::Unresolved { reason } => write!(f, "unresolved: {reason}"),
        }
    }
}

pub fn eval_report(
    data: &DataTree,
    context: Option<&str>,
    module: Option<&str>,
    restriction: Restriction,
    expr: &str,
) -> Result<EvalReport, CliError> {
    let (node, kind) = match context {
        Some(path) => {
            let node = find_path(data.root(), path)?
                .into_iter()
                .next()
                .ok_or_else(|| CliError::NoContext(path.to_string()))?;
            (node, ContextKind::Element)
        }
        None => (data.root(), ContextKind::Root),
    };
    Ok(match evaluate(expr, node, kind, module, EvalOptions { restriction })? {
        Outcome::Complete(set) => EvalReport::from_set(&set),
        Outcome::Unresolved(status) => EvalReport::Unresolved {
            reason: status.to_string(),
        },
    })
}

// --- atomize ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AtomizeReport {
    pub context: String,
    pub atoms: Vec<AtomReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AtomReport {
    pub path: String,
    pub in_context: bool,
}

impl fmt::Display for AtomizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context: {}", self.context)?;
        for atom in &self.atoms {
            let marker = if atom.in_context { '*' } else { ' ' };
            write!(f, "\n{} {}", marker, atom.path)?;
        }
        if let Some(reason) = &self.unresolved {
            write!(f, "\nunresolved: {reason}")?;
        }
        Ok(())
    }
}

pub fn atomize_report(
    schema: &SchemaTree,
    context: Option<&str>,
    restriction: Restriction,
    output: bool,
    expr: &str,
) -> Result<AtomizeReport, CliError> {
    let (node, kind) = match context {
        Some(path) => {
            let node = find_schema_path(schema.root(), path, output)?
                .into_iter()
                .next()
                .ok_or_else(|| CliError::NoContext(path.to_string()))?;
            (node, ContextKind::Element)
        }
        None => (schema.root(), ContextKind::Root),
    };
    let options = AtomizeOptions { restriction, output };
    Ok(match atomize(expr, node, kind, options)? {
        Outcome::Complete(atomized) => AtomizeReport {
            context: atomized.context.path(),
            atoms: atomized
                .atoms
                .iter()
                .map(|atom| AtomReport {
                    path: atom.node.path(),
                    in_context: atom.in_ctx == InContext::Active,
                })
                .collect(),
            unresolved: None,
        },
        Outcome::Unresolved(status) => AtomizeReport {
            context: node.path(),
            atoms: Vec::new(),
            unresolved: Some(status.to_string()),
        },
    })
}

// --- check ---

#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckReport {
    /// Schema nodes carrying at least one expression.
    pub nodes_checked: usize,
    pub unresolved: Vec<String>,
    pub violations: Vec<String>,
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} node(s) with expressions, {} unresolved, {} violation(s)",
            self.nodes_checked,
            self.unresolved.len(),
            self.violations.len()
        )?;
        for line in self.unresolved.iter().chain(&self.violations) {
            write!(f, "\n  {line}")?;
        }
        Ok(())
    }
}

pub fn check_report(schema: &SchemaTree, data: Option<&DataTree>) -> Result<CheckReport, CliError> {
    let mut report = CheckReport::default();
    for node in schema.iter() {
        check_syntax(node)?;
        if node.is_root() || node.kind().is_transparent() {
            continue;
        }
        if node.musts().is_empty() && node.whens_in_scope().is_empty() {
            continue;
        }
        report.nodes_checked += 1;
        if let Outcome::Unresolved(status) = node_atomize(node, false)? {
            report.unresolved.push(format!("{}: {}", node.path(), status));
        }
    }
    if let Some(data) = data {
        report.violations = validate(data)?.iter().map(|v| v.to_string()).collect();
    }
    Ok(report)
}
