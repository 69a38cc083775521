use thiserror::Error;
use yangkit_tree::TreeError;
use yangkit_xpath::XPathError;

/// Everything the command line front end can fail with.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Loading trees failed: {0}")]
    Tree(#[from] TreeError),

    #[error("XPath error: {0}")]
    XPath(#[from] XPathError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Context path '{0}' selects no node")]
    NoContext(String),
}
