//! Abstract capabilities the replay needs from a remote UI.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UiError {
    #[error("no element matches {selector} within {timeout:?}")]
    Timeout { selector: Selector, timeout: Duration },
    #[error("element #{index} of {selector} not present ({found} found)")]
    MissingElement {
        selector: Selector,
        index: usize,
        found: usize,
    },
    #[error("driver error {error}: {message}")]
    Driver { error: String, message: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for UiError {
    fn from(err: reqwest::Error) -> Self {
        UiError::Transport(err.to_string())
    }
}

/// Element lookup strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Name(String),
    ClassName(String),
    Css(String),
}

impl Selector {
    pub fn name(value: impl Into<String>) -> Self {
        Selector::Name(value.into())
    }

    pub fn class(value: impl Into<String>) -> Self {
        Selector::ClassName(value.into())
    }

    pub fn css(value: impl Into<String>) -> Self {
        Selector::Css(value.into())
    }

    /// Equivalent CSS selector.
    pub fn to_css(&self) -> String {
        match self {
            Selector::Name(name) => format!("[name=\"{}\"]", name),
            Selector::ClassName(class) => format!(".{}", class),
            Selector::Css(css) => css.clone(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name(name) => write!(f, "name={}", name),
            Selector::ClassName(class) => write!(f, "class={}", class),
            Selector::Css(css) => write!(f, "css={}", css),
        }
    }
}

/// Opaque handle to an element found on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element(pub String);

impl Element {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Key sequence that submits the focused form field.
pub const KEY_RETURN: &str = "\u{E006}";

#[allow(async_fn_in_trait)]
pub trait UiSurface {
    async fn navigate(&self, url: &str) -> Result<(), UiError>;

    /// All elements currently matching, possibly none.
    async fn locate(&self, selector: &Selector) -> Result<Vec<Element>, UiError>;

    async fn click(&self, element: &Element) -> Result<(), UiError>;

    async fn type_text(&self, element: &Element, text: &str) -> Result<(), UiError>;

    async fn text(&self, element: &Element) -> Result<String, UiError>;

    /// Polls until at least one element matches, returning the first.
    async fn wait_until_present(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<Element, UiError>;

    /// First matching element, failing immediately when there is none.
    async fn locate_one(&self, selector: &Selector) -> Result<Element, UiError> {
        self.locate_nth(selector, 0).await
    }

    async fn locate_nth(&self, selector: &Selector, index: usize) -> Result<Element, UiError> {
        let mut elements = self.locate(selector).await?;
        let found = elements.len();
        if index < found {
            Ok(elements.swap_remove(index))
        } else {
            Err(UiError::MissingElement {
                selector: selector.clone(),
                index,
                found,
            })
        }
    }
}
