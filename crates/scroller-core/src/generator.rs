//! URL sequence generation
//!
//! A generator hands out the URL of the next segment each time it is asked.
//! The template generator substitutes an incrementing index into a URL
//! template; hosts with their own pagination scheme supply a custom generator
//! instead.

use serde::Deserialize;
use tracing::warn;

use crate::constants::generator::{DEFAULT_TEMPLATE, PAGE_PLACEHOLDER, SPACING, START_INDEX};
use crate::error::{Result, ScrollerError};

/// Produces the URL of each successive segment
///
/// Every call advances the generator. Calling `next` twice never yields the
/// same segment under the default implementation.
pub trait UrlGenerator: Send {
    fn next(&mut self) -> String;
}

/// Fields recognised by the template generator
///
/// Every field is optional; missing ones take the defaults from
/// [`crate::constants::generator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GeneratorSpec {
    /// Template containing the `$page_num$` token
    pub url: Option<String>,
    pub start_index: Option<i64>,
    #[serde(alias = "spacing")]
    pub default_spacing: Option<i64>,
}

impl GeneratorSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_start_index(mut self, start_index: i64) -> Self {
        self.start_index = Some(start_index);
        self
    }

    pub fn with_spacing(mut self, spacing: i64) -> Self {
        self.default_spacing = Some(spacing);
        self
    }
}

/// Default generator: `template` with the page token replaced by a running index
///
/// The index is initialised to `start_index` on the first call and advanced by
/// `spacing` *before* substitution, so the first URL carries
/// `start_index + spacing`. Existing servers rely on this numbering. Once the
/// index would leave the `i64` range it stays at its last value.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    template: String,
    start_index: i64,
    spacing: i64,
    current_index: Option<i64>,
}

impl TemplateGenerator {
    pub fn new(template: impl Into<String>, start_index: i64, spacing: i64) -> Self {
        Self {
            template: template.into(),
            start_index,
            spacing,
            current_index: None,
        }
    }

    /// Merge a spec over the defaults
    ///
    /// Rejects a spec whose first index already overflows `i64`.
    pub fn from_spec(spec: &GeneratorSpec) -> Result<Self> {
        let start_index = spec.start_index.unwrap_or(START_INDEX);
        let spacing = spec.default_spacing.unwrap_or(SPACING);
        if start_index.checked_add(spacing).is_none() {
            return Err(ScrollerError::InvalidConfig(format!(
                "start_index {} plus spacing {} is out of range",
                start_index, spacing
            )));
        }
        Ok(Self::new(
            spec.url.as_deref().unwrap_or(DEFAULT_TEMPLATE),
            start_index,
            spacing,
        ))
    }

    /// Index used by the most recent call, `None` before the first call
    pub fn current_index(&self) -> Option<i64> {
        self.current_index
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

impl UrlGenerator for TemplateGenerator {
    fn next(&mut self) -> String {
        let previous = self.current_index.unwrap_or(self.start_index);
        let index = match previous.checked_add(self.spacing) {
            Some(index) => index,
            None => {
                warn!(index = previous, spacing = self.spacing, "Page index out of range");
                previous
            }
        };
        self.current_index = Some(index);
        // Only the first occurrence is substituted
        self.template.replacen(PAGE_PLACEHOLDER, &index.to_string(), 1)
    }
}

/// Adapter turning a closure into a generator
pub struct FnGenerator<F>(pub F);

impl<F> UrlGenerator for FnGenerator<F>
where
    F: FnMut() -> String + Send,
{
    fn next(&mut self) -> String {
        (self.0)()
    }
}

impl<F> std::fmt::Debug for FnGenerator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnGenerator")
    }
}

/// Where segment URLs come from, decided once at construction
pub enum UrlSource {
    /// Template generator built from a spec merged over the defaults
    Template(GeneratorSpec),
    /// Host-supplied generator, used verbatim
    Custom(Box<dyn UrlGenerator>),
}

impl UrlSource {
    pub fn template(url: impl Into<String>) -> Self {
        UrlSource::Template(GeneratorSpec::new(url))
    }

    pub fn custom(generator: impl UrlGenerator + 'static) -> Self {
        UrlSource::Custom(Box::new(generator))
    }

    /// Resolve into the generator the scroller will own
    pub fn into_generator(self) -> Result<Box<dyn UrlGenerator>> {
        Ok(match self {
            UrlSource::Template(spec) => Box::new(TemplateGenerator::from_spec(&spec)?),
            UrlSource::Custom(generator) => generator,
        })
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, UrlSource::Custom(_))
    }
}

impl From<GeneratorSpec> for UrlSource {
    fn from(spec: GeneratorSpec) -> Self {
        UrlSource::Template(spec)
    }
}

impl std::fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlSource::Template(spec) => f.debug_tuple("Template").field(spec).finish(),
            UrlSource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
