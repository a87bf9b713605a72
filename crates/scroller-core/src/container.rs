//! Content container
//!
//! The element segments are appended to, plus the loading placeholder that
//! sits right after it. [`MemoryContainer`] keeps everything in memory and is
//! what tests and headless hosts use.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{Result, ScrollerError};

/// Target of segment insertion
pub trait ContentContainer: Send {
    /// Insert the hidden loading placeholder directly after the container
    fn install_placeholder(&mut self, id: &str, markup: &str) -> Result<()>;

    fn set_placeholder_visible(&mut self, visible: bool);

    /// Append markup after the container's last child
    fn append_markup(&mut self, markup: &str) -> Result<()>;
}

/// Loading placeholder wrapper markup, hidden until a fetch starts
pub fn placeholder_markup(id: &str, inner: &str) -> String {
    format!("<div id=\"{}\" style=\"display:none;\">{}</div>", id, inner)
}

/// Failure notice appended when a fetch fails
pub fn failure_notice_markup(uid: &str, message: &str) -> String {
    format!("<div class=\"{}_failure_notice\">{}</div>", uid, message)
}

/// Placeholder state as seen by [`MemoryContainer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub id: String,
    pub markup: String,
    pub visible: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    children: Vec<String>,
    placeholder: Option<Placeholder>,
}

/// In-memory container; clones share the same children
///
/// Holds a single placeholder, so only one scroller can drive it.
#[derive(Debug, Clone, Default)]
pub struct MemoryContainer {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container that already holds some children
    pub fn with_children<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let container = Self::new();
        container.state.lock().children = children.into_iter().map(Into::into).collect();
        container
    }

    pub fn children(&self) -> Vec<String> {
        self.state.lock().children.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().children.is_empty()
    }

    /// Concatenated markup of every child
    pub fn inner_html(&self) -> String {
        self.state.lock().children.concat()
    }

    pub fn placeholder(&self) -> Option<Placeholder> {
        self.state.lock().placeholder.clone()
    }

    pub fn placeholder_visible(&self) -> bool {
        self.state
            .lock()
            .placeholder
            .as_ref()
            .is_some_and(|p| p.visible)
    }
}

impl ContentContainer for MemoryContainer {
    fn install_placeholder(&mut self, id: &str, markup: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(existing) = &state.placeholder {
            return Err(ScrollerError::Container(format!(
                "placeholder {} already installed",
                existing.id
            )));
        }
        state.placeholder = Some(Placeholder {
            id: id.to_string(),
            markup: placeholder_markup(id, markup),
            visible: false,
        });
        Ok(())
    }

    fn set_placeholder_visible(&mut self, visible: bool) {
        if let Some(placeholder) = self.state.lock().placeholder.as_mut() {
            placeholder.visible = visible;
        }
    }

    fn append_markup(&mut self, markup: &str) -> Result<()> {
        self.state.lock().children.push(markup.to_string());
        Ok(())
    }
}
