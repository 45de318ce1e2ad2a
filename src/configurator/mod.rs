//! Interactive configuration flow
//!
//! Operators configure a community through a short sequence of pages:
//! an overview of the current target, and a form for creating or replacing
//! it. Pages are immutable values; editing a field produces a new page that
//! replaces the current one. The [`Navigator`] keeps the history as a plain
//! list with an index, so going back never needs a reference to a parent.
//!
//! Nothing here talks to Discord or the store. Submitting a page yields an
//! [`Intent`] that the caller hands to the engine.

mod page;

pub use page::{Intent, Page};

use crate::target::{CommunityId, DestinationId, SyncTarget};

/// Page history for one configuration session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    community: CommunityId,
    default_title: String,
    pages: Vec<Page>,
    current: usize,
}

impl Navigator {
    /// Start a session on the overview page
    pub fn new(
        community: CommunityId,
        target: Option<SyncTarget>,
        default_title: impl Into<String>,
    ) -> Self {
        Self {
            community,
            default_title: default_title.into(),
            pages: vec![Page::Overview { target }],
            current: 0,
        }
    }

    pub fn community(&self) -> CommunityId {
        self.community
    }

    pub fn current(&self) -> &Page {
        &self.pages[self.current]
    }

    /// Number of pages behind the current one
    pub fn depth(&self) -> usize {
        self.current
    }

    /// Show `page`, discarding anything ahead of the current page
    pub fn open(&mut self, page: Page) -> &Page {
        self.pages.truncate(self.current + 1);
        self.pages.push(page);
        self.current = self.pages.len() - 1;
        self.current()
    }

    /// Open the create form, prefilled from the configured target
    pub fn open_create(&mut self) -> &Page {
        let page = match self.pages.first() {
            Some(Page::Overview {
                target: Some(target),
            }) => Page::Create {
                title: target.title.clone(),
                destination: Some(target.destination),
            },
            _ => Page::Create {
                title: self.default_title.clone(),
                destination: None,
            },
        };
        self.open(page)
    }

    /// Go to the previous page; `None` when already at the first one
    pub fn back(&mut self) -> Option<&Page> {
        if self.current == 0 {
            return None;
        }
        self.current -= 1;
        Some(self.current())
    }

    fn replace_current(&mut self, page: Page) -> &Page {
        self.pages[self.current] = page;
        self.current()
    }

    /// Change the title on the current create form
    ///
    /// Returns `None` if the current page is not a create form. A blank
    /// title falls back to the default.
    pub fn set_title(&mut self, title: &str) -> Option<&Page> {
        let title = if title.trim().is_empty() {
            self.default_title.clone()
        } else {
            title.trim().to_string()
        };
        let updated = self.current().with_title(title)?;
        Some(self.replace_current(updated))
    }

    /// Choose the channel on the current create form
    pub fn select_destination(&mut self, destination: DestinationId) -> Option<&Page> {
        let updated = self.current().with_destination(destination)?;
        Some(self.replace_current(updated))
    }

    /// What the current page asks for, if it is ready to be submitted
    pub fn submit(&self) -> Option<Intent> {
        self.current().submit(self.community)
    }

    /// Removal request for this community; only offered when a target exists
    pub fn delete(&self) -> Option<Intent> {
        match self.pages.first() {
            Some(Page::Overview { target: Some(_) }) => Some(Intent::Delete {
                community: self.community,
            }),
            _ => None,
        }
    }
}
