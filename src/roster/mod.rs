//! Server roster
//!
//! The roster is the single feed broadcast to every display target. A
//! [`RosterSnapshot`] is owned by the tick that fetched it and handed to
//! [`render_roster`] by reference; nothing caches it between ticks.

mod model;
mod render;

#[cfg(test)]
pub(crate) use model::server;
pub(crate) use model::RosterResponse;
pub use model::{RosterSnapshot, ServerRecord};
pub use render::{
    render_roster, MessageContent, RenderedRoster, FOOTER_TEXT, NO_SERVERS_PLACEHOLDER,
    SERVERS_PAGE_URL,
};
