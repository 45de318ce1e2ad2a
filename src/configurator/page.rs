//! Configuration pages

use crate::target::{CommunityId, DestinationId, SyncTarget, TargetStatus};
use std::fmt;

/// One screen of the configuration flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// Current state, with Create (and Delete when configured) actions
    Overview { target: Option<SyncTarget> },

    /// Form for creating or replacing the display
    Create {
        title: String,
        destination: Option<DestinationId>,
    },
}

/// A change the operator asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateOrReplace {
        community: CommunityId,
        destination: DestinationId,
        title: String,
    },
    Delete {
        community: CommunityId,
    },
}

impl Page {
    /// Copy of a create form with a new title
    pub fn with_title(&self, title: impl Into<String>) -> Option<Page> {
        match self {
            Page::Create { destination, .. } => Some(Page::Create {
                title: title.into(),
                destination: *destination,
            }),
            Page::Overview { .. } => None,
        }
    }

    /// Copy of a create form with a destination chosen
    pub fn with_destination(&self, destination: DestinationId) -> Option<Page> {
        match self {
            Page::Create { title, .. } => Some(Page::Create {
                title: title.clone(),
                destination: Some(destination),
            }),
            Page::Overview { .. } => None,
        }
    }

    pub fn submit(&self, community: CommunityId) -> Option<Intent> {
        match self {
            Page::Create {
                title,
                destination: Some(destination),
            } => Some(Intent::CreateOrReplace {
                community,
                destination: *destination,
                title: title.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Page::Overview { target: Some(target) } => {
                writeln!(f, "Server list")?;
                writeln!(f, "{}", TargetStatus::from(target.clone()))?;
                write!(f, "Actions: Create, Delete")
            }
            Page::Overview { target: None } => {
                writeln!(f, "Server list")?;
                writeln!(f, "Not configured")?;
                write!(f, "Actions: Create")
            }
            Page::Create { title, destination } => {
                writeln!(f, "Create server list")?;
                writeln!(f, "Title: `{}`", title)?;
                match destination {
                    Some(destination) => write!(f, "Channel: {}", destination.mention()),
                    None => write!(f, "Channel: *select a channel*"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MessageId;

    #[test]
    fn test_edits_produce_new_pages() {
        let page = Page::Create {
            title: "Servers".to_string(),
            destination: None,
        };
        let updated = page.with_destination(DestinationId::new(3)).unwrap();
        assert_ne!(page, updated);
        assert_eq!(
            updated.with_title("Other").unwrap(),
            Page::Create {
                title: "Other".to_string(),
                destination: Some(DestinationId::new(3)),
            }
        );
    }

    #[test]
    fn test_render() {
        let overview = Page::Overview {
            target: Some(SyncTarget::new(
                CommunityId::new(1),
                DestinationId::new(2),
                Some(MessageId::new(3)),
                "Servers",
            )),
        };
        let text = overview.to_string();
        assert!(text.contains("Channel: <#2>"));
        assert!(text.ends_with("Actions: Create, Delete"));

        let form = Page::Create {
            title: "Servers".to_string(),
            destination: None,
        };
        assert!(form.to_string().contains("*select a channel*"));
        assert!(Page::Overview { target: None }
            .to_string()
            .contains("Not configured"));
    }
}
