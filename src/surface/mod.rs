//! Contract with the editable surface.
//!
//! The render target shows [`Document::html`](crate::doc::Document::html)
//! and reports what the user did to it as [`MutationRecord`]s, grouped per
//! logical user action. Elements are identified by the `data-id` attribute
//! the html carries; an element without one is either genuinely new or a
//! stale reference.

use serde::{Deserialize, Serialize};

pub mod reconciler;
pub mod schedule;
pub mod selection;

pub use reconciler::{Diagnostic, ReconcileReport, Repair, reconcile};
pub use schedule::{FrameHandle, RedrawScheduler};
pub use selection::{Caret, CaretSnapshot};

/// A surface element as seen by the change observer.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    /// Value of `data-id`, absent on elements the surface created itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Value of `data-type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Character data of a bare text node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ElementRef {
    pub fn node(id: impl ToString) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn element(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MutationRecord {
    /// Content text changed.
    CharacterData { target: ElementRef, value: String },
    /// The user typed inside the decorative marker spans of a formatting
    /// node; `start` and `end` hold what those spans contain now.
    MarkerEdit {
        owner: ElementRef,
        start: String,
        end: String,
    },
    #[serde(rename_all = "camelCase")]
    ChildList {
        target: ElementRef,
        #[serde(default)]
        added: Vec<ElementRef>,
        #[serde(default)]
        removed: Vec<ElementRef>,
        #[serde(default)]
        previous_sibling: Option<ElementRef>,
        #[serde(default)]
        next_sibling: Option<ElementRef>,
    },
}
