//! md-tom: an incremental object model for formatted message text.
//!
//! A composer's content lives in a tree of formatting nodes that is kept in
//! step with a live, user-editable surface:
//!
//! - **Core types** - node ids, kinds, markers and the entity format
//! - **Document model** - parser, node arena with batched change
//!   notification, and incremental re-parse of edited text
//! - **Serializer** - flat `(text, entities)` for the backend, html for the
//!   surface, markdown source for drafts
//! - **Surface** - replay of surface mutation records, caret preservation
//!   and redraw scheduling
//!
//! # Quick Start
//!
//! ```rust
//! use md_tom::Parser;
//!
//! let doc = Parser::parse("hello **bold** world");
//! let text = doc.api_text();
//! assert_eq!(text.text, "hello bold world");
//! assert_eq!(text.entities[0].offset, 6);
//! ```
//!
//! # Features
//!
//! - `cli` - builds the `md-tom` preview binary
//! - `dhat-heap` - enables heap profiling with dhat

// Ids, kinds and the transmission format
pub mod core;

// Document model, parser, re-parse engine and serializer
pub mod doc;

// Surface mutation replay and selection handling
pub mod surface;

pub mod editor;

pub use core::entity::{Entity, EntityType, FormattedText};
pub use core::{NodeAttrs, NodeId, NodeKind, UnknownKind};

pub use doc::{Document, HtmlConfig, Node, Parser, ReparseConfig, Subscription, TomError};

pub use surface::{
    Caret, CaretSnapshot, Diagnostic, ElementRef, FrameHandle, MutationRecord, ReconcileReport,
    RedrawScheduler, Repair, reconcile,
};

pub use editor::{Applied, Editor};
