//! The object a render target drives: a document, its redraw scheduling and
//! the caret carried across each mutation batch.

use crate::core::entity::FormattedText;
use crate::doc::{Document, HtmlConfig, Parser};
use crate::surface::{
    Caret, CaretSnapshot, FrameHandle, MutationRecord, ReconcileReport, RedrawScheduler, reconcile,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub report: ReconcileReport,
    /// Caret mapped into the updated tree.
    pub caret: Option<Caret>,
    /// Frame after which the restored caret stops being enforced.
    pub selection_frame: Option<FrameHandle>,
}

#[derive(Debug, Default)]
pub struct Editor {
    doc: Document,
    scheduler: RedrawScheduler,
    caret: Option<CaretSnapshot>,
    html: HtmlConfig,
}

impl Editor {
    pub fn new(source: &str) -> Self {
        Self::from_document(Parser::parse(source))
    }

    pub fn from_document(doc: Document) -> Self {
        Self {
            doc,
            ..Self::default()
        }
    }

    pub fn with_html_config(mut self, html: HtmlConfig) -> Self {
        self.html = html;
        self
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Direct access for programmatic edits. Callers request a redraw
    /// themselves.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Replays one user action. The caret, when given, is the selection the
    /// surface had before the action.
    pub fn apply_mutations(&mut self, records: &[MutationRecord], caret: Option<Caret>) -> Applied {
        self.caret = caret.map(|caret| CaretSnapshot::capture(&self.doc, caret));

        let revision = self.doc.revision();
        let report = reconcile(&mut self.doc, records);
        if self.doc.revision() != revision {
            self.scheduler.request();
        }

        let caret = self
            .caret
            .as_ref()
            .and_then(|snapshot| snapshot.restore(&self.doc));
        let selection_frame = caret.map(|_| self.scheduler.schedule_frame());
        Applied {
            report,
            caret,
            selection_frame,
        }
    }

    /// Replaces the whole content, as when a draft is loaded.
    pub fn set_source(&mut self, source: &str) {
        self.doc = Parser::parse(source);
        self.caret = None;
        self.scheduler.cancel_frame();
        self.scheduler.request();
    }

    pub fn request_redraw(&mut self) -> bool {
        self.scheduler.request()
    }

    /// Fresh markup when a redraw is pending, `None` otherwise.
    pub fn render(&mut self) -> Option<String> {
        self.scheduler
            .take()
            .then(|| self.doc.html_with_config(&self.html))
    }

    /// Host callback for a selection frame. Returns whether the stored caret
    /// was released.
    pub fn frame_fired(&mut self, frame: FrameHandle) -> bool {
        if !self.scheduler.fire_frame(frame) {
            return false;
        }
        self.caret = None;
        true
    }

    /// Caret to re-apply after the surface redraws.
    pub fn pending_caret(&self) -> Option<Caret> {
        self.caret
            .as_ref()
            .and_then(|snapshot| snapshot.restore(&self.doc))
    }

    pub fn api_text(&self) -> FormattedText {
        self.doc.api_text()
    }

    pub fn markdown(&self) -> String {
        self.doc.markdown()
    }
}
