use tracing::{debug, warn};

use crate::document::{Document, DocumentKind};

/// Stable handle for a document on the stack, used to replace it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

/// What the user is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
  Empty,
  Loading,
  MenuBar,
  Catalog,
  Showcase,
  Alert,
}

/// Document stack plus at most one modal on top of it.
#[derive(Debug, Default)]
pub struct NavigationStack {
  next_id: u64,
  documents: Vec<(DocumentId, Document)>,
  modal: Option<(DocumentId, Document)>,
}

impl NavigationStack {
  fn allocate(&mut self) -> DocumentId {
    self.next_id += 1;
    DocumentId(self.next_id)
  }

  pub fn push(&mut self, doc: Document) -> DocumentId {
    let id = self.allocate();
    debug!(kind = ?doc.kind(), depth = self.documents.len() + 1, "nav: push");
    self.documents.push((id, doc));
    id
  }

  /// Replace `target` in place. Pushes instead when `target` is no longer on the stack.
  pub fn replace(&mut self, target: DocumentId, doc: Document) -> DocumentId {
    let Some(pos) = self.documents.iter().position(|(id, _)| *id == target) else {
      warn!(kind = ?doc.kind(), "nav: replace target gone, pushing instead");
      return self.push(doc);
    };
    let id = self.allocate();
    debug!(from = ?self.documents[pos].1.kind(), to = ?doc.kind(), "nav: replace");
    self.documents[pos] = (id, doc);
    id
  }

  pub fn pop(&mut self) -> Option<Document> {
    let popped = self.documents.pop().map(|(_, doc)| doc);
    if let Some(doc) = &popped {
      debug!(kind = ?doc.kind(), depth = self.documents.len(), "nav: pop");
    }
    popped
  }

  pub fn present_modal(&mut self, doc: Document) -> DocumentId {
    let id = self.allocate();
    debug!(kind = ?doc.kind(), "nav: present modal");
    self.modal = Some((id, doc));
    id
  }

  pub fn dismiss_modal(&mut self) -> Option<Document> {
    self.modal.take().map(|(_, doc)| doc)
  }

  pub fn modal(&self) -> Option<&Document> {
    self.modal.as_ref().map(|(_, doc)| doc)
  }

  /// Topmost document on the stack (ignores the modal).
  pub fn top(&self) -> Option<&Document> {
    self.documents.last().map(|(_, doc)| doc)
  }

  pub fn top_id(&self) -> Option<DocumentId> {
    self.documents.last().map(|(id, _)| *id)
  }

  /// What is currently visible: the modal if any, otherwise the top document.
  pub fn visible(&self) -> Option<&Document> {
    self.modal().or_else(|| self.top())
  }

  pub fn contains(&self, id: DocumentId) -> bool {
    self.documents.iter().any(|(i, _)| *i == id)
  }

  /// Take `id` off the stack wherever it sits.
  pub fn remove(&mut self, id: DocumentId) -> Option<Document> {
    let pos = self.documents.iter().position(|(i, _)| *i == id)?;
    let (_, doc) = self.documents.remove(pos);
    debug!(kind = ?doc.kind(), depth = self.documents.len(), "nav: remove");
    Some(doc)
  }

  /// Topmost stacked document of `kind`.
  pub fn find_kind_mut(&mut self, kind: DocumentKind) -> Option<&mut Document> {
    self.documents.iter_mut().rev().find(|(_, doc)| doc.kind() == kind).map(|(_, doc)| doc)
  }

  pub fn depth(&self) -> usize {
    self.documents.len()
  }

  pub fn screen(&self) -> Screen {
    match self.visible().map(Document::kind) {
      None => Screen::Empty,
      Some(DocumentKind::Loading) => Screen::Loading,
      Some(DocumentKind::MenuBar) => Screen::MenuBar,
      Some(DocumentKind::Catalog) => Screen::Catalog,
      Some(DocumentKind::Showcase) => Screen::Showcase,
      Some(DocumentKind::Alert | DocumentKind::DescriptiveAlert) => Screen::Alert,
    }
  }
}
