//! Typed markup documents.
//!
//! A [`Document`] is an element tree plus the event bindings attached to it at
//! build time. The host renders `to_xml()` and reports interaction as
//! `(element id, Trigger)`; [`Document::resolve`] turns that into a [`UiEvent`]
//! without inspecting tag names.

use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
  Loading,
  Alert,
  DescriptiveAlert,
  MenuBar,
  Catalog,
  Showcase,
}

/// UI interaction reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
  Select,
  Highlight,
}

/// What an interaction means to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
  /// Play a single video.
  SelectVideo { url: String },
  /// Open the showcase for a label.
  SelectLabel { label: String },
  /// A catalog section gained focus; populate its thumbnails.
  HighlightSection { label: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
  pub element_id: String,
  pub trigger: Trigger,
  pub event: UiEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
  Element(Element),
  Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
  tag: String,
  attrs: Vec<(String, String)>,
  children: Vec<Node>,
}

impl Element {
  pub fn new(tag: impl Into<String>) -> Self {
    Self { tag: tag.into(), attrs: Vec::new(), children: Vec::new() }
  }

  /// `<tag>text</tag>`
  pub fn text_node(tag: impl Into<String>, text: impl Into<String>) -> Self {
    Self::new(tag).text(text)
  }

  pub fn attr(mut self, name: impl Into<String>, value: impl ToString) -> Self {
    self.set_attr(name, value);
    self
  }

  pub fn child(mut self, child: Element) -> Self {
    self.children.push(Node::Element(child));
    self
  }

  pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
    self.children.extend(children.into_iter().map(Node::Element));
    self
  }

  pub fn text(mut self, text: impl Into<String>) -> Self {
    self.children.push(Node::Text(text.into()));
    self
  }

  pub fn get_attr(&self, name: &str) -> Option<&str> {
    self.attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
  }

  pub fn set_attr(&mut self, name: impl Into<String>, value: impl ToString) {
    let name = name.into();
    let value = value.to_string();
    match self.attrs.iter_mut().find(|(n, _)| *n == name) {
      Some(slot) => slot.1 = value,
      None => self.attrs.push((name, value)),
    }
  }

  pub fn id(&self) -> Option<&str> {
    self.get_attr("id")
  }

  pub fn elements(&self) -> impl Iterator<Item = &Element> {
    self.children.iter().filter_map(|n| match n {
      Node::Element(e) => Some(e),
      Node::Text(_) => None,
    })
  }

  fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
    self.children.iter_mut().filter_map(|n| match n {
      Node::Element(e) => Some(e),
      Node::Text(_) => None,
    })
  }

  /// First direct child with `tag`.
  #[cfg(test)]
  pub fn first(&self, tag: &str) -> Option<&Element> {
    self.elements().find(|e| e.tag == tag)
  }

  /// Concatenated text of direct text children.
  pub fn inner_text(&self) -> String {
    self
      .children
      .iter()
      .filter_map(|n| match n {
        Node::Text(t) => Some(t.as_str()),
        Node::Element(_) => None,
      })
      .collect()
  }

  /// Text of the first direct `tag` child, e.g. `<title>`.
  #[cfg(test)]
  pub fn child_text(&self, tag: &str) -> Option<String> {
    self.first(tag).map(Element::inner_text)
  }

  /// All descendants (excluding self) with `tag`, in document order.
  pub fn descendants<'a>(&'a self, tag: &'a str) -> Vec<&'a Element> {
    let mut found = Vec::new();
    self.collect_descendants(tag, &mut found);
    found
  }

  fn collect_descendants<'a>(&'a self, tag: &str, found: &mut Vec<&'a Element>) {
    for child in self.elements() {
      if child.tag == tag {
        found.push(child);
      }
      child.collect_descendants(tag, found);
    }
  }

  fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
    if pred(self) {
      return Some(self);
    }
    self.elements_mut().find_map(|child| child.find_mut(pred))
  }

  fn write(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
    let start = BytesStart::new(self.tag.as_str()).with_attributes(self.attrs.iter().map(|(n, v)| (n.as_str(), v.as_str())));
    if self.children.is_empty() {
      writer.write_event(Event::Empty(start))?;
      return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &self.children {
      match child {
        Node::Element(e) => e.write(writer)?,
        Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
      }
    }
    writer.write_event(Event::End(BytesEnd::new(self.tag.as_str())))?;
    Ok(())
  }
}

/// A rendered markup document with its event bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  kind: DocumentKind,
  root: Element,
  bindings: Vec<Binding>,
}

impl Document {
  /// Wrap `template` in a `<document>` root.
  pub fn new(kind: DocumentKind, template: Element) -> Self {
    Self { kind, root: Element::new("document").child(template), bindings: Vec::new() }
  }

  pub fn bind(&mut self, element_id: impl Into<String>, trigger: Trigger, event: UiEvent) {
    self.bindings.push(Binding { element_id: element_id.into(), trigger, event });
  }

  pub fn kind(&self) -> DocumentKind {
    self.kind
  }

  #[cfg(test)]
  pub fn root(&self) -> &Element {
    &self.root
  }

  /// The event a `trigger` on `element_id` stands for, if anything is bound.
  pub fn resolve(&self, element_id: &str, trigger: Trigger) -> Option<&UiEvent> {
    self.bindings.iter().find(|b| b.element_id == element_id && b.trigger == trigger).map(|b| &b.event)
  }

  /// Id of the first element bound to `event` for `trigger`.
  pub fn element_for(&self, trigger: Trigger, event: &UiEvent) -> Option<&str> {
    self.bindings.iter().find(|b| b.trigger == trigger && &b.event == event).map(|b| b.element_id.as_str())
  }

  pub fn find_all<'a>(&'a self, tag: &'a str) -> Vec<&'a Element> {
    self.root.descendants(tag)
  }

  pub fn element_by_id(&self, id: &str) -> Option<&Element> {
    fn walk<'a>(e: &'a Element, id: &str) -> Option<&'a Element> {
      if e.id() == Some(id) {
        return Some(e);
      }
      e.elements().find_map(|c| walk(c, id))
    }
    walk(&self.root, id)
  }

  /// Set `src` of the image `img_id` inside the `section_id` subtree.
  ///
  /// Image ids are asset ids, which are only unique per label, so lookups are
  /// scoped to a section.
  pub fn set_image_src(&mut self, section_id: &str, img_id: &str, src: &str) -> bool {
    let Some(section) = self.root.find_mut(&|e: &Element| e.id() == Some(section_id)) else { return false };
    match section.find_mut(&|e: &Element| e.tag == "img" && e.id() == Some(img_id)) {
      Some(img) => {
        img.set_attr("src", src);
        true
      }
      None => false,
    }
  }

  pub fn to_xml(&self) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    self.root.write(&mut writer).context("Failed to serialize document")?;
    String::from_utf8(writer.into_inner()).context("Serialized document is not UTF-8")
  }
}
