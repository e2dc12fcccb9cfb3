//! Document builders for every screen of the app.
//!
//! All builders are pure: they read the index and pre-resolved thumbnail
//! sources and never touch the network or the cache.

use std::collections::HashMap;

use crate::constants::constants;
use crate::document::{Document, DocumentKind, Element, Trigger, UiEvent};
use crate::error::ManifestError;
use crate::manifest::{LabelGroup, VideoAsset, VideoIndex};

/// `loadingTemplate` with an activity indicator. `None` falls back to "Loading...".
pub fn loading(title: Option<&str>) -> Document {
  let title = title.unwrap_or("Loading...");
  Document::new(
    DocumentKind::Loading,
    Element::new("loadingTemplate").child(Element::new("activityIndicator").child(Element::text_node("title", title))),
  )
}

pub fn alert(title: &str, description: &str) -> Document {
  Document::new(
    DocumentKind::Alert,
    Element::new("alertTemplate")
      .child(Element::text_node("title", title))
      .child(Element::text_node("description", description)),
  )
}

pub fn descriptive_alert(title: &str, description: &str) -> Document {
  Document::new(
    DocumentKind::DescriptiveAlert,
    Element::new("descriptiveAlertTemplate")
      .child(Element::text_node("title", title))
      .child(Element::text_node("description", description)),
  )
}

/// Alert shown when the host fails to evaluate the application script.
pub fn eval_error_alert() -> Document {
  let description = [
    "There was an error attempting to evaluate the external JavaScript files.",
    "Please check your network connection and try again later.",
  ]
  .join("\n\n");
  alert("Evaluate Scripts Error", &description)
}

/// Alert for a failed manifest fetch: `Fetch Error <status>` when the server answered.
pub fn fetch_error_alert(url: &str, err: &ManifestError) -> Document {
  let title = match err.status() {
    Some(status) => format!("Fetch Error {}", status),
    None => "Fetch Error".to_string(),
  };
  let description = format!("Could not load document:\n{}\n({})", url, err.reason());
  alert(&title, &description)
}

/// `menuBarTemplate` with one item per label; selecting an item opens its showcase.
pub fn menu_bar(index: &VideoIndex) -> Document {
  let items: Vec<Element> = index
    .labels()
    .enumerate()
    .map(|(n, label)| {
      Element::new("menuItem")
        .attr("id", format!("menu-{}", n))
        .attr("selectTargetLabel", label)
        .child(Element::text_node("title", label))
    })
    .collect();

  let mut doc = Document::new(DocumentKind::MenuBar, Element::new("menuBarTemplate").child(Element::new("menuBar").children(items)));
  for (n, label) in index.labels().enumerate() {
    doc.bind(format!("menu-{}", n), Trigger::Select, UiEvent::SelectLabel { label: label.to_string() });
  }
  doc
}

fn catalog_lockup_title(asset: &VideoAsset) -> String {
  format!("{} – {}", asset.label, asset.time_of_day)
}

fn showcase_lockup_title(asset: &VideoAsset) -> String {
  format!("{} - {}", asset.label, asset.time_of_day)
}

/// Id of the catalog list item for the `n`th label.
pub fn section_id(n: usize) -> String {
  format!("section-{}", n)
}

fn lockup_id(section: usize, n: usize) -> String {
  format!("lockup-{}-{}", section, n)
}

/// `catalogTemplate` with one list item per label.
///
/// Every image starts as `placeholder`; real thumbnails are filled in later
/// when the section is highlighted.
pub fn catalog(index: &VideoIndex, placeholder: &str) -> Document {
  let c = constants();
  let mut bindings = Vec::new();

  let list_items: Vec<Element> = index
    .groups()
    .iter()
    .enumerate()
    .map(|(s, group)| {
      let sid = section_id(s);
      let label = group.label().to_string();
      bindings.push((sid.clone(), Trigger::Highlight, UiEvent::HighlightSection { label: label.clone() }));
      bindings.push((sid.clone(), Trigger::Select, UiEvent::SelectLabel { label: label.clone() }));

      let lockups: Vec<Element> = group
        .assets()
        .iter()
        .enumerate()
        .map(|(n, asset)| {
          let lid = lockup_id(s, n);
          bindings.push((lid.clone(), Trigger::Select, UiEvent::SelectVideo { url: asset.url.clone() }));
          Element::new("lockup")
            .attr("id", lid)
            .attr("targetUrl", &asset.url)
            .child(
              Element::new("img")
                .attr("id", &asset.id)
                .attr("src", placeholder)
                .attr("width", c.catalog_thumb_width)
                .attr("height", c.catalog_thumb_height),
            )
            .child(Element::text_node("title", catalog_lockup_title(asset)))
        })
        .collect();

      Element::new("listItemLockup")
        .attr("id", sid)
        .attr("selectTargetLabel", &label)
        .child(Element::text_node("title", &label))
        .child(Element::text_node("decorationLabel", group.len().to_string()))
        .child(
          Element::new("relatedContent")
            .child(Element::new("grid").child(Element::new("section").children(lockups))),
        )
    })
    .collect();

  let template = Element::new("catalogTemplate")
    .child(Element::new("banner").child(Element::text_node("title", &c.catalog_title)))
    .child(Element::new("list").child(Element::new("section").children(list_items)));

  let mut doc = Document::new(DocumentKind::Catalog, template);
  for (id, trigger, event) in bindings {
    doc.bind(id, trigger, event);
  }
  doc
}

/// `showcaseTemplate` carousel for one label.
///
/// `thumbnails` maps asset id to an image source; assets without an entry get
/// `placeholder`.
pub fn showcase(group: &LabelGroup, thumbnails: &HashMap<String, String>, placeholder: &str) -> Document {
  let c = constants();
  let lockups: Vec<Element> = group
    .assets()
    .iter()
    .enumerate()
    .map(|(n, asset)| {
      let src = thumbnails.get(&asset.id).map(String::as_str).unwrap_or(placeholder);
      Element::new("lockup")
        .attr("id", lockup_id(0, n))
        .attr("targetUrl", &asset.url)
        .child(
          Element::new("img")
            .attr("id", &asset.id)
            .attr("src", src)
            .attr("width", c.showcase_thumb_width)
            .attr("height", c.showcase_thumb_height),
        )
        .child(Element::text_node("title", showcase_lockup_title(asset)))
    })
    .collect();

  let template = Element::new("showcaseTemplate")
    .child(Element::new("banner").child(Element::text_node("title", format!("{} Screensavers", group.label()))))
    .child(Element::new("carousel").child(Element::new("section").children(lockups)));

  let mut doc = Document::new(DocumentKind::Showcase, template);
  for (n, asset) in group.assets().iter().enumerate() {
    doc.bind(lockup_id(0, n), Trigger::Select, UiEvent::SelectVideo { url: asset.url.clone() });
  }
  doc
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manifest::parse_manifest;

  const PLACEHOLDER: &str = "resource://_pattern";

  fn nature_index() -> VideoIndex {
    parse_manifest(r#"[{"assets":[{"id":"a1","url":"http://x/a.mov","accessibilityLabel":"Nature","timeOfDay":"day"}]}]"#)
      .unwrap()
  }

  fn mixed_index() -> VideoIndex {
    parse_manifest(
      r#"[{"assets":[
        {"id":"a1","url":"http://x/a1.mov","accessibilityLabel":"Nature","timeOfDay":"day"},
        {"id":"a2","url":"http://x/a2.mov","accessibilityLabel":"Nature","timeOfDay":"night"},
        {"id":"a1","url":"http://x/c1.mov","accessibilityLabel":"City","timeOfDay":"night"}
      ]}]"#,
    )
    .unwrap()
  }

  #[test]
  fn nature_catalog_has_one_list_item_with_count() {
    let doc = catalog(&nature_index(), PLACEHOLDER);
    let items = doc.find_all("listItemLockup");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].child_text("title").as_deref(), Some("Nature"));
    assert_eq!(items[0].child_text("decorationLabel").as_deref(), Some("1"));
  }

  #[test]
  fn catalog_lockups_round_trip_index_pairs() {
    let index = mixed_index();
    let doc = catalog(&index, PLACEHOLDER);

    let mut pairs = Vec::new();
    for item in doc.find_all("listItemLockup") {
      let label = item.get_attr("selectTargetLabel").unwrap().to_string();
      for lockup in item.descendants("lockup") {
        let img = lockup.first("img").unwrap();
        assert_eq!(img.get_attr("src"), Some(PLACEHOLDER));
        pairs.push((label.clone(), img.id().unwrap().to_string()));
      }
    }

    let expected: Vec<_> =
      index.groups().iter().flat_map(|g| g.assets().iter().map(|a| (a.label.clone(), a.id.clone()))).collect();
    assert_eq!(pairs, expected);
    assert_eq!(pairs.len(), 3);
  }

  #[test]
  fn catalog_binds_sections_and_videos() {
    let doc = catalog(&mixed_index(), PLACEHOLDER);
    assert_eq!(doc.resolve("section-1", Trigger::Highlight), Some(&UiEvent::HighlightSection { label: "City".into() }));
    assert_eq!(doc.resolve("section-0", Trigger::Select), Some(&UiEvent::SelectLabel { label: "Nature".into() }));
    assert_eq!(doc.resolve("lockup-0-1", Trigger::Select), Some(&UiEvent::SelectVideo { url: "http://x/a2.mov".into() }));
    let lockup = doc.element_by_id("lockup-0-1").unwrap();
    assert_eq!(lockup.child_text("title").as_deref(), Some("Nature – Night"));
  }

  #[test]
  fn showcase_uses_resolved_thumbnails_and_placeholder() {
    let index = mixed_index();
    let group = index.group("Nature").unwrap();
    let thumbs = HashMap::from([("a1".to_string(), "file:///cache/a1.png".to_string())]);
    let doc = showcase(group, &thumbs, PLACEHOLDER);

    assert_eq!(doc.kind(), DocumentKind::Showcase);
    let banner = doc.find_all("banner");
    assert_eq!(banner[0].child_text("title").as_deref(), Some("Nature Screensavers"));

    let imgs = doc.find_all("img");
    assert_eq!(imgs.len(), 2);
    assert_eq!(imgs[0].get_attr("src"), Some("file:///cache/a1.png"));
    assert_eq!(imgs[0].get_attr("width"), Some("1280"));
    assert_eq!(imgs[1].get_attr("src"), Some(PLACEHOLDER));
    assert_eq!(doc.resolve("lockup-0-0", Trigger::Select), Some(&UiEvent::SelectVideo { url: "http://x/a1.mov".into() }));
    assert_eq!(doc.find_all("lockup")[1].child_text("title").as_deref(), Some("Nature - Night"));
  }

  #[test]
  fn menu_bar_items_select_labels() {
    let doc = menu_bar(&mixed_index());
    let items = doc.find_all("menuItem");
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].get_attr("selectTargetLabel"), Some("City"));
    assert_eq!(doc.resolve("menu-1", Trigger::Select), Some(&UiEvent::SelectLabel { label: "City".into() }));
  }

  #[test]
  fn loading_defaults_title() {
    let doc = loading(None);
    assert_eq!(doc.find_all("activityIndicator")[0].child_text("title").as_deref(), Some("Loading..."));
    let doc = loading(Some("Loading Nature..."));
    assert_eq!(doc.find_all("activityIndicator")[0].child_text("title").as_deref(), Some("Loading Nature..."));
  }

  #[test]
  fn fetch_error_alert_titles() {
    let not_found = ManifestError::Http { url: "http://x/m.json".into(), status: 404, reason: "Not Found".into() };
    let doc = fetch_error_alert("http://x/m.json", &not_found);
    let tpl = doc.root().first("alertTemplate").unwrap();
    assert_eq!(tpl.child_text("title").as_deref(), Some("Fetch Error 404"));
    assert_eq!(tpl.child_text("description").as_deref(), Some("Could not load document:\nhttp://x/m.json\n(Not Found)"));

    let parse: ManifestError = serde_json::from_str::<serde_json::Value>("nope").unwrap_err().into();
    let doc = fetch_error_alert("http://x/m.json", &parse);
    assert_eq!(doc.root().first("alertTemplate").unwrap().child_text("title").as_deref(), Some("Fetch Error"));
  }

  #[test]
  fn alert_variants_use_their_templates() {
    assert!(descriptive_alert("t", "d").root().first("descriptiveAlertTemplate").is_some());
    let eval = eval_error_alert();
    assert_eq!(eval.kind(), DocumentKind::Alert);
    assert_eq!(eval.find_all("title")[0].inner_text(), "Evaluate Scripts Error");
  }
}
