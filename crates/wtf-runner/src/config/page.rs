use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use wtf_wait::{FixtureElement, FixturePage, StatePatch};

fn default_true() -> bool {
    true
}

/// One element of the scenario page, with its timeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    pub id: Option<String>,
    /// Space-separated class names.
    pub class: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// Attached this long after page load.
    pub appear_after_ms: Option<u64>,
    /// Detached this long after page load.
    pub remove_after_ms: Option<u64>,
    #[serde(default)]
    pub changes: Vec<ChangeSpec>,
    pub on_click: Option<PatchSpec>,

    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

/// State update applied `after_ms` after page load.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeSpec {
    pub after_ms: u64,
    #[serde(flatten)]
    pub patch: PatchSpec,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PatchSpec {
    pub text: Option<String>,
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
    pub selected: Option<bool>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl PatchSpec {
    pub fn to_patch(&self) -> StatePatch {
        StatePatch {
            text: self.text.clone(),
            visible: self.visible,
            enabled: self.enabled,
            selected: self.selected,
            attributes: self.attributes.clone(),
        }
    }
}

impl ElementSpec {
    pub fn build(&self) -> FixtureElement {
        let mut el = FixtureElement::new(&self.tag)
            .text(&self.text)
            .selected(self.selected);
        if let Some(ref id) = self.id {
            el = el.id(id);
        }
        if let Some(ref class) = self.class {
            for c in class.split_whitespace() {
                el = el.class(c);
            }
        }
        if let Some(ref name) = self.name {
            el = el.name(name);
        }
        if !self.visible {
            el = el.hidden();
        }
        if !self.enabled {
            el = el.disabled();
        }
        for (k, v) in &self.attributes {
            el = el.attribute(k, v);
        }
        if let Some(ms) = self.appear_after_ms {
            el = el.appear_after(Duration::from_millis(ms));
        }
        if let Some(ms) = self.remove_after_ms {
            el = el.remove_after(Duration::from_millis(ms));
        }
        for change in &self.changes {
            el = el.change_after(Duration::from_millis(change.after_ms), change.patch.to_patch());
        }
        if let Some(ref patch) = self.on_click {
            el = el.on_click(patch.to_patch());
        }
        el.children(self.children.iter().map(ElementSpec::build))
    }

    /// Number of elements in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(ElementSpec::count).sum::<usize>()
    }
}

/// Build a fresh page. Its timeline starts now.
pub fn build_page(elements: &[ElementSpec]) -> FixturePage {
    FixturePage::new(elements.iter().map(ElementSpec::build))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wtf_wait::{Accessor, Handle, Locator};

    #[test]
    fn test_build_nested_page() {
        let yaml = r#"
- tag: div
  class: "parent main"
  children:
    - tag: button
      class: button1
      text: "Click me"
    - tag: input
      name: email
      visible: false
      attributes: { placeholder: "you@example.com" }
"#;
        let specs: Vec<ElementSpec> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(specs[0].count(), 3);

        let page = build_page(&specs);
        let parent = page.resolve(&Locator::class_name("main")).unwrap();
        let button = parent.resolve(&Locator::class_name("button1")).unwrap();
        assert_eq!(button.text().unwrap(), "Click me");

        let input = page.resolve(&Locator::name("email")).unwrap();
        assert!(!input.is_visible().unwrap());
        assert_eq!(
            input.attribute("placeholder").unwrap(),
            Some("you@example.com".into())
        );
    }

    #[test]
    fn test_change_patch() {
        let yaml = r#"
tag: div
text: loading
changes:
  - after_ms: 0
    text: done
    attributes: { class: ready }
"#;
        let spec: ElementSpec = serde_yaml::from_str(yaml).unwrap();
        let page = build_page(&[spec]);
        let div = page.resolve(&Locator::class_name("ready")).unwrap();
        assert_eq!(div.text().unwrap(), "done");
    }
}
