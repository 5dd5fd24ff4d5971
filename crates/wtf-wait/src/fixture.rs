//! In-memory page for exercising conditions without a browser.
//!
//! A [`FixturePage`] is a tree of [`FixtureElement`]s whose state follows a
//! timeline measured from page load: elements can appear late, disappear, or
//! change text/visibility/attributes after a delay. [`FixturePage::reload`]
//! invalidates every handle handed out so far, which is how staleness is
//! simulated.

use crate::access::{AccessError, AccessResult, Accessor, Handle, Interact};
use crate::Locator;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Observable state of one element at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementState {
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    pub selected: bool,
    pub attributes: BTreeMap<String, String>,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            text: String::new(),
            visible: true,
            enabled: true,
            selected: false,
            attributes: BTreeMap::new(),
        }
    }
}

/// A partial update to an [`ElementState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub text: Option<String>,
    pub visible: Option<bool>,
    pub enabled: Option<bool>,
    pub selected: Option<bool>,
    pub attributes: BTreeMap<String, String>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, v: impl Into<String>) -> Self {
        self.text = Some(v.into());
        self
    }

    pub fn visible(mut self, v: bool) -> Self {
        self.visible = Some(v);
        self
    }

    pub fn enabled(mut self, v: bool) -> Self {
        self.enabled = Some(v);
        self
    }

    pub fn selected(mut self, v: bool) -> Self {
        self.selected = Some(v);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn apply(&self, state: &mut ElementState) {
        if let Some(ref text) = self.text {
            state.text = text.clone();
        }
        if let Some(v) = self.visible {
            state.visible = v;
        }
        if let Some(v) = self.enabled {
            state.enabled = v;
        }
        if let Some(v) = self.selected {
            state.selected = v;
        }
        for (k, v) in &self.attributes {
            state.attributes.insert(k.clone(), v.clone());
        }
    }
}

/// Builder for one element of a fixture page.
#[derive(Debug, Clone, Default)]
pub struct FixtureElement {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    name: Option<String>,
    state: ElementState,
    appear_after: Duration,
    remove_after: Option<Duration>,
    changes: Vec<(Duration, StatePatch)>,
    on_click: Option<StatePatch>,
    children: Vec<FixtureElement>,
}

impl FixtureElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn id(mut self, v: impl Into<String>) -> Self {
        self.id = Some(v.into());
        self
    }

    pub fn class(mut self, v: impl Into<String>) -> Self {
        self.classes.push(v.into());
        self
    }

    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = Some(v.into());
        self
    }

    pub fn text(mut self, v: impl Into<String>) -> Self {
        self.state.text = v.into();
        self
    }

    /// Present in the DOM but not displayed (zero size).
    pub fn hidden(mut self) -> Self {
        self.state.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.state.enabled = false;
        self
    }

    pub fn selected(mut self, v: bool) -> Self {
        self.state.selected = v;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.state.attributes.insert(name.into(), value.into());
        self
    }

    /// Not attached until `delay` after page load.
    pub fn appear_after(mut self, delay: Duration) -> Self {
        self.appear_after = delay;
        self
    }

    /// Detached `delay` after page load.
    pub fn remove_after(mut self, delay: Duration) -> Self {
        self.remove_after = Some(delay);
        self
    }

    /// Apply `patch` once `delay` has passed since page load.
    pub fn change_after(mut self, delay: Duration, patch: StatePatch) -> Self {
        self.changes.push((delay, patch));
        self
    }

    /// Apply `patch` whenever the element is clicked.
    pub fn on_click(mut self, patch: StatePatch) -> Self {
        self.on_click = Some(patch);
        self
    }

    pub fn child(mut self, child: FixtureElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = FixtureElement>) -> Self {
        self.children.extend(children);
        self
    }
}

#[derive(Debug)]
struct Node {
    parent: Option<usize>,
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    name: Option<String>,
    base: ElementState,
    appear_after: Duration,
    remove_after: Option<Duration>,
    /// Sorted by time.
    changes: Vec<(Duration, StatePatch)>,
    on_click: Option<StatePatch>,
}

#[derive(Debug)]
struct PageState {
    loaded_at: Instant,
    generation: u64,
    /// Pre-order, so document order is index order.
    nodes: Vec<Node>,
}

impl PageState {
    fn flatten(&mut self, element: FixtureElement, parent: Option<usize>) {
        let mut changes = element.changes;
        changes.sort_by_key(|(at, _)| *at);
        let index = self.nodes.len();
        self.nodes.push(Node {
            parent,
            tag: element.tag,
            id: element.id,
            classes: element.classes,
            name: element.name,
            base: element.state,
            appear_after: element.appear_after,
            remove_after: element.remove_after,
            changes,
            on_click: element.on_click,
        });
        for child in element.children {
            self.flatten(child, Some(index));
        }
    }

    fn now(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    fn attached(&self, index: usize, t: Duration) -> bool {
        let node = &self.nodes[index];
        let here = node.appear_after <= t && node.remove_after.map_or(true, |r| t < r);
        here && node.parent.map_or(true, |p| self.attached(p, t))
    }

    fn state_at(&self, index: usize, t: Duration) -> ElementState {
        let node = &self.nodes[index];
        let mut state = node.base.clone();
        for (_, patch) in node.changes.iter().take_while(|(at, _)| *at <= t) {
            patch.apply(&mut state);
        }
        state
    }

    /// Displayed if the element and all of its ancestors are.
    fn displayed(&self, index: usize, t: Duration) -> bool {
        self.state_at(index, t).visible
            && self.nodes[index]
                .parent
                .map_or(true, |p| self.displayed(p, t))
    }

    fn is_descendant(&self, index: usize, ancestor: usize) -> bool {
        let mut cursor = self.nodes[index].parent;
        while let Some(p) = cursor {
            if p == ancestor {
                return true;
            }
            cursor = self.nodes[p].parent;
        }
        false
    }

    fn matches(&self, index: usize, locator: &Locator, t: Duration) -> AccessResult<bool> {
        let node = &self.nodes[index];
        Ok(match locator {
            Locator::Id(v) => node.id.as_deref() == Some(v.as_str()),
            Locator::ClassName(v) => {
                let state = self.state_at(index, t);
                match state.attributes.get("class") {
                    Some(classes) => classes.split_whitespace().any(|c| c == v),
                    None => node.classes.iter().any(|c| c == v),
                }
            }
            Locator::TagName(v) => node.tag.eq_ignore_ascii_case(v),
            Locator::Name(v) => node.name.as_deref() == Some(v.as_str()),
            Locator::LinkText(v) => {
                node.tag.eq_ignore_ascii_case("a") && self.state_at(index, t).text == *v
            }
            Locator::Css(_) | Locator::XPath(_) => {
                return Err(AccessError::Fatal(format!(
                    "unsupported locator for fixture pages: {}",
                    locator
                )))
            }
        })
    }

    fn find_all(&self, below: Option<usize>, locator: &Locator) -> AccessResult<Vec<usize>> {
        let t = self.now();
        let mut found = Vec::new();
        for index in 0..self.nodes.len() {
            if let Some(root) = below {
                if !self.is_descendant(index, root) {
                    continue;
                }
            }
            if self.attached(index, t) && self.matches(index, locator, t)? {
                found.push(index);
            }
        }
        Ok(found)
    }

    fn insert_change(&mut self, index: usize, patch: StatePatch) {
        let t = self.now();
        let changes = &mut self.nodes[index].changes;
        let at = changes.partition_point(|(when, _)| *when <= t);
        changes.insert(at, (t, patch));
    }
}

/// An in-memory page. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct FixturePage {
    inner: Arc<Mutex<PageState>>,
}

impl FixturePage {
    /// Build a page. The timeline starts now.
    pub fn new(elements: impl IntoIterator<Item = FixtureElement>) -> Self {
        let mut state = PageState {
            loaded_at: Instant::now(),
            generation: 0,
            nodes: Vec::new(),
        };
        for element in elements {
            state.flatten(element, None);
        }
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Invalidate every handle resolved so far. The timeline keeps running.
    pub fn reload(&self) {
        let mut state = lock(&self.inner);
        state.generation += 1;
        debug!("fixture page reloaded (generation {})", state.generation);
    }

    /// Time since the page was built.
    pub fn elapsed(&self) -> Duration {
        lock(&self.inner).now()
    }

    fn handle(&self, node: usize, generation: u64) -> FixtureHandle {
        FixtureHandle {
            page: self.inner.clone(),
            node,
            generation,
        }
    }
}

impl Accessor for FixturePage {
    type Handle = FixtureHandle;

    fn resolve(&self, locator: &Locator) -> AccessResult<FixtureHandle> {
        self.resolve_all(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::NotFound(locator.to_string()))
    }

    fn resolve_all(&self, locator: &Locator) -> AccessResult<Vec<FixtureHandle>> {
        let state = lock(&self.inner);
        let generation = state.generation;
        let found = state.find_all(None, locator)?;
        drop(state);
        Ok(found.into_iter().map(|n| self.handle(n, generation)).collect())
    }
}

/// Reference to one element of a [`FixturePage`].
#[derive(Debug, Clone)]
pub struct FixtureHandle {
    page: Arc<Mutex<PageState>>,
    node: usize,
    generation: u64,
}

impl FixtureHandle {
    /// Run `f` against the page if this handle is still valid.
    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut PageState, Duration) -> AccessResult<R>,
    ) -> AccessResult<R> {
        let mut state = lock(&self.page);
        if state.generation != self.generation {
            return Err(AccessError::Stale(format!(
                "<{}> belongs to a previous page load",
                state.nodes[self.node].tag
            )));
        }
        let t = state.now();
        if !state.attached(self.node, t) {
            return Err(AccessError::Stale(format!(
                "<{}> is no longer attached to the DOM",
                state.nodes[self.node].tag
            )));
        }
        f(&mut *state, t)
    }

    fn sibling(&self, node: usize) -> FixtureHandle {
        FixtureHandle {
            page: self.page.clone(),
            node,
            generation: self.generation,
        }
    }

    /// The element's tag name.
    pub fn tag(&self) -> String {
        lock(&self.page).nodes[self.node].tag.clone()
    }

    fn interactable(state: &PageState, node: usize, t: Duration) -> AccessResult<()> {
        if !state.displayed(node, t) {
            return Err(AccessError::Fatal(format!(
                "<{}> is not interactable: not displayed",
                state.nodes[node].tag
            )));
        }
        if !state.state_at(node, t).enabled {
            return Err(AccessError::Fatal(format!(
                "<{}> is not interactable: disabled",
                state.nodes[node].tag
            )));
        }
        Ok(())
    }
}

impl Handle for FixtureHandle {
    fn resolve(&self, locator: &Locator) -> AccessResult<Self> {
        self.resolve_all(locator)?
            .into_iter()
            .next()
            .ok_or_else(|| AccessError::NotFound(locator.to_string()))
    }

    fn resolve_all(&self, locator: &Locator) -> AccessResult<Vec<Self>> {
        let found = self.with_state(|state, _| state.find_all(Some(self.node), locator))?;
        Ok(found.into_iter().map(|n| self.sibling(n)).collect())
    }

    fn is_visible(&self) -> AccessResult<bool> {
        self.with_state(|state, t| Ok(state.displayed(self.node, t)))
    }

    fn is_enabled(&self) -> AccessResult<bool> {
        self.with_state(|state, t| Ok(state.state_at(self.node, t).enabled))
    }

    fn is_selected(&self) -> AccessResult<bool> {
        self.with_state(|state, t| Ok(state.state_at(self.node, t).selected))
    }

    fn text(&self) -> AccessResult<String> {
        self.with_state(|state, t| Ok(state.state_at(self.node, t).text))
    }

    fn attribute(&self, name: &str) -> AccessResult<Option<String>> {
        self.with_state(|state, t| {
            let current = state.state_at(self.node, t);
            if let Some(v) = current.attributes.get(name) {
                return Ok(Some(v.clone()));
            }
            let node = &state.nodes[self.node];
            Ok(match name {
                "id" => node.id.clone(),
                "name" => node.name.clone(),
                "class" if !node.classes.is_empty() => Some(node.classes.join(" ")),
                _ => None,
            })
        })
    }
}

impl Interact for FixtureHandle {
    fn click(&self) -> AccessResult<()> {
        self.with_state(|state, t| {
            Self::interactable(state, self.node, t)?;
            let node = &state.nodes[self.node];

            if node.tag.eq_ignore_ascii_case("option") {
                let parent = node.parent;
                let options: Vec<usize> = (0..state.nodes.len())
                    .filter(|&i| {
                        i != self.node
                            && state.nodes[i].parent == parent
                            && state.nodes[i].tag.eq_ignore_ascii_case("option")
                    })
                    .collect();
                for other in options {
                    state.insert_change(other, StatePatch::new().selected(false));
                }
                state.insert_change(self.node, StatePatch::new().selected(true));
                return Ok(());
            }

            let checkbox = node.tag.eq_ignore_ascii_case("input")
                && state.state_at(self.node, t).attributes.get("type").map(String::as_str)
                    == Some("checkbox");
            if checkbox {
                let selected = state.state_at(self.node, t).selected;
                state.insert_change(self.node, StatePatch::new().selected(!selected));
            }

            if let Some(patch) = state.nodes[self.node].on_click.clone() {
                state.insert_change(self.node, patch);
            }
            Ok(())
        })
    }

    fn send_keys(&self, text: &str) -> AccessResult<()> {
        self.with_state(|state, t| {
            Self::interactable(state, self.node, t)?;
            let mut value = state
                .state_at(self.node, t)
                .attributes
                .get("value")
                .cloned()
                .unwrap_or_default();
            value.push_str(text);
            state.insert_change(self.node, StatePatch::new().attribute("value", value));
            Ok(())
        })
    }

    fn clear(&self) -> AccessResult<()> {
        self.with_state(|state, t| {
            Self::interactable(state, self.node, t)?;
            state.insert_change(self.node, StatePatch::new().attribute("value", ""));
            Ok(())
        })
    }
}

fn lock(m: &Mutex<PageState>) -> MutexGuard<'_, PageState> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
