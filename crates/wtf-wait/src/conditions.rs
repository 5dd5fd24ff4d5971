//! Stock conditions. Each factory returns a [`Condition`] ready for [`poll`].
//!
//! Resolution failures are surfaced as [`ProbeResult::Failure`] so the poll
//! config decides whether `NotFound` means "keep waiting". A handle going
//! stale between resolution and the follow-up query is always "keep
//! waiting": the next attempt re-resolves.
//!
//! [`poll`]: fn@crate::poll

use crate::access::{AccessError, AccessResult, Accessor, ErrorKind, Handle, Scope};
use crate::{Condition, Locator, ProbeResult};
use tracing::{debug, warn};

fn describe<H: Handle>(what: &str, locator: &Locator, scope: &Scope<H>) -> String {
    if scope.is_root() {
        format!("{} located by {}", what, locator)
    } else {
        format!("{} located by {} within parent element", what, locator)
    }
}

/// `Some` settles, `None` and stale handles keep polling, anything else is
/// left to the poll config.
fn settle<T>(result: AccessResult<Option<T>>) -> ProbeResult<T> {
    match result {
        Ok(Some(v)) => ProbeResult::Success(v),
        Ok(None) => ProbeResult::Pending,
        Err(e) if e.is_stale() => ProbeResult::Pending,
        Err(e) => ProbeResult::Failure(e),
    }
}

/// The element is in the DOM. Yields its handle.
pub fn presence_of<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
) -> Condition<'c, A, A::Handle>
where
    A: Accessor + ?Sized + 'c,
{
    let description = describe("presence of element", &locator, &scope);
    Condition::new(description, move |a: &A| {
        settle(scope.resolve(a, &locator).map(Some))
    })
}

/// The element is in the DOM and rendered with a non-zero size.
pub fn visibility_of<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
) -> Condition<'c, A, A::Handle>
where
    A: Accessor + ?Sized + 'c,
{
    let description = describe("visibility of element", &locator, &scope);
    Condition::new(description, move |a: &A| {
        settle(scope.resolve(a, &locator).and_then(|h| {
            let visible = h.is_visible()?;
            Ok(visible.then_some(h))
        }))
    })
}

/// The element is absent, stale, or present but not rendered. Never fails:
/// a driver error while looking for the element counts as absence.
pub fn invisibility_of<'c, A>(scope: Scope<A::Handle>, locator: Locator) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    let description = describe("invisibility of element", &locator, &scope);
    Condition::new(description, move |a: &A| {
        let visible = scope.resolve(a, &locator).and_then(|h| h.is_visible());
        match visible {
            Ok(true) => ProbeResult::Pending,
            Ok(false) => ProbeResult::Success(true),
            Err(e) => {
                if e.kind() == ErrorKind::Fatal {
                    warn!("treating {} as absent: {}", locator, e);
                }
                ProbeResult::Success(true)
            }
        }
    })
}

/// The element is visible and enabled. Yields its handle.
pub fn element_to_be_clickable<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
) -> Condition<'c, A, A::Handle>
where
    A: Accessor + ?Sized + 'c,
{
    let description = describe("element to be clickable", &locator, &scope);
    Condition::new(description, move |a: &A| {
        settle(scope.resolve(a, &locator).and_then(|h| {
            let clickable = h.is_visible()? && h.is_enabled()?;
            Ok(clickable.then_some(h))
        }))
    })
}

pub fn selection_state_to_be<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
    selected: bool,
) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    let what = format!("element to be {}", if selected { "selected" } else { "deselected" });
    let description = describe(&what, &locator, &scope);
    Condition::new(description, move |a: &A| {
        settle(scope.resolve(a, &locator).and_then(|h| {
            Ok((h.is_selected()? == selected).then_some(true))
        }))
    })
}

pub fn element_to_be_selected<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    selection_state_to_be(scope, locator, true)
}

pub fn element_not_selected<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    selection_state_to_be(scope, locator, false)
}

/// The element's text contains `needle` (substring match).
pub fn text_to_be_present<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
    needle: impl Into<String>,
) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    let needle = needle.into();
    let what = format!("text ('{}') to be present in element", needle);
    let description = describe(&what, &locator, &scope);
    Condition::new(description, move |a: &A| {
        settle(scope.resolve(a, &locator).and_then(|h| {
            Ok(h.text()?.contains(needle.as_str()).then_some(true))
        }))
    })
}

/// The element is gone, or its text is not exactly `text`.
///
/// Note the asymmetry with [`text_to_be_present`]: this compares the whole
/// text, so "Hello World" does not count as "Hello" being present here.
pub fn text_to_be_absent<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
    text: impl Into<String>,
) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    let text = text.into();
    let what = format!("text ('{}') to be absent from element", text);
    let description = describe(&what, &locator, &scope);
    Condition::new(description, move |a: &A| {
        match scope.resolve(a, &locator).and_then(|h| h.text()) {
            Ok(current) if current == text => ProbeResult::Pending,
            Ok(_) => ProbeResult::Success(true),
            Err(e) => {
                if e.kind() == ErrorKind::Fatal {
                    warn!("treating {} as absent: {}", locator, e);
                }
                ProbeResult::Success(true)
            }
        }
    })
}

/// The attribute exists and contains `needle`. A missing attribute keeps
/// polling.
pub fn attribute_to_contain<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
    attribute: impl Into<String>,
    needle: impl Into<String>,
) -> Condition<'c, A, bool>
where
    A: Accessor + ?Sized + 'c,
{
    let attribute = attribute.into();
    let needle = needle.into();
    let description = describe(
        &format!("attribute '{}' to contain '{}' in element", attribute, needle),
        &locator,
        &scope,
    );
    Condition::new(description, move |a: &A| {
        settle(scope.resolve(a, &locator).and_then(|h| {
            let hit = h
                .attribute(&attribute)?
                .is_some_and(|v| v.contains(needle.as_str()));
            Ok(hit.then_some(true))
        }))
    })
}

/// At least one element matches. Yields all of them in document order.
///
/// Errors while resolving are logged and treated as "none yet", including
/// fatal ones.
pub fn presence_of_all<'c, A>(
    scope: Scope<A::Handle>,
    locator: Locator,
) -> Condition<'c, A, Vec<A::Handle>>
where
    A: Accessor + ?Sized + 'c,
{
    let description = describe("presence of all elements", &locator, &scope);
    Condition::new(description, move |a: &A| match scope.resolve_all(a, &locator) {
        Ok(found) if !found.is_empty() => ProbeResult::Success(found),
        Ok(_) => ProbeResult::Pending,
        Err(e) => {
            debug!("resolving {} failed, retrying: {}", locator, e);
            ProbeResult::Pending
        }
    })
}

/// A previously resolved element has been detached or invalidated.
pub fn staleness_of<'c, A, H>(handle: H) -> Condition<'c, A, bool>
where
    A: ?Sized,
    H: Handle + 'c,
{
    Condition::new("staleness of element", move |_: &A| match handle.is_enabled() {
        Ok(_) => ProbeResult::Pending,
        Err(AccessError::Stale(_)) | Err(AccessError::NotFound(_)) => ProbeResult::Success(true),
        Err(e) => ProbeResult::Failure(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureElement, FixturePage, StatePatch};
    use crate::{poll, PollConfig, PollOutcome};
    use std::time::{Duration, Instant};

    fn quick() -> PollConfig {
        PollConfig::new(Duration::from_millis(300), Duration::from_millis(10)).unwrap()
    }

    fn patient() -> PollConfig {
        PollConfig::new(Duration::from_secs(2), Duration::from_millis(10)).unwrap()
    }

    fn run<T>(page: &FixturePage, cond: Condition<'_, FixturePage, T>) -> PollOutcome<T> {
        poll(page, &cond, &quick()).unwrap()
    }

    fn greeting_page() -> FixturePage {
        FixturePage::new([FixtureElement::new("div")
            .class("divWithText")
            .text("Hello World")])
    }

    #[test]
    fn presence_yields_handle() {
        let page = greeting_page();
        let outcome = run(&page, presence_of(Scope::Root, Locator::class_name("divWithText")));
        assert_eq!(outcome.ok().unwrap().tag(), "div");
    }

    #[test]
    fn presence_times_out_with_not_found() {
        let page = greeting_page();
        match run(&page, presence_of(Scope::Root, Locator::id("nope"))) {
            PollOutcome::TimedOut { last_error, attempts, .. } => {
                assert!(matches!(last_error, Some(AccessError::NotFound(_))));
                assert!(attempts > 1);
            }
            PollOutcome::Success(_) => panic!("expected timeout"),
        }
    }

    #[test]
    fn unsupported_locator_is_fatal() {
        let page = greeting_page();
        let cond = visibility_of(Scope::Root, Locator::css("div.x"));
        let err = poll(&page, &cond, &quick()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fatal);
    }

    #[test]
    fn visibility_waits_for_late_element() {
        let page = FixturePage::new([FixtureElement::new("button")
            .class("button1")
            .appear_after(Duration::from_millis(100))]);
        let config = PollConfig::new(Duration::from_secs(2), Duration::from_millis(20)).unwrap();
        let cond = visibility_of(Scope::Root, Locator::class_name("button1"));
        let handle = poll(&page, &cond, &config).unwrap().ok().unwrap();
        assert!(page.elapsed() >= Duration::from_millis(100));
        assert!(handle.is_visible().unwrap());
    }

    #[test]
    fn visibility_pending_while_hidden() {
        let page = FixturePage::new([FixtureElement::new("div").class("ghost").hidden()]);
        let outcome = run(&page, visibility_of(Scope::Root, Locator::class_name("ghost")));
        assert!(outcome.is_timed_out());
    }

    #[test]
    fn invisibility_succeeds_when_absent_hidden_or_removed() {
        let page = FixturePage::new([
            FixtureElement::new("div").class("hidden").hidden(),
            FixtureElement::new("div")
                .class("spinner")
                .remove_after(Duration::from_millis(50)),
        ]);
        let invisible = |locator| run(&page, invisibility_of(Scope::Root, locator)).is_success();
        assert!(invisible(Locator::id("absent")));
        assert!(invisible(Locator::class_name("hidden")));
        assert!(invisible(Locator::class_name("spinner")));
        // fatal lookups count as absence
        assert!(invisible(Locator::xpath("//div")));
    }

    #[test]
    fn invisibility_times_out_on_visible_element() {
        let page = greeting_page();
        let outcome = run(&page, invisibility_of(Scope::Root, Locator::class_name("divWithText")));
        assert!(outcome.is_timed_out());
    }

    #[test]
    fn clickable_waits_for_enabled() {
        let page = FixturePage::new([FixtureElement::new("button")
            .id("go")
            .disabled()
            .change_after(Duration::from_millis(60), StatePatch::new().enabled(true))]);
        let cond = element_to_be_clickable(Scope::Root, Locator::id("go"));
        let handle = poll(&page, &cond, &patient()).unwrap().ok().unwrap();
        assert!(handle.is_enabled().unwrap());
    }

    #[test]
    fn selection_state() {
        let page = FixturePage::new([
            FixtureElement::new("option").id("on").selected(true),
            FixtureElement::new("option").id("off"),
        ]);
        let on = || Locator::id("on");
        let off = || Locator::id("off");
        assert!(run(&page, element_to_be_selected(Scope::Root, on())).is_success());
        assert!(run(&page, element_not_selected(Scope::Root, off())).is_success());
        assert!(run(&page, element_to_be_selected(Scope::Root, off())).is_timed_out());
    }

    #[test]
    fn text_present_is_substring_and_absent_is_exact() {
        let page = greeting_page();
        let loc = || Locator::class_name("divWithText");

        assert!(run(&page, text_to_be_present(Scope::Root, loc(), "Hello")).is_success());

        let start = Instant::now();
        assert!(run(&page, text_to_be_absent(Scope::Root, loc(), "XYZ")).is_success());
        assert!(start.elapsed() < Duration::from_millis(100));

        // "Hello World" != "Hello", so "Hello" counts as absent
        assert!(run(&page, text_to_be_absent(Scope::Root, loc(), "Hello")).is_success());

        let outcome = run(&page, text_to_be_absent(Scope::Root, loc(), "Hello World"));
        assert!(outcome.is_timed_out());
    }

    #[test]
    fn text_absent_when_element_missing() {
        let page = greeting_page();
        let outcome = run(&page, text_to_be_absent(Scope::Root, Locator::id("gone"), "x"));
        assert!(outcome.is_success());
    }

    #[test]
    fn text_present_after_change() {
        let page = FixturePage::new([FixtureElement::new("div")
            .class("status")
            .text("loading")
            .change_after(Duration::from_millis(50), StatePatch::new().text("Saved!"))]);
        let cond = text_to_be_present(Scope::Root, Locator::class_name("status"), "Saved");
        assert!(poll(&page, &cond, &patient()).unwrap().is_success());
    }

    #[test]
    fn attribute_contains() {
        let page = FixturePage::new([FixtureElement::new("input")
            .id("email")
            .attribute("placeholder", "you@example.com")]);
        let email = || Locator::id("email");
        let found = attribute_to_contain(Scope::Root, email(), "placeholder", "example");
        assert!(run(&page, found).is_success());
        let missing = attribute_to_contain(Scope::Root, email(), "title", "x");
        assert!(run(&page, missing).is_timed_out());
    }

    #[test]
    fn all_present_collects_matches() {
        let page = FixturePage::new([FixtureElement::new("ul").children([
            FixtureElement::new("li").class("item").text("a"),
            FixtureElement::new("li").class("item").text("b"),
            FixtureElement::new("li").class("item").text("c"),
        ])]);
        let items = run(&page, presence_of_all(Scope::Root, Locator::class_name("item")))
            .ok()
            .unwrap();
        let texts: Vec<String> = items.iter().map(|h| h.text().unwrap()).collect();
        assert_eq!(texts, ["a", "b", "c"]);

        let outcome = run(&page, presence_of_all(Scope::Root, Locator::class_name("none")));
        assert!(outcome.is_timed_out());

        // fatal resolution keeps polling
        let outcome = run(&page, presence_of_all(Scope::Root, Locator::css("li")));
        assert!(outcome.is_timed_out());
    }

    #[test]
    fn scoped_conditions() {
        let page = FixturePage::new([
            FixtureElement::new("div")
                .class("parent")
                .child(FixtureElement::new("button").class("button1").text("Click me")),
            FixtureElement::new("div").class("other"),
        ]);
        let parent = page.resolve(&Locator::class_name("parent")).unwrap();
        let other = page.resolve(&Locator::class_name("other")).unwrap();

        let button = || Locator::class_name("button1");
        let cond = text_to_be_present(Scope::Within(parent), button(), "Click");
        assert!(cond.description().ends_with("within parent element"));
        assert!(run(&page, cond).is_success());

        let cond = presence_of(Scope::Within(other), button());
        assert!(run(&page, cond).is_timed_out());
    }

    #[test]
    fn stale_parent_after_reload() {
        let page = FixturePage::new([FixtureElement::new("div")
            .class("parent")
            .child(FixtureElement::new("button").class("button1").text("Click me"))]);
        let parent = page.resolve(&Locator::class_name("parent")).unwrap();
        page.reload();
        let within = || Scope::Within(parent.clone());
        let button = || Locator::class_name("button1");

        // positive checks keep waiting on a stale parent
        assert!(run(&page, text_to_be_present(within(), button(), "Click")).is_timed_out());
        assert!(run(&page, visibility_of(within(), button())).is_timed_out());
        assert!(run(&page, element_to_be_clickable(within(), button())).is_timed_out());
        assert!(run(&page, element_not_selected(within(), button())).is_timed_out());

        // absence checks settle at once
        let start = Instant::now();
        assert!(run(&page, text_to_be_absent(within(), button(), "Click me")).is_success());
        assert!(run(&page, invisibility_of(within(), button())).is_success());
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn staleness_after_reload() {
        let page = greeting_page();
        let handle = page.resolve(&Locator::class_name("divWithText")).unwrap();
        let cond = staleness_of(handle);
        assert!(poll(&page, &cond, &quick()).unwrap().is_timed_out());
        page.reload();
        assert!(poll(&page, &cond, &quick()).unwrap().is_success());
    }

    #[test]
    fn descriptions() {
        let cond = visibility_of::<FixturePage>(Scope::Root, Locator::class_name("button1"));
        assert_eq!(cond.description(), "visibility of element located by class:button1");
        let cond = text_to_be_present::<FixturePage>(Scope::Root, Locator::id("x"), "Hi");
        assert_eq!(cond.to_string(), "text ('Hi') to be present in element located by id:x");
    }
}
