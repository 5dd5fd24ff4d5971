//! Integration tests for wtf-util
//!
//! Everything runs against in-memory fixture pages, no browser needed.

use std::fs;
use std::thread;
use std::time::{Duration, Instant};
use wtf_util::conditions::{presence_of, text_to_be_present, visibility_of};
use wtf_util::runner::{Config, Params, Runner};
use wtf_util::{
    poll, Accessor, Error, FixtureElement, FixturePage, Handle, Locator, PollConfig, PollOutcome,
    Scope, StatePatch, Waiter,
};

fn config(timeout_ms: u64, interval_ms: u64) -> PollConfig {
    PollConfig::new(
        Duration::from_millis(timeout_ms),
        Duration::from_millis(interval_ms),
    )
    .unwrap()
}

fn login_page() -> FixturePage {
    FixturePage::new([
        FixtureElement::new("form").id("login").children([
            FixtureElement::new("input").name("user"),
            FixtureElement::new("input").name("password"),
            FixtureElement::new("button")
                .id("submit")
                .text("Sign in")
                .disabled()
                .change_after(Duration::from_millis(80), StatePatch::new().enabled(true)),
        ]),
        FixtureElement::new("div")
            .class("flash")
            .hidden()
            .change_after(
                Duration::from_millis(150),
                StatePatch::new().visible(true).text("Welcome back"),
            ),
    ])
}

#[test]
fn test_login_flow_with_waiter() {
    let page = login_page();
    let waiter = Waiter::new(&page)
        .at_most(Duration::from_secs(2))
        .every(Duration::from_millis(10))
        .unwrap();

    waiter.type_text(&Locator::name("user"), "alice").unwrap();
    waiter.type_text(&Locator::name("password"), "hunter2").unwrap();
    // disabled until 80ms in
    waiter.click(&Locator::id("submit")).unwrap();
    assert!(page.elapsed() >= Duration::from_millis(80));

    assert!(waiter.visible(&Locator::class_name("flash")).unwrap());
    assert_eq!(waiter.text(&Locator::class_name("flash")).unwrap(), "Welcome back");
    assert_eq!(
        waiter.value(&Locator::name("user")).unwrap().as_deref(),
        Some("alice")
    );
}

#[test]
fn test_visibility_returns_visible_handle() {
    let page = FixturePage::new([FixtureElement::new("div")
        .class("late")
        .appear_after(Duration::from_millis(60))]);
    let outcome = poll(
        &page,
        &visibility_of(Scope::Root, Locator::class_name("late")),
        &config(1000, 10),
    )
    .unwrap();
    let handle = outcome.ok().unwrap();
    assert!(handle.is_visible().unwrap());
}

#[test]
fn test_timeout_window() {
    let page = login_page();
    let start = Instant::now();
    let outcome = poll(
        &page,
        &presence_of(Scope::Root, Locator::id("never")),
        &config(200, 50),
    )
    .unwrap();
    let elapsed = start.elapsed();
    match outcome {
        PollOutcome::TimedOut { attempts, .. } => assert!(attempts >= 2),
        PollOutcome::Success(_) => panic!("expected timeout"),
    }
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(350));
}

#[test]
fn test_stale_handle_is_re_resolved() {
    let page = FixturePage::new([FixtureElement::new("div")
        .id("status")
        .text("Saving...")
        .change_after(Duration::from_millis(120), StatePatch::new().text("Saved"))]);
    let reloader = page.clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(40));
        reloader.reload();
    });

    // the wait spans the reload and resolves afresh on every attempt
    let condition = text_to_be_present(Scope::Root, Locator::id("status"), "Saved");
    let outcome = poll(&page, &condition, &config(1000, 10)).unwrap();
    assert!(outcome.is_success());
    assert!(page.elapsed() >= Duration::from_millis(120));
    handle.join().unwrap();

    let before = page.resolve(&Locator::id("status")).unwrap();
    page.reload();
    assert!(before.text().unwrap_err().is_stale());
    assert!(Waiter::with_config(&page, config(200, 10))
        .not_present(before)
        .unwrap());
}

#[test]
fn test_concurrent_polls_are_independent() {
    let page = FixturePage::new([
        FixtureElement::new("div")
            .id("a")
            .appear_after(Duration::from_millis(50)),
        FixtureElement::new("div")
            .id("b")
            .appear_after(Duration::from_millis(100)),
    ]);

    let handles: Vec<_> = ["a", "b", "missing"]
        .into_iter()
        .map(|id| {
            let page = page.clone();
            thread::spawn(move || {
                let waiter = Waiter::with_config(&page, config(400, 10));
                waiter.present(&Locator::id(id)).unwrap()
            })
        })
        .collect();

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, [true, true, false]);
}

#[test]
fn test_fatal_error_surfaces_through_waiter() {
    let page = login_page();
    let err = Waiter::with_config(&page, config(500, 10))
        .click(&Locator::xpath("//button"))
        .unwrap_err();
    assert!(matches!(err, Error::Access(_)));
}

#[test]
fn test_scenario_file_with_include() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("login.yaml"),
        r#"
name: "Login"
params:
  user: { required: true }
wait:
  timeout_ms: 1000
  poll_interval_ms: 10
steps:
  - type: { locator: "name:user", value: "${user}" }
  - click: { locator: "id:submit" }
"#,
    )
    .unwrap();

    let main = dir.path().join("main.yaml");
    fs::write(
        &main,
        r#"
name: "Checkout for ${user}"
params:
  user: { default: "guest" }
wait:
  timeout_ms: 1000
  poll_interval_ms: 10
page:
  - tag: form
    id: login
    children:
      - { tag: input, name: user }
      - tag: button
        id: submit
        text: "Sign in"
        on_click: { attributes: { class: done } }
  - tag: div
    class: flash
    visible: false
    changes:
      - { after_ms: 50, visible: true, text: "Welcome" }
steps:
  - include: { path: "login.yaml", params: { user: "${user}" } }
  - present: { locator: "class:done" }
  - attribute_contains: { locator: "name:user", attribute: value, value: "alice" }
  - text_contains: { locator: "class:flash", text: "Welcome" }
"#,
    )
    .unwrap();

    let params = Params::new().set("user", "alice");
    let config = Config::load_with_params(&main, &params).unwrap();
    assert_eq!(config.name, "Checkout for alice");

    let runner = Runner::new(&config).unwrap();
    let result = runner.run_with_base_path(&config, dir.path()).unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.steps_executed, 4);
}

#[test]
fn test_include_cycle_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.yaml");
    fs::write(
        &path,
        r#"
name: "Loop"
steps:
  - include: { path: "loop.yaml" }
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    let runner = Runner::new(&config).unwrap();
    let result = runner.run_with_base_path(&config, dir.path()).unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("maximum include depth"));
}
