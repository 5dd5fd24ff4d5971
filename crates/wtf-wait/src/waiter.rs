use crate::access::{Accessor, Handle, Interact, Scope};
use crate::conditions;
use crate::{poll, Condition, Error, Locator, PollConfig, PollOutcome, Result};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

/// Call-site helpers bound to one accessor, one [`PollConfig`] and an
/// optional parent scope.
///
/// Boolean checks return `Ok(false)` on timeout. Lookups and interactions
/// turn a timeout into [`Error::Timeout`].
pub struct Waiter<'a, A: Accessor + ?Sized> {
    accessor: &'a A,
    config: PollConfig,
    scope: Scope<A::Handle>,
}

impl<'a, A: Accessor + ?Sized> Waiter<'a, A> {
    pub fn new(accessor: &'a A) -> Self {
        Self::with_config(accessor, PollConfig::default())
    }

    pub fn with_config(accessor: &'a A, config: PollConfig) -> Self {
        Self {
            accessor,
            config,
            scope: Scope::Root,
        }
    }

    /// A waiter with the same config that resolves below `parent`.
    pub fn within(&self, parent: A::Handle) -> Self {
        Self {
            accessor: self.accessor,
            config: self.config.clone(),
            scope: Scope::Within(parent),
        }
    }

    pub fn at_most(mut self, timeout: Duration) -> Self {
        self.config = self.config.at_most(timeout);
        self
    }

    pub fn every(mut self, poll_interval: Duration) -> Result<Self> {
        self.config = self.config.every(poll_interval)?;
        Ok(self)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Where this waiter resolves locators.
    pub fn scope(&self) -> &Scope<A::Handle> {
        &self.scope
    }

    pub fn accessor(&self) -> &'a A {
        self.accessor
    }

    /// Poll `condition`. Only fatal accessor errors are `Err`.
    pub fn until<T>(&self, condition: &Condition<'_, A, T>) -> Result<PollOutcome<T>> {
        Ok(poll(self.accessor, condition, &self.config)?)
    }

    /// Poll `condition`, turning a timeout into [`Error::Timeout`].
    pub fn require<T>(&self, condition: &Condition<'_, A, T>) -> Result<T> {
        self.until(condition)?
            .into_result(condition.description(), self.config.timeout())
    }

    fn check(&self, condition: Condition<'_, A, bool>) -> Result<bool> {
        Ok(self.until(&condition)?.is_success())
    }

    pub fn find(&self, locator: &Locator) -> Result<A::Handle> {
        self.require(&conditions::presence_of(self.scope.clone(), locator.clone()))
    }

    pub fn find_all(&self, locator: &Locator) -> Result<Vec<A::Handle>> {
        self.require(&conditions::presence_of_all(self.scope.clone(), locator.clone()))
    }

    pub fn present(&self, locator: &Locator) -> Result<bool> {
        let found = self.until(&conditions::presence_of(self.scope.clone(), locator.clone()))?;
        Ok(found.is_success())
    }

    pub fn visible(&self, locator: &Locator) -> Result<bool> {
        let found = self.until(&conditions::visibility_of(self.scope.clone(), locator.clone()))?;
        Ok(found.is_success())
    }

    pub fn invisible(&self, locator: &Locator) -> Result<bool> {
        self.check(conditions::invisibility_of(self.scope.clone(), locator.clone()))
    }

    pub fn selected(&self, locator: &Locator) -> Result<bool> {
        self.check(conditions::element_to_be_selected(self.scope.clone(), locator.clone()))
    }

    pub fn not_selected(&self, locator: &Locator) -> Result<bool> {
        self.check(conditions::element_not_selected(self.scope.clone(), locator.clone()))
    }

    pub fn text_present(&self, locator: &Locator, text: &str) -> Result<bool> {
        self.check(conditions::text_to_be_present(self.scope.clone(), locator.clone(), text))
    }

    pub fn text_not_present(&self, locator: &Locator, text: &str) -> Result<bool> {
        self.check(conditions::text_to_be_absent(self.scope.clone(), locator.clone(), text))
    }

    pub fn attribute_value_present(
        &self,
        locator: &Locator,
        attribute: &str,
        value: &str,
    ) -> Result<bool> {
        self.check(conditions::attribute_to_contain(
            self.scope.clone(),
            locator.clone(),
            attribute,
            value,
        ))
    }

    /// Wait until `handle` goes stale.
    pub fn not_present(&self, handle: A::Handle) -> Result<bool> {
        self.check(conditions::staleness_of(handle))
    }

    pub fn text(&self, locator: &Locator) -> Result<String> {
        Ok(self.find(locator)?.text()?)
    }

    pub fn attribute_value(&self, locator: &Locator, attribute: &str) -> Result<Option<String>> {
        Ok(self.find(locator)?.attribute(attribute)?)
    }

    /// The `value` attribute, as form fields report it.
    pub fn value(&self, locator: &Locator) -> Result<Option<String>> {
        self.attribute_value(locator, "value")
    }
}

impl<'a, A> Waiter<'a, A>
where
    A: Accessor + ?Sized,
    A::Handle: Interact,
{
    pub fn click(&self, locator: &Locator) -> Result<()> {
        let element = self.require(&conditions::element_to_be_clickable(
            self.scope.clone(),
            locator.clone(),
        ))?;
        debug!("clicking {}", locator);
        Ok(element.click()?)
    }

    pub fn type_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let visible = conditions::visibility_of(self.scope.clone(), locator.clone());
        let element = self.require(&visible)?;
        debug!("typing into {}", locator);
        Ok(element.send_keys(text)?)
    }

    pub fn clear(&self, locator: &Locator) -> Result<()> {
        let visible = conditions::visibility_of(self.scope.clone(), locator.clone());
        let element = self.require(&visible)?;
        Ok(element.clear()?)
    }

    fn options(&self, select: &Locator) -> Result<Vec<A::Handle>> {
        Ok(self.find(select)?.resolve_all(&Locator::tag_name("option"))?)
    }

    /// Click the first option whose text is exactly `text`.
    pub fn select_option_by_text(&self, select: &Locator, text: &str) -> Result<()> {
        for option in self.options(select)? {
            if option.text()? == text {
                info!("selecting '{}' in {}", text, select);
                return Ok(option.click()?);
            }
        }
        Err(Error::OptionNotFound(format!("'{}' in {}", text, select)))
    }

    pub fn select_option_at(&self, select: &Locator, index: usize) -> Result<()> {
        let options = self.options(select)?;
        let option = options.get(index).ok_or_else(|| {
            Error::OptionNotFound(format!(
                "index {} in {} ({} options)",
                index,
                select,
                options.len()
            ))
        })?;
        info!("selecting option {} in {}", index, select);
        Ok(option.click()?)
    }

    /// Click a random option, skipping the first (usually a placeholder)
    /// unless it is the only one. Returns the chosen index.
    pub fn select_random_option(&self, select: &Locator) -> Result<usize> {
        let options = self.options(select)?;
        click_random(options, select)
    }

    /// Same as [`select_random_option`](Self::select_random_option) over
    /// every element matching `items`, for menus that are not `<select>`s.
    pub fn select_random_from_list(&self, items: &Locator) -> Result<usize> {
        let options = self.find_all(items)?;
        click_random(options, items)
    }
}

fn click_random<H: Interact>(options: Vec<H>, from: &Locator) -> Result<usize> {
    if options.is_empty() {
        return Err(Error::NoOptions(from.to_string()));
    }
    let index = random_index(1, options.len());
    info!("selecting random option {} of {} in {}", index, options.len(), from);
    options[index].click()?;
    Ok(index)
}

/// Uniform in `[min, max)`. An empty range yields `max - 1` (0 at worst).
pub fn random_index(min: usize, max: usize) -> usize {
    if min >= max {
        return max.saturating_sub(1);
    }
    rand::rng().random_range(min..max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{FixtureElement, FixturePage, StatePatch};

    fn quick(page: &FixturePage) -> Waiter<'_, FixturePage> {
        Waiter::new(page)
            .at_most(Duration::from_millis(300))
            .every(Duration::from_millis(10))
            .unwrap()
    }

    fn form() -> FixturePage {
        FixturePage::new([FixtureElement::new("form").id("signup").children([
            FixtureElement::new("input").name("email"),
            FixtureElement::new("select").id("color").children([
                FixtureElement::new("option").text("Pick a color").selected(true),
                FixtureElement::new("option").text("Red"),
                FixtureElement::new("option").text("Blue"),
            ]),
            FixtureElement::new("select").id("empty"),
            FixtureElement::new("select")
                .id("single")
                .child(FixtureElement::new("option").text("Only")),
            FixtureElement::new("button")
                .id("submit")
                .text("Send")
                .on_click(StatePatch::new().text("Sent")),
        ])])
    }

    #[test]
    fn random_index_bounds() {
        for _ in 0..100 {
            let i = random_index(1, 4);
            assert!((1..4).contains(&i));
        }
        assert_eq!(random_index(1, 1), 0);
        assert_eq!(random_index(0, 0), 0);
        assert_eq!(random_index(5, 3), 2);
    }

    #[test]
    fn boolean_checks() {
        let page = form();
        let w = quick(&page);
        assert!(w.present(&Locator::id("submit")).unwrap());
        assert!(w.visible(&Locator::id("submit")).unwrap());
        assert!(!w.invisible(&Locator::id("submit")).unwrap());
        assert!(w.text_present(&Locator::id("submit"), "Sen").unwrap());
        assert!(w.text_not_present(&Locator::id("submit"), "Se").unwrap());
        assert!(!w.present(&Locator::id("missing")).unwrap());
    }

    #[test]
    fn fatal_errors_propagate() {
        let page = form();
        let err = quick(&page).visible(&Locator::css("#submit")).unwrap_err();
        assert!(matches!(err, Error::Access(_)));
    }

    #[test]
    fn find_times_out_with_description() {
        let page = form();
        let err = quick(&page).find(&Locator::id("missing")).unwrap_err();
        match err {
            Error::Timeout { condition, timeout, last_error } => {
                assert_eq!(condition, "presence of element located by id:missing");
                assert_eq!(timeout, Duration::from_millis(300));
                assert!(last_error.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn click_and_read_back() {
        let page = form();
        let w = quick(&page);
        w.click(&Locator::id("submit")).unwrap();
        assert_eq!(w.text(&Locator::id("submit")).unwrap(), "Sent");
    }

    #[test]
    fn type_and_clear() {
        let page = form();
        let w = quick(&page);
        let email = Locator::name("email");
        w.type_text(&email, "me@example.com").unwrap();
        assert_eq!(w.value(&email).unwrap().as_deref(), Some("me@example.com"));
        assert!(w.attribute_value_present(&email, "value", "example").unwrap());
        w.clear(&email).unwrap();
        assert_eq!(w.value(&email).unwrap().as_deref(), Some(""));
    }

    #[test]
    fn select_by_text_and_index() {
        let page = form();
        let w = quick(&page);
        let color = Locator::id("color");

        w.select_option_by_text(&color, "Blue").unwrap();
        let options = page.resolve_all(&Locator::tag_name("option")).unwrap();
        assert!(options[2].is_selected().unwrap());
        assert!(!options[0].is_selected().unwrap());

        w.select_option_at(&color, 1).unwrap();
        assert!(options[1].is_selected().unwrap());
        assert!(!options[2].is_selected().unwrap());

        assert!(matches!(
            w.select_option_by_text(&color, "Green"),
            Err(Error::OptionNotFound(_))
        ));
        assert!(matches!(w.select_option_at(&color, 9), Err(Error::OptionNotFound(_))));
    }

    #[test]
    fn select_random_skips_placeholder() {
        let page = form();
        let w = quick(&page);
        for _ in 0..20 {
            let index = w.select_random_option(&Locator::id("color")).unwrap();
            assert!(index == 1 || index == 2);
        }
        assert_eq!(w.select_random_option(&Locator::id("single")).unwrap(), 0);
        assert!(matches!(
            w.select_random_option(&Locator::id("empty")),
            Err(Error::NoOptions(_))
        ));
    }

    #[test]
    fn select_random_from_list() {
        let page = FixturePage::new([FixtureElement::new("ul").children([
            FixtureElement::new("li").class("menu").text("Home"),
            FixtureElement::new("li").class("menu").text("About"),
        ])]);
        let index = quick(&page).select_random_from_list(&Locator::class_name("menu")).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn scoped_waiter() {
        let page = form();
        let w = quick(&page);
        let form = w.find(&Locator::id("signup")).unwrap();
        let inner = w.within(form);
        assert!(inner.present(&Locator::id("submit")).unwrap());
        assert_eq!(inner.config().timeout(), Duration::from_millis(300));
    }

    #[test]
    fn not_present_after_reload() {
        let page = form();
        let w = quick(&page);
        let button = w.find(&Locator::id("submit")).unwrap();
        page.reload();
        assert!(w.not_present(button).unwrap());
    }

    #[test]
    fn selection_checks() {
        let page = form();
        let w = quick(&page).within(page.resolve(&Locator::id("color")).unwrap());
        let first = Locator::tag_name("option");
        assert!(w.selected(&first).unwrap());
        w.click(&Locator::tag_name("option")).unwrap();
        assert!(!w.not_selected(&first).unwrap());
    }
}
