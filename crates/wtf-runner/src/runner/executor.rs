use crate::config::steps::{CheckStep, Expect, Target, WaitOverride};
use crate::config::{Config, Params, Step, WaitSettings};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use wtf_wait::conditions;
use wtf_wait::{
    Accessor, Condition, ErrorKind, FixtureHandle, FixturePage, Locator, PollConfig, PollOutcome,
    Scope, Waiter,
};

/// Maximum include depth to prevent infinite loops.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Context for step execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Base path for resolving relative includes.
    pub base_path: PathBuf,
    /// Current include depth.
    pub include_depth: usize,
    /// Wait timing of the scenario being executed.
    pub wait: WaitSettings,
}

impl ExecutionContext {
    pub fn new(base_path: impl Into<PathBuf>, wait: WaitSettings) -> Self {
        Self {
            base_path: base_path.into(),
            include_depth: 0,
            wait,
        }
    }

    /// Create a child context for an include.
    pub fn child(&self, new_base: impl Into<PathBuf>, wait: WaitSettings) -> Result<Self> {
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(Error::Config(format!(
                "maximum include depth ({}) exceeded",
                MAX_INCLUDE_DEPTH
            )));
        }
        Ok(Self {
            base_path: new_base.into(),
            include_depth: self.include_depth + 1,
            wait,
        })
    }

    /// Resolve a relative path against the base path.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    fn poll_config(&self, wait: &WaitOverride) -> Result<PollConfig> {
        self.wait.with_override(wait).poll_config()
    }

    /// Waiter for `target` with this step's timing. Resolves the parent
    /// element first when the target has one.
    fn waiter<'p>(
        &self,
        page: &'p FixturePage,
        target: &Target,
        wait: &WaitOverride,
    ) -> Result<Waiter<'p, FixturePage>> {
        let waiter = Waiter::with_config(page, self.poll_config(wait)?);
        match target.parent() {
            Some(parent) => {
                let handle = waiter.find(&parent)?;
                Ok(waiter.within(handle))
            }
            None => Ok(waiter),
        }
    }
}

/// What a check actually saw.
#[derive(Debug)]
enum Observed<T> {
    Success(T),
    Timeout,
    Fatal(String),
}

impl<T> Observed<T> {
    fn matches(&self, expect: Expect) -> bool {
        matches!(
            (self, expect),
            (Observed::Success(_), Expect::Success)
                | (Observed::Timeout, Expect::Timeout)
                | (Observed::Fatal(_), Expect::Fatal)
        )
    }
}

impl<T> fmt::Display for Observed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Observed::Success(_) => f.write_str("success"),
            Observed::Timeout => f.write_str("timeout"),
            Observed::Fatal(e) => write!(f, "fatal error ({})", e),
        }
    }
}

fn observe<T>(
    waiter: &Waiter<'_, FixturePage>,
    condition: &Condition<'_, FixturePage, T>,
) -> Result<Observed<T>> {
    match waiter.until(condition) {
        Ok(PollOutcome::Success(v)) => Ok(Observed::Success(v)),
        Ok(PollOutcome::TimedOut { .. }) => Ok(Observed::Timeout),
        Err(wtf_wait::Error::Access(e)) => Ok(Observed::Fatal(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

fn compare<T>(description: &str, observed: Observed<T>, expect: Expect) -> Result<Observed<T>> {
    if !observed.matches(expect) {
        return Err(Error::StepFailed(format!(
            "waiting for {}: expected {}, got {}",
            description, expect, observed
        )));
    }
    debug!("{}: {}", description, observed);
    Ok(observed)
}

/// Look up a check's parent element.
///
/// For absence checks one attempt is enough: a parent that is not there now
/// means the target is not there either.
fn lookup_parent(
    waiter: &Waiter<'_, FixturePage>,
    parent: &Locator,
    once: bool,
) -> Result<Observed<FixtureHandle>> {
    if !once {
        return observe(waiter, &conditions::presence_of(Scope::Root, parent.clone()));
    }
    Ok(match waiter.accessor().resolve(parent) {
        Ok(handle) => Observed::Success(handle),
        Err(e) if e.kind() == ErrorKind::Fatal => {
            warn!("treating parent {} as absent: {}", parent, e);
            Observed::Fatal(e.to_string())
        }
        Err(e) => {
            debug!("parent {} not resolved: {}", parent, e);
            Observed::Timeout
        }
    })
}

/// Build a condition in the target's scope, run it and compare with `expect`.
///
/// When the target's parent cannot be resolved, `absent` is the outcome for
/// checks that succeed on a missing element. Other checks report the parent
/// lookup's timeout or fatal error.
fn run_check<'c, T>(
    page: &FixturePage,
    ctx: &ExecutionContext,
    target: &Target,
    wait: &WaitOverride,
    expect: Expect,
    absent: Option<T>,
    build: impl FnOnce(Scope<FixtureHandle>, Locator) -> Condition<'c, FixturePage, T>,
) -> Result<Observed<T>> {
    let mut waiter = Waiter::with_config(page, ctx.poll_config(wait)?);
    if let Some(parent) = target.parent() {
        let lookup = lookup_parent(&waiter, &parent, absent.is_some())?;
        let observed = match lookup {
            Observed::Success(handle) => {
                waiter = waiter.within(handle);
                None
            }
            Observed::Timeout => Some(Observed::Timeout),
            Observed::Fatal(e) => Some(Observed::Fatal(e)),
        };
        if let Some(observed) = observed {
            let observed = match absent {
                Some(value) => Observed::Success(value),
                None => observed,
            };
            return compare(&format!("parent {} of {}", parent, target.locator()), observed, expect);
        }
    }
    let condition = build(waiter.scope().clone(), target.locator());
    let observed = observe(&waiter, &condition)?;
    compare(condition.description(), observed, expect)
}

fn simple_check<'c, T>(
    page: &FixturePage,
    ctx: &ExecutionContext,
    step: &CheckStep,
    build: impl FnOnce(Scope<FixtureHandle>, Locator) -> Condition<'c, FixturePage, T>,
) -> Result<()> {
    run_check(page, ctx, &step.target, &step.wait, step.expect, None, build)?;
    Ok(())
}

/// Execute a single step against the page.
pub fn execute_with_context(
    page: &FixturePage,
    step: &Step,
    ctx: &ExecutionContext,
) -> Result<()> {
    match step {
        Step::Present(s) => simple_check(page, ctx, s, conditions::presence_of::<FixturePage>)?,
        Step::Visible(s) => simple_check(page, ctx, s, conditions::visibility_of::<FixturePage>)?,
        Step::Invisible(s) => {
            run_check(
                page,
                ctx,
                &s.target,
                &s.wait,
                s.expect,
                Some(true),
                conditions::invisibility_of::<FixturePage>,
            )?;
        }
        Step::Clickable(s) => {
            simple_check(page, ctx, s, conditions::element_to_be_clickable::<FixturePage>)?
        }
        Step::Selected(s) => {
            simple_check(page, ctx, s, conditions::element_to_be_selected::<FixturePage>)?
        }
        Step::NotSelected(s) => {
            simple_check(page, ctx, s, conditions::element_not_selected::<FixturePage>)?
        }
        Step::TextContains(s) => {
            run_check(page, ctx, &s.target, &s.wait, s.expect, None, |scope, locator| {
                conditions::text_to_be_present::<FixturePage>(scope, locator, s.text.as_str())
            })?;
        }
        Step::TextAbsent(s) => {
            run_check(page, ctx, &s.target, &s.wait, s.expect, Some(true), |scope, locator| {
                conditions::text_to_be_absent::<FixturePage>(scope, locator, s.text.as_str())
            })?;
        }
        Step::AttributeContains(s) => {
            run_check(page, ctx, &s.target, &s.wait, s.expect, None, |scope, locator| {
                conditions::attribute_to_contain::<FixturePage>(
                    scope,
                    locator,
                    s.attribute.as_str(),
                    s.value.as_str(),
                )
            })?;
        }
        Step::AllPresent(s) => {
            let observed = run_check(
                page,
                ctx,
                &s.target,
                &s.wait,
                s.expect,
                None,
                conditions::presence_of_all::<FixturePage>,
            )?;
            if let (Observed::Success(found), Some(count)) = (observed, s.count) {
                if found.len() != count {
                    return Err(Error::AssertionFailed(format!(
                        "expected {} elements matching {}, found {}",
                        count,
                        s.target,
                        found.len()
                    )));
                }
            }
        }
        Step::Click(s) => {
            info!("click: {}", s.target);
            ctx.waiter(page, &s.target, &s.wait)?.click(&s.target.locator())?;
        }
        Step::Type(s) => {
            info!("type: {} into {}", s.value, s.target);
            ctx.waiter(page, &s.target, &s.wait)?
                .type_text(&s.target.locator(), &s.value)?;
        }
        Step::Clear(s) => {
            debug!("clear: {}", s.target);
            ctx.waiter(page, &s.target, &s.wait)?.clear(&s.target.locator())?;
        }
        Step::Select(s) => {
            let waiter = ctx.waiter(page, &s.target, &s.wait)?;
            let select = s.target.locator();
            if let Some(ref text) = s.text {
                waiter.select_option_by_text(&select, text)?;
            } else if let Some(index) = s.index {
                waiter.select_option_at(&select, index)?;
            } else if s.random {
                let index = waiter.select_random_option(&select)?;
                debug!("select: picked option {} of {}", index, s.target);
            } else {
                return Err(Error::Config("select: nothing to select".into()));
            }
        }
        Step::Reload => {
            debug!("reload");
            page.reload();
        }
        Step::Sleep(s) => {
            debug!("sleep: {}ms", s.ms);
            std::thread::sleep(std::time::Duration::from_millis(s.ms));
        }
        Step::Log(s) => {
            info!("{}", s.message);
        }
        Step::AssertText(s) => {
            let text = ctx.waiter(page, &s.target, &s.wait)?.text(&s.target.locator())?;
            if !text.contains(&s.text) {
                return Err(Error::AssertionFailed(format!(
                    "text '{}' not found in {} (was '{}')",
                    s.text, s.target, text
                )));
            }
            debug!("assert_text: '{}' found in {}", s.text, s.target);
        }
        Step::Repeat(r) => {
            debug!("repeat: {} times", r.times);
            for i in 0..r.times {
                debug!("repeat iteration {}/{}", i + 1, r.times);
                for step in &r.steps {
                    execute_with_context(page, step, ctx)?;
                }
            }
        }
        Step::Include(inc) => {
            let path = ctx.resolve_path(&inc.path);
            info!("include: {}", path.display());

            let params: Params = inc
                .params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();

            let included = Config::load_with_params(&path, &params).map_err(|e| {
                Error::Config(format!("failed to load include '{}': {}", path.display(), e))
            })?;
            if !included.page.is_empty() {
                debug!("include: ignoring page of '{}'", included.name);
            }

            let child_base = path.parent().unwrap_or(Path::new("."));
            let child_ctx = ctx.child(child_base, included.wait.clone())?;

            for step in &included.steps {
                execute_with_context(page, step, &child_ctx)?;
            }
        }
    }
    Ok(())
}
