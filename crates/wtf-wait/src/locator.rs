//! Locators - opaque descriptors for zero or more elements.

use std::fmt;

/// How to find elements. Mirrors the strategies a WebDriver understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// `id:main` - by element id
    Id(String),
    /// `class:button1` - by a single class name
    ClassName(String),
    /// `tag:option` - by tag name
    TagName(String),
    /// `name:email` - by the `name` attribute
    Name(String),
    /// `link:Sign in` - anchor whose visible text matches exactly
    LinkText(String),
    /// `css:form > button` - CSS selector
    Css(String),
    /// `xpath://div[@id='x']` - XPath expression
    XPath(String),
}

impl Locator {
    pub fn id(v: impl Into<String>) -> Self {
        Locator::Id(v.into())
    }

    pub fn class_name(v: impl Into<String>) -> Self {
        Locator::ClassName(v.into())
    }

    pub fn tag_name(v: impl Into<String>) -> Self {
        Locator::TagName(v.into())
    }

    pub fn name(v: impl Into<String>) -> Self {
        Locator::Name(v.into())
    }

    pub fn link_text(v: impl Into<String>) -> Self {
        Locator::LinkText(v.into())
    }

    pub fn css(v: impl Into<String>) -> Self {
        Locator::Css(v.into())
    }

    pub fn xpath(v: impl Into<String>) -> Self {
        Locator::XPath(v.into())
    }

    /// Parse `strategy:value`. Unprefixed strings are treated as CSS.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let Some((prefix, value)) = s.split_once(':') else {
            return Locator::Css(s.into());
        };
        let value = value.trim();
        match prefix {
            "id" => Locator::Id(value.into()),
            "class" => Locator::ClassName(value.into()),
            "tag" => Locator::TagName(value.into()),
            "name" => Locator::Name(value.into()),
            "link" => Locator::LinkText(value.into()),
            "css" => Locator::Css(value.into()),
            "xpath" => Locator::XPath(value.into()),
            // `a:hover`, `input:checked` and friends are plain CSS
            _ => Locator::Css(s.into()),
        }
    }

    /// Short strategy name, as used in the `strategy:value` form.
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Id(_) => "id",
            Locator::ClassName(_) => "class",
            Locator::TagName(_) => "tag",
            Locator::Name(_) => "name",
            Locator::LinkText(_) => "link",
            Locator::Css(_) => "css",
            Locator::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Locator::Id(v)
            | Locator::ClassName(v)
            | Locator::TagName(v)
            | Locator::Name(v)
            | Locator::LinkText(v)
            | Locator::Css(v)
            | Locator::XPath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy(), self.value())
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::parse(s)
    }
}
