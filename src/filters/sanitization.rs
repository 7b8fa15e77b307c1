//! Allow-list sanitization. Untrusted markup goes in, only allow-listed
//! elements, attributes and URL schemes come out.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Document, NodeId};
use crate::filter::{DeadlineExceeded, Filter, FilterCategory, FilterContext};

/// Substituted for the whole document when sanitization runs out of time.
pub const TIMEOUT_HTML: &str = "<p>Rendering aborted due to complexity issues. If this is valid markdown, \
please feel free to open an issue and attach the original markdown to the issue.</p>";

/// Dropped together with everything inside them. Other disallowed elements
/// are unwrapped so their text survives.
const DROP_WITH_CONTENT: &[&str] = &[
    "embed", "frame", "frameset", "iframe", "math", "noembed", "noscript", "object", "script",
    "style", "svg", "template", "textarea", "title",
];

/// Elements the broad profile keeps.
const BROAD_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdo", "blockquote", "br", "caption", "cite", "code", "dd", "del", "details",
    "dfn", "div", "dl", "dt", "em", "gl-emoji", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i",
    "img", "input", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q", "rp", "rt", "ruby", "s",
    "samp", "section", "small", "span", "strike", "strong", "sub", "summary", "sup", "table",
    "tbody", "td", "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul", "var", "wbr",
];

/// Elements the minimal profile keeps.
const MINIMAL_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "code", "del", "em", "gl-emoji", "i", "img", "kbd", "li",
    "ol", "p", "pre", "s", "span", "strong", "sub", "sup", "ul",
];

/// Attributes allowed on every allow-listed element.
const GLOBAL_ATTRIBUTES: &[&str] = &["dir", "lang", "title"];

/// Attributes allowed per element, on top of [`GLOBAL_ATTRIBUTES`].
const ELEMENT_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &[
        "aria-hidden", "aria-label", "class", "data-commit", "data-footnote-backref", "data-footnote-ref",
        "data-group", "data-issue", "data-label", "data-merge-request", "data-milestone",
        "data-original", "data-project", "data-reference-type", "data-snippet", "data-user", "href",
        "id", "rel", "target",
    ]),
    ("code", &["class", "data-math-style"]),
    ("details", &["open"]),
    ("div", &["class"]),
    ("gl-emoji", &["data-fallback-src", "data-name", "data-unicode-version"]),
    ("img", &["alt", "class", "data-canonical-src", "data-src", "decoding", "height", "src", "width"]),
    ("input", &["checked", "class", "disabled", "type"]),
    ("li", &["class", "id"]),
    ("ol", &["class", "start"]),
    ("pre", &["class", "data-math-style", "lang"]),
    ("section", &["class", "data-footnotes"]),
    ("span", &["class", "data-math-style", "style"]),
    ("sup", &["class", "id"]),
    ("td", &["colspan", "rowspan", "style"]),
    ("th", &["colspan", "rowspan", "style"]),
    ("ul", &["class"]),
];

/// Schemes an `href` may carry. Relative URLs are always allowed.
const HREF_SCHEMES: &[&str] = &["http", "https", "irc", "ircs", "mailto"];

/// Schemes `src` and `data-src` may carry.
const SRC_SCHEMES: &[&str] = &["http", "https"];

/// Prefixes an `id` must start with so user content cannot clobber page ids.
const ID_PREFIXES: &[&str] = &["fn-", "fnref-", "user-content-"];

/// Nodes visited between deadline checks.
const CHECKPOINT_EVERY: usize = 256;

/// Values `color` and `background-color` may take.
#[allow(clippy::expect_used, reason = "pattern is a compile-time constant")]
static COLOR_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:#[0-9A-Fa-f]{3,8}|(?:rgb|rgba|hsl|hsla)\([0-9.,%\s]+\)|[A-Za-z]{3,20})$")
        .expect("valid regex")
});

/// Which allow-list tables apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Fully rendered markdown: tables, headings, details, task lists.
    Broad,
    /// Inline-ish contexts such as descriptions and single-line titles.
    Minimal,
}

impl Profile {
    /// Allowed element names.
    const fn elements(self) -> &'static [&'static str] {
        return match self {
            Self::Broad => BROAD_ELEMENTS,
            Self::Minimal => MINIMAL_ELEMENTS,
        };
    }

    /// Whether `name` may appear in sanitized output.
    pub fn allows_element(self, name: &str) -> bool {
        return self.elements().contains(&name);
    }

    /// Whether attribute `attr` may appear on element `element`.
    pub fn allows_attribute(self, element: &str, attr: &str) -> bool {
        if !self.allows_element(element) {
            return false;
        }
        if GLOBAL_ATTRIBUTES.contains(&attr) {
            return true;
        }
        return ELEMENT_ATTRIBUTES
            .iter()
            .find(|(name, _)| *name == element)
            .is_some_and(|(_, attrs)| attrs.contains(&attr));
    }
}

/// The final stage of every pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Sanitization {
    /// Active allow-list tables.
    profile: Profile,
}

impl Sanitization {
    /// A sanitizer using `profile`'s tables.
    pub const fn new(profile: Profile) -> Self {
        return Self { profile };
    }

    /// The active profile.
    pub const fn profile(&self) -> Profile {
        return self.profile;
    }

    /// Sanitize `doc` in place, checking `deadline` as it goes.
    ///
    /// # Errors
    ///
    /// Returns `DeadlineExceeded` if `check` fails; the document is then
    /// partially sanitized and must not be used.
    pub fn sanitize(
        &self,
        doc: &mut Document,
        mut check: impl FnMut() -> Result<(), DeadlineExceeded>,
    ) -> Result<(), DeadlineExceeded> {
        for (visited, node) in doc.descendants(Document::ROOT).into_iter().enumerate() {
            if visited.is_multiple_of(CHECKPOINT_EVERY) {
                check()?;
            }
            if doc.element(node).is_none() || !doc.is_attached(node) {
                continue;
            }
            self.sanitize_element(doc, node);
        }
        return Ok(());
    }

    /// Drop, unwrap or scrub one element.
    fn sanitize_element(&self, doc: &mut Document, node: NodeId) {
        let Some(name) = doc.tag(node).map(str::to_string) else {
            return;
        };

        if DROP_WITH_CONTENT.contains(&name.as_str()) {
            doc.detach(node);
            return;
        }
        if !self.profile.allows_element(&name) {
            doc.unwrap(node);
            return;
        }
        if name == "input" && doc.attr(node, "type") != Some("checkbox") {
            doc.detach(node);
            return;
        }

        let profile = self.profile;
        doc.filter_attrs(node, |attr, value| {
            if !profile.allows_attribute(&name, attr) {
                return None;
            }
            return clean_attribute(&name, attr, value);
        });
    }
}

impl Filter for Sanitization {
    fn name(&self) -> &'static str {
        return "sanitization";
    }

    fn category(&self) -> FilterCategory {
        return FilterCategory::Sanitize;
    }

    fn call(&self, doc: &mut Document, cx: &mut FilterContext<'_>) -> Result<(), DeadlineExceeded> {
        return self.sanitize(doc, || cx.checkpoint());
    }
}

/// Value-level checks for an attribute that passed the name allow-list.
fn clean_attribute(element: &str, attr: &str, value: &str) -> Option<String> {
    return match attr {
        "href" => safe_url(value, HREF_SCHEMES),
        "src" | "data-src" | "data-canonical-src" | "data-fallback-src" => safe_url(value, SRC_SCHEMES),
        "id" => ID_PREFIXES
            .iter()
            .any(|p| value.starts_with(p))
            .then(|| value.to_string())
            .filter(|v| !v.chars().any(char::is_whitespace)),
        "style" => clean_style(element, value),
        "target" => (value == "_blank").then(|| value.to_string()),
        "type" => (value == "checkbox").then(|| value.to_string()),
        _ => Some(value.to_string()),
    };
}

/// Keep `value` only if its scheme is in `schemes` or it has none.
pub fn safe_url(value: &str, schemes: &[&str]) -> Option<String> {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    let Some(scheme) = url_scheme(&normalized) else {
        return Some(value.to_string());
    };
    if !schemes.contains(&scheme) {
        return None;
    }
    if url::Url::parse(value.trim()).is_err() {
        return None;
    }
    return Some(value.to_string());
}

/// The scheme of a normalized URL, if it has one.
fn url_scheme(normalized: &str) -> Option<&str> {
    let end = normalized.find([':', '/', '?', '#'])?;
    if normalized.as_bytes().get(end) != Some(&b':') {
        return None;
    }
    return normalized.get(..end);
}

/// Reduce a `style` attribute to the properties allowed on `element`.
fn clean_style(element: &str, value: &str) -> Option<String> {
    let kept: Vec<String> = value
        .split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let val = val.trim();
            let ok = match (element, prop.as_str()) {
                ("span", "background-color") => COLOR_VALUE.is_match(val),
                ("td" | "th", "text-align") => matches!(val, "left" | "right" | "center"),
                _ => false,
            };
            return ok.then(|| format!("{prop}: {val}"));
        })
        .collect();

    if kept.is_empty() {
        return None;
    }
    return Some(kept.join("; "));
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::missing_assert_message,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests fail by panicking"
)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sanitize(html: &str, profile: Profile) -> String {
        let mut doc = Document::parse(html);
        Sanitization::new(profile).sanitize(&mut doc, || return Ok(())).unwrap();
        return doc.to_html();
    }

    #[test]
    fn javascript_href_is_stripped_but_tag_kept() {
        assert_eq!(sanitize("<a href=\"javascript:alert(1)\">x</a>", Profile::Broad), "<a>x</a>");
    }

    #[test]
    fn obfuscated_schemes_are_stripped() {
        for href in ["JaVaScRiPt:alert(1)", " java\tscript:alert(1)", "vbscript:x", "data:text/html,x"] {
            let html = format!("<a href=\"{href}\">x</a>");
            assert_eq!(sanitize(&html, Profile::Broad), "<a>x</a>", "{href}");
        }
    }

    #[test]
    fn allowed_schemes_and_relative_urls_survive() {
        for href in ["http://a.test/", "https://a.test/x", "mailto:a@b.test", "irc://irc.test/c", "/a/b", "#frag", "docs/x.md"] {
            let html = format!("<a href=\"{href}\">x</a>");
            assert_eq!(sanitize(&html, Profile::Broad), html, "{href}");
        }
    }

    #[test]
    fn image_sources_limited_to_http() {
        assert_eq!(sanitize("<img src=\"data:image/png;base64,AA\">", Profile::Broad), "<img>");
        assert_eq!(sanitize("<img src=\"irc://x\">", Profile::Broad), "<img>");
        assert_eq!(sanitize("<img src=\"https://a.test/i.png\">", Profile::Broad), "<img src=\"https://a.test/i.png\">");
        assert_eq!(
            sanitize("<gl-emoji data-fallback-src=\"javascript:alert(1)\">x</gl-emoji>", Profile::Broad),
            "<gl-emoji>x</gl-emoji>"
        );
    }

    #[test]
    fn scripts_are_removed_with_content() {
        assert_eq!(sanitize("a<script>alert(1)</script>b", Profile::Broad), "ab");
        assert_eq!(sanitize("<style>p{}</style>c", Profile::Broad), "c");
    }

    #[test]
    fn unknown_elements_are_unwrapped() {
        assert_eq!(sanitize("<font color=\"red\"><b>x</b></font>", Profile::Broad), "<b>x</b>");
    }

    #[test]
    fn event_handlers_and_foreign_ids_are_dropped() {
        assert_eq!(
            sanitize("<a onclick=\"x()\" id=\"main\" href=\"/a\">x</a>", Profile::Broad),
            "<a href=\"/a\">x</a>"
        );
        assert_eq!(
            sanitize("<a id=\"user-content-intro\">x</a>", Profile::Broad),
            "<a id=\"user-content-intro\">x</a>"
        );
    }

    #[test]
    fn style_is_reduced_to_allowed_properties() {
        assert_eq!(
            sanitize("<span style=\"background-color: #aabbcc; position: fixed\">l</span>", Profile::Broad),
            "<span style=\"background-color: #aabbcc\">l</span>"
        );
        assert_eq!(sanitize("<span style=\"background-color: url(x)\">l</span>", Profile::Broad), "<span>l</span>");
        assert_eq!(
            sanitize("<table><tbody><tr><td style=\"text-align: center\">c</td></tr></tbody></table>", Profile::Broad),
            "<table><tbody><tr><td style=\"text-align: center\">c</td></tr></tbody></table>"
        );
    }

    #[test]
    fn minimal_profile_drops_structure() {
        assert_eq!(sanitize("<h1>t</h1><table><tbody><tr><td>c</td></tr></tbody></table>", Profile::Minimal), "tc");
        assert_eq!(sanitize("<h1>t</h1>", Profile::Broad), "<h1>t</h1>");
    }

    #[test]
    fn only_checkbox_inputs_survive() {
        assert_eq!(sanitize("<input type=\"text\" value=\"x\">", Profile::Broad), "");
        assert_eq!(
            sanitize("<input type=\"checkbox\" checked=\"\" disabled=\"\">", Profile::Broad),
            "<input checked=\"\" disabled=\"\" type=\"checkbox\">"
        );
    }

    #[test]
    fn sanitization_is_idempotent() {
        let once = sanitize("<p><a href=\"https://x.test\" class=\"gfm\">y</a><iframe>z</iframe></p>", Profile::Broad);
        assert_eq!(sanitize(&once, Profile::Broad), once);
    }

    #[test]
    fn deadline_propagates() {
        let mut doc = Document::parse("<p>x</p>");
        let err = Sanitization::new(Profile::Broad).sanitize(&mut doc, || Err(DeadlineExceeded));
        assert_eq!(err, Err(DeadlineExceeded));
    }
}
