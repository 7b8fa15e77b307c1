use banzai::filters::autolink::Autolink;
use banzai::filters::emoji::Emoji;
use banzai::filters::sanitization::Profile;
use banzai::filters::source::{floor_char_boundary, truncate_source};
use banzai::result::RenderResult;
use banzai::{Context, Document, Pipeline, PipelineKind, RenderConfig, Services};
use proptest::prelude::*;

const HOSTILE_PIECES: &[&str] = &[
    "<script>alert(1)</script>",
    "<a href=\"javascript:alert(1)\">",
    "<a href=\" JaVa\tScRiPt:alert(1)\">",
    "<a href=\"vbscript:x\">",
    "</a>",
    "<img src=\"data:image/png;base64,AAAA\" onerror=\"alert(1)\">",
    "<img src=\"http://example.com/a.png\">",
    "<iframe src=\"http://evil\"></iframe>",
    "<div onclick=\"x\" class=\"c\">",
    "</div>",
    "<svg><a xlink:href=\"javascript:1\">x</a></svg>",
    "<style>p{}</style>",
    "<span style=\"background-color: red; position: fixed\">",
    "</span>",
    "<p id=\"main\">",
    "<input type=\"text\" value=\"x\">",
    "<table><tr><td style=\"text-align: left\">cell",
    "<details open><summary>s</summary>",
    "<form action=\"/x\">",
    "<math><mi>x</mi></math>",
    "<!-- comment -->",
    "# heading",
    "[link](javascript:alert(1))",
    "![img](http://example.com/i.png)",
    "http://example.com/",
    "@alice #12 ~bug",
    ":smile:",
    "$`a^2`$",
    "\n\n",
    "plain text ",
];

const BENIGN_WORDS: &[&str] = &[
    ":smile:", ":tada:", "http://example.com/a", "https://gitlab.com/x?y=1", "plain", "words", ":not_an_emoji:",
    "x:y", "a.b",
];

fn hostile_input() -> impl Strategy<Value = String> {
    return prop::collection::vec(prop::sample::select(HOSTILE_PIECES), 0..12).prop_map(|pieces| pieces.concat());
}

fn unscoped_context() -> Context {
    return Context {
        skip_project_check: true,
        ..Context::default()
    };
}

fn unsafe_url(value: &str) -> bool {
    let normalized: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    return ["javascript:", "vbscript:", "data:"].iter().any(|s| normalized.starts_with(s));
}

/// Every element and attribute in `html` is on `profile`'s allow-list and
/// no URL attribute carries a script scheme.
fn assert_allow_listed(html: &str, profile: Profile) {
    let doc = Document::parse(html);
    for node in doc.descendants(Document::ROOT) {
        let Some(element) = doc.element(node) else {
            continue;
        };
        assert!(profile.allows_element(&element.name), "<{}> in {html}", element.name);
        for (attr, value) in &element.attrs {
            assert!(profile.allows_attribute(&element.name, attr), "{attr} on <{}> in {html}", element.name);
            assert!(!attr.starts_with("on"), "{attr} in {html}");
            if matches!(attr.as_str(), "href" | "src" | "data-src" | "data-canonical-src") {
                assert!(!unsafe_url(value), "{attr}={value} in {html}");
            }
        }
    }
}

proptest! {
    #[test]
    fn sanitized_output_is_allow_listed(input in hostile_input()) {
        for kind in [PipelineKind::Full, PipelineKind::PlainMarkdown] {
            let pipeline = Pipeline::for_kind(kind, RenderConfig::default());
            let rendered = pipeline.call(&input, &unscoped_context(), &Services::default()).unwrap();
            assert_allow_listed(&rendered.html, Profile::Broad);
        }
        for kind in [PipelineKind::Description, PipelineKind::SingleLine] {
            let pipeline = Pipeline::for_kind(kind, RenderConfig::default());
            let rendered = pipeline.call(&input, &unscoped_context(), &Services::default()).unwrap();
            assert_allow_listed(&rendered.html, Profile::Minimal);
        }
    }

    #[test]
    fn post_processing_hostile_html_is_allow_listed(input in hostile_input()) {
        let pipeline = Pipeline::for_kind(PipelineKind::PostProcess, RenderConfig::default());
        let rendered = pipeline.call(&input, &Context::default(), &Services::default()).unwrap();
        assert_allow_listed(&rendered.html, Profile::Broad);
    }

    #[test]
    fn truncation_never_splits_a_character(text in "\\PC{0,40}", limit in 0_usize..64) {
        let mut result = RenderResult::default();
        let out = truncate_source(&text, limit, &mut result);
        if text.len() <= limit {
            prop_assert_eq!(&out, &text);
            prop_assert!(!result.truncated);
        } else {
            let prefix = floor_char_boundary(&text, limit);
            prop_assert!(prefix.len() <= limit);
            prop_assert!(text.starts_with(prefix));
            prop_assert_eq!(out, format!("{prefix}..."));
            prop_assert!(result.truncated);
        }
    }

    #[test]
    fn text_filters_are_idempotent(words in prop::collection::vec(prop::sample::select(BENIGN_WORDS), 1..10)) {
        let pipeline = Pipeline::builder(PipelineKind::PostProcess)
            .filter(Emoji)
            .filter(Autolink)
            .sanitize(Profile::Broad, RenderConfig::default());
        let input = format!("<p>{}</p>", words.join(" "));

        let once = pipeline.call(&input, &Context::default(), &Services::default()).unwrap().html;
        let twice = pipeline.call(&once, &Context::default(), &Services::default()).unwrap().html;
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn heading_anchors_are_unique(count in 1_usize..6) {
        let markdown = "## Same\n\n".repeat(count);
        let pipeline = Pipeline::for_kind(PipelineKind::Full, RenderConfig::default());
        let html = pipeline.call(&markdown, &unscoped_context(), &Services::default()).unwrap().html;

        prop_assert!(html.contains("id=\"user-content-same\""), "{}", html);
        for n in 1..count {
            let id = format!("id=\"user-content-same-{n}\"");
            prop_assert!(html.contains(&id), "{}", html);
        }
        prop_assert_eq!(html.matches("id=\"user-content-same").count(), count);
    }
}
