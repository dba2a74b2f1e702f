use regex::{Captures, Regex};
use std::sync::LazyLock;

static TOKEN_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"mapboxgl\.accessToken\s*=\s*[^;\n]*;?").expect("valid token pattern")
});

static BODY_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<body(?:\s[^>]*)?>").expect("valid body pattern"));

/// Embeds the Mapbox access token into the animation document.
///
/// The first existing `mapboxgl.accessToken = ...;` assignment is rewritten in
/// place and any later ones are dropped; otherwise a script setting it is inserted right after `<body>`. Without a
/// configured key the document is returned untouched.
pub fn assemble_page(html: &str, mapbox_key: Option<&str>) -> String {
    let Some(key) = mapbox_key.filter(|k| !k.is_empty()) else {
        return html.to_string();
    };

    let assignment = format!("mapboxgl.accessToken = {};", js_string(key));

    if TOKEN_ASSIGNMENT.is_match(html) {
        let mut first = true;
        return TOKEN_ASSIGNMENT
            .replace_all(html, |_: &Captures| {
                if std::mem::take(&mut first) {
                    assignment.clone()
                } else {
                    String::new()
                }
            })
            .into_owned();
    }

    let script = format!("<script>{}</script>", assignment);
    match BODY_OPEN.find(html) {
        Some(tag) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..tag.end()]);
            out.push_str(&script);
            out.push_str(&html[tag.end()..]);
            out
        }
        None => format!("{}{}", script, html),
    }
}

fn js_string(value: &str) -> String {
    // A JSON string literal is a valid JS string literal; `</` is split so the
    // value cannot close the surrounding script element.
    serde_json::Value::String(value.to_string())
        .to_string()
        .replace("</", "<\\/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(doc: &str) -> usize {
        doc.matches("mapboxgl.accessToken").count()
    }

    #[test]
    fn injects_after_body_tag() {
        let html = r#"<html><head></head><body class="x"><div id="map"></div></body></html>"#;
        let out = assemble_page(html, Some("pk.abc"));
        assert!(out.contains(
            r#"<body class="x"><script>mapboxgl.accessToken = "pk.abc";</script><div id="map">"#
        ));
        assert_eq!(count(&out), 1);
    }

    #[test]
    fn replaces_existing_assignment() {
        let html = "<body><script>\nmapboxgl.accessToken = 'old-token';\nnew mapboxgl.Map({});\n</script></body>";
        let out = assemble_page(html, Some("pk.new"));
        assert_eq!(count(&out), 1);
        assert!(out.contains(r#"mapboxgl.accessToken = "pk.new";"#));
        assert!(!out.contains("old-token"));
        assert!(out.contains("new mapboxgl.Map({});"));
    }

    #[test]
    fn duplicate_assignments_collapse_to_one() {
        let html = "<body><script>mapboxgl.accessToken = 'a';\nmapboxgl.accessToken = 'b';\nrun();</script></body>";
        let out = assemble_page(html, Some("pk.k"));
        assert_eq!(count(&out), 1);
        assert!(out.contains(r#"<script>mapboxgl.accessToken = "pk.k";"#));
        assert!(out.contains("run();"));
    }

    #[test]
    fn second_application_keeps_one_assignment_with_latest_value() {
        let html = "<html><body><p>hi</p></body></html>";
        let first = assemble_page(html, Some("pk.first"));
        let second = assemble_page(&first, Some("pk.second"));
        assert_eq!(count(&second), 1);
        assert!(second.contains(r#""pk.second""#));
        assert!(!second.contains("pk.first"));
    }

    #[test]
    fn without_key_document_is_unchanged() {
        let html = "<body>mapboxgl.accessToken = 'x';</body>";
        assert_eq!(assemble_page(html, None), html);
        assert_eq!(assemble_page(html, Some("")), html);
    }

    #[test]
    fn without_body_tag_script_is_prepended() {
        let out = assemble_page("<div></div>", Some("pk"));
        assert!(out.starts_with(r#"<script>mapboxgl.accessToken = "pk";</script>"#));
    }

    #[test]
    fn key_is_escaped_and_dollar_signs_survive() {
        let out = assemble_page("<body></body>", Some(r#"a"b$1</script>"#));
        assert!(out.contains(r#"mapboxgl.accessToken = "a\"b$1<\/script>";"#));
    }

    #[test]
    fn body_prefixed_tags_are_not_mistaken_for_body() {
        let html = "<bodyguard></bodyguard><BODY>";
        let out = assemble_page(html, Some("pk"));
        assert!(out.ends_with(r#"<BODY><script>mapboxgl.accessToken = "pk";</script>"#));
    }
}
