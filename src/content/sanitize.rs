use scraper::{ElementRef, Html, Node};

use crate::util::{collapse_whitespace, strip_control_chars};

/// Post-formatting tags kept by [`sanitize_html`]. Anything else is unwrapped
/// (its children survive) unless it is listed in [`DROPPED_TAGS`].
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "blockquote", "br", "caption", "cite", "code", "dd", "del", "div", "dl",
    "dt", "em", "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img",
    "ins", "li", "mark", "ol", "p", "pre", "q", "s", "small", "span", "strong", "sub", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

/// Tags removed together with everything inside them.
const DROPPED_TAGS: &[&str] = &[
    "applet", "base", "button", "embed", "form", "frame", "frameset", "head", "iframe", "input",
    "link", "math", "meta", "noscript", "object", "script", "select", "style", "svg", "template",
    "textarea", "title",
];

const VOID_TAGS: &[&str] = &["br", "hr", "img"];

/// Tags that separate words when flattening to plain text.
const BLOCK_TAGS: &[&str] = &[
    "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure", "h1", "h2", "h3", "h4",
    "h5", "h6", "hr", "li", "ol", "p", "pre", "table", "td", "th", "tr", "ul",
];

const URL_ATTRS: &[&str] = &["href", "src", "cite"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto"];

fn allowed_attrs(tag: &str) -> &'static [&'static str] {
    match tag {
        "a" => &["href", "title", "target", "rel"],
        "img" => &["src", "alt", "title", "width", "height"],
        "blockquote" | "q" | "del" | "ins" => &["cite"],
        "td" | "th" => &["colspan", "rowspan"],
        "abbr" => &["title"],
        _ => &[],
    }
}

/// Reduces untrusted HTML to an allow-list of post-formatting markup.
///
/// Scripts, styles, frames and form controls are removed with their content.
/// Unknown tags are unwrapped. Only allow-listed attributes survive, and URL
/// attributes must be relative or use http, https or mailto.
///
/// # Examples
///
/// ```
/// use feedpress::content::sanitize_html;
///
/// let html = r#"<p onclick="x()">Hi <script>alert(1)</script><b>there</b></p>"#;
/// assert_eq!(sanitize_html(html), "<p>Hi <b>there</b></p>");
/// ```
pub fn sanitize_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut out);
    out
}

/// Flattens HTML to whitespace-collapsed plain text, dropping script/style
/// content and treating block elements as word separators.
pub fn plain_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut out);
    collapse_whitespace(&out)
}

/// Turns a feed title into the single-line plain text used for publishing
/// and duplicate detection.
pub fn sanitize_title(raw: &str) -> String {
    let text = plain_text(raw);
    collapse_whitespace(&strip_control_chars(&text))
}

/// Escapes text for use inside a double-quoted attribute value.
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_text(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => escape_text(&text.text, out),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(element, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let tag = element.value().name();

    if DROPPED_TAGS.contains(&tag) {
        return;
    }
    if !ALLOWED_TAGS.contains(&tag) {
        write_children(element, out);
        return;
    }

    out.push('<');
    out.push_str(tag);
    for &name in allowed_attrs(tag) {
        let Some(value) = element.value().attr(name) else {
            continue;
        };
        if URL_ATTRS.contains(&name) && !is_safe_url(value) {
            continue;
        }
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');

    if VOID_TAGS.contains(&tag) {
        return;
    }

    write_children(element, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn collect_text(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(_) => {
                let Some(element) = ElementRef::wrap(child) else {
                    continue;
                };
                let tag = element.value().name();
                if DROPPED_TAGS.contains(&tag) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&tag);
                if block {
                    out.push(' ');
                }
                collect_text(element, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Relative URLs pass; absolute ones need a safe scheme. Whitespace and
/// control characters are ignored when reading the scheme, as browsers do.
fn is_safe_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();

    let scheme_end = compact.find(':');
    let path_start = compact.find(&['/', '?', '#'][..]);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => {
            let scheme = compact[..colon].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        (None, _) => true,
    }
}
