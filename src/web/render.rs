//! Page templates compiled into the binary.
//!
//! Every page is the shared `base.html` shell with a page fragment dropped
//! into `{{BODY}}`. Fragment placeholders are filled by the caller; anything
//! left over is blanked so raw `{{TOKEN}}` markers never reach the browser.

const BASE: &str = include_str!("../templates/base.html");
const INDEX: &str = include_str!("../templates/index.html");
const WAITING: &str = include_str!("../templates/waiting.html");
const RESPONSE: &str = include_str!("../templates/response.html");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Index,
    Waiting,
    Response,
}

impl Page {
    const fn fragment(self) -> &'static str {
        match self {
            Self::Index => INDEX,
            Self::Waiting => WAITING,
            Self::Response => RESPONSE,
        }
    }

    const fn head(self) -> &'static str {
        match self {
            Self::Waiting => r#"<meta http-equiv="refresh" content="1; url=/response">"#,
            _ => "",
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Index => "Segment an image",
            Self::Waiting => "Processing",
            Self::Response => "Result",
        }
    }
}

/// Renders `page`, substituting `(TOKEN, value)` pairs. Values are escaped.
pub fn render_page(page: Page, values: &[(&str, &str)]) -> String {
    let mut body = page.fragment().to_owned();
    for (token, value) in values {
        body = body.replace(&format!("{{{{{token}}}}}"), &html_escape(value));
    }

    let html = BASE
        .replace("{{TITLE}}", page.title())
        .replace("{{HEAD}}", page.head())
        .replace("{{BODY}}", &body);
    blank_remaining(html)
}

fn blank_remaining(mut html: String) -> String {
    while let Some(start) = html.find("{{") {
        match html[start..].find("}}") {
            Some(end) => html.replace_range(start..start + end + 2, ""),
            None => break,
        }
    }
    html
}

pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
