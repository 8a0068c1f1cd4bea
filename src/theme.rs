//! Presentation payloads injected around converter output.
//!
//! Centralising the theme here keeps both routes consistent and lets unit
//! tests inspect the exact bytes handed to the browser or to LuaLaTeX.
//!
//! * HTML route: [`wrap`] turns pandoc's body fragment into a standalone page
//!   carrying the Atom One Dark stylesheet ([`DEFAULT_STYLESHEET`]) and the
//!   MathJax loader. Callers can replace the stylesheet through
//!   [`crate::config::ConversionConfig::stylesheet`].
//! * LaTeX route: [`latex_header`] declares the emoji font family and the
//!   `\emojiChar` macro that the fallback filter emits.

/// Atom One Dark palette, injected verbatim into the `<head>`.
pub const DEFAULT_STYLESHEET: &str = r#"<style>
    @import url('https://fonts.googleapis.com/css2?family=JetBrains+Mono:wght@400;700&family=Nunito:wght@400;700&display=swap');

    :root {
        --black: #181a1f;
        --bg0: #282c34;
        --bg1: #31353f;
        --bg2: #393f4a;
        --bg3: #3b3f4c;
        --bg-d: #21252b;
        --bg-blue: #73b8f1;
        --bg-yellow: #ebd09c;
        --fg: #abb2bf;
        --purple: #c678dd;
        --green: #98c379;
        --orange: #d19a66;
        --blue: #61afef;
        --yellow: #e5c07b;
        --cyan: #56b6c2;
        --red: #e86671;
        --grey: #5c6370;
        --light-grey: #848b98;
        --dark-cyan: #2b6f77;
        --dark-red: #993939;
        --dark-yellow: #93691d;
        --dark-purple: #8a3fa0;
    }

    @page { margin: 0; }

    body {
        background-color: var(--bg0);
        color: var(--fg);
        font-family: 'Roboto', sans-serif;
        line-height: 1.6;
        padding: 2rem;
        max-width: 800px;
        margin: 0 auto;
    }

    h1, h2, h3, h4, h5, h6 {
        color: var(--blue);
        margin-top: 1.5em;
    }

    h1 { border-bottom: 1px solid var(--bg2); padding-bottom: 0.3em; }

    code {
        font-family: 'JetBrains Mono', monospace;
        background-color: var(--bg1);
        padding: 0.2em 0.4em;
        border-radius: 3px;
        color: var(--green);
    }

    pre {
        background-color: var(--bg1);
        padding: 1em;
        border-radius: 5px;
        overflow-x: auto;
    }

    pre code {
        background-color: transparent;
        padding: 0;
        color: var(--fg);
    }

    a { color: var(--cyan); text-decoration: none; }
    a:hover { text-decoration: underline; }

    blockquote {
        border-left: 4px solid var(--purple);
        padding-left: 1em;
        color: var(--grey);
        margin-left: 0;
    }

    hr {
        border: none;
        border-top: 1px solid var(--bg2);
        margin: 2em 0;
    }

    strong { color: var(--orange); }
    em { color: var(--yellow); }

    ::-webkit-scrollbar { width: 10px; }
    ::-webkit-scrollbar-track { background: var(--bg0); }
    ::-webkit-scrollbar-thumb { background: var(--bg3); border-radius: 5px; }
</style>"#;

/// MathJax loader; pandoc's `--mathjax` output leaves the TeX in place for it.
pub const MATHJAX_SCRIPT: &str =
    r#"<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@4/tex-mml-chtml.js"></script>"#;

/// Compose a standalone HTML document around a pandoc body fragment.
///
/// `stylesheet` is inserted as-is (it should include its own `<style>` tag).
/// The fragment is not validated.
pub fn wrap(body: &str, stylesheet: &str) -> String {
    let mut doc = String::with_capacity(body.len() + stylesheet.len() + 512);
    doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n");
    doc.push_str(stylesheet);
    doc.push('\n');
    doc.push_str(MATHJAX_SCRIPT);
    doc.push_str("\n</head>\n<body>\n");
    doc.push_str(body);
    doc.push_str("\n</body>\n</html>");
    doc
}

/// LaTeX header passed to pandoc with `-H`.
///
/// Disables hyphenation and page numbers, and binds `\emojiChar` to
/// `emoji_font` rendered through HarfBuzz.
pub fn latex_header(emoji_font: &str) -> String {
    format!(
        r"
\hyphenpenalty=10000
\exhyphenpenalty=10000

\pagenumbering{{gobble}}

\usepackage{{fontspec}}
\newfontfamily\emoji{{{emoji_font}}}[Renderer=Harfbuzz]
\newcommand{{\emojiChar}}[1]{{{{\emoji #1}}}}
"
    )
}
