use std::fmt::Write;

use crate::config::Config;
use crate::prefetch::{poster_url, poster_urls};
use crate::util::escape_html;

use super::session::Session;
use super::types::ShuffleForm;

const SHUFFLE_LABEL: &str = "Shuffle to a random movie recommendation";

/// Render the whole page for one visit. Output is plain HTML; the only
/// motion is a CSS fade on the freshly picked item.
pub fn render_page(config: &Config, session: &Session) -> String {
    let site = &config.site;
    let display = &config.display;
    let title = escape_html(&site.title);

    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<meta name=\"theme-color\" content=\"#ffffff\">\n");
    let _ = writeln!(html, "<title>{}</title>", title);
    let _ = writeln!(
        html,
        "<meta name=\"description\" content=\"{}\">",
        escape_html(&site.description)
    );
    if let Some(ref base_url) = site.base_url {
        let base = base_url.trim_end_matches('/');
        let _ = writeln!(html, "<link rel=\"canonical\" href=\"{}/\">", escape_html(base));
        let _ = writeln!(
            html,
            "<meta property=\"og:url\" content=\"{}/\">",
            escape_html(base)
        );
    }
    let _ = writeln!(html, "<meta property=\"og:title\" content=\"{}\">", title);
    if display.preload_posters {
        for url in poster_urls(&session.catalog, display.poster_width, display.poster_quality) {
            let _ = writeln!(
                html,
                "<link rel=\"prefetch\" as=\"image\" href=\"{}\">",
                escape_html(&url)
            );
        }
    }
    html.push_str("<style>\n");
    html.push_str(&stylesheet(display.transition_ms));
    html.push_str("</style>\n</head>\n<body>\n<main>\n");

    // Masthead
    let _ = writeln!(
        html,
        "<header><h1><img class=\"logo\" src=\"/assets/logo.png\" alt=\"{}\"></h1>{}</header>",
        title,
        powered_by(config, "powered-mobile")
    );

    html.push_str("<div class=\"content\">\n");
    match session.current_item() {
        None => html.push_str("<div class=\"notice\">No movies found</div>\n"),
        Some(item) => {
            let poster = poster_url(&item.poster_url, display.poster_width, display.poster_quality);
            let _ = write!(
                html,
                concat!(
                    "<div class=\"movie\" data-id=\"{id}\">\n",
                    "<div class=\"poster\"><img src=\"{poster}\" alt=\"{title} poster\"></div>\n",
                    "<div class=\"details\">\n",
                    "<h2>{title}</h2>\n",
                    "<p class=\"director\"><span>Director:</span> {director}</p>\n",
                    "<p class=\"description\">{description}</p>\n",
                    "</div>\n</div>\n"
                ),
                id = item.id,
                poster = escape_html(&poster),
                title = escape_html(&item.title),
                director = escape_html(&item.director),
                description = escape_html(&item.display_description()),
            );
        }
    }
    html.push_str("</div>\n");

    html.push_str(&powered_by(config, "powered-desktop"));
    html.push_str(&shuffle_form(session));
    html.push_str("</main>\n</body>\n</html>\n");
    html
}

fn powered_by(config: &Config, class: &str) -> String {
    match config.site.powered_by_url {
        Some(ref url) => format!(
            "<a class=\"{}\" href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\"><img src=\"/assets/poweredby.png\" alt=\"Powered by\"></a>\n",
            class,
            escape_html(url)
        ),
        None => String::new(),
    }
}

fn shuffle_form(session: &Session) -> String {
    let form = ShuffleForm::from_state(&session.state);
    let mut html = String::from("<form class=\"shuffle\" method=\"get\" action=\"/shuffle\">\n");
    for (name, value) in [
        ("size", form.size),
        ("current", form.current),
        ("unseen", form.unseen),
    ] {
        if let Some(value) = value {
            let _ = writeln!(
                html,
                "<input type=\"hidden\" name=\"{}\" value=\"{}\">",
                name,
                escape_html(&value)
            );
        }
    }
    let _ = writeln!(
        html,
        "<button type=\"submit\" aria-label=\"{}\"><img src=\"/assets/button.png\" alt=\"Shuffle\"><img class=\"hover\" src=\"/assets/button-hover.png\" alt=\"\"></button>",
        SHUFFLE_LABEL
    );
    html.push_str("</form>\n");
    html
}

fn stylesheet(transition_ms: u64) -> String {
    format!(
        r#"html,body{{margin:0;height:100%;font-family:Georgia,serif;color:#fff}}
main{{position:relative;height:100dvh;overflow:hidden;display:flex;flex-direction:column;align-items:center;padding:12px 16px 0;box-sizing:border-box;background:#222 url(/assets/background.png) center/cover no-repeat}}
header{{text-align:center;margin-bottom:16px}}
header .logo{{height:56px;width:auto}}
.content{{flex:1;display:flex;align-items:center;justify-content:center;padding-bottom:96px}}
.notice{{font-size:1.125rem}}
.movie{{display:flex;flex-direction:column;align-items:center;gap:12px;max-width:48rem;width:100%;animation:fade-in {ms}ms ease-in-out}}
.poster{{height:40vh;aspect-ratio:2/3}}
.poster img{{width:100%;height:100%;object-fit:cover}}
.details{{text-align:center}}
.details h2{{font-size:1.875rem;margin:0;line-height:1.2}}
.director span{{font-style:italic}}
.description{{max-width:24rem}}
.shuffle{{position:absolute;bottom:0;left:50%;transform:translateX(-50%);line-height:0;margin:0}}
.shuffle button{{position:relative;cursor:pointer;padding:0;border:0;background:none}}
.shuffle img{{display:block;height:11rem;width:auto;transition:opacity 200ms}}
.shuffle img.hover{{position:absolute;inset:0;opacity:0}}
.shuffle button:hover img{{opacity:0}}
.shuffle button:hover img.hover{{opacity:1}}
.powered-desktop{{display:none;position:absolute;bottom:16px;right:16px;opacity:.7}}
.powered-mobile img{{height:24px;opacity:.7}}
@keyframes fade-in{{from{{opacity:0}}to{{opacity:1}}}}
@media (min-width:768px){{
header{{margin-bottom:48px}}
header .logo{{height:80px}}
.content{{padding-bottom:160px}}
.movie{{flex-direction:row;gap:32px}}
.poster{{height:auto;width:280px}}
.details{{text-align:left}}
.shuffle img{{height:14rem}}
.powered-mobile{{display:none}}
.powered-desktop{{display:block}}
.powered-desktop img{{height:80px}}
}}
"#,
        ms = transition_ms
    )
}
