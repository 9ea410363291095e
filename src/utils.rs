use pulldown_cmark::{Parser, Options, html, Event as MdEvent};
use yew::{Html, AttrValue};

pub fn set_panic_hook() {
    // Routes panics to the browser console instead of "unreachable executed".
    console_error_panic_hook::set_once();
}

pub fn render_markdown(text: &str) -> Html {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(text, options).map(|event| match event {
        MdEvent::SoftBreak => MdEvent::HardBreak,
        // raw HTML from the model is shown as text, never injected
        MdEvent::Html(raw) => MdEvent::Text(raw),
        _ => event,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    let styled_html = format!(r#"<div class="markdown-body">{}</div>"#, html_output);
    Html::from_html_unchecked(AttrValue::from(styled_html))
}
