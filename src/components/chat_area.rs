use yew::prelude::*;
use web_sys::{HtmlElement, HtmlTextAreaElement};

use crate::models::{Message, Role};
use crate::utils::render_markdown;

#[derive(Properties, PartialEq)]
pub struct ChatAreaProps {
    pub messages: Vec<Message>,
    pub in_flight: bool,
    pub scroll_generation: u64,
    pub error: Option<String>,
    pub on_send: Callback<String>,
    pub on_dismiss_error: Callback<()>,
}

#[function_component(ChatArea)]
pub fn chat_area(props: &ChatAreaProps) -> Html {
    let input_text = use_state(String::new);
    let scroll_ref = use_node_ref();

    // Track if the user is currently at the bottom of the chat
    let is_at_bottom = use_state(|| true);

    // Auto-scroll on every scroll request while the user follows the stream
    {
        let div_ref = scroll_ref.clone();
        let is_at_bottom_val = *is_at_bottom;
        use_effect_with(props.scroll_generation, move |_| {
            if is_at_bottom_val {
                if let Some(div) = div_ref.cast::<HtmlElement>() {
                    div.set_scroll_top(div.scroll_height());
                }
            }
        });
    }

    let on_scroll = {
        let is_at_bottom = is_at_bottom.clone();
        Callback::from(move |e: Event| {
            let div: HtmlElement = e.target_unchecked_into();
            let distance_from_bottom = div.scroll_height() - div.scroll_top() - div.client_height();
            let currently_at_bottom = distance_from_bottom < 35;

            if *is_at_bottom != currently_at_bottom {
                is_at_bottom.set(currently_at_bottom);
            }
        })
    };

    let submit = {
        let text = input_text.clone();
        let on_send = props.on_send.clone();
        let is_at_bottom = is_at_bottom.clone();
        let in_flight = props.in_flight;
        Callback::from(move |_: ()| {
            if in_flight || text.trim().is_empty() {
                return;
            }
            on_send.emit((*text).clone());
            text.set(String::new());
            is_at_bottom.set(true);
        })
    };

    let on_submit = {
        let submit = submit.clone();
        Callback::from(move |e: SubmitEvent| {
            e.prevent_default();
            submit.emit(());
        })
    };

    let on_keydown = {
        let submit = submit.clone();
        Callback::from(move |e: KeyboardEvent| {
            if e.key() == "Enter" && !e.shift_key() {
                e.prevent_default();
                submit.emit(());
            }
        })
    };

    let on_input = {
        let text = input_text.clone();
        Callback::from(move |e: InputEvent| {
            let area: HtmlTextAreaElement = e.target_unchecked_into();
            text.set(area.value());
        })
    };

    let css = r#"
        .chat-scroll { flex-grow: 1; overflow-y: auto; padding: 20px 0; }
        .chat-column { max-width: 760px; margin: 0 auto; padding: 0 20px; }
        .msg { padding: 12px 16px; border-radius: 8px; margin-bottom: 12px; }
        .msg.user { background: var(--bg-user); white-space: pre-wrap; margin-left: 15%; }
        .msg.assistant { background: var(--bg-assistant); }
        .typing { color: var(--text-secondary); font-style: italic; }
        .empty-chat { color: var(--text-secondary); text-align: center; margin-top: 20vh; }
        .error-banner { display: flex; justify-content: space-between; align-items: flex-start; gap: 10px; background: #fef2f2; color: var(--danger-color); border: 1px solid var(--danger-color); border-radius: 6px; padding: 10px 14px; margin: 0 auto 10px; max-width: 720px; font-size: 0.9rem; }
        .error-banner button { background: none; border: none; color: inherit; cursor: pointer; font-size: 1.1rem; line-height: 1; }
        .input-bar { border-top: 1px solid var(--border-color); padding: 14px 20px; }
        .input-form { max-width: 760px; margin: 0 auto; display: flex; gap: 10px; align-items: flex-end; }
        .input-form textarea { flex-grow: 1; resize: none; height: 60px; padding: 10px; border: 1px solid var(--border-color); border-radius: 8px; font-family: inherit; font-size: 0.95rem; }
        .input-form textarea:disabled { background: #f7f7f7; }
    "#;

    let last_index = props.messages.len().saturating_sub(1);

    html! {
        <>
            <style>{ css }</style>
            <div class="chat-scroll" ref={scroll_ref} onscroll={on_scroll}>
                <div class="chat-column">
                    if props.messages.is_empty() {
                        <div class="empty-chat">{ "Send a message to start a new conversation." }</div>
                    }
                    { for props.messages.iter().enumerate().map(|(i, msg)| {
                        match msg.role {
                            Role::User => html! { <div class="msg user">{ &msg.content }</div> },
                            Role::Assistant if msg.content.is_empty() && props.in_flight && i == last_index => html! {
                                <div class="msg assistant typing">{ "Thinking…" }</div>
                            },
                            Role::Assistant => html! { <div class="msg assistant">{ render_markdown(&msg.content) }</div> },
                        }
                    })}
                </div>
            </div>

            if let Some(error) = &props.error {
                <div class="error-banner" role="alert">
                    <span>{ error }</span>
                    <button title="Dismiss" onclick={props.on_dismiss_error.reform(|_| ())}>{ "×" }</button>
                </div>
            }

            <div class="input-bar">
                <form class="input-form" onsubmit={on_submit}>
                    <textarea
                        placeholder={ if props.in_flight { "Waiting for the reply…" } else { "Type a message (Shift+Enter for a new line)" } }
                        value={(*input_text).clone()}
                        oninput={on_input}
                        onkeydown={on_keydown}
                        disabled={props.in_flight}
                    />
                    <button class="btn btn-primary" type="submit" disabled={props.in_flight || input_text.trim().is_empty()}>
                        { "Send" }
                    </button>
                </form>
            </div>
        </>
    }
}
