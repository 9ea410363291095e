use yew::prelude::*;
use web_sys::HtmlInputElement;
use wasm_bindgen_futures::spawn_local;

use crate::models::ModelSettings;
use crate::services::chat_session::BUILD_DEFAULT_API_KEY;
use crate::services::llm::LlmService;

/// Outcome of the last connection test: `Ok(reply)` or `Err(banner text)`.
pub type ConnectionTestResult = Option<Result<String, String>>;

#[derive(Properties, PartialEq, Clone)]
pub struct SettingsProps {
    pub settings: ModelSettings,
    pub testing: bool,
    pub test_result: ConnectionTestResult,
    pub on_save: Callback<ModelSettings>,
    pub on_test: Callback<ModelSettings>,
    pub on_close: Callback<()>,
    pub on_clear_chats: Callback<()>,
}

#[derive(Clone, Copy)]
enum Field {
    Name,
    BaseUrl,
    ApiKey,
}

#[function_component(SettingsModal)]
pub fn settings_modal(props: &SettingsProps) -> Html {
    let draft = use_state(|| props.settings.clone());
    let available_models = use_state(Vec::<String>::new);
    let error_msg = use_state(String::new);

    let on_field = |field: Field| {
        let draft = draft.clone();
        Callback::from(move |e: InputEvent| {
            let input: HtmlInputElement = e.target_unchecked_into();
            let mut next = (*draft).clone();
            match field {
                Field::Name => next.name = input.value(),
                Field::BaseUrl => next.base_url = input.value(),
                Field::ApiKey => next.api_key = input.value(),
            }
            draft.set(next);
        })
    };

    let on_fetch = {
        let draft = draft.clone();
        let models = available_models.clone();
        let err = error_msg.clone();
        Callback::from(move |_: MouseEvent| {
            let settings = (*draft).clone();
            let models = models.clone();
            let err = err.clone();
            spawn_local(async move {
                match LlmService::fetch_models(&settings, BUILD_DEFAULT_API_KEY).await {
                    Ok(ids) => {
                        err.set(String::new());
                        models.set(ids);
                    }
                    Err(e) => err.set(format!("Could not load models: {e:#}")),
                }
            });
        })
    };

    let on_pick_model = {
        let draft = draft.clone();
        Callback::from(move |e: MouseEvent| {
            let button: web_sys::HtmlElement = e.target_unchecked_into();
            let mut next = (*draft).clone();
            next.name = button.inner_text();
            draft.set(next);
        })
    };

    let on_save_click = {
        let draft = draft.clone();
        let cb = props.on_save.clone();
        Callback::from(move |_: MouseEvent| cb.emit((*draft).clone()))
    };

    let on_test_click = {
        let draft = draft.clone();
        let cb = props.on_test.clone();
        Callback::from(move |_: MouseEvent| cb.emit((*draft).clone()))
    };

    let on_clear_click = {
        let cb = props.on_clear_chats.clone();
        Callback::from(move |_: MouseEvent| cb.emit(()))
    };

    let css = r#"
        .settings-backdrop { position: absolute; top: 0; left: 0; width: 100%; height: 100%; background: rgba(255,255,255,0.6); backdrop-filter: blur(2px); z-index: 99; cursor: pointer; }
        .settings-panel { position: absolute; top: 60px; right: 20px; width: 360px; background: white; border: 1px solid var(--border-color); border-radius: 8px; box-shadow: 0 10px 15px -3px rgba(0, 0, 0, 0.1); padding: 20px; z-index: 100; display: flex; flex-direction: column; gap: 12px; }
        .settings-header { display: flex; justify-content: space-between; align-items: center; border-bottom: 1px solid var(--border-color); padding-bottom: 10px; margin-bottom: 5px; }
        .settings-header h3 { margin: 0; font-size: 1.1rem; }
        .close-btn { background: none; border: none; font-size: 1.5rem; line-height: 1; cursor: pointer; color: var(--text-secondary); padding: 0 5px; }
        .close-btn:hover { color: var(--text-primary); }
        .form-label { display: block; font-size: 0.85rem; font-weight: 600; margin-bottom: 5px; color: var(--text-secondary); }
        .fetch-group { display: flex; gap: 8px; }
        .model-chips { display: flex; flex-wrap: wrap; gap: 6px; margin-top: 6px; }
        .model-chip { border: 1px solid var(--border-color); background: #fafafa; border-radius: 12px; padding: 2px 10px; font-size: 0.8rem; cursor: pointer; }
        .actions { display: flex; flex-direction: column; gap: 8px; }
        .test-ok { color: var(--accent-color); font-size: 0.85rem; }
        .test-err { color: var(--danger-color); font-size: 0.85rem; }
    "#;

    html! {
        <>
            <style>{ css }</style>
            <div class="settings-backdrop" onclick={props.on_close.reform(|_| ())}></div>

            <div class="settings-panel">
                <div class="settings-header">
                    <h3>{ "Model Settings" }</h3>
                    <button class="close-btn" onclick={props.on_close.reform(|_| ())} title="Close">{"×"}</button>
                </div>

                <div>
                    <label class="form-label">{ "Base URL" }</label>
                    <input class="form-input" type="url" placeholder="https://api.example.com/v1" value={draft.base_url.clone()} oninput={on_field(Field::BaseUrl)} />
                </div>

                <div>
                    <label class="form-label">{ "API Key" }</label>
                    <input class="form-input" type="password" autocomplete="off" value={draft.api_key.clone()} oninput={on_field(Field::ApiKey)} />
                </div>

                <div>
                    <label class="form-label">{ "Model" }</label>
                    <div class="fetch-group">
                        <input class="form-input" type="text" placeholder="model name" value={draft.name.clone()} oninput={on_field(Field::Name)} style="margin-bottom:0;" />
                        <button class="btn" onclick={on_fetch} title="Load available models">{ "⟳" }</button>
                    </div>
                    if !available_models.is_empty() {
                        <div class="model-chips">
                            { for available_models.iter().map(|m| html! {
                                <button class="model-chip" onclick={on_pick_model.clone()}>{ m }</button>
                            })}
                        </div>
                    }
                </div>

                <div class="actions">
                    <button class="btn btn-primary" onclick={on_save_click}>{ "Save" }</button>
                    <button class="btn" onclick={on_test_click} disabled={props.testing}>
                        { if props.testing { "Testing…" } else { "Test Connection" } }
                    </button>
                    {
                        match &props.test_result {
                            Some(Ok(reply)) => html! { <div class="test-ok">{ format!("Connected. Model replied: {reply}") }</div> },
                            Some(Err(message)) => html! { <div class="test-err">{ message }</div> },
                            None => html! {},
                        }
                    }
                    <hr style="width: 100%; border: 0; border-top: 1px solid var(--border-color);" />
                    <button class="btn btn-danger" onclick={on_clear_click}>{ "Delete All Chats" }</button>
                </div>
                if !error_msg.is_empty() { <div class="test-err">{ &*error_msg }</div> }
            </div>
        </>
    }
}
