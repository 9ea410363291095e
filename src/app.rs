use std::rc::Rc;

use yew::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::components::{
    chat_area::ChatArea,
    settings::{ConnectionTestResult, SettingsModal},
    sidebar::{ConversationSummary, Sidebar, SidebarGroup},
};
use crate::models::ModelSettings;
use crate::services::chat_session::{ChatSession, SystemClock, BUILD_DEFAULT_API_KEY};
use crate::services::llm::{HttpTransport, LlmService};
use crate::services::storage::browser_storage;

const GLOBAL_STYLES: &str = r#"
    :root {
        --bg-app: #ffffff;
        --bg-sidebar: #f9f9f9;
        --bg-user: #f4f4f4;
        --bg-assistant: #ffffff;
        --border-color: #e5e5e5;
        --text-primary: #333;
        --text-secondary: #666;
        --accent-color: #10a37f;
        --accent-hover: #1a7f64;
        --danger-color: #ef4444;
    }

    * { box-sizing: border-box; }
    body { margin: 0; font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; color: var(--text-primary); }

    .app-container { display: flex; height: 100vh; overflow: hidden; }
    .main-content { flex-grow: 1; display: flex; flex-direction: column; position: relative; background: var(--bg-app); min-width: 0; }
    .header { padding: 10px 20px; border-bottom: 1px solid var(--border-color); display: flex; justify-content: space-between; align-items: center; height: 60px; }
    .header h2 { font-size: 1rem; margin: 0; font-weight: 600; overflow: hidden; white-space: nowrap; text-overflow: ellipsis; max-width: 500px; }

    .btn { cursor: pointer; border: 1px solid var(--border-color); background: white; padding: 8px 12px; border-radius: 6px; font-size: 0.9rem; transition: all 0.2s; color: var(--text-primary); }
    .btn:hover { background: #f0f0f0; }
    .btn:disabled { opacity: 0.5; cursor: default; }
    .btn-primary { background: var(--accent-color); color: white; border-color: transparent; }
    .btn-primary:hover { background: var(--accent-hover); }
    .btn-danger { color: var(--danger-color); border-color: var(--danger-color); }
    .btn-danger:hover { background: #fef2f2; }
    .btn-icon { border: none; background: transparent; font-size: 1.2rem; padding: 5px; color: var(--text-secondary); cursor: pointer; }
    .btn-icon:hover { background: rgba(0,0,0,0.05); color: var(--text-primary); }

    .form-input { width: 100%; padding: 8px; border: 1px solid var(--border-color); border-radius: 6px; font-family: inherit; margin-bottom: 10px; }
    .form-input:focus { outline: 2px solid var(--accent-color); border-color: transparent; }

    .markdown-body { line-height: 1.6; font-size: 1rem; }
    .markdown-body pre { background: #2d2d2d; color: #fff; padding: 15px; border-radius: 6px; overflow-x: auto; }
    .markdown-body code { background: #f4f4f4; padding: 2px 4px; border-radius: 4px; font-family: monospace; font-size: 0.9em; }
    .markdown-body pre code { background: transparent; color: inherit; }
    .markdown-body p { margin-top: 0; margin-bottom: 1em; }
"#;

fn confirm(message: &str) -> bool {
    web_sys::window()
        .and_then(|w| w.confirm_with_message(message).ok())
        .unwrap_or(false)
}

fn prompt(message: &str, default: &str) -> Option<String> {
    web_sys::window()?
        .prompt_with_message_and_default(message, default)
        .ok()
        .flatten()
}

#[function_component(App)]
pub fn app() -> Html {
    let session = use_memo((), |_| {
        ChatSession::new(browser_storage(), Rc::new(HttpTransport::new()), Rc::new(SystemClock))
            .with_fallback_api_key(BUILD_DEFAULT_API_KEY)
    });
    let refresh = use_force_update();

    let sidebar_open = use_state(|| true);
    // first run has no configuration yet, so open the settings right away
    let show_settings = use_state(|| !session.effective_settings().is_complete());
    let testing = use_state(|| false);
    let test_result = use_state(|| None as ConnectionTestResult);

    // --- EFFECTS ---
    {
        let session = session.clone();
        use_effect_with((), move |_| {
            session.set_observer(move || refresh.force_update());
        });
    }

    let state = session.state();
    let groups: Vec<SidebarGroup> = state
        .conversations
        .grouped(&chrono::Local::now())
        .into_iter()
        .map(|(bucket, members)| SidebarGroup {
            label: bucket.label(),
            conversations: members
                .into_iter()
                .map(|c| ConversationSummary {
                    id: c.id.clone(),
                    title: c.title.clone(),
                    last_message: c.last_message.clone(),
                })
                .collect(),
        })
        .collect();
    let title = state
        .active_conversation()
        .map(|c| c.title.clone())
        .unwrap_or_else(|| "New Chat".to_string());
    let active_id = state.active_id.clone();
    let settings = state.settings.clone();
    let messages = state.messages.clone();
    let error = state.error.clone();
    let (in_flight, scroll_generation) = (state.in_flight, state.scroll_generation);
    drop(state);

    // --- ACTIONS ---

    let on_send = {
        let session = session.clone();
        Callback::from(move |text: String| {
            let session = session.clone();
            spawn_local(async move {
                if let Err(err) = session.send(&text).await {
                    tracing::debug!(error = %err, "send ended with error");
                }
            });
        })
    };

    let on_new_chat = {
        let session = session.clone();
        Callback::from(move |_: ()| session.create_new_conversation())
    };

    let on_select_chat = {
        let session = session.clone();
        Callback::from(move |id: String| session.select_conversation(&id))
    };

    let on_rename_chat = {
        let session = session.clone();
        Callback::from(move |id: String| {
            let current = session
                .state()
                .conversations
                .get(&id)
                .map(|c| c.title.clone())
                .unwrap_or_default();
            if let Some(new_title) = prompt("Rename conversation", &current) {
                if !session.rename_conversation(&id, &new_title) {
                    tracing::debug!(conversation = %id, "rename rejected");
                }
            }
        })
    };

    let on_delete_chat = {
        let session = session.clone();
        Callback::from(move |id: String| {
            if confirm("Delete this conversation? This cannot be undone.") {
                session.delete_conversation(&id);
            }
        })
    };

    let on_clear_all_chats = {
        let session = session.clone();
        Callback::from(move |_: ()| {
            if confirm("Irreversibly delete ALL chat history?") {
                session.clear_conversations();
            }
        })
    };

    let on_dismiss_error = {
        let session = session.clone();
        Callback::from(move |_: ()| session.dismiss_error())
    };

    let on_settings_save = {
        let session = session.clone();
        let show_settings = show_settings.clone();
        let test_result = test_result.clone();
        Callback::from(move |settings: ModelSettings| {
            session.update_settings(settings);
            test_result.set(None);
            show_settings.set(false);
        })
    };

    let on_test_connection = {
        let session = session.clone();
        let testing = testing.clone();
        let test_result = test_result.clone();
        Callback::from(move |draft: ModelSettings| {
            let transport = session.transport();
            let testing = testing.clone();
            let test_result = test_result.clone();
            testing.set(true);
            spawn_local(async move {
                let settings = draft.with_fallback_key(BUILD_DEFAULT_API_KEY);
                let outcome = LlmService::test_connection(&*transport, &settings)
                    .await
                    .map_err(|e| e.to_string());
                test_result.set(Some(outcome));
                testing.set(false);
            });
        })
    };

    let close_settings = {
        let show_settings = show_settings.clone();
        Callback::from(move |_: ()| show_settings.set(false))
    };

    let toggle_settings = show_settings.clone();
    let toggle_sidebar = sidebar_open.clone();

    html! {
        <>
            <style>{ GLOBAL_STYLES }</style>
            <div class="app-container">
                <Sidebar
                    open={*sidebar_open}
                    groups={groups}
                    active_id={active_id}
                    on_select={on_select_chat}
                    on_new={on_new_chat}
                    on_rename={on_rename_chat}
                    on_delete={on_delete_chat}
                />

                <div class="main-content">
                    <div class="header">
                        <div style="display: flex; gap: 10px; align-items: center; min-width: 0;">
                            <button class="btn-icon" onclick={Callback::from(move |_: MouseEvent| toggle_sidebar.set(!*toggle_sidebar))} title="Toggle Menu">
                                <svg width="24" height="24" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round"><line x1="3" y1="12" x2="21" y2="12"></line><line x1="3" y1="6" x2="21" y2="6"></line><line x1="3" y1="18" x2="21" y2="18"></line></svg>
                            </button>
                            <h2>{ title }</h2>
                        </div>
                        <button class="btn-icon" onclick={Callback::from(move |_: MouseEvent| toggle_settings.set(!*toggle_settings))} title="Settings">{ "⚙" }</button>
                    </div>

                    if *show_settings {
                        <SettingsModal
                            settings={settings}
                            testing={*testing}
                            test_result={(*test_result).clone()}
                            on_save={on_settings_save}
                            on_test={on_test_connection}
                            on_close={close_settings}
                            on_clear_chats={on_clear_all_chats}
                        />
                    }

                    <ChatArea
                        messages={messages}
                        in_flight={in_flight}
                        scroll_generation={scroll_generation}
                        error={error}
                        on_send={on_send}
                        on_dismiss_error={on_dismiss_error}
                    />
                </div>
            </div>
        </>
    }
}
