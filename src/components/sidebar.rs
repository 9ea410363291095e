use yew::prelude::*;

#[derive(Clone, PartialEq, Debug)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub last_message: String,
}

#[derive(Clone, PartialEq, Debug)]
pub struct SidebarGroup {
    pub label: &'static str,
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Properties, PartialEq)]
pub struct SidebarProps {
    pub open: bool,
    pub groups: Vec<SidebarGroup>,
    pub active_id: Option<String>,
    pub on_select: Callback<String>,
    pub on_rename: Callback<String>,
    pub on_delete: Callback<String>,
    pub on_new: Callback<()>,
}

#[function_component(Sidebar)]
pub fn sidebar(props: &SidebarProps) -> Html {
    let width = if props.open { "260px" } else { "0px" };

    let css = r#"
        .sidebar { background: var(--bg-sidebar); border-right: 1px solid var(--border-color); display: flex; flex-direction: column; transition: width 0.3s cubic-bezier(0.25, 0.8, 0.25, 1); overflow: hidden; flex-shrink: 0; }
        .sidebar-content { width: 260px; height: 100%; display: flex; flex-direction: column; padding: 10px; }
        .chat-list { flex-grow: 1; overflow-y: auto; margin-top: 10px; }
        .chat-group-label { font-size: 0.75rem; font-weight: 600; color: var(--text-secondary); text-transform: uppercase; margin: 12px 4px 4px; }
        .chat-item { padding: 8px 10px; border-radius: 6px; cursor: pointer; display: flex; justify-content: space-between; align-items: center; gap: 6px; margin-bottom: 2px; font-size: 0.9rem; color: var(--text-primary); }
        .chat-item:hover { background: #eaeaeb; }
        .chat-item.active { background: #e0e0e0; font-weight: 500; }
        .chat-item .chat-text { min-width: 0; display: flex; flex-direction: column; }
        .chat-item .chat-title, .chat-item .chat-preview { overflow: hidden; text-overflow: ellipsis; white-space: nowrap; }
        .chat-item .chat-preview { font-size: 0.75rem; color: var(--text-secondary); font-weight: normal; }
        .chat-item .item-btn { opacity: 0; border: none; background: none; color: #999; cursor: pointer; padding: 2px 6px; border-radius: 4px; }
        .chat-item:hover .item-btn { opacity: 1; }
        .chat-item .item-btn:hover { background: #dcdcdc; color: var(--text-primary); }
        .chat-item .item-btn.del:hover { color: #d32f2f; }
        .new-chat-btn { width: 100%; padding: 10px; border: 1px solid var(--border-color); background: white; border-radius: 6px; cursor: pointer; text-align: left; display: flex; gap: 10px; transition: background 0.2s; }
        .new-chat-btn:hover { background: #f0f0f0; }
        .empty-list { color: var(--text-secondary); font-size: 0.85rem; padding: 10px 4px; }
    "#;

    let render_item = |chat: &ConversationSummary| {
        let is_active = props.active_id.as_deref() == Some(chat.id.as_str());
        let active_class = if is_active { "active" } else { "" };

        let on_sel = {
            let cb = props.on_select.clone();
            let id = chat.id.clone();
            Callback::from(move |_: MouseEvent| cb.emit(id.clone()))
        };
        let on_ren = {
            let cb = props.on_rename.clone();
            let id = chat.id.clone();
            Callback::from(move |e: MouseEvent| {
                e.stop_propagation();
                cb.emit(id.clone());
            })
        };
        let on_del = {
            let cb = props.on_delete.clone();
            let id = chat.id.clone();
            Callback::from(move |e: MouseEvent| {
                e.stop_propagation();
                cb.emit(id.clone());
            })
        };

        html! {
            <div class={classes!("chat-item", active_class)} onclick={on_sel}>
                <div class="chat-text">
                    <span class="chat-title">{ &chat.title }</span>
                    <span class="chat-preview">{ &chat.last_message }</span>
                </div>
                <div style="display: flex;">
                    <button class="item-btn" title="Rename" onclick={on_ren}>{ "✎" }</button>
                    <button class="item-btn del" title="Delete" onclick={on_del}>{ "×" }</button>
                </div>
            </div>
        }
    };

    html! {
        <>
            <style>{ css }</style>
            <div class="sidebar" style={format!("width: {};", width)}>
                <div class="sidebar-content">
                    <button class="new-chat-btn" onclick={props.on_new.reform(|_| ())}>
                        <span>{ "+" }</span>
                        <span>{ "New Chat" }</span>
                    </button>
                    <div class="chat-list">
                        if props.groups.is_empty() {
                            <div class="empty-list">{ "No conversations yet" }</div>
                        }
                        { for props.groups.iter().map(|group| html! {
                            <>
                                <div class="chat-group-label">{ group.label }</div>
                                { for group.conversations.iter().map(&render_item) }
                            </>
                        })}
                    </div>
                </div>
            </div>
        </>
    }
}
