//! Chat session controller.
//!
//! Owns the process-wide chat state (stored conversations, the active
//! conversation, model settings) and mirrors every change into durable storage
//! from a single commit point, which also notifies the registered observer.
//! Execution is single threaded: `RefCell` borrows are never held across an
//! `.await`.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use futures_util::StreamExt;

use crate::error::ChatError;
use crate::models::{Conversation, Message, ModelSettings, Role};
use crate::services::conversation_store::ConversationStore;
use crate::services::llm::{self, CompletionCall, CompletionTransport};
use crate::services::storage::{self, KeyValueStorage};
use crate::services::stream_decoder::decode_stream;

pub const KEY_MODEL_SETTINGS: &str = "modelSettings";

/// API key baked in at build time. Only fills an empty saved key, never persisted.
pub const BUILD_DEFAULT_API_KEY: Option<&str> = option_env!("CHAT_DEFAULT_API_KEY");

pub trait Clock {
    /// Epoch millis.
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatState {
    pub conversations: ConversationStore,
    /// `None` is the "new conversation" state: nothing sent yet, no id.
    pub active_id: Option<String>,
    /// Messages of the active conversation. Authoritative over the stored copy.
    pub messages: Vec<Message>,
    pub settings: ModelSettings,
    pub in_flight: bool,
    /// Banner text of the last terminal error.
    pub error: Option<String>,
    /// Bumped whenever the view should scroll to the latest message.
    pub scroll_generation: u64,
}

impl ChatState {
    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.conversations.get(id))
    }

    fn reset_active(&mut self) {
        self.active_id = None;
        self.messages.clear();
    }
}

pub struct ChatSession {
    state: RefCell<ChatState>,
    storage: Rc<dyn KeyValueStorage>,
    transport: Rc<dyn CompletionTransport>,
    clock: Rc<dyn Clock>,
    fallback_api_key: Option<String>,
    settings_changed: Cell<bool>,
    observer: RefCell<Option<Rc<dyn Fn()>>>,
}

impl ChatSession {
    /// Restores conversations and settings from `storage`. Unreadable settings
    /// fall back to the empty configuration.
    pub fn new(
        storage: Rc<dyn KeyValueStorage>,
        transport: Rc<dyn CompletionTransport>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        let conversations = ConversationStore::load(&*storage);
        let settings = match storage::load::<ModelSettings>(&*storage, KEY_MODEL_SETTINGS) {
            Ok(saved) => saved.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable model settings");
                ModelSettings::default()
            }
        };
        tracing::debug!(conversations = conversations.len(), "chat state restored");

        Self {
            state: RefCell::new(ChatState { conversations, settings, ..ChatState::default() }),
            storage,
            transport,
            clock,
            fallback_api_key: None,
            settings_changed: Cell::new(false),
            observer: RefCell::new(None),
        }
    }

    pub fn with_fallback_api_key(mut self, key: Option<&str>) -> Self {
        self.fallback_api_key = key.filter(|k| !k.is_empty()).map(str::to_string);
        self
    }

    /// Registers the change hook, called after every committed change.
    pub fn set_observer(&self, observer: impl Fn() + 'static) {
        *self.observer.borrow_mut() = Some(Rc::new(observer));
    }

    pub fn state(&self) -> Ref<'_, ChatState> {
        self.state.borrow()
    }

    pub fn transport(&self) -> Rc<dyn CompletionTransport> {
        self.transport.clone()
    }

    /// Saved settings with the build-time key filled in.
    pub fn effective_settings(&self) -> ModelSettings {
        self.state.borrow().settings.with_fallback_key(self.fallback_api_key.as_deref())
    }

    /// Sends `text` as a user message and streams the reply into the active
    /// conversation. Blank input is ignored.
    pub async fn send(&self, text: &str) -> Result<(), ChatError> {
        let input = text.trim();
        if input.is_empty() {
            return Ok(());
        }

        let (call, mut working) = match self.begin_send(input) {
            Ok(started) => started,
            Err(ChatError::RequestInFlight) => return Err(ChatError::RequestInFlight),
            Err(err) => {
                self.show_error(&err);
                return Err(err);
            }
        };
        tracing::info!(
            conversation = %working.id,
            messages = call.body.messages.len(),
            model = %call.body.model,
            "sending completion request"
        );

        let reply = match self.transport.open(call).await {
            Ok(reply) => reply,
            Err(err) => return self.fail(working, err),
        };
        if !reply.is_success() {
            let status = reply.status;
            let body = reply.text().await;
            tracing::warn!(conversation = %working.id, status, "completion request rejected");
            return self.fail(working, ChatError::UpstreamError { status, body });
        }
        let Some(body) = reply.body else {
            return self.fail(working, ChatError::StreamUnavailable);
        };

        let mut deltas = Box::pin(decode_stream(body));
        let mut accumulated = String::new();
        let mut count = 0usize;
        while let Some(item) = deltas.next().await {
            match item {
                Ok(delta) => {
                    accumulated.push_str(&delta);
                    count += 1;
                    self.show_partial(&mut working, &accumulated);
                }
                Err(err) => return self.fail(working, err),
            }
        }

        tracing::info!(
            conversation = %working.id,
            deltas = count,
            chars = accumulated.chars().count(),
            "completion finished"
        );
        self.state.borrow_mut().in_flight = false;
        self.commit();
        Ok(())
    }

    pub fn select_conversation(&self, id: &str) {
        {
            let mut state = self.state.borrow_mut();
            let Some(messages) = state.conversations.get(id).map(|c| c.messages.clone()) else {
                return;
            };
            state.active_id = Some(id.to_string());
            state.messages = messages;
            state.scroll_generation += 1;
        }
        self.commit();
    }

    /// Back to the "no conversation yet" state. Storage is untouched.
    pub fn create_new_conversation(&self) {
        self.state.borrow_mut().reset_active();
        self.commit();
    }

    /// Returns false when the title is blank or the id unknown.
    pub fn rename_conversation(&self, id: &str, new_title: &str) -> bool {
        let renamed = self.state.borrow_mut().conversations.rename(id, new_title);
        if renamed {
            self.commit();
        }
        renamed
    }

    /// Irreversibly removes the conversation. Deleting the active one resets
    /// to the "no conversation yet" state.
    pub fn delete_conversation(&self, id: &str) -> bool {
        {
            let mut state = self.state.borrow_mut();
            if state.conversations.remove(id).is_none() {
                return false;
            }
            if state.active_id.as_deref() == Some(id) {
                state.reset_active();
            }
        }
        tracing::info!(conversation = %id, "conversation deleted");
        self.commit();
        true
    }

    pub fn clear_conversations(&self) {
        {
            let mut state = self.state.borrow_mut();
            state.conversations.clear();
            state.reset_active();
        }
        self.commit();
    }

    pub fn update_settings(&self, settings: ModelSettings) {
        self.state.borrow_mut().settings = settings;
        self.settings_changed.set(true);
        self.commit();
    }

    pub fn dismiss_error(&self) {
        self.state.borrow_mut().error = None;
        self.commit();
    }

    /// Validates preconditions and appends the user message plus an empty
    /// assistant placeholder. Returns the request and a working copy of the
    /// conversation the reply streams into.
    fn begin_send(&self, input: &str) -> Result<(CompletionCall, Conversation), ChatError> {
        let mut state = self.state.borrow_mut();
        if state.in_flight {
            return Err(ChatError::RequestInFlight);
        }
        let settings = state.settings.with_fallback_key(self.fallback_api_key.as_deref());
        if !settings.is_complete() {
            return Err(ChatError::ConfigurationMissing);
        }
        llm::validate_base_url(&settings.base_url)?;

        let now = self.clock.now_millis();
        let (mut conversation, mut messages) = match state.active_conversation() {
            Some(active) => (active.clone(), state.messages.clone()),
            None => {
                let mut fresh = Conversation::start(input, now);
                fresh.id = state.conversations.fresh_id(now);
                (fresh, Vec::new())
            }
        };
        messages.push(Message::user(input, now));
        let call = llm::streaming_call(&settings, &messages);
        messages.push(Message::assistant("", now));
        conversation.touch(messages.clone(), now);

        state.active_id = Some(conversation.id.clone());
        state.messages = messages;
        state.conversations.upsert(conversation.clone());
        state.in_flight = true;
        state.error = None;
        state.scroll_generation += 1;
        drop(state);

        self.commit();
        Ok((call, conversation))
    }

    /// Replaces the placeholder's content with the full accumulated text.
    fn show_partial(&self, working: &mut Conversation, accumulated: &str) {
        let mut messages = std::mem::take(&mut working.messages);
        if let Some(last) = messages.last_mut() {
            last.content = accumulated.to_string();
        }
        working.touch(messages, self.clock.now_millis());
        self.mirror(working);
        self.commit();
    }

    /// Ends the send with `err`. Partial content stays; an untouched placeholder is dropped.
    fn fail(&self, mut working: Conversation, err: ChatError) -> Result<(), ChatError> {
        tracing::warn!(conversation = %working.id, error = %err, "completion failed");
        let empty_placeholder = working
            .messages
            .last()
            .is_some_and(|m| m.role == Role::Assistant && m.content.is_empty());
        if empty_placeholder {
            let mut messages = std::mem::take(&mut working.messages);
            messages.pop();
            working.touch(messages, self.clock.now_millis());
        }
        self.mirror(&working);
        {
            let mut state = self.state.borrow_mut();
            state.in_flight = false;
            state.error = Some(err.to_string());
        }
        self.commit();
        Err(err)
    }

    /// Writes the working copy into the store, and into the view if it is still
    /// active. Updates for a conversation deleted meanwhile are discarded.
    fn mirror(&self, working: &Conversation) {
        let mut state = self.state.borrow_mut();
        let Some(stored_title) = state.conversations.get(&working.id).map(|c| c.title.clone()) else {
            return;
        };
        let mut updated = working.clone();
        updated.title = stored_title;
        state.conversations.upsert(updated);
        if state.active_id.as_deref() == Some(working.id.as_str()) {
            state.messages = working.messages.clone();
            state.scroll_generation += 1;
        }
    }

    fn show_error(&self, err: &ChatError) {
        tracing::warn!(error = %err, "send rejected");
        self.state.borrow_mut().error = Some(err.to_string());
        self.commit();
    }

    /// Persists whatever changed, then notifies the observer.
    fn commit(&self) {
        {
            let mut state = self.state.borrow_mut();
            if let Err(err) = state.conversations.save(&*self.storage) {
                tracing::warn!(error = %err, "failed to persist conversations");
            }
            if self.settings_changed.get() && !state.settings.is_blank() {
                match storage::save(&*self.storage, KEY_MODEL_SETTINGS, &state.settings) {
                    Ok(()) => self.settings_changed.set(false),
                    Err(err) => tracing::warn!(error = %err, "failed to persist model settings"),
                }
            }
        }
        let observer = self.observer.borrow().clone();
        if let Some(observer) = observer {
            observer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::HttpReply;
    use crate::services::storage::MemoryStorage;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream;

    struct TickingClock(Cell<i64>);

    impl Clock for TickingClock {
        fn now_millis(&self) -> i64 {
            let now = self.0.get();
            self.0.set(now + 1);
            now
        }
    }

    #[derive(Default)]
    struct ScriptedTransport {
        status: u16,
        chunks: Vec<Result<&'static str, ChatError>>,
        no_body: bool,
        slow: bool,
        refuse: Option<ChatError>,
        calls: RefCell<Vec<CompletionCall>>,
    }

    impl ScriptedTransport {
        fn streaming(chunks: &[&'static str]) -> Self {
            Self { status: 200, chunks: chunks.iter().map(|c| Ok(*c)).collect(), ..Self::default() }
        }

        fn status(status: u16, body: &'static str) -> Self {
            Self { status, chunks: vec![Ok(body)], ..Self::default() }
        }
    }

    #[async_trait(?Send)]
    impl CompletionTransport for ScriptedTransport {
        async fn open(&self, call: CompletionCall) -> Result<HttpReply, ChatError> {
            self.calls.borrow_mut().push(call);
            if let Some(err) = &self.refuse {
                return Err(err.clone());
            }
            if self.no_body {
                return Ok(HttpReply { status: self.status, body: None });
            }
            let chunks: Vec<Result<Bytes, ChatError>> = self
                .chunks
                .iter()
                .map(|c| c.clone().map(|text| Bytes::from_static(text.as_bytes())))
                .collect();
            let body = if self.slow {
                stream::iter(chunks)
                    .then(|chunk| async move {
                        tokio::task::yield_now().await;
                        chunk
                    })
                    .boxed_local()
            } else {
                stream::iter(chunks).boxed_local()
            };
            Ok(HttpReply { status: self.status, body: Some(body) })
        }
    }

    const HI_THERE: [&str; 3] = [
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n",
        "data: [DONE]\n",
    ];

    fn settings() -> ModelSettings {
        ModelSettings { name: "glm-4-flash".into(), base_url: "https://x/v1".into(), api_key: "k".into() }
    }

    fn session_with(storage: Rc<MemoryStorage>, transport: Rc<ScriptedTransport>) -> ChatSession {
        let session = ChatSession::new(storage, transport, Rc::new(TickingClock(Cell::new(1_000))));
        session.update_settings(settings());
        session
    }

    fn setup(transport: ScriptedTransport) -> (ChatSession, Rc<ScriptedTransport>, Rc<MemoryStorage>) {
        let storage = Rc::new(MemoryStorage::new());
        let transport = Rc::new(transport);
        (session_with(storage.clone(), transport.clone()), transport, storage)
    }

    fn persisted(storage: &MemoryStorage) -> Vec<Conversation> {
        storage::load(storage, "conversations").unwrap().unwrap_or_default()
    }

    #[tokio::test]
    async fn first_send_creates_conversation_and_streams_reply() {
        let (session, transport, storage) = setup(ScriptedTransport::streaming(&HI_THERE));
        let session = Rc::new(session);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let weak = Rc::downgrade(&session);
            let seen = seen.clone();
            session.set_observer(move || {
                if let Some(session) = weak.upgrade() {
                    seen.borrow_mut().push(session.state().messages.clone());
                }
            });
        }

        session.send("hello").await.unwrap();

        let calls = transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://x/v1/chat/completions");
        assert_eq!(calls[0].api_key, "k");
        assert_eq!(calls[0].body.model, "glm-4-flash");
        assert!(calls[0].body.stream);
        let body = serde_json::to_value(&calls[0].body).unwrap();
        assert_eq!(body["messages"], serde_json::json!([{"role": "user", "content": "hello"}]));

        let seen = seen.borrow();
        let first = &seen[0];
        assert_eq!(first.len(), 2);
        assert_eq!((first[0].role, first[0].content.as_str()), (Role::User, "hello"));
        assert_eq!((first[1].role, first[1].content.as_str()), (Role::Assistant, ""));
        for snapshot in seen.iter() {
            if let Some(reply) = snapshot.get(1) {
                assert!("Hi there".starts_with(&reply.content));
            }
        }

        let state = session.state();
        assert!(!state.in_flight);
        assert_eq!(state.error, None);
        assert_eq!(state.messages[1].content, "Hi there");
        let active = state.active_conversation().unwrap();
        assert_eq!(active.title, "hello");
        assert_eq!(active.id, "1000");
        assert_eq!(active.last_message, "Hi there");

        let stored = persisted(&storage);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].messages, state.messages);
    }

    #[tokio::test]
    async fn follow_up_sends_full_history() {
        let (session, transport, _) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("hello").await.unwrap();
        session.send("  and again ").await.unwrap();

        let calls = transport.calls.borrow();
        let roles: Vec<_> = calls[1].body.messages.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            roles,
            [(Role::User, "hello"), (Role::Assistant, "Hi there"), (Role::User, "and again")]
        );
        let state = session.state();
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.active_conversation().unwrap().title, "hello");
    }

    #[tokio::test]
    async fn blank_input_is_a_no_op() {
        let (session, transport, storage) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("").await.unwrap();
        session.send(" \n\t ").await.unwrap();
        assert!(transport.calls.borrow().is_empty());
        assert!(session.state().messages.is_empty());
        assert!(persisted(&storage).is_empty());
    }

    #[tokio::test]
    async fn incomplete_settings_never_hit_the_network() {
        let blanks = [
            ModelSettings { name: String::new(), ..settings() },
            ModelSettings { base_url: String::new(), ..settings() },
            ModelSettings { api_key: " ".into(), ..settings() },
        ];
        for blank in blanks {
            let (session, transport, _) = setup(ScriptedTransport::streaming(&HI_THERE));
            session.update_settings(blank);
            assert_eq!(session.send("hello").await, Err(ChatError::ConfigurationMissing));
            assert!(transport.calls.borrow().is_empty());
            let state = session.state();
            assert!(state.messages.is_empty());
            assert!(state.error.is_some());
        }
    }

    #[tokio::test]
    async fn build_time_key_fills_missing_api_key() {
        let storage = Rc::new(MemoryStorage::new());
        let transport = Rc::new(ScriptedTransport::streaming(&HI_THERE));
        let session = ChatSession::new(storage.clone(), transport.clone(), Rc::new(TickingClock(Cell::new(1))))
            .with_fallback_api_key(Some("baked"));
        session.update_settings(ModelSettings { api_key: String::new(), ..settings() });

        session.send("hello").await.unwrap();
        assert_eq!(transport.calls.borrow()[0].api_key, "baked");
        let saved: ModelSettings = storage::load(&*storage, KEY_MODEL_SETTINGS).unwrap().unwrap();
        assert!(saved.api_key.is_empty());
    }

    #[tokio::test]
    async fn invalid_base_url_is_rejected_before_sending() {
        let (session, transport, _) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.update_settings(ModelSettings { base_url: "x/v1".into(), ..settings() });
        assert!(matches!(session.send("hello").await, Err(ChatError::InvalidEndpoint(_))));
        assert!(transport.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_keeps_user_message_only() {
        let (session, _, storage) = setup(ScriptedTransport::status(401, "{\"error\":\"bad key\"}"));
        let err = session.send("hello").await.unwrap_err();
        assert_eq!(err, ChatError::UpstreamError { status: 401, body: "{\"error\":\"bad key\"}".into() });

        let state = session.state();
        assert!(!state.in_flight);
        assert!(state.error.as_deref().unwrap().contains("API Key"));
        assert_eq!(state.messages, vec![Message::user("hello", 1_000)]);
        let stored = persisted(&storage);
        assert_eq!(stored[0].messages.len(), 1);
        assert_eq!(stored[0].messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn missing_body_is_stream_unavailable() {
        let (session, _, _) = setup(ScriptedTransport { status: 200, no_body: true, ..ScriptedTransport::default() });
        assert_eq!(session.send("hello").await, Err(ChatError::StreamUnavailable));
        assert_eq!(session.state().messages.len(), 1);
    }

    #[tokio::test]
    async fn network_failure_surfaces_banner() {
        let refuse = Some(ChatError::network("TypeError: Failed to fetch"));
        let (session, _, _) = setup(ScriptedTransport { refuse, ..ScriptedTransport::default() });
        assert!(matches!(session.send("hello").await, Err(ChatError::NetworkFailure(_))));
        let state = session.state();
        assert!(state.error.as_deref().unwrap().contains("CORS"));
        assert!(!state.in_flight);
    }

    #[tokio::test]
    async fn read_failure_preserves_partial_reply() {
        let transport = ScriptedTransport {
            status: 200,
            chunks: vec![Ok(HI_THERE[0]), Err(ChatError::network("connection reset"))],
            ..ScriptedTransport::default()
        };
        let (session, _, storage) = setup(transport);
        assert!(session.send("hello").await.is_err());

        let state = session.state();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, "Hi");
        assert_eq!(persisted(&storage)[0].messages[1].content, "Hi");
    }

    #[tokio::test]
    async fn second_send_while_streaming_is_rejected() {
        let (session, transport, _) = setup(slow_hi_there());

        let (first, second) = futures_util::future::join(session.send("one"), session.send("two")).await;
        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(ChatError::RequestInFlight));
        assert_eq!(transport.calls.borrow().len(), 1);
        assert_eq!(session.state().error, None);
    }

    fn slow_hi_there() -> ScriptedTransport {
        ScriptedTransport { slow: true, ..ScriptedTransport::streaming(&HI_THERE) }
    }

    #[tokio::test]
    async fn deleting_mid_stream_discards_remaining_updates() {
        let (session, _, storage) = setup(slow_hi_there());
        let delete = async {
            tokio::task::yield_now().await;
            session.delete_conversation("1000")
        };

        let (sent, deleted) = futures_util::future::join(session.send("hello"), delete).await;
        assert_eq!(sent, Ok(()));
        assert!(deleted);
        let state = session.state();
        assert!(state.conversations.is_empty());
        assert_eq!(state.active_id, None);
        assert!(state.messages.is_empty());
        assert!(!state.in_flight);
        assert!(persisted(&storage).is_empty());
    }

    #[tokio::test]
    async fn renaming_mid_stream_keeps_the_new_title() {
        let (session, _, storage) = setup(slow_hi_there());
        let rename = async {
            tokio::task::yield_now().await;
            session.rename_conversation("1000", "Renamed")
        };

        let (sent, renamed) = futures_util::future::join(session.send("hello"), rename).await;
        assert_eq!(sent, Ok(()));
        assert!(renamed);
        let state = session.state();
        let active = state.active_conversation().unwrap();
        assert_eq!(active.title, "Renamed");
        assert_eq!(active.messages[1].content, "Hi there");
        let stored = persisted(&storage);
        assert_eq!(stored[0].title, "Renamed");
        assert_eq!(stored[0].messages[1].content, "Hi there");
    }

    #[tokio::test]
    async fn selecting_another_conversation_mid_stream_leaves_the_view_alone() {
        let (session, _, storage) = setup(slow_hi_there());
        session.send("first").await.unwrap();
        session.create_new_conversation();
        let select = async {
            tokio::task::yield_now().await;
            session.select_conversation("1000");
        };

        let (sent, ()) = futures_util::future::join(session.send("second"), select).await;
        assert_eq!(sent, Ok(()));
        {
            let state = session.state();
            assert_eq!(state.active_id.as_deref(), Some("1000"));
            let view: Vec<_> = state.messages.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(view, ["first", "Hi there"]);
        }
        let stored = persisted(&storage);
        let second = stored.iter().find(|c| c.id != "1000").unwrap();
        assert_eq!(second.title, "second");
        assert_eq!(second.messages[1].content, "Hi there");
    }

    #[tokio::test]
    async fn select_swaps_active_and_ignores_unknown_ids() {
        let (session, _, _) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("first").await.unwrap();
        let first_id = session.state().active_id.clone().unwrap();
        session.create_new_conversation();
        session.send("second").await.unwrap();
        assert_eq!(session.state().conversations.len(), 2);

        session.select_conversation(&first_id);
        assert_eq!(session.state().messages[0].content, "first");

        session.select_conversation("nope");
        assert_eq!(session.state().active_id.as_deref(), Some(first_id.as_str()));
    }

    #[tokio::test]
    async fn new_conversation_does_not_touch_the_store() {
        let (session, _, storage) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("hello").await.unwrap();
        session.create_new_conversation();

        let state = session.state();
        assert_eq!(state.active_id, None);
        assert!(state.messages.is_empty());
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(persisted(&storage).len(), 1);
    }

    #[tokio::test]
    async fn rename_rejects_blank_title() {
        let (session, _, storage) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("hello").await.unwrap();
        let id = session.state().active_id.clone().unwrap();

        assert!(!session.rename_conversation(&id, "   "));
        assert_eq!(session.state().active_conversation().unwrap().title, "hello");
        assert!(session.rename_conversation(&id, "Greetings"));
        assert_eq!(persisted(&storage)[0].title, "Greetings");
    }

    #[tokio::test]
    async fn deleting_active_conversation_resets_view() {
        let (session, _, storage) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("keep").await.unwrap();
        let keep = session.state().active_id.clone().unwrap();
        session.create_new_conversation();
        session.send("drop").await.unwrap();
        let drop_id = session.state().active_id.clone().unwrap();

        assert!(session.delete_conversation(&drop_id));
        {
            let state = session.state();
            assert_eq!(state.active_id, None);
            assert!(state.messages.is_empty());
        }
        assert_eq!(persisted(&storage).iter().map(|c| c.id.clone()).collect::<Vec<_>>(), [keep.clone()]);

        session.select_conversation(&keep);
        assert!(!session.delete_conversation("unknown"));
        assert_eq!(session.state().active_id.as_deref(), Some(keep.as_str()));
    }

    #[tokio::test]
    async fn clear_conversations_empties_storage() {
        let (session, _, storage) = setup(ScriptedTransport::streaming(&HI_THERE));
        session.send("hello").await.unwrap();
        session.clear_conversations();
        assert!(session.state().conversations.is_empty());
        assert!(persisted(&storage).is_empty());
    }

    #[test]
    fn state_is_restored_from_storage() {
        let storage = Rc::new(MemoryStorage::new());
        let transport = Rc::new(ScriptedTransport::default());
        {
            let session = session_with(storage.clone(), transport.clone());
            session.dismiss_error();
        }
        let mut conv = Conversation::start("old chat", 5);
        conv.touch(vec![Message::user("old chat", 5), Message::assistant("sure", 6)], 6);
        storage::save(&*storage, "conversations", &vec![conv]).unwrap();

        let restored = ChatSession::new(storage, transport, Rc::new(SystemClock));
        let state = restored.state();
        assert_eq!(state.settings, settings());
        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.active_id, None);
    }

    #[test]
    fn blank_or_corrupt_settings_are_handled() {
        let storage = Rc::new(MemoryStorage::new());
        let transport = Rc::new(ScriptedTransport::default());
        let session = session_with(storage.clone(), transport.clone());
        session.update_settings(ModelSettings::default());
        let saved: ModelSettings = storage::load(&*storage, KEY_MODEL_SETTINGS).unwrap().unwrap();
        assert_eq!(saved, settings());

        storage.set_item(KEY_MODEL_SETTINGS, "not json").unwrap();
        let restored = ChatSession::new(storage, transport, Rc::new(SystemClock));
        assert_eq!(restored.state().settings, ModelSettings::default());
    }
}
