pub mod chat_session;
pub mod conversation_store;
pub mod llm;
pub mod storage;
pub mod stream_decoder;
