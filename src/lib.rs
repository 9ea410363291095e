pub mod components;
pub mod error;
pub mod models;
pub mod services;
mod app;
mod utils;

use wasm_bindgen::prelude::*;
use app::App;

#[wasm_bindgen(start)]
pub fn run_app() {
    utils::set_panic_hook();
    tracing_wasm::set_as_global_default();
    yew::Renderer::<App>::new().render();
}
