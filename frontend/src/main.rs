mod components;

use components::biopsy::render_biopsy_page;
use components::handlers;
use components::header::{render_header, render_nav};
use components::preview_area::render_preview_area;
use components::results::render_results;
use components::upload_section::render_upload_section;
use components::utils::render_error_message;
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_storage::{SessionStorage, Storage};
use shared::{InferenceResponse, REFERRAL_STORAGE_KEY};
use web_sys::DragEvent;
use yew::prelude::*;

pub struct FileData {
    pub file: GlooFile,
    pub preview_url: ObjectUrl,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Checkup,
    Biopsy,
}

pub enum Msg {
    // File operations
    FileSelected(GlooFile),
    ClearFile,

    // Analysis operations
    Analyze,
    InferenceResult(InferenceResponse),

    // UI states
    SetError(Option<String>),
    SetDragging(bool),
    Navigate(Page),

    // Input events
    HandleDrop(DragEvent),
}

pub struct Model {
    pub file: Option<FileData>,
    pub result: Option<InferenceResponse>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_dragging: bool,
    pub page: Page,
    pub biopsy_referred: bool,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(_ctx: &Context<Self>) -> Self {
        let biopsy_referred = SessionStorage::get::<bool>(REFERRAL_STORAGE_KEY).unwrap_or(false);

        Self {
            file: None,
            result: None,
            loading: false,
            error: None,
            is_dragging: false,
            page: Page::Checkup,
            biopsy_referred,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            // File operations
            Msg::FileSelected(file) => handlers::handle_file_selected(self, file),
            Msg::ClearFile => handlers::handle_clear_file(self),

            // Analysis operations
            Msg::Analyze => handlers::handle_analyze(self, ctx),
            Msg::InferenceResult(response) => handlers::handle_inference_result(self, response),

            // UI states
            Msg::SetError(error) => {
                self.error = error;
                self.loading = false;
                true
            }
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::Navigate(page) => {
                self.page = page;
                true
            }

            // Input events
            Msg::HandleDrop(event) => handlers::handle_drop(self, ctx, event),
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                { render_header() }
                { render_nav(self, ctx) }

                <main class="main-content">
                {
                    match self.page {
                        Page::Checkup => html! {
                            <>
                                { render_upload_section(self, ctx) }
                                { render_preview_area(self, ctx) }
                                { render_error_message(self) }
                                { render_results(self, ctx) }
                            </>
                        },
                        Page::Biopsy => render_biopsy_page(self, ctx),
                    }
                }
                </main>

                <footer class="app-footer">
                    <p>{"Breast Cancer Classification | Ultrasound Images"}</p>
                </footer>
            </div>
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("App starting...");
    yew::Renderer::<Model>::new().render();
}
