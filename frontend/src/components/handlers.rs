use super::super::{FileData, Model, Msg};
use super::utils::first_image_file;
use gloo_file::{File as GlooFile, ObjectUrl};
use gloo_net::http::Request;
use gloo_storage::{SessionStorage, Storage};
use shared::{ErrorResponse, InferenceResponse, REFERRAL_STORAGE_KEY};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

pub fn handle_file_selected(model: &mut Model, file: GlooFile) -> bool {
    let preview_url = ObjectUrl::from(file.clone());
    model.file = Some(FileData { file, preview_url });
    model.result = None;
    model.error = None;
    true
}

pub fn handle_clear_file(model: &mut Model) -> bool {
    model.file = None;
    model.result = None;
    model.error = None;
    model.loading = false;
    true
}

pub fn handle_analyze(model: &mut Model, ctx: &Context<Model>) -> bool {
    let Some(file_data) = &model.file else {
        ctx.link()
            .send_message(Msg::SetError(Some("No image selected for analysis.".into())));
        return false;
    };

    model.loading = true;
    model.error = None;
    model.result = None;
    send_analysis_request(ctx, file_data.file.clone());
    true
}

pub fn handle_inference_result(model: &mut Model, response: InferenceResponse) -> bool {
    if response.referral {
        model.biopsy_referred = true;
        if let Err(e) = SessionStorage::set(REFERRAL_STORAGE_KEY, true) {
            log::warn!("Failed to persist biopsy referral: {:?}", e);
        }
    }
    model.result = Some(response);
    model.loading = false;
    true
}

pub fn handle_drop(model: &mut Model, ctx: &Context<Model>, event: DragEvent) -> bool {
    event.prevent_default();
    model.is_dragging = false;

    let file = event
        .data_transfer()
        .and_then(|data_transfer| data_transfer.files())
        .as_ref()
        .and_then(first_image_file);

    match file {
        Some(file) => ctx.link().send_message(Msg::FileSelected(file)),
        None => ctx.link().send_message(Msg::SetError(Some(
            "Dropped file is not a JPG or PNG image.".into(),
        ))),
    }

    true
}

fn send_analysis_request(ctx: &Context<Model>, file: GlooFile) {
    spawn_local({
        let link = ctx.link().clone();

        async move {
            let form_data = match web_sys::FormData::new() {
                Ok(form_data) => form_data,
                Err(e) => {
                    link.send_message(Msg::SetError(Some(format!("Failed to build upload: {:?}", e))));
                    return;
                }
            };
            if let Err(e) = form_data.append_with_blob("image", file.as_ref()) {
                link.send_message(Msg::SetError(Some(format!("Failed to attach image: {:?}", e))));
                return;
            }

            let request = match Request::post("/api/inference").body(form_data) {
                Ok(request) => request,
                Err(e) => {
                    link.send_message(Msg::SetError(Some(format!("Failed to build request: {}", e))));
                    return;
                }
            };

            match request.send().await {
                Ok(response) => {
                    if response.ok() {
                        match response.json::<InferenceResponse>().await {
                            Ok(results) => link.send_message(Msg::InferenceResult(results)),
                            Err(e) => link.send_message(Msg::SetError(Some(format!(
                                "Failed to parse response: {}",
                                e
                            )))),
                        }
                    } else {
                        let status = response.status();
                        let message = match response.json::<ErrorResponse>().await {
                            Ok(body) => body.error,
                            Err(_) => format!("Server error: {}", status),
                        };
                        gloo_console::error!(format!("Inference failed: {}", message));
                        link.send_message(Msg::SetError(Some(message)))
                    }
                }
                Err(e) => link.send_message(Msg::SetError(Some(format!("Network error: {}", e)))),
            }
        }
    });
}
