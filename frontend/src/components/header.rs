use super::super::{Model, Msg, Page};
use yew::prelude::*;

/// Renders the application header
pub fn render_header() -> Html {
    html! {
        <header class="app-header">
            <h1><i class="fa-solid fa-stethoscope"></i> {" Breast Cancer Classification"}</h1>
            <p class="subtitle">{"Breast Cancer Classification - Ultrasound Images"}</p>
        </header>
    }
}

pub fn render_nav(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();
    let tab = |page: Page, label: &'static str| {
        html! {
            <button
                class={classes!("nav-tab", (model.page == page).then_some("active"))}
                onclick={link.callback(move |_| Msg::Navigate(page))}
            >
                { label }
                {
                    if page == Page::Biopsy && model.biopsy_referred {
                        html! { <span class="referral-badge">{"!"}</span> }
                    } else {
                        html! {}
                    }
                }
            </button>
        }
    };

    html! {
        <nav class="app-nav">
            { tab(Page::Checkup, "Ultrasound Checkup") }
            { tab(Page::Biopsy, "Biopsy") }
        </nav>
    }
}
