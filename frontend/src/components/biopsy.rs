use super::super::{Model, Msg, Page};
use yew::prelude::*;

pub fn render_biopsy_page(model: &Model, ctx: &Context<Model>) -> Html {
    let back = ctx.link().callback(|_| Msg::Navigate(Page::Checkup));

    html! {
        <div class="biopsy-page">
            <h2>{"Biopsy"}</h2>
            {
                if model.biopsy_referred {
                    html! {
                        <div class="referral-alert" role="alert">
                            <p>
                                {"An ultrasound scan in this session was classified as Suspicious. "}
                                {"A biopsy is recommended to confirm the finding."}
                            </p>
                        </div>
                    }
                } else {
                    html! {
                        <p class="no-results-message">
                            {"No biopsy referral has been recorded in this session."}
                        </p>
                    }
                }
            }
            <button class="analyze-btn" onclick={back}>{"Back to Ultrasound Checkup"}</button>
        </div>
    }
}
