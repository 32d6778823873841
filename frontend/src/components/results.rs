use super::super::{Model, Msg, Page};
use yew::prelude::*;

pub fn render_results(model: &Model, ctx: &Context<Model>) -> Html {
    let Some(results) = &model.result else {
        return html! {};
    };

    let confidence = results.confidence * 100.0;
    let analyzed_filename = model
        .file
        .as_ref()
        .map_or_else(|| "Analyzed Image".to_string(), |fd| fd.file.name());

    html! {
        <div class={classes!("results-container", if results.referral { "suspicious" } else { "routine" })}>
            <div class="result-header">
                <div class="result-column">
                    <h2>{"Cancer Type"}</h2>
                    <h3 title={format!("Analysis results for: {}", analyzed_filename)}>
                        { &results.final_label }
                    </h3>
                </div>
                <div class="result-column">
                    <h2>{"Prediction Probability"}</h2>
                    <h3>{ format!("{:.4}", results.confidence) }</h3>
                    <div class="meter">
                        <div class="meter-fill" style={format!("width: {}%", confidence)}></div>
                    </div>
                </div>
            </div>
            <div class="detailed-results">
                <h3>{"Class Probabilities"}</h3>
                <div class="result-bars">
                    { for results.predictions.iter().enumerate().map(|(i, &v)| {
                        let class_name = results
                            .class_labels
                            .get(i)
                            .map(String::as_str)
                            .unwrap_or("Unknown Class");
                        let percentage = v * 100.0;
                        html! {
                            <div class="result-item">
                                <div class="result-label">{ class_name }</div>
                                <div class="result-bar-container">
                                    <div class="result-bar" style={format!("width: {}%", percentage)}></div>
                                </div>
                                <div class="result-value">{ format!("{:.1}%", percentage) }</div>
                            </div>
                        }
                    })}
                </div>
            </div>
            { render_referral_prompt(model, ctx) }
        </div>
    }
}

fn render_referral_prompt(model: &Model, ctx: &Context<Model>) -> Html {
    match &model.result {
        Some(results) if results.referral => html! {
            <div class="referral-alert" role="alert">
                <span class="alert-icon">{"🚨"}</span>
                <p>{"Please visit the Biopsy Page for more testing"}</p>
                <button
                    class="analyze-btn"
                    onclick={ctx.link().callback(|_| Msg::Navigate(Page::Biopsy))}
                >
                    {"Go to Biopsy Page"}
                </button>
            </div>
        },
        _ => html! {},
    }
}
