//! Server-rendered form and list views

use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    Form,
};
use serde::Deserialize;
use std::fmt::Write;
use things_core::Thing;

/// Both the submission form and the search form bind their nonces to
/// this action, as the original surface did.
const NONCE_ACTION: &str = "thing-form";

const FORM_NONCE_ERROR: &str = "Nonce verification failed!";
const SEARCH_NONCE_ERROR: &str = "Nonce verification failed for search form!";

#[derive(Debug, Deserialize)]
pub struct ThingForm {
    thing_name: Option<String>,
    nonce: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    search: Option<String>,
    nonce: Option<String>,
}

/// `GET /` - renders the empty submission form.
pub async fn form_page(State(state): State<AppState>) -> Html<String> {
    Html(render_form(&state, None))
}

/// `POST /` - verifies the nonce, inserts, and renders the form again.
///
/// Success and the next render look the same: an empty form with a
/// fresh nonce. A bad nonce renders a visible error and skips the
/// insert entirely.
pub async fn form_submit(
    State(state): State<AppState>,
    Form(form): Form<ThingForm>,
) -> Result<Html<String>, StatusCode> {
    let nonce_ok = form
        .nonce
        .as_deref()
        .map(|token| state.nonces.verify(NONCE_ACTION, token))
        .unwrap_or(false);

    if !nonce_ok {
        return Ok(Html(render_form(&state, Some(FORM_NONCE_ERROR))));
    }

    let name = form.thing_name.unwrap_or_default();
    if let Err(err) = state.store.insert(&name).await {
        tracing::error!("Failed to insert thing: {:#}", err);
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok(Html(render_form(&state, None)))
}

/// `GET /list` - renders the search box and the id/name table.
///
/// A plain request needs no nonce. When a `search` parameter is
/// present the nonce is verified first; on failure the store is never
/// queried and the error is shown in place of the table rows.
pub async fn list_page(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Html<String>, StatusCode> {
    let mut error = None;
    let mut things = Vec::new();

    match query.search.as_deref() {
        Some(term) => {
            let nonce_ok = query
                .nonce
                .as_deref()
                .map(|token| state.nonces.verify(NONCE_ACTION, token))
                .unwrap_or(false);

            if nonce_ok {
                match state.store.list(Some(term)).await {
                    Ok(found) => things = found,
                    Err(err) => {
                        tracing::error!("Failed to list things: {:#}", err);
                        return Err(StatusCode::INTERNAL_SERVER_ERROR);
                    }
                }
            } else {
                error = Some(SEARCH_NONCE_ERROR);
            }
        }
        None => match state.store.list(None).await {
            Ok(found) => things = found,
            Err(err) => {
                tracing::error!("Failed to list things: {:#}", err);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        },
    }

    Ok(Html(render_list(
        &state,
        query.search.as_deref().unwrap_or(""),
        error,
        &things,
    )))
}

fn render_form(state: &AppState, error: Option<&str>) -> String {
    let nonce = state.nonces.issue(NONCE_ACTION);

    let mut out = String::new();
    if let Some(message) = error {
        let _ = writeln!(out, "<p class=\"error\">{}</p>", escape_html(message));
    }
    let _ = write!(
        out,
        "<form method=\"POST\" action=\"/\">\n\
         <label for=\"thing_name\">Thing's Name:</label>\n\
         <input type=\"text\" name=\"thing_name\" required>\n\
         <input type=\"hidden\" name=\"nonce\" value=\"{nonce}\">\n\
         <input type=\"submit\" value=\"Submit\">\n\
         </form>\n"
    );
    out
}

fn render_list(state: &AppState, search: &str, error: Option<&str>, things: &[Thing]) -> String {
    let nonce = state.nonces.issue(NONCE_ACTION);

    let mut out = String::new();
    let _ = write!(
        out,
        "<form method=\"GET\" action=\"/list\">\n\
         <label for=\"search\">Search:</label>\n\
         <input type=\"text\" name=\"search\" value=\"{}\">\n\
         <input type=\"hidden\" name=\"nonce\" value=\"{nonce}\">\n\
         <input type=\"submit\" value=\"Search\">\n\
         </form>\n",
        escape_html(search)
    );

    if let Some(message) = error {
        let _ = writeln!(out, "<p class=\"error\">{}</p>", escape_html(message));
        return out;
    }

    out.push_str("<table>\n<thead>\n<tr><th>ID</th><th>Name</th></tr>\n</thead>\n<tbody>\n");
    for thing in things {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td></tr>",
            thing.id,
            escape_html(&thing.name)
        );
    }
    out.push_str("</tbody>\n</table>\n");
    out
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
