//! HTTP trigger for synchronization runs
//!
//! `POST /sync` runs one full synchronization and answers with the JSON
//! report. Requests are served one at a time, so runs never overlap.

use anyhow::{Result, anyhow};
use reconcile::NoProgress;
use serde_json::json;
use tiny_http::{Header, Method, Response, Server};

use crate::Context;
use crate::cli::ServeArgs;
use crate::commands::sync;
use crate::schema::{FacsyncConfig, ServeConfig};
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Sync,
    Health,
    MethodNotAllowed,
    NotFound,
}

fn route(method: &Method, url: &str) -> Route {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path.trim_end_matches('/')) {
        (Method::Post, "/sync") => Route::Sync,
        (Method::Get, "/health") => Route::Health,
        (_, "/sync" | "/health") => Route::MethodNotAllowed,
        _ => Route::NotFound,
    }
}

pub fn run(ctx: &Context, config: &FacsyncConfig, args: ServeArgs) -> Result<()> {
    let address = args
        .address
        .unwrap_or_else(|| config.serve.address.clone());
    ServeConfig {
        address: address.clone(),
    }
    .validate()?;

    let server =
        Server::http(&address).map_err(|e| anyhow!("Failed to listen on {address}: {e}"))?;

    if !ctx.quiet {
        ui::success(&format!("Listening on http://{address}"));
        ui::dim("POST /sync to run a synchronization, GET /health to probe");
    }
    log::info!("serving sync trigger on {address}");

    for request in server.incoming_requests() {
        let route = route(request.method(), request.url());
        log::info!("{} {} -> {:?}", request.method(), request.url(), route);

        let (status, body) = handle(route, config);
        if let Err(e) = request.respond(json_response(status, &body)) {
            log::warn!("failed to send response: {e}");
        }
    }

    Ok(())
}

fn handle(route: Route, config: &FacsyncConfig) -> (u16, serde_json::Value) {
    match route {
        Route::Health => (200, json!({ "status": "ok" })),
        Route::NotFound => (404, json!({ "error": "not found" })),
        Route::MethodNotAllowed => (405, json!({ "error": "method not allowed" })),
        Route::Sync => match sync::execute(config, &mut NoProgress) {
            Ok(report) => {
                let message = sync::completion_message(&report);
                log::info!("{message}");
                (200, json!({ "message": message, "report": report }))
            }
            Err(err) => {
                log::error!("synchronization failed: {err:#}");
                let body = match err.downcast_ref::<reconcile::Error>() {
                    Some(sync_err) => sync::failure_body(sync_err),
                    None => json!({ "error": format!("{err:#}"), "completed": null }),
                };
                (500, body)
            }
        },
    }
}

fn json_response(status: u16, body: &serde_json::Value) -> Response<std::io::Cursor<Vec<u8>>> {
    let response = Response::from_string(body.to_string()).with_status_code(status);
    match Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}
