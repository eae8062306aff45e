use std::time::{Duration, Instant};

use actix_web::{dev::Server, dev::Service as _, web, App, HttpServer};

use super::{configure, cors_headers, AppState};

/// Build and bind the HTTP server. The caller drives the returned future and
/// stops it through its handle; OS signals are handled by the caller.
pub fn start_http_server(
    state: AppState,
    port: u16,
    shutdown_timeout: Duration,
) -> std::io::Result<Server> {
    tracing::info!("Starting HTTP server on http://0.0.0.0:{}", port);

    let data = web::Data::new(state);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(cors_headers())
            .wrap_fn(|req, srv| {
                let method = req.method().clone();
                let path = req.path().to_string();
                let started = Instant::now();
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    tracing::info!(
                        status = res.status().as_u16(),
                        method = %method,
                        path = %path,
                        latency_ms = started.elapsed().as_secs_f64() * 1000.0,
                        "request"
                    );
                    Ok(res)
                }
            })
            .configure(configure)
    })
    .shutdown_timeout(shutdown_timeout.as_secs())
    .disable_signals()
    .bind(("0.0.0.0", port))?
    .run();

    Ok(server)
}
