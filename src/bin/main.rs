#[cfg(not(target_arch = "wasm32"))]
mod native {
    extern crate quill;

    use std::sync::Arc;

    use actix_web::{web, App as ActixApp, HttpRequest, HttpResponse, HttpServer};
    use quill::app::App;
    use quill::common::db::MemoryStore;
    use quill::common::helpers::init_tracing;
    use quill::config::Config;

    mod adapter {
        use actix_web::HttpRequest;
        use spin_sdk::http::{Method, Request};

        pub fn actix_to_spin_request(
            req: &HttpRequest,
            body: actix_web::web::Bytes,
        ) -> anyhow::Result<Request> {
            let method = match req.method().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "PUT" => Method::Put,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                "OPTIONS" => Method::Options,
                "PATCH" => Method::Patch,
                other => anyhow::bail!("unsupported method {}", other),
            };

            let uri = req.uri().to_string();

            let mut builder = Request::builder();
            builder.method(method).uri(&uri);
            for (name, value) in req.headers() {
                if let Ok(val_str) = value.to_str() {
                    builder.header(name.as_str(), val_str);
                }
            }

            Ok(builder.body(body.to_vec()).build())
        }

        pub fn spin_to_actix_response(spin_resp: spin_sdk::http::Response) -> actix_web::HttpResponse {
            let status = *spin_resp.status();

            let mut response = actix_web::HttpResponse::build(
                actix_web::http::StatusCode::from_u16(status)
                    .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            );
            for (name, value) in spin_resp.headers() {
                if let Some(value) = value.as_str() {
                    response.insert_header((name, value));
                }
            }

            response.body(spin_resp.body().to_vec())
        }
    }

    pub async fn run() -> anyhow::Result<()> {
        init_tracing();

        let config = Config::from_env()?;
        let bind_addr = config.bind_addr.clone();
        let app = App::new(config, Arc::new(MemoryStore::new()));

        tracing::info!("Server listening on http://{}", bind_addr);
        tracing::warn!("native server keeps data in memory; restart loses everything");

        HttpServer::new(move || {
            ActixApp::new()
                .app_data(web::Data::new(Arc::clone(&app)))
                .default_service(web::route().to(handle_all))
        })
        .bind(&bind_addr)?
        .run()
        .await?;

        Ok(())
    }

    async fn handle_all(
        app: web::Data<Arc<App>>,
        req: HttpRequest,
        body: web::Bytes,
    ) -> HttpResponse {
        let spin_req = match adapter::actix_to_spin_request(&req, body) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "could not adapt request");
                return HttpResponse::BadRequest()
                    .json(serde_json::json!({"message": "Invalid request", "statusCode": 400}));
            }
        };

        let spin_resp = quill::route(app.get_ref(), spin_req).await;
        adapter::spin_to_actix_response(spin_resp)
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
