//! HTTP status surface: health, metrics, registry contents and selection

use http_body_util::Full;
use hyper::{
    body::Bytes, server::conn::http1, service::service_fn, Method, Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use registry_core::{RegistryError, ServiceRole};
use registry_proxy::ProxySelector;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct Selection {
    role: ServiceRole,
    endpoint: String,
}

/// Serve status requests until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    selector: Arc<ProxySelector>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Status server listening on {:?}", listener.local_addr().ok());

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Error accepting status connection: {}", e);
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let selector = selector.clone();

                tokio::task::spawn(async move {
                    let service = service_fn(move |req| {
                        let selector = selector.clone();
                        async move { Ok::<_, hyper::Error>(handle_request(req, selector).await) }
                    });

                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                        debug!("Error serving status connection from {}: {}", peer_addr, e);
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Status server stopped");
}

async fn handle_request<B>(req: Request<B>, selector: Arc<ProxySelector>) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    if method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n".to_string());
    }

    match path.as_str() {
        "/healthz" => text(StatusCode::OK, "OK\n".to_string()),
        "/metrics" => match selector.registry().metrics().gather() {
            Ok(body) => text(StatusCode::OK, body),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
        },
        "/services" => match selector.registry().snapshot().await {
            Ok(entries) => json(StatusCode::OK, &entries),
            Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
        },
        _ => match path.strip_prefix("/select/").and_then(parse_role) {
            Some(role) => select(&selector, role).await,
            None => text(StatusCode::NOT_FOUND, "Not Found\n".to_string()),
        },
    }
}

async fn select(selector: &ProxySelector, role: ServiceRole) -> Response<Full<Bytes>> {
    match selector.get(role).await {
        Ok(handle) => json(
            StatusCode::OK,
            &Selection {
                role,
                endpoint: handle.endpoint(),
            },
        ),
        Err(e @ RegistryError::TemporaryUnavailable(_)) => {
            text(StatusCode::SERVICE_UNAVAILABLE, format!("{}\n", e))
        }
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
    }
}

fn parse_role(name: &str) -> Option<ServiceRole> {
    ServiceRole::BACKENDS
        .into_iter()
        .find(|role| role.as_str() == name)
}

fn text(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
    }
}
