//! Route discovery through the API Gateway v2 API.

use std::future::Future;
use std::pin::Pin;

use anyhow::Context;
use aws_config::SdkConfig;
use aws_sdk_apigatewayv2::error::DisplayErrorContext;
use aws_sdk_apigatewayv2::Client;
use gatewatch_core::ApiRoute;
use tracing::debug;

/// Boxed future returned by [`RouteSource::list_routes`].
pub type RoutesFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Vec<ApiRoute>>> + Send + 'a>>;

/// Lists the routes of one API. Called once per refresh tick.
pub trait RouteSource: Send + Sync {
    fn list_routes(&self) -> RoutesFuture<'_>;
}

/// [`RouteSource`] backed by `GetRoutes`.
#[derive(Clone, Debug)]
pub struct ApiGatewayRoutes {
    client: Client,
    api_id: String,
}

impl ApiGatewayRoutes {
    pub fn new(config: &SdkConfig, api_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            api_id: api_id.into(),
        }
    }
}

impl RouteSource for ApiGatewayRoutes {
    fn list_routes(&self) -> RoutesFuture<'_> {
        Box::pin(list_all(&self.client, &self.api_id))
    }
}

/// List every route of the HTTP API `api_id`, following pagination.
async fn list_all(client: &Client, api_id: &str) -> anyhow::Result<Vec<ApiRoute>> {
    let mut routes = Vec::new();
    let mut next_token: Option<String> = None;

    loop {
        let page = client
            .get_routes()
            .api_id(api_id)
            .set_next_token(next_token.take())
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .with_context(|| format!("listing routes of API {api_id}"))?;

        routes.extend(
            page.items()
                .iter()
                .filter_map(|route| route.route_key())
                .map(ApiRoute::from_route_key),
        );

        match page.next_token() {
            Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
            _ => break,
        }
    }

    debug!(%api_id, routes = routes.len(), "routes listed");
    Ok(routes)
}
