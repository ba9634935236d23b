//! Request decomposition.
//!
//! Turns one client request into the ordered sequence of
//! (desired app, current app) pairs filters work on.

use std::{future::Future, sync::Arc};

use futures::{
    future,
    stream::{self, BoxStream, StreamExt, TryStreamExt},
};
use serde_json::Value;

use crate::{
    core::{GatewayError, GatewayResult},
    model::{Account, App, AppPair, Group},
    orchestrator::OrchestratorClient,
};

use super::{
    namespace,
    request::{ClientRequest, Target},
};

/// Lazily produced pairs. Dropping the stream cancels outstanding lookups;
/// re-splitting issues the lookups again.
pub type PairStream<'a> = BoxStream<'a, GatewayResult<AppPair>>;

pub struct Splitter {
    client: Arc<dyn OrchestratorClient>,
    concurrency: usize,
}

impl Splitter {
    pub fn new(client: Arc<dyn OrchestratorClient>, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Decomposes `request` according to the target its path addresses.
    ///
    /// Per-app lookups of a bulk request run concurrently, at most
    /// `concurrency` at a time, and are yielded in body order. The first
    /// lookup failing with anything other than not-found ends the stream
    /// with that error.
    pub fn split<'a>(&'a self, request: &'a ClientRequest) -> PairStream<'a> {
        let account = request.account();

        match request.target() {
            Target::App { id, action } => {
                // An action body (e.g. `{"force": true}`) is not an app.
                let desired = match action {
                    Some(_) => Ok(App::empty()),
                    None => App::from_slice(&request.body),
                };
                stream::once(async move {
                    let desired = desired?;
                    let current = self.resolve_app(account, &id).await?;
                    Ok(AppPair::new(desired, current))
                })
                .boxed()
            }
            Target::Apps if request.has_body() => match parse_app_list(&request.body) {
                Ok(desired) => stream::iter(desired)
                    .map(move |desired| async move {
                        let id = desired.id().unwrap_or_default().to_string();
                        let current = self.resolve_app(account, &bare(&id)).await?;
                        Ok(AppPair::new(desired, current))
                    })
                    .buffered(self.concurrency)
                    .boxed(),
                Err(e) => stream::once(future::ready(Err(e))).boxed(),
            },
            Target::Apps => stream::once(async move {
                let namespace = account.map(|a| a.namespace.as_str());
                self.client.list_apps(namespace).await
            })
            .map_ok(|apps| stream::iter(apps.into_iter().map(read_pair)))
            .try_flatten()
            .boxed(),
            Target::Group { id } => stream::once(async move { self.resolve_group(account, &id).await })
                .map_ok(|group| stream::iter(group.into_apps().into_iter().map(read_pair)))
                .try_flatten()
                .boxed(),
            Target::Passthrough => stream::empty().boxed(),
        }
    }

    /// Collects the whole split, stopping at the first error.
    pub async fn split_all(&self, request: &ClientRequest) -> GatewayResult<Vec<AppPair>> {
        self.split(request).try_collect().await
    }

    /// Current app for `bare_id`: namespaced first, legacy second, the empty
    /// sentinel when neither exists.
    pub async fn resolve_app(&self, account: Option<&Account>, bare_id: &str) -> GatewayResult<App> {
        let found = first_found(namespace::resolve(account, bare_id), |id| async move {
            self.client.get_app(&id).await
        })
        .await?;
        Ok(found.unwrap_or_default())
    }

    /// Same fallback as [`Splitter::resolve_app`], for groups.
    pub async fn resolve_group(
        &self,
        account: Option<&Account>,
        bare_id: &str,
    ) -> GatewayResult<Group> {
        let found = first_found(namespace::resolve(account, bare_id), |id| async move {
            self.client.get_group(&id).await
        })
        .await?;
        Ok(found.unwrap_or_default())
    }
}

fn read_pair(current: App) -> GatewayResult<AppPair> {
    Ok(AppPair::new(App::empty(), current))
}

fn bare(id: &str) -> String {
    format!("/{}", id.trim_matches('/'))
}

/// Tries each candidate in order; not-found moves on, any other error stops.
async fn first_found<T, F, Fut>(candidates: Vec<String>, fetch: F) -> GatewayResult<Option<T>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    for candidate in candidates {
        match fetch(candidate.clone()).await {
            Ok(found) => return Ok(Some(found)),
            Err(e) if e.is_not_found() => {
                log::debug!("{candidate} not found, trying next candidate");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

/// A bulk body: a list of app objects, or a single object treated as a
/// one-element list. Every element needs an id.
pub fn parse_app_list(body: &[u8]) -> GatewayResult<Vec<App>> {
    let items = match serde_json::from_slice(body)? {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(GatewayError::MalformedBody(format!(
                "expected a list of apps, got {other}"
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let app = App::from_value(item)?;
            match app.id() {
                Some(id) if !id.trim_matches('/').is_empty() => Ok(app),
                _ => Err(GatewayError::MalformedBody(format!(
                    "app at position {i} has no id"
                ))),
            }
        })
        .collect()
}
