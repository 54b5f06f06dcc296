//! Actors, their builds, and starting runs.

use std::{collections::BTreeMap, sync::Arc};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client::{ClientInner, DataEnvelope},
    errors::{Error, Result, ValidationError},
    http::RetryConfig,
    merge::RunRequest,
    pagination::{PaginatedList, Paginator},
    runs::RunRecord,
    schema::InputSchema,
};

/// Build tag resolved when an actor does not name one.
pub const LATEST_BUILD_TAG: &str = "latest";

/// Actor metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_run_options: Option<DefaultRunOptions>,
    #[serde(default)]
    pub tagged_builds: BTreeMap<String, TaggedBuild>,
}

impl Actor {
    /// Build tag used by default runs (`latest` when unset).
    pub fn default_build_tag(&self) -> &str {
        self.default_run_options
            .as_ref()
            .and_then(|o| o.build.as_deref())
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(LATEST_BUILD_TAG)
    }

    /// Build id behind [`Actor::default_build_tag`].
    pub fn default_build_id(&self) -> Result<&str> {
        let tag = self.default_build_tag();
        let tagged = self.tagged_builds.get(tag).ok_or_else(|| Error::MissingField {
            field: "taggedBuilds",
            context: format!("build tag {tag} not found for actor {}", self.id),
        })?;
        tagged
            .build_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MissingField {
                field: "buildId",
                context: format!("build tag {tag} of actor {} has no build id", self.id),
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultRunOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mbytes: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedBuild {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
}

/// A build of an actor, carrying the input schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_definition: Option<ActorDefinition>,
}

impl Build {
    pub fn input_schema(&self) -> Option<&InputSchema> {
        self.actor_definition.as_ref()?.input.as_ref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActorDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<InputSchema>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Query options for starting a run.
#[derive(Debug, Clone, Default)]
pub struct StartRunOptions {
    /// Seconds the API may hold the request open waiting for the run (0 = return at once).
    pub wait_for_finish: u32,
    /// Build tag or number to run instead of the actor default.
    pub build: Option<String>,
    pub timeout_secs: Option<u64>,
    pub memory_mbytes: Option<u64>,
}

#[derive(Clone)]
pub struct ActorsClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl ActorsClient {
    pub async fn get(&self, actor_id: &str) -> Result<Actor> {
        let actor = path_id(actor_id, "actor_id")?;
        let path = format!("/v2/acts/{actor}");
        self.get_data(&path, actor_id, || format!("actor {actor_id}"))
            .await
    }

    /// Build referenced by `tag` (e.g. `default`, `latest`).
    pub async fn get_build_by_tag(&self, actor_id: &str, tag: &str) -> Result<Build> {
        let actor = path_id(actor_id, "actor_id")?;
        let tag = path_id(tag, "tag")?;
        let path = format!("/v2/acts/{actor}/builds/{tag}");
        self.get_data(&path, actor_id, || {
            format!("could not fetch {tag} build for actor {actor_id}")
        })
        .await
    }

    pub async fn get_build(&self, build_id: &str) -> Result<Build> {
        let build = path_id(build_id, "build_id")?;
        let path = format!("/v2/actor-builds/{build}");
        self.get_data(&path, build_id, || format!("build {build_id}"))
            .await
    }

    /// Starts one run with `request` as input.
    ///
    /// Creates a billable remote run, so it is sent exactly once: the client
    /// retry policy is not applied. A response without a run id is an error.
    pub async fn start_run(
        &self,
        actor_id: &str,
        request: &RunRequest,
        options: &StartRunOptions,
    ) -> Result<RunRecord> {
        let actor = path_id(actor_id, "actor_id")?;
        let path = format!("/v2/acts/{actor}/runs");
        let mut query: Vec<(&str, String)> =
            vec![("waitForFinish", options.wait_for_finish.to_string())];
        if let Some(build) = options.build.as_deref().filter(|b| !b.trim().is_empty()) {
            query.push(("build", build.to_string()));
        }
        if let Some(timeout) = options.timeout_secs {
            query.push(("timeout", timeout.to_string()));
        }
        if let Some(memory) = options.memory_mbytes {
            query.push(("memory", memory.to_string()));
        }

        let builder = self
            .inner
            .json_request(Method::POST, &path)?
            .query(&query)
            .json(request);
        let ctx = self.inner.make_context(&Method::POST, &path, Some(actor_id));
        let envelope: DataEnvelope<RunRecord> = self
            .inner
            .execute_json(builder, Method::POST, Some(RetryConfig::disabled()), ctx)
            .await?;
        let run = envelope
            .data
            .filter(|run| !run.id.trim().is_empty())
            .ok_or_else(|| Error::MissingField {
                field: "data.id",
                context: format!("run id not found after starting actor {actor_id}"),
            })?;

        #[cfg(feature = "tracing")]
        tracing::info!(actor_id, run_id = %run.id, status = %run.status, "run started");
        Ok(run)
    }

    /// One page of the actor's runs.
    pub async fn list_runs(
        &self,
        actor_id: &str,
        offset: u64,
        limit: u32,
    ) -> Result<PaginatedList<RunRecord>> {
        let actor = path_id(actor_id, "actor_id")?;
        let path = format!("/v2/acts/{actor}/runs");
        let builder = self
            .inner
            .json_request(Method::GET, &path)?
            .query(&[("offset", offset.to_string()), ("limit", limit.to_string())]);
        let ctx = self.inner.make_context(&Method::GET, &path, Some(actor_id));
        let envelope: DataEnvelope<PaginatedList<RunRecord>> = self
            .inner
            .execute_json(builder, Method::GET, None, ctx)
            .await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Every run of the actor, `limit` (default 999) per request.
    pub async fn list_all_runs(
        &self,
        actor_id: &str,
        limit: Option<u32>,
    ) -> Result<PaginatedList<RunRecord>> {
        let mut pager = Paginator::new(limit);
        let mut pages = Vec::new();
        while let Some((offset, limit)) = pager.next_page() {
            let page = self.list_runs(actor_id, offset, limit).await?;
            pager.record(page.items.len());
            pages.push(page);
        }
        Ok(PaginatedList::combine(pages))
    }

    async fn get_data<T, C>(&self, path: &str, resource_id: &str, context: C) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        C: FnOnce() -> String,
    {
        let builder = self.inner.json_request(Method::GET, path)?;
        let ctx = self.inner.make_context(&Method::GET, path, Some(resource_id));
        let envelope: DataEnvelope<T> = self
            .inner
            .execute_json(builder, Method::GET, None, ctx)
            .await?;
        envelope.data.ok_or_else(|| Error::MissingField {
            field: "data",
            context: context(),
        })
    }
}

/// Validates and percent-encodes an id for use as a path segment.
/// `user/name` becomes `user~name`.
fn path_id(raw: &str, field: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(
            ValidationError::new(format!("{field} is required")).with_field(field),
        ));
    }
    Ok(urlencoding::encode(&trimmed.replace('/', "~")).into_owned())
}
