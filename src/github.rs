// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

/// GitHub REST API operations for issues, comments, labels and artifacts.
///
/// Every operation issues exactly one request against the configured
/// repository and logs the outcome. Failures are wrapped and returned as-is;
/// nothing is retried.
use std::path::Path;

use http::header::{ACCEPT, LOCATION};
use http_body_util::BodyExt;
use octocrab::{Octocrab, models::CommentId};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{self, Error};

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Owner of the repository the CI scripts manage.
pub const DEFAULT_OWNER: &str = "firebase";
/// Repository the CI scripts manage.
pub const DEFAULT_REPO: &str = "firebase-cpp-sdk";
/// Media type requested on every call.
pub const GITHUB_V3_MEDIA_TYPE: &str = "application/vnd.github.v3+json";

/// Connection settings for [`GithubClient`].
#[derive(Debug, Clone, PartialEq, Eq,)]
pub struct GithubConfig
{
    /// Base URL of the REST API.
    pub api_url: String,
    /// Repository owner.
    pub owner:   String,
    /// Repository name.
    pub repo:    String,
    /// Token sent with every request when present.
    pub token:   Option<String,>,
}

impl Default for GithubConfig
{
    fn default() -> Self
    {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            owner:   DEFAULT_OWNER.to_owned(),
            repo:    DEFAULT_REPO.to_owned(),
            token:   None,
        }
    }
}

#[derive(Debug, Serialize,)]
struct SearchQuery
{
    q: String,
}

#[derive(Debug, Deserialize,)]
struct SearchResponse
{
    items: Vec<Value,>,
}

#[derive(Debug, Deserialize,)]
struct ArtifactList
{
    artifacts: Vec<Value,>,
}

/// Client bound to a single `owner/repo`.
#[derive(Debug, Clone,)]
pub struct GithubClient
{
    crab:          Octocrab,
    api_url:       String,
    owner:         String,
    repo:          String,
    authenticated: bool,
}

impl GithubClient
{
    /// Builds a client from the provided settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Github`] when the API URL is invalid or the HTTP
    /// client cannot be constructed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use gha_tools::{GithubClient, GithubConfig};
    ///
    /// # async fn example() -> Result<(), gha_tools::Error> {
    /// let client = GithubClient::new(GithubConfig {
    ///     token: std::env::var("GITHUB_TOKEN",).ok(),
    ///     ..GithubConfig::default()
    /// },)?;
    /// let issues = client.search_issues_by_label("nightly-testing",).await?;
    /// println!("{} open nightly issues", issues.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: GithubConfig,) -> Result<Self, Error,>
    {
        let mut builder = Octocrab::builder()
            .add_header(ACCEPT, GITHUB_V3_MEDIA_TYPE.to_owned(),)
            .base_uri(config.api_url.as_str(),)
            .map_err(|e| Error::github("configure client", e,),)?;

        if let Some(token,) = config.token.as_deref() {
            builder = builder.personal_token(token,);
        }

        let crab = builder.build().map_err(|e| Error::github("configure client", e,),)?;

        Ok(Self {
            crab,
            api_url: config.api_url.trim_end_matches('/',).to_owned(),
            owner: config.owner,
            repo: config.repo,
            authenticated: config.token.is_some(),
        },)
    }

    /// Repository the client operates on, as `owner/repo`.
    pub fn repository(&self,) -> String
    {
        format!("{}/{}", self.owner, self.repo)
    }

    fn route(&self, suffix: &str,) -> String
    {
        format!("/repos/{}/{}{suffix}", self.owner, self.repo)
    }

    fn url(&self, route: &str,) -> String
    {
        format!("{}{route}", self.api_url)
    }

    fn require_token(&self, operation: &str,) -> Result<(), Error,>
    {
        if self.authenticated {
            Ok((),)
        } else {
            Err(Error::Unauthorized {
                operation: operation.to_owned(),
            },)
        }
    }

    /// Creates an issue carrying a single label and returns the created issue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn create_issue(&self, title: &str, label: &str,) -> Result<Value, Error,>
    {
        const OPERATION: &str = "create_issue";
        self.require_token(OPERATION,)?;
        let route = self.route("/issues",);
        let body = json!({ "title": title, "labels": [label] });
        let issue: Value =
            self.crab.post(&route, Some(&body,),).await.map_err(|e| Error::github(OPERATION, e,),)?;
        info!("{}: {} response: {}", OPERATION, self.url(&route), describe(&issue));
        Ok(issue,)
    }

    /// Applies `data` as a partial update of an issue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn update_issue(&self, issue_number: u64, data: &Value,) -> Result<(), Error,>
    {
        self.patch_issue("update_issue", issue_number, data,).await
    }

    /// Reopens an issue.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::update_issue`].
    pub async fn open_issue(&self, issue_number: u64,) -> Result<(), Error,>
    {
        self.patch_issue("open_issue", issue_number, &json!({ "state": "open" }),).await
    }

    /// Closes an issue.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::update_issue`].
    pub async fn close_issue(&self, issue_number: u64,) -> Result<(), Error,>
    {
        self.patch_issue("close_issue", issue_number, &json!({ "state": "closed" }),).await
    }

    /// Replaces the body of an issue.
    ///
    /// # Errors
    ///
    /// See [`GithubClient::update_issue`].
    pub async fn update_issue_comment(&self, issue_number: u64, comment: &str,) -> Result<(), Error,>
    {
        self.patch_issue("update_issue_comment", issue_number, &json!({ "body": comment }),)
            .await
    }

    async fn patch_issue(&self, operation: &str, issue_number: u64, data: &Value,) -> Result<(), Error,>
    {
        self.require_token(operation,)?;
        let route = self.route(&format!("/issues/{issue_number}"),);
        let issue: Value =
            self.crab.patch(&route, Some(data,),).await.map_err(|e| Error::github(operation, e,),)?;
        info!("{}: {} response: {}", operation, self.url(&route), describe(&issue));
        Ok((),)
    }

    /// Finds issues of the repository that carry `label`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Github`] when the search request fails.
    pub async fn search_issues_by_label(&self, label: &str,) -> Result<Vec<Value,>, Error,>
    {
        const OPERATION: &str = "search_issues_by_label";
        let query = SearchQuery {
            q: format!("repo:{}/{} label:\"{label}\" is:issue", self.owner, self.repo),
        };
        let response: SearchResponse = self
            .crab
            .get("/search/issues", Some(&query,),)
            .await
            .map_err(|e| Error::github(OPERATION, e,),)?;
        info!(
            "{}: {}/search/issues?q={} response: {} items",
            OPERATION,
            self.api_url,
            query.q,
            response.items.len()
        );
        Ok(response.items,)
    }

    /// Lists the comments of an issue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Github`] when the request fails.
    pub async fn list_comments(&self, issue_number: u64,) -> Result<Value, Error,>
    {
        const OPERATION: &str = "list_comments";
        let route = self.route(&format!("/issues/{issue_number}/comments"),);
        let comments: Value =
            self.crab.get(&route, None::<&(),>,).await.map_err(|e| Error::github(OPERATION, e,),)?;
        info!("{}: {} response: {}", OPERATION, self.url(&route), describe(&comments));
        Ok(comments,)
    }

    /// Adds a comment to an issue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn add_comment(&self, issue_number: u64, comment: &str,) -> Result<(), Error,>
    {
        const OPERATION: &str = "add_comment";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/issues/{issue_number}/comments"),);
        let created: Value = self
            .crab
            .post(&route, Some(&json!({ "body": comment }),),)
            .await
            .map_err(|e| Error::github(OPERATION, e,),)?;
        info!("{}: {} response: {}", OPERATION, self.url(&route), describe(&created));
        Ok((),)
    }

    /// Replaces the body of an existing comment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn update_comment(&self, comment_id: u64, comment: &str,) -> Result<(), Error,>
    {
        const OPERATION: &str = "update_comment";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/issues/comments/{comment_id}"),);
        let updated: Value = self
            .crab
            .patch(&route, Some(&json!({ "body": comment }),),)
            .await
            .map_err(|e| Error::github(OPERATION, e,),)?;
        info!("{}: {} response: {}", OPERATION, self.url(&route), describe(&updated));
        Ok((),)
    }

    /// Deletes a comment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn delete_comment(&self, comment_id: u64,) -> Result<(), Error,>
    {
        const OPERATION: &str = "delete_comment";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/issues/comments/{comment_id}"),);
        self.crab
            .issues(&self.owner, &self.repo,)
            .delete_comment(CommentId(comment_id,),)
            .await
            .map_err(|e| Error::github(OPERATION, e,),)?;
        info!("{}: {} response: deleted", OPERATION, self.url(&route));
        Ok((),)
    }

    /// Adds a label to an issue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn add_label(&self, issue_number: u64, label: &str,) -> Result<(), Error,>
    {
        const OPERATION: &str = "add_label";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/issues/{issue_number}/labels"),);
        let labels: Value = self
            .crab
            .post(&route, Some(&[label],),)
            .await
            .map_err(|e| Error::github(OPERATION, e,),)?;
        info!("{}: {} response: {}", OPERATION, self.url(&route), describe(&labels));
        Ok((),)
    }

    /// Removes a label from an issue.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn delete_label(&self, issue_number: u64, label: &str,) -> Result<(), Error,>
    {
        const OPERATION: &str = "delete_label";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/issues/{issue_number}/labels/{label}"),);
        let remaining = self
            .crab
            .issues(&self.owner, &self.repo,)
            .remove_label(issue_number, label,)
            .await
            .map_err(|e| Error::github(OPERATION, e,),)?;
        info!(
            "{}: {} response: {} labels remaining",
            OPERATION,
            self.url(&route),
            remaining.len()
        );
        Ok((),)
    }

    /// Lists the artifacts uploaded by a workflow run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token and [`Error::Github`]
    /// when the request fails.
    pub async fn list_artifacts(&self, run_id: u64,) -> Result<Vec<Value,>, Error,>
    {
        const OPERATION: &str = "list_artifacts";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/actions/runs/{run_id}/artifacts"),);
        let response: ArtifactList =
            self.crab.get(&route, None::<&(),>,).await.map_err(|e| Error::github(OPERATION, e,),)?;
        info!(
            "{}: {} response: {} artifacts",
            OPERATION,
            self.url(&route),
            response.artifacts.len()
        );
        Ok(response.artifacts,)
    }

    /// Downloads an artifact archive and streams it to `output_path`.
    ///
    /// GitHub answers with a redirect to blob storage, which is followed once.
    /// The body is written chunk by chunk as it arrives and nothing verifies
    /// the archive contents. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] without a token, [`Error::Github`] when
    /// the download fails and [`Error::Io`] when the file cannot be written.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::path::Path;
    ///
    /// use gha_tools::{GithubClient, GithubConfig};
    ///
    /// # async fn example() -> Result<(), gha_tools::Error> {
    /// let client = GithubClient::new(GithubConfig {
    ///     token: Some("ghp_token".to_owned(),),
    ///     ..GithubConfig::default()
    /// },)?;
    /// let written = client.download_artifact(42, Path::new("logs.zip",),).await?;
    /// println!("downloaded {written} bytes");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn download_artifact(&self, artifact_id: u64, output_path: &Path,) -> Result<u64, Error,>
    {
        const OPERATION: &str = "download_artifact";
        self.require_token(OPERATION,)?;
        let route = self.route(&format!("/actions/artifacts/{artifact_id}/zip"),);

        let mut response =
            self.crab._get(route.as_str(),).await.map_err(|e| Error::github(OPERATION, e,),)?;
        if let Some(location,) = response.headers().get(LOCATION,) {
            let location = location
                .to_str()
                .map_err(|e| Error::service(format!("{OPERATION}: invalid redirect location: {e}"),),)?
                .to_owned();
            debug!("{}: following redirect to {}", OPERATION, location);
            response =
                self.crab._get(location.as_str(),).await.map_err(|e| Error::github(OPERATION, e,),)?;
        }
        let response =
            octocrab::map_github_error(response,).await.map_err(|e| Error::github(OPERATION, e,),)?;

        let mut file = tokio::fs::File::create(output_path,)
            .await
            .map_err(|source| error::io_error(output_path, source,),)?;
        let mut body = response.into_body();
        let mut written: u64 = 0;

        while let Some(frame,) = body.frame().await {
            let frame = frame.map_err(|e| Error::github(OPERATION, e,),)?;
            if let Ok(chunk,) = frame.into_data() {
                file.write_all(&chunk,)
                    .await
                    .map_err(|source| error::io_error(output_path, source,),)?;
                written += chunk.len() as u64;
            }
        }
        file.flush().await.map_err(|source| error::io_error(output_path, source,),)?;

        info!("{}: {} response: {} bytes", OPERATION, self.url(&route), written);
        Ok(written,)
    }
}

/// Short description of a response body for log lines.
fn describe(value: &Value,) -> String
{
    match value {
        Value::Array(items,) => format!("{} items", items.len()),
        Value::Object(map,) => {
            if let Some(number,) = map.get("number",) {
                format!("#{number}")
            } else if let Some(id,) = map.get("id",) {
                format!("id {id}")
            } else {
                "ok".to_owned()
            }
        }
        other => other.to_string(),
    }
}
