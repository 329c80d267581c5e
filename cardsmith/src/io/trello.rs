//! Blocking Trello REST client.
//!
//! Covers the handful of endpoints the workflow needs: card create/update,
//! board-scoped card search, and the board/list discovery used to find the
//! target list id.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://api.trello.com";

#[derive(Debug, Clone)]
pub struct TrelloCredentials {
    pub api_key: String,
    pub token: String,
}

/// Why a card write did not go through.
#[derive(Debug, Error)]
pub enum CommitError {
    /// The API answered with a non-success status; `body` is passed through raw.
    #[error("API ERROR: {body}")]
    Api { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(rename = "shortUrl")]
    pub short_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
}

/// Fields written on create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardFields {
    pub name: String,
    pub desc: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    cards: Vec<Card>,
}

pub struct TrelloClient {
    http: Client,
    api_base: Url,
    credentials: TrelloCredentials,
}

impl TrelloClient {
    pub fn new(api_base: &str, credentials: TrelloCredentials, timeout: Duration) -> Result<Self> {
        let api_base =
            Url::parse(api_base).with_context(|| format!("parse trello api base {api_base}"))?;
        if api_base.cannot_be_a_base() {
            bail!("trello api base {api_base} cannot carry a path");
        }
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build trello http client")?;
        Ok(Self {
            http,
            api_base,
            credentials,
        })
    }

    /// `<api_base>/1/<segments...>`, each segment percent-encoded on its own so
    /// ids can never add or remove path components.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("1").extend(segments);
        }
        url
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.query(&[
            ("key", self.credentials.api_key.as_str()),
            ("token", self.credentials.token.as_str()),
        ])
    }

    /// Create a card at the top of `list_id`.
    #[instrument(skip_all, fields(list_id = %list_id))]
    pub fn create_card(&self, list_id: &str, fields: &CardFields) -> Result<Card, CommitError> {
        let request = self.authed(self.http.post(self.url(&["cards"]))).query(&[
            ("idList", list_id),
            ("name", fields.name.as_str()),
            ("desc", fields.desc.as_str()),
            ("pos", "top"),
        ]);
        send_card(request, None, fields)
    }

    /// Overwrite name and description of an existing card.
    #[instrument(skip_all, fields(card_id = %card_id))]
    pub fn update_card(&self, card_id: &str, fields: &CardFields) -> Result<Card, CommitError> {
        let request = self
            .authed(self.http.put(self.url(&["cards", card_id])))
            .query(&[("name", fields.name.as_str()), ("desc", fields.desc.as_str())]);
        send_card(request, Some(card_id), fields)
    }

    #[instrument(skip_all, fields(limit = limit))]
    pub fn search_cards(&self, query: &str, board_id: Option<&str>, limit: u32) -> Result<Vec<Card>> {
        let limit = limit.to_string();
        let mut request = self.authed(self.http.get(self.url(&["search"]))).query(&[
            ("query", query),
            ("modelTypes", "cards"),
            ("card_fields", "name,desc,shortUrl"),
            ("cards_limit", limit.as_str()),
        ]);
        if let Some(board_id) = board_id {
            request = request.query(&[("idBoards", board_id)]);
        }
        let response: SearchResponse = get_json(request).context("search cards")?;
        debug!(count = response.cards.len(), "search returned cards");
        Ok(response.cards)
    }

    pub fn boards(&self) -> Result<Vec<Board>> {
        let request = self
            .authed(self.http.get(self.url(&["members", "me", "boards"])))
            .query(&[("fields", "name")]);
        get_json(request).context("list boards")
    }

    pub fn lists(&self, board_id: &str) -> Result<Vec<BoardList>> {
        let request = self
            .authed(self.http.get(self.url(&["boards", board_id, "lists"])))
            .query(&[("fields", "name")]);
        get_json(request).with_context(|| format!("list lists of board {board_id}"))
    }
}

/// A 2xx is a committed write even when the body is not the card we expect;
/// the id then comes from the raw body or, for updates, from the request.
fn send_card(
    request: RequestBuilder,
    card_id: Option<&str>,
    fields: &CardFields,
) -> Result<Card, CommitError> {
    let response = request
        .send()
        .map_err(|err| CommitError::Transport(err.to_string()))?;
    let status = response.status();
    let body = response
        .text()
        .map_err(|err| CommitError::Transport(err.to_string()))?;
    if !status.is_success() {
        warn!(%status, "trello rejected card write");
        return Err(CommitError::Api {
            status: status.as_u16(),
            body,
        });
    }
    match serde_json::from_str::<Card>(&body) {
        Ok(card) => Ok(card),
        Err(err) => {
            warn!(%status, error = %err, "card written but response did not decode");
            Ok(fallback_card(&body, card_id, fields))
        }
    }
}

fn fallback_card(body: &str, card_id: Option<&str>, fields: &CardFields) -> Card {
    let body_id = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("id")?.as_str().map(str::to_string));
    let id = body_id
        .or_else(|| card_id.map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    Card {
        id,
        name: fields.name.clone(),
        desc: fields.desc.clone(),
        short_url: None,
    }
}

fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response: Response = request.send().context("send request")?;
    let status = response.status();
    let body = response.text().context("read response body")?;
    if !status.is_success() {
        bail!("trello API error ({status}): {body}");
    }
    serde_json::from_str(&body).context("parse response json")
}
