//! Card lookup the planner may call before it commits to a plan.

use std::fmt::Write as _;

use tracing::warn;

use crate::io::trello::{Card, TrelloClient};

/// One existing card as shown to the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSummary {
    pub id: String,
    pub title: String,
    pub description_preview: String,
}

/// Result of a search. Failures are values so the planner can read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    NoMatches,
    Matches(Vec<CardSummary>),
    Unavailable(String),
}

impl SearchResult {
    /// Text handed back to the model.
    pub fn render(&self) -> String {
        match self {
            SearchResult::NoMatches => "No matching cards found.".to_string(),
            SearchResult::Unavailable(message) => message.clone(),
            SearchResult::Matches(cards) => {
                let mut out = String::from("Found cards:\n");
                for card in cards {
                    let _ = writeln!(
                        out,
                        "- ID: {} | Title: {} | Desc: {}",
                        card.id, card.title, card.description_preview
                    );
                }
                out
            }
        }
    }
}

/// Read-only lookup against the tracker.
pub trait SearchTool {
    fn search(&self, query: &str) -> SearchResult;
}

pub struct TrelloSearch {
    client: TrelloClient,
    board_id: Option<String>,
    limit: u32,
    preview_chars: usize,
}

impl TrelloSearch {
    pub fn new(
        client: TrelloClient,
        board_id: Option<String>,
        limit: u32,
        preview_chars: usize,
    ) -> Self {
        Self {
            client,
            board_id,
            limit,
            preview_chars,
        }
    }
}

impl SearchTool for TrelloSearch {
    fn search(&self, query: &str) -> SearchResult {
        match self
            .client
            .search_cards(query, self.board_id.as_deref(), self.limit)
        {
            Ok(cards) => summarize(cards, self.limit as usize, self.preview_chars),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "card search failed");
                SearchResult::Unavailable(format!("search failed: {err:#}"))
            }
        }
    }
}

/// Convert raw cards to summaries, keeping at most `limit` in API order.
pub fn summarize(cards: Vec<Card>, limit: usize, preview_chars: usize) -> SearchResult {
    if cards.is_empty() {
        return SearchResult::NoMatches;
    }
    SearchResult::Matches(
        cards
            .into_iter()
            .take(limit)
            .map(|card| CardSummary {
                description_preview: preview(&card.desc, preview_chars),
                id: card.id,
                title: card.name,
            })
            .collect(),
    )
}

fn preview(desc: &str, max_chars: usize) -> String {
    let flat = desc.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, desc: &str) -> Card {
        Card {
            id: id.to_string(),
            name: format!("card {id}"),
            desc: desc.to_string(),
            short_url: None,
        }
    }

    #[test]
    fn empty_search_is_no_matches() {
        assert_eq!(summarize(Vec::new(), 5, 100), SearchResult::NoMatches);
        assert_eq!(SearchResult::NoMatches.render(), "No matching cards found.");
    }

    #[test]
    fn summaries_keep_order_and_limit() {
        let cards = vec![card("a1", "first"), card("b2", "second"), card("c3", "third")];
        let SearchResult::Matches(summaries) = summarize(cards, 2, 100) else {
            panic!("expected matches");
        };
        let ids: Vec<_> = summaries.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
    }

    #[test]
    fn description_preview_is_truncated() {
        let result = summarize(vec![card("a1", "line one\nline   two")], 5, 8);
        let SearchResult::Matches(summaries) = &result else {
            panic!("expected matches");
        };
        assert_eq!(summaries[0].description_preview, "line one...");
        assert!(result.render().contains("- ID: a1 | Title: card a1"));
    }
}
