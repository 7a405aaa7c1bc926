use serde::{Deserialize, Serialize};

/// A post, either returned by the API or drafted locally during the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
  pub id: u64,
  pub user_id: u64,
  pub title: String,
  pub body: String,
}

/// Post author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub name: String,
  pub username: String,
  pub email: String,
  #[serde(default)]
  pub website: String,
}

/// Comment attached to a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  pub id: u64,
  #[serde(default)]
  pub post_id: Option<u64>,
  pub name: String,
  pub email: String,
  pub body: String,
}
