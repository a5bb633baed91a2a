#![allow(dead_code)]

use chrono::{DateTime, Utc};
use jsonapi::JsonApiModel;

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
pub struct Blog {
    #[jsonapi(primary = "blogs")]
    pub id: u64,
    #[jsonapi(client_id)]
    pub client_id: String,
    #[jsonapi(attr = "title")]
    pub title: String,
    #[jsonapi(relation = "posts")]
    pub posts: Vec<Post>,
    #[jsonapi(relation = "current_post")]
    pub current_post: Option<Box<Post>>,
    #[jsonapi(attr = "created_at")]
    pub created_at: DateTime<Utc>,
    #[jsonapi(attr = "view_count")]
    pub view_count: i32,
}

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
pub struct Post {
    #[jsonapi(primary = "posts")]
    pub id: u64,
    #[jsonapi(attr = "blog_id")]
    pub blog_id: u64,
    #[jsonapi(attr = "title")]
    pub title: String,
    #[jsonapi(attr = "body")]
    pub body: String,
    #[jsonapi(relation = "comments")]
    pub comments: Vec<Comment>,
    #[jsonapi(relation = "latest_comment")]
    pub latest_comment: Option<Comment>,
}

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
pub struct Comment {
    #[jsonapi(primary = "comments")]
    pub id: u64,
    #[jsonapi(attr = "post_id")]
    pub post_id: u64,
    #[jsonapi(attr = "body")]
    pub body: String,
}

pub fn timestamp(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).expect("timestamp in range")
}

pub fn comment(id: u64, post_id: u64) -> Comment {
    Comment {
        id,
        post_id,
        body: format!("comment {id}"),
    }
}

pub fn post(id: u64, comments: Vec<Comment>) -> Post {
    Post {
        id,
        blog_id: 5,
        title: format!("post {id}"),
        body: "Lorem ipsum".to_string(),
        latest_comment: comments.last().cloned(),
        comments,
    }
}

/// A blog with two posts, each with two comments; the current post is the
/// first post again.
pub fn blog_fixture() -> Blog {
    let first = post(1, vec![comment(1, 1), comment(2, 1)]);
    let second = post(2, vec![comment(3, 2), comment(4, 2)]);

    Blog {
        id: 5,
        client_id: String::new(),
        title: "Title 1".to_string(),
        current_post: Some(Box::new(first.clone())),
        posts: vec![first, second],
        created_at: timestamp(1_700_000_000),
        view_count: 1_000,
    }
}
