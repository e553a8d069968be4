//! Mapping from source posts to destination payloads.

use crate::types::{DestinationPost, PostStatus, SourcePost};

/// Build the creation payload for `post`.
///
/// Rendered title, content and excerpt are copied verbatim, as are the
/// category and tag ids. The featured image is left unset; the migrator
/// attaches the destination-side id once the image has been uploaded.
pub fn to_destination(post: &SourcePost) -> DestinationPost {
    DestinationPost {
        title: post.title.rendered.clone(),
        content: post.content.rendered.clone(),
        excerpt: post.excerpt.rendered.clone(),
        status: PostStatus::Publish,
        categories: post.categories.clone(),
        tags: post.tags.clone(),
        featured_media: None,
    }
}

impl From<&SourcePost> for DestinationPost {
    fn from(post: &SourcePost) -> Self {
        to_destination(post)
    }
}
