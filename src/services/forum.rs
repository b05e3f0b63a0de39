// src/services/forum.rs

//! Forum synchronizer service.
//!
//! Walks a course's announcements forum, appends new posts to the transcript
//! and downloads attachments of those posts.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::Result;
use crate::fetcher::ContentFetcher;
use crate::models::{Attachment, CompiledSelectors, CourseRecord, ForumOutcome, Post};
use crate::storage::Transcript;
use crate::utils::resolve_url;

/// Service synchronizing one course's forum.
pub struct ForumSynchronizer<'a> {
    fetcher: &'a dyn ContentFetcher,
    selectors: &'a CompiledSelectors,
}

impl<'a> ForumSynchronizer<'a> {
    pub fn new(fetcher: &'a dyn ContentFetcher, selectors: &'a CompiledSelectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Process every thread of the forum at `forum_url`.
    ///
    /// Post and attachment ids are recorded in `record` as soon as their text is
    /// appended or their file is written, so an error part-way through never
    /// causes a post to be appended twice on the next run.
    pub async fn sync(&self, forum_url: &str, record: &mut CourseRecord) -> Result<ForumOutcome> {
        let index = self.fetcher.get(forum_url).await?;
        let threads = parse_thread_links(&String::from_utf8_lossy(&index), forum_url, self.selectors);
        log::debug!("{}: {} forum threads", record.name(), threads.len());

        let transcript = Transcript::new(&record.transcript);
        let mut outcome = ForumOutcome::default();

        for thread in threads {
            let page = self.fetcher.get(&thread).await?;
            let posts = parse_conversation(&String::from_utf8_lossy(&page), &thread, self.selectors);

            let fresh: Vec<&Post> = posts
                .iter()
                .filter(|post| !record.entry.has_post(&post.id))
                .collect();
            if !fresh.is_empty() {
                let blocks: Vec<String> = fresh.iter().map(|post| post.render()).collect();
                transcript.append(&blocks).await?;
                for post in fresh {
                    log::info!("{}: new post \"{}\"", record.name(), post.title);
                    if record.entry.add_post(&post.id) {
                        outcome.new_posts.push(post.id.clone());
                    }
                }
            }

            // Every post on the page: ids missing from docs include earlier failed downloads.
            self.download_attachments(&posts, record, &mut outcome).await;
        }

        Ok(outcome)
    }

    async fn download_attachments(
        &self,
        posts: &[Post],
        record: &mut CourseRecord,
        outcome: &mut ForumOutcome,
    ) {
        let mut seen = HashSet::new();
        let attachments = posts
            .iter()
            .flat_map(|post| post.attachments.iter())
            .map(|attachment| (attachment.id(), attachment))
            .filter(|(id, _)| !id.is_empty() && seen.insert(id.clone()));

        for (id, attachment) in attachments {
            if record.entry.has_doc(&id) {
                continue;
            }
            log::info!("{}: downloading attachment {}", record.name(), id);
            match self
                .fetcher
                .download(&attachment.url, record.location())
                .await
            {
                Some(path) => {
                    log::debug!("Saved {}", path.display());
                    record.entry.add_doc(id.clone());
                    outcome.new_docs.push(id);
                }
                None => outcome.failed_docs.push(id),
            }
        }
    }
}

/// Conversation links from the forum index, in listing order.
///
/// A forum without a thread table has no threads yet.
pub fn parse_thread_links(html: &str, base_url: &str, selectors: &CompiledSelectors) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&selectors.thread_table).next() else {
        log::debug!("No thread table on {base_url}");
        return Vec::new();
    };
    let base = Url::parse(base_url).ok();

    let mut seen = HashSet::new();
    table
        .select(&selectors.thread_cell)
        .filter_map(|cell| cell.select(&selectors.anchor).next())
        .filter_map(|a| a.value().attr("href"))
        .map(|href| match &base {
            Some(base) => resolve_url(base, href),
            None => href.to_string(),
        })
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

/// Every post on a conversation page, in page order.
pub fn parse_conversation(html: &str, page_url: &str, selectors: &CompiledSelectors) -> Vec<Post> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let raw = &selectors.raw;
    let mut seen = HashSet::new();
    let mut posts = Vec::new();

    for article in document.select(&selectors.post) {
        let Some(id) = article.value().attr(&raw.post_id_attr) else {
            log::warn!("Post without {} on {page_url} skipped", raw.post_id_attr);
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }

        let title = owned(article, &selectors.post_title, &selectors.post)
            .first()
            .map(|el| text_of(*el))
            .unwrap_or_default();
        let timestamp = owned(article, &selectors.post_time, &selectors.post)
            .first()
            .map(|el| text_of(*el))
            .unwrap_or_default();

        let mut body: Vec<String> = owned(article, &selectors.post_paragraph, &selectors.post)
            .into_iter()
            .map(text_of)
            .collect();
        // Rich-text blocks made of paragraphs are already covered above.
        body.extend(
            owned(article, &selectors.post_rich_text, &selectors.post)
                .into_iter()
                .filter(|block| block.select(&selectors.post_paragraph).next().is_none())
                .map(text_of),
        );

        let attachments = owned(article, &selectors.attachment_link, &selectors.post)
            .into_iter()
            .filter_map(|a| {
                let label = a.value().attr("aria-label")?;
                let href = a.value().attr("href")?;
                selectors.attachment_label.is_match(label).then(|| Attachment {
                    label: label.to_string(),
                    url: match &base {
                        Some(base) => resolve_url(base, href),
                        None => href.to_string(),
                    },
                })
            })
            .collect();

        posts.push(Post {
            id: id.to_string(),
            title,
            timestamp,
            body,
            attachments,
        });
    }
    posts
}

/// Descendants of `article` matching `sel` that are not part of a nested reply.
fn owned<'a>(article: ElementRef<'a>, sel: &Selector, post: &Selector) -> Vec<ElementRef<'a>> {
    article
        .select(sel)
        .filter(|el| belongs_to(*el, article, post))
        .collect()
}

/// Whether `el`'s closest enclosing post is `article` (replies nest inside their parent).
fn belongs_to(el: ElementRef<'_>, article: ElementRef<'_>, post: &Selector) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| post.matches(ancestor))
        .is_some_and(|ancestor| ancestor.id() == article.id())
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
