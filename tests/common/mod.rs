#![allow(dead_code)]

use portfolio_overlay::page::document::{Element, ElementId, Page};
use portfolio_overlay::storage::remote::{ContentRecord, ContentTable, ObjectStore};
use portfolio_overlay::storage::{BoxFuture, StorageError};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

/// In-memory content table that can fail one chosen batch request.
#[derive(Default)]
pub struct MemoryTable {
    pub rows: RefCell<BTreeMap<String, ContentRecord>>,
    pub batch_sizes: RefCell<Vec<usize>>,
    pub fail_batch: Option<usize>,
}

impl ContentTable for MemoryTable {
    fn scan(&self) -> BoxFuture<'_, Result<Vec<ContentRecord>, StorageError>> {
        let rows = self.rows.borrow().values().cloned().collect();
        Box::pin(std::future::ready(Ok(rows)))
    }

    fn get_record<'a>(
        &'a self,
        field_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<ContentRecord>, StorageError>> {
        let row = self.rows.borrow().get(field_name).cloned();
        Box::pin(std::future::ready(Ok(row)))
    }

    fn put_record(&self, record: ContentRecord) -> BoxFuture<'_, Result<(), StorageError>> {
        self.rows
            .borrow_mut()
            .insert(record.field_name.clone(), record);
        Box::pin(std::future::ready(Ok(())))
    }

    fn batch_put(&self, records: Vec<ContentRecord>) -> BoxFuture<'_, Result<(), StorageError>> {
        let index = self.batch_sizes.borrow().len();
        self.batch_sizes.borrow_mut().push(records.len());
        if self.fail_batch == Some(index) {
            return Box::pin(std::future::ready(Err(StorageError::Network(
                "throttled".to_string(),
            ))));
        }
        let mut rows = self.rows.borrow_mut();
        for record in records {
            rows.insert(record.field_name.clone(), record);
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

#[derive(Default)]
pub struct MemoryObjects {
    pub objects: RefCell<BTreeMap<String, (String, Vec<u8>)>>,
    pub presign_denied: bool,
}

impl ObjectStore for MemoryObjects {
    fn put_object<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        self.objects
            .borrow_mut()
            .insert(key.to_string(), (content_type.to_string(), bytes.to_vec()));
        Box::pin(std::future::ready(Ok(())))
    }

    fn presign_get<'a>(
        &'a self,
        key: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<String, StorageError>> {
        if self.presign_denied {
            return Box::pin(std::future::ready(Err(StorageError::Auth(
                "presign denied".to_string(),
            ))));
        }
        let url = format!("https://bucket.test/{key}?X-Amz-Expires={}", ttl.as_secs());
        Box::pin(std::future::ready(Ok(url)))
    }
}

pub struct PortfolioPage {
    pub page: Page,
    pub hero: ElementId,
    pub title: ElementId,
    pub bio: ElementId,
    pub skills: ElementId,
    pub photo: ElementId,
}

fn editable(tag: &str, field: &str, html: &str) -> Element {
    Element::new(tag)
        .with_class("editable")
        .with_attr("data-field", field)
        .with_html(html)
}

/// A small portfolio page with one field of each kind.
pub fn portfolio_page() -> PortfolioPage {
    let mut page = Page::new();
    let hero = page.append(None, Element::new("section").with_id("hero"));
    let title = page.append(Some(hero), editable("h1", "heroTitle", "Jane Doe"));
    let bio = page.append(
        Some(hero),
        editable(
            "p",
            "bio",
            "Platform engineer who has spent a decade building delivery pipelines for teams of every size.",
        ),
    );
    let skills = page.append(
        Some(hero),
        editable(
            "div",
            "skills",
            r#"<div class="tag-group"><h4>Cloud</h4><div class="tags"><span class="tag">AWS</span></div></div>"#,
        ),
    );
    let photo = page.append(
        Some(hero),
        Element::new("img")
            .with_attr("data-asset", "profile-photo")
            .with_attr("src", "img/default.jpg"),
    );

    PortfolioPage {
        page,
        hero,
        title,
        bio,
        skills,
        photo,
    }
}
