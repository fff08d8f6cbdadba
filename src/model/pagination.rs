use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

/// Page requested through the `page_num` (1-based) and `page_size` query values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page_num: usize,
    page_size: usize,
}

impl Pagination {
    pub const DEFAULT_PAGE_SIZE: usize = 50;

    pub fn new(page_num: usize, page_size: usize) -> Option<Self> {
        (page_num >= 1 && page_size >= 1).then_some(Self {
            page_num,
            page_size,
        })
    }

    pub fn page_num(&self) -> usize {
        self.page_num
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn skip(&self) -> usize {
        (self.page_num - 1).saturating_mul(self.page_size)
    }

    /// Cut this page out of an ordered sequence.
    pub fn page<T>(self, items: impl IntoIterator<Item = T>) -> Paginated<T> {
        let mut total = 0;
        let mut page = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            if i >= self.skip() && page.len() < self.page_size {
                page.push(item);
            }
            total += 1;
        }
        Paginated {
            items: page,
            pagination: self.result(total),
        }
    }

    fn result(self, total: usize) -> PaginationResult {
        PaginationResult {
            page_num: self.page_num,
            page_size: self.page_size,
            total,
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Pagination {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let page_num = req.query_value::<usize>("page_num").unwrap_or(Ok(1));
        let page_size = req
            .query_value::<usize>("page_size")
            .unwrap_or(Ok(Self::DEFAULT_PAGE_SIZE));
        match (page_num, page_size) {
            (Ok(page_num), Ok(page_size)) => match Self::new(page_num, page_size) {
                Some(pagination) => request::Outcome::Success(pagination),
                None => request::Outcome::Failure((Status::BadRequest, ())),
            },
            _ => request::Outcome::Failure((Status::BadRequest, ())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResult {
    pub page_num: usize,
    pub page_size: usize,
    pub total: usize,
}

/// One page of results plus where it sits in the whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
}
