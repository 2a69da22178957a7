//! Windowed reading of an entity set.
//!
//! [`EntitySetPager`] turns one `$skip`/`$top` request into a series of bounded fetches
//! against an [`EntitySource`]. Each fetch asks for at most `page_size` records; the
//! records are buffered and handed out one at a time. When the buffer runs dry the pager
//! advances `skip` by the number of records it just consumed and fetches again, until the
//! source is drained or the requested `$top` has been reached.

use crate::limits::ODataLimits;
use crate::query::ODataQuery;

/// Backend able to return one window of an entity set.
pub trait EntitySource {
    type Record;
    type Error;

    /// Return at most `top` records after skipping `skip`.
    ///
    /// # Errors
    /// Backend errors are passed through the pager unchanged.
    fn fetch(&mut self, skip: u64, top: u64) -> Result<Vec<Self::Record>, Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PagerState {
    /// Nothing fetched yet.
    Empty,
    /// Records buffered, some possibly unread.
    Buffered,
    /// No more records will be produced.
    Exhausted,
}

pub struct EntitySetPager<S: EntitySource> {
    source: S,
    page_size: u64,
    skip: u64,
    top: u64,
    top_limit: u64,
    top_counter: u64,
    buffer: Vec<S::Record>,
    cursor: usize,
    drained: bool,
    state: PagerState,
}

impl<S: EntitySource> EntitySetPager<S> {
    /// `top = None` reads to the end of the source. A zero `page_size` is treated as one.
    pub fn new(source: S, skip: Option<u64>, top: Option<u64>, page_size: u64) -> Self {
        let page_size = page_size.max(1);
        let top_limit = top.unwrap_or(u64::MAX);
        Self {
            source,
            page_size,
            skip: skip.unwrap_or(0),
            top: top_limit.min(page_size),
            top_limit,
            top_counter: 0,
            buffer: Vec::new(),
            cursor: 0,
            drained: false,
            state: PagerState::Empty,
        }
    }

    /// Pager for the `$skip`/`$top` of `query`, paging by `limits.max_page_size`.
    pub fn for_query(source: S, query: &ODataQuery, limits: &ODataLimits) -> Self {
        Self::new(source, query.skip, query.top, limits.max_page_size)
    }

    #[must_use]
    pub fn state(&self) -> PagerState {
        self.state
    }

    /// `true` while a current record is available, fetching as needed.
    ///
    /// # Errors
    /// Returns the source error of a failed fetch.
    pub fn has_result(&mut self) -> Result<bool, S::Error> {
        loop {
            match self.state {
                PagerState::Exhausted => return Ok(false),
                PagerState::Empty => {
                    if self.top == 0 {
                        self.state = PagerState::Exhausted;
                        return Ok(false);
                    }
                    self.fetch()?;
                }
                PagerState::Buffered if self.cursor < self.buffer.len() => return Ok(true),
                PagerState::Buffered => {
                    if self.drained || self.top_counter >= self.top_limit {
                        self.state = PagerState::Exhausted;
                        return Ok(false);
                    }
                    self.skip += u64::try_from(self.buffer.len()).unwrap_or(u64::MAX);
                    self.top = self.page_size.min(self.top_limit - self.top_counter);
                    self.fetch()?;
                }
            }
        }
    }

    /// The record under the cursor; `None` before `has_result` returned `true`.
    #[must_use]
    pub fn current(&self) -> Option<&S::Record> {
        match self.state {
            PagerState::Buffered => self.buffer.get(self.cursor),
            PagerState::Empty | PagerState::Exhausted => None,
        }
    }

    pub fn next_result(&mut self) {
        if self.cursor < self.buffer.len() {
            self.cursor += 1;
        }
    }

    /// Drain every remaining record.
    ///
    /// # Errors
    /// Returns the source error of a failed fetch.
    pub fn collect_records(mut self) -> Result<Vec<S::Record>, S::Error>
    where
        S::Record: Clone,
    {
        let mut records = Vec::new();
        while self.has_result()? {
            if let Some(record) = self.current() {
                records.push(record.clone());
            }
            self.next_result();
        }
        Ok(records)
    }

    fn fetch(&mut self) -> Result<(), S::Error> {
        tracing::debug!(skip = self.skip, top = self.top, "fetching entity set page");
        let records = self.source.fetch(self.skip, self.top)?;
        let fetched = u64::try_from(records.len()).unwrap_or(u64::MAX);
        self.drained = fetched < self.top;
        self.top_counter = self.top_counter.saturating_add(fetched);
        self.buffer = records;
        self.cursor = 0;
        self.state = if fetched == 0 {
            PagerState::Exhausted
        } else {
            PagerState::Buffered
        };
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    struct Numbers(u64);

    impl EntitySource for Numbers {
        type Record = u64;
        type Error = std::convert::Infallible;

        fn fetch(&mut self, skip: u64, top: u64) -> Result<Vec<u64>, Self::Error> {
            Ok((skip..self.0).take(usize::try_from(top).unwrap()).collect())
        }
    }

    #[test]
    fn current_is_none_before_first_fetch() {
        let pager = EntitySetPager::new(Numbers(3), None, None, 2);
        assert_eq!(pager.current(), None);
        assert_eq!(pager.state(), PagerState::Empty);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let pager = EntitySetPager::new(Numbers(3), None, None, 0);
        assert_eq!(pager.collect_records().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    #[tracing_test::traced_test]
    fn fetches_are_logged() {
        let pager = EntitySetPager::new(Numbers(5), Some(1), Some(3), 2);
        assert_eq!(pager.collect_records().unwrap(), vec![1, 2, 3]);
        assert!(logs_contain("fetching entity set page"));
        assert!(logs_contain("skip=3"));
    }
}
