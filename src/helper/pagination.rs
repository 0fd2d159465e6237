use serde::Serialize;
use url::form_urlencoded;

/// Splits an ordered listing into fixed-size, 1-based pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: usize,
}

/// The slice of a listing that backs one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: usize,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_page_number: Option<usize>,
    pub next_page_number: Option<usize>,
    pub page_range: Vec<usize>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}

/// The `page` value from a raw query string. When `page` repeats, the last one wins.
pub fn page_param(query_string: &str) -> Option<String> {
    form_urlencoded::parse(query_string.as_bytes())
        .filter(|(key, _)| key == "page")
        .last()
        .map(|(_, value)| value.into_owned())
}

fn is_integer_literal(raw: &str) -> bool {
    let digits = raw.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        Paginator { per_page: per_page.max(1) }
    }

    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// An empty listing still has one (empty) page.
    pub fn num_pages(&self, count: usize) -> usize {
        if count == 0 {
            1
        } else {
            (count + self.per_page - 1) / self.per_page
        }
    }

    /// Turns the raw `page` query value into a valid page number.
    ///
    /// Missing or non-numeric input selects the first page; numbers outside
    /// `1..=num_pages` select the last page.
    pub fn resolve_page(&self, count: usize, requested: Option<&str>) -> usize {
        let num_pages = self.num_pages(count);
        let raw = match requested {
            Some(raw) => raw.trim(),
            None => return 1,
        };
        match raw.parse::<i64>() {
            Ok(n) if n >= 1 && (n as u64) <= num_pages as u64 => n as usize,
            Ok(_) => num_pages,
            // Too large for i64 but still a number.
            Err(_) if is_integer_literal(raw) => num_pages,
            Err(_) => 1,
        }
    }

    pub fn window(&self, count: usize, requested: Option<&str>) -> PageWindow {
        let number = self.resolve_page(count, requested);
        let offset = (number - 1) * self.per_page;
        let limit = self.per_page.min(count.saturating_sub(offset));
        PageWindow { number, offset, limit }
    }

    /// Wraps items already fetched for `window` with page metadata.
    pub fn page<T>(&self, window: PageWindow, count: usize, object_list: Vec<T>) -> Page<T> {
        let num_pages = self.num_pages(count);
        let number = window.number;
        let has_previous = number > 1;
        let has_next = number < num_pages;
        Page {
            object_list,
            number,
            num_pages,
            count,
            has_previous,
            has_next,
            previous_page_number: if has_previous { Some(number - 1) } else { None },
            next_page_number: if has_next { Some(number + 1) } else { None },
            page_range: (1..=num_pages).collect(),
        }
    }

    /// Pages an in-memory listing.
    pub fn paginate<T>(&self, mut items: Vec<T>, requested: Option<&str>) -> Page<T> {
        let count = items.len();
        let window = self.window(count, requested);
        let object_list: Vec<T> = items.drain(window.offset..window.offset + window.limit).collect();
        self.page(window, count, object_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_sizes_cover_every_item() {
        for per_page in 1..=7 {
            let paginator = Paginator::new(per_page);
            for count in 0..=40 {
                let items: Vec<usize> = (0..count).collect();
                let num_pages = paginator.num_pages(count);
                let expected_pages = if count == 0 { 1 } else { (count + per_page - 1) / per_page };
                assert_eq!(num_pages, expected_pages);

                let mut seen = Vec::new();
                for number in 1..=num_pages {
                    let page = paginator.paginate(items.clone(), Some(&number.to_string()));
                    assert_eq!(page.number, number);
                    if number < num_pages {
                        assert_eq!(page.len(), per_page);
                    } else if count > 0 {
                        let remainder = count % per_page;
                        assert_eq!(page.len(), if remainder == 0 { per_page } else { remainder });
                    }
                    seen.extend(page.object_list);
                }
                assert_eq!(seen, items);
            }
        }
    }

    #[test]
    fn thirteen_items_in_pages_of_ten() {
        let paginator = Paginator::new(10);
        let items: Vec<u32> = (0..13).collect();

        let first = paginator.paginate(items.clone(), None);
        assert_eq!(first.len(), 10);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.next_page_number, Some(2));

        let second = paginator.paginate(items.clone(), Some("2"));
        assert_eq!(second.object_list, vec![10, 11, 12]);
        assert!(!second.has_next);
        assert_eq!(second.previous_page_number, Some(1));

        let third = paginator.paginate(items, Some("3"));
        assert_eq!(third.number, 2);
        assert_eq!(third.len(), 3);
    }

    #[test]
    fn invalid_page_values_are_clamped() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.resolve_page(25, None), 1);
        assert_eq!(paginator.resolve_page(25, Some("abc")), 1);
        assert_eq!(paginator.resolve_page(25, Some("")), 1);
        assert_eq!(paginator.resolve_page(25, Some(" 2 ")), 2);
        assert_eq!(paginator.resolve_page(25, Some("99")), 3);
        assert_eq!(paginator.resolve_page(25, Some("0")), 3);
        assert_eq!(paginator.resolve_page(25, Some("-4")), 3);
        assert_eq!(paginator.resolve_page(25, Some("99999999999999999999")), 3);
        assert_eq!(paginator.resolve_page(25, Some("2.5")), 1);
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let paginator = Paginator::new(10);
        let page = paginator.paginate(Vec::<u8>::new(), Some("5"));
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert!(!page.has_next && !page.has_previous);
    }

    #[test]
    fn window_matches_offset_and_limit() {
        let paginator = Paginator::new(4);
        assert_eq!(paginator.window(10, Some("3")), PageWindow { number: 3, offset: 8, limit: 2 });
        assert_eq!(paginator.window(0, None), PageWindow { number: 1, offset: 0, limit: 0 });
    }

    #[test]
    fn zero_page_size_is_raised_to_one() {
        assert_eq!(Paginator::new(0).per_page(), 1);
    }

    #[test]
    fn last_page_param_wins() {
        assert_eq!(page_param("page=2&page=3").as_deref(), Some("3"));
        assert_eq!(page_param("sort=new&page=%32").as_deref(), Some("2"));
        assert_eq!(page_param("page="), Some(String::new()));
        assert_eq!(page_param("pages=4"), None);
        assert_eq!(page_param(""), None);
    }
}
