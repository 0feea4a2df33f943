//! CSS-selector parser over the catalog's HTML.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use tracing::warn;

use super::{BookDetail, GroupDetail, PageParser, ParseError, SearchHit};
use crate::config::Config;
use crate::models::SearchType;

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// First element matching `selector` inside or after `start`, in document order.
fn first_from<'a>(
    document: &'a Html,
    start: ElementRef<'a>,
    selector: &Selector,
) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .skip_while(|node| node.id() != start.id())
        .filter_map(ElementRef::wrap)
        .find(|element| selector.matches(element))
}

/// Parser with every selector compiled up front.
///
/// Documents are parsed and dropped within each call; `scraper::Html` is not
/// `Send` and never outlives the synchronous parse.
#[derive(Debug)]
pub struct HtmlPageParser {
    items: HashMap<SearchType, Selector>,
    book_title: Selector,
    book_description: Selector,
    book_thumbnail: Selector,
    book_author: Selector,
    book_genres: Selector,
    ignored_genre_labels: Vec<String>,
    group_content: Selector,
    group_title: Selector,
    group_thumbnail: Selector,
}

impl HtmlPageParser {
    pub fn new(config: &Config) -> Result<Self, ParseError> {
        let mut items = HashMap::new();
        for search_type in [SearchType::Books, SearchType::Groups] {
            if let Some(selector) = config.item_selector(search_type) {
                items.insert(search_type, compile(selector)?);
            }
        }

        let s = &config.selectors;
        Ok(Self {
            items,
            book_title: compile(&s.book_title)?,
            book_description: compile(&s.book_description)?,
            book_thumbnail: compile(&s.book_thumbnail)?,
            book_author: compile(&s.book_author)?,
            book_genres: compile(&s.book_genres)?,
            ignored_genre_labels: s.ignored_genre_labels.clone(),
            group_content: compile(&s.group_content)?,
            group_title: compile(&s.group_title)?,
            group_thumbnail: compile(&s.group_thumbnail)?,
        })
    }

    fn first_text(&self, document: &Html, selector: &Selector) -> Option<String> {
        document.select(selector).next().map(text_of)
    }
}

impl PageParser for HtmlPageParser {
    fn parse_search_results(
        &self,
        body: &str,
        search_type: SearchType,
    ) -> Result<Vec<SearchHit>, ParseError> {
        let selector = self
            .items
            .get(&search_type)
            .ok_or(ParseError::NoItemSelector(search_type))?;
        let document = Html::parse_document(body);

        let hits = document
            .select(selector)
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                let title = text_of(anchor);
                if title.is_empty() || href.is_empty() {
                    return None;
                }
                Some(SearchHit {
                    title,
                    url: href.to_string(),
                })
            })
            .collect();
        Ok(hits)
    }

    fn parse_book_detail(&self, body: &str) -> Result<BookDetail, ParseError> {
        let document = Html::parse_document(body);

        let title = self
            .first_text(&document, &self.book_title)
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingElement("book title"))?;
        let author_fullname = self
            .first_text(&document, &self.book_author)
            .filter(|a| !a.is_empty())
            .ok_or(ParseError::MissingElement("book author"))?;

        let description = self
            .first_text(&document, &self.book_description)
            .unwrap_or_else(|| {
                warn!(title = %title, "No description found");
                String::new()
            });
        let thumbnail = document
            .select(&self.book_thumbnail)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string)
            .unwrap_or_else(|| {
                warn!(title = %title, "No thumbnail found");
                String::new()
            });

        let mut genres: Vec<String> = Vec::new();
        let mut labels = 0usize;
        for element in document.select(&self.book_genres) {
            labels += 1;
            let label = text_of(element);
            if label.is_empty()
                || self.ignored_genre_labels.contains(&label)
                || genres.contains(&label)
            {
                continue;
            }
            genres.push(label);
        }
        if labels == 0 {
            warn!(title = %title, "No genres found on the page");
        }

        Ok(BookDetail {
            title,
            description,
            thumbnail,
            author_fullname,
            genres,
        })
    }

    fn parse_group_detail(&self, body: &str) -> Result<GroupDetail, ParseError> {
        let document = Html::parse_document(body);

        let content = document
            .select(&self.group_content)
            .next()
            .ok_or(ParseError::MissingElement("group main content"))?;
        let title = first_from(&document, content, &self.group_title)
            .map(text_of)
            .filter(|t| !t.is_empty())
            .ok_or(ParseError::MissingElement("group title"))?;
        let thumbnail = document
            .select(&self.group_thumbnail)
            .next()
            .and_then(|img| img.value().attr("src"))
            .ok_or(ParseError::MissingElement("group thumbnail"))?
            .to_string();

        Ok(GroupDetail { title, thumbnail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn parser() -> HtmlPageParser {
        HtmlPageParser::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_search_results_books() {
        let body = fixtures::search_page(
            SearchType::Books,
            &[("Dune", "/book/show/1.Dune"), ("Dune Messiah", "/book/show/2")],
        );
        let hits = parser()
            .parse_search_results(&body, SearchType::Books)
            .unwrap();
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    title: "Dune".to_string(),
                    url: "/book/show/1.Dune".to_string()
                },
                SearchHit {
                    title: "Dune Messiah".to_string(),
                    url: "/book/show/2".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_search_results_use_type_selector() {
        let body = fixtures::search_page(SearchType::Groups, &[("Readers", "/group/show/7")]);
        let parser = parser();
        assert!(parser
            .parse_search_results(&body, SearchType::Books)
            .unwrap()
            .is_empty());
        assert_eq!(
            parser
                .parse_search_results(&body, SearchType::Groups)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_search_results_skip_anchor_without_href() {
        let body = r#"<html><body><a class="bookTitle">No link</a></body></html>"#;
        assert!(parser()
            .parse_search_results(body, SearchType::Books)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_book_detail() {
        let body = fixtures::book_page(
            "Dune",
            "Frank Herbert",
            &["Science Fiction", "Classics", "Science Fiction"],
        );
        let book = parser().parse_book_detail(&body).unwrap();
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author_fullname, "Frank Herbert");
        assert_eq!(book.description, "About Dune");
        assert_eq!(book.thumbnail, "https://img.example/Dune.jpg");
        // "...more" and the repeated label are dropped
        assert_eq!(book.genres, vec!["Science Fiction", "Classics"]);
    }

    #[test]
    fn test_book_detail_without_genres_or_description() {
        let body = r#"
            <html><body>
              <h1 class="Text Text__title1">Emma</h1>
              <span class="ContributorLink__name">Jane Austen</span>
            </body></html>
        "#;
        let book = parser().parse_book_detail(body).unwrap();
        assert!(book.genres.is_empty());
        assert_eq!(book.description, "");
        assert_eq!(book.thumbnail, "");
    }

    #[test]
    fn test_book_detail_requires_title_and_author() {
        let no_author = r#"<html><body><h1 class="Text Text__title1">Emma</h1></body></html>"#;
        assert!(matches!(
            parser().parse_book_detail(no_author),
            Err(ParseError::MissingElement("book author"))
        ));
        assert!(matches!(
            parser().parse_book_detail("<html></html>"),
            Err(ParseError::MissingElement("book title"))
        ));
    }

    #[test]
    fn test_group_detail() {
        let body = fixtures::group_page("Readers Club");
        let group = parser().parse_group_detail(&body).unwrap();
        assert_eq!(group.title, "Readers Club");
        assert_eq!(group.thumbnail, "https://img.example/Readers Club.png");
    }

    #[test]
    fn test_group_title_after_content_block() {
        let body = r#"<html><body>
            <h1>Site header</h1>
            <div class="mainContentFloat"><p>Members</p></div>
            <section><h1>Night Readers</h1></section>
            <a class="groupPicLink"><img src="t.png"></a>
            </body></html>"#;
        let group = parser().parse_group_detail(body).unwrap();
        assert_eq!(group.title, "Night Readers");
    }

    #[test]
    fn test_group_detail_hard_errors() {
        let parser = parser();
        assert!(matches!(
            parser.parse_group_detail("<html><body><h1>x</h1></body></html>"),
            Err(ParseError::MissingElement("group main content"))
        ));
        let no_thumb = r#"<html><body><div class="mainContentFloat"><h1>Club</h1></div></body></html>"#;
        assert!(matches!(
            parser.parse_group_detail(no_thumb),
            Err(ParseError::MissingElement("group thumbnail"))
        ));
        let no_title = r#"<html><body><h1>Before</h1><div class="mainContentFloat"></div>
            <a class="groupPicLink"><img src="t.png"></a></body></html>"#;
        assert!(matches!(
            parser.parse_group_detail(no_title),
            Err(ParseError::MissingElement("group title"))
        ));
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let mut config = Config::default();
        config.selectors.book_title = "h1[".to_string();
        assert!(matches!(
            HtmlPageParser::new(&config),
            Err(ParseError::InvalidSelector { .. })
        ));
    }
}
