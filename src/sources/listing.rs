//! Daily listing scraper.
//!
//! The listing is an HTML page of tables grouped under headings. Each data row
//! reads `date | title | authors | ...` and links to the paper somewhere in the
//! row; the nearest preceding heading names the category.

use scraper::{ElementRef, Html, Selector};

use crate::models::Candidate;
use crate::sources::arxiv::normalize_identifier;
use crate::utils::collapse_whitespace;

/// Parse listing rows in document order, considering at most `limit` data rows.
///
/// Rows without a recognizable paper link are skipped.
pub fn parse_listing(html: &str, limit: usize) -> Vec<Candidate> {
    let document = Html::parse_document(html);
    let (Ok(walk), Ok(cell), Ok(link)) = (
        Selector::parse("h1, h2, h3, h4, h5, tr"),
        Selector::parse("td"),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let mut category = String::new();
    let mut considered = 0usize;
    let mut candidates = Vec::new();

    for element in document.select(&walk) {
        if element.value().name() != "tr" {
            category = element_text(&element);
            continue;
        }

        let cells: Vec<ElementRef> = element.select(&cell).collect();
        if cells.len() < 2 {
            // header rows use <th>
            continue;
        }
        if considered >= limit {
            break;
        }
        considered += 1;

        let Some((identifier, href)) = row_reference(&element, &cells, &link) else {
            tracing::debug!("Skipping listing row without paper link: {}", element_text(&element));
            continue;
        };

        candidates.push(Candidate {
            identifier,
            link: href,
            date: element_text(&cells[0]),
            title: element_text(&cells[1]),
            authors: cells.get(2).map(element_text).unwrap_or_default(),
            category: category.clone(),
        });
    }

    candidates
}

/// First link in the row that normalizes, else a cell whose text does.
fn row_reference(
    row: &ElementRef,
    cells: &[ElementRef],
    link: &Selector,
) -> Option<(String, String)> {
    let from_link = row.select(link).find_map(|a| {
        let href = a.value().attr("href")?;
        normalize_identifier(href).map(|id| (id, href.to_string()))
    });

    from_link.or_else(|| {
        cells.iter().find_map(|c| {
            let text = element_text(c);
            normalize_identifier(&text).map(|id| (id, text))
        })
    })
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}
