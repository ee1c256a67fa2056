//! Sitemap XML ingestion.
//!
//! The detector consumes a standard sitemap: a `<urlset>` of `<url>`
//! elements whose `<loc>` values name the pages the site currently claims.
//! Only `<loc>` is consumed; `lastmod`, `changefreq`, and `priority` belong
//! to the crawling pipeline. A `<sitemapindex>` document is rejected by
//! name, since resolving child sitemaps is also the crawler's job.

use std::collections::BTreeSet;

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::{Error, Fetcher, Result};

/// Parse a sitemap XML string into its set of URLs.
///
/// A well-formed sitemap with zero `<url>` entries yields an empty set, not
/// an error. Malformed XML is [`Error::Parse`] with the underlying reader
/// error attached.
pub fn parse_sitemap(xml: &str) -> Result<BTreeSet<String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut urls = BTreeSet::new();
    let mut buf = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"sitemapindex" => {
                        return Err(Error::Parse(
                            "expected a <urlset> sitemap, found a <sitemapindex>".to_string(),
                        ));
                    },
                    b"url" => in_url = true,
                    b"loc" if in_url => in_loc = true,
                    _ => {},
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => in_url = false,
                b"loc" => in_loc = false,
                _ => {},
            },
            Ok(Event::Text(e)) => {
                if in_loc {
                    let loc = e
                        .unescape()
                        .map_err(|e| Error::Parse(format!("sitemap <loc> text: {e}")))?;
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        urls.insert(loc.to_string());
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Parse(format!("sitemap XML: {e}"))),
            _ => {},
        }
        buf.clear();
    }

    debug!(urls = urls.len(), "parsed sitemap");
    Ok(urls)
}

/// Fetch a sitemap over HTTP and parse it.
///
/// Errors carry the sitemap URL so a failed run names its source.
pub async fn fetch_sitemap(fetcher: &Fetcher, url: &str) -> Result<BTreeSet<String>> {
    let xml = fetcher.fetch_text(url).await?;
    parse_sitemap(&xml).map_err(|e| match e {
        Error::Parse(msg) => Error::Parse(format!("{url}: {msg}")),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_basic_sitemap() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <loc>https://example.com/page1</loc>
            <lastmod>2024-01-15</lastmod>
          </url>
          <url>
            <loc>https://example.com/page2</loc>
          </url>
        </urlset>"#;

        let urls = parse_sitemap(xml).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("https://example.com/page1"));
        assert!(urls.contains("https://example.com/page2"));
    }

    #[test]
    fn empty_urlset_is_an_empty_set() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
        </urlset>"#;

        assert!(parse_sitemap(xml).unwrap().is_empty());
    }

    #[test]
    fn urls_without_loc_are_skipped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <lastmod>2024-01-15</lastmod>
          </url>
          <url>
            <loc>https://example.com/page1</loc>
          </url>
        </urlset>"#;

        let urls = parse_sitemap(xml).unwrap();
        assert_eq!(urls.len(), 1);
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <loc>https://example.com/page1
          </url>
        </urlset>"#;

        match parse_sitemap(xml) {
            Err(Error::Parse(_)) => {},
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn sitemap_index_is_rejected_by_name() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <sitemap>
            <loc>https://example.com/sitemap-1.xml</loc>
          </sitemap>
        </sitemapindex>"#;

        match parse_sitemap(xml) {
            Err(Error::Parse(msg)) => assert!(msg.contains("sitemapindex")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn xml_entities_are_unescaped() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url>
            <loc>https://example.com/page?foo=1&amp;bar=2</loc>
          </url>
        </urlset>"#;

        let urls = parse_sitemap(xml).unwrap();
        assert!(urls.contains("https://example.com/page?foo=1&bar=2"));
    }

    #[test]
    fn duplicate_locs_collapse_into_the_set() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/page1</loc></url>
          <url><loc>https://example.com/page1</loc></url>
        </urlset>"#;

        assert_eq!(parse_sitemap(xml).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_sitemap_round_trips_over_http() {
        let server = MockServer::start().await;
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/page1</loc></url>
        </urlset>"#;

        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(xml)
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(&server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let urls = fetch_sitemap(&fetcher, &format!("{}/sitemap.xml", server.uri()))
            .await
            .unwrap();
        assert!(urls.contains("https://example.com/page1"));
    }

    #[tokio::test]
    async fn fetch_sitemap_names_the_source_on_parse_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<urlset><url></loc>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let url = format!("{}/sitemap.xml", server.uri());
        match fetch_sitemap(&fetcher, &url).await {
            Err(Error::Parse(msg)) => assert!(msg.contains("/sitemap.xml")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_sitemap_surfaces_http_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::with_timeout(Duration::from_secs(2)).unwrap();
        let result = fetch_sitemap(&fetcher, &format!("{}/sitemap.xml", server.uri())).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }
}
