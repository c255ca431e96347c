/// Rewrites plain product URLs into affiliate-tagged ones.
#[derive(Debug, Clone)]
pub struct AffiliateLinker {
    affiliate_id: String,
    params: String,
}

impl AffiliateLinker {
    /// Creates a linker for the given affiliate id.
    pub fn new(affiliate_id: &str) -> Self {
        let params = format!(
            "af_id={affiliate_id}&currency=BRL&region=global&utm_source={affiliate_id}&\
             utm_medium=infl"
        );
        Self { affiliate_id: affiliate_id.to_string(), params }
    }

    /// The affiliate id this linker tags links with.
    pub fn affiliate_id(&self) -> &str {
        &self.affiliate_id
    }

    /// The fixed query-parameter block appended to every link.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// Appends the affiliate parameters to `url`.
    ///
    /// The block goes after `&` if the URL already has a query string and
    /// after `?` otherwise. The input is not validated. A URL that already
    /// carries the block is returned unchanged.
    pub fn rewrite(&self, url: &str) -> String {
        if url.contains(&self.params) {
            return url.to_string();
        }

        if url.contains('?') {
            format!("{url}&{}", self.params)
        } else {
            format!("{url}?{}", self.params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &str =
        "af_id=tester&currency=BRL&region=global&utm_source=tester&utm_medium=infl";

    #[test]
    fn test_rewrite_without_query() {
        let linker = AffiliateLinker::new("tester");
        assert_eq!(
            linker.rewrite("https://www.eneba.com/steam-game"),
            format!("https://www.eneba.com/steam-game?{PARAMS}")
        );
    }

    #[test]
    fn test_rewrite_with_query() {
        let linker = AffiliateLinker::new("tester");
        assert_eq!(
            linker.rewrite("https://www.eneba.com/steam-game?foo=bar"),
            format!("https://www.eneba.com/steam-game?foo=bar&{PARAMS}")
        );
    }

    #[test]
    fn test_rewrite_malformed_input_passes_through() {
        let linker = AffiliateLinker::new("tester");
        assert_eq!(linker.rewrite("not a url"), format!("not a url?{PARAMS}"));
        assert_eq!(linker.rewrite(""), format!("?{PARAMS}"));
    }

    #[test]
    fn test_rewrite_twice_does_not_duplicate_params() {
        let linker = AffiliateLinker::new("tester");
        let once = linker.rewrite("https://www.eneba.com/steam-game");
        let twice = linker.rewrite(&once);

        assert_eq!(once, twice);
        assert_eq!(twice.matches("af_id=").count(), 1);
    }

    #[test]
    fn test_rewrite_other_affiliate_is_still_tagged() {
        let linker = AffiliateLinker::new("tester");
        let other = AffiliateLinker::new("someone-else").rewrite("https://www.eneba.com/game");

        let rewritten = linker.rewrite(&other);
        assert!(rewritten.starts_with(&other));
        assert!(rewritten.ends_with(&format!("&{PARAMS}")));
    }
}
