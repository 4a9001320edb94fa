/// Fixed list of feed sources. There is deliberately no external
/// configuration for this list; edit it here.
pub const FEED_URLS: &[&str] = &[
    "https://news.ltn.com.tw/rss/world.xml",
    "https://news.ltn.com.tw/rss/sports.xml",
    "https://www.digitimes.com.tw/tech/rss/xml/xmlrss_10_60.xml",
    "https://media.rss.com/amdtechtalk/feed.xml",
];
