/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Playlist defaults
pub const DEFAULT_TARGET_PATH: &str = "index.m3u";
pub const DEFAULT_PLAYLIST_HEADER: &str = "#EXTM3U";
pub const DEFAULT_WRITE_UPDATE_TRAILER: bool = true;

// Naming defaults
pub const DEFAULT_LINE_MARKER: &str = "线路";

// Fetch defaults
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// Temporal classification defaults
pub const DEFAULT_DATE_PATTERN: &str = r"(\d{8})";
pub const DEFAULT_REFERENCE_OFFSET: &str = "+8h";

/// Channel family patterns, tried in order against the folded name
/// (uppercase, punctuation and whitespace removed). The first capture group is
/// the key.
pub fn default_family_patterns() -> Vec<String> {
    vec![
        // purely numeric channel ids
        r"^(\d+)$".to_string(),
        // numbered network channels
        r"(CCTV\d+\+?)".to_string(),
        r"(CCTV[A-Z\d]+)".to_string(),
        r"([A-Z]+卫视)".to_string(),
        // provincial satellite stations
        r"(北京|天津|河北|山西|内蒙古|辽宁|吉林|黑龙江|上海|江苏|浙江|安徽|福建|江西|山东|河南|湖北|湖南|广东|广西|海南|重庆|四川|贵州|云南|西藏|陕西|甘肃|青海|宁夏|新疆|东方|深圳|东南|兵团|厦门|海峡|三沙)(?:卫视|台)".to_string(),
        // cross-border broadcasters
        r"((?:凤凰|中天|东森|TVB|翡翠|明珠|澳亚|澳门)(?:卫视)?\p{Han}{0,2})".to_string(),
        r"(CETV\d+)".to_string(),
    ]
}
