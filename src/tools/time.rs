//! 时间能力：查询某时区当前时间，或把 RFC 3339 时间换算到另一时区
//!
//! 时区支持 `UTC`、`+08:00` / `UTC+9` 形式的固定偏移，以及 IANA 时区名（如 `America/New_York`，
//! 按 tz 数据库处理夏令时）。

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::structured::CapabilityArgs;
use crate::tools::{Capability, Dispatcher};

/// 解析后的时区：固定偏移或 IANA 时区
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Fixed(FixedOffset),
    Named(Tz),
}

impl Zone {
    /// 某一时刻该时区相对 UTC 的偏移
    pub fn offset_at(&self, instant: DateTime<Utc>) -> FixedOffset {
        match self {
            Zone::Fixed(offset) => *offset,
            Zone::Named(tz) => tz.offset_from_utc_datetime(&instant.naive_utc()).fix(),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Fixed(offset) => write!(f, "{offset}"),
            Zone::Named(tz) => write!(f, "{tz}"),
        }
    }
}

pub struct TimeTool;

impl TimeTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TimeTool {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析时区：IANA 名（不区分大小写）/ `UTC` / `+08:00` / `-0530` / `UTC+9`
pub fn parse_zone(raw: &str) -> Result<Zone, String> {
    let trimmed = raw.trim();
    if let Ok(tz) = Tz::from_str_insensitive(trimmed) {
        return Ok(Zone::Named(tz));
    }
    let name = trimmed.to_lowercase();
    let body = name
        .strip_prefix("utc")
        .or_else(|| name.strip_prefix("gmt"))
        .unwrap_or(&name);
    let (sign, digits) = match body.chars().next() {
        Some('+') => (1, &body[1..]),
        Some('-') => (-1, &body[1..]),
        _ => return Err(format!("Unknown timezone '{raw}'")),
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Unknown timezone '{raw}'"));
    }
    let (h, m) = match digits.len() {
        1 | 2 => (digits.as_str(), "0"),
        4 => digits.split_at(2),
        _ => return Err(format!("Unknown timezone '{raw}'")),
    };
    let hours: i32 = h.parse().map_err(|_| format!("Unknown timezone '{raw}'"))?;
    let minutes: i32 = m.parse().map_err(|_| format!("Unknown timezone '{raw}'"))?;
    if hours > 14 || minutes > 59 {
        return Err(format!("Offset out of range: '{raw}'"));
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .map(Zone::Fixed)
        .ok_or_else(|| format!("Offset out of range: '{raw}'"))
}

/// 从自由文本里找第一个认识的时区名
fn zone_in_text(text: &str) -> Option<Zone> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '?')
        .find_map(|word| parse_zone(word).ok())
}

pub fn convert(time: &str, zone: Zone) -> Result<String, String> {
    let parsed = DateTime::parse_from_rfc3339(time.trim())
        .map_err(|e| format!("Invalid RFC 3339 time '{time}': {e}"))?;
    Ok(in_zone(parsed.with_timezone(&Utc), zone))
}

fn in_zone(instant: DateTime<Utc>, zone: Zone) -> String {
    instant.with_timezone(&zone.offset_at(instant)).to_rfc3339()
}

#[async_trait]
impl Capability for TimeTool {
    fn name(&self) -> &str {
        "time_agent"
    }

    fn description(&self) -> &str {
        "Current date/time in a timezone, or convert a time between zones. Args: {\"query\": \"...\", \"timezone\": \"UTC | +08:00 | Asia/Shanghai\", \"time\": \"optional RFC 3339 time to convert\"}"
    }

    async fn call(&self, _dispatcher: &Dispatcher, args: CapabilityArgs) -> Result<String, String> {
        let zone = match args.str_arg("timezone") {
            Some(tz) => parse_zone(tz)?,
            None => zone_in_text(&args.query).unwrap_or(Zone::Fixed(Utc.fix())),
        };
        tracing::info!(zone = %zone, "time tool execute");
        match args.str_arg("time") {
            Some(time) => convert(time, zone),
            None => Ok(in_zone(Utc::now(), zone)),
        }
    }
}
