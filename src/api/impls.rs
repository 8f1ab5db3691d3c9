use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use anyhow::bail;

use super::*;

impl Display for MarketStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Active => "active",
            Self::Closed => "closed",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for MarketStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            e => bail!("Couldn't deserialize to MarketStatus: {}", e),
        }
    }
}
impl Display for BetType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Before => "before",
            Self::Exact => "exact",
            Self::After => "after",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for BetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(Self::Before),
            "exact" => Ok(Self::Exact),
            "after" => Ok(Self::After),
            e => bail!("Couldn't deserialize to BetType: {}", e),
        }
    }
}
impl Display for BetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Active => "active",
            Self::Won => "won",
            Self::Lost => "lost",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for BetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            e => bail!("Couldn't deserialize to BetStatus: {}", e),
        }
    }
}
impl Display for BetCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.placed_at, self.seq)
    }
}
impl FromStr for BetCursor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let Some((placed_at, seq)) = s.trim().split_once(':') else {
            bail!("Couldn't deserialize to BetCursor, expected placed_at:seq: {}", s);
        };
        Ok(Self {
            placed_at: placed_at.parse()?,
            seq: seq.parse()?,
        })
    }
}
impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::UpstreamTimeout => "upstream_timeout",
            Self::Upstream => "upstream",
            Self::InvariantViolation => "invariant_violation",
            Self::Internal => "internal",
        };
        write!(f, "{}", output)
    }
}
impl Display for ErrorResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.category, self.reason)
    }
}
impl std::error::Error for ErrorResponse {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bet_type_parses_loosely() {
        assert_eq!(BetType::from_str(" Exact ").unwrap(), BetType::Exact);
        assert_eq!(BetType::from_str("BEFORE").unwrap(), BetType::Before);
        assert!(BetType::from_str("sometime").is_err());
    }
    #[test]
    fn cursor_parses_what_it_prints() {
        let cursor = BetCursor {
            placed_at: 1_750_144_109_460_123,
            seq: 42,
        };
        assert_eq!(cursor.to_string(), "1750144109460123:42");
        assert_eq!(BetCursor::from_str(" 1750144109460123:42 ").unwrap(), cursor);
        assert!(BetCursor::from_str("1750144109460123").is_err());
        assert!(BetCursor::from_str("soon:42").is_err());
    }
    #[test]
    fn states_round_trip_through_storage_names() {
        for status in [BetStatus::Active, BetStatus::Won, BetStatus::Lost] {
            assert_eq!(BetStatus::from_str(&status.to_string()).unwrap(), status);
        }
        for status in [MarketStatus::Active, MarketStatus::Closed] {
            assert_eq!(MarketStatus::from_str(&status.to_string()).unwrap(), status);
        }
    }
}
