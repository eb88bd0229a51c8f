use anyhow::{Context, Result, bail};

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse seed tokens written in decimal or `0x` hex.
pub fn parse_seeds(tokens: &[String]) -> Result<Vec<u64>> {
    if tokens.is_empty() {
        bail!("at least one seed is required");
    }
    tokens
        .iter()
        .map(|token| {
            let parsed = match token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
            {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => token.parse::<u64>(),
            };
            parsed.with_context(|| format!("invalid seed '{token}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn parses_decimal_and_hex_seeds() {
        let seeds = parse_seeds(&split_csv("1337, 0xff,0X10")).unwrap();
        assert_eq!(seeds, vec![1337, 255, 16]);
    }

    #[test]
    fn rejects_bad_seeds() {
        let err = parse_seeds(&["12ab".to_string()]).unwrap_err();
        assert!(format!("{err:#}").contains("invalid seed '12ab'"));
        assert!(parse_seeds(&[]).is_err());
    }
}
